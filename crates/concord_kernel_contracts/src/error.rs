#![forbid(unsafe_code)]

use thiserror::Error;

use crate::record::DocType;
use crate::ContractViolation;

/// Failure of a single invocation. Every variant is terminal for the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(ContractViolation),

    #[error("duplicated record found: {id}")]
    DuplicateRecord { id: String },

    #[error("duplicated user found: {key}")]
    DuplicateUser { key: String },

    #[error("{kind} does not exist: {key}")]
    NotFound { kind: DocType, key: String },

    #[error("stored value under {key} could not be decoded: {reason}")]
    DecodeFailure { key: String, reason: String },

    #[error("illegal transition for data record {id}: {reason}")]
    IllegalTransition { id: String, reason: &'static str },

    #[error("the opinion of data record {id} was not approved")]
    RejectedOpinion { id: String },

    #[error("unknown operation: {name}")]
    InvalidOperation { name: String },

    #[error("storage failure: {0}")]
    StorageFailure(String),

    #[error("write conflict on {key}: version changed between read and write")]
    WriteConflict { key: String },
}

impl LedgerError {
    /// Stable machine-readable code for the response envelope.
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::InvalidArgument(_) => "INVALID_ARGUMENT",
            LedgerError::DuplicateRecord { .. } => "DUPLICATE_RECORD",
            LedgerError::DuplicateUser { .. } => "DUPLICATE_USER",
            LedgerError::NotFound { .. } => "NOT_FOUND",
            LedgerError::DecodeFailure { .. } => "DECODE_FAILURE",
            LedgerError::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
            LedgerError::RejectedOpinion { .. } => "REJECTED_OPINION",
            LedgerError::InvalidOperation { .. } => "INVALID_OPERATION",
            LedgerError::StorageFailure(_) => "STORAGE_FAILURE",
            LedgerError::WriteConflict { .. } => "WRITE_CONFLICT",
        }
    }
}

impl From<ContractViolation> for LedgerError {
    fn from(v: ContractViolation) -> Self {
        LedgerError::InvalidArgument(v)
    }
}
