#![forbid(unsafe_code)]

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
    InvalidArity {
        operation: &'static str,
        expected: &'static str,
        got: usize,
    },
    EmptyArgument {
        operation: &'static str,
        position: usize,
    },
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { field, reason } => write!(f, "{field} {reason}"),
            Self::InvalidArity {
                operation,
                expected,
                got,
            } => write!(
                f,
                "incorrect number of arguments for {operation}: expecting {expected}, got {got}"
            ),
            Self::EmptyArgument {
                operation,
                position,
            } => write!(
                f,
                "argument {position} of {operation} must be a non-empty string"
            ),
        }
    }
}

pub trait Validate {
    fn validate(&self) -> Result<(), ContractViolation>;
}

/// Canonical form for every positional argument before storage or lookup.
pub fn normalize_arg(raw: &str) -> String {
    raw.to_lowercase()
}

/// Rejects empty positional arguments, reporting the first offending index.
pub fn require_non_empty(operation: &'static str, args: &[String]) -> Result<(), ContractViolation> {
    match args.iter().position(|a| a.is_empty()) {
        Some(position) => Err(ContractViolation::EmptyArgument {
            operation,
            position,
        }),
        None => Ok(()),
    }
}
