#![forbid(unsafe_code)]

use serde::Deserialize;
use thiserror::Error;

use crate::record::{DataRecord, DocType, LedgerDocument, UserRecord};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document is {found}, expected {expected}")]
    WrongDocType { expected: DocType, found: DocType },

    #[error("document has no docType")]
    MissingDocType,
}

#[derive(Deserialize)]
struct DocTypeTag {
    #[serde(rename = "docType", default)]
    doc_type: Option<DocType>,
}

pub fn peek_doc_type(bytes: &[u8]) -> Result<Option<DocType>, CodecError> {
    let tag: DocTypeTag = serde_json::from_slice(bytes)?;
    Ok(tag.doc_type)
}

pub fn encode_data_record(record: &DataRecord) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(record)?)
}

pub fn decode_data_record(bytes: &[u8]) -> Result<DataRecord, CodecError> {
    expect_doc_type(bytes, DocType::DataRecord)?;
    Ok(serde_json::from_slice(bytes)?)
}

pub fn encode_user_record(record: &UserRecord) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(record)?)
}

pub fn decode_user_record(bytes: &[u8]) -> Result<UserRecord, CodecError> {
    expect_doc_type(bytes, DocType::UserRecord)?;
    Ok(serde_json::from_slice(bytes)?)
}

/// Decodes a value of either kind. Unlike the typed decoders this needs the
/// discriminant, since there is no expected kind to fall back to.
pub fn decode_document(bytes: &[u8]) -> Result<LedgerDocument, CodecError> {
    match peek_doc_type(bytes)? {
        Some(DocType::DataRecord) => Ok(LedgerDocument::Data(serde_json::from_slice(bytes)?)),
        Some(DocType::UserRecord) => Ok(LedgerDocument::User(serde_json::from_slice(bytes)?)),
        None => Err(CodecError::MissingDocType),
    }
}

/// A missing discriminant is read as `expected`.
fn expect_doc_type(bytes: &[u8], expected: DocType) -> Result<(), CodecError> {
    match peek_doc_type(bytes)? {
        Some(found) if found != expected => Err(CodecError::WrongDocType { expected, found }),
        _ => Ok(()),
    }
}
