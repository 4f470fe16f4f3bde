#![forbid(unsafe_code)]

use concord_kernel_contracts::record::DocType;
use concord_kernel_contracts::selector::Selector;
use concord_kernel_contracts::{normalize_arg, require_non_empty, ContractViolation, LedgerError};
use concord_storage::repo::RecordRepository;
use serde::Serialize;
use serde_json::value::{to_raw_value, RawValue};

use crate::profile::{EnvelopeFormat, ResponseEnvelope};

const OP_QUERY_BY_ID: &str = "queryById";
const OP_QUERY_BY_ADDRESS: &str = "queryByAddress";
const OP_QUERY_BY_OBJECT: &str = "queryByObject";
const OP_QUERY_BY_USER: &str = "queryByUser";
const OP_QUERY_BY_DEPARTMENT: &str = "queryByDepartment";
const OP_QUERY_WITH_STRING: &str = "queryWithQueryString";

#[derive(Serialize)]
struct KeyedRow<'a> {
    #[serde(rename = "Key")]
    key: &'a str,
    #[serde(rename = "Record")]
    record: &'a RawValue,
}

#[derive(Serialize)]
struct ListEnvelope<'a> {
    list: &'a [Box<RawValue>],
}

/// Builds selectors for the fixed queries and assembles executor results
/// into a single JSON response.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryBuilder {
    envelope: ResponseEnvelope,
}

impl QueryBuilder {
    pub fn new(envelope: ResponseEnvelope) -> Self {
        Self { envelope }
    }

    pub fn by_object(object: &str) -> Selector {
        Selector::for_doc_type(DocType::DataRecord).eq("object", object)
    }

    pub fn by_user(department: &str, user: &str) -> Selector {
        Selector::for_doc_type(DocType::DataRecord)
            .eq("department", department)
            .eq("user", user)
    }

    pub fn by_department(department: &str) -> Selector {
        Selector::for_doc_type(DocType::UserRecord).eq("department", department)
    }

    /// Point lookup; returns the stored bytes untouched.
    pub fn query_by_key<R>(
        &self,
        repo: &R,
        kind: DocType,
        args: &[String],
    ) -> Result<Vec<u8>, LedgerError>
    where
        R: RecordRepository + ?Sized,
    {
        let operation = match kind {
            DocType::DataRecord => OP_QUERY_BY_ID,
            DocType::UserRecord => OP_QUERY_BY_ADDRESS,
        };
        let [key] = single_arg(operation, args)?;
        repo.get(&key)?.ok_or(LedgerError::NotFound { kind, key })
    }

    pub fn query_by_object<R>(&self, repo: &R, args: &[String]) -> Result<Vec<u8>, LedgerError>
    where
        R: RecordRepository + ?Sized,
    {
        let [object] = single_arg(OP_QUERY_BY_OBJECT, args)?;
        self.run(repo, &Self::by_object(&object))
    }

    pub fn query_by_user<R>(&self, repo: &R, args: &[String]) -> Result<Vec<u8>, LedgerError>
    where
        R: RecordRepository + ?Sized,
    {
        if args.len() != 2 {
            return Err(ContractViolation::InvalidArity {
                operation: OP_QUERY_BY_USER,
                expected: "2",
                got: args.len(),
            }
            .into());
        }
        require_non_empty(OP_QUERY_BY_USER, args)?;
        let department = normalize_arg(&args[0]);
        let user = normalize_arg(&args[1]);
        self.run(repo, &Self::by_user(&department, &user))
    }

    pub fn query_by_department<R>(
        &self,
        repo: &R,
        args: &[String],
    ) -> Result<Vec<u8>, LedgerError>
    where
        R: RecordRepository + ?Sized,
    {
        let [department] = single_arg(OP_QUERY_BY_DEPARTMENT, args)?;
        self.run(repo, &Self::by_department(&department))
    }

    /// The caller's selector goes to the executor byte-for-byte.
    pub fn query_with_string<R>(&self, repo: &R, args: &[String]) -> Result<Vec<u8>, LedgerError>
    where
        R: RecordRepository + ?Sized,
    {
        if args.len() != 1 {
            return Err(ContractViolation::InvalidArity {
                operation: OP_QUERY_WITH_STRING,
                expected: "1",
                got: args.len(),
            }
            .into());
        }
        require_non_empty(OP_QUERY_WITH_STRING, args)?;
        self.execute(repo, &args[0])
    }

    fn run<R>(&self, repo: &R, selector: &Selector) -> Result<Vec<u8>, LedgerError>
    where
        R: RecordRepository + ?Sized,
    {
        self.execute(repo, &selector.to_query_string())
    }

    /// Drains the executor once, in its order, into the profile's envelope.
    pub fn execute<R>(&self, repo: &R, query: &str) -> Result<Vec<u8>, LedgerError>
    where
        R: RecordRepository + ?Sized,
    {
        tracing::debug!(query, "executing rich query");
        let mut rows: Vec<Box<RawValue>> = Vec::new();
        for hit in repo.query(query)? {
            let hit = hit?;
            let record = raw_document(&hit.key, hit.value)?;
            let row = if self.envelope.include_key {
                to_raw_value(&KeyedRow {
                    key: &hit.key,
                    record: &record,
                })
                .map_err(encode_failure)?
            } else {
                record
            };
            rows.push(row);
        }
        tracing::debug!(rows = rows.len(), "rich query drained");
        let body = match self.envelope.format {
            EnvelopeFormat::BareArray => serde_json::to_vec(&rows),
            EnvelopeFormat::ListObject => serde_json::to_vec(&ListEnvelope { list: &rows }),
        };
        body.map_err(encode_failure)
    }
}

fn single_arg(operation: &'static str, args: &[String]) -> Result<[String; 1], LedgerError> {
    match args {
        [only] if !only.is_empty() => Ok([normalize_arg(only)]),
        [_] => Err(ContractViolation::EmptyArgument {
            operation,
            position: 0,
        }
        .into()),
        _ => Err(ContractViolation::InvalidArity {
            operation,
            expected: "1",
            got: args.len(),
        }
        .into()),
    }
}

fn raw_document(key: &str, value: Vec<u8>) -> Result<Box<RawValue>, LedgerError> {
    let decode_failure = |reason: String| {
        tracing::warn!(key, reason = %reason, "query row is not a JSON document");
        LedgerError::DecodeFailure {
            key: key.to_string(),
            reason,
        }
    };
    let text = String::from_utf8(value).map_err(|e| decode_failure(e.to_string()))?;
    RawValue::from_string(text).map_err(|e| decode_failure(e.to_string()))
}

fn encode_failure(err: serde_json::Error) -> LedgerError {
    LedgerError::StorageFailure(format!("encode: {err}"))
}
