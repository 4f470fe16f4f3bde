#![forbid(unsafe_code)]

use concord_kernel_contracts::codec::{self, CodecError};
use concord_kernel_contracts::record::{DataRecord, UserRecord};
use concord_kernel_contracts::LedgerError;

use crate::kv::{KeyValueStore, QueryExecutor, QueryHit, StateVersion, StoreFault, WritePrecondition};

pub type RepoHits<'a> = Box<dyn Iterator<Item = Result<QueryHit, LedgerError>> + 'a>;

/// Value read together with the version a guarded write must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: Option<StateVersion>,
}

impl<T> Versioned<T> {
    /// Precondition that holds only while the value is unchanged.
    pub fn precondition(&self) -> WritePrecondition {
        match self.version {
            Some(v) => WritePrecondition::AtVersion(v),
            None => WritePrecondition::Unchecked,
        }
    }
}

/// Typed persistence interface used by the lifecycle engine and the query
/// builder. Every method touches at most one key.
pub trait RecordRepository {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError>;

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), LedgerError>;

    fn get_versioned(&self, key: &str) -> Result<Option<Versioned<Vec<u8>>>, LedgerError>;

    fn put_guarded(
        &mut self,
        key: &str,
        value: &[u8],
        precondition: WritePrecondition,
    ) -> Result<(), LedgerError>;

    fn query(&self, query: &str) -> Result<RepoHits<'_>, LedgerError>;

    fn exists(&self, key: &str) -> Result<bool, LedgerError> {
        Ok(self.get(key)?.is_some())
    }

    fn load_data_record(&self, key: &str) -> Result<Option<DataRecord>, LedgerError> {
        self.get(key)?
            .map(|bytes| decode_data_at(key, &bytes))
            .transpose()
    }

    fn load_data_record_versioned(
        &self,
        key: &str,
    ) -> Result<Option<Versioned<DataRecord>>, LedgerError> {
        self.get_versioned(key)?
            .map(|v| {
                Ok(Versioned {
                    value: decode_data_at(key, &v.value)?,
                    version: v.version,
                })
            })
            .transpose()
    }

    fn load_user_record(&self, key: &str) -> Result<Option<UserRecord>, LedgerError> {
        self.get(key)?
            .map(|bytes| decode_user_at(key, &bytes))
            .transpose()
    }

    fn load_user_record_versioned(
        &self,
        key: &str,
    ) -> Result<Option<Versioned<UserRecord>>, LedgerError> {
        self.get_versioned(key)?
            .map(|v| {
                Ok(Versioned {
                    value: decode_user_at(key, &v.value)?,
                    version: v.version,
                })
            })
            .transpose()
    }

    /// Writes under `record.id`.
    fn store_data_record(
        &mut self,
        record: &DataRecord,
        precondition: WritePrecondition,
    ) -> Result<(), LedgerError> {
        let bytes = codec::encode_data_record(record).map_err(encode_failure)?;
        self.put_guarded(&record.id, &bytes, precondition)
    }

    /// Writes under `key`; the record's own id and address are not consulted.
    fn store_user_record(
        &mut self,
        key: &str,
        record: &UserRecord,
        precondition: WritePrecondition,
    ) -> Result<(), LedgerError> {
        let bytes = codec::encode_user_record(record).map_err(encode_failure)?;
        self.put_guarded(key, &bytes, precondition)
    }
}

/// Repository over any store that also executes rich queries.
#[derive(Debug, Clone)]
pub struct LedgerRepo<S> {
    store: S,
}

impl<S> LedgerRepo<S>
where
    S: KeyValueStore + QueryExecutor,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

impl<S> RecordRepository for LedgerRepo<S>
where
    S: KeyValueStore + QueryExecutor,
{
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        self.store.get_state(key).map_err(|f| storage_failure(key, f))
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), LedgerError> {
        self.store
            .put_state(key, value)
            .map_err(|f| storage_failure(key, f))
    }

    fn get_versioned(&self, key: &str) -> Result<Option<Versioned<Vec<u8>>>, LedgerError> {
        let found = self
            .store
            .get_state_versioned(key)
            .map_err(|f| storage_failure(key, f))?;
        Ok(found.map(|(value, version)| Versioned { value, version }))
    }

    fn put_guarded(
        &mut self,
        key: &str,
        value: &[u8],
        precondition: WritePrecondition,
    ) -> Result<(), LedgerError> {
        self.store
            .put_state_if(key, value, precondition)
            .map_err(|f| storage_failure(key, f))
    }

    fn query(&self, query: &str) -> Result<RepoHits<'_>, LedgerError> {
        let hits = self
            .store
            .get_query_result(query)
            .map_err(|f| storage_failure("<query>", f))?;
        Ok(Box::new(
            hits.map(|h| h.map_err(|f| storage_failure("<query>", f))),
        ))
    }
}

fn storage_failure(key: &str, fault: StoreFault) -> LedgerError {
    match fault {
        StoreFault::VersionConflict { key } => LedgerError::WriteConflict { key },
        other => {
            tracing::error!(key, fault = %other, "ledger store fault");
            LedgerError::StorageFailure(other.to_string())
        }
    }
}

fn decode_data_at(key: &str, bytes: &[u8]) -> Result<DataRecord, LedgerError> {
    codec::decode_data_record(bytes).map_err(|e| decode_failure(key, e))
}

fn decode_user_at(key: &str, bytes: &[u8]) -> Result<UserRecord, LedgerError> {
    codec::decode_user_record(bytes).map_err(|e| decode_failure(key, e))
}

fn decode_failure(key: &str, err: CodecError) -> LedgerError {
    tracing::warn!(key, error = %err, "stored value failed to decode");
    LedgerError::DecodeFailure {
        key: key.to_string(),
        reason: err.to_string(),
    }
}

fn encode_failure(err: CodecError) -> LedgerError {
    LedgerError::StorageFailure(format!("encode: {err}"))
}
