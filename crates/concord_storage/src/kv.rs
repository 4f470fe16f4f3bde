#![forbid(unsafe_code)]

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateVersion(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreFault {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("version conflict on {key}")]
    VersionConflict { key: String },

    #[error("query rejected: {0}")]
    QueryRejected(String),
}

/// Condition a guarded write checks against the current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePrecondition {
    Unchecked,
    Absent,
    AtVersion(StateVersion),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryHit {
    pub key: String,
    pub value: Vec<u8>,
}

/// Lazy, finite, single-pass sequence produced by a rich query.
pub type QueryHits<'a> = Box<dyn Iterator<Item = Result<QueryHit, StoreFault>> + 'a>;

pub trait KeyValueStore {
    /// `Ok(None)` means the key has no value; read failures are `Err`.
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, StoreFault>;

    fn put_state(&mut self, key: &str, value: &[u8]) -> Result<(), StoreFault>;

    /// Hosts without per-key versions report `None` and guarded writes fall
    /// back to plain writes.
    fn get_state_versioned(
        &self,
        key: &str,
    ) -> Result<Option<(Vec<u8>, Option<StateVersion>)>, StoreFault> {
        Ok(self.get_state(key)?.map(|v| (v, None)))
    }

    fn put_state_if(
        &mut self,
        key: &str,
        value: &[u8],
        _precondition: WritePrecondition,
    ) -> Result<(), StoreFault> {
        self.put_state(key, value)
    }
}

pub trait QueryExecutor {
    fn get_query_result(&self, query: &str) -> Result<QueryHits<'_>, StoreFault>;
}
