#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use concord_kernel_contracts::codec;
use concord_kernel_contracts::record::LedgerDocument;
use concord_kernel_contracts::selector::Selector;
use serde_json::value::RawValue;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::kv::{
    KeyValueStore, QueryExecutor, QueryHit, QueryHits, StateVersion, StoreFault, WritePrecondition,
};

/// Faults the in-memory ledger raises on demand, for exercising failure paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultPlan {
    pub fail_reads: bool,
    pub fail_writes: bool,
    pub fail_queries: bool,
}

/// Document counts by kind. Values with no readable `docType` are `untyped`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerCensus {
    pub data_records: usize,
    pub user_records: usize,
    pub untyped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LedgerEntry {
    value: Vec<u8>,
    version: StateVersion,
}

/// Single-process key-value ledger with per-key versions and a flat
/// equality-selector executor. Query results come back in key order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    entries: BTreeMap<String, LedgerEntry>,
    next_version: u64,
    write_count: u64,
    faults: FaultPlan,
}

impl InMemoryLedger {
    pub fn new_in_memory() -> Self {
        Self::default()
    }

    pub fn set_faults(&mut self, faults: FaultPlan) {
        self.faults = faults;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Successful writes since construction (snapshot loads excluded).
    pub fn write_count(&self) -> u64 {
        self.write_count
    }

    pub fn census(&self) -> LedgerCensus {
        let mut census = LedgerCensus::default();
        for e in self.entries.values() {
            match codec::decode_document(&e.value) {
                Ok(LedgerDocument::Data(_)) => census.data_records += 1,
                Ok(LedgerDocument::User(_)) => census.user_records += 1,
                Err(_) => census.untyped += 1,
            }
        }
        census
    }

    /// SHA-256 over every (key, value) pair in key order, length-prefixed.
    pub fn state_digest(&self) -> String {
        let mut h = Sha256::new();
        for (k, e) in &self.entries {
            h.update((k.len() as u64).to_be_bytes());
            h.update(k.as_bytes());
            h.update((e.value.len() as u64).to_be_bytes());
            h.update(&e.value);
        }
        h.finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<String>()
    }

    /// Snapshot as a JSON object of key → stored document, values verbatim.
    pub fn to_snapshot_json(&self) -> Result<String, StoreFault> {
        let mut docs: BTreeMap<&str, Box<RawValue>> = BTreeMap::new();
        for (k, e) in &self.entries {
            let text = String::from_utf8(e.value.clone()).map_err(|_| {
                StoreFault::Unavailable(format!("value under {k} is not utf-8"))
            })?;
            let raw = RawValue::from_string(text)
                .map_err(|_| StoreFault::Unavailable(format!("value under {k} is not json")))?;
            docs.insert(k.as_str(), raw);
        }
        serde_json::to_string_pretty(&docs)
            .map_err(|e| StoreFault::Unavailable(format!("snapshot encode: {e}")))
    }

    pub fn from_snapshot_json(text: &str) -> Result<Self, StoreFault> {
        let docs: BTreeMap<String, Box<RawValue>> = serde_json::from_str(text)
            .map_err(|e| StoreFault::Unavailable(format!("snapshot decode: {e}")))?;
        let mut ledger = Self::new_in_memory();
        for (k, raw) in docs {
            let version = ledger.bump_version();
            ledger.entries.insert(
                k,
                LedgerEntry {
                    value: raw.get().as_bytes().to_vec(),
                    version,
                },
            );
        }
        Ok(ledger)
    }

    fn bump_version(&mut self) -> StateVersion {
        self.next_version = self.next_version.saturating_add(1);
        StateVersion(self.next_version)
    }

    fn check_readable(&self) -> Result<(), StoreFault> {
        if self.faults.fail_reads {
            return Err(StoreFault::Unavailable("injected read fault".to_string()));
        }
        Ok(())
    }
}

impl KeyValueStore for InMemoryLedger {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, StoreFault> {
        self.check_readable()?;
        Ok(self.entries.get(key).map(|e| e.value.clone()))
    }

    fn put_state(&mut self, key: &str, value: &[u8]) -> Result<(), StoreFault> {
        self.put_state_if(key, value, WritePrecondition::Unchecked)
    }

    fn get_state_versioned(
        &self,
        key: &str,
    ) -> Result<Option<(Vec<u8>, Option<StateVersion>)>, StoreFault> {
        self.check_readable()?;
        Ok(self
            .entries
            .get(key)
            .map(|e| (e.value.clone(), Some(e.version))))
    }

    fn put_state_if(
        &mut self,
        key: &str,
        value: &[u8],
        precondition: WritePrecondition,
    ) -> Result<(), StoreFault> {
        if self.faults.fail_writes {
            return Err(StoreFault::Unavailable("injected write fault".to_string()));
        }
        let current = self.entries.get(key).map(|e| e.version);
        let holds = match precondition {
            WritePrecondition::Unchecked => true,
            WritePrecondition::Absent => current.is_none(),
            WritePrecondition::AtVersion(v) => current == Some(v),
        };
        if !holds {
            return Err(StoreFault::VersionConflict {
                key: key.to_string(),
            });
        }
        let version = self.bump_version();
        self.entries.insert(
            key.to_string(),
            LedgerEntry {
                value: value.to_vec(),
                version,
            },
        );
        self.write_count = self.write_count.saturating_add(1);
        Ok(())
    }
}

impl QueryExecutor for InMemoryLedger {
    fn get_query_result(&self, query: &str) -> Result<QueryHits<'_>, StoreFault> {
        if self.faults.fail_queries {
            return Err(StoreFault::Unavailable("injected query fault".to_string()));
        }
        let selector =
            Selector::parse(query).map_err(|v| StoreFault::QueryRejected(v.to_string()))?;
        Ok(Box::new(self.entries.iter().filter_map(move |(k, e)| {
            // Values that are not JSON documents are never indexed.
            let doc: Value = serde_json::from_slice(&e.value).ok()?;
            selector.matches(&doc).then(|| {
                Ok::<_, StoreFault>(QueryHit {
                    key: k.clone(),
                    value: e.value.clone(),
                })
            })
        })))
    }
}
