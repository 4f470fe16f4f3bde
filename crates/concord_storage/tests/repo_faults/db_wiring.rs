#![forbid(unsafe_code)]

use concord_kernel_contracts::record::DataRecord;
use concord_kernel_contracts::LedgerError;
use concord_storage::kv::{KeyValueStore, QueryExecutor, QueryHits, StoreFault, WritePrecondition};
use concord_storage::repo::{LedgerRepo, RecordRepository};

/// Host without per-key versions: only the two required trait methods.
#[derive(Debug, Default)]
struct PlainHost {
    rows: Vec<(String, Vec<u8>)>,
    broken: bool,
}

impl KeyValueStore for PlainHost {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, StoreFault> {
        if self.broken {
            return Err(StoreFault::Unavailable("peer unreachable".to_string()));
        }
        Ok(self
            .rows
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone()))
    }

    fn put_state(&mut self, key: &str, value: &[u8]) -> Result<(), StoreFault> {
        if self.broken {
            return Err(StoreFault::Unavailable("peer unreachable".to_string()));
        }
        self.rows.retain(|(k, _)| k != key);
        self.rows.push((key.to_string(), value.to_vec()));
        Ok(())
    }
}

impl QueryExecutor for PlainHost {
    fn get_query_result(&self, _query: &str) -> Result<QueryHits<'_>, StoreFault> {
        Ok(Box::new(std::iter::once(Err(StoreFault::Unavailable(
            "cursor dropped".to_string(),
        )))))
    }
}

#[test]
fn at_repo_db_01_unversioned_host_degrades_to_plain_writes() {
    let mut repo = LedgerRepo::new(PlainHost::default());
    let rec = DataRecord {
        id: "r1".to_string(),
        ..DataRecord::default()
    };
    repo.store_data_record(&rec, WritePrecondition::Absent).unwrap();
    let v = repo.load_data_record_versioned("r1").unwrap().unwrap();
    assert_eq!(v.version, None);
    assert_eq!(v.precondition(), WritePrecondition::Unchecked);
}

#[test]
fn at_repo_db_02_host_errors_surface_as_storage_failure() {
    let mut repo = LedgerRepo::new(PlainHost {
        broken: true,
        ..PlainHost::default()
    });
    assert!(matches!(
        repo.load_data_record("r1"),
        Err(LedgerError::StorageFailure(_))
    ));
    assert!(matches!(
        repo.put("r1", b"{}"),
        Err(LedgerError::StorageFailure(_))
    ));
}

#[test]
fn at_repo_db_03_mid_stream_query_fault_is_reported_per_item() {
    let repo = LedgerRepo::new(PlainHost::default());
    let items: Vec<_> = repo.query(r#"{"selector":{}}"#).unwrap().collect();
    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Err(LedgerError::StorageFailure(_))));
}
