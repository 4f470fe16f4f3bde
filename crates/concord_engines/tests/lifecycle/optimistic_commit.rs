#![forbid(unsafe_code)]

use concord_engines::{CommitPolicy, EngineProfile, LifecycleEngine};
use concord_kernel_contracts::codec;
use concord_kernel_contracts::record::DataRecord;
use concord_kernel_contracts::LedgerError;
use concord_storage::kv::{
    KeyValueStore, QueryExecutor, QueryHits, StateVersion, StoreFault, WritePrecondition,
};
use concord_storage::ledger::InMemoryLedger;
use concord_storage::repo::{LedgerRepo, RecordRepository};

/// Lets another writer commit to the same key just before each of the next
/// `rounds` guarded writes.
#[derive(Debug, Default)]
struct RacingHost {
    inner: InMemoryLedger,
    rival: Option<(String, Vec<u8>)>,
    rounds: u32,
    guarded_writes: u32,
}

impl KeyValueStore for RacingHost {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, StoreFault> {
        self.inner.get_state(key)
    }

    fn put_state(&mut self, key: &str, value: &[u8]) -> Result<(), StoreFault> {
        self.inner.put_state(key, value)
    }

    fn get_state_versioned(
        &self,
        key: &str,
    ) -> Result<Option<(Vec<u8>, Option<StateVersion>)>, StoreFault> {
        self.inner.get_state_versioned(key)
    }

    fn put_state_if(
        &mut self,
        key: &str,
        value: &[u8],
        precondition: WritePrecondition,
    ) -> Result<(), StoreFault> {
        self.guarded_writes += 1;
        if self.rounds > 0 {
            if let Some((k, v)) = &self.rival {
                if k == key {
                    self.rounds -= 1;
                    self.inner.put_state(k, v)?;
                }
            }
        }
        self.inner.put_state_if(key, value, precondition)
    }
}

impl QueryExecutor for RacingHost {
    fn get_query_result(&self, query: &str) -> Result<QueryHits<'_>, StoreFault> {
        self.inner.get_query_result(query)
    }
}

fn s(v: &[&str]) -> Vec<String> {
    v.iter().map(|x| x.to_string()).collect()
}

fn engine(commit: CommitPolicy) -> LifecycleEngine {
    LifecycleEngine::new(EngineProfile {
        commit,
        ..EngineProfile::mvp_v1()
    })
}

/// r1 in Submitted, plus the bytes of a rival review by carol.
fn racing_repo(rounds: u32, rival_reviews: bool) -> LedgerRepo<RacingHost> {
    let mut repo = LedgerRepo::new(RacingHost::default());
    engine(CommitPolicy::HostSerialized)
        .create_data_record(&mut repo, &s(&["r1", "dept1", "alice", "obj1", "add", "t0"]))
        .unwrap();
    let mut rival = repo.load_data_record("r1").unwrap().unwrap();
    if rival_reviews {
        rival.reviewer = "carol".to_string();
        rival.review_time = "t1".to_string();
        rival.review_result = "true".to_string();
        rival.review_department = "dept9".to_string();
    }
    let bytes = codec::encode_data_record(&rival).unwrap();
    let host = repo.store_mut();
    host.rival = Some(("r1".to_string(), bytes));
    host.rounds = rounds;
    host.guarded_writes = 0;
    repo
}

fn stored(repo: &LedgerRepo<RacingHost>) -> DataRecord {
    repo.load_data_record("r1").unwrap().unwrap()
}

#[test]
fn at_occ_01_losing_review_fails_on_retry() {
    let mut repo = racing_repo(1, true);
    let e = engine(CommitPolicy::OptimisticRetry { max_attempts: 3 });
    let err = e
        .modify_data_record(&mut repo, &s(&["r1", "bob", "t1", "true", "dept2"]))
        .unwrap_err();
    assert!(matches!(err, LedgerError::IllegalTransition { .. }));
    assert_eq!(stored(&repo).reviewer, "carol");
    assert_eq!(repo.store().guarded_writes, 1);
}

#[test]
fn at_occ_02_host_serialized_policy_trusts_the_host() {
    let mut repo = racing_repo(1, true);
    let e = engine(CommitPolicy::HostSerialized);
    e.modify_data_record(&mut repo, &s(&["r1", "bob", "t1", "true", "dept2"]))
        .unwrap();
    // Without host serialization the later writer silently wins.
    assert_eq!(stored(&repo).reviewer, "bob");
}

#[test]
fn at_occ_03_benign_interleaving_succeeds_after_reread() {
    let mut repo = racing_repo(1, false);
    let e = engine(CommitPolicy::OptimisticRetry { max_attempts: 3 });
    let next = e
        .modify_data_record(&mut repo, &s(&["r1", "bob", "t1", "true", "dept2"]))
        .unwrap();
    assert_eq!(next.reviewer, "bob");
    assert_eq!(stored(&repo), next);
    assert_eq!(repo.store().guarded_writes, 2);
}

#[test]
fn at_occ_04_exhausted_attempts_surface_write_conflict() {
    let mut repo = racing_repo(u32::MAX, false);
    let e = engine(CommitPolicy::OptimisticRetry { max_attempts: 4 });
    let err = e
        .modify_data_record(&mut repo, &s(&["r1", "bob", "t1", "true", "dept2"]))
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::WriteConflict {
            key: "r1".to_string()
        }
    );
    assert_eq!(err.error_code(), "WRITE_CONFLICT");
    assert_eq!(repo.store().guarded_writes, 4);
    assert!(stored(&repo).un_reviewed());
}

#[test]
fn at_occ_05_racing_create_reports_duplicate() {
    let mut repo = LedgerRepo::new(RacingHost::default());
    let bytes = codec::encode_data_record(&DataRecord {
        id: "r2".to_string(),
        object: "theirs".to_string(),
        ..DataRecord::default()
    })
    .unwrap();
    let host = repo.store_mut();
    host.rival = Some(("r2".to_string(), bytes));
    host.rounds = 1;
    let e = engine(CommitPolicy::OptimisticRetry { max_attempts: 3 });
    assert_eq!(
        e.create_data_record(&mut repo, &s(&["r2", "d", "u", "mine", "add", "t0"])),
        Err(LedgerError::DuplicateRecord {
            id: "r2".to_string()
        })
    );
    assert_eq!(stored_object(&repo, "r2"), "theirs");
}

fn stored_object(repo: &LedgerRepo<RacingHost>, key: &str) -> String {
    repo.load_data_record(key).unwrap().unwrap().object
}
