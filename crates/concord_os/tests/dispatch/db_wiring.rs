#![forbid(unsafe_code)]

use std::fs;

use concord_engines::{EngineProfile, EnvelopeFormat, ModifyMode, ResponseEnvelope};
use concord_os::{ConcordConfig, ConfigError, Dispatcher, InvocationResponse};
use concord_storage::ledger::{FaultPlan, InMemoryLedger};
use concord_storage::repo::LedgerRepo;
use serde_json::{json, Value};

fn s(v: &[&str]) -> Vec<String> {
    v.iter().map(|x| x.to_string()).collect()
}

fn repo() -> LedgerRepo<InMemoryLedger> {
    LedgerRepo::new(InMemoryLedger::new_in_memory())
}

fn ok(resp: InvocationResponse) -> Vec<u8> {
    assert!(resp.is_ok(), "unexpected failure: {}", resp.message);
    resp.payload
}

#[test]
fn at_os_db_01_worked_example_through_the_dispatcher() {
    let d = Dispatcher::default();
    let mut r = repo();
    assert!(ok(d.invoke(
        &mut r,
        "initDataRecord",
        &s(&["r1", "dept1", "alice", "obj1", "add", "t0"])
    ))
    .is_empty());
    ok(d.invoke(&mut r, "modifyDataRecord", &s(&["r1", "bob", "t1", "true", "dept2"])));
    ok(d.invoke(&mut r, "modifyDataRecord", &s(&["r1", "t2", "contenthash"])));

    let late = d.invoke(&mut r, "modifyDataRecord", &s(&["r1", "t3", "x"]));
    assert_eq!(late.status, InvocationResponse::ERROR);
    assert_eq!(late.error_code, Some("ILLEGAL_TRANSITION"));

    let raw = ok(d.invoke(&mut r, "queryDataRecordById", &s(&["R1"])));
    let doc: Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(doc["content"], "contenthash");
    assert_eq!(doc["reviewDepartment"], "dept2");

    let rows: Value =
        serde_json::from_slice(&ok(d.invoke(&mut r, "queryByUser", &s(&["DEPT1", "Alice"]))))
            .unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["Key"], "r1");
}

#[test]
fn at_os_db_02_unknown_operation_never_writes() {
    let d = Dispatcher::default();
    let mut r = repo();
    let resp = d.invoke(&mut r, "deleteDataRecord", &s(&["r1"]));
    assert_eq!(resp.error_code, Some("INVALID_OPERATION"));
    assert_eq!(resp.message, "unknown operation: deleteDataRecord");
    assert_eq!(r.store().write_count(), 0);
}

#[test]
fn at_os_db_03_read_fault_is_not_absence() {
    let d = Dispatcher::default();
    let mut r = repo();
    let missing = d.invoke(&mut r, "queryById", &s(&["r1"]));
    assert_eq!(missing.error_code, Some("NOT_FOUND"));

    r.store_mut().set_faults(FaultPlan {
        fail_reads: true,
        ..FaultPlan::default()
    });
    let broken = d.invoke(&mut r, "queryById", &s(&["r1"]));
    assert_eq!(broken.error_code, Some("STORAGE_FAILURE"));
    let create = d.invoke(
        &mut r,
        "createDataRecord",
        &s(&["r1", "d", "u", "o", "t", "t0"]),
    );
    assert_eq!(create.error_code, Some("STORAGE_FAILURE"));
    assert_eq!(r.store().write_count(), 0);
}

#[test]
fn at_os_db_04_envelope_follows_profile() {
    let d = Dispatcher::new(EngineProfile {
        envelope: ResponseEnvelope {
            format: EnvelopeFormat::ListObject,
            include_key: true,
        },
        ..EngineProfile::mvp_v1()
    });
    let mut r = repo();
    ok(d.invoke(&mut r, "createUserRecord", &s(&["d1", "jack", "0xabc", "admin"])));
    ok(d.invoke(&mut r, "createUserRecord", &s(&["d2", "jill", "0xdef", "admin"])));
    let out: Value =
        serde_json::from_slice(&ok(d.invoke(&mut r, "queryUserRecordByDept", &s(&["d1"]))))
            .unwrap();
    assert_eq!(
        out,
        json!({"list": [{"Key": "0xabc", "Record": {
            "docType": "userRecord",
            "department": "d1",
            "userName": "jack",
            "userAddress": "0xabc",
            "role": "admin"
        }}]})
    );
}

#[test]
fn at_os_db_05_config_file_drives_the_dispatcher() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("concord.json");
    fs::write(
        &path,
        r#"{"profile":{"modify_mode":"by_mode_token","review_department":false}}"#,
    )
    .unwrap();
    let cfg = ConcordConfig::load(&path).unwrap();
    assert_eq!(cfg.profile.modify_mode, ModifyMode::ByModeToken);

    let d = Dispatcher::from_config(&cfg).unwrap();
    let mut r = repo();
    ok(d.invoke(&mut r, "createDataRecord", &s(&["r1", "d", "u", "o", "t", "t0"])));
    let by_arity = d.invoke(&mut r, "modifyDataRecord", &s(&["r1", "t2", "c"]));
    assert_eq!(by_arity.error_code, Some("INVALID_OPERATION"));
    ok(d.invoke(&mut r, "modifyDataRecord", &s(&["r1", "review", "bob", "t1", "true"])));
    ok(d.invoke(&mut r, "modifyDataRecord", &s(&["r1", "operate", "t2", "c"])));
}

#[test]
fn at_os_db_06_missing_and_broken_config_files() {
    let dir = tempfile::tempdir().unwrap();
    let absent = dir.path().join("nope.json");
    assert_eq!(ConcordConfig::load(&absent).unwrap(), ConcordConfig::default());

    let broken = dir.path().join("broken.json");
    fs::write(&broken, "{\"profile\":").unwrap();
    assert!(matches!(
        ConcordConfig::load(&broken),
        Err(ConfigError::Parse { .. })
    ));
}
