#![forbid(unsafe_code)]

use std::fs;

use concord_os::Dispatcher;
use concord_storage::kv::KeyValueStore;
use concord_tools::replay::{invoke_once, load_ledger, replay, ReplayOptions};
use concord_tools::ToolError;

const WORKED_EXAMPLE: &str = r#"# submit, approve, operate
{"op":"createDataRecord","args":["r1","dept1","alice","obj1","add","t0"]}
{"op":"modifyDataRecord","args":["r1","bob","t1","true","dept2"]}
{"op":"modifyDataRecord","args":["r1","t2","contenthash"]}

{"op":"modifyDataRecord","args":["r1","t3","again"]}
{"op":"queryDataRecordByObject","args":["obj1"]}
"#;

#[test]
fn at_tools_db_01_replay_saves_and_resumes_from_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("flow.jsonl");
    let ledger = dir.path().join("ledger.json");
    fs::write(&script, WORKED_EXAMPLE).unwrap();

    let d = Dispatcher::default();
    let report = replay(
        &d,
        &ReplayOptions {
            script: script.clone(),
            ledger: Some(ledger.clone()),
            save: true,
        },
    )
    .unwrap();
    assert_eq!(report.lines.len(), 5);
    assert_eq!(&report.lines[..3], &["ok", "ok", "ok"]);
    assert!(report.lines[3].starts_with("err ILLEGAL_TRANSITION "));
    assert!(report.lines[4].starts_with(r#"ok [{"Key":"r1","Record":{"docType":"dataRecord""#));
    assert_eq!(report.failures, 1);
    assert_eq!(report.census.data_records, 1);
    assert_eq!(report.census.user_records + report.census.untyped, 0);

    let saved = load_ledger(&ledger).unwrap();
    assert_eq!(saved.state_digest(), report.digest);
    assert!(saved.get_state("r1").unwrap().is_some());

    // Same script against the saved ledger: every create now collides.
    let second = replay(
        &d,
        &ReplayOptions {
            script,
            ledger: Some(ledger),
            save: false,
        },
    )
    .unwrap();
    assert!(second.lines[0].starts_with("err DUPLICATE_RECORD "));
    assert_eq!(second.digest, report.digest);
}

#[test]
fn at_tools_db_02_bad_script_stops_before_running() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("bad.jsonl");
    let ledger = dir.path().join("ledger.json");
    fs::write(
        &script,
        "{\"op\":\"createDataRecord\",\"args\":[\"r1\",\"d\",\"u\",\"o\",\"t\",\"t0\"]}\nnot json\n",
    )
    .unwrap();
    let err = replay(
        &Dispatcher::default(),
        &ReplayOptions {
            script,
            ledger: Some(ledger.clone()),
            save: true,
        },
    )
    .unwrap_err();
    assert!(matches!(err, ToolError::Script { line: 2, .. }));
    assert_eq!(err.exit_code(), 2);
    assert!(!ledger.exists());
}

#[test]
fn at_tools_db_03_invoke_saves_only_on_success() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("ledger.json");
    let d = Dispatcher::default();
    let args = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    let created = invoke_once(
        &d,
        &snapshot,
        "initUserRecord",
        &args(&["d1", "jack", "0xABC", "admin"]),
    )
    .unwrap();
    assert!(created.is_ok());
    let before = fs::read_to_string(&snapshot).unwrap();
    assert!(before.contains("\"0xabc\""));

    let dup = invoke_once(
        &d,
        &snapshot,
        "initUserRecord",
        &args(&["d2", "jill", "0xabc", "viewer"]),
    )
    .unwrap();
    assert_eq!(dup.error_code, Some("DUPLICATE_USER"));
    assert_eq!(fs::read_to_string(&snapshot).unwrap(), before);

    let found = invoke_once(&d, &snapshot, "queryUserRecordByAddr", &args(&["0xabc"])).unwrap();
    assert!(String::from_utf8(found.payload).unwrap().contains("\"userName\":\"jack\""));
}
