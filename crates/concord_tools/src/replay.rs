#![forbid(unsafe_code)]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use concord_os::{Dispatcher, InvocationResponse};
use concord_storage::ledger::{InMemoryLedger, LedgerCensus};
use concord_storage::repo::LedgerRepo;
use serde::Deserialize;

use crate::error::ToolError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptStep {
    pub op: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberedStep {
    pub line: usize,
    pub step: ScriptStep,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    /// One rendered result per invocation, in script order.
    pub lines: Vec<String>,
    pub failures: usize,
    pub digest: String,
    /// Document counts of the final ledger.
    pub census: LedgerCensus,
}

impl ReplayReport {
    pub fn render(&self) -> String {
        let mut out = String::new();
        for l in &self.lines {
            out.push_str(l);
            out.push('\n');
        }
        out.push_str("digest ");
        out.push_str(&self.digest);
        out.push('\n');
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOptions {
    pub script: PathBuf,
    pub ledger: Option<PathBuf>,
    pub save: bool,
}

/// One `{"op": "...", "args": [...]}` object per line; blank lines and `#`
/// comments are skipped. The whole script is parsed before anything runs.
pub fn parse_script(text: &str) -> Result<Vec<NumberedStep>, ToolError> {
    let mut steps = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let step: ScriptStep = serde_json::from_str(trimmed).map_err(|e| ToolError::Script {
            line: idx + 1,
            reason: e.to_string(),
        })?;
        steps.push(NumberedStep {
            line: idx + 1,
            step,
        });
    }
    Ok(steps)
}

pub fn render_response(resp: &InvocationResponse) -> String {
    if resp.is_ok() {
        if resp.payload.is_empty() {
            "ok".to_string()
        } else {
            format!("ok {}", String::from_utf8_lossy(&resp.payload))
        }
    } else {
        format!(
            "err {} {}",
            resp.error_code.unwrap_or("UNKNOWN"),
            resp.message
        )
    }
}

pub fn run_steps(
    dispatcher: &Dispatcher,
    repo: &mut LedgerRepo<InMemoryLedger>,
    steps: &[NumberedStep],
) -> ReplayReport {
    let mut lines = Vec::with_capacity(steps.len());
    let mut failures = 0;
    for s in steps {
        let resp = dispatcher.invoke(repo, &s.step.op, &s.step.args);
        if !resp.is_ok() {
            failures += 1;
            tracing::debug!(line = s.line, op = %s.step.op, "script step failed");
        }
        lines.push(render_response(&resp));
    }
    ReplayReport {
        lines,
        failures,
        digest: repo.store().state_digest(),
        census: repo.store().census(),
    }
}

pub fn replay(dispatcher: &Dispatcher, opts: &ReplayOptions) -> Result<ReplayReport, ToolError> {
    let text = fs::read_to_string(&opts.script).map_err(|source| ToolError::Io {
        path: opts.script.clone(),
        source,
    })?;
    let steps = parse_script(&text)?;
    let ledger = match &opts.ledger {
        Some(path) => load_ledger(path)?,
        None => InMemoryLedger::new_in_memory(),
    };
    let mut repo = LedgerRepo::new(ledger);
    let report = run_steps(dispatcher, &mut repo, &steps);
    tracing::info!(
        steps = steps.len(),
        failures = report.failures,
        digest = %report.digest,
        data_records = report.census.data_records,
        user_records = report.census.user_records,
        untyped = report.census.untyped,
        "replay finished"
    );
    if opts.save {
        if let Some(path) = &opts.ledger {
            save_ledger(path, repo.store())?;
        }
    }
    Ok(report)
}

/// Runs one invocation against `snapshot` and writes the ledger back only
/// when it succeeds.
pub fn invoke_once(
    dispatcher: &Dispatcher,
    snapshot: &Path,
    op: &str,
    args: &[String],
) -> Result<InvocationResponse, ToolError> {
    let mut repo = LedgerRepo::new(load_ledger(snapshot)?);
    let resp = dispatcher.invoke(&mut repo, op, args);
    if resp.is_ok() {
        save_ledger(snapshot, repo.store())?;
    }
    Ok(resp)
}

/// A snapshot path that does not exist yet starts an empty ledger.
pub fn load_ledger(path: &Path) -> Result<InMemoryLedger, ToolError> {
    match fs::read_to_string(path) {
        Ok(text) => InMemoryLedger::from_snapshot_json(&text).map_err(|fault| ToolError::Snapshot {
            path: path.to_path_buf(),
            fault,
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(InMemoryLedger::new_in_memory()),
        Err(source) => Err(ToolError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub fn save_ledger(path: &Path, ledger: &InMemoryLedger) -> Result<(), ToolError> {
    let text = ledger.to_snapshot_json().map_err(|fault| ToolError::Snapshot {
        path: path.to_path_buf(),
        fault,
    })?;
    let mut staged = path.as_os_str().to_owned();
    staged.push(".tmp");
    let staged = PathBuf::from(staged);
    fs::write(&staged, text).map_err(|source| ToolError::Io {
        path: staged.clone(),
        source,
    })?;
    fs::rename(&staged, path).map_err(|source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), keys = ledger.len(), "snapshot saved");
    Ok(())
}
