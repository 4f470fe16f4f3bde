#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use concord_os::{ConcordConfig, Dispatcher};
use concord_tools::logging::init_logging;
use concord_tools::replay::{invoke_once, render_response, replay, ReplayOptions};
use concord_tools::ToolError;

#[derive(Debug, Parser)]
#[command(name = "concord", version, about = "Approval ledger local driver")]
struct Cli {
    /// JSON config file; falls back to $CONCORD_CONFIG_PATH, then defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a script of invocations and print one result line per step.
    Replay {
        script: PathBuf,
        /// Snapshot to start from (empty ledger when absent).
        #[arg(long)]
        ledger: Option<PathBuf>,
        /// Write the final ledger back to --ledger.
        #[arg(long, requires = "ledger")]
        save: bool,
    },
    /// Run a single invocation; the snapshot is saved only on success.
    Invoke {
        snapshot: PathBuf,
        op: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn main() {
    match run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("concord: {err}");
            process::exit(err.exit_code());
        }
    }
}

fn run() -> Result<i32, ToolError> {
    let cli = Cli::parse();
    let config = ConcordConfig::load_or_default(cli.config.as_deref())?;
    init_logging(&config.logging)?;
    let dispatcher = Dispatcher::from_config(&config)?;

    match cli.command {
        Command::Replay {
            script,
            ledger,
            save,
        } => {
            let report = replay(
                &dispatcher,
                &ReplayOptions {
                    script,
                    ledger,
                    save,
                },
            )?;
            print!("{}", report.render());
            Ok(0)
        }
        Command::Invoke { snapshot, op, args } => {
            let resp = invoke_once(&dispatcher, &snapshot, &op, &args)?;
            println!("{}", render_response(&resp));
            Ok(if resp.is_ok() { 0 } else { 1 })
        }
    }
}
