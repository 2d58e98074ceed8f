//! clockke CLI - live tick source, record verifier, and manifest tooling.
//!
//! ```text
//! clockke run     [--tick-ms MS] [--ticks N] [--out PATH] [--stress S] [--noise A] [--resume]
//! clockke verify  <RECORDS>
//! clockke manifest [--write PATH]
//! ```
//!
//! Every subcommand accepts `--manifest PATH`. Without it the manifest comes from
//! `CLOCKKE_MANIFEST`, then `~/.clockke/manifest.toml`, then the built-in default.
//!
//! Exit status: 0 on success, 1 when verification fails, 2 on usage, config, or IO errors.

mod console;
mod run;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use clockke_config::{ClockkeConfig, to_toml};
use clockke_core::verify;
use clockke_store::{atomic_write, read_records};

use crate::run::{RunArgs, RunPlan};

const EXIT_VERIFY_FAILED: u8 = 1;
const EXIT_ERROR: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "clockke", version, about = "Symbolic clock kernel with a tamper-evident stamp chain")]
struct Cli {
    /// Manifest TOML file (overrides CLOCKKE_MANIFEST and ~/.clockke/manifest.toml)
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Tick on a fixed cadence, appending stamped records to a file
    Run(RunArgs),
    /// Re-derive every field of a stored record file and check the chain
    Verify {
        /// CSV or JSON-lines record file
        records: PathBuf,
    },
    /// Print the active manifest as TOML
    Manifest {
        /// Write it to PATH instead (atomic replace)
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

/// Logs go to stderr so stdout carries only tool output.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let config = ClockkeConfig::load(cli.manifest.as_deref()).context("failed to load manifest")?;
    tracing::debug!(source = %config.source.describe(), "configuration resolved");

    match cli.command {
        Command::Run(args) => {
            let plan = RunPlan::new(&config, &args)?;
            run::run(plan).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify { records } => verify_file(&records, &config),
        Command::Manifest { write } => {
            let text = to_toml(&config.manifest, &config.run).context("failed to render manifest")?;
            match write {
                Some(path) => {
                    atomic_write(&path, text.as_bytes())
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    tracing::info!(path = %path.display(), "manifest written");
                }
                None => print!("{text}"),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn verify_file(path: &Path, config: &ClockkeConfig) -> Result<ExitCode> {
    let rows = read_records(path)?;
    tracing::info!(path = %path.display(), rows = rows.len(), "verifying records");
    let report = verify(&rows, &config.manifest);
    println!("{}", report.render());

    Ok(if report.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_VERIFY_FAILED)
    })
}
