// crates/socratic-bench-cli/src/main.rs
// ============================================================================
// Module: Socratic Bench CLI Entry Point
// Description: Command dispatcher for planner triggers and the worker host.
// Purpose: Provide a thin local shell over the pipeline host.
// Dependencies: clap, serde_json, socratic-bench-core, socratic-bench-pipeline
// ============================================================================

//! ## Overview
//! The CLI wraps [`socratic_bench_pipeline::PipelineHost`] with three
//! commands: `plan` triggers the planner once (exit code zero only when
//! every run job was enqueued), `serve` runs the worker pools with an
//! optional periodic planner, and `status` prints a read-only inspection of
//! one run. Serve mode runs until the process is terminated; state lives in
//! the data directory, so a restart resumes cleanly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::Parser;
use clap::Subcommand;
use socratic_bench_core::RunId;
use socratic_bench_pipeline::HostConfig;
use socratic_bench_pipeline::PipelineHost;

// ============================================================================
// SECTION: CLI Definition
// ============================================================================

/// Socratic benchmark pipeline host.
#[derive(Parser, Debug)]
#[command(name = "socratic-bench", version, about)]
struct Cli {
    /// Path to the host configuration TOML.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Command to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Trigger the planner once and report the outcome.
    Plan {
        /// Re-enqueue jobs for runs that are still pending.
        #[arg(long)]
        force: bool,
    },
    /// Run the worker pools (and the periodic planner, when configured).
    Serve,
    /// Inspect one run.
    Status {
        /// Run identifier to inspect.
        #[arg(long)]
        run: String,
    },
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(message) => {
            let _ = write_stderr_line(&message);
            ExitCode::FAILURE
        }
    }
}

/// Executes the CLI command dispatcher.
fn run(cli: Cli) -> Result<ExitCode, String> {
    let config = HostConfig::load(cli.config.as_ref()).map_err(|err| err.to_string())?;
    let host = PipelineHost::build(config).map_err(|err| err.to_string())?;

    match cli.command {
        Commands::Plan {
            force,
        } => command_plan(&host, force),
        Commands::Serve => command_serve(&host),
        Commands::Status {
            run,
        } => command_status(&host, &run),
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes the `plan` command.
fn command_plan(host: &PipelineHost, force: bool) -> Result<ExitCode, String> {
    let outcome = host.plan(force).map_err(|err| err.to_string())?;
    let rendered =
        serde_json::to_string_pretty(&outcome).map_err(|err| err.to_string())?;
    write_stdout_line(&rendered).map_err(|err| err.to_string())?;
    if outcome.enqueue_failures == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Executes the `serve` command.
///
/// Serve mode runs until the process is terminated; the worker set stays
/// alive for the lifetime of the loop.
fn command_serve(host: &PipelineHost) -> Result<ExitCode, String> {
    let _workers = host.start_workers();
    write_stderr_line("workers started; terminate the process to stop")
        .map_err(|err| err.to_string())?;

    let tick = Duration::from_secs(30);
    let mut since_plan = Duration::ZERO;
    loop {
        thread::sleep(tick);
        let Some(interval) = host.planner_interval() else {
            continue;
        };
        since_plan += tick;
        if since_plan >= interval {
            since_plan = Duration::ZERO;
            match host.plan(false) {
                Ok(outcome) => {
                    if outcome.enqueued > 0 {
                        let line = format!(
                            "planner: {} new runs enqueued for manifest {}",
                            outcome.enqueued, outcome.manifest_id
                        );
                        write_stderr_line(&line).map_err(|err| err.to_string())?;
                    }
                }
                Err(err) => {
                    write_stderr_line(&format!("planner trigger failed: {err}"))
                        .map_err(|render_err| render_err.to_string())?;
                }
            }
        }
    }
}

/// Executes the `status` command.
fn command_status(host: &PipelineHost, run: &str) -> Result<ExitCode, String> {
    let run_id = RunId::new(run);
    match host.inspect_run(&run_id).map_err(|err| err.to_string())? {
        Some(inspection) => {
            let rendered =
                serde_json::to_string_pretty(&inspection).map_err(|err| err.to_string())?;
            write_stdout_line(&rendered).map_err(|err| err.to_string())?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            write_stderr_line(&format!("run not found: {run}")).map_err(|err| err.to_string())?;
            Ok(ExitCode::FAILURE)
        }
    }
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes one line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes one line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}
