// crates/xqts-cli/src/main.rs
// ============================================================================
// Module: XQTS CLI Entry Point
// Description: Command dispatcher for catalog runs and config validation.
// Purpose: Run conformance catalogs against recorded engine outcomes.
// Dependencies: clap, thiserror, xqts-runner
// ============================================================================

//! ## Overview
//! `xqts run` loads the harness config, a case catalog and a recording of
//! engine outcomes, runs every case across the worker pool and prints one
//! line per non-passing case plus a summary. The exit status is a failure
//! when any case failed or faulted. `xqts config validate` checks a config
//! file and fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use thiserror::Error;
use xqts_runner::CaseReport;
use xqts_runner::CaseRunner;
use xqts_runner::CaseStatus;
use xqts_runner::DirectoryFixtureLoader;
use xqts_runner::HarnessConfig;
use xqts_runner::ReplayEngine;
use xqts_runner::RunSummary;
use xqts_runner::TestCatalog;
use xqts_runner::run_cases_with_sink;
use xqts_runner::sink_from_config;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "xqts", disable_help_subcommand = true, version)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a case catalog against recorded engine outcomes.
    Run(RunCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for the `run` command.
#[derive(Args, Debug)]
struct RunCommand {
    /// Case catalog (TOML, or JSON by `.json` extension).
    #[arg(long, value_name = "PATH")]
    catalog: PathBuf,
    /// Recorded engine outcomes (JSON).
    #[arg(long, value_name = "PATH")]
    recorded: PathBuf,
    /// Optional config file path (defaults to xqts.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Only run cases whose name starts with this prefix.
    #[arg(long, value_name = "PREFIX")]
    filter: Option<String>,
    /// Worker thread count (overrides `run.workers`).
    #[arg(long, value_name = "N")]
    workers: Option<usize>,
    /// Accept any classified failure for every error-code assertion.
    #[arg(long, action = ArgAction::SetTrue)]
    lenient_error_codes: bool,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a harness configuration file.
    Validate(ConfigValidateCommand),
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to xqts.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying a user-facing message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(command) => command_run(command),
        Commands::Config {
            command,
        } => match command {
            ConfigCommand::Validate(command) => command_config_validate(&command),
        },
    }
}

// ============================================================================
// SECTION: Run Command
// ============================================================================

/// Executes the `run` command.
fn command_run(command: RunCommand) -> CliResult<ExitCode> {
    let mut config = HarnessConfig::load_or_default(command.config.as_deref())
        .map_err(|err| CliError::new(format!("Failed to load config: {err}")))?;
    if let Some(workers) = command.workers {
        config.run.workers = workers;
    }
    if command.filter.is_some() {
        config.run.filter = command.filter;
    }
    if command.lenient_error_codes {
        config.run.lenient_error_codes = true;
    }
    config.validate().map_err(|err| CliError::new(format!("Invalid run options: {err}")))?;

    let mut catalog = TestCatalog::load(&command.catalog, &config.defaults.query_options())
        .map_err(|err| CliError::new(format!("Failed to load catalog: {err}")))?;
    if let Some(prefix) = &config.run.filter {
        catalog = catalog.filtered(prefix);
    }
    let engine = ReplayEngine::load(&command.recorded)
        .map_err(|err| CliError::new(format!("Failed to load recordings: {err}")))?;
    let fixtures = DirectoryFixtureLoader::from_config(&config.fixtures);
    let sink = sink_from_config(&config.report)
        .map_err(|err| CliError::new(format!("Failed to open report sink: {err}")))?;

    let runner = CaseRunner::new(&engine, &fixtures)
        .with_eval_options(config.run.eval_options())
        .with_validation(config.run.validation());
    let reports = run_cases_with_sink(&runner, catalog.cases(), config.run.workers, sink.as_ref());

    for report in reports.iter().filter(|report| !report.status.is_pass()) {
        write_stdout_line(&render_report(report))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    let summary = RunSummary::from_reports(&reports);
    write_stdout_line(&summary.to_string())
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(if summary.is_clean() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Renders one non-passing report as a single line.
fn render_report(report: &CaseReport) -> String {
    let detail = match &report.status {
        CaseStatus::Pass => String::new(),
        CaseStatus::Fail {
            diagnostics,
        } => diagnostics.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "),
        CaseStatus::HarnessFault {
            cause,
        } => cause.to_string(),
    };
    format!("{} {}: {detail}", report.status.label(), report.name)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let _config = HarnessConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("Failed to load config: {err}")))?;
    write_stdout_line("Config valid")
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("Failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
