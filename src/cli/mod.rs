//! CLI module for the Kuri compiler core
//!
//! The parser lives outside this crate; the CLI reads the JSON documents it produces.
//!
//! ## Commands
//!
//! - `check <ast.json>...` - Validate and print diagnostics
//! - `emit <ast.json>...` - Validate, then write the generated C to stdout or `-o`
//!
//! ## Modules
//!
//! - `load` - JSON AST documents
//! - `report` - miette rendering of diagnostics
//!
//! Exit codes: `0` on success, `1` when the program has diagnostics or an input cannot be read,
//! `2` on an internal compiler fault.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod load;
pub mod report;

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use kuri_core::runtime;
use thiserror::Error;

use crate::backend::{self, CodegenFault};
use crate::config::CompileConfig;
use crate::frontend::scheduler::{self, ValidatedProgram};
pub use load::LoadError;

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
    pub const FAULT: ExitCode = ExitCode(2);
}

/// Error type for CLI operations.
///
/// Diagnostics in the compiled program are not errors here: they are reported and turned into
/// [`ExitCode::FAILURE`] by the command itself.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("cannot write `{path}`: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("internal compiler fault: {0}")]
    Fault(#[from] CodegenFault),
}

impl CliError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Fault(_) => ExitCode::FAULT,
            CliError::Load(_) | CliError::Write { .. } => ExitCode::FAILURE,
        }
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Kuri compiler core: semantic validation and C generation
#[derive(Parser, Debug)]
#[command(name = "kuri")]
#[command(version = VERSION)]
#[command(about = "Validate parsed Kuri modules and lower them to C", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate the program and print its diagnostics
    Check(CompileArgs),

    /// Validate the program and write the generated C
    Emit {
        #[command(flatten)]
        args: CompileArgs,
        /// Output file (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        /// Do not emit the C `main` wrapper
        #[arg(long = "no-main")]
        no_main: bool,
    },
}

/// Options shared by every command.
#[derive(Args, Debug)]
pub struct CompileArgs {
    /// JSON AST documents, one module or a list of modules each
    #[arg(value_name = "AST_JSON", required = true)]
    pub inputs: Vec<PathBuf>,
    /// Validation worker threads
    #[arg(short = 'j', long = "jobs", value_name = "N", default_value_t = 1)]
    pub jobs: usize,
    /// Name of the function the generated `main` calls
    #[arg(long = "entry", value_name = "NAME", default_value = runtime::ENTRY_POINT)]
    pub entry: String,
    /// Do not emit type-info descriptors
    #[arg(long = "no-reflection")]
    pub no_reflection: bool,
}

impl CompileArgs {
    pub fn config(&self) -> CompileConfig {
        CompileConfig::default()
            .with_workers(self.jobs)
            .with_entry_point(self.entry.clone())
            .with_reflection(!self.no_reflection)
    }
}

/// Parse the arguments, run the command and exit with its code.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code != ExitCode::SUCCESS {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(e.exit_code().0);
        }
    }
}

/// Execute the CLI command and return result.
pub fn execute(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Command::Check(args) => check(&args),
        Command::Emit { args, output, no_main } => emit(&args, output, no_main),
    }
}

fn compile(args: &CompileArgs, config: &CompileConfig) -> CliResult<ValidatedProgram> {
    let mut files = Vec::new();
    for input in &args.inputs {
        files.extend(load::load_file(input)?);
    }
    Ok(scheduler::validate(files, config))
}

fn check(args: &CompileArgs) -> CliResult<ExitCode> {
    let program = compile(args, &args.config())?;
    if program.has_errors() {
        report::print_diagnostics(&program);
        return Ok(ExitCode::FAILURE);
    }
    tracing::info!(units = program.units.len(), "program is valid");
    Ok(ExitCode::SUCCESS)
}

fn emit(args: &CompileArgs, output: Option<PathBuf>, no_main: bool) -> CliResult<ExitCode> {
    let config = args.config().with_main_wrapper(!no_main);
    let program = compile(args, &config)?;
    if program.has_errors() {
        report::print_diagnostics(&program);
        return Ok(ExitCode::FAILURE);
    }
    let c = backend::generate(&program, &config)?;
    match output {
        Some(path) => fs::write(&path, c).map_err(|source| CliError::Write { path, source })?,
        None => io::stdout()
            .write_all(c.as_bytes())
            .map_err(|source| CliError::Write {
                path: PathBuf::from("<stdout>"),
                source,
            })?,
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_check() {
        let cli = Cli::try_parse_from(["kuri", "check", "a.json", "b.json"]).unwrap();
        let Command::Check(args) = cli.command else {
            panic!("Expected Check command");
        };
        assert_eq!(args.inputs.len(), 2);
        assert_eq!(args.jobs, 1);
        assert_eq!(args.entry, "principale");
    }

    #[test]
    fn test_cli_parse_emit() {
        let cli = Cli::try_parse_from([
            "kuri",
            "emit",
            "a.json",
            "-o",
            "out.c",
            "--jobs",
            "4",
            "--no-reflection",
        ])
        .unwrap();
        let Command::Emit { args, output, no_main } = cli.command else {
            panic!("Expected Emit command");
        };
        assert_eq!(output, Some(PathBuf::from("out.c")));
        assert!(!no_main);
        let config = args.config();
        assert_eq!(config.workers, 4);
        assert!(!config.emit_reflection);
    }

    #[test]
    fn test_cli_requires_input() {
        assert!(Cli::try_parse_from(["kuri", "check"]).is_err());
    }

    #[test]
    fn test_fault_exit_code() {
        let err = CliError::from(CodegenFault::NotValidated(3));
        assert_eq!(err.exit_code(), ExitCode::FAULT);
        assert!(err.to_string().starts_with("internal compiler fault: "));
    }
}
