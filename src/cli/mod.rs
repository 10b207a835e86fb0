//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::suite::DEFAULT_SCHEMA_PATH;

/// Declarative test-suite scheduling and execution engine
#[derive(Parser, Debug)]
#[command(name = "spindle")]
#[command(version = "0.1.0")]
#[command(about = "Run declarative test suites against registered test classes")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a suite file and report per-method results
    Run(RunArgs),

    /// Load and normalise a suite file without executing it
    Validate(ValidateArgs),

    /// List registered test classes and their methods
    List(ListArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Suite definition file (.json, .yaml or .yml)
    #[arg(short, long)]
    pub suite: PathBuf,

    /// Suite schema file
    #[arg(long, default_value = DEFAULT_SCHEMA_PATH)]
    pub schema: PathBuf,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Disable ANSI colour in table output
    #[arg(long)]
    pub no_color: bool,
}

/// Arguments for validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Suite definition file (.json, .yaml or .yml)
    #[arg(short, long)]
    pub suite: PathBuf,

    /// Suite schema file
    #[arg(long, default_value = DEFAULT_SCHEMA_PATH)]
    pub schema: PathBuf,

    /// Output dialect for the canonical document (json, yaml)
    #[arg(short, long, default_value = "json")]
    pub format: String,
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Restrict the listing to classes selected by a suite file
    #[arg(short, long)]
    pub suite: Option<PathBuf>,

    /// Suite schema file
    #[arg(long, default_value = DEFAULT_SCHEMA_PATH)]
    pub schema: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args() {
        let args = Args::parse_from([
            "spindle",
            "run",
            "--suite",
            "nightly.yaml",
            "--format",
            "json",
            "--no-color",
        ]);
        match args.command {
            Command::Run(run_args) => {
                assert_eq!(run_args.suite, PathBuf::from("nightly.yaml"));
                assert_eq!(run_args.format, "json");
                assert!(run_args.no_color);
                assert_eq!(run_args.schema, PathBuf::from(DEFAULT_SCHEMA_PATH));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_list_args_default() {
        let args = Args::parse_from(["spindle", "list"]);
        match args.command {
            Command::List(list_args) => {
                assert!(list_args.suite.is_none());
            }
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_global_verbose_flag() {
        let args = Args::parse_from(["spindle", "list", "--verbose"]);
        assert!(args.verbose);
    }
}
