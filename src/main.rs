//! Spindle - Declarative Test-Suite Execution Engine
//!
//! The scheduling and orchestration core of a browser-automation product:
//! loads a declarative suite definition, resolves registered test classes,
//! and executes their methods under a two-level concurrency model.
//!
//! ## Features
//!
//! - Suite definitions in JSON or YAML, validated against a fixed schema
//! - Four parallelism modes: none, methods, classes, tests
//! - Class/method lifecycle hooks and per-class listeners
//! - Data providers expanding one method into many cases
//! - Per-method outcome map with table, JSON, CSV and summary output
//!
//! ## Usage
//!
//! ```bash
//! # Execute a suite
//! spindle run --suite nightly.yaml
//!
//! # Machine-readable results
//! spindle run --suite nightly.yaml --format json-pretty
//!
//! # Check a suite file and print its canonical form
//! spindle validate --suite nightly.yaml
//!
//! # Show registered classes and their methods
//! spindle list
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod case;
mod cli;
mod diagnostics;
mod executor;
mod models;
mod output;
mod registry;
mod suite;

use cli::Args;
use executor::run_suite_file;
use models::RunSummary;
use output::{OutputFormat, ResultFormatter};
use suite::{normalise, SuiteLoader};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    match args.command {
        cli::Command::Run(run_args) => {
            run_suite(run_args).await?;
        }
        cli::Command::Validate(validate_args) => {
            validate_suite(validate_args)?;
        }
        cli::Command::List(list_args) => {
            list_classes(list_args)?;
        }
    }

    Ok(())
}

async fn run_suite(args: cli::RunArgs) -> Result<()> {
    let format = OutputFormat::from_str(&args.format)
        .ok_or_else(|| anyhow::anyhow!("Unknown output format: {}", args.format))?;
    let mut formatter = ResultFormatter::new(format);
    if args.no_color {
        formatter = formatter.no_color();
    }

    let registry = Arc::new(diagnostics::default_registry());

    info!("Running suite {}", args.suite.display());
    let results = run_suite_file(&args.suite, &args.schema, registry).await?;

    print!("{}", formatter.format_results(&results));

    let summary = RunSummary::new(&results);
    println!("{}", formatter.format_summary(&summary));

    // Failures drive the exit code; skipped tests are non-fatal.
    if summary.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}

fn validate_suite(args: cli::ValidateArgs) -> Result<()> {
    let loader = SuiteLoader::new(&args.schema)?;
    let doc = normalise(loader.load(&args.suite)?);

    let rendered = match args.format.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::to_string(&doc).context("Failed to render suite")?,
        "json" => serde_json::to_string_pretty(&doc).context("Failed to render suite")?,
        other => anyhow::bail!("Unknown output dialect: {other}"),
    };

    println!("{rendered}");
    Ok(())
}

fn list_classes(args: cli::ListArgs) -> Result<()> {
    let registry = diagnostics::default_registry();

    let class_names: Vec<String> = match &args.suite {
        Some(suite_path) => {
            let loader = SuiteLoader::new(&args.schema)?;
            let doc = normalise(loader.load(suite_path)?);
            doc.tests
                .iter()
                .flat_map(|group| group.classes.iter())
                .map(|entry| entry.name().to_string())
                .collect()
        }
        None => {
            println!("{} registered classes\n", registry.len());
            registry.paths()
        }
    };

    for class_name in class_names {
        match registry.instantiate(&class_name) {
            Ok(instance) => {
                println!("{class_name}");
                for method in instance.descriptor().tests {
                    let marker = if method.enabled { " " } else { "-" };
                    let provider = if method.provider.is_some() {
                        " [data provider]"
                    } else {
                        ""
                    };
                    println!("  {marker} {}{provider}", method.name);
                }
            }
            Err(err) => println!("{class_name}  (unresolved: {err})"),
        }
    }

    Ok(())
}
