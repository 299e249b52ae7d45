//! cvstest scenario runner.
//!
//! Builds synthetic CVS repositories, converts them with the converter under
//! test, and compares the results with CVS checkouts. Fixture failures stop
//! the run with a nonzero exit; comparison findings are reported and, unless
//! `--strict` is given, leave the exit status at zero.

mod scenarios;
mod style;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use cvstest_core::{ConversionMode, HarnessConfig, Verbosity};

use crate::scenarios::{Findings, Scenario, CATALOGUE};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Fixture-driven correctness harness for CVS-to-Git conversion.
#[derive(Parser, Debug)]
#[command(name = "cvstest", version, about)]
struct Cli {
    /// Use the legacy conversion path (`git cvsimport`) instead of fast-export.
    #[arg(short = 'o')]
    legacy: bool,

    /// Keep scratch repositories, checkouts and converted trees.
    #[arg(short = 'n')]
    retain: bool,

    /// Increase verbosity; repeat for more detail.
    #[arg(short = 'v', action = ArgAction::Count)]
    verbose: u8,

    /// Optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Exit nonzero when any comparison finding is reported.
    #[arg(long)]
    strict: bool,

    /// List the available scenarios and exit.
    #[arg(long)]
    list: bool,

    /// Scenarios to run (default: all).
    scenarios: Vec<String>,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.verbosity);

    match run(&cli, &config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbosity: Verbosity) {
    let default = match verbosity {
        Verbosity::Quiet => "warn",
        Verbosity::Steps => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Defaults, then the config file, then command-line flags.
fn build_config(cli: &Cli) -> Result<HarnessConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            HarnessConfig::load_from_file(path).context("failed to load configuration file")?
        }
        None => HarnessConfig::default(),
    };
    if cli.legacy {
        config.conversion = ConversionMode::Legacy;
    }
    config.retain |= cli.retain;
    config.strict |= cli.strict;
    config.verbosity = config.verbosity.max(Verbosity::from_count(cli.verbose));
    config.converter_verbose = config
        .converter_verbose
        .max(Verbosity::converter_flags_for_count(cli.verbose));
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn select(names: &[String]) -> Result<Vec<&'static Scenario>> {
    if names.is_empty() {
        return Ok(CATALOGUE.iter().collect());
    }
    names
        .iter()
        .map(|name| {
            scenarios::find(name).with_context(|| {
                let known: Vec<&str> = CATALOGUE.iter().map(|s| s.name).collect();
                format!("unknown scenario '{}' (known: {})", name, known.join(", "))
            })
        })
        .collect()
}

/// Run the selected scenarios. Returns whether the exit status should be 0.
fn run(cli: &Cli, config: &HarnessConfig) -> Result<bool> {
    if cli.list {
        for scenario in CATALOGUE {
            println!("{:<10} {}", scenario.name, style::dim(scenario.description));
        }
        return Ok(true);
    }

    let selected = select(&cli.scenarios)?;
    let mut total_failures = 0;
    for scenario in selected {
        println!();
        println!(
            "{}",
            style::header(&format!("{}: {}", scenario.name, scenario.description))
        );
        let findings = (scenario.run)(config)
            .with_context(|| format!("scenario '{}' failed", scenario.name))?;
        report(&findings);
        total_failures += findings.failures().len();
    }

    if config.retain {
        println!();
        println!(
            "{}",
            style::warn(&format!(
                "Scratch directories retained in {}",
                config.base_dir().display()
            ))
        );
    }

    Ok(total_failures == 0 || !config.strict)
}

fn report(findings: &Findings) {
    for failure in findings.failures() {
        println!("  {}", style::error(failure));
    }
    let summary = format!("{} of {} checks passed", findings.passed(), findings.checks());
    if findings.is_clean() {
        println!("  {}", style::success(&summary));
    } else {
        println!("  {}", style::warn(&summary));
    }
}
