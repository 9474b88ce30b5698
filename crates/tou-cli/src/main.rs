//! `tou-scheduler` - keep a Powerwall time-of-use schedule in step with
//! Intelligent Octopus dispatches.
//!
//! ## Usage
//!
//! ```sh
//! # Run with config.txt and IO-Update-Powerwall-Schedule.log in the working directory
//! tou-scheduler
//!
//! # Explicit config and log file
//! tou-scheduler /etc/powerwall/config.txt /var/log/powerwall-schedule.log
//!
//! # Find the energy site ID to put in TESLA_SITE_ID
//! tou-scheduler --list-sites
//! ```
//!
//! Intended to run from cron every few minutes. The controller is only updated
//! when the computed schedule differs from the last one published.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tou_cli::settings::tessie_api_key;
use tou_cli::tessie::{list_energy_sites, TESSIE_API_BASE};
use tou_cli::{execute, write_template, RunOutcome, Settings};
use tou_engine::PublishDecision;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "tou-scheduler",
    version,
    about = "Update a Powerwall time-of-use schedule from Octopus pricing windows"
)]
struct Cli {
    /// Configuration file (a template is written if it does not exist)
    #[arg(default_value = "config.txt")]
    config: PathBuf,

    /// Run history log, appended to on every run
    #[arg(default_value = "IO-Update-Powerwall-Schedule.log")]
    log_file: PathBuf,

    /// List the energy sites on the Tessie account and exit
    #[arg(long)]
    list_sites: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if !cli.config.exists() {
        write_template(&cli.config).with_context(|| {
            format!("Failed to write config template: {}", cli.config.display())
        })?;
        bail!(
            "Config file {} did not exist. A template has been written, edit it before the next run",
            cli.config.display()
        );
    }

    if cli.list_sites {
        return list_sites(&cli.config);
    }

    let settings = Settings::load(&cli.config)
        .with_context(|| format!("Invalid config file: {}", cli.config.display()))?;
    init_logging(&settings, &cli.log_file)?;
    for key in &settings.unknown_keys {
        debug!(%key, "ignoring unknown configuration key");
    }

    let now = Utc::now().with_timezone(&settings.schedule.timezone);
    match execute(&settings, now)? {
        RunOutcome::Disabled => println!("Kill switch is off. Nothing to do"),
        RunOutcome::Completed(report) => {
            for block in &report.schedule.blocks {
                println!("{}", block);
            }
            println!("{}", describe(report.outcome.decision));
        }
    }

    Ok(())
}

fn describe(decision: PublishDecision) -> &'static str {
    match decision {
        PublishDecision::Unchanged => "No change in slots. Do nothing",
        PublishDecision::Published => "Powerwall schedule updated",
        PublishDecision::WouldPublish => "Read-only mode: Powerwall schedule not updated",
    }
}

/// Stderr always, plus the run-history file unless read-only.
fn init_logging(settings: &Settings, log_file: &Path) -> Result<()> {
    let level = if settings.debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let file_layer = if settings.schedule.read_only {
        None
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .with_context(|| format!("Failed to open log file: {}", log_file.display()))?;
        Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file)),
        )
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(file_layer)
        .with(level)
        .init();
    Ok(())
}

fn list_sites(config: &Path) -> Result<()> {
    let api_key = tessie_api_key(config)
        .with_context(|| format!("Invalid config file: {}", config.display()))?;
    let client = reqwest::blocking::Client::new();
    let sites = list_energy_sites(&client, TESSIE_API_BASE, &api_key)
        .context("Failed to list Tessie energy sites")?;

    if sites.is_empty() {
        println!("No energy sites on this Tessie account");
    }
    for site in sites {
        match site.name {
            Some(name) => println!("TESLA_SITE_ID {}  # {}", site.id, name),
            None => println!("TESLA_SITE_ID {}", site.id),
        }
    }
    Ok(())
}
