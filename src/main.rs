//! # Offline Geo Index Builder
//!
//! ## Purpose
//! Command-line driver for the flat-file indexer: reads the extracted ODI
//! FLAT_CMPL complaint dump and installs the offline geo index the
//! dashboard core reads at query time.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration file, CLI overrides for input/output paths
//! - **Output**: Installed geo index plus processed/skipped counters
//! - **Exit**: Nonzero only when the input or output location is unusable;
//!   malformed lines are skipped and reported, never fatal
//!
//! ## Architecture Flow
//! 1. Parse command line arguments and load configuration
//! 2. Initialize logging and tracing
//! 3. Stream the dump, aggregating per-state counts by vehicle
//! 4. Install the index atomically and report the counters

use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use defect_intel::config::Config;
use defect_intel::geo::FlatFileIndexer;

fn main() -> anyhow::Result<()> {
    let matches = Command::new("defect-intel-indexer")
        .version("0.1.0")
        .author("Legal Intake Team")
        .about("Builds the offline geo state-count index from the ODI FLAT_CMPL dump")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .help("Complaint dump path (overrides configuration)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Geo index destination (overrides configuration)"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only log warnings and errors")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config.toml");
    let mut config = Config::from_file(config_path)
        .with_context(|| format!("loading configuration from {}", config_path))?;

    if let Some(input) = matches.get_one::<String>("input") {
        config.indexer.input_path = PathBuf::from(input);
    }
    if let Some(output) = matches.get_one::<String>("output") {
        config.geo_index.db_path = PathBuf::from(output);
    }

    init_logging(&config, matches.get_flag("quiet"))?;

    info!(
        "Building geo index from {:?} into {:?}",
        config.indexer.input_path, config.geo_index.db_path
    );

    let indexer = FlatFileIndexer::new(config.indexer.clone(), config.geo_index.db_path.clone());
    let stats = indexer.run().context("geo index build failed")?;

    println!(
        "Done: {} lines read, {} records indexed, {} lines skipped, {} vehicle groups",
        stats.lines_read, stats.records_indexed, stats.lines_skipped, stats.vehicle_groups
    );

    Ok(())
}

/// Initialize logging and tracing
fn init_logging(config: &Config, quiet: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "warn"
    } else {
        config.logging.level.as_str()
    };
    let filter = EnvFilter::try_new(level)
        .with_context(|| format!("invalid log level '{}'", level))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if config.logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}
