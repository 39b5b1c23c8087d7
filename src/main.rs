//! # FCC Political Ads
//!
//! Tracks political advertising on urban-format radio stations by scraping
//! each station's FCC public inspection file feed, classifying the filings,
//! standardizing sponsor names, and rendering a sponsor × station heatmap.
//!
//! ## Usage
//!
//! ```sh
//! fcc_political_ads --data-dir ./data --site-dir ./site run
//! ```
//!
//! ## Architecture
//!
//! The application is a sequence of file-to-file stages:
//! 1. **Resolve**: station list page → FCC facility search → feed URLs
//! 2. **Fetch**: download every feed (parallel, bounded) and merge into the archive
//! 3. **Tag**: derive record type, office, year and sponsor from each filing path
//! 4. **Standardize**: collapse sponsor spelling variants to one canonical name
//! 5. **Export / Render**: aggregate counts and write the static heatmap site
//!
//! Scheduling (e.g. twice daily) is left to cron or CI.

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod classify;
mod cli;
mod config;
mod error;
mod models;
mod outputs;
mod pipeline;
mod scrapers;
mod sponsors;
mod utils;

use cli::{Cli, Command};
use config::Config;
use pipeline::DataPaths;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "fcc_political_ads starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.data_dir, ?args.site_dir, ?args.config, ?args.command, "Parsed CLI arguments");

    // Config is loaded once and shared by reference with every stage
    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };

    // Early check: ensure output dirs are writable
    for dir in [&args.data_dir, &args.site_dir] {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir.display(),
                error = %e,
                "Output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e.into());
        }
    }

    let paths = DataPaths::new(args.data_dir.clone(), args.site_dir.clone());
    let result = match args.command {
        Command::Resolve => pipeline::resolve(&config, &paths).await.map(|_| ()),
        Command::Fetch => pipeline::fetch(&config, &paths).await.map(|_| ()),
        Command::Tag => pipeline::tag(&config, &paths).await.map(|_| ()),
        Command::Standardize => pipeline::standardize(&config, &paths).await.map(|_| ()),
        Command::Export => pipeline::export(&paths).await.map(|_| ()),
        Command::Render { top_n, min_ads } => pipeline::render(&config, &paths, top_n, min_ads)
            .await
            .map(|_| ()),
        Command::Run => pipeline::run_all(&config, &paths).await,
    };

    let elapsed = start_time.elapsed();
    match result {
        Ok(()) => {
            info!(
                elapsed_secs = elapsed.as_secs_f64(),
                elapsed_ms = elapsed.as_millis(),
                "fcc_political_ads completed successfully"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, elapsed_secs = elapsed.as_secs_f64(), "fcc_political_ads failed");
            Err(e.into())
        }
    }
}
