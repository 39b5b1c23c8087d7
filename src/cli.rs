//! Command-line interface definitions.
//!
//! This module defines the CLI arguments and subcommands using the `clap` crate.
//! Directory and config options can also be provided via environment variables.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the political ad pipeline.
///
/// Each stage reads the previous stage's file from the data directory, so
/// stages can be re-run on their own.
///
/// # Examples
///
/// ```sh
/// # Full refresh
/// fcc_political_ads run
///
/// # Re-tag the existing archive with a custom policy
/// fcc_political_ads --config policy.yaml tag
///
/// # Re-render with a wider matrix
/// fcc_political_ads --site-dir ./public render --top-n 80
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory holding the stage files and reports
    #[arg(short, long, env = "FCC_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Output directory for heatmap.json and index.html
    #[arg(short, long, env = "FCC_SITE_DIR", default_value = "site")]
    pub site_dir: PathBuf,

    /// Optional path to a YAML config overriding the built-in defaults
    #[arg(short, long, env = "FCC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Build stations.json from the station list and the FCC facility search
    Resolve,
    /// Fetch every station feed and merge into radio_ads.json
    Fetch,
    /// Classify records and write radio_ads_tagged.json
    Tag,
    /// Standardize sponsor names and write radio_ads_standardized.json
    Standardize,
    /// Aggregate political records into the site's heatmap.json
    Export,
    /// Render index.html from heatmap.json
    Render {
        /// Sponsors shown in the default view
        #[arg(long)]
        top_n: Option<usize>,
        /// Minimum ads for a sponsor to be shown
        #[arg(long)]
        min_ads: Option<u64>,
    },
    /// Run every stage in order
    Run,
}
