//! Everything written to disk.
//!
//! # Submodules
//!
//! - [`json`]: atomic JSON/text writers and readers for the stage files
//! - [`export`]: reduces normalized records to the aggregate heatmap file
//! - [`heatmap`]: sponsor × station matrix and the static HTML page
//! - [`reports`]: plain-text summaries of tagging and sponsor merging
//!
//! # Output Structure
//!
//! ```text
//! data_dir/
//! ├── stations.json                 # resolved station table
//! ├── radio_ads.json                # raw archive, upserted by id
//! ├── radio_ads_tagged.json
//! ├── radio_ads_standardized.json
//! ├── sponsor_mapping.json
//! └── reports/
//!     ├── tagging_report.txt
//!     ├── non_political_report.txt
//!     └── sponsor_standardization_report.txt
//!
//! site_dir/
//! ├── heatmap.json                  # aggregate rows, compact
//! └── index.html
//! ```
//!
//! Every file is rewritten whole on each run.

pub mod export;
pub mod heatmap;
pub mod json;
pub mod reports;
