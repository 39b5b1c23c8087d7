//! Run configuration.
//!
//! Everything here is loaded once at startup and passed around by reference.
//! All sections have built-in defaults, so the YAML file is optional and may
//! override only the parts it names:
//!
//! ```yaml
//! sources:
//!   concurrency: 4
//! classifier:
//!   year_range: [2016, 2030]
//! sponsors:
//!   aliases:
//!     "maga inc": "MAGA INC"
//! heatmap:
//!   top_n: 25
//! ```

use crate::error::{PipelineError, PipelineResult};
use crate::models::Office;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, instrument};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub sources: SourcesConfig,
    pub classifier: ClassifierPolicy,
    pub sponsors: SponsorTableConfig,
    pub heatmap: HeatmapConfig,
}

/// Where stations and feeds come from, and how hard to hit them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub station_list_url: String,
    pub facility_search_url: String,
    pub public_file_base_url: String,
    pub user_agent: String,
    /// Maximum number of in-flight requests.
    pub concurrency: usize,
    pub timeout_secs: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            station_list_url:
                "https://en.wikipedia.org/wiki/List_of_urban-format_radio_stations_in_the_United_States"
                    .to_string(),
            facility_search_url: "https://publicfiles.fcc.gov/api/service/facility/search/"
                .to_string(),
            public_file_base_url: "https://publicfiles.fcc.gov".to_string(),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            concurrency: 8,
            timeout_secs: 30,
        }
    }
}

/// A path label that selects an office.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OfficeKeyword {
    pub keyword: String,
    /// Office label to assign; defaults to the keyword itself.
    #[serde(default)]
    pub office: Option<String>,
}

impl OfficeKeyword {
    pub fn new(keyword: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            office: None,
        }
    }

    pub fn office(&self) -> Office {
        Office::from_label(self.office.as_deref().unwrap_or(&self.keyword))
    }
}

/// Rules the classifier applies to filing paths.
///
/// Office keywords are tried in order and the first one found among the path
/// segments wins, so more specific labels must come first.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassifierPolicy {
    pub political_files_prefix: String,
    pub political_matters_prefixes: Vec<String>,
    pub office_keywords: Vec<OfficeKeyword>,
    /// Keywords that group other offices (`Federal/US Senate/...`).
    pub containers: Vec<String>,
    pub year_range: (u16, u16),
    /// Entries whose title contains any of these are dropped at fetch time.
    pub skip_titles: Vec<String>,
    /// Top-level folders that are known not to be political.
    pub non_political_categories: Vec<String>,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self {
            political_files_prefix: "Political Files".to_string(),
            political_matters_prefixes: vec![
                "Political Matters and Controversial Issues Disclosures".to_string(),
                "Political Matters".to_string(),
            ],
            office_keywords: [
                "US Senate",
                "US House",
                "President",
                "Non-Candidate Issue Ads",
                "State",
                "Local",
                "Federal",
            ]
            .into_iter()
            .map(OfficeKeyword::new)
            .collect(),
            containers: vec!["Federal".to_string(), "State".to_string(), "Local".to_string()],
            year_range: (2015, 2030),
            skip_titles: vec!["Issues and Programs Lists".to_string()],
            non_political_categories: [
                "Issues and Programs Lists",
                "EEO Reports",
                "Annual EEO Public File Report",
                "Ownership Reports",
                "FCC Applications",
                "Local Public Notice Announcements",
                "Citizen Agreements",
                "Letters and Emails from the Public",
                "Children's Television Programming Reports",
                "Contour Maps",
                "Shared Service Agreements",
                "Joint Sales Agreements",
                "Time Brokerage Agreements",
                "Donor Lists",
                "Material Relating to FCC Investigation or Complaint",
                "Sponsorship Identification",
                "Additional Documents",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// A regex over the folded sponsor key and the name it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SponsorPattern {
    pub pattern: String,
    pub canonical: String,
}

/// The manual sponsor equivalence table plus casing rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SponsorTableConfig {
    /// Folded key → canonical name.
    pub aliases: BTreeMap<String, String>,
    /// Tried in order after `aliases`.
    pub patterns: Vec<SponsorPattern>,
    /// Words kept upper-case in the display form.
    pub acronyms: Vec<String>,
    /// Words kept lower-case unless they start the name.
    pub small_words: Vec<String>,
}

impl Default for SponsorTableConfig {
    fn default() -> Self {
        let presidential = [
            (
                "Kamala Harris for President",
                &[
                    r"^kamala harris for president",
                    r"^harris for president",
                    r"^kamala harris d president",
                    r"^harris d president",
                    r"^harris-d-president",
                    r"^kamala harris$",
                ][..],
            ),
            (
                "Joe Biden for President",
                &[
                    r"^joe biden for president",
                    r"^biden for president",
                    r"^joseph biden for president",
                    r"^joe biden$",
                    r"^joseph biden$",
                    r"^biden$",
                ][..],
            ),
            (
                "Donald Trump for President",
                &[
                    r"^donald trump for president",
                    r"^donald j trump for president",
                    r"^trump for president",
                    r"^donald trump$",
                    r"^donald j trump$",
                ][..],
            ),
            (
                "Bernie Sanders for President",
                &[
                    r"^bernie sanders for president",
                    r"^sanders for president",
                    r"^bernie sanders$",
                ][..],
            ),
        ];
        let patterns = presidential
            .iter()
            .flat_map(|(canonical, patterns)| {
                patterns.iter().map(move |p| SponsorPattern {
                    pattern: p.to_string(),
                    canonical: canonical.to_string(),
                })
            })
            .collect();

        let acronyms = [
            "PAC", "INC", "LLC", "USA", "US", "MAGA", "NAACP", "DNC", "RNC", "GOP", "FEC", "EEO",
            "NC", "DC", "LA", "NY", "CA", "TX", "FL", "VA", "MD", "GA", "MI", "OH", "PA", "AZ",
            "NV", "WI", "MN", "CO", "OR", "WA", "MA", "NJ", "CT", "IL", "TN", "SC", "ACTUM", "YES",
            "NO", "PROP", "DA", "CEO", "CFO", "VP", "AG", "HD", "FM", "AM", "TV", "AI", "II",
            "III",
        ];
        let small_words = [
            "for", "of", "the", "and", "in", "on", "at", "to", "a", "an", "as", "but", "by", "nor",
            "so", "yet", "vs", "v",
        ];

        Self {
            aliases: BTreeMap::new(),
            patterns,
            acronyms: acronyms.into_iter().map(String::from).collect(),
            small_words: small_words.into_iter().map(String::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeatmapConfig {
    pub top_n: usize,
    pub min_ads: u64,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self { top_n: 40, min_ads: 1 }
    }
}

impl Config {
    /// Load the YAML file at `path`, or the defaults when no path is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> PipelineResult<Config> {
        let Some(path) = path else {
            info!("No config file given; using built-in defaults");
            return Ok(Config::default());
        };
        let text = std::fs::read_to_string(path)?;
        let config = Config::from_yaml(&text)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> PipelineResult<Config> {
        let config: Config = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> PipelineResult<()> {
        let (lo, hi) = self.classifier.year_range;
        if lo > hi {
            return Err(PipelineError::Config(format!(
                "year_range start {lo} is after end {hi}"
            )));
        }
        if self.sources.concurrency == 0 {
            return Err(PipelineError::Config("sources.concurrency must be at least 1".to_string()));
        }
        if self.classifier.office_keywords.is_empty() {
            return Err(PipelineError::Config("classifier.office_keywords is empty".to_string()));
        }
        for (name, value) in [
            ("station_list_url", &self.sources.station_list_url),
            ("facility_search_url", &self.sources.facility_search_url),
            ("public_file_base_url", &self.sources.public_file_base_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| PipelineError::Config(format!("sources.{name} {value:?}: {e}")))?;
        }
        Ok(())
    }
}
