//! Filing classification.
//!
//! FCC feed titles look like
//!
//! ```text
//! Entity 54321 uploaded file Invoice 1234 in Political Files/2024/Federal/US Senate/Jane Doe for Senate on Oct 1, 2024
//! ```
//!
//! The part between `" in "` and the trailing `" on <date>"` is the folder
//! path inside the station's public file. Its first segment decides the
//! record type; for political files the remaining segments give the year,
//! the office and (sometimes) the sponsor.
//!
//! Everything here is a pure function of the input record and the
//! [`ClassifierPolicy`]. Unrecognized titles never fail: they come back as
//! `non_political` with a gap reason and a count of the fields that could
//! not be filled.

use crate::config::ClassifierPolicy;
use crate::error::PipelineError;
use crate::models::{Office, RawFilingRecord, RecordType, TaggedRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

static PROFILE_CALL_SIGN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/(?:am|fm)-profile/([a-z0-9-]+)").unwrap());
static TITLE_CALL_SIGN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([KW][A-Z]{2,3}(?:-(?:AM|FM))?)\b").unwrap());
static FACILITY_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"Entity (\d+)").unwrap());
static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(20\d{2})\b").unwrap());

const POLITICAL_MATTERS_LABEL: &str = "Political Matters";
/// Category bucket for titles that carry no path.
pub const NO_PATH_CATEGORY: &str = "(no path)";

/// Fields derived from a filing path alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFields {
    pub record_type: RecordType,
    pub year: Option<u16>,
    pub office: Option<Office>,
    pub sponsor: Option<String>,
    /// Top-level folder of the path.
    pub category: Option<String>,
    /// Set when the path did not match any known layout.
    pub gap: Option<String>,
}

/// A tagged record plus what could not be filled in.
#[derive(Debug)]
pub struct TagOutcome {
    pub record: TaggedRecord,
    /// Number of expected fields (path, station, year) left empty.
    pub unmatched: usize,
    /// Top-level folder, when the title had a path.
    pub category: Option<String>,
    pub gap: Option<PipelineError>,
}

/// Counters reported after a tagging pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagStats {
    pub total: usize,
    pub by_type: BTreeMap<RecordType, usize>,
    pub stations_extracted: usize,
    pub years_extracted: usize,
    pub gaps: usize,
    pub unmatched_fields: usize,
    /// Non-political records per top-level folder.
    pub non_political_categories: BTreeMap<String, usize>,
}

impl TagStats {
    fn record(&mut self, outcome: &TagOutcome) {
        let record = &outcome.record;
        self.total += 1;
        *self.by_type.entry(record.record_type).or_default() += 1;
        if record.station.is_some() {
            self.stations_extracted += 1;
        }
        if record.year.is_some() {
            self.years_extracted += 1;
        }
        if outcome.gap.is_some() {
            self.gaps += 1;
        }
        self.unmatched_fields += outcome.unmatched;
        if record.record_type == RecordType::NonPolitical {
            let category = outcome.category.as_deref().unwrap_or(NO_PATH_CATEGORY);
            *self.non_political_categories.entry(category.to_string()).or_default() += 1;
        }
    }

    pub fn count(&self, record_type: RecordType) -> usize {
        self.by_type.get(&record_type).copied().unwrap_or(0)
    }
}

/// Applies a [`ClassifierPolicy`] to raw records.
#[derive(Debug)]
pub struct Classifier<'a> {
    policy: &'a ClassifierPolicy,
}

impl<'a> Classifier<'a> {
    pub fn new(policy: &'a ClassifierPolicy) -> Self {
        Self { policy }
    }

    /// Tag every record, in input order.
    #[instrument(level = "info", skip_all, fields(count = records.len()))]
    pub fn classify_all(&self, records: &[RawFilingRecord]) -> (Vec<TaggedRecord>, TagStats) {
        let mut stats = TagStats::default();
        let mut tagged = Vec::with_capacity(records.len());
        for raw in records {
            let outcome = self.classify(raw);
            if let Some(gap) = &outcome.gap {
                debug!(error = %gap, "Classification gap");
            }
            stats.record(&outcome);
            tagged.push(outcome.record);
        }
        info!(
            total = stats.total,
            political_ad = stats.count(RecordType::PoliticalAd),
            political_matters = stats.count(RecordType::PoliticalMatters),
            non_political = stats.count(RecordType::NonPolitical),
            gaps = stats.gaps,
            "Tagged records"
        );
        (tagged, stats)
    }

    /// Tag one record.
    pub fn classify(&self, raw: &RawFilingRecord) -> TagOutcome {
        let file_path = self.extract_file_path(&raw.title);
        let fields = match file_path.as_deref() {
            Some(path) => self.classify_path(path),
            None => PathFields {
                record_type: RecordType::NonPolitical,
                year: None,
                office: None,
                sponsor: None,
                category: None,
                gap: Some("title carries no file path".to_string()),
            },
        };
        let station = extract_station(raw);

        let mut unmatched = 0;
        if file_path.is_none() {
            unmatched += 1;
        }
        if station.is_none() {
            unmatched += 1;
        }
        if fields.year.is_none() {
            unmatched += 1;
        }

        let gap = fields.gap.map(|reason| PipelineError::ClassificationGap {
            id: raw.id.clone(),
            reason,
        });

        TagOutcome {
            record: TaggedRecord {
                raw: raw.clone(),
                record_type: fields.record_type,
                facility_id: extract_facility_id(&raw.title),
                station,
                year: fields.year,
                office: fields.office,
                sponsor: fields.sponsor,
                file_path,
            },
            unmatched,
            category: fields.category,
            gap,
        }
    }

    /// Pull the folder path out of a feed title.
    ///
    /// A title that already starts with a known category is taken as the path.
    /// Otherwise the path starts after the first `" in "` that is followed by
    /// a configured category, or after the first `" in "` when none is.
    pub fn extract_file_path(&self, title: &str) -> Option<String> {
        let title = title.trim();
        let after_in = if self.starts_with_known_category(title) {
            title
        } else {
            let first = title.split_once(" in ")?.1;
            title
                .match_indices(" in ")
                .map(|(idx, sep)| &title[idx + sep.len()..])
                .find(|rest| self.starts_with_any_category(rest))
                .unwrap_or(first)
        };
        let path = match after_in.rfind(" on ") {
            Some(idx) => &after_in[..idx],
            None => after_in,
        };
        let path = path.trim();
        (!path.is_empty()).then(|| path.to_string())
    }

    fn starts_with_known_category(&self, title: &str) -> bool {
        strip_category(title, &self.policy.political_files_prefix).is_some()
            || self
                .policy
                .political_matters_prefixes
                .iter()
                .any(|p| strip_category(title, p).is_some())
    }

    fn starts_with_any_category(&self, text: &str) -> bool {
        std::iter::once(&self.policy.political_files_prefix)
            .chain(&self.policy.political_matters_prefixes)
            .chain(&self.policy.non_political_categories)
            .any(|category| starts_with_label(text, category))
    }

    /// Classify a folder path.
    pub fn classify_path(&self, path: &str) -> PathFields {
        let year = self.extract_year(path);
        let category = path
            .split('/')
            .next()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from);

        if let Some(rest) = self
            .policy
            .political_matters_prefixes
            .iter()
            .find_map(|p| strip_category(path, p))
        {
            let segments = strip_year_segment(split_segments(rest));
            return PathFields {
                record_type: RecordType::PoliticalMatters,
                year,
                office: Some(Office::Other(POLITICAL_MATTERS_LABEL.to_string())),
                sponsor: segments.last().map(|s| s.to_string()),
                category,
                gap: None,
            };
        }

        if let Some(rest) = strip_category(path, &self.policy.political_files_prefix) {
            let segments = strip_year_segment(split_segments(rest));
            let (office, sponsor) = self.office_and_sponsor(&segments);
            return PathFields {
                record_type: RecordType::PoliticalAd,
                year,
                office: Some(office),
                sponsor,
                category,
                gap: None,
            };
        }

        let known = category.as_deref().is_some_and(|c| {
            self.policy
                .non_political_categories
                .iter()
                .any(|known| known.eq_ignore_ascii_case(c))
        });
        let gap = (!known).then(|| {
            format!(
                "unrecognized category {:?}",
                category.as_deref().unwrap_or_default()
            )
        });
        PathFields {
            record_type: RecordType::NonPolitical,
            year,
            office: None,
            sponsor: None,
            category,
            gap,
        }
    }

    /// Pick the office segment and the sponsor segment that follows it.
    fn office_and_sponsor(&self, segments: &[&str]) -> (Office, Option<String>) {
        if segments.is_empty() {
            return (Office::Other(Office::OTHER_LABEL.to_string()), None);
        }

        let keyword_hit = self.policy.office_keywords.iter().find_map(|kw| {
            segments
                .iter()
                .position(|s| s.eq_ignore_ascii_case(kw.keyword.trim()))
                .map(|idx| (idx, kw))
        });

        let (idx, office) = match keyword_hit {
            Some((idx, kw)) => {
                let is_container = self
                    .policy
                    .containers
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(kw.keyword.trim()));
                if is_container && idx + 2 < segments.len() {
                    (idx + 1, Office::from_label(segments[idx + 1]))
                } else {
                    (idx, kw.office())
                }
            }
            None => {
                let idx = segments.len().saturating_sub(2);
                (idx, Office::from_label(segments[idx]))
            }
        };

        let sponsor = segments.get(idx + 1).map(|s| s.to_string());
        (office, sponsor)
    }

    fn extract_year(&self, path: &str) -> Option<u16> {
        let (lo, hi) = self.policy.year_range;
        YEAR.captures_iter(path)
            .filter_map(|c| c[1].parse::<u16>().ok())
            .find(|y| (lo..=hi).contains(y))
    }
}

/// Return what follows `prefix` when `path` is exactly that category or a
/// folder under it.
fn strip_category<'p>(path: &'p str, prefix: &str) -> Option<&'p str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest.trim_start_matches('/'))
    } else {
        None
    }
}

/// Whether `text` opens with `label` (ASCII case-insensitive) followed by a
/// folder separator, a space or nothing.
fn starts_with_label(text: &str, label: &str) -> bool {
    let Some(head) = text.get(..label.len()) else {
        return false;
    };
    let tail = &text[label.len()..];
    head.eq_ignore_ascii_case(label) && (tail.is_empty() || tail.starts_with('/') || tail.starts_with(' '))
}

fn split_segments(rest: &str) -> Vec<&str> {
    rest.split('/').map(str::trim).filter(|s| !s.is_empty()).collect()
}

fn strip_year_segment(mut segments: Vec<&str>) -> Vec<&str> {
    let leading_year = segments
        .first()
        .is_some_and(|s| s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()));
    if leading_year {
        segments.remove(0);
    }
    segments
}

/// Call sign from the profile URL of the entry, falling back to the title.
pub fn extract_station(raw: &RawFilingRecord) -> Option<String> {
    [Some(raw.id.as_str()), Some(raw.url.as_str()), raw.station_url.as_deref()]
        .into_iter()
        .flatten()
        .find_map(|s| PROFILE_CALL_SIGN.captures(s).map(|c| c[1].to_uppercase()))
        .or_else(|| TITLE_CALL_SIGN.captures(&raw.title).map(|c| c[1].to_string()))
}

pub fn extract_facility_id(title: &str) -> Option<u64> {
    FACILITY_ID.captures(title).and_then(|c| c[1].parse().ok())
}
