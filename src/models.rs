//! Data models for filings, stations and the exported heatmap view.
//!
//! Records move through the pipeline in three shapes:
//! - [`RawFilingRecord`]: one feed entry as fetched
//! - [`TaggedRecord`]: a raw record plus the fields pulled out of its title
//! - [`NormalizedRecord`]: a tagged record plus its standardized sponsor
//!
//! Each shape embeds the previous one with `#[serde(flatten)]`, so the JSON
//! files stay flat. Optional fields are skipped when absent.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single FCC public file feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawFilingRecord {
    /// Feed entry id (the FCC file URL).
    pub id: String,
    /// Entry title, e.g. `"Entity 1234 uploaded file in Political Files/2024/... on ..."`.
    pub title: String,
    /// Link to the uploaded document.
    pub url: String,
    /// Timestamp as published by the feed.
    pub updated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// The feed URL this entry was fetched from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_url: Option<String>,
}

/// Top-level category of a filing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    PoliticalAd,
    PoliticalMatters,
    NonPolitical,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::PoliticalAd => "political_ad",
            RecordType::PoliticalMatters => "political_matters",
            RecordType::NonPolitical => "non_political",
        }
    }

    pub fn is_political(&self) -> bool {
        !matches!(self, RecordType::NonPolitical)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Office or filing bucket a political ad was filed under.
///
/// Serialized as its label. Labels that are not one of the known offices
/// are kept verbatim in [`Office::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum Office {
    President,
    UsSenate,
    UsHouse,
    State,
    Local,
    NonCandidateIssueAds,
    Other(String),
}

impl Office {
    pub const OTHER_LABEL: &'static str = "Other";

    pub fn label(&self) -> &str {
        match self {
            Office::President => "President",
            Office::UsSenate => "US Senate",
            Office::UsHouse => "US House",
            Office::State => "State",
            Office::Local => "Local",
            Office::NonCandidateIssueAds => "Non-Candidate Issue Ads",
            Office::Other(label) => label,
        }
    }

    /// Map a path segment to an office. Known labels match case-insensitively.
    pub fn from_label(label: &str) -> Office {
        let trimmed = label.trim();
        match trimmed.to_lowercase().as_str() {
            "president" => Office::President,
            "us senate" | "u.s. senate" => Office::UsSenate,
            "us house" | "u.s. house" => Office::UsHouse,
            "state" => Office::State,
            "local" => Office::Local,
            "non-candidate issue ads" => Office::NonCandidateIssueAds,
            "" => Office::Other(Self::OTHER_LABEL.to_string()),
            _ => Office::Other(trimmed.to_string()),
        }
    }
}

impl From<String> for Office {
    fn from(label: String) -> Self {
        Office::from_label(&label)
    }
}

impl From<Office> for String {
    fn from(office: Office) -> Self {
        office.label().to_string()
    }
}

impl fmt::Display for Office {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A raw record with the classification fields filled in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TaggedRecord {
    #[serde(flatten)]
    pub raw: RawFilingRecord,
    pub record_type: RecordType,
    pub facility_id: Option<u64>,
    pub station: Option<String>,
    pub year: Option<u16>,
    pub office: Option<Office>,
    /// Absent for category-level filings; that is the common case.
    pub sponsor: Option<String>,
    pub file_path: Option<String>,
}

/// A tagged record with its canonical sponsor name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NormalizedRecord {
    #[serde(flatten)]
    pub tagged: TaggedRecord,
    pub sponsor_normalized: Option<String>,
}

/// One row of the resolved station table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StationEntry {
    pub state: String,
    pub city: String,
    /// Station name as listed in the source page, e.g. `"WAOK-AM"`.
    pub station: String,
    pub format: String,
    pub call_sign: Option<String>,
    pub facility_id: Option<u64>,
    /// FCC service code (`AM`, `FM`, `TV`).
    pub service: Option<String>,
    pub city_match: bool,
    pub state_match: bool,
    pub rss_url: Option<String>,
    pub http_status: Option<u16>,
}

impl StationEntry {
    /// A station is worth fetching when it has a feed URL that did not fail its status check.
    pub fn is_fetchable(&self) -> bool {
        match (&self.rss_url, self.http_status) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(_), Some(status)) => (200..300).contains(&status),
        }
    }
}

/// Location of a station, used by the heatmap's state filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StationLocation {
    pub state: Option<String>,
    pub city: Option<String>,
}

/// One aggregated cell of the export: ad count for a sponsor at a station.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AggregateRow {
    pub sponsor: String,
    pub station: String,
    pub office: Option<String>,
    pub year: Option<u16>,
    pub record_type: RecordType,
    pub count: u64,
}

/// Earliest and latest filing timestamps in an export, UTC RFC 3339.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DateRange {
    pub first: String,
    pub last: String,
}

/// The file consumed by the heatmap page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HeatmapExport {
    pub generated_at: String,
    /// Absent when no exported filing had a parseable date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    pub stations: BTreeMap<String, StationLocation>,
    pub rows: Vec<AggregateRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawFilingRecord {
        RawFilingRecord {
            id: "https://publicfiles.fcc.gov/fm-profile/WXYZ-FM/political-files/abc.pdf".to_string(),
            title: "Entity 12345 uploaded file in Political Files/2024/US Senate/Jane Doe on Oct 1"
                .to_string(),
            url: "https://publicfiles.fcc.gov/api/manager/download/abc.pdf".to_string(),
            updated: "2024-10-01T12:00:00-04:00".to_string(),
            state: None,
            city: None,
            station_url: None,
        }
    }

    #[test]
    fn test_office_labels_roundtrip_known_values() {
        for label in [
            "President",
            "US Senate",
            "US House",
            "State",
            "Local",
            "Non-Candidate Issue Ads",
        ] {
            let office = Office::from_label(label);
            assert!(!matches!(office, Office::Other(_)), "{label} should be known");
            assert_eq!(office.label(), label);
        }
        assert_eq!(Office::from_label("us senate"), Office::UsSenate);
        assert_eq!(Office::from_label("Governor"), Office::Other("Governor".to_string()));
        assert_eq!(Office::from_label("  "), Office::Other("Other".to_string()));
    }

    #[test]
    fn test_office_serializes_as_label() {
        let json = serde_json::to_string(&Office::NonCandidateIssueAds).unwrap();
        assert_eq!(json, "\"Non-Candidate Issue Ads\"");
        let office: Office = serde_json::from_str("\"Mayor\"").unwrap();
        assert_eq!(office, Office::Other("Mayor".to_string()));
    }

    #[test]
    fn test_raw_record_skips_missing_location() {
        let json = serde_json::to_string(&raw()).unwrap();
        assert!(!json.contains("state"));
        assert!(!json.contains("station_url"));
    }

    #[test]
    fn test_raw_record_ignores_legacy_fields() {
        let json = r#"{
            "id": "a", "title": "t", "url": "u", "updated": "x",
            "facility_id": 5, "office": "US House", "sponsor": "junk on Oct 1"
        }"#;
        let record: RawFilingRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "a");
        assert_eq!(record.state, None);
    }

    #[test]
    fn test_normalized_record_is_flat() {
        let record = NormalizedRecord {
            tagged: TaggedRecord {
                raw: raw(),
                record_type: RecordType::PoliticalAd,
                facility_id: Some(12345),
                station: Some("WXYZ-FM".to_string()),
                year: Some(2024),
                office: Some(Office::UsSenate),
                sponsor: Some("Jane Doe".to_string()),
                file_path: Some("Political Files/2024/US Senate/Jane Doe".to_string()),
            },
            sponsor_normalized: Some("Jane Doe".to_string()),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["record_type"], "political_ad");
        assert_eq!(value["office"], "US Senate");
        assert_eq!(value["station"], "WXYZ-FM");
        assert_eq!(value["id"], record.tagged.raw.id);

        let back: NormalizedRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_station_fetchable() {
        let mut entry = StationEntry {
            rss_url: Some("https://publicfiles.fcc.gov/am-profile/WAOK/rss".to_string()),
            ..Default::default()
        };
        assert!(entry.is_fetchable());
        entry.http_status = Some(404);
        assert!(!entry.is_fetchable());
        entry.http_status = Some(200);
        assert!(entry.is_fetchable());
        entry.rss_url = None;
        assert!(!entry.is_fetchable());
    }
}
