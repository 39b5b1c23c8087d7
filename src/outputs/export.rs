//! Reduce normalized records to the aggregate file the heatmap page loads.

use crate::models::{AggregateRow, DateRange, HeatmapExport, NormalizedRecord, RecordType, StationLocation};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// HTML entity left behind by a feed that was escaped twice.
static ENTITY_ARTIFACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(?:#\d+|#x[0-9a-fA-F]+|[A-Za-z]+);").unwrap());
/// Uploader fragment that leaked into a sponsor name.
static UPLOADER_FRAGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bentity \d+").unwrap());

/// Grouping key, ordered so the rows come out sorted.
type RowKey = (String, String, Option<String>, Option<u16>, RecordType);

/// Whether a record belongs in the export.
pub fn is_exportable(record: &NormalizedRecord) -> bool {
    let tagged = &record.tagged;
    if !tagged.record_type.is_political() || tagged.station.is_none() {
        return false;
    }
    let Some(sponsor) = record.sponsor_normalized.as_deref() else {
        return false;
    };
    let raw_sponsor = tagged.sponsor.as_deref().unwrap_or("");
    !(ENTITY_ARTIFACT.is_match(&tagged.raw.title)
        || ENTITY_ARTIFACT.is_match(sponsor)
        || ENTITY_ARTIFACT.is_match(raw_sponsor)
        || UPLOADER_FRAGMENT.is_match(sponsor))
}

/// Parse a feed timestamp: RFC 3339 (Atom), RFC 2822 (RSS) or a bare `YYYY-MM-DD`.
pub fn parse_feed_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_rfc2822(s))
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|d| d.and_utc())
        })
}

/// Count exportable records per (sponsor, station, office, year, type).
///
/// Output depends only on the input records, apart from `generated_at`.
#[instrument(level = "info", skip_all, fields(count = records.len()))]
pub fn aggregate(records: &[NormalizedRecord], generated_at: String) -> HeatmapExport {
    let mut counts: BTreeMap<RowKey, u64> = BTreeMap::new();
    let mut stations: BTreeMap<String, StationLocation> = BTreeMap::new();
    let mut span: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
    let mut dropped = 0usize;
    let mut undated = 0usize;

    for record in records {
        if !is_exportable(record) {
            dropped += 1;
            continue;
        }
        let tagged = &record.tagged;
        let (Some(station), Some(sponsor)) = (&tagged.station, &record.sponsor_normalized) else {
            continue;
        };
        let key = (
            sponsor.clone(),
            station.clone(),
            tagged.office.as_ref().map(|o| o.label().to_string()),
            tagged.year,
            tagged.record_type,
        );
        *counts.entry(key).or_default() += 1;

        match parse_feed_date(&tagged.raw.updated) {
            Some(at) => {
                span = Some(match span {
                    Some((first, last)) => (first.min(at), last.max(at)),
                    None => (at, at),
                });
            }
            None => undated += 1,
        }

        // First record with a location wins.
        let location = stations.entry(station.clone()).or_default();
        if location.state.is_none() {
            location.state = tagged.raw.state.clone();
        }
        if location.city.is_none() {
            location.city = tagged.raw.city.clone();
        }
    }

    let rows: Vec<AggregateRow> = counts
        .into_iter()
        .map(|((sponsor, station, office, year, record_type), count)| AggregateRow {
            sponsor,
            station,
            office,
            year,
            record_type,
            count,
        })
        .collect();

    let date_range = span.map(|(first, last)| DateRange {
        first: first.to_rfc3339_opts(SecondsFormat::Secs, true),
        last: last.to_rfc3339_opts(SecondsFormat::Secs, true),
    });

    debug!(dropped, undated, "Records left out of export");
    info!(rows = rows.len(), stations = stations.len(), "Aggregated export");
    HeatmapExport {
        generated_at,
        date_range,
        stations,
        rows,
    }
}
