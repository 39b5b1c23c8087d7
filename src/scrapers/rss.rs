//! Station feed fetcher.
//!
//! Public file feeds are served as RSS 2.0; Atom is accepted as well. Each
//! entry becomes a [`RawFilingRecord`] tagged with the station's state, city
//! and feed URL. Malformed entries and entries without a title are skipped,
//! as are entries whose
//! title matches one of the configured skip phrases (quarterly issues and
//! programs lists dominate the feeds and carry no ad data).

use crate::error::{PipelineError, PipelineResult};
use crate::models::{RawFilingRecord, StationEntry};
use crate::scrapers::get_text;
use crate::utils::truncate_for_log;
use futures::stream::{self, StreamExt};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    guid: Option<Text>,
    #[serde(rename = "pubDate", default)]
    pub_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    #[serde(default)]
    title: Option<Text>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    updated: Option<String>,
    #[serde(default)]
    published: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@rel", default)]
    rel: Option<String>,
}

/// Element text, ignoring attributes such as `isPermaLink` or `type`.
#[derive(Debug, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

/// A feed entry before it is attached to a station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub id: String,
    pub title: String,
    pub url: String,
    pub updated: String,
}

/// Parse an RSS or Atom document.
///
/// Items are deserialized one at a time, so a malformed item is logged and
/// skipped without losing the rest of the feed.
pub fn parse_feed(xml: &str) -> PipelineResult<Vec<FeedEntry>> {
    let (entries, skipped, malformed) = if xml.contains("<rss") {
        let (items, malformed) = parse_elements::<RssItem>(xml, "item")?;
        let (entries, skipped) = collect_entries(items.into_iter().map(|item| {
            let link = item.link.unwrap_or_default().trim().to_string();
            let id = item
                .guid
                .map(|g| g.value.trim().to_string())
                .filter(|g| !g.is_empty())
                .unwrap_or_else(|| link.clone());
            (id, item.title, link, item.pub_date)
        }));
        (entries, skipped, malformed)
    } else if xml.contains("<feed") {
        let (items, malformed) = parse_elements::<AtomEntry>(xml, "entry")?;
        let (entries, skipped) = collect_entries(items.into_iter().map(|entry| {
            let link = entry
                .links
                .iter()
                .find(|l| l.rel.as_deref().is_none_or(|r| r == "alternate"))
                .or(entry.links.first())
                .map(|l| l.href.trim().to_string())
                .unwrap_or_default();
            let id = entry
                .id
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty())
                .unwrap_or_else(|| link.clone());
            (id, entry.title.map(|t| t.value), link, entry.updated.or(entry.published))
        }));
        (entries, skipped, malformed)
    } else {
        return Err(PipelineError::parse("feed", "document is neither RSS nor Atom"));
    };
    if malformed > 0 {
        warn!(malformed, kept = entries.len(), "Skipped malformed feed entries");
    }
    if skipped > 0 {
        warn!(skipped, "Skipped feed entries without title or id");
    }
    Ok(entries)
}

/// Deserialize every `<tag>` element on its own. Returns the parsed
/// elements and the number that failed.
fn parse_elements<T: DeserializeOwned>(xml: &str, tag: &str) -> PipelineResult<(Vec<T>, usize)> {
    let mut parsed = Vec::new();
    let mut malformed = 0;
    for fragment in element_fragments(xml, tag)? {
        match quick_xml::de::from_str::<T>(fragment) {
            Ok(element) => parsed.push(element),
            Err(e) => {
                malformed += 1;
                debug!(tag, error = %e, fragment = %truncate_for_log(fragment, 200), "Malformed feed entry");
            }
        }
    }
    Ok((parsed, malformed))
}

/// Source text of each `<tag>...</tag>` element, matched on local name.
fn element_fragments<'x>(xml: &'x str, tag: &str) -> PipelineResult<Vec<&'x str>> {
    let mut reader = Reader::from_str(xml);
    let mut fragments = Vec::new();
    loop {
        let start = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == tag.as_bytes() => {
                let end = e.to_end().into_owned();
                reader
                    .read_to_end(end.name())
                    .map_err(|err| PipelineError::parse("feed", err))?;
                let stop = reader.buffer_position() as usize;
                if let Some(fragment) = xml.get(start..stop) {
                    fragments.push(fragment);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(PipelineError::parse("feed", e)),
        }
    }
    Ok(fragments)
}

fn collect_entries(
    items: impl Iterator<Item = (String, Option<String>, String, Option<String>)>,
) -> (Vec<FeedEntry>, usize) {
    let mut skipped = 0;
    let mut entries = Vec::new();
    for (id, title, url, updated) in items {
        let title = title.map(|t| t.trim().to_string()).unwrap_or_default();
        if title.is_empty() || id.is_empty() {
            skipped += 1;
            continue;
        }
        entries.push(FeedEntry {
            id,
            title,
            url,
            updated: updated.map(|u| u.trim().to_string()).unwrap_or_default(),
        });
    }
    (entries, skipped)
}

/// Turn feed entries into raw records for `station`, dropping skipped titles.
pub fn to_records(
    entries: Vec<FeedEntry>,
    station: &StationEntry,
    skip_titles: &[String],
) -> Vec<RawFilingRecord> {
    entries
        .into_iter()
        .filter(|e| !skip_titles.iter().any(|skip| e.title.contains(skip.as_str())))
        .map(|e| RawFilingRecord {
            id: e.id,
            title: e.title,
            url: e.url,
            updated: e.updated,
            state: Some(station.state.clone()).filter(|s| !s.is_empty()),
            city: Some(station.city.clone()).filter(|c| !c.is_empty()),
            station_url: station.rss_url.clone(),
        })
        .collect()
}

/// Fetch and parse one station's feed.
#[instrument(level = "info", skip_all, fields(station = %station.station))]
pub async fn fetch_station(
    client: &reqwest::Client,
    station: &StationEntry,
    skip_titles: &[String],
) -> PipelineResult<Vec<RawFilingRecord>> {
    let Some(url) = station.rss_url.as_deref() else {
        return Ok(Vec::new());
    };
    let body = get_text(client, url).await?;
    let entries = parse_feed(&body)?;
    let total = entries.len();
    let records = to_records(entries, station, skip_titles);
    debug!(total, kept = records.len(), "Parsed station feed");
    Ok(records)
}

/// Fetch every fetchable station. Failed stations are logged and skipped.
///
/// Records come back grouped by station in the order of `stations`.
#[instrument(level = "info", skip_all, fields(stations = stations.len()))]
pub async fn fetch_all(
    client: &reqwest::Client,
    stations: &[StationEntry],
    skip_titles: &[String],
    concurrency: usize,
) -> (Vec<RawFilingRecord>, usize) {
    let mut results: Vec<(usize, Option<Vec<RawFilingRecord>>)> =
        stream::iter(stations.iter().enumerate().filter(|(_, s)| s.is_fetchable()))
            .map(|(i, station)| async move {
                match fetch_station(client, station, skip_titles).await {
                    Ok(records) => (i, Some(records)),
                    Err(e) if e.is_skippable() => {
                        warn!(station = %station.station, error = %e, "Feed fetch failed; skipping station");
                        (i, None)
                    }
                    Err(e) => {
                        error!(station = %station.station, error = %e, "Feed fetch failed");
                        (i, None)
                    }
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
    results.sort_by_key(|(i, _)| *i);

    let failed = results.iter().filter(|(_, r)| r.is_none()).count();
    let records: Vec<RawFilingRecord> = results.into_iter().filter_map(|(_, r)| r).flatten().collect();
    info!(count = records.len(), failed, "Fetched station feeds");
    (records, failed)
}

/// Counts from merging fresh records into the archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub replaced: usize,
}

/// Upsert `fresh` into `archive` by id.
///
/// Existing records keep their position; a re-fetched entry replaces the
/// archived copy, new entries are appended in fetch order.
pub fn merge_archive(
    mut archive: Vec<RawFilingRecord>,
    fresh: Vec<RawFilingRecord>,
) -> (Vec<RawFilingRecord>, MergeStats) {
    let mut index: HashMap<String, usize> = archive
        .iter()
        .enumerate()
        .map(|(i, r)| (r.id.clone(), i))
        .collect();
    let mut stats = MergeStats::default();
    for record in fresh {
        match index.get(&record.id) {
            Some(&i) => {
                archive[i] = record;
                stats.replaced += 1;
            }
            None => {
                index.insert(record.id.clone(), archive.len());
                archive.push(record);
                stats.added += 1;
            }
        }
    }
    (archive, stats)
}
