//! Stage entry points.
//!
//! Each stage reads the previous stage's file from disk and writes its own,
//! so any stage can be re-run alone:
//!
//! ```text
//! resolve ─► stations.json
//! fetch ───► radio_ads.json                 (merged into the existing archive)
//! tag ─────► radio_ads_tagged.json          + tagging / non-political reports
//! standardize ─► radio_ads_standardized.json + sponsor_mapping.json + report
//! export ──► site/heatmap.json
//! render ──► site/index.html
//! ```

use crate::classify::Classifier;
use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{HeatmapExport, NormalizedRecord, RawFilingRecord, StationEntry, TaggedRecord};
use crate::outputs::heatmap::{HeatmapFilter, HeatmapMatrix};
use crate::outputs::{export as exporter, heatmap, json, reports};
use crate::scrapers::{self, fcc, rss, wikipedia};
use crate::sponsors::SponsorNormalizer;
use chrono::{SecondsFormat, Utc};
use std::path::PathBuf;
use tracing::{info, instrument, warn};

/// Where every stage file lives.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub data_dir: PathBuf,
    pub site_dir: PathBuf,
}

impl DataPaths {
    pub fn new(data_dir: impl Into<PathBuf>, site_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            site_dir: site_dir.into(),
        }
    }

    pub fn stations(&self) -> PathBuf {
        self.data_dir.join("stations.json")
    }

    pub fn raw(&self) -> PathBuf {
        self.data_dir.join("radio_ads.json")
    }

    pub fn tagged(&self) -> PathBuf {
        self.data_dir.join("radio_ads_tagged.json")
    }

    pub fn standardized(&self) -> PathBuf {
        self.data_dir.join("radio_ads_standardized.json")
    }

    pub fn sponsor_mapping(&self) -> PathBuf {
        self.data_dir.join("sponsor_mapping.json")
    }

    pub fn report(&self, name: &str) -> PathBuf {
        self.data_dir.join("reports").join(name)
    }

    pub fn heatmap_json(&self) -> PathBuf {
        self.site_dir.join("heatmap.json")
    }

    pub fn index_html(&self) -> PathBuf {
        self.site_dir.join("index.html")
    }
}

/// Scrape the station list and look every station up in the FCC search.
///
/// The previous `stations.json` is left untouched when nothing resolves.
#[instrument(level = "info", skip_all)]
pub async fn resolve(config: &Config, paths: &DataPaths) -> PipelineResult<Vec<StationEntry>> {
    let client = scrapers::http_client(&config.sources)?;
    let listed = wikipedia::index_stations(&client, &config.sources.station_list_url).await?;
    if listed.is_empty() {
        return Err(PipelineError::NoStations("station list page had no entries".to_string()));
    }

    let stations = fcc::resolve_all(&client, &config.sources, &listed).await;
    let fetchable = stations.iter().filter(|s| s.is_fetchable()).count();
    if fetchable == 0 {
        return Err(PipelineError::NoStations(format!(
            "none of {} listed stations resolved to a working feed",
            listed.len()
        )));
    }
    json::write_json(&stations, &paths.stations(), true).await?;
    info!(listed = listed.len(), fetchable, "Resolve stage complete");
    Ok(stations)
}

/// Fetch every station feed and upsert the entries into the raw archive.
#[instrument(level = "info", skip_all)]
pub async fn fetch(config: &Config, paths: &DataPaths) -> PipelineResult<Vec<RawFilingRecord>> {
    let stations: Vec<StationEntry> = json::read_json(&paths.stations()).await?;
    let fetchable = stations.iter().filter(|s| s.is_fetchable()).count();
    if fetchable == 0 {
        return Err(PipelineError::NoStations("stations.json has no fetchable feed".to_string()));
    }

    let client = scrapers::http_client(&config.sources)?;
    let (fresh, failed) = rss::fetch_all(
        &client,
        &stations,
        &config.classifier.skip_titles,
        config.sources.concurrency,
    )
    .await;
    if failed == fetchable {
        return Err(PipelineError::NoStations(format!("all {fetchable} station feeds failed")));
    }
    if failed > 0 {
        warn!(failed, fetchable, "Some station feeds failed");
    }

    let archive: Vec<RawFilingRecord> = json::read_json_if_exists(&paths.raw()).await?.unwrap_or_default();
    let archived = archive.len();
    let (merged, stats) = rss::merge_archive(archive, fresh);
    json::write_json(&merged, &paths.raw(), true).await?;
    info!(
        archived,
        added = stats.added,
        replaced = stats.replaced,
        total = merged.len(),
        "Fetch stage complete"
    );
    Ok(merged)
}

/// Classify the raw archive and write the tagging reports.
#[instrument(level = "info", skip_all)]
pub async fn tag(config: &Config, paths: &DataPaths) -> PipelineResult<Vec<TaggedRecord>> {
    let raw: Vec<RawFilingRecord> = json::read_json(&paths.raw()).await?;
    let (tagged, stats) = Classifier::new(&config.classifier).classify_all(&raw);

    json::write_json(&tagged, &paths.tagged(), true).await?;
    json::write_text(&paths.report("tagging_report.txt"), &reports::tagging_report(&stats)).await?;
    json::write_text(
        &paths.report("non_political_report.txt"),
        &reports::non_political_report(&stats, &tagged),
    )
    .await?;
    if stats.gaps > 0 {
        warn!(gaps = stats.gaps, "Some records could not be fully classified; see tagging report");
    }
    Ok(tagged)
}

/// Standardize sponsor names and write the mapping and its report.
#[instrument(level = "info", skip_all)]
pub async fn standardize(config: &Config, paths: &DataPaths) -> PipelineResult<Vec<NormalizedRecord>> {
    let tagged: Vec<TaggedRecord> = json::read_json(&paths.tagged()).await?;
    let normalizer = SponsorNormalizer::from_config(&config.sponsors)?;
    let (normalized, mapping) = normalizer.normalize_all(tagged);

    json::write_json(&normalized, &paths.standardized(), true).await?;
    json::write_json(&mapping.mapping, &paths.sponsor_mapping(), true).await?;
    json::write_text(
        &paths.report("sponsor_standardization_report.txt"),
        &reports::sponsor_report(&mapping),
    )
    .await?;
    let stats = mapping.stats();
    info!(
        original = stats.original_count,
        standardized = stats.standardized_count,
        merged = stats.merged_count,
        "Standardize stage complete"
    );
    Ok(normalized)
}

/// Aggregate the standardized records into the site's data file.
#[instrument(level = "info", skip_all)]
pub async fn export(paths: &DataPaths) -> PipelineResult<HeatmapExport> {
    let normalized: Vec<NormalizedRecord> = json::read_json(&paths.standardized()).await?;
    let generated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let export = exporter::aggregate(&normalized, generated_at);
    json::write_json(&export, &paths.heatmap_json(), false).await?;
    Ok(export)
}

/// Render `index.html` from the exported data.
#[instrument(level = "info", skip_all)]
pub async fn render(
    config: &Config,
    paths: &DataPaths,
    top_n: Option<usize>,
    min_ads: Option<u64>,
) -> PipelineResult<HeatmapMatrix> {
    let export: HeatmapExport = json::read_json(&paths.heatmap_json()).await?;
    let mut filter = HeatmapFilter::from_config(&config.heatmap);
    if let Some(top_n) = top_n {
        filter.top_n = top_n;
    }
    if let Some(min_ads) = min_ads {
        filter.min_ads = min_ads;
    }

    let matrix = HeatmapMatrix::build(&export, &filter);
    let html = heatmap::render_html(&export, &matrix, &filter);
    json::write_text(&paths.index_html(), &html).await?;
    info!(
        sponsors = matrix.stats.sponsor_count,
        stations = matrix.stats.station_count,
        total_ads = matrix.stats.total_ads,
        "Render stage complete"
    );
    Ok(matrix)
}

/// Every stage in order.
#[instrument(level = "info", skip_all)]
pub async fn run_all(config: &Config, paths: &DataPaths) -> PipelineResult<()> {
    resolve(config, paths).await?;
    fetch(config, paths).await?;
    run_offline(config, paths).await
}

/// The stages that only read local files.
pub async fn run_offline(config: &Config, paths: &DataPaths) -> PipelineResult<()> {
    tag(config, paths).await?;
    standardize(config, paths).await?;
    export(paths).await?;
    render(config, paths, None, None).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordType;

    fn raw(id: &str, path: &str) -> RawFilingRecord {
        RawFilingRecord {
            id: format!("https://publicfiles.fcc.gov/fm-profile/wvee-fm/political-files/{id}.pdf"),
            title: format!("Entity 2046 uploaded file in {path} on Oct 1, 2024"),
            url: format!("https://publicfiles.fcc.gov/api/manager/download/{id}.pdf"),
            updated: "2024-10-01T12:00:00-04:00".to_string(),
            state: Some("Georgia".to_string()),
            city: Some("Atlanta".to_string()),
            station_url: Some("https://publicfiles.fcc.gov/fm-profile/wvee-fm/rss".to_string()),
        }
    }

    #[tokio::test]
    async fn test_offline_stages_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path().join("data"), dir.path().join("site"));
        let archive = vec![
            raw("1", "Political Files/2024/US Senate/Jane Doe for Senate"),
            raw("2", "Political Files/2024/Federal/US House/MAGA Inc"),
            raw("3", "Political Files/2024/Federal/US House/Maga Inc"),
            raw("4", "Political Files/2024/Non-Candidate Issue Ads"),
            raw("5", "EEO Reports/2024"),
        ];
        json::write_json(&archive, &paths.raw(), true).await.unwrap();
        let config = Config::default();

        run_offline(&config, &paths).await.unwrap();

        let tagged: Vec<TaggedRecord> = json::read_json(&paths.tagged()).await.unwrap();
        assert_eq!(tagged.len(), 5);
        assert_eq!(tagged[4].record_type, RecordType::NonPolitical);

        let mapping: std::collections::BTreeMap<String, String> =
            json::read_json(&paths.sponsor_mapping()).await.unwrap();
        assert_eq!(mapping["MAGA Inc"], mapping["Maga Inc"]);

        let export: HeatmapExport = json::read_json(&paths.heatmap_json()).await.unwrap();
        let maga: Vec<_> = export.rows.iter().filter(|r| r.sponsor == mapping["MAGA Inc"]).collect();
        assert_eq!(maga.len(), 1);
        assert_eq!(maga[0].count, 2);
        assert_eq!(maga[0].station, "WVEE-FM");

        for name in ["tagging_report.txt", "non_political_report.txt", "sponsor_standardization_report.txt"] {
            assert!(paths.report(name).exists(), "{name} missing");
        }
        let html = std::fs::read_to_string(paths.index_html()).unwrap();
        assert!(html.contains("WVEE-FM"));
    }

    #[tokio::test]
    async fn test_export_is_stable_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path().join("data"), dir.path().join("site"));
        let archive = vec![
            raw("1", "Political Files/2024/US Senate/Jane Doe for Senate"),
            raw("2", "Political Files/2024/US Senate/Jane Doe for Senate"),
        ];
        json::write_json(&archive, &paths.raw(), true).await.unwrap();
        let config = Config::default();
        tag(&config, &paths).await.unwrap();
        standardize(&config, &paths).await.unwrap();

        let first = export(&paths).await.unwrap();
        let second = export(&paths).await.unwrap();
        assert_eq!(first.rows, second.rows);
        assert_eq!(first.stations, second.stations);
    }

    #[tokio::test]
    async fn test_fetch_without_fetchable_stations_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path().join("data"), dir.path().join("site"));
        let stations = vec![StationEntry {
            state: "Georgia".to_string(),
            city: "Atlanta".to_string(),
            station: "WAOK".to_string(),
            format: "Urban talk".to_string(),
            ..Default::default()
        }];
        json::write_json(&stations, &paths.stations(), true).await.unwrap();

        let err = fetch(&Config::default(), &paths).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoStations(_)));
        assert!(!paths.raw().exists());
    }

    #[tokio::test]
    async fn test_tag_requires_archive() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path().join("data"), dir.path().join("site"));
        let err = tag(&Config::default(), &paths).await.unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
