//! Plain-text reports written next to the stage files.

use crate::classify::{NO_PATH_CATEGORY, TagStats};
use crate::models::{RecordType, TaggedRecord};
use crate::sponsors::SponsorMapping;
use crate::utils::{percent, truncate_for_log};
use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt::Write;

const RULE: &str = "================================================================================";
const THIN_RULE: &str = "--------------------------------------------------------------------------------";
const EXAMPLES_PER_CATEGORY: usize = 5;
const TOP_GROUPS: usize = 100;
const TOP_VARIANTS: usize = 15;

fn banner(out: &mut String, title: &str) {
    let _ = writeln!(out, "{RULE}\n{title}\n{RULE}\n");
}

/// Record type breakdown and field extraction rates.
pub fn tagging_report(stats: &TagStats) -> String {
    let mut out = String::new();
    banner(&mut out, "TAGGING REPORT");
    let _ = writeln!(out, "Total records: {}", stats.total);
    for record_type in [RecordType::PoliticalAd, RecordType::PoliticalMatters, RecordType::NonPolitical] {
        let n = stats.count(record_type);
        let _ = writeln!(out, "  {:<18} {:>8} ({:.1}%)", record_type.as_str(), n, percent(n, stats.total));
    }
    out.push('\n');
    let _ = writeln!(
        out,
        "Stations extracted: {} ({:.1}%)",
        stats.stations_extracted,
        percent(stats.stations_extracted, stats.total)
    );
    let _ = writeln!(
        out,
        "Years extracted:    {} ({:.1}%)",
        stats.years_extracted,
        percent(stats.years_extracted, stats.total)
    );
    let _ = writeln!(out, "Classification gaps: {}", stats.gaps);
    let _ = writeln!(out, "Unmatched fields:    {}", stats.unmatched_fields);
    out
}

/// Non-political records grouped by top-level folder, with a few examples each.
pub fn non_political_report(stats: &TagStats, records: &[TaggedRecord]) -> String {
    let mut examples: BTreeMap<&str, Vec<&TaggedRecord>> = BTreeMap::new();
    for record in records.iter().filter(|r| r.record_type == RecordType::NonPolitical) {
        let category = category_of(record);
        let bucket = examples.entry(category).or_default();
        if bucket.len() < EXAMPLES_PER_CATEGORY {
            bucket.push(record);
        }
    }

    let non_political = stats.count(RecordType::NonPolitical);
    let political = stats.total - non_political;
    let mut out = String::new();
    banner(&mut out, "NON-POLITICAL FILE ANALYSIS");
    let _ = writeln!(out, "Total records: {}", stats.total);
    let _ = writeln!(out, "Political files: {} ({:.1}%)", political, percent(political, stats.total));
    let _ = writeln!(
        out,
        "Non-political files: {} ({:.1}%)",
        non_political,
        percent(non_political, stats.total)
    );
    out.push('\n');

    let categories = stats
        .non_political_categories
        .iter()
        .sorted_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)))
        .collect::<Vec<_>>();

    let _ = writeln!(out, "NON-POLITICAL CATEGORIES:\n{THIN_RULE}");
    for (category, count) in &categories {
        let _ = writeln!(out, "{count:>8} records - {category}");
    }
    out.push('\n');

    banner(&mut out, "DETAILED EXAMPLES");
    for (category, count) in &categories {
        let _ = writeln!(out, "{category} ({count} records)\n{THIN_RULE}");
        for record in examples.get(category.as_str()).into_iter().flatten() {
            let _ = writeln!(out, "  Path:    {}", record.file_path.as_deref().unwrap_or("N/A"));
            let _ = writeln!(out, "  Title:   {}", truncate_for_log(&record.raw.title, 160));
            let _ = writeln!(out, "  Station: {}", record.station.as_deref().unwrap_or("N/A"));
            let _ = writeln!(out, "  Updated: {}", record.raw.updated);
            let _ = writeln!(out, "  URL:     {}\n", record.raw.url);
        }
    }
    out
}

/// Same bucket key as [`TagStats`] uses for `non_political_categories`.
fn category_of(record: &TaggedRecord) -> &str {
    record
        .file_path
        .as_deref()
        .and_then(|p| p.split('/').next())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(NO_PATH_CATEGORY)
}

/// Counts before and after standardization, and the largest merged groups.
pub fn sponsor_report(mapping: &SponsorMapping) -> String {
    let stats = mapping.stats();
    let mut out = String::new();
    banner(&mut out, "SPONSOR STANDARDIZATION REPORT");
    let _ = writeln!(out, "Original unique sponsors:     {}", stats.original_count);
    let _ = writeln!(out, "Standardized unique sponsors: {}", stats.standardized_count);
    let _ = writeln!(
        out,
        "Sponsors merged:              {} ({:.1}% reduction)",
        stats.merged_count,
        percent(stats.merged_count, stats.original_count)
    );
    out.push('\n');

    let variations = mapping.variations();
    let _ = writeln!(
        out,
        "TOP {} MERGED GROUPS (of {}):\n{THIN_RULE}",
        TOP_GROUPS.min(variations.len()),
        variations.len()
    );
    for variation in variations.iter().take(TOP_GROUPS) {
        let _ = writeln!(
            out,
            "\n{} ({} ads, {} variants)",
            variation.standardized,
            variation.total,
            variation.variants.len()
        );
        for (raw, count) in variation.variants.iter().take(TOP_VARIANTS) {
            let _ = writeln!(out, "  {count:>6}  {raw}");
        }
        if variation.variants.len() > TOP_VARIANTS {
            let _ = writeln!(out, "  ... and {} more", variation.variants.len() - TOP_VARIANTS);
        }
    }
    out
}
