//! Sponsor name standardization.
//!
//! Raw sponsor strings come straight from folder names typed by station
//! staff, so the same campaign shows up as `"Harris For President"`,
//! `"HARRIS-D-PRESIDENT"`, `"Kamala Harris for President 1234567"` and so on.
//! Normalization runs in four steps:
//!
//! 1. strip noise: trailing invoice numbers and dates, network prefixes
//! 2. fold: lower-case, ASCII punctuation, collapsed whitespace
//! 3. look the folded key up in the equivalence table (aliases, then patterns)
//! 4. otherwise render the key in display case (`"maga inc"` → `"MAGA INC"`)
//!
//! Step 4 only sees the folded key, so any two inputs that differ only in
//! case or spacing produce the same output.

use crate::config::SponsorTableConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{NormalizedRecord, TaggedRecord};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{info, instrument};

static TRAILING_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+\d{5,}[\s\-\d]*$").unwrap());
static TRAILING_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+\d{1,2}[-/]\d{1,2}[-/]\d{2,4}$").unwrap());
static DASH_NUMBER_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+-\s*\d+.*$").unwrap());
static NETWORK_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^premier\s+network\s+").unwrap());

/// The compiled equivalence table.
#[derive(Debug)]
pub struct SponsorNormalizer {
    aliases: HashMap<String, String>,
    patterns: Vec<(Regex, String)>,
    acronyms: HashSet<String>,
    small_words: HashSet<String>,
}

impl SponsorNormalizer {
    pub fn from_config(config: &SponsorTableConfig) -> PipelineResult<Self> {
        let aliases = config
            .aliases
            .iter()
            .map(|(key, canonical)| (fold_key(key), canonical.clone()))
            .collect();
        let patterns = config
            .patterns
            .iter()
            .map(|p| {
                Regex::new(&p.pattern)
                    .map(|re| (re, p.canonical.clone()))
                    .map_err(|e| PipelineError::Config(format!("sponsor pattern {:?}: {e}", p.pattern)))
            })
            .collect::<PipelineResult<Vec<_>>>()?;
        Ok(Self {
            aliases,
            patterns,
            acronyms: config.acronyms.iter().map(|a| a.to_uppercase()).collect(),
            small_words: config.small_words.iter().map(|w| w.to_lowercase()).collect(),
        })
    }

    /// Canonical form of `raw`, or `None` when nothing is left after cleanup.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let cleaned = clean_noise(raw);
        let key = fold_key(&cleaned);
        if key.is_empty() {
            return None;
        }
        if let Some(canonical) = self.aliases.get(&key) {
            return Some(canonical.clone());
        }
        if let Some((_, canonical)) = self.patterns.iter().find(|(re, _)| re.is_match(&key)) {
            return Some(canonical.clone());
        }
        Some(self.display_form(&key))
    }

    /// Attach `sponsor_normalized` to every record and collect the raw → normalized mapping.
    #[instrument(level = "info", skip_all, fields(count = records.len()))]
    pub fn normalize_all(&self, records: Vec<TaggedRecord>) -> (Vec<NormalizedRecord>, SponsorMapping) {
        let mut cache: HashMap<String, Option<String>> = HashMap::new();
        let mut mapping = SponsorMapping::default();

        let normalized: Vec<NormalizedRecord> = records
            .into_iter()
            .map(|tagged| {
                let sponsor_normalized = tagged.sponsor.as_ref().and_then(|raw| {
                    let result = cache
                        .entry(raw.clone())
                        .or_insert_with(|| self.normalize(raw))
                        .clone();
                    if let Some(ref standardized) = result {
                        mapping.observe(raw, standardized);
                    }
                    result
                });
                NormalizedRecord {
                    tagged,
                    sponsor_normalized,
                }
            })
            .collect();

        let stats = mapping.stats();
        info!(
            original = stats.original_count,
            standardized = stats.standardized_count,
            merged = stats.merged_count,
            "Standardized sponsors"
        );
        (normalized, mapping)
    }

    fn display_form(&self, key: &str) -> String {
        key.split(' ')
            .enumerate()
            .map(|(i, word)| {
                let upper = word.to_uppercase();
                if self.acronyms.contains(&upper) {
                    upper
                } else if i > 0 && self.small_words.contains(word) {
                    word.to_string()
                } else {
                    title_case(word)
                }
            })
            .join(" ")
    }
}

/// Remove invoice numbers, dates and network prefixes that stations append to names.
pub fn clean_noise(raw: &str) -> String {
    let collapsed = raw.split_whitespace().join(" ");
    let cleaned = TRAILING_NUMBER.replace(&collapsed, "");
    let cleaned = TRAILING_DATE.replace(&cleaned, "");
    let cleaned = DASH_NUMBER_SUFFIX.replace(&cleaned, "");
    let cleaned = NETWORK_PREFIX.replace(&cleaned, "");
    cleaned.trim().to_string()
}

/// Lookup key: lower-case words separated by single spaces, without sentence punctuation.
pub fn fold_key(s: &str) -> String {
    let ascii: String = s
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '`' => '\'',
            '\u{2013}' | '\u{2014}' => '-',
            '.' | ',' | ';' | ':' | '!' | '?' | '"' | '\u{201C}' | '\u{201D}' | '(' | ')' => ' ',
            c => c,
        })
        .collect();
    ascii
        .to_lowercase()
        .split_whitespace()
        .filter(|w| !w.chars().all(|c| c == '-' || c == '\''))
        .join(" ")
}

fn title_case(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut at_start = true;
    for c in word.chars() {
        if c.is_alphabetic() {
            if at_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_start = false;
        } else {
            out.push(c);
            at_start = matches!(c, '-' | '/');
        }
    }
    out
}

/// Raw sponsor → standardized name, with how often each raw name occurred.
#[derive(Debug, Clone, Default)]
pub struct SponsorMapping {
    pub mapping: BTreeMap<String, String>,
    counts: BTreeMap<String, usize>,
}

/// A standardized name that absorbed more than one raw spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variation {
    pub standardized: String,
    /// Raw spellings with their record counts, most frequent first.
    pub variants: Vec<(String, usize)>,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingStats {
    pub original_count: usize,
    pub standardized_count: usize,
    pub merged_count: usize,
}

impl SponsorMapping {
    fn observe(&mut self, raw: &str, standardized: &str) {
        self.mapping
            .entry(raw.to_string())
            .or_insert_with(|| standardized.to_string());
        *self.counts.entry(raw.to_string()).or_default() += 1;
    }

    pub fn stats(&self) -> MappingStats {
        let original_count = self.mapping.len();
        let standardized_count = self.mapping.values().collect::<HashSet<_>>().len();
        MappingStats {
            original_count,
            standardized_count,
            merged_count: original_count - standardized_count,
        }
    }

    /// Merged groups, largest first.
    pub fn variations(&self) -> Vec<Variation> {
        let mut groups: BTreeMap<&str, Vec<(String, usize)>> = BTreeMap::new();
        for (raw, standardized) in &self.mapping {
            let count = self.counts.get(raw).copied().unwrap_or(0);
            groups
                .entry(standardized.as_str())
                .or_default()
                .push((raw.clone(), count));
        }
        groups
            .into_iter()
            .filter(|(_, variants)| variants.len() > 1)
            .map(|(standardized, mut variants)| {
                variants.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                let total = variants.iter().map(|(_, c)| c).sum();
                Variation {
                    standardized: standardized.to_string(),
                    variants,
                    total,
                }
            })
            .sorted_by(|a, b| b.total.cmp(&a.total).then_with(|| a.standardized.cmp(&b.standardized)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawFilingRecord, RecordType};

    fn normalizer() -> SponsorNormalizer {
        SponsorNormalizer::from_config(&SponsorTableConfig::default()).unwrap()
    }

    fn tagged(sponsor: Option<&str>) -> TaggedRecord {
        TaggedRecord {
            raw: RawFilingRecord {
                id: "id".to_string(),
                title: "title".to_string(),
                url: "url".to_string(),
                updated: "2024-10-01".to_string(),
                state: None,
                city: None,
                station_url: None,
            },
            record_type: RecordType::PoliticalAd,
            facility_id: None,
            station: Some("WXYZ-FM".to_string()),
            year: Some(2024),
            office: None,
            sponsor: sponsor.map(String::from),
            file_path: None,
        }
    }

    #[test]
    fn test_maga_variants_merge() {
        let n = normalizer();
        for raw in ["MAGA Inc", "MAGA INC", "Maga Inc", "maga inc.", "  MAGA   Inc  "] {
            assert_eq!(n.normalize(raw).as_deref(), Some("MAGA INC"), "{raw}");
        }
    }

    #[test]
    fn test_case_and_whitespace_variants_are_equal() {
        let n = normalizer();
        let inputs = [
            "Citizens For A Better Georgia",
            "CITIZENS FOR A BETTER GEORGIA",
            "citizens  for a better\tgeorgia",
            "Premier Network citizens for a better georgia",
            "premier network Citizens For A Better Georgia 1234567",
        ];
        let first = n.normalize(inputs[0]);
        assert_eq!(first.as_deref(), Some("Citizens for a Better Georgia"));
        for raw in &inputs[1..] {
            assert_eq!(n.normalize(raw), first, "{raw}");
        }
    }

    #[test]
    fn test_presidential_patterns() {
        let n = normalizer();
        for raw in [
            "Harris For President",
            "HARRIS-D-PRESIDENT",
            "Kamala Harris (D) President",
            "Kamala Harris for President 1234567",
            "kamala harris",
        ] {
            assert_eq!(
                n.normalize(raw).as_deref(),
                Some("Kamala Harris for President"),
                "{raw}"
            );
        }
        assert_eq!(
            n.normalize("Donald J. Trump for President").as_deref(),
            Some("Donald Trump for President")
        );
        assert_eq!(n.normalize("Biden").as_deref(), Some("Joe Biden for President"));
    }

    #[test]
    fn test_noise_removal() {
        assert_eq!(clean_noise("Jane Doe for Senate 10/01/2024"), "Jane Doe for Senate");
        assert_eq!(clean_noise("Jane Doe for Senate - 12 spots"), "Jane Doe for Senate");
        assert_eq!(clean_noise("Jane Doe 123456 789"), "Jane Doe");
        assert_eq!(clean_noise("Premier Network Jane Doe"), "Jane Doe");
        assert_eq!(clean_noise("Prop 1"), "Prop 1");
    }

    #[test]
    fn test_dash_count_suffix_with_or_without_space() {
        assert_eq!(clean_noise("Jane Doe -12 spots"), "Jane Doe");
        let n = normalizer();
        let spaced = n.normalize("Jane Doe - 12 spots");
        assert_eq!(spaced.as_deref(), Some("Jane Doe"));
        assert_eq!(n.normalize("Jane Doe -12 spots"), spaced);
        assert_eq!(n.normalize("HARRIS-D-PRESIDENT").as_deref(), Some("Kamala Harris for President"));
    }

    #[test]
    fn test_alias_table_wins_over_display_form() {
        let mut config = SponsorTableConfig::default();
        config
            .aliases
            .insert("Stacey Abrams".to_string(), "Abrams for Governor".to_string());
        let n = SponsorNormalizer::from_config(&config).unwrap();
        assert_eq!(n.normalize("STACEY ABRAMS").as_deref(), Some("Abrams for Governor"));
        assert_eq!(n.normalize("Stacey  Abrams.").as_deref(), Some("Abrams for Governor"));
    }

    #[test]
    fn test_bad_pattern_is_config_error() {
        let mut config = SponsorTableConfig::default();
        config.patterns.push(crate::config::SponsorPattern {
            pattern: "(unclosed".to_string(),
            canonical: "x".to_string(),
        });
        assert!(matches!(
            SponsorNormalizer::from_config(&config),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_empty_after_cleanup_is_absent() {
        let n = normalizer();
        assert_eq!(n.normalize("   "), None);
        assert_eq!(n.normalize("..."), None);
    }

    #[test]
    fn test_title_case_rules() {
        let n = normalizer();
        assert_eq!(
            n.normalize("the committee of non-partisan voters").as_deref(),
            Some("The Committee of Non-Partisan Voters")
        );
        assert_eq!(n.normalize("yes on 1st amendment pac").as_deref(), Some("YES on 1st Amendment PAC"));
    }

    #[test]
    fn test_absent_sponsor_stays_absent() {
        let n = normalizer();
        let (records, mapping) = n.normalize_all(vec![tagged(None), tagged(Some("Maga Inc"))]);
        assert_eq!(records[0].sponsor_normalized, None);
        assert_eq!(records[1].sponsor_normalized.as_deref(), Some("MAGA INC"));
        assert_eq!(mapping.mapping.len(), 1);
    }

    #[test]
    fn test_mapping_stats_and_variations() {
        let n = normalizer();
        let records = vec![
            tagged(Some("MAGA Inc")),
            tagged(Some("MAGA Inc")),
            tagged(Some("Maga Inc")),
            tagged(Some("Harris For President")),
            tagged(Some("Jane Doe")),
        ];
        let (_, mapping) = n.normalize_all(records);
        let stats = mapping.stats();
        assert_eq!(stats.original_count, 4);
        assert_eq!(stats.standardized_count, 3);
        assert_eq!(stats.merged_count, 1);

        let variations = mapping.variations();
        assert_eq!(variations.len(), 1);
        assert_eq!(variations[0].standardized, "MAGA INC");
        assert_eq!(variations[0].total, 3);
        assert_eq!(variations[0].variants[0], ("MAGA Inc".to_string(), 2));
    }
}
