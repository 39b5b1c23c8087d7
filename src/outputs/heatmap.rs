//! Sponsor × station matrix and the static heatmap page.
//!
//! [`HeatmapMatrix::build`] is the Rust half of the page: it produces the
//! default view that is baked into `index.html`. The inline script repeats
//! the same filtering over `heatmap.json` whenever a control changes, so
//! the two must agree on the rules:
//!
//! 1. Keep rows matching every set filter (office, year, state, record type)
//! 2. Total per sponsor; drop sponsors under `min_ads`
//! 3. Keep the `top_n` sponsors by total, ties broken by name
//! 4. Stations are every station with ads from a kept sponsor, busiest first

use crate::config::HeatmapConfig;
use crate::models::{AggregateRow, HeatmapExport, RecordType};
use crate::utils::escape_html;
use itertools::Itertools;
use std::collections::HashMap;
use std::fmt::Write;
use tracing::{debug, instrument};

const LOW_RGB: (u8, u8, u8) = (0xf7, 0xfb, 0xff);
const HIGH_RGB: (u8, u8, u8) = (0x08, 0x30, 0x6b);

/// The controls shown above the matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeatmapFilter {
    pub top_n: usize,
    pub min_ads: u64,
    pub office: Option<String>,
    pub year: Option<u16>,
    pub state: Option<String>,
    pub record_type: Option<RecordType>,
}

impl HeatmapFilter {
    pub fn from_config(config: &HeatmapConfig) -> Self {
        Self {
            top_n: config.top_n,
            min_ads: config.min_ads,
            office: None,
            year: None,
            state: None,
            record_type: None,
        }
    }

    fn matches(&self, row: &AggregateRow, export: &HeatmapExport) -> bool {
        if self.office.is_some() && row.office != self.office {
            return false;
        }
        if self.year.is_some() && row.year != self.year {
            return false;
        }
        if self.record_type.is_some_and(|t| t != row.record_type) {
            return false;
        }
        if let Some(state) = &self.state {
            let row_state = export.stations.get(&row.station).and_then(|l| l.state.as_ref());
            if row_state != Some(state) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatrixStats {
    pub total_ads: u64,
    pub sponsor_count: usize,
    pub station_count: usize,
    pub max_cell: u64,
}

/// Counts laid out as `cells[sponsor][station]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeatmapMatrix {
    pub sponsors: Vec<(String, u64)>,
    pub stations: Vec<(String, u64)>,
    pub cells: Vec<Vec<u64>>,
    pub stats: MatrixStats,
}

impl HeatmapMatrix {
    #[instrument(level = "debug", skip_all, fields(rows = export.rows.len()))]
    pub fn build(export: &HeatmapExport, filter: &HeatmapFilter) -> Self {
        let rows: Vec<&AggregateRow> = export.rows.iter().filter(|r| filter.matches(r, export)).collect();

        let mut sponsor_totals: HashMap<&str, u64> = HashMap::new();
        for row in &rows {
            *sponsor_totals.entry(row.sponsor.as_str()).or_default() += row.count;
        }
        let sponsors: Vec<(String, u64)> = sponsor_totals
            .into_iter()
            .filter(|(_, total)| *total >= filter.min_ads)
            .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)))
            .take(filter.top_n)
            .map(|(name, total)| (name.to_string(), total))
            .collect();
        let sponsor_index: HashMap<&str, usize> = sponsors
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.as_str(), i))
            .collect();

        let mut station_totals: HashMap<&str, u64> = HashMap::new();
        for row in rows.iter().filter(|r| sponsor_index.contains_key(r.sponsor.as_str())) {
            *station_totals.entry(row.station.as_str()).or_default() += row.count;
        }
        let stations: Vec<(String, u64)> = station_totals
            .into_iter()
            .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)))
            .map(|(name, total)| (name.to_string(), total))
            .collect();
        let station_index: HashMap<&str, usize> = stations
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.as_str(), i))
            .collect();

        let mut cells = vec![vec![0u64; stations.len()]; sponsors.len()];
        for row in &rows {
            if let (Some(&s), Some(&t)) = (
                sponsor_index.get(row.sponsor.as_str()),
                station_index.get(row.station.as_str()),
            ) {
                cells[s][t] += row.count;
            }
        }

        let stats = MatrixStats {
            total_ads: sponsors.iter().map(|(_, total)| total).sum(),
            sponsor_count: sponsors.len(),
            station_count: stations.len(),
            max_cell: cells.iter().flatten().copied().max().unwrap_or(0),
        };
        debug!(?stats, "Built heatmap matrix");
        Self {
            sponsors,
            stations,
            cells,
            stats,
        }
    }
}

/// Cell color on a log scale from near-white (0) to dark blue (`max`).
pub fn color_for(count: u64, max: u64) -> String {
    let t = if max == 0 || count == 0 {
        0.0
    } else {
        ((count.min(max) as f64).ln_1p() / (max as f64).ln_1p()).clamp(0.0, 1.0)
    };
    let mix = |lo: u8, hi: u8| -> u8 { (lo as f64 + (hi as f64 - lo as f64) * t).round() as u8 };
    format!(
        "#{:02x}{:02x}{:02x}",
        mix(LOW_RGB.0, HIGH_RGB.0),
        mix(LOW_RGB.1, HIGH_RGB.1),
        mix(LOW_RGB.2, HIGH_RGB.2)
    )
}

/// Render the full page with `matrix` pre-rendered.
pub fn render_html(export: &HeatmapExport, matrix: &HeatmapMatrix, filter: &HeatmapFilter) -> String {
    let offices = export.rows.iter().filter_map(|r| r.office.clone()).unique().sorted().collect::<Vec<_>>();
    let years = export.rows.iter().filter_map(|r| r.year).unique().sorted().rev().collect::<Vec<_>>();
    let states = export
        .stations
        .values()
        .filter_map(|l| l.state.clone())
        .unique()
        .sorted()
        .collect::<Vec<_>>();
    let record_types = export.rows.iter().map(|r| r.record_type).unique().sorted().collect::<Vec<_>>();

    let mut html = String::with_capacity(16 * 1024);
    html.push_str(PAGE_HEAD);

    html.push_str("<div class=\"controls\">\n");
    push_select(&mut html, "office", "Office", offices.iter().map(|o| (o.clone(), o.clone())));
    push_select(&mut html, "year", "Year", years.iter().map(|y| (y.to_string(), y.to_string())));
    push_select(&mut html, "state", "State", states.iter().map(|s| (s.clone(), s.clone())));
    push_select(
        &mut html,
        "record_type",
        "Type",
        record_types.iter().map(|t| (t.as_str().to_string(), t.as_str().replace('_', " "))),
    );
    let _ = writeln!(
        html,
        "<label>Top sponsors <input id=\"top_n\" type=\"number\" min=\"1\" value=\"{}\"></label>",
        filter.top_n
    );
    let _ = writeln!(
        html,
        "<label>Min ads <input id=\"min_ads\" type=\"number\" min=\"0\" value=\"{}\"></label>",
        filter.min_ads
    );
    html.push_str("</div>\n");

    let _ = writeln!(html, "<div id=\"stats\">{}</div>", stats_html(&matrix.stats));
    let _ = writeln!(html, "<div id=\"matrix\">{}</div>", table_html(matrix));
    let _ = writeln!(
        html,
        "<p class=\"generated\">Data generated {}</p>",
        escape_html(&export.generated_at)
    );
    if let Some(range) = &export.date_range {
        let _ = writeln!(
            html,
            "<p class=\"generated\">Filings dated {} to {}</p>",
            escape_html(day_of(&range.first)),
            escape_html(day_of(&range.last))
        );
    }

    html.push_str("<script>\n");
    let _ = writeln!(html, "const LOW = {:?};", rgb_array(LOW_RGB));
    let _ = writeln!(html, "const HIGH = {:?};", rgb_array(HIGH_RGB));
    html.push_str(PAGE_SCRIPT);
    html.push_str("</script>\n</body>\n</html>\n");
    html
}

/// Date part of an RFC 3339 timestamp.
fn day_of(timestamp: &str) -> &str {
    timestamp.split('T').next().unwrap_or(timestamp)
}

fn rgb_array(rgb: (u8, u8, u8)) -> [u8; 3] {
    [rgb.0, rgb.1, rgb.2]
}

fn push_select(html: &mut String, id: &str, label: &str, options: impl Iterator<Item = (String, String)>) {
    let _ = writeln!(html, "<label>{label} <select id=\"{id}\"><option value=\"\">All</option>");
    for (value, text) in options {
        let _ = writeln!(
            html,
            "<option value=\"{}\">{}</option>",
            escape_html(&value),
            escape_html(&text)
        );
    }
    html.push_str("</select></label>\n");
}

fn stats_html(stats: &MatrixStats) -> String {
    format!(
        "<span>{} ads</span> <span>{} sponsors</span> <span>{} stations</span> <span>max cell {}</span>",
        stats.total_ads, stats.sponsor_count, stats.station_count, stats.max_cell
    )
}

fn table_html(matrix: &HeatmapMatrix) -> String {
    if matrix.sponsors.is_empty() {
        return "<p class=\"empty\">No ads match these filters.</p>".to_string();
    }
    let mut out = String::from("<table><thead><tr><th></th>");
    for (station, total) in &matrix.stations {
        let _ = write!(
            out,
            "<th class=\"station\" title=\"{} ads\"><span>{}</span></th>",
            total,
            escape_html(station)
        );
    }
    out.push_str("</tr></thead><tbody>");
    let max = matrix.stats.max_cell;
    for ((sponsor, total), row) in matrix.sponsors.iter().zip(&matrix.cells) {
        let _ = write!(
            out,
            "<tr><th class=\"sponsor\" title=\"{} ads\">{}</th>",
            total,
            escape_html(sponsor)
        );
        for (count, (station, _)) in row.iter().zip(&matrix.stations) {
            if *count == 0 {
                out.push_str("<td></td>");
            } else {
                let _ = write!(
                    out,
                    "<td style=\"background:{}\" title=\"{} @ {}: {}\"></td>",
                    color_for(*count, max),
                    escape_html(sponsor),
                    escape_html(station),
                    count
                );
            }
        }
        out.push_str("</tr>");
    }
    out.push_str("</tbody></table>");
    out
}

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Political Ads on Urban Radio</title>
<style>
body { font-family: system-ui, sans-serif; margin: 1.5rem; color: #222; }
.controls { display: flex; flex-wrap: wrap; gap: 1rem; margin-bottom: 1rem; }
#stats span { margin-right: 1.5rem; font-weight: 600; }
#matrix { overflow: auto; max-height: 80vh; margin-top: 1rem; }
table { border-collapse: collapse; font-size: 12px; }
td { width: 14px; height: 14px; border: 1px solid #eee; }
th.sponsor { text-align: right; padding-right: 6px; white-space: nowrap; position: sticky; left: 0; background: #fff; }
th.station { height: 90px; vertical-align: bottom; }
th.station span { writing-mode: vertical-rl; transform: rotate(180deg); white-space: nowrap; }
.generated { color: #777; font-size: 12px; }
</style>
</head>
<body>
<h1>Political Ads on Urban Radio</h1>
"#;

const PAGE_SCRIPT: &str = r##"const ids = ["office", "year", "state", "record_type", "top_n", "min_ads"];
let data = null;

function escapeHtml(s) {
  return String(s).replace(/[&<>"']/g, c => ({"&": "&amp;", "<": "&lt;", ">": "&gt;", '"': "&quot;", "'": "&#39;"}[c]));
}

function colorFor(count, max) {
  const t = max > 0 && count > 0 ? Math.min(1, Math.log1p(Math.min(count, max)) / Math.log1p(max)) : 0;
  const mix = i => Math.round(LOW[i] + (HIGH[i] - LOW[i]) * t).toString(16).padStart(2, "0");
  return "#" + mix(0) + mix(1) + mix(2);
}

function rank(totals) {
  return [...totals.entries()].sort((a, b) => b[1] - a[1] || (a[0] < b[0] ? -1 : a[0] > b[0] ? 1 : 0));
}

function build(f) {
  const rows = data.rows.filter(r =>
    (!f.office || r.office === f.office) &&
    (!f.year || r.year === Number(f.year)) &&
    (!f.record_type || r.record_type === f.record_type) &&
    (!f.state || (data.stations[r.station] || {}).state === f.state));
  const sponsorTotals = new Map();
  for (const r of rows) sponsorTotals.set(r.sponsor, (sponsorTotals.get(r.sponsor) || 0) + r.count);
  const sponsors = rank(sponsorTotals).filter(s => s[1] >= f.min_ads).slice(0, f.top_n);
  const keep = new Map(sponsors.map((s, i) => [s[0], i]));
  const stationTotals = new Map();
  for (const r of rows) if (keep.has(r.sponsor)) stationTotals.set(r.station, (stationTotals.get(r.station) || 0) + r.count);
  const stations = rank(stationTotals);
  const col = new Map(stations.map((s, i) => [s[0], i]));
  const cells = sponsors.map(() => stations.map(() => 0));
  for (const r of rows) if (keep.has(r.sponsor)) cells[keep.get(r.sponsor)][col.get(r.station)] += r.count;
  const max = Math.max(0, ...cells.flat());
  const total = sponsors.reduce((n, s) => n + s[1], 0);
  return {sponsors, stations, cells, stats: {total, sponsors: sponsors.length, stations: stations.length, max}};
}

function render(m) {
  document.getElementById("stats").innerHTML =
    `<span>${m.stats.total} ads</span> <span>${m.stats.sponsors} sponsors</span> ` +
    `<span>${m.stats.stations} stations</span> <span>max cell ${m.stats.max}</span>`;
  if (!m.sponsors.length) {
    document.getElementById("matrix").innerHTML = '<p class="empty">No ads match these filters.</p>';
    return;
  }
  let h = "<table><thead><tr><th></th>";
  for (const [s, t] of m.stations) h += `<th class="station" title="${t} ads"><span>${escapeHtml(s)}</span></th>`;
  h += "</tr></thead><tbody>";
  m.sponsors.forEach(([sp, t], i) => {
    h += `<tr><th class="sponsor" title="${t} ads">${escapeHtml(sp)}</th>`;
    m.cells[i].forEach((c, j) => {
      h += c === 0 ? "<td></td>" :
        `<td style="background:${colorFor(c, m.stats.max)}" title="${escapeHtml(sp)} @ ${escapeHtml(m.stations[j][0])}: ${c}"></td>`;
    });
    h += "</tr>";
  });
  document.getElementById("matrix").innerHTML = h + "</tbody></table>";
}

function current() {
  const v = id => document.getElementById(id).value;
  return {office: v("office"), year: v("year"), state: v("state"), record_type: v("record_type"),
          top_n: Math.max(1, Number(v("top_n")) || 1), min_ads: Math.max(0, Number(v("min_ads")) || 0)};
}

fetch("heatmap.json")
  .then(r => r.json())
  .then(d => {
    data = d;
    for (const id of ids) document.getElementById(id).addEventListener("change", () => render(build(current())));
  })
  .catch(e => console.error("Could not load heatmap.json", e));
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateRange, StationLocation};
    use std::collections::BTreeMap;

    fn row(sponsor: &str, station: &str, office: &str, year: u16, count: u64) -> AggregateRow {
        AggregateRow {
            sponsor: sponsor.to_string(),
            station: station.to_string(),
            office: Some(office.to_string()),
            year: Some(year),
            record_type: RecordType::PoliticalAd,
            count,
        }
    }

    fn export() -> HeatmapExport {
        let mut stations = BTreeMap::new();
        for (station, state) in [("WAOK-AM", "Georgia"), ("WVEE-FM", "Georgia"), ("KBXX-FM", "Texas")] {
            stations.insert(
                station.to_string(),
                StationLocation {
                    state: Some(state.to_string()),
                    city: None,
                },
            );
        }
        HeatmapExport {
            generated_at: "2024-10-01T00:00:00Z".to_string(),
            date_range: Some(DateRange {
                first: "2022-03-01T15:00:00Z".to_string(),
                last: "2024-10-01T18:00:00Z".to_string(),
            }),
            stations,
            rows: vec![
                row("HARRIS FOR PRESIDENT", "WAOK-AM", "President", 2024, 10),
                row("HARRIS FOR PRESIDENT", "KBXX-FM", "President", 2024, 5),
                row("JANE DOE", "WVEE-FM", "US Senate", 2024, 7),
                row("JANE DOE", "WAOK-AM", "US Senate", 2022, 1),
                row("SMALL PAC", "KBXX-FM", "Local", 2024, 1),
            ],
        }
    }

    fn filter(top_n: usize, min_ads: u64) -> HeatmapFilter {
        HeatmapFilter {
            top_n,
            min_ads,
            office: None,
            year: None,
            state: None,
            record_type: None,
        }
    }

    #[test]
    fn test_build_orders_by_total() {
        let matrix = HeatmapMatrix::build(&export(), &filter(40, 1));
        let names: Vec<&str> = matrix.sponsors.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["HARRIS FOR PRESIDENT", "JANE DOE", "SMALL PAC"]);
        assert_eq!(matrix.stations[0], ("WAOK-AM".to_string(), 11));
        assert_eq!(matrix.cells[0][0], 10);
        assert_eq!(
            matrix.stats,
            MatrixStats {
                total_ads: 24,
                sponsor_count: 3,
                station_count: 3,
                max_cell: 10
            }
        );
    }

    #[test]
    fn test_top_n_and_threshold() {
        let matrix = HeatmapMatrix::build(&export(), &filter(1, 1));
        assert_eq!(matrix.sponsors.len(), 1);
        assert_eq!(matrix.stations.len(), 2);

        let matrix = HeatmapMatrix::build(&export(), &filter(40, 2));
        assert!(matrix.sponsors.iter().all(|(n, _)| n != "SMALL PAC"));
    }

    #[test]
    fn test_filters() {
        let mut f = filter(40, 1);
        f.state = Some("Texas".to_string());
        let matrix = HeatmapMatrix::build(&export(), &f);
        assert_eq!(matrix.stations.len(), 1);
        assert_eq!(matrix.stats.total_ads, 6);

        let mut f = filter(40, 1);
        f.office = Some("US Senate".to_string());
        f.year = Some(2022);
        let matrix = HeatmapMatrix::build(&export(), &f);
        assert_eq!(matrix.sponsors, vec![("JANE DOE".to_string(), 1)]);

        let mut f = filter(40, 1);
        f.record_type = Some(RecordType::PoliticalMatters);
        let matrix = HeatmapMatrix::build(&export(), &f);
        assert_eq!(matrix.stats, MatrixStats::default());
    }

    #[test]
    fn test_color_scale_is_monotonic() {
        assert_eq!(color_for(0, 10), "#f7fbff");
        assert_eq!(color_for(10, 10), "#08306b");
        let darkness = |c: &str| u32::from_str_radix(&c[1..3], 16).unwrap();
        let shades: Vec<u32> = (1..=10).map(|n| darkness(&color_for(n, 10))).collect();
        assert!(shades.windows(2).all(|w| w[0] >= w[1]), "{shades:?}");
    }

    #[test]
    fn test_render_html_escapes_and_embeds() {
        let mut data = export();
        data.rows.push(row("SMITH & <JONES>", "WAOK-AM", "State", 2024, 3));
        let f = filter(40, 1);
        let matrix = HeatmapMatrix::build(&data, &f);
        let html = render_html(&data, &matrix, &f);

        assert!(html.contains("SMITH &amp; &lt;JONES&gt;"));
        assert!(!html.contains("<JONES>"));
        assert!(html.contains("fetch(\"heatmap.json\")"));
        assert!(html.contains("<option value=\"Texas\">Texas</option>"));
        assert!(html.contains("<option value=\"political_ad\">political ad</option>"));
        assert!(html.contains("const LOW = [247, 251, 255];"));
        assert!(html.contains("value=\"40\""));
        assert!(html.contains("Filings dated 2022-03-01 to 2024-10-01"));

        let mut undated = export();
        undated.date_range = None;
        assert!(!render_html(&undated, &matrix, &f).contains("Filings dated"));
    }

    #[test]
    fn test_inline_script_is_complete() {
        let f = filter(40, 1);
        let data = export();
        let html = render_html(&data, &HeatmapMatrix::build(&data, &f), &f);
        assert!(html.contains("function colorFor(count, max) {"));
        assert!(html.contains("return \"#\" + mix(0) + mix(1) + mix(2);"));
        assert!(html.contains("function render(m) {"));
        assert!(html.contains(".catch(e => console.error(\"Could not load heatmap.json\", e));\n</script>"));
        assert!(html.ends_with("</html>\n"));
        assert_eq!(html.matches("<script>").count(), 1);
    }
}
