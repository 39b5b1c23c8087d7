//! Station list scraper.
//!
//! The list page groups stations under one `h2` per state and one `h3` per
//! city, each followed by a bullet list of `"WAOK – Urban talk"` items.
//! Both the current (`div.mw-heading > h2`) and the older
//! (`h2 > span.mw-headline`) markup are handled, since only heading text
//! and document order are used.

use crate::error::PipelineResult;
use crate::scrapers::get_text;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument};

static FOOTNOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(?:\d+|edit|citation needed)\]").unwrap());

/// Headings that end the station sections or precede them.
const NON_STATE_HEADINGS: &[&str] = &[
    "contents",
    "see also",
    "references",
    "external links",
    "notes",
    "navigation menu",
];

/// One bullet from the station list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedStation {
    pub state: String,
    pub city: String,
    pub station: String,
    pub format: String,
}

/// Download the list page and parse it.
#[instrument(level = "info", skip(client))]
pub async fn index_stations(client: &reqwest::Client, url: &str) -> PipelineResult<Vec<ListedStation>> {
    let html = get_text(client, url).await?;
    let stations = parse_station_list(&html);
    info!(count = stations.len(), source = url, "Indexed listed stations");
    Ok(stations)
}

/// Walk headings and list items in document order.
pub fn parse_station_list(html: &str) -> Vec<ListedStation> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("h2, h3, li").unwrap();

    let mut state: Option<String> = None;
    let mut city: Option<String> = None;
    let mut stations = Vec::new();

    for element in document.select(&selector) {
        match element.value().name() {
            "h2" => {
                let heading = heading_text(&element);
                city = None;
                state = (!heading.is_empty()
                    && !NON_STATE_HEADINGS.contains(&heading.to_lowercase().as_str()))
                .then_some(heading);
            }
            "h3" => {
                city = state.as_ref().map(|_| heading_text(&element)).filter(|c| !c.is_empty());
            }
            _ => {
                let (Some(state), Some(city)) = (&state, &city) else {
                    continue;
                };
                if let Some(station) = parse_station_item(&element, state, city) {
                    stations.push(station);
                }
            }
        }
    }

    debug!(count = stations.len(), "Parsed station list");
    stations
}

fn heading_text(element: &ElementRef) -> String {
    let text = element.text().collect::<String>();
    FOOTNOTE.replace_all(&text, "").trim().to_string()
}

fn parse_station_item(element: &ElementRef, state: &str, city: &str) -> Option<ListedStation> {
    let text = element.text().collect::<String>();
    let text = FOOTNOTE.replace_all(&text, "");
    let mut parts = text.splitn(2, " – ");
    let station = parts.next()?.trim().to_string();
    if station.is_empty() {
        return None;
    }
    let format = parts
        .next()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .unwrap_or("Unknown Format")
        .to_string();
    Some(ListedStation {
        state: state.to_string(),
        city: city.to_string(),
        station,
        format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODERN: &str = r#"
<html><body><div class="mw-parser-output">
<div class="mw-heading mw-heading2"><h2 id="Alabama">Alabama</h2><span class="mw-editsection">[edit]</span></div>
<div class="mw-heading mw-heading3"><h3 id="Birmingham">Birmingham</h3></div>
<ul>
<li><a href="/wiki/WBHJ">WBHJ</a> – Urban contemporary</li>
<li><a href="/wiki/WAGG">WAGG</a> – Urban gospel<sup>[1]</sup></li>
</ul>
<div class="mw-heading mw-heading3"><h3 id="Mobile">Mobile</h3></div>
<ul><li>WBLX-FM</li></ul>
<div class="mw-heading mw-heading2"><h2 id="Georgia">Georgia</h2></div>
<div class="mw-heading mw-heading3"><h3 id="Atlanta">Atlanta</h3></div>
<ul><li>WAOK – Urban talk</li></ul>
<div class="mw-heading mw-heading2"><h2 id="See_also">See also</h2></div>
<ul><li>List of radio stations</li></ul>
</div></body></html>
"#;

    const LEGACY: &str = r#"
<html><body>
<div id="toc"><h2>Contents</h2><ul><li>Alabama</li></ul></div>
<h2><span class="mw-headline">Texas</span><span class="mw-editsection">[edit]</span></h2>
<h3><span class="mw-headline">Houston</span></h3>
<ul><li>KBXX – Urban contemporary</li></ul>
</body></html>
"#;

    #[test]
    fn test_parse_modern_markup() {
        let stations = parse_station_list(MODERN);
        assert_eq!(stations.len(), 4);
        assert_eq!(
            stations[0],
            ListedStation {
                state: "Alabama".to_string(),
                city: "Birmingham".to_string(),
                station: "WBHJ".to_string(),
                format: "Urban contemporary".to_string(),
            }
        );
        assert_eq!(stations[1].format, "Urban gospel");
        assert_eq!(stations[2].city, "Mobile");
        assert_eq!(stations[2].format, "Unknown Format");
        assert_eq!(stations[3].state, "Georgia");
        assert_eq!(stations[3].station, "WAOK");
    }

    #[test]
    fn test_parse_legacy_markup_skips_toc() {
        let stations = parse_station_list(LEGACY);
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].state, "Texas");
        assert_eq!(stations[0].city, "Houston");
        assert_eq!(stations[0].station, "KBXX");
    }

    #[test]
    fn test_items_outside_city_sections_are_ignored() {
        let html = "<h2>Ohio</h2><ul><li>WZAK – Urban AC</li></ul>";
        assert!(parse_station_list(html).is_empty());
    }
}
