//! FCC public file lookups.
//!
//! Each listed station name is searched with the public file facility search
//! API. The best facility (same city and state if possible) gives the call
//! sign, the facility id and the service code, from which the station's
//! public file RSS URL is built:
//!
//! ```text
//! https://publicfiles.fcc.gov/{am|fm}-profile/{CALLSIGN}/rss
//! ```

use crate::config::SourcesConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::models::StationEntry;
use crate::scrapers::wikipedia::ListedStation;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

/// Longest call sign the profile URLs accept.
const MAX_CALL_SIGN_LEN: usize = 7;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: SearchResults,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResults {
    global_search_results: GlobalSearchResults,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GlobalSearchResults {
    #[serde(default)]
    am_facility_list: Option<Vec<Facility>>,
    #[serde(default)]
    fm_facility_list: Option<Vec<Facility>>,
    #[serde(default)]
    tv_facility_list: Option<Vec<Facility>>,
}

/// A facility returned by the search API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    pub call_sign: String,
    #[serde(default)]
    pub community_city: Option<String>,
    #[serde(default)]
    pub community_state: Option<String>,
    #[serde(default)]
    pub service_code: Option<String>,
    /// Numeric in some responses, a string in others.
    #[serde(default)]
    pub id: Option<serde_json::Value>,
}

impl Facility {
    pub fn facility_id(&self) -> Option<u64> {
        match self.id.as_ref()? {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Parse a search response into AM, FM and TV facilities, in that order.
pub fn parse_search_response(body: &str) -> PipelineResult<Vec<Facility>> {
    let response: SearchResponse = serde_json::from_str(body)?;
    let lists = response.results.global_search_results;
    Ok([lists.am_facility_list, lists.fm_facility_list, lists.tv_facility_list]
        .into_iter()
        .flatten()
        .flatten()
        .collect())
}

/// Name to search for: `"WAOK/WVEE"` and `"WAOK-AM"` both search `"WAOK"`.
pub fn search_name(station: &str) -> &str {
    let station = station.trim();
    let cut = if station.contains('/') {
        station.split('/').next()
    } else {
        station.split('-').next()
    };
    cut.unwrap_or(station).trim()
}

pub fn search_url(base: &str, station: &str) -> String {
    format!("{}{}", base, urlencoding::encode(search_name(station)))
}

/// Public file RSS URL for AM and FM services; other services have none.
pub fn profile_rss_url(base: &str, service_code: &str, call_sign: &str) -> Option<String> {
    let profile = match service_code.trim().to_uppercase().as_str() {
        "AM" => "am-profile",
        "FM" => "fm-profile",
        _ => return None,
    };
    let call_sign: String = call_sign.trim().to_uppercase().chars().take(MAX_CALL_SIGN_LEN).collect();
    Some(format!("{}/{}/{}/rss", base.trim_end_matches('/'), profile, call_sign))
}

/// Pick the facility that best matches the listed city and state.
///
/// Returns the facility with its (city, state) match flags. Ties go to the
/// earliest facility, so with no match at all the first one is used.
pub fn choose_facility<'f>(
    facilities: &'f [Facility],
    city: &str,
    state_abbr: Option<&str>,
) -> Option<(&'f Facility, bool, bool)> {
    let flags = |f: &Facility| {
        let city_match = f
            .community_city
            .as_deref()
            .is_some_and(|c| c.trim().eq_ignore_ascii_case(city.trim()));
        let state_match = match (f.community_state.as_deref(), state_abbr) {
            (Some(s), Some(abbr)) => s.trim().eq_ignore_ascii_case(abbr),
            _ => false,
        };
        (city_match, state_match)
    };
    let rank = |city_match: bool, state_match: bool| (city_match && state_match, state_match, city_match);
    let scored: Vec<_> = facilities
        .iter()
        .map(|f| {
            let (city_match, state_match) = flags(f);
            (f, city_match, state_match)
        })
        .collect();
    let best = scored.iter().map(|(_, c, s)| rank(*c, *s)).max()?;
    scored.into_iter().find(|(_, c, s)| rank(*c, *s) == best)
}

/// Two-letter abbreviation for a full state name.
pub fn state_abbreviation(state: &str) -> Option<&'static str> {
    const STATES: &[(&str, &str)] = &[
        ("Alabama", "AL"), ("Alaska", "AK"), ("Arizona", "AZ"), ("Arkansas", "AR"),
        ("California", "CA"), ("Colorado", "CO"), ("Connecticut", "CT"), ("Delaware", "DE"),
        ("District of Columbia", "DC"), ("Florida", "FL"), ("Georgia", "GA"), ("Hawaii", "HI"),
        ("Idaho", "ID"), ("Illinois", "IL"), ("Indiana", "IN"), ("Iowa", "IA"),
        ("Kansas", "KS"), ("Kentucky", "KY"), ("Louisiana", "LA"), ("Maine", "ME"),
        ("Maryland", "MD"), ("Massachusetts", "MA"), ("Michigan", "MI"), ("Minnesota", "MN"),
        ("Mississippi", "MS"), ("Missouri", "MO"), ("Montana", "MT"), ("Nebraska", "NE"),
        ("Nevada", "NV"), ("New Hampshire", "NH"), ("New Jersey", "NJ"), ("New Mexico", "NM"),
        ("New York", "NY"), ("North Carolina", "NC"), ("North Dakota", "ND"), ("Ohio", "OH"),
        ("Oklahoma", "OK"), ("Oregon", "OR"), ("Pennsylvania", "PA"), ("Rhode Island", "RI"),
        ("South Carolina", "SC"), ("South Dakota", "SD"), ("Tennessee", "TN"), ("Texas", "TX"),
        ("Utah", "UT"), ("Vermont", "VT"), ("Virginia", "VA"), ("Washington", "WA"),
        ("West Virginia", "WV"), ("Wisconsin", "WI"), ("Wyoming", "WY"),
    ];
    let state = state.trim();
    STATES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(state))
        .map(|(_, abbr)| *abbr)
}

/// Fill a [`StationEntry`] from search results.
pub fn entry_from_facilities(
    listed: &ListedStation,
    facilities: &[Facility],
    public_file_base_url: &str,
) -> StationEntry {
    let mut entry = StationEntry {
        state: listed.state.clone(),
        city: listed.city.clone(),
        station: listed.station.clone(),
        format: listed.format.clone(),
        ..Default::default()
    };
    let state_abbr = state_abbreviation(&listed.state);
    if let Some((facility, city_match, state_match)) =
        choose_facility(facilities, &listed.city, state_abbr)
    {
        entry.call_sign = Some(facility.call_sign.trim().to_uppercase());
        entry.facility_id = facility.facility_id();
        entry.service = facility.service_code.clone();
        entry.city_match = city_match;
        entry.state_match = state_match;
        entry.rss_url = facility
            .service_code
            .as_deref()
            .and_then(|code| profile_rss_url(public_file_base_url, code, &facility.call_sign));
    }
    entry
}

/// Search one station.
#[instrument(level = "debug", skip_all, fields(station = %listed.station))]
pub async fn resolve_station(
    client: &reqwest::Client,
    sources: &SourcesConfig,
    listed: &ListedStation,
) -> PipelineResult<StationEntry> {
    let url = search_url(&sources.facility_search_url, &listed.station);
    let body = super::get_text(client, &url).await?;
    let facilities = parse_search_response(&body)
        .map_err(|e| PipelineError::parse(format!("facility search for {}", listed.station), e))?;
    debug!(count = facilities.len(), "Facility search results");
    Ok(entry_from_facilities(listed, &facilities, &sources.public_file_base_url))
}

/// HTTP status of a feed URL.
pub async fn check_status(client: &reqwest::Client, url: &str) -> PipelineResult<u16> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| PipelineError::network(url, e))?;
    Ok(response.status().as_u16())
}

/// Resolve and status-check every listed station.
///
/// Stations whose search fails are kept without a feed URL.
#[instrument(level = "info", skip_all, fields(count = listed.len()))]
pub async fn resolve_all(
    client: &reqwest::Client,
    sources: &SourcesConfig,
    listed: &[ListedStation],
) -> Vec<StationEntry> {
    let mut entries: Vec<StationEntry> = stream::iter(listed)
        .map(|station| async move {
            let mut entry = match resolve_station(client, sources, station).await {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(station = %station.station, error = %e, "Facility search failed; skipping");
                    return StationEntry {
                        state: station.state.clone(),
                        city: station.city.clone(),
                        station: station.station.clone(),
                        format: station.format.clone(),
                        ..Default::default()
                    };
                }
            };
            if let Some(url) = entry.rss_url.clone() {
                match check_status(client, &url).await {
                    Ok(status) => entry.http_status = Some(status),
                    Err(e) => warn!(%url, error = %e, "Feed URL check failed"),
                }
            }
            entry
        })
        .buffer_unordered(sources.concurrency)
        .collect()
        .await;

    entries.sort_by(|a, b| {
        (&a.state, &a.city, &a.station).cmp(&(&b.state, &b.city, &b.station))
    });
    let with_feed = entries.iter().filter(|e| e.rss_url.is_some()).count();
    info!(total = entries.len(), with_feed, "Resolved stations");
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_RESPONSE: &str = r#"{
        "results": {
            "globalSearchResults": {
                "amFacilityList": [
                    {"callSign": "WAOK", "communityCity": "ATLANTA", "communityState": "GA", "serviceCode": "AM", "id": "9799"}
                ],
                "fmFacilityList": null,
                "tvFacilityList": [
                    {"callSign": "WAOK-TV", "communityCity": "NOWHERE", "communityState": "TX", "serviceCode": "TV", "id": 1}
                ]
            }
        }
    }"#;

    fn listed(station: &str, state: &str, city: &str) -> ListedStation {
        ListedStation {
            state: state.to_string(),
            city: city.to_string(),
            station: station.to_string(),
            format: "Urban talk".to_string(),
        }
    }

    #[test]
    fn test_parse_search_response_flattens_lists() {
        let facilities = parse_search_response(SEARCH_RESPONSE).unwrap();
        assert_eq!(facilities.len(), 2);
        assert_eq!(facilities[0].call_sign, "WAOK");
        assert_eq!(facilities[0].facility_id(), Some(9799));
        assert_eq!(facilities[1].facility_id(), Some(1));
    }

    #[test]
    fn test_search_name() {
        assert_eq!(search_name("WAOK/WVEE"), "WAOK");
        assert_eq!(search_name("WBLX-FM"), "WBLX");
        assert_eq!(search_name(" KBXX "), "KBXX");
        assert_eq!(
            search_url("https://publicfiles.fcc.gov/api/service/facility/search/", "W 1"),
            "https://publicfiles.fcc.gov/api/service/facility/search/W%201"
        );
    }

    #[test]
    fn test_profile_rss_url() {
        assert_eq!(
            profile_rss_url("https://publicfiles.fcc.gov", "FM", "wblx-fm").as_deref(),
            Some("https://publicfiles.fcc.gov/fm-profile/WBLX-FM/rss")
        );
        assert_eq!(
            profile_rss_url("https://publicfiles.fcc.gov/", "AM", "WXYZABCDE").as_deref(),
            Some("https://publicfiles.fcc.gov/am-profile/WXYZABC/rss")
        );
        assert_eq!(profile_rss_url("https://publicfiles.fcc.gov", "TV", "WAOK-TV"), None);
    }

    #[test]
    fn test_choose_facility_prefers_location_match() {
        let facilities = parse_search_response(SEARCH_RESPONSE).unwrap();
        let (best, city, state) = choose_facility(&facilities, "Nowhere", Some("TX")).unwrap();
        assert_eq!(best.call_sign, "WAOK-TV");
        assert!(city && state);

        let (best, city, state) = choose_facility(&facilities, "Macon", Some("FL")).unwrap();
        assert_eq!(best.call_sign, "WAOK");
        assert!(!city && !state);

        assert!(choose_facility(&[], "Atlanta", Some("GA")).is_none());
    }

    #[test]
    fn test_entry_from_facilities() {
        let facilities = parse_search_response(SEARCH_RESPONSE).unwrap();
        let entry = entry_from_facilities(
            &listed("WAOK", "Georgia", "Atlanta"),
            &facilities,
            "https://publicfiles.fcc.gov",
        );
        assert_eq!(entry.call_sign.as_deref(), Some("WAOK"));
        assert_eq!(entry.facility_id, Some(9799));
        assert!(entry.city_match);
        assert!(entry.state_match);
        assert_eq!(
            entry.rss_url.as_deref(),
            Some("https://publicfiles.fcc.gov/am-profile/WAOK/rss")
        );

        let empty = entry_from_facilities(&listed("WZZZ", "Ohio", "Akron"), &[], "https://x");
        assert_eq!(empty.rss_url, None);
        assert!(!empty.is_fetchable());
    }

    #[test]
    fn test_state_abbreviation() {
        assert_eq!(state_abbreviation("georgia"), Some("GA"));
        assert_eq!(state_abbreviation("District of Columbia"), Some("DC"));
        assert_eq!(state_abbreviation("Puerto Rico"), None);
    }
}
