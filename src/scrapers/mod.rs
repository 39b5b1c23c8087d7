//! Network-facing stages: station resolution and feed fetching.
//!
//! Each module splits its work the same way:
//!
//! 1. **Fetching**: an async function that downloads a page or feed
//! 2. **Parsing**: a pure function over the downloaded text
//!
//! so the parsing half can be tested against fixture strings.
//!
//! | Module | Source | Output |
//! |--------|--------|--------|
//! | [`wikipedia`] | List of urban-format radio stations (HTML) | state, city, station, format |
//! | [`fcc`] | FCC public file facility search (JSON) | call sign, facility id, RSS URL |
//! | [`rss`] | Station public file feed (RSS or Atom) | raw filing records |
//!
//! Requests run with bounded parallelism. A failure for one station is
//! logged and skipped; nothing is retried within a run.

pub mod fcc;
pub mod rss;
pub mod wikipedia;

use crate::config::SourcesConfig;
use crate::error::{PipelineError, PipelineResult};
use std::time::Duration;

/// Build the shared HTTP client. Wikipedia rejects requests without a user agent.
pub fn http_client(sources: &SourcesConfig) -> PipelineResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(sources.user_agent.clone())
        .timeout(Duration::from_secs(sources.timeout_secs))
        .build()
        .map_err(|e| PipelineError::network("HTTP client", e))
}

/// GET `url` and return the body, treating non-success statuses as errors.
pub async fn get_text(client: &reqwest::Client, url: &str) -> PipelineResult<String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| PipelineError::network(url, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::HttpStatus {
            target: url.to_string(),
            status: status.as_u16(),
        });
    }
    response.text().await.map_err(|e| PipelineError::network(url, e))
}
