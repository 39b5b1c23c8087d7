//! Error kinds raised by the pipeline stages.
//!
//! Most of these are local to one station or one feed entry: the caller logs
//! them and moves on. Only [`PipelineError::NoStations`] and output failures
//! abort a run.

use thiserror::Error;

/// Errors produced while resolving stations, fetching feeds and writing outputs.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A request for one station (search, URL check, or feed) failed.
    #[error("network fetch failed for {target}: {source}")]
    NetworkFetch {
        target: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered, but not with a success status.
    #[error("{target} answered with HTTP {status}")]
    HttpStatus { target: String, status: u16 },

    /// A feed or feed entry could not be parsed.
    #[error("could not parse {what}: {reason}")]
    Parse { what: String, reason: String },

    /// A filing title did not match any known category layout.
    #[error("unrecognized filing path for {id}: {reason}")]
    ClassificationGap { id: String, reason: String },

    /// Nothing to work with: no station resolved or no feed URL available.
    #[error("no stations available: {0}")]
    NoStations(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn network(target: impl Into<String>, source: reqwest::Error) -> Self {
        PipelineError::NetworkFetch {
            target: target.into(),
            source,
        }
    }

    pub fn parse(what: impl Into<String>, reason: impl ToString) -> Self {
        PipelineError::Parse {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that only affect one station or one entry.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            PipelineError::NetworkFetch { .. }
                | PipelineError::HttpStatus { .. }
                | PipelineError::Parse { .. }
                | PipelineError::ClassificationGap { .. }
        )
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skippable_kinds() {
        let gap = PipelineError::ClassificationGap {
            id: "x".to_string(),
            reason: "no path".to_string(),
        };
        assert!(gap.is_skippable());
        assert!(PipelineError::parse("feed", "bad xml").is_skippable());
        assert!(!PipelineError::NoStations("empty table".to_string()).is_skippable());
    }

    #[test]
    fn test_display_messages() {
        let err = PipelineError::HttpStatus {
            target: "https://publicfiles.fcc.gov/fm-profile/WXYZ-FM/rss".to_string(),
            status: 404,
        };
        assert_eq!(
            err.to_string(),
            "https://publicfiles.fcc.gov/fm-profile/WXYZ-FM/rss answered with HTTP 404"
        );
    }
}
