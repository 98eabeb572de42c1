//! Error taxonomy for the scraping pipeline.
//!
//! Which variants are fatal depends on where they surface:
//!
//! | Variant | Optional UI step | Date resolution | Card extraction |
//! |---------|------------------|-----------------|-----------------|
//! | [`ScrapeError::NavigationTimeout`] | logged, skipped | `None` date | n/a |
//! | [`ScrapeError::SelectorNotFound`] | logged, skipped | `None` date | card skipped |
//! | [`ScrapeError::Fetch`] / [`ScrapeError::Transport`] | n/a | n/a | per [`AssetFailurePolicy`](crate::config::AssetFailurePolicy) |
//! | [`ScrapeError::Parse`] | n/a | `None` date | n/a |

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapeError {
    /// A page did not reach the expected state within its bound.
    #[error("Timed out after {timeout:?} waiting for {what}")]
    NavigationTimeout { what: String, timeout: Duration },

    /// An expected element is missing from the document.
    #[error("Element not found: {0}")]
    SelectorNotFound(String),

    /// The remote answered with a non-success status.
    #[error("Download of {url} failed with HTTP {status}")]
    Fetch { url: String, status: u16 },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The document did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<chromiumoxide::error::CdpError> for ScrapeError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        ScrapeError::Browser(err.to_string())
    }
}

impl ScrapeError {
    /// True for failures of the asset download step.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, ScrapeError::Fetch { .. } | ScrapeError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err = ScrapeError::Fetch {
            url: "https://example.com/a.jpg".to_string(),
            status: 404,
        };
        assert_eq!(
            err.to_string(),
            "Download of https://example.com/a.jpg failed with HTTP 404"
        );
        assert!(err.is_fetch_failure());
    }

    #[test]
    fn test_non_fetch_errors() {
        assert!(!ScrapeError::SelectorNotFound("div.x".into()).is_fetch_failure());
        assert!(!ScrapeError::Parse("bad".into()).is_fetch_failure());
    }

    #[test]
    fn test_timeout_display() {
        let err = ScrapeError::NavigationTimeout {
            what: "load state".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert!(err.to_string().contains("load state"));
        assert!(err.to_string().contains("5s"));
    }
}
