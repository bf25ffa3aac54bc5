//! Document fetching abstraction.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from fetching a document.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("connection to {url} failed: {message}")]
    ConnectionFailed { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("failed to read body of {url}: {message}")]
    Body { url: String, message: String },

    #[error("invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

impl FetchError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::ConnectionFailed { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Body { .. } | FetchError::InvalidUrl { .. } => false,
        }
    }
}

/// Fetches the raw markup behind a URL.
///
/// Implementations must be free of observable side effects: a workflow step
/// that crashed mid-flight is re-executed on replay.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;

    /// Name of this fetcher backend.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let url = "https://docs.example.com".to_string();
        assert!(FetchError::Timeout { url: url.clone() }.is_transient());
        assert!(FetchError::Status {
            url: url.clone(),
            status: 503
        }
        .is_transient());
        assert!(FetchError::Status {
            url: url.clone(),
            status: 429
        }
        .is_transient());
        assert!(!FetchError::Status {
            url: url.clone(),
            status: 404
        }
        .is_transient());
        assert!(!FetchError::InvalidUrl {
            url,
            message: "bad".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = FetchError::Status {
            url: "https://docs.example.com/foo/".to_string(),
            status: 404,
        };
        assert_eq!(err.to_string(), "HTTP 404 for https://docs.example.com/foo/");
    }
}
