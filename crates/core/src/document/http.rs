//! reqwest-backed document fetcher.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::ScraperConfig;
use crate::metrics::{FETCH_DURATION, FETCH_REQUESTS};

use super::{DocumentFetcher, FetchError};

/// Fetches documentation pages over HTTP.
pub struct HttpFetcher {
    client: Client,
    retries: u32,
    retry_backoff: Duration,
}

impl HttpFetcher {
    /// Create a fetcher from the scraper configuration.
    pub fn new(config: &ScraperConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            retries: config.fetch_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else if e.is_builder() {
                FetchError::InvalidUrl {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            } else {
                FetchError::ConnectionFailed {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 0;
        loop {
            let start = Instant::now();
            let result = self.fetch_once(url).await;
            let outcome = if result.is_ok() { "success" } else { "error" };
            FETCH_DURATION
                .with_label_values(&[outcome])
                .observe(start.elapsed().as_secs_f64());
            FETCH_REQUESTS.with_label_values(&[outcome]).inc();

            match result {
                Ok(body) => {
                    debug!(url, bytes = body.len(), "Fetched document");
                    return Ok(body);
                }
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    warn!(url, attempt, "Transient fetch failure, retrying: {}", e);
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_from_default_config() {
        let fetcher = HttpFetcher::new(&ScraperConfig::default()).unwrap();
        assert_eq!(fetcher.name(), "http");
        assert_eq!(fetcher.retries, 0);
    }

    #[tokio::test]
    async fn test_invalid_url_is_not_retried() {
        let config = ScraperConfig {
            fetch_retries: 3,
            retry_backoff_ms: 1,
            ..ScraperConfig::default()
        };
        let fetcher = HttpFetcher::new(&config).unwrap();

        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }
}
