//! Mock document fetcher for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::document::{DocumentFetcher, FetchError};

/// A recorded fetch for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedFetch {
    pub url: String,
    pub timestamp: Instant,
}

/// Mock implementation of the DocumentFetcher trait.
///
/// Serves pages from an in-memory map keyed by URL. Unknown URLs answer
/// with HTTP 404. Per-URL delays, failures and hangs can be configured to
/// drive the orchestrator through slow, failing and interrupted runs.
///
/// # Example
///
/// ```rust,ignore
/// use scrapeflow_core::testing::{MockFetcher, fixtures};
///
/// let fetcher = MockFetcher::new();
/// fetcher.set_page(INDEX_URL, fixtures::index_page(&["foo", "bar"])).await;
/// fetcher.set_delay(FOO_URL, Duration::from_millis(50)).await;
///
/// let html = fetcher.fetch(INDEX_URL).await?;
/// assert_eq!(fetcher.fetch_count(INDEX_URL).await, 1);
/// ```
#[derive(Debug, Default)]
pub struct MockFetcher {
    pages: Arc<RwLock<HashMap<String, String>>>,
    delays: Arc<RwLock<HashMap<String, Duration>>>,
    failures: Arc<RwLock<HashMap<String, FetchError>>>,
    /// URLs whose fetch never completes.
    hanging: Arc<RwLock<HashSet<String>>>,
    fetches: Arc<RwLock<Vec<RecordedFetch>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` for `url`.
    pub async fn set_page(&self, url: &str, html: impl Into<String>) {
        self.pages.write().await.insert(url.to_string(), html.into());
    }

    /// Wait `delay` before answering requests for `url`.
    pub async fn set_delay(&self, url: &str, delay: Duration) {
        self.delays.write().await.insert(url.to_string(), delay);
    }

    /// Answer requests for `url` with `error`.
    pub async fn set_failure(&self, url: &str, error: FetchError) {
        self.failures.write().await.insert(url.to_string(), error);
    }

    /// Make requests for `url` wait forever.
    pub async fn set_hanging(&self, url: &str) {
        self.hanging.write().await.insert(url.to_string());
    }

    /// Undo [`set_hanging`](Self::set_hanging) and [`set_failure`](Self::set_failure).
    pub async fn clear_faults(&self, url: &str) {
        self.hanging.write().await.remove(url);
        self.failures.write().await.remove(url);
    }

    /// All fetches made so far, in call order.
    pub async fn recorded_fetches(&self) -> Vec<RecordedFetch> {
        self.fetches.read().await.clone()
    }

    /// Number of times `url` was requested.
    pub async fn fetch_count(&self, url: &str) -> usize {
        self.fetches
            .read()
            .await
            .iter()
            .filter(|f| f.url == url)
            .count()
    }

    pub async fn total_fetches(&self) -> usize {
        self.fetches.read().await.len()
    }
}

#[async_trait]
impl DocumentFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.fetches.write().await.push(RecordedFetch {
            url: url.to_string(),
            timestamp: Instant::now(),
        });

        let delay = self.delays.read().await.get(url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let hangs = self.hanging.read().await.contains(url);
        if hangs {
            std::future::pending::<()>().await;
        }

        if let Some(error) = self.failures.read().await.get(url) {
            return Err(error.clone());
        }

        self.pages
            .read()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
