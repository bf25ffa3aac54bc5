//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with a mock document fetcher and an in-memory instance store, so the full
//! scrape protocol can be exercised without network access.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use scrapeflow_core::{
    testing::{MockFetcher, MockPublisher},
    ActionExtractor, CatalogLister, Config, Dispatcher, InstanceStore, ListerConfig,
    ScrapeOrchestrator, ScrapeWorkflow, SqliteInstanceStore,
};
use scrapeflow_server::state::AppState;

/// Re-export fixtures for test convenience
pub use scrapeflow_core::testing::fixtures;

/// Host header sent with every request.
pub const HOST: &str = "scrapeflow.test";

/// Test fixture for E2E testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_scrape() {
///     let fixture = TestFixture::new().await;
///     fixture.serve_catalog(&["foo"]).await;
///
///     let response = fixture.post_empty("/scrape").await;
///     assert_eq!(response.status, 202);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock fetcher - serves index and connector pages
    pub fetcher: Arc<MockFetcher>,
    /// Mock publisher - records published snapshots
    pub publisher: Arc<MockPublisher>,
    /// Orchestrator behind the router
    pub orchestrator: Arc<ScrapeOrchestrator>,
    /// Instance store behind the orchestrator
    pub store: Arc<dyn InstanceStore>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl TestFixture {
    /// Create a new test fixture with default configuration.
    pub async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(config: Config) -> Self {
        let store: Arc<dyn InstanceStore> =
            Arc::new(SqliteInstanceStore::in_memory().expect("Failed to create instance store"));
        Self::with_store(config, store).await
    }

    /// Create a test fixture over an existing instance store.
    pub async fn with_store(mut config: Config, store: Arc<dyn InstanceStore>) -> Self {
        config.scraper.index_url = fixtures::INDEX_URL.to_string();

        let fetcher = Arc::new(MockFetcher::new());
        let publisher = Arc::new(MockPublisher::new());

        let workflow = ScrapeWorkflow::new(
            fetcher.clone(),
            CatalogLister::new(&ListerConfig::new(&config.scraper.index_url))
                .expect("Failed to create lister"),
            ActionExtractor::default(),
            Dispatcher::new(config.orchestrator.max_concurrent_extractions),
        );
        let workflow = if config.publisher.is_some() {
            workflow.with_publisher(publisher.clone())
        } else {
            workflow
        };

        let orchestrator = Arc::new(ScrapeOrchestrator::new(Arc::clone(&store), workflow));
        orchestrator.start_fresh();

        let state = Arc::new(AppState::new(config, Arc::clone(&orchestrator)));
        let router = scrapeflow_server::api::create_router(state);

        Self {
            router,
            fetcher,
            publisher,
            orchestrator,
            store,
        }
    }

    /// Serve an index listing `names`, each with a one-action connector page.
    pub async fn serve_catalog(&self, names: &[&str]) {
        self.fetcher
            .set_page(fixtures::INDEX_URL, fixtures::index_page(names))
            .await;
        for name in names {
            self.fetcher
                .set_page(
                    &fixtures::detail_url(name),
                    fixtures::connector_page(&[(
                        "Get item",
                        "Gets an item.",
                        "get-item",
                        Some("GetItem"),
                    )]),
                )
                .await;
        }
    }

    /// Wait until the instance's workflow task has finished.
    pub async fn wait_for(&self, id: &str) {
        self.orchestrator.wait_for(id).await;
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body.to_string())).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.request("POST", path, Some(body.to_string())).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Fetch a path and return the raw body text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .header("Host", HOST)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<String>) -> TestResponse {
        let mut request_builder = Request::builder()
            .method(method)
            .uri(path)
            .header("Host", HOST);

        let body = if let Some(raw) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(raw)
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// Path part of a poll location.
pub fn poll_path(location: &str) -> String {
    location
        .strip_prefix(&format!("http://{}", HOST))
        .unwrap_or(location)
        .to_string()
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
