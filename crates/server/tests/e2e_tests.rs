//! End-to-end tests with mocked external dependencies.
//!
//! These tests run the full HTTP stack in-process with a mock document
//! fetcher serving the connector index and connector pages.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use scrapeflow_core::{
    config::{FsPublisherConfig, GitHubPublisherConfig, PublisherConfig},
    Config, InstanceStore, PublisherBackend, ScrapeWorkflow, SqliteInstanceStore,
};
use serde_json::json;
use tempfile::TempDir;

use common::{fixtures, poll_path, TestFixture, HOST};

// =============================================================================
// Basic API Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/health").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_endpoint_redacts_token() {
    let mut config = Config::default();
    config.publisher = Some(PublisherConfig {
        backend: PublisherBackend::GitHub,
        fs: None,
        github: Some(GitHubPublisherConfig {
            owner: "acme".to_string(),
            repo: "connectors".to_string(),
            branch: "main".to_string(),
            token: "ghp_very_secret".to_string(),
            api_url: "https://api.github.com".to_string(),
            timeout_secs: 30,
        }),
    });
    let fixture = TestFixture::with_config(config).await;

    let response = fixture.get("/config").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["server"]["port"], 8080);
    assert_eq!(response.body["publisher"]["backend"], "github");
    assert_eq!(
        response.body["publisher"]["github"]["token_configured"],
        true
    );
    assert!(!response.body.to_string().contains("ghp_very_secret"));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    fixture.get("/health").await;

    let (status, text) = fixture.get_text("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("scrapeflow_http_requests_total"));
    assert!(text.contains("scrapeflow_orchestrator_running 1"));
}

#[tokio::test]
async fn test_orchestrator_status_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/orchestrator/status").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["running"], true);
    assert_eq!(response.body["pending_count"], 0);
}

// =============================================================================
// Scrape protocol
// =============================================================================

#[tokio::test]
async fn test_start_returns_accepted_with_poll_headers() {
    let fixture = TestFixture::new().await;
    fixture.serve_catalog(&["foo", "bar"]).await;

    let response = fixture.post_empty("/scrape").await;
    assert_status!(response, StatusCode::ACCEPTED);

    let id = response.body["id"].as_str().unwrap().to_string();
    let expected = format!("http://{}/scrape/instance/{}", HOST, id);
    assert_eq!(response.header("location"), Some(expected.as_str()));
    assert_eq!(response.header("retry-after"), Some("20"));
    assert_eq!(response.body["statusQueryGetUri"], expected);

    fixture.wait_for(&id).await;
}

#[tokio::test]
async fn test_full_catalog_completes_sorted() {
    let fixture = TestFixture::new().await;
    fixture.serve_catalog(&["foo", "bar"]).await;

    let started = fixture.post_empty("/scrape").await;
    let id = started.body["id"].as_str().unwrap().to_string();
    fixture.wait_for(&id).await;

    let location = started.header("location").unwrap().to_string();
    let response = fixture.get(&poll_path(&location)).await;
    assert_status!(response, StatusCode::OK);

    let records = response.body.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["uniqueName"], "bar");
    assert_eq!(records[1]["uniqueName"], "foo");
    assert_eq!(
        records[1]["documentationUrl"],
        fixtures::detail_url("foo")
    );
    assert_eq!(records[1]["actions"][0]["operationId"], "GetItem");
    assert_eq!(records[1]["actions"][0]["anchor"], "#get-item");
    assert_eq!(records[1]["actions"][0]["isDeprecated"], false);
}

#[tokio::test]
async fn test_page_without_actions_section_polls_as_empty_actions() {
    let fixture = TestFixture::new().await;
    fixture
        .fetcher
        .set_page(fixtures::INDEX_URL, fixtures::index_page(&["foo", "bar"]))
        .await;
    fixture
        .fetcher
        .set_page(
            &fixtures::detail_url("foo"),
            fixtures::connector_page(&[(
                "Create [deprecated]",
                "Creates a foo.",
                "create",
                Some("CreateFoo"),
            )]),
        )
        .await;
    fixture
        .fetcher
        .set_page(
            &fixtures::detail_url("bar"),
            "<html><body><h1>Bar</h1><p>No actions.</p></body></html>",
        )
        .await;

    let started = fixture.post_empty("/scrape").await;
    let id = started.body["id"].as_str().unwrap().to_string();
    fixture.wait_for(&id).await;

    let location = started.header("location").unwrap().to_string();
    let response = fixture.get(&poll_path(&location)).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(
        response.body,
        json!([
            {
                "uniqueName": "bar",
                "documentationUrl": fixtures::detail_url("bar"),
                "actions": []
            },
            {
                "uniqueName": "foo",
                "documentationUrl": fixtures::detail_url("foo"),
                "actions": [{
                    "name": "Create [deprecated]",
                    "description": "Creates a foo.",
                    "anchor": "#create",
                    "operationId": "CreateFoo",
                    "isDeprecated": true
                }]
            }
        ])
    );
}

#[tokio::test]
async fn test_selected_connectors_only() {
    let fixture = TestFixture::new().await;
    fixture.serve_catalog(&["foo", "bar", "qux"]).await;

    let started = fixture
        .post("/scrape", json!({ "selectedConnectors": ["qux", "foo"] }))
        .await;
    assert_status!(started, StatusCode::ACCEPTED);
    let id = started.body["id"].as_str().unwrap().to_string();
    fixture.wait_for(&id).await;

    let response = fixture.get(&format!("/scrape/instance/{}", id)).await;
    assert_status!(response, StatusCode::OK);
    let names: Vec<&str> = response
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["uniqueName"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["foo", "qux"]);
    assert_eq!(fixture.fetcher.fetch_count(&fixtures::detail_url("bar")).await, 0);
}

#[tokio::test]
async fn test_incomplete_selection_is_bad_request() {
    let fixture = TestFixture::new().await;
    fixture.serve_catalog(&["foo", "bar"]).await;

    let started = fixture
        .post("/scrape", json!({ "selectedConnectors": ["foo", "baz"] }))
        .await;
    let id = started.body["id"].as_str().unwrap().to_string();
    fixture.wait_for(&id).await;

    let response = fixture.get(&format!("/scrape/instance/{}", id)).await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "incomplete_selection");
    assert_eq!(
        response.body["message"],
        "Not all selected connectors were found; run aborted"
    );
    assert_eq!(response.body["missing"], json!(["baz"]));
}

#[tokio::test]
async fn test_unknown_instance_is_not_found() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/scrape/instance/does-not-exist").await;
    assert_status!(response, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"], "not found");
}

#[tokio::test]
async fn test_running_instance_keeps_answering_accepted() {
    let fixture = TestFixture::new().await;
    fixture.serve_catalog(&["foo", "bar"]).await;
    fixture.fetcher.set_hanging(&fixtures::detail_url("foo")).await;

    let started = fixture.post_empty("/scrape").await;
    let location = started.header("location").unwrap().to_string();

    for _ in 0..3 {
        let response = fixture.get(&poll_path(&location)).await;
        assert_status!(response, StatusCode::ACCEPTED);
        assert_eq!(response.header("location"), Some(location.as_str()));
        assert_eq!(response.header("retry-after"), Some("20"));
        let runtime = response.body["runtimeStatus"].as_str().unwrap();
        assert!(runtime == "pending" || runtime == "running");
    }

    fixture.orchestrator.stop().await;
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let fixture = TestFixture::new().await;
    let response = fixture.post_raw("/scrape", "{selectedConnectors:").await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "parse_error");
}

#[tokio::test]
async fn test_missing_index_section_fails_with_parse_error() {
    let fixture = TestFixture::new().await;
    fixture
        .fetcher
        .set_page(fixtures::INDEX_URL, "<html><body><h1>Moved</h1></body></html>")
        .await;

    let started = fixture.post_empty("/scrape").await;
    let id = started.body["id"].as_str().unwrap().to_string();
    fixture.wait_for(&id).await;

    let response = fixture.get(&format!("/scrape/instance/{}", id)).await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "parse_error");
}

#[tokio::test]
async fn test_unknown_stored_state_is_server_error() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("scrapeflow.db");
    let store: Arc<dyn InstanceStore> = Arc::new(SqliteInstanceStore::new(&db_path).unwrap());
    let fixture = TestFixture::with_store(Config::default(), store.clone()).await;

    let id = store.create(ScrapeWorkflow::NAME, &json!({})).unwrap().id;
    rusqlite::Connection::open(&db_path)
        .unwrap()
        .execute(
            "UPDATE instances SET state = 'suspended' WHERE id = ?1",
            [&id],
        )
        .unwrap();

    let response = fixture.get(&format!("/scrape/instance/{}", id)).await;
    assert_status!(response, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("suspended"));

    let response = fixture.delete(&format!("/scrape/instance/{}", id)).await;
    assert_status!(response, StatusCode::INTERNAL_SERVER_ERROR);
}

// =============================================================================
// Purge
// =============================================================================

#[tokio::test]
async fn test_delete_instance() {
    let fixture = TestFixture::new().await;
    fixture.serve_catalog(&["foo"]).await;

    let started = fixture.post_empty("/scrape").await;
    let id = started.body["id"].as_str().unwrap().to_string();
    fixture.wait_for(&id).await;

    let path = format!("/scrape/instance/{}", id);
    let response = fixture.delete(&path).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    assert_status!(fixture.get(&path).await, StatusCode::NOT_FOUND);
    assert_status!(fixture.delete(&path).await, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_running_instance_conflicts() {
    let fixture = TestFixture::new().await;
    fixture.serve_catalog(&["foo"]).await;
    fixture.fetcher.set_hanging(&fixtures::detail_url("foo")).await;

    let started = fixture.post_empty("/scrape").await;
    let id = started.body["id"].as_str().unwrap().to_string();

    let response = fixture.delete(&format!("/scrape/instance/{}", id)).await;
    assert_status!(response, StatusCode::CONFLICT);

    fixture.orchestrator.stop().await;
}

// =============================================================================
// Publishing
// =============================================================================

#[tokio::test]
async fn test_completed_run_is_published() {
    let mut config = Config::default();
    config.publisher = Some(PublisherConfig {
        backend: PublisherBackend::Fs,
        fs: Some(FsPublisherConfig {
            output_dir: "unused".into(),
        }),
        github: None,
    });
    let fixture = TestFixture::with_config(config).await;
    fixture.serve_catalog(&["foo", "bar"]).await;

    let started = fixture.post_empty("/scrape").await;
    let id = started.body["id"].as_str().unwrap().to_string();
    fixture.wait_for(&id).await;

    assert_status!(
        fixture.get(&format!("/scrape/instance/{}", id)).await,
        StatusCode::OK
    );

    let published = fixture.publisher.published().await;
    assert_eq!(published.len(), 1);
    assert!(published[0].get("All.json").is_some());
    assert!(published[0].get("connectors/foo.json").is_some());
}

#[tokio::test]
async fn test_publish_failure_fails_the_run() {
    let mut config = Config::default();
    config.publisher = Some(PublisherConfig {
        backend: PublisherBackend::Fs,
        fs: Some(FsPublisherConfig {
            output_dir: "unused".into(),
        }),
        github: None,
    });
    let fixture = TestFixture::with_config(config).await;
    fixture.serve_catalog(&["foo"]).await;
    fixture.publisher.fail_next("remote rejected").await;

    let started = fixture.post_empty("/scrape").await;
    let id = started.body["id"].as_str().unwrap().to_string();
    fixture.wait_for(&id).await;

    let response = fixture.get(&format!("/scrape/instance/{}", id)).await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "publish_failed");
}
