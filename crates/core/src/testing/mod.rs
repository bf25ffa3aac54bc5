//! Testing utilities and mock implementations.
//!
//! Mocks for the two external collaborators (document fetching and snapshot
//! publishing) plus HTML fixtures shaped like the documentation site, so the
//! orchestrator can be exercised end to end without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use scrapeflow_core::testing::{fixtures, MockFetcher};
//!
//! let fetcher = MockFetcher::new();
//! fetcher.set_page(fixtures::INDEX_URL, fixtures::index_page(&["foo", "bar"])).await;
//! fetcher
//!     .set_page(
//!         &fixtures::detail_url("foo"),
//!         fixtures::connector_page(&[("Send", "Sends.", "send", Some("Send"))]),
//!     )
//!     .await;
//! ```

mod mock_fetcher;
mod mock_publisher;

pub use mock_fetcher::{MockFetcher, RecordedFetch};
pub use mock_publisher::MockPublisher;

/// Test fixtures and helper functions.
pub mod fixtures {
    /// Index URL the fixtures' relative links resolve against.
    pub const INDEX_URL: &str = "https://docs.example.com/en-us/connectors/connector-reference/";

    /// Absolute documentation URL of a connector listed by [`index_page`].
    pub fn detail_url(unique_name: &str) -> String {
        format!("https://docs.example.com/en-us/connectors/{}/", unique_name)
    }

    /// An index page listing `names` in one table after the connectors heading.
    pub fn index_page(names: &[&str]) -> String {
        let rows: String = names
            .iter()
            .map(|name| {
                format!(
                    "<tr><td><a href=\"../{name}/\">{name}</a></td><td>Connector {name}</td></tr>\n"
                )
            })
            .collect();

        format!(
            r#"<html><body>
<h1>Connector reference</h1>
<h2 id="list-of-connectors">List of connectors</h2>
<table>
<tr><th>Connector</th><th>Description</th></tr>
{rows}</table>
</body></html>"#
        )
    }

    /// A connector page with one actions-table row per entry.
    ///
    /// Entries are `(name, description, fragment, operation_id)`. When the
    /// operation id is `None` no definition is emitted for the fragment.
    pub fn connector_page(actions: &[(&str, &str, &str, Option<&str>)]) -> String {
        let rows: String = actions
            .iter()
            .map(|(name, description, fragment, _)| {
                format!(
                    "<tr><td><a href=\"#{fragment}\">{name}</a></td><td>{description}</td></tr>\n"
                )
            })
            .collect();

        let definitions: String = actions
            .iter()
            .filter_map(|(name, _, fragment, operation_id)| {
                operation_id.map(|op| {
                    format!(
                        "<h3 id=\"{fragment}\">{name}</h3>\n<div><dl><dt>Operation ID:</dt><dd>{op}</dd></dl></div>\n"
                    )
                })
            })
            .collect();

        format!(
            r#"<html><body>
<h1>Connector</h1>
<h2 id="actions">Actions</h2>
<table>
<tr><th>Name</th><th>Description</th></tr>
{rows}</table>
{definitions}</body></html>"#
        )
    }
}
