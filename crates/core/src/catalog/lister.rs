//! Discovers connectors from the catalog index page.

use std::collections::HashSet;

use regex_lite::Regex;
use reqwest::Url;
use scraper::Html;
use thiserror::Error;
use tracing::{debug, warn};

use crate::document::query::{children, element_by_id, following_siblings, table_rows};

use super::WorkItem;

/// Id of the heading that precedes the connector tables.
pub const DEFAULT_INDEX_SECTION_ID: &str = "list-of-connectors";

/// Relative link shape of a connector entry, capturing the connector name.
pub const DEFAULT_LINK_PATTERN: &str = r"^\.\./(.*)/$";

/// Errors from listing the catalog.
#[derive(Debug, Clone, Error)]
pub enum ListError {
    /// The index page does not contain the expected section.
    #[error("index section '{section_id}' not found on catalog page")]
    SectionMissing { section_id: String },

    #[error("invalid link pattern: {0}")]
    InvalidPattern(String),

    #[error("invalid index URL {url}: {message}")]
    InvalidIndexUrl { url: String, message: String },
}

/// Settings for the catalog lister.
#[derive(Debug, Clone)]
pub struct ListerConfig {
    /// URL of the index page; relative links are resolved against it.
    pub index_url: String,
    pub section_id: String,
    /// Regex with one capture group yielding the connector name.
    pub link_pattern: String,
}

impl ListerConfig {
    pub fn new(index_url: impl Into<String>) -> Self {
        Self {
            index_url: index_url.into(),
            section_id: DEFAULT_INDEX_SECTION_ID.to_string(),
            link_pattern: DEFAULT_LINK_PATTERN.to_string(),
        }
    }
}

/// Turns the index document into the list of work items.
#[derive(Debug, Clone)]
pub struct CatalogLister {
    base: Url,
    section_id: String,
    pattern: Regex,
}

impl CatalogLister {
    pub fn new(config: &ListerConfig) -> Result<Self, ListError> {
        let base = Url::parse(&config.index_url).map_err(|e| ListError::InvalidIndexUrl {
            url: config.index_url.clone(),
            message: e.to_string(),
        })?;
        let pattern = Regex::new(&config.link_pattern)
            .map_err(|e| ListError::InvalidPattern(e.to_string()))?;

        Ok(Self {
            base,
            section_id: config.section_id.clone(),
            pattern,
        })
    }

    /// URL of the index page this lister resolves links against.
    pub fn index_url(&self) -> &str {
        self.base.as_str()
    }

    /// Extract work items in discovery order.
    ///
    /// Links that do not match the pattern are skipped with a warning, as
    /// are empty or repeated names and names spanning several path segments.
    pub fn list(&self, index_html: &str) -> Result<Vec<WorkItem>, ListError> {
        let document = Html::parse_document(index_html);

        let section =
            element_by_id(&document, &self.section_id).ok_or_else(|| ListError::SectionMissing {
                section_id: self.section_id.clone(),
            })?;

        let hrefs: Vec<&str> = following_siblings(section, "table")
            .flat_map(table_rows)
            .flat_map(|row| children(row, "td"))
            .flat_map(|cell| children(cell, "a"))
            .filter_map(|a| a.value().attr("href"))
            .collect();

        debug!(candidates = hrefs.len(), "Found connector links");

        let mut seen = HashSet::new();
        let mut items = Vec::with_capacity(hrefs.len());

        for href in hrefs {
            let Some(name) = self
                .pattern
                .captures(href)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
            else {
                warn!(href, "Could not determine connector name from link");
                continue;
            };

            if name.is_empty() {
                warn!(href, "Connector link has an empty name");
                continue;
            }

            if !is_single_segment(&name) {
                warn!(href, unique_name = %name, "Connector name is not a single path segment");
                continue;
            }

            if !seen.insert(name.clone()) {
                warn!(unique_name = %name, "Duplicate connector link, keeping the first");
                continue;
            }

            let detail_locator = match self.base.join(href) {
                Ok(url) => url.to_string(),
                Err(e) => {
                    warn!(href, "Could not resolve connector link: {}", e);
                    continue;
                }
            };

            items.push(WorkItem {
                unique_name: name,
                detail_locator,
            });
        }

        Ok(items)
    }
}

/// A name usable as one path segment: no separators, not `.` or `..`.
fn is_single_segment(name: &str) -> bool {
    !name.contains(['/', '\\']) && name != "." && name != ".."
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX_URL: &str = "https://docs.example.com/connectors/connector-reference/";

    fn lister() -> CatalogLister {
        CatalogLister::new(&ListerConfig::new(INDEX_URL)).unwrap()
    }

    fn index_page(links: &[&str]) -> String {
        let rows: String = links
            .iter()
            .map(|href| format!("<tr><td><a href=\"{}\">x</a></td><td>desc</td></tr>", href))
            .collect();
        format!(
            "<html><body><h2 id=\"list-of-connectors\">List</h2><table>{}</table></body></html>",
            rows
        )
    }

    #[test]
    fn test_lists_in_discovery_order() {
        let items = lister()
            .list(&index_page(&["../zeta/", "../alpha/"]))
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].unique_name, "zeta");
        assert_eq!(
            items[0].detail_locator,
            "https://docs.example.com/connectors/zeta/"
        );
        assert_eq!(items[1].unique_name, "alpha");
    }

    #[test]
    fn test_skips_links_not_matching_pattern() {
        let items = lister()
            .list(&index_page(&["../foo/", "https://elsewhere.example.com/", "../bar"]))
            .unwrap();

        let names: Vec<_> = items.iter().map(|i| i.unique_name.as_str()).collect();
        assert_eq!(names, vec!["foo"]);
    }

    #[test]
    fn test_trims_and_dedupes_names() {
        let items = lister()
            .list(&index_page(&["../ foo /", "../foo/", "../ /"]))
            .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].unique_name, "foo");
    }

    #[test]
    fn test_skips_names_spanning_several_segments() {
        let items = lister()
            .list(&index_page(&[
                "../../../escape/",
                "../a/b/",
                "../../",
                "../..\\up/",
                ".././",
                "../ok/",
            ]))
            .unwrap();

        let names: Vec<_> = items.iter().map(|i| i.unique_name.as_str()).collect();
        assert_eq!(names, vec!["ok"]);
    }

    #[test]
    fn test_missing_section_is_parse_error() {
        let result = lister().list("<html><body><table></table></body></html>");
        assert!(matches!(result, Err(ListError::SectionMissing { .. })));
    }

    #[test]
    fn test_empty_table_lists_nothing() {
        let items = lister().list(&index_page(&[])).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_ignores_links_outside_section_tables() {
        let html = r#"
            <html><body>
              <table><tr><td><a href="../before/">b</a></td></tr></table>
              <h2 id="list-of-connectors">List</h2>
              <p><a href="../para/">p</a></p>
              <table><tr><td><a href="../inside/">i</a></td></tr></table>
            </body></html>
        "#;
        let items = lister().list(html).unwrap();
        let names: Vec<_> = items.iter().map(|i| i.unique_name.as_str()).collect();
        assert_eq!(names, vec!["inside"]);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            CatalogLister::new(&ListerConfig::new("not a url")),
            Err(ListError::InvalidIndexUrl { .. })
        ));

        let mut config = ListerConfig::new(INDEX_URL);
        config.link_pattern = "(".to_string();
        assert!(matches!(
            CatalogLister::new(&config),
            Err(ListError::InvalidPattern(_))
        ));
    }
}
