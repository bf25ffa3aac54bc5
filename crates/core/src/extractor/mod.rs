//! Action extraction from a connector's documentation page.
//!
//! The page lists actions in tables after the `actions` heading. Each row
//! links to a fragment further down the page whose definition list carries
//! the operation id. Rows are collected first, then resolved against an
//! index of every element id on the page.

use std::sync::Arc;
use std::time::Instant;

use scraper::{ElementRef, Html};
use thiserror::Error;
use tracing::debug;

use crate::catalog::{ActionRecord, ConnectorRecord, WorkItem};
use crate::document::query::{
    children, element_by_id, following_siblings, table_rows, text_of, IdIndex,
};
use crate::document::{DocumentFetcher, FetchError};
use crate::metrics::{EXTRACTIONS, EXTRACTION_DURATION};

/// Id of the heading that precedes the actions tables.
pub const DEFAULT_ACTIONS_SECTION_ID: &str = "actions";

/// Errors from extracting one connector.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("failed to fetch documentation page: {0}")]
    Fetch(#[from] FetchError),
}

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub section_id: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            section_id: DEFAULT_ACTIONS_SECTION_ID.to_string(),
        }
    }
}

/// A row of the actions table before its operation id is resolved.
struct ActionRow<'a> {
    name: String,
    description: String,
    anchor: &'a str,
}

/// Produces action records from a detail document.
#[derive(Debug, Clone, Default)]
pub struct ActionExtractor {
    config: ExtractorConfig,
}

impl ActionExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Extract the actions listed on a documentation page, sorted by
    /// operation id. A page without an actions section yields nothing.
    pub fn extract(&self, detail_html: &str) -> Vec<ActionRecord> {
        let document = Html::parse_document(detail_html);

        let Some(section) = element_by_id(&document, &self.config.section_id) else {
            return Vec::new();
        };

        let rows: Vec<ActionRow<'_>> = following_siblings(section, "table")
            .flat_map(table_rows)
            .filter_map(parse_row)
            .collect();

        if rows.is_empty() {
            return Vec::new();
        }

        let ids = IdIndex::build(&document);

        let mut actions: Vec<ActionRecord> = rows
            .into_iter()
            .map(|row| {
                let operation_id = resolve_operation_id(&ids, row.anchor);
                ActionRecord {
                    is_deprecated: ActionRecord::name_marks_deprecated(&row.name),
                    name: row.name,
                    description: row.description,
                    anchor: row.anchor.to_string(),
                    operation_id,
                }
            })
            .collect();

        actions.sort_by(|a, b| a.operation_id.cmp(&b.operation_id));
        actions
    }
}

/// Reads a table row that links to an action. Header rows have no link.
fn parse_row(row: ElementRef<'_>) -> Option<ActionRow<'_>> {
    let (cell, link) = children(row, "td")
        .find_map(|cell| children(cell, "a").next().map(|a| (cell, a)))?;

    let description = following_siblings(cell, "td")
        .next()
        .map(|td| text_of(td).trim().to_string())
        .unwrap_or_default();

    Some(ActionRow {
        name: text_of(link),
        description,
        anchor: link.value().attr("href").unwrap_or_default(),
    })
}

/// Looks up the element named by the anchor's fragment and reads the first
/// definition in the list that follows it.
fn resolve_operation_id(ids: &IdIndex<'_>, anchor: &str) -> String {
    let fragment = anchor.strip_prefix('#').unwrap_or(anchor);
    if fragment.is_empty() {
        return String::new();
    }

    ids.get(fragment)
        .and_then(|target| {
            following_siblings(target, "div")
                .flat_map(|div| children(div, "dl"))
                .flat_map(|dl| children(dl, "dd"))
                .next()
        })
        .map(|dd| text_of(dd).trim().to_string())
        .unwrap_or_default()
}

/// Fetch a connector's page and merge its actions into a record.
pub async fn extract_connector(
    fetcher: Arc<dyn DocumentFetcher>,
    extractor: &ActionExtractor,
    item: &WorkItem,
) -> Result<ConnectorRecord, ExtractError> {
    let start = Instant::now();
    let result = fetcher.fetch(&item.detail_locator).await;

    let outcome = match result {
        Ok(html) => {
            let actions = extractor.extract(&html);
            debug!(
                unique_name = %item.unique_name,
                actions = actions.len(),
                "Extracted connector actions"
            );
            Ok(ConnectorRecord::new(item, actions))
        }
        Err(e) => Err(ExtractError::from(e)),
    };

    let label = if outcome.is_ok() { "success" } else { "failed" };
    EXTRACTIONS.with_label_values(&[label]).inc();
    EXTRACTION_DURATION
        .with_label_values(&[label])
        .observe(start.elapsed().as_secs_f64());

    outcome
}
