//! Records produced by the scrape: work items, actions and merged connectors.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One connector discovered on the index page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    /// Connector name taken from the relative link (non-empty, unique per run).
    pub unique_name: String,
    /// Absolute URL of the connector's documentation page.
    pub detail_locator: String,
}

/// One action listed on a connector's documentation page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    pub name: String,
    pub description: String,
    /// Fragment link from the actions table, including the leading `#`.
    pub anchor: String,
    /// Empty when the cross-reference lookup found nothing.
    pub operation_id: String,
    pub is_deprecated: bool,
}

impl ActionRecord {
    /// Deprecation is signalled only through the display name.
    pub fn name_marks_deprecated(name: &str) -> bool {
        let lower = name.to_lowercase();
        lower.contains("[deprecated]") || lower.contains("(deprecated)")
    }
}

/// A work item merged with the actions extracted from its page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorRecord {
    pub unique_name: String,
    pub documentation_url: String,
    /// Sorted by `operation_id` (ordinal).
    pub actions: Vec<ActionRecord>,
}

impl ConnectorRecord {
    pub fn new(item: &WorkItem, actions: Vec<ActionRecord>) -> Self {
        Self {
            unique_name: item.unique_name.clone(),
            documentation_url: item.detail_locator.clone(),
            actions,
        }
    }

    /// Copy of this record keeping only actions whose deprecation flag matches.
    ///
    /// Returns `None` when no action matches.
    pub fn filtered(&self, deprecated: bool) -> Option<Self> {
        let actions: Vec<ActionRecord> = self
            .actions
            .iter()
            .filter(|a| a.is_deprecated == deprecated)
            .cloned()
            .collect();

        if actions.is_empty() {
            return None;
        }

        Some(Self {
            unique_name: self.unique_name.clone(),
            documentation_url: self.documentation_url.clone(),
            actions,
        })
    }
}

/// Input of a scrape run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRequest {
    /// Restricts the run to these connectors when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_connectors: Option<BTreeSet<String>>,
}

impl ScrapeRequest {
    /// Request covering every connector in the catalog.
    pub fn all() -> Self {
        Self::default()
    }

    /// Request restricted to the given connector names.
    pub fn selected<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selected_connectors: Some(names.into_iter().map(Into::into).collect()),
        }
    }
}
