//! Snapshot publishing.
//!
//! A finished scrape is partitioned into a set of JSON files and handed to a
//! [`Publisher`], which makes the whole set visible at once.

mod fs;
mod github;
mod snapshot;

pub use fs::FsPublisher;
pub use github::{build_tree_entries, GitHubPublisher, TreeEntry, TreeItem};
pub use snapshot::{
    check_relative_path, connector_path, partition, Snapshot, ALL_FILE, CONNECTORS_DIR,
    CURRENT_FILE, DEPRECATED_FILE,
};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{PublisherBackend, PublisherConfig};

/// Errors from building or publishing a snapshot.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to serialize snapshot: {0}")]
    Serialization(String),

    #[error("filesystem error: {0}")]
    Io(String),

    #[error("GitHub API error: {0}")]
    Api(String),

    #[error("publisher misconfigured: {0}")]
    Config(String),

    /// A snapshot path that would leave the publish root.
    #[error("invalid snapshot path '{0}'")]
    InvalidPath(String),
}

/// What a publisher reports after a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReceipt {
    /// Backend name, e.g. "fs" or "github".
    pub backend: String,
    /// Output directory or commit SHA.
    pub location: String,
    pub files: usize,
    pub published_at: DateTime<Utc>,
}

/// A destination for scrape snapshots.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Replace the published snapshot with `snapshot`.
    async fn publish(&self, snapshot: &Snapshot) -> Result<PublishReceipt, PublishError>;

    /// Backend name used in logs and metrics.
    fn name(&self) -> &str;
}

/// Create the publisher selected by the configuration.
pub fn create_publisher(config: &PublisherConfig) -> Result<Arc<dyn Publisher>, PublishError> {
    match config.backend {
        PublisherBackend::Fs => {
            let fs = config
                .fs
                .as_ref()
                .ok_or_else(|| PublishError::Config("missing [publisher.fs] section".into()))?;
            Ok(Arc::new(FsPublisher::new(fs.output_dir.clone())))
        }
        PublisherBackend::GitHub => {
            let github = config.github.as_ref().ok_or_else(|| {
                PublishError::Config("missing [publisher.github] section".into())
            })?;
            Ok(Arc::new(GitHubPublisher::new(github.clone())?))
        }
    }
}
