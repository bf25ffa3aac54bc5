//! Mock publisher for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::publisher::{PublishError, PublishReceipt, Publisher, Snapshot};

/// Mock implementation of the Publisher trait.
///
/// Records every published snapshot and can be told to fail the next
/// publish.
#[derive(Debug, Default)]
pub struct MockPublisher {
    published: Arc<RwLock<Vec<Snapshot>>>,
    /// If set, the next publish will fail with this message.
    next_error: Arc<RwLock<Option<String>>>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next publish fail with an API error.
    pub async fn fail_next(&self, message: impl Into<String>) {
        *self.next_error.write().await = Some(message.into());
    }

    /// Snapshots published so far.
    pub async fn published(&self) -> Vec<Snapshot> {
        self.published.read().await.clone()
    }

    pub async fn publish_count(&self) -> usize {
        self.published.read().await.len()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, snapshot: &Snapshot) -> Result<PublishReceipt, PublishError> {
        if let Some(message) = self.next_error.write().await.take() {
            return Err(PublishError::Api(message));
        }

        let mut published = self.published.write().await;
        published.push(snapshot.clone());

        Ok(PublishReceipt {
            backend: self.name().to_string(),
            location: format!("mock-{}", published.len()),
            files: snapshot.len(),
            published_at: Utc::now(),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
