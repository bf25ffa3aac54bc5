//! Types for the scrape orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::ListError;
use crate::dispatcher::DispatchError;
use crate::document::FetchError;
use crate::extractor::ExtractError;
use crate::instance::{ErrorKind, ErrorPayload, InstanceError};
use crate::publisher::PublishError;

/// Errors from driving instances (not from the workflow itself).
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("instance store error: {0}")]
    Store(#[from] InstanceError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Why a workflow run failed. Stored on the instance as an [`ErrorPayload`].
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid scrape request: {0}")]
    InvalidInput(String),

    #[error("failed to fetch catalog index: {0}")]
    IndexFetch(FetchError),

    #[error(transparent)]
    List(#[from] ListError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),

    #[error("step {step_id}: {source}")]
    Store {
        step_id: String,
        #[source]
        source: InstanceError,
    },

    #[error("step {step_id}: stored result could not be decoded: {message}")]
    Codec { step_id: String, message: String },
}

impl RunError {
    /// Error payload reported to pollers.
    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            RunError::InvalidInput(_) => ErrorPayload::new(ErrorKind::ParseError, self.to_string()),
            RunError::List(ListError::SectionMissing { .. }) => {
                ErrorPayload::new(ErrorKind::ParseError, self.to_string())
            }
            RunError::Dispatch(DispatchError::IncompleteSelection { missing }) => {
                ErrorPayload::new(
                    ErrorKind::IncompleteSelection,
                    "Not all selected connectors were found; run aborted",
                )
                .with_missing(missing.clone())
            }
            RunError::Dispatch(_) | RunError::Extract(_) => {
                ErrorPayload::new(ErrorKind::ExtractionFailed, self.to_string())
            }
            RunError::Publish(_) => ErrorPayload::new(ErrorKind::PublishFailed, self.to_string()),
            RunError::IndexFetch(_)
            | RunError::List(_)
            | RunError::Store { .. }
            | RunError::Codec { .. } => ErrorPayload::new(ErrorKind::Internal, self.to_string()),
        }
    }
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Whether the orchestrator is running.
    pub running: bool,
    /// Workflow tasks currently executing in this process.
    pub active_instances: usize,
    /// Instances waiting to start.
    pub pending_count: usize,
    /// Instances marked running in the store.
    pub running_count: usize,
}
