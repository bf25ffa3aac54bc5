//! Asynchronous job protocol over orchestration instances.
//!
//! Starting a scrape answers immediately with a poll location. Polling
//! answers "accepted" until the instance is terminal, then the output or
//! the error payload. The HTTP layer maps [`GatewayResponse`] to status codes.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::catalog::ScrapeRequest;
use crate::instance::{InstanceError, InstanceState, OrchestrationInstance};
use crate::orchestrator::{OrchestratorError, ScrapeOrchestrator};

/// Errors the gateway cannot turn into a protocol response.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The stored instance is in a state the engine does not know.
    #[error("instance {instance_id} is in unexpected state '{state}'")]
    UnexpectedState { instance_id: String, state: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<OrchestratorError> for GatewayError {
    fn from(e: OrchestratorError) -> Self {
        match e {
            OrchestratorError::Store(InstanceError::UnexpectedState { instance_id, state }) => {
                GatewayError::UnexpectedState { instance_id, state }
            }
            other => GatewayError::Internal(other.to_string()),
        }
    }
}

/// A running (or not yet started) instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedStatus {
    pub id: String,
    pub status_query_get_uri: String,
    #[serde(skip)]
    pub retry_after_secs: u32,
    pub runtime_status: InstanceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_status: Option<String>,
}

/// Protocol-level answer to a poll.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayResponse {
    /// Still running; poll again later.
    Accepted(AcceptedStatus),
    /// Finished successfully with this output.
    Completed(Value),
    /// Finished with this error payload.
    Failed(Value),
    NotFound,
}

/// Result of a purge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurgeOutcome {
    Purged,
    NotFound,
    /// Only terminal instances can be purged.
    NotTerminal(InstanceState),
}

/// Poll location of an instance under `base_url`.
pub fn poll_location(base_url: &str, instance_id: &str) -> String {
    format!(
        "{}/scrape/instance/{}",
        base_url.trim_end_matches('/'),
        instance_id
    )
}

/// Maps orchestration instances onto the async job protocol.
pub struct StatusGateway {
    orchestrator: Arc<ScrapeOrchestrator>,
    retry_after_secs: u32,
}

impl StatusGateway {
    pub fn new(orchestrator: Arc<ScrapeOrchestrator>, retry_after_secs: u32) -> Self {
        Self {
            orchestrator,
            retry_after_secs,
        }
    }

    pub fn retry_after_secs(&self) -> u32 {
        self.retry_after_secs
    }

    /// Start a new scrape and return its poll handle.
    pub fn start(
        &self,
        request: &ScrapeRequest,
        base_url: &str,
    ) -> Result<AcceptedStatus, GatewayError> {
        let instance = self.orchestrator.start_new(request)?;
        Ok(self.accepted(&instance, base_url))
    }

    /// Report the state of an instance.
    pub fn poll(&self, instance_id: &str, base_url: &str) -> Result<GatewayResponse, GatewayError> {
        let Some(instance) = self.orchestrator.get_status(instance_id)? else {
            return Ok(GatewayResponse::NotFound);
        };

        Ok(match instance.state {
            InstanceState::Pending | InstanceState::Running => {
                GatewayResponse::Accepted(self.accepted(&instance, base_url))
            }
            InstanceState::Completed => {
                GatewayResponse::Completed(instance.output.unwrap_or(Value::Null))
            }
            InstanceState::Failed => GatewayResponse::Failed(instance.output.unwrap_or(Value::Null)),
        })
    }

    /// Delete a terminal instance and its history.
    pub fn purge(&self, instance_id: &str) -> Result<PurgeOutcome, GatewayError> {
        match self.orchestrator.purge(instance_id) {
            Ok(_) => Ok(PurgeOutcome::Purged),
            Err(OrchestratorError::Store(InstanceError::NotFound(_))) => Ok(PurgeOutcome::NotFound),
            Err(OrchestratorError::Store(InstanceError::InvalidState { current_state, .. })) => {
                let state = current_state.parse().map_err(|state| {
                    GatewayError::UnexpectedState {
                        instance_id: instance_id.to_string(),
                        state,
                    }
                })?;
                Ok(PurgeOutcome::NotTerminal(state))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn accepted(&self, instance: &OrchestrationInstance, base_url: &str) -> AcceptedStatus {
        AcceptedStatus {
            id: instance.id.clone(),
            status_query_get_uri: poll_location(base_url, &instance.id),
            retry_after_secs: self.retry_after_secs,
            runtime_status: instance.state,
            custom_status: instance.custom_status.clone(),
        }
    }
}
