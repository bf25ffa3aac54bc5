//! Instance storage trait and types.

use serde_json::Value;
use thiserror::Error;

use super::{InstanceState, OrchestrationInstance, StepRecord};

/// Error type for instance store operations.
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("Instance not found: {0}")]
    NotFound(String),

    /// Cannot perform operation due to current state.
    #[error("Cannot {operation} instance {instance_id}: current state is {current_state}")]
    InvalidState {
        instance_id: String,
        current_state: String,
        operation: String,
    },

    /// The stored state is not one this engine knows how to interpret.
    #[error("Instance {instance_id} has unexpected state '{state}'")]
    UnexpectedState { instance_id: String, state: String },

    #[error("Database error: {0}")]
    Database(String),
}

/// Filter for querying instances.
#[derive(Debug, Clone)]
pub struct InstanceFilter {
    /// Filter by state.
    pub state: Option<InstanceState>,
    /// Only instances that have not reached a terminal state.
    pub non_terminal: bool,
    pub limit: i64,
    pub offset: i64,
}

impl Default for InstanceFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceFilter {
    pub fn new() -> Self {
        Self {
            state: None,
            non_terminal: false,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_state(mut self, state: InstanceState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn non_terminal(mut self) -> Self {
        self.non_terminal = true;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }
}

/// Durable storage for orchestration instances and their step logs.
///
/// State changes are compare-and-set: an update only applies when the
/// instance is still in the expected state.
pub trait InstanceStore: Send + Sync {
    /// Persist a new `Pending` instance.
    fn create(&self, name: &str, input: &Value) -> Result<OrchestrationInstance, InstanceError>;

    /// Get an instance by ID.
    fn get(&self, id: &str) -> Result<Option<OrchestrationInstance>, InstanceError>;

    /// List instances matching the filter, oldest first.
    fn list(&self, filter: &InstanceFilter) -> Result<Vec<OrchestrationInstance>, InstanceError>;

    /// Move from `from` to `to` if the instance is still in `from`.
    fn transition(
        &self,
        id: &str,
        from: InstanceState,
        to: InstanceState,
    ) -> Result<OrchestrationInstance, InstanceError>;

    /// Mark a running instance as completed with its output.
    fn complete(&self, id: &str, output: &Value) -> Result<OrchestrationInstance, InstanceError>;

    /// Mark a pending or running instance as failed with an error payload.
    fn fail(&self, id: &str, error: &Value) -> Result<OrchestrationInstance, InstanceError>;

    /// Update the free-form progress message of a non-terminal instance.
    fn set_custom_status(&self, id: &str, status: &str) -> Result<(), InstanceError>;

    /// Append a step result to the log. If the step is already logged the
    /// existing result is kept and returned.
    fn record_step(
        &self,
        instance_id: &str,
        step_id: &str,
        result: &Value,
    ) -> Result<Value, InstanceError>;

    /// All logged steps of an instance in completion order.
    fn load_steps(&self, instance_id: &str) -> Result<Vec<StepRecord>, InstanceError>;

    /// Permanently delete a terminal instance and its step log.
    /// Returns the deleted instance.
    fn delete(&self, id: &str) -> Result<OrchestrationInstance, InstanceError>;
}
