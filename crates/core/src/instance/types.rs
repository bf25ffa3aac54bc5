//! Orchestration instance types.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::InstanceError;

/// Lifecycle state of an orchestration instance.
///
/// `Pending -> Running -> {Completed | Failed}`, plus `Pending -> Failed`
/// when a run cannot even start. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl InstanceState {
    /// Returns true if the state is terminal (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstanceState::Completed | InstanceState::Failed)
    }

    /// Returns true if the state machine allows moving to `next`.
    pub fn can_transition_to(&self, next: InstanceState) -> bool {
        matches!(
            (self, next),
            (InstanceState::Pending, InstanceState::Running)
                | (InstanceState::Pending, InstanceState::Failed)
                | (InstanceState::Running, InstanceState::Completed)
                | (InstanceState::Running, InstanceState::Failed)
        )
    }

    /// Value stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::Completed => "completed",
            InstanceState::Failed => "failed",
        }
    }
}

impl FromStr for InstanceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InstanceState::Pending),
            "running" => Ok(InstanceState::Running),
            "completed" => Ok(InstanceState::Completed),
            "failed" => Ok(InstanceState::Failed),
            other => Err(other.to_string()),
        }
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A durable run of a named workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationInstance {
    /// UUID v4.
    pub id: String,
    /// Workflow name.
    pub name: String,
    pub state: InstanceState,
    /// Workflow input exactly as submitted.
    pub input: Value,
    /// Result on success, error payload on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One completed checkpoint in an instance's step log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub instance_id: String,
    pub step_id: String,
    /// Order in which the step completed, starting at 1.
    pub seq: i64,
    pub result: Value,
    pub completed_at: DateTime<Utc>,
}

/// Category of a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ParseError,
    IncompleteSelection,
    ExtractionFailed,
    PublishFailed,
    Internal,
}

/// Output stored on a failed instance and returned to pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: ErrorKind,
    pub message: String,
    /// Selected connectors that were not found in the catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,
}

impl ErrorPayload {
    pub fn new(error: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
            missing: None,
        }
    }

    pub fn with_missing(mut self, missing: Vec<String>) -> Self {
        self.missing = Some(missing);
        self
    }
}

/// Parses a stored state value, reporting values this build does not know.
pub(crate) fn parse_state(instance_id: &str, raw: &str) -> Result<InstanceState, InstanceError> {
    raw.parse().map_err(|state| InstanceError::UnexpectedState {
        instance_id: instance_id.to_string(),
        state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!InstanceState::Pending.is_terminal());
        assert!(!InstanceState::Running.is_terminal());
        assert!(InstanceState::Completed.is_terminal());
        assert!(InstanceState::Failed.is_terminal());
    }

    #[test]
    fn test_transitions_are_monotone() {
        use InstanceState::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Failed));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));

        assert!(!Running.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Running));
        assert!(!Completed.can_transition_to(Completed));
    }

    #[test]
    fn test_state_round_trip_through_str() {
        for state in [
            InstanceState::Pending,
            InstanceState::Running,
            InstanceState::Completed,
            InstanceState::Failed,
        ] {
            assert_eq!(state.as_str().parse::<InstanceState>().unwrap(), state);
        }
    }

    #[test]
    fn test_unknown_state_is_unexpected() {
        let err = parse_state("abc", "suspended").unwrap_err();
        assert!(matches!(
            err,
            InstanceError::UnexpectedState { ref state, .. } if state == "suspended"
        ));
    }

    #[test]
    fn test_error_payload_serialization() {
        let payload = ErrorPayload::new(ErrorKind::IncompleteSelection, "Not all found")
            .with_missing(vec!["baz".to_string()]);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["error"], "incomplete_selection");
        assert_eq!(json["message"], "Not all found");
        assert_eq!(json["missing"][0], "baz");

        let plain = serde_json::to_value(ErrorPayload::new(ErrorKind::Internal, "x")).unwrap();
        assert!(plain.get("missing").is_none());
    }
}
