//! Replay-safe execution context handed to the workflow body.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::instance::{InstanceError, InstanceStore};
use crate::metrics::STEPS_REPLAYED;

use super::types::RunError;

/// Gives the workflow checkpointed steps.
///
/// A step whose id is already in the instance's log returns the logged
/// result without running. Otherwise it runs, its result is appended to the
/// log, and the logged value is returned. Cloning is cheap; clones share the
/// replay log.
#[derive(Clone)]
pub struct WorkflowContext {
    instance_id: String,
    store: Arc<dyn InstanceStore>,
    replay: Arc<HashMap<String, Value>>,
}

impl WorkflowContext {
    /// Load the step log of `instance_id` for replay.
    pub fn load(instance_id: &str, store: Arc<dyn InstanceStore>) -> Result<Self, InstanceError> {
        let replay = store
            .load_steps(instance_id)?
            .into_iter()
            .map(|step| (step.step_id, step.result))
            .collect();

        Ok(Self {
            instance_id: instance_id.to_string(),
            store,
            replay: Arc::new(replay),
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Number of steps available for replay.
    pub fn replayable_steps(&self) -> usize {
        self.replay.len()
    }

    /// Run `f` as the checkpointed step `step_id`.
    pub async fn step<T, F, Fut>(&self, step_id: &str, f: F) -> Result<T, RunError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RunError>>,
    {
        if let Some(logged) = self.replay.get(step_id) {
            debug!(instance_id = %self.instance_id, step_id, "Replaying step");
            STEPS_REPLAYED.inc();
            return self.decode(step_id, logged.clone());
        }

        let value = f().await?;
        let encoded = serde_json::to_value(&value).map_err(|e| RunError::Codec {
            step_id: step_id.to_string(),
            message: e.to_string(),
        })?;

        let stored = self
            .store
            .record_step(&self.instance_id, step_id, &encoded)
            .map_err(|source| RunError::Store {
                step_id: step_id.to_string(),
                source,
            })?;

        debug!(instance_id = %self.instance_id, step_id, "Step completed");

        if stored == encoded {
            Ok(value)
        } else {
            // Another execution logged this step first; its result wins.
            self.decode(step_id, stored)
        }
    }

    /// Update the instance's progress message. Failures are logged only.
    pub fn set_custom_status(&self, status: &str) {
        if let Err(e) = self.store.set_custom_status(&self.instance_id, status) {
            warn!(
                instance_id = %self.instance_id,
                "Failed to update custom status: {}", e
            );
        }
    }

    fn decode<T: DeserializeOwned>(&self, step_id: &str, value: Value) -> Result<T, RunError> {
        serde_json::from_value(value).map_err(|e| RunError::Codec {
            step_id: step_id.to_string(),
            message: e.to_string(),
        })
    }
}
