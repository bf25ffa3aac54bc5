//! Scrape orchestrator implementation.
//!
//! Each instance runs as its own tokio task. Instances survive restarts:
//! on start every non-terminal instance is resumed, and its completed steps
//! are replayed from the step log instead of being executed again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::catalog::ScrapeRequest;
use crate::instance::{
    ErrorPayload, InstanceFilter, InstanceState, InstanceStore, OrchestrationInstance,
};
use crate::metrics::{INSTANCES_FINISHED, INSTANCES_RESUMED, INSTANCES_STARTED};

use super::context::WorkflowContext;
use super::types::{OrchestratorError, OrchestratorStatus, RunError};
use super::workflow::ScrapeWorkflow;

type TaskMap = Arc<Mutex<HashMap<String, JoinHandle<()>>>>;

/// Starts, resumes and tracks scrape instances.
pub struct ScrapeOrchestrator {
    store: Arc<dyn InstanceStore>,
    workflow: Arc<ScrapeWorkflow>,

    // Runtime state
    running: Arc<AtomicBool>,
    tasks: TaskMap,
}

impl ScrapeOrchestrator {
    /// Create a new orchestrator.
    pub fn new(store: Arc<dyn InstanceStore>, workflow: ScrapeWorkflow) -> Self {
        Self {
            store,
            workflow: Arc::new(workflow),
            running: Arc::new(AtomicBool::new(false)),
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start the orchestrator and resume instances left unfinished by a
    /// previous process. Returns the number of resumed instances.
    pub fn start(&self) -> Result<usize, OrchestratorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already running");
            return Ok(0);
        }

        info!("Starting scrape orchestrator");
        let resumed = self.recover_unfinished_instances()?;
        info!(resumed, "Scrape orchestrator started");
        Ok(resumed)
    }

    /// Start the orchestrator without resuming anything.
    pub fn start_fresh(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already running");
        }
    }

    /// Stop the orchestrator, aborting in-flight instances.
    ///
    /// Aborted instances stay non-terminal in the store and are resumed by
    /// the next [`start`](Self::start).
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            debug!("Orchestrator was not started, aborting stray instance tasks");
        }

        info!("Stopping scrape orchestrator");

        let handles: Vec<(String, JoinHandle<()>)> =
            self.tasks.lock().unwrap().drain().collect();

        for (id, handle) in handles {
            handle.abort();
            let _ = handle.await;
            debug!(instance_id = %id, "Aborted instance task");
        }

        info!("Scrape orchestrator stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Persist a new instance for `request` and start running it.
    pub fn start_new(
        &self,
        request: &ScrapeRequest,
    ) -> Result<OrchestrationInstance, OrchestratorError> {
        let input = serde_json::to_value(request)
            .map_err(|e| OrchestratorError::Serialization(e.to_string()))?;
        let instance = self.store.create(ScrapeWorkflow::NAME, &input)?;

        INSTANCES_STARTED.inc();
        info!(instance_id = %instance.id, "Started scrape instance");

        self.spawn_instance(&instance.id);
        Ok(instance)
    }

    /// Current record of an instance.
    pub fn get_status(&self, id: &str) -> Result<Option<OrchestrationInstance>, OrchestratorError> {
        Ok(self.store.get(id)?)
    }

    /// Delete a terminal instance and its step log.
    pub fn purge(&self, id: &str) -> Result<OrchestrationInstance, OrchestratorError> {
        let instance = self.store.delete(id)?;
        info!(instance_id = %id, "Purged instance");
        Ok(instance)
    }

    /// Wait until the task driving `id` in this process has finished.
    /// Returns immediately when no such task exists.
    pub async fn wait_for(&self, id: &str) {
        let handle = self.tasks.lock().unwrap().remove(id);
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Get current orchestrator status.
    pub fn status(&self) -> OrchestratorStatus {
        let active_instances = self
            .tasks
            .lock()
            .unwrap()
            .values()
            .filter(|h| !h.is_finished())
            .count();

        let count = |state| {
            self.store
                .list(&InstanceFilter::new().with_state(state).with_limit(-1))
                .map(|v| v.len())
                .unwrap_or(0)
        };

        OrchestratorStatus {
            running: self.is_running(),
            active_instances,
            pending_count: count(InstanceState::Pending),
            running_count: count(InstanceState::Running),
        }
    }

    /// Resume every instance that has not reached a terminal state.
    fn recover_unfinished_instances(&self) -> Result<usize, OrchestratorError> {
        let unfinished = self
            .store
            .list(&InstanceFilter::new().non_terminal().with_limit(-1))?;

        let mut resumed = 0;
        for instance in unfinished {
            if self.is_active(&instance.id) {
                continue;
            }
            info!(
                instance_id = %instance.id,
                state = %instance.state,
                "Resuming unfinished instance"
            );
            INSTANCES_RESUMED.inc();
            self.spawn_instance(&instance.id);
            resumed += 1;
        }

        Ok(resumed)
    }

    fn is_active(&self, id: &str) -> bool {
        self.tasks
            .lock()
            .unwrap()
            .get(id)
            .is_some_and(|h| !h.is_finished())
    }

    fn spawn_instance(&self, id: &str) {
        let store = self.store.clone();
        let workflow = self.workflow.clone();
        let tasks = self.tasks.clone();
        let instance_id = id.to_string();

        // Hold the map while spawning so the task's own removal cannot run
        // before the handle is inserted.
        let mut map = self.tasks.lock().unwrap();
        let handle = tokio::spawn(async move {
            run_instance(store, workflow, &instance_id).await;
            tasks.lock().unwrap().remove(&instance_id);
        });
        map.insert(id.to_string(), handle);
    }
}

/// Drive one instance to a terminal state.
async fn run_instance(
    store: Arc<dyn InstanceStore>,
    workflow: Arc<ScrapeWorkflow>,
    instance_id: &str,
) {
    let instance = match store.get(instance_id) {
        Ok(Some(instance)) => instance,
        Ok(None) => {
            warn!(instance_id, "Instance disappeared before it could run");
            return;
        }
        Err(e) => {
            error!(instance_id, "Failed to load instance: {}", e);
            return;
        }
    };

    if instance.state.is_terminal() {
        debug!(instance_id, "Instance already finished");
        return;
    }

    let request: ScrapeRequest = match serde_json::from_value(instance.input.clone()) {
        Ok(request) => request,
        Err(e) => {
            finish_failed(
                &store,
                instance_id,
                RunError::InvalidInput(e.to_string()).to_payload(),
            );
            return;
        }
    };

    if instance.state == InstanceState::Pending {
        if let Err(e) = store.transition(instance_id, InstanceState::Pending, InstanceState::Running)
        {
            error!(instance_id, "Failed to mark instance running: {}", e);
            return;
        }
    }

    let ctx = match WorkflowContext::load(instance_id, store.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!(instance_id, "Failed to load step log: {}", e);
            return;
        }
    };

    debug!(
        instance_id,
        replayable_steps = ctx.replayable_steps(),
        "Running workflow"
    );

    match workflow.run(&ctx, &request).await {
        Ok(records) => {
            let output = match serde_json::to_value(&records) {
                Ok(output) => output,
                Err(e) => {
                    let payload = RunError::Codec {
                        step_id: "output".to_string(),
                        message: e.to_string(),
                    }
                    .to_payload();
                    finish_failed(&store, instance_id, payload);
                    return;
                }
            };

            match store.complete(instance_id, &output) {
                Ok(_) => {
                    INSTANCES_FINISHED.with_label_values(&["completed"]).inc();
                    info!(instance_id, connectors = records.len(), "Instance completed");
                }
                Err(e) => error!(instance_id, "Failed to complete instance: {}", e),
            }
        }
        Err(e) => {
            error!(instance_id, "Instance failed: {}", e);
            finish_failed(&store, instance_id, e.to_payload());
        }
    }
}

fn finish_failed(store: &Arc<dyn InstanceStore>, instance_id: &str, payload: ErrorPayload) {
    let output = serde_json::to_value(&payload).unwrap_or_default();
    match store.fail(instance_id, &output) {
        Ok(_) => {
            INSTANCES_FINISHED.with_label_values(&["failed"]).inc();
        }
        Err(e) => error!(instance_id, "Failed to mark instance failed: {}", e),
    }
}
