//! Durable scrape orchestration.
//!
//! An instance moves `Pending -> Running -> Completed | Failed`. The workflow
//! body is a fixed sequence of checkpointed steps:
//! - **list-catalog**: fetch the index page and list connectors
//! - **extract:<name>**: one step per selected connector, run in parallel
//! - **publish**: only when a publisher is configured
//!
//! Completed steps are logged in the instance store, so a run interrupted by
//! a restart continues where it stopped.

mod config;
mod context;
mod runner;
mod types;
mod workflow;

pub use config::OrchestratorConfig;
pub use context::WorkflowContext;
pub use runner::ScrapeOrchestrator;
pub use types::{OrchestratorError, OrchestratorStatus, RunError};
pub use workflow::{extract_step, ScrapeWorkflow, LIST_STEP, PUBLISH_STEP};
