//! Durable orchestration instances and their step logs.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteInstanceStore;
pub use store::{InstanceError, InstanceFilter, InstanceStore};
pub use types::{
    ErrorKind, ErrorPayload, InstanceState, OrchestrationInstance, StepRecord,
};
