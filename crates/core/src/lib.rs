pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod document;
pub mod extractor;
pub mod gateway;
pub mod instance;
pub mod metrics;
pub mod orchestrator;
pub mod publisher;
pub mod testing;

pub use catalog::{
    ActionRecord, CatalogLister, ConnectorRecord, ListError, ListerConfig, ScrapeRequest, WorkItem,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, PublisherBackend,
    SanitizedConfig,
};
pub use dispatcher::{select, DispatchError, Dispatcher};
pub use document::{DocumentFetcher, FetchError, HttpFetcher};
pub use extractor::{extract_connector, ActionExtractor, ExtractError, ExtractorConfig};
pub use gateway::{
    poll_location, AcceptedStatus, GatewayError, GatewayResponse, PurgeOutcome, StatusGateway,
};
pub use instance::{
    ErrorKind, ErrorPayload, InstanceError, InstanceFilter, InstanceState, InstanceStore,
    OrchestrationInstance, SqliteInstanceStore, StepRecord,
};
pub use orchestrator::{
    OrchestratorConfig, OrchestratorError, OrchestratorStatus, RunError, ScrapeOrchestrator,
    ScrapeWorkflow, WorkflowContext,
};
pub use publisher::{
    create_publisher, partition, FsPublisher, GitHubPublisher, PublishError, PublishReceipt,
    Publisher, Snapshot,
};
