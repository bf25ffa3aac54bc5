use std::sync::Arc;

use scrapeflow_core::{Config, SanitizedConfig, ScrapeOrchestrator, StatusGateway};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<ScrapeOrchestrator>,
    gateway: StatusGateway,
}

impl AppState {
    pub fn new(config: Config, orchestrator: Arc<ScrapeOrchestrator>) -> Self {
        let gateway = StatusGateway::new(
            Arc::clone(&orchestrator),
            config.gateway.retry_after_secs,
        );
        Self {
            config,
            orchestrator,
            gateway,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &ScrapeOrchestrator {
        &self.orchestrator
    }

    pub fn gateway(&self) -> &StatusGateway {
        &self.gateway
    }
}
