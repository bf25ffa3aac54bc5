//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the scrape orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum extraction tasks running at once per instance (0 = unlimited).
    #[serde(default = "default_max_concurrent_extractions")]
    pub max_concurrent_extractions: usize,

    /// Resume instances left unfinished by a previous process on start.
    #[serde(default = "default_resume_on_start")]
    pub resume_on_start: bool,
}

fn default_max_concurrent_extractions() -> usize {
    8
}

fn default_resume_on_start() -> bool {
    true
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_extractions: default_max_concurrent_extractions(),
            resume_on_start: default_resume_on_start(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_concurrent_extractions, 8);
        assert!(config.resume_on_start);
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
            max_concurrent_extractions = 0
            resume_on_start = false
        "#;
        let config: OrchestratorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.max_concurrent_extractions, 0);
        assert!(!config.resume_on_start);
    }
}
