use super::{types::Config, ConfigError, PublisherBackend};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Scraper index URL is set
/// - Gateway retry-after is positive
/// - The selected publisher backend has its section filled in
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.scraper.index_url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "scraper.index_url cannot be empty".to_string(),
        ));
    }

    if config.gateway.retry_after_secs == 0 {
        return Err(ConfigError::ValidationError(
            "gateway.retry_after_secs must be greater than 0".to_string(),
        ));
    }

    if let Some(publisher) = &config.publisher {
        match publisher.backend {
            PublisherBackend::Fs => {
                if publisher.fs.is_none() {
                    return Err(ConfigError::ValidationError(
                        "publisher.fs section is required when backend = \"fs\"".to_string(),
                    ));
                }
            }
            PublisherBackend::GitHub => {
                let github = publisher.github.as_ref().ok_or_else(|| {
                    ConfigError::ValidationError(
                        "publisher.github section is required when backend = \"github\""
                            .to_string(),
                    )
                })?;
                if github.owner.is_empty() || github.repo.is_empty() {
                    return Err(ConfigError::ValidationError(
                        "publisher.github.owner and publisher.github.repo are required"
                            .to_string(),
                    ));
                }
                if github.token.is_empty() {
                    return Err(ConfigError::ValidationError(
                        "publisher.github.token is required".to_string(),
                    ));
                }
            }
        }
    }

    Ok(())
}
