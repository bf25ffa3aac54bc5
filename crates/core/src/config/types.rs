use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::orchestrator::OrchestratorConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Snapshot publishing. The workflow skips the publish step when absent.
    #[serde(default)]
    pub publisher: Option<PublisherConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally visible base URL used to build poll locations.
    /// Falls back to the request's Host header when unset.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: None,
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("scrapeflow.db")
}

/// Scraper configuration: where the catalog lives and how pages are fetched.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    /// Catalog index page.
    #[serde(default = "default_index_url")]
    pub index_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Extra attempts for transient fetch failures (default: 0)
    #[serde(default)]
    pub fetch_retries: u32,
    /// Base delay between retries, multiplied by the attempt number.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            index_url: default_index_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout(),
            fetch_retries: 0,
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

fn default_index_url() -> String {
    "https://docs.microsoft.com/en-us/connectors/connector-reference/".to_string()
}

fn default_user_agent() -> String {
    concat!("scrapeflow/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_timeout() -> u32 {
    30
}

fn default_retry_backoff() -> u64 {
    500
}

/// Async job protocol settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Value of the `retry-after` header on 202 responses, in seconds.
    #[serde(default = "default_retry_after")]
    pub retry_after_secs: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            retry_after_secs: default_retry_after(),
        }
    }
}

fn default_retry_after() -> u32 {
    20
}

/// Publisher configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublisherConfig {
    pub backend: PublisherBackend,
    /// Required when backend = "fs"
    #[serde(default)]
    pub fs: Option<FsPublisherConfig>,
    /// Required when backend = "github"
    #[serde(default)]
    pub github: Option<GitHubPublisherConfig>,
}

/// Available publish targets
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PublisherBackend {
    Fs,
    #[serde(rename = "github")]
    GitHub,
}

impl PublisherBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublisherBackend::Fs => "fs",
            PublisherBackend::GitHub => "github",
        }
    }
}

/// Directory snapshot settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FsPublisherConfig {
    pub output_dir: PathBuf,
}

/// GitHub repository snapshot settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHubPublisherConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Personal access token with contents write permission.
    pub token: String,
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub scraper: ScraperConfig,
    pub orchestrator: OrchestratorConfig,
    pub gateway: GatewayConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<SanitizedPublisherConfig>,
}

/// Sanitized publisher config
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedPublisherConfig {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fs: Option<FsPublisherConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<SanitizedGitHubConfig>,
}

/// Sanitized GitHub config (token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedGitHubConfig {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub api_url: String,
    pub token_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            scraper: config.scraper.clone(),
            orchestrator: config.orchestrator.clone(),
            gateway: config.gateway.clone(),
            publisher: config.publisher.as_ref().map(|p| SanitizedPublisherConfig {
                backend: p.backend.as_str().to_string(),
                fs: p.fs.clone(),
                github: p.github.as_ref().map(|g| SanitizedGitHubConfig {
                    owner: g.owner.clone(),
                    repo: g.repo.clone(),
                    branch: g.branch.clone(),
                    api_url: g.api_url.clone(),
                    token_configured: !g.token.is_empty(),
                }),
            }),
        }
    }
}
