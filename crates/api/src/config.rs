use serde::Deserialize;
use std::net::SocketAddr;

use domain::services::hierarchy::ParentRule;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub hierarchy: HierarchyConfig,
    #[serde(default)]
    pub boundaries: BoundariesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl DatabaseConfig {
    /// Converts to the persistence layer's pool configuration.
    pub fn pool_config(&self) -> persistence::db::DatabaseConfig {
        persistence::db::DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            connect_timeout_secs: self.connect_timeout_secs,
            idle_timeout_secs: self.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Hierarchy parent-legality rule selection.
#[derive(Debug, Clone, Deserialize)]
pub struct HierarchyConfig {
    /// "required" restricts each type to its single canonical parent type;
    /// "ancestors" accepts any strictly-higher type.
    #[serde(default = "default_parent_rule")]
    pub parent_rule: String,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            parent_rule: default_parent_rule(),
        }
    }
}

impl HierarchyConfig {
    pub fn rule(&self) -> ParentRule {
        match self.parent_rule.as_str() {
            "ancestors" => ParentRule::AllowedAncestors,
            _ => ParentRule::RequiredParent,
        }
    }
}

/// Country boundary provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BoundariesConfig {
    #[serde(default = "default_boundaries_url")]
    pub base_url: String,

    #[serde(default = "default_boundaries_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for BoundariesConfig {
    fn default() -> Self {
        Self {
            base_url: default_boundaries_url(),
            timeout_ms: default_boundaries_timeout_ms(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_parent_rule() -> String {
    "required".to_string()
}
fn default_boundaries_url() -> String {
    "https://www.geoboundaries.org/api/current/gbOpen".to_string()
}
fn default_boundaries_timeout_ms() -> u64 {
    30000
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with GF__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("GF").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], self.server.port)))
    }
}
