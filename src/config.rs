//! Configuration for the analytics query backend.
//!
//! Layered `config`/`toml` loading: defaults, overlaid by a TOML file,
//! overlaid by environment variables, validated once at startup. None of
//! these values are read again at query time — the query-translation core
//! never touches process-global configuration (SPEC_FULL.md §9).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub analytics: AnalyticsConfig,
    pub security: SecurityConfig,
    pub monitoring: MonitoringConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub max_request_size: usize,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

/// Connection to the analytics store (ClickHouse) and the query-planner
/// defaults that govern it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub url: Url,
    pub database: String,
    pub username: String,
    pub password: String,
    pub table: String,
    pub pool: PoolConfig,
    /// Default and maximum timeout for a single analytics-client call.
    pub query_timeout_secs: u64,
    pub max_query_timeout_secs: u64,
    /// Top-N period-over-period lookback cap (SPEC_FULL.md §4.5.3).
    pub max_historical_query_window_days: i64,
    pub default_scan_limit: u32,
    pub max_scan_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_size: u32,
    pub min_idle: u32,
    pub connection_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_tenant_isolation: bool,
    pub jwt_secret: String,
    pub token_expiration_secs: u64,
    pub enable_rate_limiting: bool,
    pub rate_limit_per_tenant: u32,
    pub enable_audit_logging: bool,
    pub allowed_tenants: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enable_metrics: bool,
    pub metrics_path: String,
    pub enable_health_check: bool,
    pub health_check_path: String,
    pub enable_query_logging: bool,
    pub slow_query_threshold_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            analytics: AnalyticsConfig::default(),
            security: SecurityConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8085,
            request_timeout_secs: 30,
            max_request_size: 2 * 1024 * 1024,
            enable_cors: true,
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("http://localhost:8123").unwrap(),
            database: "rules_engine".to_string(),
            username: "default".to_string(),
            password: String::new(),
            table: "events".to_string(),
            pool: PoolConfig::default(),
            query_timeout_secs: 300,
            max_query_timeout_secs: 600,
            max_historical_query_window_days: 90,
            default_scan_limit: 100,
            max_scan_limit: 10_000,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { max_size: 20, min_idle: 2, connection_timeout_secs: 10 }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_tenant_isolation: true,
            jwt_secret: "change-me-in-production-change-me-in-production".to_string(),
            token_expiration_secs: 3600,
            enable_rate_limiting: true,
            rate_limit_per_tenant: 1000,
            enable_audit_logging: true,
            allowed_tenants: vec![],
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: true,
            metrics_path: "/metrics".to_string(),
            enable_health_check: true,
            health_check_path: "/health".to_string(),
            enable_query_logging: true,
            slow_query_threshold_ms: 1000,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {path}"))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("SERVER_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("SERVER_PORT") {
            config.server.port = port.parse().context("invalid SERVER_PORT")?;
        }
        if let Ok(url) = std::env::var("CLICKHOUSE_URL") {
            config.analytics.url = Url::parse(&url).context("invalid CLICKHOUSE_URL")?;
        }
        if let Ok(database) = std::env::var("CLICKHOUSE_DATABASE") {
            config.analytics.database = database;
        }
        if let Ok(table) = std::env::var("CLICKHOUSE_TABLE") {
            config.analytics.table = table;
        }
        if let Ok(username) = std::env::var("CLICKHOUSE_USERNAME") {
            config.analytics.username = username;
        }
        if let Ok(password) = std::env::var("CLICKHOUSE_PASSWORD") {
            config.analytics.password = password;
        }
        if let Ok(jwt_secret) = std::env::var("JWT_SECRET") {
            config.security.jwt_secret = jwt_secret;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("server port cannot be 0"));
        }
        if self.analytics.database.is_empty() {
            return Err(anyhow::anyhow!("analytics database name cannot be empty"));
        }
        if self.analytics.table.is_empty() {
            return Err(anyhow::anyhow!("analytics table name cannot be empty"));
        }
        if self.analytics.pool.max_size == 0 {
            return Err(anyhow::anyhow!("connection pool max_size cannot be 0"));
        }
        if self.analytics.pool.min_idle > self.analytics.pool.max_size {
            return Err(anyhow::anyhow!("pool min_idle cannot be greater than max_size"));
        }
        if self.analytics.max_historical_query_window_days <= 0 {
            return Err(anyhow::anyhow!("max_historical_query_window_days must be positive"));
        }
        if self.analytics.max_scan_limit < self.analytics.default_scan_limit {
            return Err(anyhow::anyhow!("max_scan_limit cannot be less than default_scan_limit"));
        }
        if self.security.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!("JWT secret must be at least 32 characters long"));
        }
        Ok(())
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.analytics.pool.connection_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.analytics.query_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn table_ref(&self) -> String {
        crate::planners::table_ref(&self.analytics.database, &self.analytics.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn rejects_backwards_scan_limits() {
        let mut config = Config::default();
        config.analytics.max_scan_limit = 10;
        config.analytics.default_scan_limit = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_short_jwt_secret() {
        let mut config = Config::default();
        config.security.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());
    }
}
