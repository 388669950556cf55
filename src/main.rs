//! Analytics query backend for the rules engine.
//!
//! Translates a small filter DSL (and the legacy JSON filter dialect it
//! must stay compatible with) into ClickHouse SQL, composes it with
//! entity/permission scoping, and executes one of four query shapes:
//! timeseries, top-N period-over-period, approximate cardinality, and
//! paginated scan.

mod abilities;
mod analytics_client;
mod config;
mod database;
mod dsl;
mod dto;
mod error;
mod handlers;
mod planners;
mod security;
mod sql;
mod validation;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::database::AnalyticsService;
use crate::dsl::RecursiveDescentParser;
use crate::handlers::{create_router, AppState};
use crate::security::{AuditLogger, SecurityService};
use crate::validation::ValidationService;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let matches = Command::new("analytics-query-backend")
        .version("1.0.0")
        .about("Analytics query backend for the rules engine")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(Arg::new("port").short('p').long("port").value_name("PORT").value_parser(clap::value_parser!(u16)))
        .arg(Arg::new("host").long("host").value_name("HOST"))
        .subcommand(Command::new("validate-config").about("Validate configuration and exit"))
        .get_matches();

    let config_path = matches.get_one::<String>("config").unwrap();

    info!("loading configuration from {config_path}");
    let mut config = Config::from_file(config_path)
        .with_context(|| format!("failed to load configuration from {config_path}"))?;

    if let Some(port) = matches.get_one::<u16>("port") {
        config.server.port = *port;
    }
    if let Some(host) = matches.get_one::<String>("host") {
        config.server.host = host.clone();
    }

    config.validate().context("configuration validation failed")?;

    if matches.subcommand_matches("validate-config").is_some() {
        info!("configuration is valid");
        return Ok(());
    }

    let config = Arc::new(config);

    info!("initializing services");
    let analytics = AnalyticsService::new(&config).await.context("failed to initialize analytics service")?;
    let security_service = SecurityService::new(config.clone()).context("failed to initialize security service")?;
    let audit_logger = AuditLogger::new(config.clone());
    let validation_service =
        ValidationService::new(config.analytics.max_scan_limit, config.analytics.max_scan_limit);

    let app_state = AppState {
        config: config.clone(),
        analytics: Arc::new(analytics),
        security_service: Arc::new(security_service),
        audit_logger: Arc::new(audit_logger),
        validation_service: Arc::new(validation_service),
        parser: Arc::new(RecursiveDescentParser),
        start_time: Instant::now(),
    };

    let app = create_router(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)),
    );

    let addr =
        SocketAddr::new(config.server.host.parse().context("invalid server host")?, config.server.port);

    info!("starting analytics query backend on {addr}");
    info!("health check: http://{addr}/health");
    info!("status: http://{addr}/status");

    print_config_summary(&config);

    let listener = tokio::net::TcpListener::bind(&addr).await.context("failed to bind to address")?;

    if let Err(e) = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("server error: {e}");
        return Err(e.into());
    }

    info!("server shutdown complete");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "analytics_query_backend=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn print_config_summary(config: &Config) {
    info!("=== configuration summary ===");
    info!("server: {}:{}", config.server.host, config.server.port);
    info!("analytics store: {}", config.analytics.url);
    info!("database: {}", config.analytics.database);
    info!("table: {}", config.analytics.table);
    info!("connection pool: {} connections", config.analytics.pool.max_size);
    info!("query timeout: {}s", config.analytics.query_timeout_secs);
    info!("max scan limit: {}", config.analytics.max_scan_limit);
    info!("===============================");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            info!("received SIGTERM, initiating graceful shutdown");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_config_loading() {
        let config_content = r#"
[server]
host = "127.0.0.1"
port = 8080
request_timeout_secs = 30
max_request_size = 1048576
enable_cors = true
cors_origins = ["http://localhost:3000"]

[analytics]
url = "http://localhost:8123"
database = "rules_engine_test"
username = "default"
password = ""
table = "events"
query_timeout_secs = 30
max_query_timeout_secs = 300
max_historical_query_window_days = 90
default_scan_limit = 100
max_scan_limit = 10000

[analytics.pool]
max_size = 10
min_idle = 2
connection_timeout_secs = 10

[security]
enable_tenant_isolation = true
jwt_secret = "test-secret-key-that-is-long-enough"
token_expiration_secs = 3600
enable_rate_limiting = true
rate_limit_per_tenant = 100
enable_audit_logging = true
allowed_tenants = []

[monitoring]
enable_metrics = true
metrics_path = "/metrics"
enable_health_check = true
health_check_path = "/health"
enable_query_logging = true
slow_query_threshold_ms = 1000
"#;

        let temp_file = "/tmp/test_analytics_config.toml";
        tokio::fs::write(temp_file, config_content).await.unwrap();

        let config = Config::from_file(temp_file).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.analytics.database, "rules_engine_test");

        let _ = tokio::fs::remove_file(temp_file).await;
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.security.jwt_secret = "this-is-a-long-enough-secret-key-for-testing".to_string();
        assert!(config.validate().is_ok());

        config.security.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());
    }
}
