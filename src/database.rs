//! Bootstrap for the analytics store connection (SPEC_FULL.md §3A,
//! §4.7/§6 "Configuration loading and connection pooling to the analytics
//! store").
//!
//! This is ambient glue, not part of the core's tested surface: it opens
//! the ClickHouse client, wraps it in the `QueryExecutor` seam the
//! planners depend on, and holds the `feature_name -> entity_type` map
//! the composer consults for entity expansion. None of this is read again
//! mid-request — the query-translation core never touches process-global
//! state (SPEC_FULL.md §9).

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::analytics_client::{ClickHouseExecutor, QueryExecutor};
use crate::config::Config;
use crate::sql::composer::{new_feature_entity_type_map, FeatureEntityTypeMap};

/// Everything a query planner needs that lives for the lifetime of the
/// process rather than a single request.
pub struct AnalyticsService {
    executor: ClickHouseExecutor,
    table_ref: String,
    feature_map: FeatureEntityTypeMap,
}

impl AnalyticsService {
    pub async fn new(config: &Config) -> Result<Self> {
        let client = clickhouse::Client::default()
            .with_url(config.analytics.url.as_str())
            .with_database(&config.analytics.database)
            .with_user(&config.analytics.username)
            .with_password(&config.analytics.password)
            .with_compression(clickhouse::Compression::Lz4);

        client
            .query("SELECT 1")
            .fetch_one::<u8>()
            .await
            .context("failed to connect to the analytics store")?;

        let executor = ClickHouseExecutor::new(client, Duration::from_secs(config.analytics.query_timeout_secs));

        info!(
            database = %config.analytics.database,
            table = %config.analytics.table,
            "connected to analytics store"
        );

        Ok(Self {
            executor,
            table_ref: config.table_ref(),
            // The real mapping is populated by the engine-startup
            // collaborator (SPEC_FULL.md §6); absent that collaborator
            // here, the map starts empty and is hot-swappable later.
            feature_map: new_feature_entity_type_map(Default::default()),
        })
    }

    pub fn executor(&self) -> &dyn QueryExecutor {
        &self.executor
    }

    pub fn table_ref(&self) -> &str {
        &self.table_ref
    }

    pub fn feature_map(&self) -> &FeatureEntityTypeMap {
        &self.feature_map
    }

    pub async fn health_check(&self) -> Result<()> {
        self.executor
            .execute("SELECT 1")
            .await
            .context("analytics store health check failed")?;
        Ok(())
    }
}
