//! The analytics client seam.
//!
//! `analytics_client.query(sql) -> {column_names, rows}` is an external
//! collaborator (SPEC_FULL.md §6): the core never executes queries itself,
//! it only builds SQL and post-processes whatever comes back. Because each
//! planner's result shape is request-dependent (dynamic dimension columns
//! for timeseries, a single cardinality column for group-by, and so on),
//! rows are modeled as loosely-typed JSON objects rather than one fixed
//! ClickHouse `Row` struct per query — the fixed-schema approach this
//! codebase otherwise uses for dashboard queries doesn't fit here.
//!
//! This is the only suspension point in the whole core (SPEC_FULL.md §5).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("analytics client error: {0}")]
    Client(String),
    #[error("failed to decode analytics response: {0}")]
    Decode(String),
}

/// One row, keyed by column name. Planners read fields by name rather than
/// position, matching the dict-based access the prior backend used.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Default)]
pub struct RowSet {
    pub rows: Vec<Row>,
}

impl RowSet {
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }
}

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<RowSet, AnalyticsError>;
}

/// ClickHouse-backed implementation. Issues `sql` with a `FORMAT
/// JSONEachRow` suffix and parses each output line as a JSON object.
pub struct ClickHouseExecutor {
    client: clickhouse::Client,
    timeout: Duration,
}

impl ClickHouseExecutor {
    pub fn new(client: clickhouse::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl QueryExecutor for ClickHouseExecutor {
    async fn execute(&self, sql: &str) -> Result<RowSet, AnalyticsError> {
        let full_sql = format!("{sql} FORMAT JSONEachRow");

        let bytes = tokio::time::timeout(self.timeout, self.client.query(&full_sql).fetch_bytes("JSONEachRow"))
            .await
            .map_err(|_| AnalyticsError::Client("query timed out".to_string()))?
            .map_err(|e| AnalyticsError::Client(e.to_string()))?;

        let mut rows = Vec::new();
        for line in bytes.split(|b| *b == b'\n') {
            if line.is_empty() {
                continue;
            }
            let value: Value =
                serde_json::from_slice(line).map_err(|e| AnalyticsError::Decode(e.to_string()))?;
            match value {
                Value::Object(obj) => rows.push(obj),
                other => return Err(AnalyticsError::Decode(format!("expected object row, got {other}"))),
            }
        }

        Ok(RowSet { rows })
    }
}
