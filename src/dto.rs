//! Request/response DTOs for the analytics query HTTP surface.
//!
//! These are the wire shapes the four planner endpoints accept and return
//! (SPEC_FULL.md §3, §6). They carry the request straight through to a
//! `planners::QueryScope` once the `query_filter` string has been parsed
//! and the caller's abilities resolved; none of the translation/composition
//! semantics live here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::planners::scan::Order;
use crate::sql::composer::EntityFilter;

fn default_topn_limit() -> u32 {
    100
}

fn default_scan_limit() -> u32 {
    100
}

fn default_precision() -> f64 {
    0.0
}

fn default_compare() -> bool {
    true
}

fn default_order() -> Order {
    Order::Asc
}

/// Fields shared by all four query requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryScopeRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub query_filter: String,
    #[serde(default)]
    pub entity: Option<EntityFilter>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeseriesRequest {
    #[serde(flatten)]
    pub scope: QueryScopeRequest,
    pub granularity: String,
    #[serde(default)]
    pub aggregation_dimensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopNRequest {
    #[serde(flatten)]
    pub scope: QueryScopeRequest,
    pub dimension: String,
    #[serde(default = "default_topn_limit")]
    pub limit: u32,
    #[serde(default = "default_precision")]
    pub precision: f64,
    #[serde(default = "default_compare")]
    pub compare: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardinalityRequest {
    #[serde(flatten)]
    pub scope: QueryScopeRequest,
    pub dimension: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    #[serde(flatten)]
    pub scope: QueryScopeRequest,
    #[serde(default = "default_scan_limit")]
    pub limit: u32,
    #[serde(default = "default_order")]
    pub order: Order,
    #[serde(default)]
    pub next_page: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardinalityResponse {
    pub cardinality: i64,
}

/// `GET /health` — a liveness probe only; does not exercise the analytics
/// store (see `status` for that).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
}

/// `GET /status` — readiness, including a round trip to the analytics
/// store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub analytics_store: ComponentStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatus {
    pub healthy: bool,
    pub error: Option<String>,
}
