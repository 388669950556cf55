//! HTTP surface: the four query-planner endpoints plus health/status/metrics
//! (SPEC_FULL.md §6).
//!
//! Each query handler follows the same shape: authenticate, validate the
//! request DTO, parse `query_filter` into a predicate tree, resolve the
//! caller's abilities, build a `QueryScope`, hand it to the relevant
//! planner. None of this is part of the core's tested surface — it is the
//! glue a production deployment needs around it.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{info, warn};

use crate::abilities::TenantScopedAbility;
use crate::config::Config;
use crate::database::AnalyticsService;
use crate::dsl::QueryParser;
use crate::dto::{
    CardinalityRequest, CardinalityResponse, ComponentStatus, HealthResponse, ScanRequest,
    StatusResponse, TimeseriesRequest, TopNRequest,
};
use crate::error::ApiError;
use crate::planners::{groupby, scan, timeseries, topn, QueryScope};
use crate::security::{AuditLogger, AuditResult, Claims, SecurityService};
use crate::sql::ast::CallMap;
use crate::validation::ValidationService;

pub struct AppState {
    pub config: Arc<Config>,
    pub analytics: Arc<AnalyticsService>,
    pub security_service: Arc<SecurityService>,
    pub audit_logger: Arc<AuditLogger>,
    pub validation_service: Arc<ValidationService>,
    pub parser: Arc<dyn QueryParser>,
    pub start_time: Instant,
}

fn abilities_for(claims: &Claims) -> Vec<Arc<dyn crate::sql::composer::Ability>> {
    vec![Arc::new(TenantScopedAbility { dimension: "tenant_id".to_string(), tenant_id: claims.tenant_id.clone() })]
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Claims, ApiError> {
    state
        .security_service
        .validate_request(headers)
        .await
        .map_err(|e| ApiError::Unauthorized(e.to_string()))
}

fn parse_filter(state: &AppState, query_filter: &str) -> Result<Option<crate::sql::ast::Node>, ApiError> {
    if query_filter.trim().is_empty() {
        return Ok(None);
    }
    state
        .parser
        .parse_and_validate(query_filter)
        .map(Some)
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

async fn timeseries_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<TimeseriesRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let claims = authenticate(&state, &headers).await?;
    state
        .validation_service
        .validate_scope(&req.scope)
        .map_err(|e| ApiError::ValidationError(e.to_string()))?;

    let query_filter = parse_filter(&state, &req.scope.query_filter)?;
    let calls = CallMap::new();
    let abilities = abilities_for(&claims);

    let scope = QueryScope {
        start: req.scope.start,
        end: req.scope.end,
        query_filter: query_filter.as_ref(),
        calls: &calls,
        entity: req.scope.entity.as_ref(),
        feature_map: state.analytics.feature_map(),
        abilities: &abilities,
    };

    let rows = timeseries::execute(
        state.analytics.executor(),
        state.analytics.table_ref(),
        scope,
        &req.granularity,
        req.aggregation_dimensions.as_deref(),
    )
    .await?;

    state
        .audit_logger
        .log_search(&claims, Some(&req.scope.query_filter), AuditResult::Success, None)
        .await;

    Ok(Json(serde_json::to_value(rows).unwrap_or(serde_json::Value::Null)))
}

async fn topn_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<TopNRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let claims = authenticate(&state, &headers).await?;
    state
        .validation_service
        .validate_scope(&req.scope)
        .map_err(|e| ApiError::ValidationError(e.to_string()))?;
    state.validation_service.validate_dimension(&req.dimension).map_err(|e| ApiError::ValidationError(e.to_string()))?;
    state.validation_service.validate_topn_limit(req.limit).map_err(|e| ApiError::ValidationError(e.to_string()))?;
    state.validation_service.validate_precision(req.precision).map_err(|e| ApiError::ValidationError(e.to_string()))?;

    let query_filter = parse_filter(&state, &req.scope.query_filter)?;
    let calls = CallMap::new();
    let abilities = abilities_for(&claims);

    let scope = QueryScope {
        start: req.scope.start,
        end: req.scope.end,
        query_filter: query_filter.as_ref(),
        calls: &calls,
        entity: req.scope.entity.as_ref(),
        feature_map: state.analytics.feature_map(),
        abilities: &abilities,
    };

    let response = topn::execute(
        state.analytics.executor(),
        state.analytics.table_ref(),
        scope,
        &req.dimension,
        req.limit,
        req.precision,
        req.compare,
        state.config.analytics.max_historical_query_window_days,
    )
    .await?;

    state
        .audit_logger
        .log_search(&claims, Some(&req.scope.query_filter), AuditResult::Success, None)
        .await;

    Ok(Json(serde_json::to_value(response).unwrap_or(serde_json::Value::Null)))
}

async fn cardinality_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CardinalityRequest>,
) -> Result<Json<CardinalityResponse>, ApiError> {
    let claims = authenticate(&state, &headers).await?;
    state
        .validation_service
        .validate_scope(&req.scope)
        .map_err(|e| ApiError::ValidationError(e.to_string()))?;
    state.validation_service.validate_dimension(&req.dimension).map_err(|e| ApiError::ValidationError(e.to_string()))?;

    let query_filter = parse_filter(&state, &req.scope.query_filter)?;
    let calls = CallMap::new();
    let abilities = abilities_for(&claims);

    let scope = QueryScope {
        start: req.scope.start,
        end: req.scope.end,
        query_filter: query_filter.as_ref(),
        calls: &calls,
        entity: req.scope.entity.as_ref(),
        feature_map: state.analytics.feature_map(),
        abilities: &abilities,
    };

    let cardinality =
        groupby::execute(state.analytics.executor(), state.analytics.table_ref(), scope, &req.dimension).await?;

    state
        .audit_logger
        .log_search(&claims, Some(&req.scope.query_filter), AuditResult::Success, None)
        .await;

    Ok(Json(CardinalityResponse { cardinality }))
}

async fn scan_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ScanRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let claims = authenticate(&state, &headers).await?;
    state
        .validation_service
        .validate_scope(&req.scope)
        .map_err(|e| ApiError::ValidationError(e.to_string()))?;
    state.validation_service.validate_scan_limit(req.limit).map_err(|e| ApiError::ValidationError(e.to_string()))?;

    let query_filter = parse_filter(&state, &req.scope.query_filter)?;
    let calls = CallMap::new();
    let abilities = abilities_for(&claims);

    let scope = QueryScope {
        start: req.scope.start,
        end: req.scope.end,
        query_filter: query_filter.as_ref(),
        calls: &calls,
        entity: req.scope.entity.as_ref(),
        feature_map: state.analytics.feature_map(),
        abilities: &abilities,
    };

    let result = scan::execute(
        state.analytics.executor(),
        state.analytics.table_ref(),
        scope,
        req.limit,
        req.order,
        req.next_page.as_deref(),
    )
    .await?;

    state
        .audit_logger
        .log_search(&claims, Some(&req.scope.query_filter), AuditResult::Success, None)
        .await;

    Ok(Json(serde_json::to_value(result).unwrap_or(serde_json::Value::Null)))
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let analytics_store = match state.analytics.health_check().await {
        Ok(()) => ComponentStatus { healthy: true, error: None },
        Err(e) => {
            warn!("analytics store health check failed: {e}");
            ComponentStatus { healthy: false, error: Some(e.to_string()) }
        }
    };

    let status = if analytics_store.healthy { "ok" } else { "degraded" };

    Json(StatusResponse {
        status,
        uptime_secs: state.start_time.elapsed().as_secs(),
        analytics_store,
    })
}

#[cfg(feature = "metrics")]
async fn metrics_handler() -> String {
    use prometheus::{Encoder, TextEncoder};
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("failed to encode prometheus metrics: {e}");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    let router = Router::new()
        .route("/api/v1/query/timeseries", post(timeseries_handler))
        .route("/api/v1/query/topn", post(topn_handler))
        .route("/api/v1/query/cardinality", post(cardinality_handler))
        .route("/api/v1/query/scan", post(scan_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler));

    #[cfg(feature = "metrics")]
    let router = router.route("/metrics", get(metrics_handler));

    info!("router configured");
    router.with_state(state)
}
