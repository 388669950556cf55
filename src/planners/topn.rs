//! Top-N with period-over-period comparison planner (SPEC_FULL.md §4.5.3).
//!
//! The prior backend's comparison step assumes exactly one `PeriodData` per
//! period list (see SPEC_FULL.md §9, Design Notes — Open Question); this
//! implementation only ever builds one, so that assumption holds by
//! construction rather than by a runtime assertion.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::analytics_client::QueryExecutor;
use crate::sql::composer::build_where;
use crate::sql::format::quote_ident;

use super::{PlannerError, QueryScope};

#[derive(Debug, Clone, Serialize)]
pub struct TopNEntry {
    pub dimension_value: Value,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodData {
    pub timestamp: DateTime<Utc>,
    pub result: Vec<TopNEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DimensionDifference {
    pub dimension_key: String,
    pub current_count: i64,
    pub previous_count: i64,
    pub difference: i64,
    pub percentage_change: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonData {
    pub differences: Vec<DimensionDifference>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct TopNPoPResponse {
    pub current_period: Vec<PeriodData>,
    pub previous_period: Option<Vec<PeriodData>>,
    pub comparison: Option<Vec<ComparisonData>>,
}

fn dimension_expression(dimension: &str, precision: f64) -> String {
    let col = quote_ident(dimension);
    if precision > 0.0 {
        let reciprocal = 1.0 / precision;
        format!("floor({col} * {reciprocal}) / {reciprocal}")
    } else {
        col
    }
}

async fn execute_single_period(
    executor: &dyn QueryExecutor,
    table_ref: &str,
    scope: QueryScope<'_>,
    dimension: &str,
    limit: u32,
    precision: f64,
) -> Result<PeriodData, PlannerError> {
    let where_clause = build_where(
        scope.start,
        scope.end,
        scope.query_filter,
        scope.calls,
        scope.entity,
        scope.feature_map,
        scope.abilities,
    )?;

    let dim_expr = dimension_expression(dimension, precision);
    let sql = format!(
        "SELECT {dim_expr} AS `dim_value`, count(*) AS `count` FROM {table_ref} WHERE {where_clause} GROUP BY `dim_value` ORDER BY `count` DESC LIMIT {limit}"
    );

    let result = executor.execute(&sql).await?;
    let entries = result
        .rows
        .iter()
        .map(|row| {
            let count = row.get("count").and_then(Value::as_i64).unwrap_or(0);
            let dimension_value = row.get("dim_value").cloned().unwrap_or(Value::Null);
            TopNEntry { dimension_value, count }
        })
        .collect();

    Ok(PeriodData { timestamp: scope.start, result: entries })
}

fn dimension_key(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn analyze_pop(current: &PeriodData, previous: &PeriodData) -> ComparisonData {
    let curr_map: HashMap<String, i64> =
        current.result.iter().map(|e| (dimension_key(&e.dimension_value), e.count)).collect();
    let prev_map: HashMap<String, i64> =
        previous.result.iter().map(|e| (dimension_key(&e.dimension_value), e.count)).collect();

    let mut keys: Vec<&String> = curr_map.keys().chain(prev_map.keys()).collect();
    keys.sort();
    keys.dedup();

    let differences = keys
        .into_iter()
        .filter_map(|key| {
            let curr = *curr_map.get(key).unwrap_or(&0);
            if curr == 0 {
                return None;
            }
            let prev = *prev_map.get(key).unwrap_or(&0);
            let difference = curr - prev;
            let percentage_change = if prev > 0 { Some(difference as f64 / prev as f64 * 100.0) } else { None };
            Some(DimensionDifference {
                dimension_key: key.clone(),
                current_count: curr,
                previous_count: prev,
                difference,
                percentage_change,
            })
        })
        .collect();

    ComparisonData { differences }
}

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    executor: &dyn QueryExecutor,
    table_ref: &str,
    scope: QueryScope<'_>,
    dimension: &str,
    limit: u32,
    precision: f64,
    compare: bool,
    max_historical_query_window_days: i64,
) -> Result<TopNPoPResponse, PlannerError> {
    let current = execute_single_period(executor, table_ref, scope, dimension, limit, precision).await?;
    let mut response = TopNPoPResponse {
        current_period: vec![current.clone()],
        previous_period: None,
        comparison: None,
    };

    if !compare {
        return Ok(response);
    }

    let duration = scope.end - scope.start;
    let prev_end = scope.start;
    let prev_start = scope.start - duration;

    let cutoff = Utc::now() - chrono::Duration::days(max_historical_query_window_days);
    if prev_start < cutoff {
        return Ok(response);
    }

    let prev_scope = QueryScope { start: prev_start, end: prev_end, ..scope };
    let previous = execute_single_period(executor, table_ref, prev_scope, dimension, limit, precision).await?;

    response.comparison = Some(vec![analyze_pop(&current, &previous)]);
    response.previous_period = Some(vec![previous]);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(v: &str, c: i64) -> TopNEntry {
        TopNEntry { dimension_value: Value::String(v.to_string()), count: c }
    }

    #[test]
    fn diff_drops_zero_current_and_nulls_pct_when_prev_zero() {
        let now = Utc::now();
        let current = PeriodData { timestamp: now, result: vec![entry("a", 10), entry("b", 5)] };
        let previous = PeriodData { timestamp: now, result: vec![entry("a", 4), entry("c", 2)] };

        let cmp = analyze_pop(&current, &previous);
        let mut by_key: HashMap<String, &DimensionDifference> =
            cmp.differences.iter().map(|d| (d.dimension_key.clone(), d)).collect();

        let a = by_key.remove("a").unwrap();
        assert_eq!(a.difference, 6);
        assert_eq!(a.percentage_change, Some(150.0));

        let b = by_key.remove("b").unwrap();
        assert_eq!(b.previous_count, 0);
        assert_eq!(b.percentage_change, None);

        // "c" disappeared (current = 0) and must not appear at all.
        assert!(!cmp.differences.iter().any(|d| d.dimension_key == "c"));
    }

    #[test]
    fn dimension_expression_buckets_by_reciprocal_precision() {
        assert_eq!(dimension_expression("score", 0.1), "floor(`score` * 10) / 10");
        assert_eq!(dimension_expression("score", 0.0), "`score`");
    }
}
