//! Approximate group-by cardinality planner (SPEC_FULL.md §4.5.2).

use crate::analytics_client::QueryExecutor;
use crate::sql::composer::build_where;
use crate::sql::format::quote_ident;

use super::{PlannerError, QueryScope};

pub async fn execute(
    executor: &dyn QueryExecutor,
    table_ref: &str,
    scope: QueryScope<'_>,
    dimension: &str,
) -> Result<i64, PlannerError> {
    let where_clause = build_where(
        scope.start,
        scope.end,
        scope.query_filter,
        scope.calls,
        scope.entity,
        scope.feature_map,
        scope.abilities,
    )?;

    let sql = format!(
        "SELECT uniqHLL12({}) AS `cardinality` FROM {table_ref} WHERE {where_clause}",
        quote_ident(dimension)
    );

    let result = executor.execute(&sql).await?;
    let cardinality = result
        .first()
        .and_then(|row| row.get("cardinality"))
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or(-1);

    Ok(cardinality)
}
