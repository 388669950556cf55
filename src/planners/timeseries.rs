//! Timeseries planner (SPEC_FULL.md §4.5.1).

use crate::analytics_client::{QueryExecutor, Row};
use crate::sql::composer::build_where;
use crate::sql::format::{format_value, quote_ident, Literal};

use super::{PlannerError, QueryScope};

fn granularity_expr(granularity: &str) -> String {
    match granularity {
        "minute" => "toStartOfMinute(`__time`)".to_string(),
        "fifteen_minute" => "toStartOfFifteenMinutes(`__time`)".to_string(),
        "hour" => "toStartOfHour(`__time`)".to_string(),
        "day" => "toStartOfDay(`__time`)".to_string(),
        "week" => "toStartOfWeek(`__time`)".to_string(),
        "month" => "toStartOfMonth(`__time`)".to_string(),
        "all" => "'all'".to_string(),
        other => format!("toStartOfInterval(`__time`, INTERVAL 1 {other})"),
    }
}

fn aggregation_expr(aggregation_dimensions: Option<&[String]>, scope: &QueryScope<'_>) -> String {
    match (aggregation_dimensions, scope.entity) {
        (Some(dims), Some(entity)) if !dims.is_empty() => {
            let id_literal = format_value(&Literal::Str(entity.id.clone()));
            dims.iter()
                .map(|d| {
                    let col = quote_ident(d);
                    format!("countIf({col} = {id_literal}) AS {col}")
                })
                .collect::<Vec<_>>()
                .join(", ")
        }
        _ => "count(*) AS `count`".to_string(),
    }
}

pub async fn execute(
    executor: &dyn QueryExecutor,
    table_ref: &str,
    scope: QueryScope<'_>,
    granularity: &str,
    aggregation_dimensions: Option<&[String]>,
) -> Result<Vec<Row>, PlannerError> {
    let where_clause = build_where(
        scope.start,
        scope.end,
        scope.query_filter,
        scope.calls,
        scope.entity,
        scope.feature_map,
        scope.abilities,
    )?;

    let gran = granularity_expr(granularity);
    let agg = aggregation_expr(aggregation_dimensions, &scope);

    let sql = format!(
        "SELECT {gran} AS `timestamp`, {agg} FROM {table_ref} WHERE {where_clause} GROUP BY `timestamp` ORDER BY `timestamp` ASC"
    );

    let result = executor.execute(&sql).await?;
    Ok(result.rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_granularities_map_to_fixed_functions() {
        assert_eq!(granularity_expr("hour"), "toStartOfHour(`__time`)");
        assert_eq!(granularity_expr("all"), "'all'");
    }

    #[test]
    fn unknown_granularity_falls_back_to_interval() {
        assert_eq!(
            granularity_expr("quarter"),
            "toStartOfInterval(`__time`, INTERVAL 1 quarter)"
        );
    }
}
