//! Paginated scan planner (SPEC_FULL.md §4.5.4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analytics_client::{QueryExecutor, Row};
use crate::sql::composer::build_where;
use crate::sql::format::{format_value, Literal};

use super::{cursor, PlannerError, QueryScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub action_ids: Vec<i64>,
    pub next_page: Option<String>,
}

fn row_action_id(row: &Row) -> Option<i64> {
    row.get("__action_id").and_then(Value::as_i64)
}

/// ClickHouse's JSONEachRow format renders `DateTime64` as
/// `"YYYY-MM-DD HH:MM:SS[.fff]"`, not RFC3339 — so `__time` is cast to a
/// millisecond epoch integer in the SELECT list instead of relying on that
/// rendering.
fn row_time(row: &Row) -> Option<DateTime<Utc>> {
    let millis = match row.get("__time") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse::<i64>().ok(),
        _ => None,
    }?;
    DateTime::from_timestamp_millis(millis).map(|dt| dt.with_timezone(&Utc))
}

/// `next_page`'s cursor is the timestamp of the popped (limit+1-th) row from
/// the previous page — the first row the next page must return. The ASC
/// branch can fold this straight into `scope.start` since the composer's
/// start bound is already inclusive (`>=`). The DESC branch can't reuse
/// `scope.end` the same way: the composer's end bound is exclusive (`<`),
/// which would drop the cursor row forever. So DESC gets a dedicated
/// inclusive `<=` clause instead of narrowing `scope.end`.
fn resume_from_cursor(scope: &mut QueryScope<'_>, order: Order, ts: DateTime<Utc>) -> Option<String> {
    match order {
        Order::Asc => {
            scope.start = ts;
            None
        }
        Order::Desc => Some(format!("`__time` <= {}", format_value(&Literal::Str(ts.to_rfc3339())))),
    }
}

pub async fn execute(
    executor: &dyn QueryExecutor,
    table_ref: &str,
    mut scope: QueryScope<'_>,
    limit: u32,
    order: Order,
    next_page: Option<&str>,
) -> Result<ScanResult, PlannerError> {
    let cursor_bound = match next_page {
        Some(raw_cursor) => {
            let ts = cursor::decode(raw_cursor)?;
            resume_from_cursor(&mut scope, order, ts)
        }
        None => None,
    };

    let mut where_clause = build_where(
        scope.start,
        scope.end,
        scope.query_filter,
        scope.calls,
        scope.entity,
        scope.feature_map,
        scope.abilities,
    )?;

    if let Some(bound) = cursor_bound {
        where_clause = format!("{where_clause} AND {bound}");
    }

    let direction = match order {
        Order::Asc => "ASC",
        Order::Desc => "DESC",
    };
    let fetch_limit = limit as i64 + 1;

    let sql = format!(
        "SELECT `__action_id`, toUnixTimestamp64Milli(`__time`) AS `__time` FROM {table_ref} WHERE {where_clause} ORDER BY `__time` {direction} LIMIT {fetch_limit}"
    );

    let result = executor.execute(&sql).await?;
    let mut rows = result.rows;

    let next = if rows.len() as u32 > limit {
        rows.pop().and_then(|row| row_time(&row)).map(cursor::encode)
    } else {
        None
    };

    let action_ids = rows.iter().filter_map(row_action_id).collect();

    Ok(ScanResult { action_ids, next_page: next })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics_client::{AnalyticsError, RowSet};
    use crate::sql::ast::CallMap;
    use crate::sql::composer::new_feature_entity_type_map;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::collections::HashMap;

    /// Fakes just enough of ClickHouse's behavior to drive a planner end to
    /// end: parses the time bounds and ORDER BY/LIMIT back out of the
    /// generated SQL and filters/sorts an in-memory row set accordingly.
    struct FakeExecutor {
        rows: Vec<(DateTime<Utc>, i64)>,
    }

    fn extract_ts(sql: &str, marker: &str) -> Option<DateTime<Utc>> {
        let after = &sql[sql.find(marker)? + marker.len()..];
        let end = after.find('\'')?;
        DateTime::parse_from_rfc3339(&after[..end]).ok().map(|dt| dt.with_timezone(&Utc))
    }

    fn extract_limit(sql: &str) -> usize {
        let marker = "LIMIT ";
        let after = &sql[sql.find(marker).unwrap() + marker.len()..];
        after.trim().parse().unwrap()
    }

    #[async_trait]
    impl QueryExecutor for FakeExecutor {
        async fn execute(&self, sql: &str) -> Result<RowSet, AnalyticsError> {
            let lower = extract_ts(sql, "`__time` >= '");
            let upper_excl = extract_ts(sql, "`__time` < '");
            let upper_incl = extract_ts(sql, "`__time` <= '");
            let desc = sql.contains("ORDER BY `__time` DESC");
            let limit = extract_limit(sql);

            let mut matching: Vec<&(DateTime<Utc>, i64)> = self
                .rows
                .iter()
                .filter(|(t, _)| lower.map_or(true, |b| *t >= b))
                .filter(|(t, _)| upper_excl.map_or(true, |b| *t < b))
                .filter(|(t, _)| upper_incl.map_or(true, |b| *t <= b))
                .collect();

            matching.sort_by_key(|(t, _)| *t);
            if desc {
                matching.reverse();
            }
            matching.truncate(limit);

            let rows = matching
                .into_iter()
                .map(|(t, id)| {
                    let mut row = Row::new();
                    // ClickHouse's JSONEachRow renders UInt64-ish results (e.g.
                    // toUnixTimestamp64Milli's output) as JSON strings, not numbers.
                    row.insert("__time".to_string(), Value::String(t.timestamp_millis().to_string()));
                    row.insert("__action_id".to_string(), Value::from(*id));
                    row
                })
                .collect();

            Ok(RowSet { rows })
        }
    }

    fn wide_scope<'a>(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        calls: &'a CallMap,
        feature_map: &'a crate::sql::composer::FeatureEntityTypeMap,
    ) -> QueryScope<'a> {
        QueryScope {
            start,
            end,
            query_filter: None,
            calls,
            entity: None,
            feature_map,
            abilities: &[],
        }
    }

    #[tokio::test]
    async fn multi_page_desc_scan_matches_spec_scenario_five() {
        let day = |d: u32| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap();
        let executor = FakeExecutor {
            rows: vec![(day(5), 5), (day(4), 4), (day(3), 3), (day(2), 2), (day(1), 1)],
        };

        let calls = CallMap::new();
        let feature_map = new_feature_entity_type_map(HashMap::new());
        let start = day(1) - Duration::days(1);
        let end = day(5) + Duration::days(1);

        let page1 = execute(
            &executor,
            "db.tbl",
            wide_scope(start, end, &calls, &feature_map),
            2,
            Order::Desc,
            None,
        )
        .await
        .unwrap();
        assert_eq!(page1.action_ids, vec![5, 4]);
        let cursor1 = page1.next_page.expect("page 1 must carry a cursor");

        let page2 = execute(
            &executor,
            "db.tbl",
            wide_scope(start, end, &calls, &feature_map),
            2,
            Order::Desc,
            Some(&cursor1),
        )
        .await
        .unwrap();
        assert_eq!(page2.action_ids, vec![3, 2], "the popped cursor row (id 3) must reappear, not be dropped");
        let cursor2 = page2.next_page.expect("page 2 must carry a cursor");

        let page3 = execute(
            &executor,
            "db.tbl",
            wide_scope(start, end, &calls, &feature_map),
            2,
            Order::Desc,
            Some(&cursor2),
        )
        .await
        .unwrap();
        assert_eq!(page3.action_ids, vec![1]);
        assert!(page3.next_page.is_none());
    }

    #[tokio::test]
    async fn multi_page_asc_scan_covers_every_row_exactly_once() {
        let day = |d: u32| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap();
        let executor = FakeExecutor {
            rows: vec![(day(1), 1), (day(2), 2), (day(3), 3), (day(4), 4), (day(5), 5)],
        };

        let calls = CallMap::new();
        let feature_map = new_feature_entity_type_map(HashMap::new());
        let start = day(1) - Duration::days(1);
        let end = day(5) + Duration::days(1);

        let page1 = execute(
            &executor,
            "db.tbl",
            wide_scope(start, end, &calls, &feature_map),
            2,
            Order::Asc,
            None,
        )
        .await
        .unwrap();
        assert_eq!(page1.action_ids, vec![1, 2]);
        let cursor1 = page1.next_page.expect("page 1 must carry a cursor");

        let page2 = execute(
            &executor,
            "db.tbl",
            wide_scope(start, end, &calls, &feature_map),
            2,
            Order::Asc,
            Some(&cursor1),
        )
        .await
        .unwrap();
        assert_eq!(page2.action_ids, vec![3, 4]);
        let cursor2 = page2.next_page.expect("page 2 must carry a cursor");

        let page3 = execute(
            &executor,
            "db.tbl",
            wide_scope(start, end, &calls, &feature_map),
            2,
            Order::Asc,
            Some(&cursor2),
        )
        .await
        .unwrap();
        assert_eq!(page3.action_ids, vec![5]);
        assert!(page3.next_page.is_none());
    }

    #[test]
    fn row_time_parses_clickhouse_string_encoded_millis() {
        let mut row = Row::new();
        row.insert("__time".to_string(), Value::String("1704067200000".to_string()));
        assert_eq!(row_time(&row), Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn desc_resume_adds_inclusive_bound_without_touching_scope_end() {
        let calls = CallMap::new();
        let feature_map = new_feature_entity_type_map(HashMap::new());
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let mut scope = wide_scope(start, end, &calls, &feature_map);
        let ts = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();

        let bound = resume_from_cursor(&mut scope, Order::Desc, ts).expect("DESC must return a clause");
        assert_eq!(bound, "`__time` <= '2024-01-05T00:00:00+00:00'");
        assert_eq!(scope.end, end, "DESC resume must not narrow the composer's exclusive end bound");
    }

    #[test]
    fn asc_resume_narrows_scope_start_in_place() {
        let calls = CallMap::new();
        let feature_map = new_feature_entity_type_map(HashMap::new());
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let mut scope = wide_scope(start, end, &calls, &feature_map);
        let ts = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();

        let bound = resume_from_cursor(&mut scope, Order::Asc, ts);
        assert!(bound.is_none());
        assert_eq!(scope.start, ts);
    }
}
