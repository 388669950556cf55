//! Query Planners: four parameterised query shapes, each building a WHERE
//! clause via `crate::sql::composer`, templating a complete SELECT, running
//! it through the analytics client, and post-processing the row set.
//!
//! The planners are pure aside from the one `QueryExecutor::execute` call
//! each makes — see SPEC_FULL.md §5 for the concurrency model this relies
//! on (only that call suspends; everything else here is CPU-bound).

pub mod cursor;
pub mod groupby;
pub mod scan;
pub mod timeseries;
pub mod topn;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::analytics_client::AnalyticsError;
use crate::sql::ast::{CallMap, Node};
use crate::sql::composer::{Ability, EntityFilter, FeatureEntityTypeMap};
use crate::sql::error::TranslatorError;
use crate::sql::format::quote_ident;

/// Everything the composer needs, threaded explicitly rather than read off
/// a process-global (SPEC_FULL.md §9 — no global singletons).
#[derive(Clone, Copy)]
pub struct QueryScope<'a> {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub query_filter: Option<&'a Node>,
    pub calls: &'a CallMap,
    pub entity: Option<&'a EntityFilter>,
    pub feature_map: &'a FeatureEntityTypeMap,
    pub abilities: &'a [Arc<dyn Ability>],
}

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Translator(#[from] TranslatorError),
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
}

pub fn table_ref(database: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(database), quote_ident(table))
}
