//! Entity & Permission Composer.
//!
//! Combines a time range, the user predicate, an optional entity filter,
//! and zero-or-more permission filters into a single conjunctive WHERE
//! clause. This is the only place in the core that knows about abilities
//! or entities; the translator and legacy adapter are agnostic to both.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sql::ast::{CallMap, Node};
use crate::sql::error::TranslatorError;
use crate::sql::format::{format_value, quote_ident, Literal};
use crate::sql::legacy_filter;
use crate::sql::translator;

/// `feature_name -> entity_type`. Maintained by an external engine
/// collaborator at startup; read-only and lock-free from the core's
/// perspective.
pub type FeatureEntityTypeMap = Arc<ArcSwap<HashMap<String, String>>>;

pub fn new_feature_entity_type_map(initial: HashMap<String, String>) -> FeatureEntityTypeMap {
    Arc::new(ArcSwap::from_pointee(initial))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityFilter {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub feature_filters: Option<Vec<String>>,
}

/// A permission object scoping what rows a user may see. The ACL layer
/// that implements this is out of the core's scope; the composer only
/// needs a pure, at-most-once-per-request callback.
pub trait Ability: Send + Sync {
    fn get_legacy_filter(&self) -> Option<Value>;
}

/// Expand an entity filter into a disjunction over the features whose type
/// matches `entity.type` and (if `feature_filters` is set) whose name is in
/// that whitelist. An empty selection is encoded as a guaranteed-false
/// predicate so a misconfigured entity never silently widens access.
pub fn entity_to_sql(entity: &EntityFilter, feature_map: &FeatureEntityTypeMap) -> String {
    let map = feature_map.load();
    let whitelist = entity.feature_filters.as_ref();

    let mut selected: Vec<&str> = map
        .iter()
        .filter(|(_, ty)| ty.as_str() == entity.entity_type)
        .filter(|(name, _)| whitelist.map_or(true, |w| w.is_empty() || w.iter().any(|n| n == *name)))
        .map(|(name, _)| name.as_str())
        .collect();
    selected.sort_unstable();

    if selected.is_empty() {
        return "1=0".to_string();
    }

    let id_literal = format_value(&Literal::Str(entity.id.clone()));
    let clauses: Vec<String> = selected
        .into_iter()
        .map(|f| format!("{} = {}", quote_ident(f), id_literal))
        .collect();
    format!("({})", clauses.join(" OR "))
}

/// Build the full WHERE fragment (without the `WHERE` keyword).
pub fn build_where(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    query_filter: Option<&Node>,
    calls: &CallMap,
    entity: Option<&EntityFilter>,
    feature_map: &FeatureEntityTypeMap,
    abilities: &[Arc<dyn Ability>],
) -> Result<String, TranslatorError> {
    let mut clauses = vec![
        format!("`__time` >= {}", format_value(&Literal::Str(start.to_rfc3339()))),
        format!("`__time` < {}", format_value(&Literal::Str(end.to_rfc3339()))),
    ];

    if let Some(node) = query_filter {
        let fragment = translator::translate(node, calls)?;
        clauses.push(format!("({fragment})"));
    }

    if let Some(entity) = entity {
        clauses.push(entity_to_sql(entity, feature_map));
    }

    for ability in abilities {
        if let Some(filter) = ability.get_legacy_filter() {
            let fragment = legacy_filter::adapt_legacy(&filter)?;
            clauses.push(format!("({fragment})"));
        }
    }

    Ok(clauses.join(" AND "))
}
