//! Legacy JSON Filter Adapter.
//!
//! Converts the JSON filter dialect inherited from a prior analytics-store
//! backend (`selector`/`not`/`and`/`or`/`in`/`bound`/`columnComparison`)
//! into the same WHERE-fragment shape the AST translator produces. Used
//! for two things: permission filters supplied by the ACL layer (see
//! `crate::sql::composer`), and UDFs that only expose this legacy form.
//!
//! Keeping this isolated behind [`adapt_legacy`] is deliberate: this
//! dialect exists only for backward compatibility, and retiring it should
//! be a single deletion once the permission layer and remaining UDFs move
//! off of it.

use serde_json::Value;

use crate::sql::error::TranslatorError;
use crate::sql::format::{format_value, quote_ident, Literal};

/// Adapt a single legacy filter node (and, recursively, its children) into
/// a SQL fragment. Re-entrant: safe to call from within the translator's
/// `Call` handling as well as from the permission composer.
pub fn adapt_legacy(filter: &Value) -> Result<String, TranslatorError> {
    let obj = filter.as_object().ok_or_else(|| TranslatorError::UnsupportedLegacyFilter {
        filter_type: "<non-object>".to_string(),
    })?;

    let filter_type = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| TranslatorError::UnsupportedLegacyFilter { filter_type: "<missing type>".to_string() })?;

    match filter_type {
        "selector" => selector(obj),
        "not" => not(obj),
        "and" => and_or(obj, " AND "),
        "or" => and_or(obj, " OR "),
        "in" => in_filter(obj),
        "bound" => bound(obj),
        "columnComparison" => column_comparison(obj),
        other => Err(TranslatorError::UnsupportedLegacyFilter { filter_type: other.to_string() }),
    }
}

fn field_str<'a>(obj: &'a serde_json::Map<String, Value>, key: &str) -> Result<&'a str, TranslatorError> {
    obj.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| TranslatorError::UnsupportedLegacyFilter { filter_type: format!("missing `{key}`") })
}

fn json_to_literal(v: &Value) -> Literal {
    match v {
        Value::Null => Literal::Null,
        Value::Bool(b) => Literal::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Literal::Int(i)
            } else {
                Literal::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => Literal::Str(s.clone()),
        Value::Array(items) => Literal::List(items.iter().map(json_to_literal).collect()),
        Value::Object(_) => Literal::Str(v.to_string()),
    }
}

fn selector(obj: &serde_json::Map<String, Value>) -> Result<String, TranslatorError> {
    let col = quote_ident(field_str(obj, "dimension")?);
    match obj.get("value") {
        None | Some(Value::Null) => Ok(format!("{col} IS NULL")),
        Some(v) => Ok(format!("{col} = {}", format_value(&json_to_literal(v)))),
    }
}

fn not(obj: &serde_json::Map<String, Value>) -> Result<String, TranslatorError> {
    let field = obj.get("field").ok_or_else(|| TranslatorError::UnsupportedLegacyFilter {
        filter_type: "missing `field`".to_string(),
    })?;
    Ok(format!("NOT ({})", adapt_legacy(field)?))
}

fn and_or(obj: &serde_json::Map<String, Value>, joiner: &str) -> Result<String, TranslatorError> {
    let fields = obj
        .get("fields")
        .and_then(Value::as_array)
        .ok_or_else(|| TranslatorError::UnsupportedLegacyFilter { filter_type: "missing `fields`".to_string() })?;
    let mut parts = Vec::with_capacity(fields.len());
    for f in fields {
        parts.push(format!("({})", adapt_legacy(f)?));
    }
    Ok(parts.join(joiner))
}

fn in_filter(obj: &serde_json::Map<String, Value>) -> Result<String, TranslatorError> {
    let col = quote_ident(field_str(obj, "dimension")?);
    let values = obj
        .get("values")
        .and_then(Value::as_array)
        .ok_or_else(|| TranslatorError::UnsupportedLegacyFilter { filter_type: "missing `values`".to_string() })?;
    let literal = Literal::List(values.iter().map(json_to_literal).collect());
    Ok(format!("{col} IN {}", format_value(&literal)))
}

fn bound(obj: &serde_json::Map<String, Value>) -> Result<String, TranslatorError> {
    let col = quote_ident(field_str(obj, "dimension")?);
    let mut parts = Vec::new();

    if let Some(lower) = obj.get("lower") {
        let op = if obj.get("lowerStrict").and_then(Value::as_bool).unwrap_or(false) { ">" } else { ">=" };
        parts.push(format!("{col} {op} {}", format_value(&json_to_literal(lower))));
    }
    if let Some(upper) = obj.get("upper") {
        let op = if obj.get("upperStrict").and_then(Value::as_bool).unwrap_or(false) { "<" } else { "<=" };
        parts.push(format!("{col} {op} {}", format_value(&json_to_literal(upper))));
    }

    if parts.is_empty() {
        Ok("1=1".to_string())
    } else {
        Ok(parts.join(" AND "))
    }
}

fn column_comparison(obj: &serde_json::Map<String, Value>) -> Result<String, TranslatorError> {
    let dims = obj
        .get("dimensions")
        .and_then(Value::as_array)
        .ok_or_else(|| TranslatorError::UnsupportedLegacyFilter { filter_type: "missing `dimensions`".to_string() })?;
    if dims.len() != 2 {
        return Err(TranslatorError::UnsupportedLegacyFilter { filter_type: "columnComparison arity".to_string() });
    }
    let a = dims[0].as_str().unwrap_or_default();
    let b = dims[1].as_str().unwrap_or_default();
    Ok(format!("{} = {}", quote_ident(a), quote_ident(b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn selector_with_value_and_null() {
        let f = json!({"type": "selector", "dimension": "status", "value": "ok"});
        assert_eq!(adapt_legacy(&f).unwrap(), "`status` = 'ok'");

        let f = json!({"type": "selector", "dimension": "status", "value": null});
        assert_eq!(adapt_legacy(&f).unwrap(), "`status` IS NULL");
    }

    #[test]
    fn not_wraps_inner() {
        let f = json!({"type": "not", "field": {"type": "selector", "dimension": "a", "value": 1}});
        assert_eq!(adapt_legacy(&f).unwrap(), "NOT (`a` = 1)");
    }

    #[test]
    fn and_or_join_with_parens() {
        let f = json!({"type": "and", "fields": [
            {"type": "selector", "dimension": "a", "value": 1},
            {"type": "selector", "dimension": "b", "value": 2},
        ]});
        assert_eq!(adapt_legacy(&f).unwrap(), "(`a` = 1) AND (`b` = 2)");
    }

    #[test]
    fn in_filter_emits_list() {
        let f = json!({"type": "in", "dimension": "tag", "values": ["a", "b"]});
        assert_eq!(adapt_legacy(&f).unwrap(), "`tag` IN ('a', 'b')");
    }

    #[test]
    fn bound_with_both_ends() {
        let f = json!({"type": "bound", "dimension": "age", "lower": 1, "upper": 10, "upperStrict": true});
        assert_eq!(adapt_legacy(&f).unwrap(), "`age` >= 1 AND `age` < 10");
    }

    #[test]
    fn bound_with_no_ends_is_tautology() {
        let f = json!({"type": "bound", "dimension": "age"});
        assert_eq!(adapt_legacy(&f).unwrap(), "1=1");
    }

    #[test]
    fn column_comparison_emits_equality() {
        let f = json!({"type": "columnComparison", "dimensions": ["a", "b"]});
        assert_eq!(adapt_legacy(&f).unwrap(), "`a` = `b`");
    }

    #[test]
    fn unknown_type_fails_loudly() {
        let f = json!({"type": "mystery"});
        assert!(matches!(adapt_legacy(&f), Err(TranslatorError::UnsupportedLegacyFilter { .. })));
    }
}
