//! AST Translator: walks a validated predicate tree and emits a WHERE-clause
//! fragment suitable for direct interpolation inside parentheses.

use crate::sql::ast::{BoolOp, CallMap, CompareOp, Node};
use crate::sql::error::TranslatorError;
use crate::sql::format::{escape_like_wildcards, format_value, quote_ident, Literal};
use crate::sql::legacy_filter;

/// Translate a validated predicate root. `calls` resolves `Call` nodes to
/// the UDF implementation and the keyword arguments it was invoked with.
pub fn translate(node: &Node, calls: &CallMap) -> Result<String, TranslatorError> {
    match node {
        Node::BoolOp { op, children } => translate_bool_op(*op, children, calls),
        Node::UnaryNot { child } => {
            let inner = translate(child, calls)?;
            Ok(format!("NOT ({inner})"))
        }
        Node::Compare { left, op, right } => translate_compare(left, *op, right),
        Node::Call { call_id } => translate_call(call_id, calls),
        other => Err(TranslatorError::UnknownNode { node: debug_node(other) }),
    }
}

fn translate_bool_op(op: BoolOp, children: &[Node], calls: &CallMap) -> Result<String, TranslatorError> {
    let joiner = match op {
        BoolOp::And => " AND ",
        BoolOp::Or => " OR ",
    };
    let mut parts = Vec::with_capacity(children.len());
    for child in children {
        parts.push(format!("({})", translate(child, calls)?));
    }
    Ok(parts.join(joiner))
}

fn translate_call(call_id: &str, calls: &CallMap) -> Result<String, TranslatorError> {
    let (udf, args) = calls.get(call_id).ok_or_else(|| TranslatorError::UnknownCall {
        call_id: call_id.to_string(),
    })?;

    if let Some(sql) = udf.to_sql(args) {
        return Ok(sql);
    }

    if let Some(legacy) = udf.legacy_filter(args) {
        return legacy_filter::adapt_legacy(&legacy);
    }

    Err(TranslatorError::UnknownCall { call_id: call_id.to_string() })
}

/// Column reference carried by a `Name` node, if any.
fn as_name(node: &Node) -> Option<&str> {
    match node {
        Node::Name(id) => Some(id.as_str()),
        _ => None,
    }
}

/// Fold a `Literal`/`UnaryLiteral` node down to its value, if it carries one.
/// Mirrors the source's "whichever side is a literal wins" extraction: a
/// comparison's value side is found independently of its position, and the
/// comparator is never flipped to account for operand order.
fn as_value(node: &Node) -> Option<Literal> {
    match node {
        Node::Literal(lit) => Some(lit.clone()),
        Node::UnaryLiteral(inner) => as_value(inner).and_then(|v| v.negate()),
        _ => None,
    }
}

fn translate_compare(left: &Node, op: CompareOp, right: &Node) -> Result<String, TranslatorError> {
    if let (Some(lc), Some(rc)) = (as_name(left), as_name(right)) {
        return match op {
            CompareOp::Eq => Ok(format!("{} = {}", quote_ident(lc), quote_ident(rc))),
            CompareOp::Ne => Ok(format!("{} != {}", quote_ident(lc), quote_ident(rc))),
            _ => Err(TranslatorError::UnsupportedComparator {
                node: format!("{} {:?} {}", lc, op, rc),
            }),
        };
    }

    let dimension = as_name(left).or_else(|| as_name(right)).ok_or_else(|| {
        TranslatorError::NeedsColumn { node: debug_node(right) }
    })?;
    let col = quote_ident(dimension);

    let value = as_value(left).or_else(|| as_value(right));

    match op {
        CompareOp::Eq => match value {
            None | Some(Literal::Null) => Ok(format!("{col} IS NULL")),
            Some(v) => Ok(format!("{col} = {}", format_value(&v))),
        },
        CompareOp::Ne => match value {
            None | Some(Literal::Null) => Ok(format!("{col} IS NOT NULL")),
            Some(v) => Ok(format!("{col} != {}", format_value(&v))),
        },
        CompareOp::In => Ok(in_clause(&col, value.as_ref(), false)),
        CompareOp::NotIn => Ok(in_clause(&col, value.as_ref(), true)),
        CompareOp::Lt => Ok(ordering(&col, "<", value.as_ref())),
        CompareOp::Le => Ok(ordering(&col, "<=", value.as_ref())),
        CompareOp::Gt => Ok(ordering(&col, ">", value.as_ref())),
        CompareOp::Ge => Ok(ordering(&col, ">=", value.as_ref())),
    }
}

fn ordering(col: &str, op: &str, value: Option<&Literal>) -> String {
    let lit = value.map(format_value).unwrap_or_else(|| "NULL".to_string());
    format!("{col} IS NOT NULL AND {col} {op} {lit}")
}

/// `IN` / `NOT IN`: list membership, substring search over a string, or a
/// degenerate equality/inequality over any other scalar.
fn in_clause(col: &str, value: Option<&Literal>, negated: bool) -> String {
    match value {
        Some(Literal::List(items)) => {
            let op = if negated { "NOT IN" } else { "IN" };
            let formatted = format_value(&Literal::List(items.clone()));
            format!("{col} {op} {formatted}")
        }
        Some(Literal::Str(s)) => {
            let like_op = if negated { "NOT ILIKE" } else { "ILIKE" };
            let escaped = escape_like_wildcards(s).replace('\'', "\\'");
            format!("{col} {like_op} '%{escaped}%'")
        }
        Some(other) => {
            let op = if negated { "!=" } else { "=" };
            format!("{col} {op} {}", format_value(other))
        }
        None => {
            // Degenerate NULL case: treat as the scalar equality fallback.
            let op = if negated { "!=" } else { "=" };
            format!("{col} {op} NULL")
        }
    }
}

fn debug_node(node: &Node) -> String {
    format!("{:?}", node)
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::BoolOp { op, children } => write!(f, "BoolOp({:?}, {} children)", op, children.len()),
            Node::UnaryNot { .. } => write!(f, "UnaryNot"),
            Node::Compare { op, .. } => write!(f, "Compare({:?})", op),
            Node::Call { call_id } => write!(f, "Call({call_id})"),
            Node::Name(id) => write!(f, "Name({id})"),
            Node::Literal(lit) => write!(f, "Literal({:?})", lit),
            Node::UnaryLiteral(_) => write!(f, "UnaryLiteral"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn calls() -> CallMap {
        HashMap::new()
    }

    fn name(s: &str) -> Node {
        Node::Name(s.to_string())
    }

    fn int(v: i64) -> Node {
        Node::Literal(Literal::Int(v))
    }

    fn string(s: &str) -> Node {
        Node::Literal(Literal::Str(s.to_string()))
    }

    #[test]
    fn null_safe_ordering() {
        // age < 30
        let node = Node::Compare { left: Box::new(name("age")), op: CompareOp::Lt, right: Box::new(int(30)) };
        assert_eq!(translate(&node, &calls()).unwrap(), "`age` IS NOT NULL AND `age` < 30");
    }

    #[test]
    fn contains_overload_string_vs_list() {
        let contains = Node::Compare { left: Box::new(name("name")), op: CompareOp::In, right: Box::new(string("ali")) };
        assert_eq!(translate(&contains, &calls()).unwrap(), "`name` ILIKE '%ali%'");

        let list = Node::Literal(Literal::List(vec![Literal::Str("a".into()), Literal::Str("b".into())]));
        let in_list = Node::Compare { left: Box::new(name("tag")), op: CompareOp::In, right: Box::new(list) };
        assert_eq!(translate(&in_list, &calls()).unwrap(), "`tag` IN ('a', 'b')");
    }

    #[test]
    fn eq_ne_null_is_exact() {
        let eq_null = Node::Compare { left: Box::new(name("x")), op: CompareOp::Eq, right: Box::new(Node::Literal(Literal::Null)) };
        assert_eq!(translate(&eq_null, &calls()).unwrap(), "`x` IS NULL");

        let ne_null = Node::Compare { left: Box::new(name("x")), op: CompareOp::Ne, right: Box::new(Node::Literal(Literal::Null)) };
        assert_eq!(translate(&ne_null, &calls()).unwrap(), "`x` IS NOT NULL");
    }

    #[test]
    fn column_to_column_restricted_to_eq_ne() {
        let cmp = Node::Compare { left: Box::new(name("a")), op: CompareOp::Lt, right: Box::new(name("b")) };
        assert!(matches!(translate(&cmp, &calls()), Err(TranslatorError::UnsupportedComparator { .. })));
    }

    #[test]
    fn two_literals_needs_column() {
        let cmp = Node::Compare { left: Box::new(int(1)), op: CompareOp::Eq, right: Box::new(int(2)) };
        assert!(matches!(translate(&cmp, &calls()), Err(TranslatorError::NeedsColumn { .. })));
    }

    #[test]
    fn bool_op_wraps_and_joins() {
        let node = Node::BoolOp {
            op: BoolOp::And,
            children: vec![
                Node::Compare { left: Box::new(name("a")), op: CompareOp::Eq, right: Box::new(int(1)) },
                Node::Compare { left: Box::new(name("b")), op: CompareOp::Eq, right: Box::new(int(2)) },
            ],
        };
        assert_eq!(translate(&node, &calls()).unwrap(), "(`a` = 1) AND (`b` = 2)");
    }

    #[test]
    fn unary_not_wraps() {
        let node = Node::UnaryNot {
            child: Box::new(Node::Compare { left: Box::new(name("a")), op: CompareOp::Eq, right: Box::new(int(1)) }),
        };
        assert_eq!(translate(&node, &calls()).unwrap(), "NOT (`a` = 1)");
    }

    #[test]
    fn unary_literal_folds_negation() {
        let node = Node::Compare {
            left: Box::new(name("balance")),
            op: CompareOp::Ge,
            right: Box::new(Node::UnaryLiteral(Box::new(int(5)))),
        };
        assert_eq!(translate(&node, &calls()).unwrap(), "`balance` IS NOT NULL AND `balance` >= -5");
    }

    #[test]
    fn unknown_call_surfaces_error() {
        let node = Node::Call { call_id: "nope".to_string() };
        assert!(matches!(translate(&node, &calls()), Err(TranslatorError::UnknownCall { .. })));
    }
}
