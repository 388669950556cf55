//! The validated predicate tree consumed by the translator.
//!
//! The upstream DSL parser and AST validator are external collaborators
//! (see `crate::dsl` for the thin stand-in this repository ships); by the
//! time a tree reaches [`crate::sql::translator::translate`] it is assumed
//! well-formed: every `Compare` has at least one `Name` side, every
//! `BoolOp` has at least two children.
//!
//! Dispatch here is a plain `match` over this enum, not a reflective
//! lookup by node class name.

use std::collections::HashMap;
use std::sync::Arc;

use crate::sql::format::Literal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

#[derive(Debug, Clone)]
pub enum Node {
    BoolOp { op: BoolOp, children: Vec<Node> },
    UnaryNot { child: Box<Node> },
    Compare { left: Box<Node>, op: CompareOp, right: Box<Node> },
    Call { call_id: String },
    Name(String),
    Literal(Literal),
    UnaryLiteral(Box<Node>),
}

/// Capability a query-emitting UDF exposes. A UDF that can render itself
/// directly as SQL takes priority; one that only knows the legacy JSON
/// filter dialect falls back to [`crate::sql::legacy_filter`].
pub trait Udf: Send + Sync {
    fn to_sql(&self, args: &HashMap<String, Literal>) -> Option<String> {
        let _ = args;
        None
    }

    fn legacy_filter(&self, args: &HashMap<String, Literal>) -> Option<serde_json::Value> {
        let _ = args;
        None
    }
}

/// What the external validator hands the translator for each `Call` node:
/// the UDF implementation plus the keyword arguments it was invoked with.
pub type CallMap = HashMap<String, (Arc<dyn Udf>, HashMap<String, Literal>)>;
