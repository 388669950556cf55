//! Stand-in for the external DSL parser and AST validator (SPEC_FULL.md
//! §4.6). The real parser and its validation passes are explicitly out of
//! scope for this repository; this module exists only so the HTTP surface
//! and end-to-end tests have something to build a [`crate::sql::ast::Node`]
//! tree from. It understands a small subset of the DSL: identifiers,
//! literals, the comparison operators in SPEC_FULL.md §3, and `and`/`or`/
//! `not` with parentheses — enough to exercise the translator, not a
//! complete grammar.

pub mod parser;

use crate::sql::ast::Node;

#[derive(Debug, thiserror::Error)]
#[error("failed to parse query filter: {0}")]
pub struct ParseError(pub String);

/// The external collaborator's interface: `parse_and_validate(source) ->
/// ValidatedTree`. A production deployment would call out to the real rule
/// engine's parser/validator here instead.
pub trait QueryParser: Send + Sync {
    fn parse_and_validate(&self, source: &str) -> Result<Node, ParseError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RecursiveDescentParser;

impl QueryParser for RecursiveDescentParser {
    fn parse_and_validate(&self, source: &str) -> Result<Node, ParseError> {
        parser::parse(source)
    }
}
