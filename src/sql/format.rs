//! Identifier and literal formatting for the ClickHouse SQL surface.
//!
//! These two functions are the only place in the crate that knows how to
//! escape something for interpolation into generated SQL. Every other
//! module (translator, legacy adapter, composer, planners) goes through
//! them rather than building escaped strings itself.

use serde::{Deserialize, Serialize};

/// A scalar or list value that can appear on the right-hand side of a
/// comparison once an AST node has been folded down to its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
}

impl Literal {
    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }

    /// Negate a numeric literal. Used to fold `UnaryLiteral` nodes.
    pub fn negate(&self) -> Option<Literal> {
        match self {
            Literal::Int(i) => Some(Literal::Int(-i)),
            Literal::Float(f) => Some(Literal::Float(-f)),
            _ => None,
        }
    }
}

/// Wrap `name` in backticks, doubling any embedded backtick.
pub fn quote_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('`');
    for c in name.chars() {
        if c == '`' {
            out.push_str("``");
        } else {
            out.push(c);
        }
    }
    out.push('`');
    out
}

/// Backslash-escape a single quote so `s` can be embedded in a `'...'` literal.
fn escape_single_quotes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\'' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Backslash-escape the two ILIKE wildcard characters so a literal substring
/// search doesn't accidentally become a pattern match.
pub fn escape_like_wildcards(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '%' || c == '_' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Render a literal as a ClickHouse SQL expression.
pub fn format_value(v: &Literal) -> String {
    match v {
        Literal::Null => "NULL".to_string(),
        Literal::Bool(b) => if *b { "1".to_string() } else { "0".to_string() },
        Literal::Int(i) => i.to_string(),
        Literal::Float(f) => format_float(*f),
        Literal::Str(s) => format!("'{}'", escape_single_quotes(s)),
        Literal::List(items) => {
            let parts: Vec<String> = items.iter().map(format_value).collect();
            format!("({})", parts.join(", "))
        }
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() {
        f.to_string()
    } else {
        format!("'{}'", escape_single_quotes(&f.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_ident_doubles_embedded_backtick() {
        assert_eq!(quote_ident("a`b"), "`a``b`");
        assert_eq!(quote_ident("plain"), "`plain`");
    }

    #[test]
    fn format_value_null_and_bool() {
        assert_eq!(format_value(&Literal::Null), "NULL");
        assert_eq!(format_value(&Literal::Bool(true)), "1");
        assert_eq!(format_value(&Literal::Bool(false)), "0");
    }

    #[test]
    fn format_value_numbers() {
        assert_eq!(format_value(&Literal::Int(30)), "30");
        assert_eq!(format_value(&Literal::Int(-5)), "-5");
        assert_eq!(format_value(&Literal::Float(1.5)), "1.5");
    }

    #[test]
    fn format_value_string_escapes_quote() {
        assert_eq!(format_value(&Literal::Str("O'Brien".into())), "'O\\'Brien'");
    }

    #[test]
    fn format_value_list_recurses() {
        let v = Literal::List(vec![Literal::Str("a".into()), Literal::Str("b".into())]);
        assert_eq!(format_value(&v), "('a', 'b')");
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like_wildcards("50%_off"), "50\\%\\_off");
    }
}
