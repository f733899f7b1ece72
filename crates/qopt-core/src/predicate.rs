//! # Textual Predicate Recognition
//!
//! Predicates flow through the optimizer as opaque strings; the parser owns
//! expression structure. This module is the single place that recognizes the
//! canonical patterns the optimizer acts on: simple comparisons, two-table
//! equality predicates, decorrelatable scalar subqueries, and trivially
//! true/false conjuncts. Everything is regex/substring matching -- no predicate
//! is ever re-parsed into a tree.
//!
//! All regexes are compiled once into `Lazy` statics.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

static QUALIFIED_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Za-z_]\w*)\.(\w+)").unwrap());

static TWO_TABLE_EQ: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_]\w*)\.(\w+)\s*=\s*([A-Za-z_]\w*)\.(\w+)\s*$").unwrap()
});

static COMPARISON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*([A-Za-z_]\w*(?:\.\w+)?)\s*(<=|>=|<>|!=|=|<|>|\bLIKE\b)\s*('[^']*'|\w+(?:\.\w+)?)\s*$")
        .unwrap()
});

static SCALAR_SUBQUERY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*\(\s*SELECT\s+(\w+)\s+FROM\s+(\w+)\s+(?:AS\s+)?(\w+)\s+WHERE\s+(\w+)\.(\w+)\s*=\s*(\w+)\.(\w+)\s*\)\s*$",
    )
    .unwrap()
});

static AGGREGATE_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(COUNT|SUM|AVG|MIN|MAX)\s*\(").unwrap());

static STRING_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"'[^']*'").unwrap());

static BARE_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([A-Za-z_]\w*)\s*$").unwrap());

/// Comparison operators recognized in predicate texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
}

impl CompareOp {
    fn from_symbol(sym: &str) -> Option<Self> {
        match sym.to_ascii_uppercase().as_str() {
            "=" => Some(CompareOp::Eq),
            "<>" | "!=" => Some(CompareOp::NotEq),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::LtEq),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::GtEq),
            "LIKE" => Some(CompareOp::Like),
            _ => None,
        }
    }
}

/// A recognized simple comparison: `column op value`, where `column` may be
/// qualified (`alias.col`) and `value` is a literal or another column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub column: String,
    pub op: CompareOp,
    pub value: String,
}

impl Comparison {
    /// The comparison value with surrounding single quotes removed, suitable
    /// for histogram lookups.
    pub fn value_literal(&self) -> &str {
        self.value.trim_matches('\'')
    }
}

/// A recognized decorrelatable scalar subquery in a select item:
/// `(SELECT col FROM tbl alias WHERE a.x = b.y)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarSubquery {
    pub select_column: String,
    pub table_name: String,
    pub table_alias: String,
    pub left_qualifier: String,
    pub left_column: String,
    pub right_qualifier: String,
    pub right_column: String,
}

/// Recognize a simple binary comparison. Returns `None` for anything more
/// structured (function calls, OR chains, parenthesized expressions).
pub fn parse_comparison(cond: &str) -> Option<Comparison> {
    if cond.contains('(') {
        return None;
    }
    let caps = COMPARISON.captures(cond)?;
    Some(Comparison {
        column: caps[1].to_string(),
        op: CompareOp::from_symbol(&caps[2])?,
        value: caps[3].to_string(),
    })
}

/// Recognize `A.x = B.y` between two distinct qualifiers.
pub fn two_table_equality(cond: &str) -> Option<(String, String, String, String)> {
    let caps = TWO_TABLE_EQ.captures(cond)?;
    if caps[1].eq_ignore_ascii_case(&caps[3]) {
        return None;
    }
    Some((
        caps[1].to_string(),
        caps[2].to_string(),
        caps[3].to_string(),
        caps[4].to_string(),
    ))
}

/// Recognize the decorrelatable scalar subquery pattern.
pub fn scalar_subquery(expr: &str) -> Option<ScalarSubquery> {
    let caps = SCALAR_SUBQUERY.captures(expr)?;
    Some(ScalarSubquery {
        select_column: caps[1].to_string(),
        table_name: caps[2].to_string(),
        table_alias: caps[3].to_string(),
        left_qualifier: caps[4].to_string(),
        left_column: caps[5].to_string(),
        right_qualifier: caps[6].to_string(),
        right_column: caps[7].to_string(),
    })
}

/// The lexical "involves" test used by comma-join canonicalization: a predicate
/// involves a table when `alias.` or ` alias ` appears in its text.
pub fn involves_alias(cond: &str, alias: &str) -> bool {
    cond.contains(&format!("{alias}.")) || cond.contains(&format!(" {alias} "))
}

/// All alias qualifiers appearing as `qualifier.column` in the text, with
/// string literals masked out first. Callers intersect the result with the set
/// of aliases actually in scope.
pub fn qualifier_candidates(text: &str) -> BTreeSet<String> {
    let masked = mask_string_literals(text);
    QUALIFIED_REF
        .captures_iter(&masked)
        .map(|c| c[1].to_string())
        .collect()
}

/// All `(qualifier, column)` pairs appearing in the text, literals masked.
pub fn qualified_refs(text: &str) -> Vec<(String, String)> {
    let masked = mask_string_literals(text);
    QUALIFIED_REF
        .captures_iter(&masked)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}

/// If the text is a single bare identifier, return it.
pub fn bare_identifier(text: &str) -> Option<String> {
    BARE_IDENT.captures(text).map(|c| c[1].to_string())
}

/// Replace string literal contents with `''` so alias scans don't match text
/// inside quotes.
pub fn mask_string_literals(text: &str) -> String {
    STRING_LITERAL.replace_all(text, "''").into_owned()
}

/// True for select expressions that are aggregate function calls.
pub fn is_aggregate_expr(expr: &str) -> bool {
    AGGREGATE_CALL.is_match(expr)
}

fn normalized(cond: &str) -> String {
    cond.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Conjuncts that are always true (`1=1`, `TRUE`) and can be dropped.
pub fn is_trivially_true(cond: &str) -> bool {
    let n = normalized(cond);
    n == "1=1" || n == "TRUE"
}

/// Conjuncts that are always false and short-circuit the query to an empty
/// result.
pub fn is_trivially_false(cond: &str) -> bool {
    let n = normalized(cond);
    n == "FALSE" || n == "1=0" || n == "0=1"
}

/// A predicate is a pure column comparison when it matches the simple
/// comparison shape and is not a trivial constant. Only such predicates are
/// eligible for pushdown.
pub fn is_pure_comparison(cond: &str) -> bool {
    !is_trivially_true(cond) && !is_trivially_false(cond) && parse_comparison(cond).is_some()
}
