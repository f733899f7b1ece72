//! # Query Representation
//!
//! This module defines the parsed query structure that the optimizer receives
//! from the SQL parser and mutates during rewriting. The representation is
//! deliberately textual: select expressions, predicates, and sort keys are
//! opaque strings produced by the parser, and the optimizer recognizes the
//! canonical patterns it cares about via regex/substring matching (see the
//! `predicate` module). This keeps expression ownership with the parser.
//!
//! ## Parser Boundary
//!
//! Comma-separated tables in the FROM clause are delivered as INNER joins whose
//! ON list is the single sentinel predicate `1=1` ([`COMMA_JOIN_SENTINEL`]).
//! The comma-join canonicalization rule reclassifies the real join predicates
//! out of the WHERE clause; until then the sentinel marks the join as
//! "condition still unknown".

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Sentinel ON condition marking a join that originated from a comma-separated
/// FROM list. The parser attaches it; the rewriter replaces it.
pub const COMMA_JOIN_SENTINEL: &str = "1=1";

/// SQL join types understood by the optimizer.
///
/// Only inner joins participate in join reordering. All other types pin their
/// relation to its source position because moving a null-supplying side changes
/// query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Natural,
    LeftAnti,
    RightAnti,
    FullOuterAnti,
}

impl JoinType {
    /// The SQL token emitted before `JOIN` by the serializer.
    pub fn sql_token(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL",
            JoinType::Natural => "NATURAL",
            JoinType::LeftAnti => "LEFT ANTI",
            JoinType::RightAnti => "RIGHT ANTI",
            JoinType::FullOuterAnti => "FULL OUTER ANTI",
        }
    }

    /// True if the join's right side may be padded with NULLs (or dropped
    /// entirely, for the anti variants). Filters on such a table must not be
    /// pushed below the join.
    pub fn null_supplies_right(&self) -> bool {
        matches!(
            self,
            JoinType::Left | JoinType::Full | JoinType::LeftAnti | JoinType::FullOuterAnti
        )
    }

    /// True if everything to the left of the join may be padded with NULLs.
    pub fn null_supplies_left(&self) -> bool {
        matches!(
            self,
            JoinType::Right | JoinType::Full | JoinType::RightAnti | JoinType::FullOuterAnti
        )
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_token())
    }
}

/// A base table reference in FROM or JOIN position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub name: String,
    /// Alias as written in the query; empty when the table was not aliased.
    pub alias: String,
    /// Single-table predicates relocated here from WHERE by predicate pushdown.
    /// These are conjunctive and are re-emitted into WHERE by the serializer.
    #[serde(default)]
    pub pushed_filters: Vec<String>,
}

impl TableRef {
    pub fn new(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
            pushed_filters: Vec::new(),
        }
    }

    /// The name under which columns of this table are resolved: the alias when
    /// present, otherwise the table name itself.
    pub fn effective_alias(&self) -> &str {
        if self.alias.is_empty() {
            &self.name
        } else {
            &self.alias
        }
    }
}

/// One JOIN clause: join type, the joined table, and the conjunctive ON list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: TableRef,
    pub on_conds: Vec<String>,
}

impl JoinClause {
    /// True if this join still carries the parser's comma-join sentinel.
    pub fn is_comma_sentinel(&self) -> bool {
        self.on_conds.first().map(String::as_str) == Some(COMMA_JOIN_SENTINEL)
    }
}

/// One item of the select list: an expression and its optional output alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectItem {
    pub expr: String,
    pub alias: Option<String>,
}

impl SelectItem {
    pub fn new(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            alias: None,
        }
    }

    pub fn with_alias(expr: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            alias: Some(alias.into()),
        }
    }

    /// Rendered form, `expr AS alias` when aliased.
    pub fn rendered(&self) -> String {
        match &self.alias {
            Some(a) => format!("{} AS {}", self.expr, a),
            None => self.expr.clone(),
        }
    }
}

/// One ORDER BY item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub expr: String,
    pub ascending: bool,
}

/// The parsed SELECT query, mutated in place by the rewrite rules.
///
/// `where_conditions` and `having_conditions` are conjunctive lists (the parser
/// splits on top-level AND). `limit` of -1 means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectQuery {
    pub distinct: bool,
    pub select_items: Vec<SelectItem>,
    pub from_table: TableRef,
    pub joins: Vec<JoinClause>,
    pub where_conditions: Vec<String>,
    pub group_by: Vec<String>,
    pub having_conditions: Vec<String>,
    pub order_by: Vec<OrderItem>,
    pub limit: i64,
    /// Column subsets each scan must project, recorded by projection pushdown
    /// and keyed by effective alias. Empty means "no restriction computed".
    #[serde(default)]
    pub scan_projections: BTreeMap<String, Vec<String>>,
}

impl SelectQuery {
    /// A query over a single table with an unlimited LIMIT. Convenient starting
    /// point for tests and callers constructing queries programmatically.
    pub fn from_table(table: TableRef) -> Self {
        Self {
            from_table: table,
            limit: -1,
            ..Default::default()
        }
    }

    /// Effective aliases of all base relations, FROM table first, then joins in
    /// source order.
    pub fn aliases(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(1 + self.joins.len());
        out.push(self.from_table.effective_alias().to_string());
        for j in &self.joins {
            out.push(j.table.effective_alias().to_string());
        }
        out
    }
}
