//! # Projection Pushdown
//!
//! Computes the set of columns the query actually needs -- from the select
//! list, join conditions, WHERE/HAVING, GROUP BY, and ORDER BY -- and records
//! the per-scan column subset as an annotation on the query
//! (`scan_projections`). The plan generator copies the subset into each scan's
//! output columns; enforcement happens at emission, not by restructuring the
//! query text.
//!
//! The computation bails out to "no restriction" when it cannot be precise: a
//! `*` select item needs everything, and an unqualified column reference
//! cannot be attributed to one table here.

use qopt_core::ast::SelectQuery;
use qopt_core::predicate;
use qopt_core::rewrite::{RewriteContext, RewriteRule};
use std::collections::{BTreeMap, BTreeSet};

/// Record the column subset each scan must project.
pub struct ProjectionPushdownRule;

impl RewriteRule for ProjectionPushdownRule {
    fn name(&self) -> &str {
        "projection_pushdown"
    }

    fn apply(&self, query: &mut SelectQuery, _ctx: &RewriteContext<'_>) -> Option<String> {
        let desired = required_columns(query);
        if query.scan_projections == desired {
            return None;
        }
        let scans = desired.len();
        query.scan_projections = desired;
        Some(format!("recorded column requirements for {scans} scans"))
    }
}

fn required_columns(query: &SelectQuery) -> BTreeMap<String, Vec<String>> {
    if query.select_items.is_empty()
        || query.select_items.iter().any(|i| i.expr.trim() == "*")
    {
        return BTreeMap::new();
    }

    // Lowercased alias -> effective alias as written, for stable map keys.
    let mut alias_of: BTreeMap<String, String> = BTreeMap::new();
    for alias in query.aliases() {
        alias_of.insert(alias.to_lowercase(), alias);
    }

    let mut texts: Vec<&str> = Vec::new();
    texts.extend(query.select_items.iter().map(|i| i.expr.as_str()));
    for join in &query.joins {
        texts.extend(join.on_conds.iter().map(String::as_str));
        texts.extend(join.table.pushed_filters.iter().map(String::as_str));
    }
    texts.extend(query.from_table.pushed_filters.iter().map(String::as_str));
    texts.extend(query.where_conditions.iter().map(String::as_str));
    texts.extend(query.group_by.iter().map(String::as_str));
    texts.extend(query.having_conditions.iter().map(String::as_str));
    texts.extend(query.order_by.iter().map(|o| o.expr.as_str()));

    let mut needed: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for text in texts {
        for (qual, col) in predicate::qualified_refs(text) {
            if let Some(alias) = alias_of.get(&qual.to_lowercase()) {
                needed.entry(alias.clone()).or_default().insert(col);
            }
        }
        // An unqualified column could live in any table; give up rather than
        // under-project.
        let unqualified = predicate::bare_identifier(text).is_some()
            || predicate::parse_comparison(text)
                .map(|c| !c.column.contains('.'))
                .unwrap_or(false);
        if unqualified && !predicate::is_trivially_true(text) {
            return BTreeMap::new();
        }
    }

    needed
        .into_iter()
        .map(|(alias, cols)| (alias, cols.into_iter().collect()))
        .collect()
}
