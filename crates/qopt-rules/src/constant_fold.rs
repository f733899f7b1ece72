//! # Constant Folding
//!
//! Drops conjuncts that are trivially true (`1=1`, `TRUE`) from WHERE and from
//! every pushed filter list -- they carry no information and would only dilute
//! selectivity estimates. Conjuncts that are trivially false are left in
//! place: the plan generator gives them selectivity zero, which collapses the
//! plan to an empty result, and the serializer keeps them so the rewritten SQL
//! stays equivalent.

use qopt_core::ast::SelectQuery;
use qopt_core::predicate;
use qopt_core::rewrite::{RewriteContext, RewriteRule};

/// Remove trivially true conjuncts; flag contradictions in the trace.
pub struct ConstantFoldRule;

impl RewriteRule for ConstantFoldRule {
    fn name(&self) -> &str {
        "constant_folding"
    }

    fn apply(&self, query: &mut SelectQuery, _ctx: &RewriteContext<'_>) -> Option<String> {
        let mut dropped = 0usize;

        let before = query.where_conditions.len();
        query
            .where_conditions
            .retain(|c| !predicate::is_trivially_true(c));
        dropped += before - query.where_conditions.len();

        let tables = std::iter::once(&mut query.from_table)
            .chain(query.joins.iter_mut().map(|j| &mut j.table));
        for table in tables {
            let before = table.pushed_filters.len();
            table
                .pushed_filters
                .retain(|c| !predicate::is_trivially_true(c));
            dropped += before - table.pushed_filters.len();
        }

        if dropped == 0 {
            return None;
        }

        let contradiction = query
            .where_conditions
            .iter()
            .any(|c| predicate::is_trivially_false(c));
        let mut detail = format!(
            "removed {dropped} trivially true predicate{}",
            if dropped == 1 { "" } else { "s" }
        );
        if contradiction {
            detail.push_str("; a contradictory predicate makes the result empty");
        }
        Some(detail)
    }
}
