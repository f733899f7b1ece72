//! # Heuristic Join Reordering
//!
//! Orders runs of consecutive INNER joins by the estimated cardinality of
//! their table (row count times the selectivity of its pushed filters),
//! smallest first. The cost-based join search makes the authoritative
//! ordering decision later; this heuristic exists so the *textual* rewrite is
//! stable and sensible even when the search falls back.
//!
//! Safety rules:
//!
//! - Only INNER joins move, and only within their contiguous run; outer,
//!   natural, and anti joins pin their position and fence off reordering.
//! - A candidate order is discarded wholesale if it would let a join's ON
//!   condition reference an alias that no longer precedes it.

use ordered_float::OrderedFloat;
use qopt_core::ast::{JoinClause, JoinType, SelectQuery};
use qopt_core::predicate;
use qopt_core::rewrite::{RewriteContext, RewriteRule};
use std::collections::BTreeSet;

/// Sort consecutive inner joins by estimated input cardinality.
pub struct JoinReorderRule;

impl RewriteRule for JoinReorderRule {
    fn name(&self) -> &str {
        "join_reordering"
    }

    fn apply(&self, query: &mut SelectQuery, ctx: &RewriteContext<'_>) -> Option<String> {
        if query.joins.len() < 2 {
            return None;
        }

        let mut joins = query.joins.clone();
        let mut start = 0;
        while start < joins.len() {
            if joins[start].join_type != JoinType::Inner {
                start += 1;
                continue;
            }
            let mut end = start;
            while end < joins.len() && joins[end].join_type == JoinType::Inner {
                end += 1;
            }
            if end - start > 1 {
                sort_run(&mut joins[start..end], ctx);
            }
            start = end;
        }

        if joins == query.joins {
            return None;
        }
        if !references_resolve(query, &joins) {
            return None;
        }
        query.joins = joins;
        Some("reordered inner joins by estimated input cardinality".to_string())
    }
}

/// Stable sort of one inner-join run by estimated table cardinality.
fn sort_run(run: &mut [JoinClause], ctx: &RewriteContext<'_>) {
    let mut keyed: Vec<(OrderedFloat<f64>, usize, JoinClause)> = run
        .iter()
        .cloned()
        .enumerate()
        .map(|(i, j)| (OrderedFloat(estimated_cardinality(&j, ctx)), i, j))
        .collect();
    keyed.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
    for (slot, (_, _, join)) in run.iter_mut().zip(keyed) {
        *slot = join;
    }
}

/// Rows the join's table contributes after its pushed filters.
fn estimated_cardinality(join: &JoinClause, ctx: &RewriteContext<'_>) -> f64 {
    match ctx.catalog.get_table_stats_ci(&join.table.name) {
        Some(stats) => {
            let selectivity: f64 = join
                .table
                .pushed_filters
                .iter()
                .map(|c| stats.condition_selectivity(c))
                .product();
            stats.row_count as f64 * selectivity
        }
        None => ctx.config.default_row_count as f64,
    }
}

/// Every ON condition may only reference aliases introduced at or before its
/// join. Returns false when the candidate order breaks that.
fn references_resolve(query: &SelectQuery, joins: &[JoinClause]) -> bool {
    let all_aliases: BTreeSet<String> = std::iter::once(&query.from_table)
        .chain(joins.iter().map(|j| &j.table))
        .map(|t| t.effective_alias().to_lowercase())
        .collect();

    let mut available: BTreeSet<String> = BTreeSet::new();
    available.insert(query.from_table.effective_alias().to_lowercase());
    for join in joins {
        let own = join.table.effective_alias().to_lowercase();
        for cond in &join.on_conds {
            if predicate::is_trivially_true(cond) {
                continue;
            }
            for qual in predicate::qualifier_candidates(cond) {
                let qual = qual.to_lowercase();
                if all_aliases.contains(&qual) && qual != own && !available.contains(&qual) {
                    return false;
                }
            }
        }
        available.insert(own);
    }
    true
}
