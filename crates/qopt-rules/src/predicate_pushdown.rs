//! # Predicate Pushdown
//!
//! After comma-join canonicalization every WHERE conjunct is classified by the
//! set of table aliases it references. Conjuncts referencing a single alias
//! move into that table's pushed filter list, so the scan produces fewer rows
//! before any join runs. Conjuncts referencing several aliases stay in WHERE
//! and become a filter above the join tree.
//!
//! The rule is conservative:
//!
//! - Nothing is pushed below a join's null-supplying side. A filter on the
//!   right table of a LEFT join (or on anything left of a RIGHT/FULL join)
//!   evaluated at the scan would change which rows get NULL-padded.
//! - Only pure column comparisons move. Expressions the recognizer does not
//!   fully understand (function calls, OR chains) stay in WHERE.
//! - A conjunct with no alias qualifier is attributed to the FROM table only
//!   when it is the query's sole relation.

use qopt_core::ast::SelectQuery;
use qopt_core::predicate;
use qopt_core::rewrite::{RewriteContext, RewriteRule};
use std::collections::BTreeSet;

/// Move single-table WHERE conjuncts into the owning table's scan.
pub struct PredicatePushdownRule;

#[derive(Debug, Clone, Copy)]
enum Target {
    From,
    Join(usize),
}

impl RewriteRule for PredicatePushdownRule {
    fn name(&self) -> &str {
        "predicate_pushdown"
    }

    fn apply(&self, query: &mut SelectQuery, _ctx: &RewriteContext<'_>) -> Option<String> {
        let alias_set: BTreeSet<String> = query
            .aliases()
            .iter()
            .map(|a| a.to_lowercase())
            .collect();
        // A RIGHT/FULL (or right-anti) join may NULL-pad everything to its
        // left, which includes the FROM table and every earlier join.
        let from_blocked = query
            .joins
            .iter()
            .any(|j| j.join_type.null_supplies_left());

        let mut moves: Vec<Option<Target>> = Vec::with_capacity(query.where_conditions.len());
        for cond in &query.where_conditions {
            moves.push(self.classify(query, &alias_set, from_blocked, cond));
        }
        if moves.iter().all(Option::is_none) {
            return None;
        }

        let mut pushed = 0usize;
        let mut remaining = Vec::new();
        let conds = std::mem::take(&mut query.where_conditions);
        for (cond, target) in conds.into_iter().zip(moves) {
            match target {
                Some(Target::From) => {
                    query.from_table.pushed_filters.push(cond);
                    pushed += 1;
                }
                Some(Target::Join(i)) => {
                    query.joins[i].table.pushed_filters.push(cond);
                    pushed += 1;
                }
                None => remaining.push(cond),
            }
        }
        query.where_conditions = remaining;
        Some(format!("pushed {pushed} predicates into table scans"))
    }
}

impl PredicatePushdownRule {
    fn classify(
        &self,
        query: &SelectQuery,
        alias_set: &BTreeSet<String>,
        from_blocked: bool,
        cond: &str,
    ) -> Option<Target> {
        if !predicate::is_pure_comparison(cond) {
            return None;
        }
        let refs: Vec<String> = predicate::qualifier_candidates(cond)
            .into_iter()
            .filter(|q| alias_set.contains(&q.to_lowercase()))
            .collect();
        match refs.as_slice() {
            [] if query.joins.is_empty() => Some(Target::From),
            [alias] => self.target_for(query, &alias.to_lowercase(), from_blocked),
            _ => None,
        }
    }

    fn target_for(
        &self,
        query: &SelectQuery,
        alias_lower: &str,
        from_blocked: bool,
    ) -> Option<Target> {
        if query.from_table.effective_alias().to_lowercase() == alias_lower {
            return if from_blocked {
                None
            } else {
                Some(Target::From)
            };
        }
        for (i, join) in query.joins.iter().enumerate() {
            if join.table.effective_alias().to_lowercase() != alias_lower {
                continue;
            }
            if join.join_type.null_supplies_right() {
                return None;
            }
            // A later join that NULL-pads its left side covers this table too.
            if query.joins[i + 1..]
                .iter()
                .any(|j| j.join_type.null_supplies_left())
            {
                return None;
            }
            return Some(Target::Join(i));
        }
        None
    }
}
