//! # Comma-Join Canonicalization
//!
//! Tables separated by commas arrive from the parser as INNER joins with the
//! sentinel ON condition `1=1`; the real join predicates sit in WHERE. This
//! rule reclassifies them: a WHERE conjunct becomes the ON condition of a
//! sentinel join when it involves that join's table and at least one earlier
//! table (the FROM table or a preceding join). "Involves" is the lexical test
//! over the predicate text: `alias.` or ` alias ` appears.
//!
//! ```text
//! Before: FROM users u INNER JOIN orders o ON 1=1
//!         WHERE u.id = o.user_id AND o.status = 'A'
//! After:  FROM users u INNER JOIN orders o ON u.id = o.user_id
//!         WHERE o.status = 'A'
//! ```
//!
//! When a multi-table query arrives with no joins at all (some upstream paths
//! lose the comma-join markers), the rule falls back to **join
//! reconstruction**: every alias appearing in an `A.col = B.col` WHERE
//! predicate besides the FROM table's gets a synthesized INNER join, and the
//! connecting predicates move to its ON list. Table names are recovered from
//! the alias through the catalog's case-insensitive lookup where possible.

use qopt_core::ast::{JoinClause, JoinType, SelectQuery, TableRef};
use qopt_core::predicate;
use qopt_core::rewrite::{RewriteContext, RewriteRule};
use std::collections::BTreeSet;

/// Reclassify comma-join sentinel conditions from WHERE into ON.
pub struct CommaJoinRule;

impl RewriteRule for CommaJoinRule {
    fn name(&self) -> &str {
        "comma_join_conversion"
    }

    fn apply(&self, query: &mut SelectQuery, ctx: &RewriteContext<'_>) -> Option<String> {
        let mut consumed = vec![false; query.where_conditions.len()];
        let mut moved = 0usize;

        for i in 0..query.joins.len() {
            if !query.joins[i].is_comma_sentinel() {
                continue;
            }
            let join_alias = query.joins[i].table.effective_alias().to_string();
            let mut earlier: Vec<String> =
                vec![query.from_table.effective_alias().to_string()];
            earlier.extend(
                query.joins[..i]
                    .iter()
                    .map(|j| j.table.effective_alias().to_string()),
            );

            let mut lifted = Vec::new();
            for (ci, cond) in query.where_conditions.iter().enumerate() {
                if consumed[ci] {
                    continue;
                }
                if predicate::involves_alias(cond, &join_alias)
                    && earlier.iter().any(|a| predicate::involves_alias(cond, a))
                {
                    lifted.push(cond.clone());
                    consumed[ci] = true;
                }
            }
            if !lifted.is_empty() {
                moved += lifted.len();
                query.joins[i].on_conds = lifted;
            }
        }

        if moved > 0 {
            drop_consumed(query, &consumed);
            return Some(format!(
                "moved {moved} WHERE predicates into join ON conditions"
            ));
        }

        if query.joins.is_empty() && !query.where_conditions.is_empty() {
            return reconstruct_joins(query, ctx);
        }
        None
    }
}

/// Best-effort recovery for multi-table queries parsed without comma-join
/// markers: synthesize INNER joins from the aliases seen in two-table equality
/// predicates.
fn reconstruct_joins(query: &mut SelectQuery, ctx: &RewriteContext<'_>) -> Option<String> {
    let from_alias = query.from_table.effective_alias().to_string();

    let mut aliases: BTreeSet<String> = BTreeSet::new();
    for cond in &query.where_conditions {
        if let Some((q1, _, q2, _)) = predicate::two_table_equality(cond) {
            aliases.insert(q1);
            aliases.insert(q2);
        }
    }
    aliases.retain(|a| !a.eq_ignore_ascii_case(&from_alias));
    if aliases.is_empty() {
        return None;
    }

    let mut placed: BTreeSet<String> = BTreeSet::new();
    placed.insert(from_alias.to_lowercase());
    let mut consumed = vec![false; query.where_conditions.len()];
    let mut added = 0usize;

    // Passes keep running until no alias can be connected to the tables
    // placed so far; unconnected aliases are left alone.
    loop {
        let mut progressed = false;
        for alias in &aliases {
            if placed.contains(&alias.to_lowercase()) {
                continue;
            }
            let mut lifted: Vec<(usize, String)> = Vec::new();
            for (ci, cond) in query.where_conditions.iter().enumerate() {
                if consumed[ci] {
                    continue;
                }
                if let Some((q1, _, q2, _)) = predicate::two_table_equality(cond) {
                    let connects = (q1 == *alias && placed.contains(&q2.to_lowercase()))
                        || (q2 == *alias && placed.contains(&q1.to_lowercase()));
                    if connects {
                        lifted.push((ci, cond.clone()));
                    }
                }
            }
            if lifted.is_empty() {
                continue;
            }
            for (ci, _) in &lifted {
                consumed[*ci] = true;
            }
            query.joins.push(JoinClause {
                join_type: JoinType::Inner,
                table: TableRef::new(
                    ctx.catalog.resolve_table_name_ci(alias),
                    alias.clone(),
                ),
                on_conds: lifted.into_iter().map(|(_, c)| c).collect(),
            });
            placed.insert(alias.to_lowercase());
            added += 1;
            progressed = true;
        }
        if !progressed {
            break;
        }
    }

    if added == 0 {
        return None;
    }
    drop_consumed(query, &consumed);
    Some(format!(
        "reconstructed {added} inner joins from WHERE equality predicates"
    ))
}

fn drop_consumed(query: &mut SelectQuery, consumed: &[bool]) {
    let conds = std::mem::take(&mut query.where_conditions);
    query.where_conditions = conds
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !consumed[*i])
        .map(|(_, c)| c)
        .collect();
}
