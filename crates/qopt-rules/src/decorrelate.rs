//! # Scalar Subquery Decorrelation
//!
//! A select item of the form
//! `(SELECT col FROM tbl alias WHERE alias.k = outer.k) AS out` computes one
//! value per outer row by re-running a lookup query. The equivalent LEFT join
//! lets the backend compute the same value in a single pass:
//!
//! ```text
//! Before: SELECT (SELECT name FROM products p WHERE p.id = o.product_id) AS pname
//!         FROM orders o
//! After:  SELECT p.name AS pname
//!         FROM orders o LEFT JOIN products p ON o.product_id = p.id
//! ```
//!
//! LEFT (not INNER) preserves outer rows with no match, exactly like the
//! scalar subquery's NULL result. New joins are appended after the existing
//! ones in first-match order. The rule is idempotent: once replaced, the
//! select item no longer matches the subquery pattern.

use qopt_core::ast::{JoinClause, JoinType, SelectQuery, TableRef};
use qopt_core::predicate;
use qopt_core::rewrite::{RewriteContext, RewriteRule};
use std::collections::BTreeSet;

/// Convert decorrelatable scalar subqueries in the select list to LEFT joins.
pub struct ScalarSubqueryRule;

impl RewriteRule for ScalarSubqueryRule {
    fn name(&self) -> &str {
        "subquery_to_join_conversion"
    }

    fn apply(&self, query: &mut SelectQuery, _ctx: &RewriteContext<'_>) -> Option<String> {
        let in_scope: BTreeSet<String> = query
            .aliases()
            .iter()
            .map(|a| a.to_lowercase())
            .collect();
        let mut taken = in_scope.clone();
        let mut new_joins: Vec<JoinClause> = Vec::new();
        let mut converted = 0usize;

        for item in &mut query.select_items {
            let Some(sub) = predicate::scalar_subquery(&item.expr) else {
                continue;
            };
            // Orient the correlation: the side qualified by the subquery's own
            // alias is the inner column, the other side must reference an
            // outer table already in scope.
            let (inner_column, outer_qual, outer_column) =
                if sub.left_qualifier.eq_ignore_ascii_case(&sub.table_alias) {
                    (sub.left_column, sub.right_qualifier, sub.right_column)
                } else if sub.right_qualifier.eq_ignore_ascii_case(&sub.table_alias) {
                    (sub.right_column, sub.left_qualifier, sub.left_column)
                } else {
                    continue;
                };
            if !in_scope.contains(&outer_qual.to_lowercase()) {
                continue;
            }
            // A colliding alias would make the rewritten query invalid.
            if !taken.insert(sub.table_alias.to_lowercase()) {
                continue;
            }

            new_joins.push(JoinClause {
                join_type: JoinType::Left,
                table: TableRef::new(sub.table_name, sub.table_alias.clone()),
                on_conds: vec![format!(
                    "{outer_qual}.{outer_column} = {}.{inner_column}",
                    sub.table_alias
                )],
            });
            item.expr = format!("{}.{}", sub.table_alias, sub.select_column);
            converted += 1;
        }

        if converted == 0 {
            return None;
        }
        query.joins.extend(new_joins);
        Some(format!(
            "converted {converted} scalar subqueries into LEFT joins"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qopt_core::ast::SelectItem;
    use qopt_core::catalog::StatsCatalog;
    use qopt_core::config::OptimizerConfig;

    fn apply(query: &mut SelectQuery) -> Option<String> {
        let catalog = StatsCatalog::new();
        let config = OptimizerConfig::default();
        let ctx = RewriteContext {
            catalog: &catalog,
            config: &config,
        };
        ScalarSubqueryRule.apply(query, &ctx)
    }

    #[test]
    fn test_decorrelates_to_left_join() {
        let mut q = SelectQuery::from_table(TableRef::new("orders", "o"));
        q.select_items.push(SelectItem::with_alias(
            "(SELECT name FROM products p WHERE p.id = o.product_id)",
            "pname",
        ));
        apply(&mut q).unwrap();

        assert_eq!(q.select_items[0].expr, "p.name");
        assert_eq!(q.select_items[0].alias.as_deref(), Some("pname"));
        assert_eq!(q.joins.len(), 1);
        let join = &q.joins[0];
        assert_eq!(join.join_type, JoinType::Left);
        assert_eq!(join.table.name, "products");
        assert_eq!(join.table.alias, "p");
        assert_eq!(join.on_conds, vec!["o.product_id = p.id".to_string()]);
    }

    #[test]
    fn test_flipped_correlation_sides() {
        let mut q = SelectQuery::from_table(TableRef::new("orders", "o"));
        q.select_items.push(SelectItem::new(
            "(SELECT name FROM products p WHERE o.product_id = p.id)",
        ));
        apply(&mut q).unwrap();
        assert_eq!(q.joins[0].on_conds, vec!["o.product_id = p.id".to_string()]);
    }

    #[test]
    fn test_unknown_outer_alias_left_alone() {
        let mut q = SelectQuery::from_table(TableRef::new("orders", "o"));
        q.select_items.push(SelectItem::new(
            "(SELECT name FROM products p WHERE p.id = z.product_id)",
        ));
        assert!(apply(&mut q).is_none());
        assert!(q.joins.is_empty());
        assert!(q.select_items[0].expr.starts_with("(SELECT"));
    }

    #[test]
    fn test_alias_collision_skipped() {
        let mut q = SelectQuery::from_table(TableRef::new("orders", "p"));
        q.select_items.push(SelectItem::new(
            "(SELECT name FROM products p WHERE p.id = p.product_id)",
        ));
        assert!(apply(&mut q).is_none());
    }

    #[test]
    fn test_idempotent() {
        let mut q = SelectQuery::from_table(TableRef::new("orders", "o"));
        q.select_items.push(SelectItem::with_alias(
            "(SELECT name FROM products p WHERE p.id = o.product_id)",
            "pname",
        ));
        apply(&mut q).unwrap();
        let after_first = q.clone();
        assert!(apply(&mut q).is_none());
        assert_eq!(q, after_first);
    }
}
