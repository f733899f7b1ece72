//! Cross-cutting rewrite and optimization invariants: idempotent rewriting,
//! predicate preservation, deterministic output, and monotone cardinality
//! under added conjuncts.

use qopt_core::ast::{
    JoinClause, JoinType, SelectItem, SelectQuery, TableRef, COMMA_JOIN_SENTINEL,
};
use qopt_core::catalog::StatsCatalog;
use qopt_core::config::OptimizerConfig;
use qopt_core::optimizer::Optimizer;
use qopt_core::predicate;
use qopt_core::rewrite::{RewriteContext, Trace};
use qopt_core::sql::select_query_to_sql;
use qopt_rules::default_rewrite_registry;
use std::sync::Arc;

fn demo_catalog() -> StatsCatalog {
    let mut catalog = StatsCatalog::new();
    catalog.load_defaults();
    catalog
}

fn demo_optimizer() -> Optimizer {
    Optimizer::new(Arc::new(demo_catalog()), Arc::new(default_rewrite_registry()))
}

fn comma_join(table: &str, alias: &str) -> JoinClause {
    JoinClause {
        join_type: JoinType::Inner,
        table: TableRef::new(table, alias),
        on_conds: vec![COMMA_JOIN_SENTINEL.to_string()],
    }
}

/// A representative set of query shapes covering every rewrite rule.
fn sample_queries() -> Vec<SelectQuery> {
    let mut queries = Vec::new();

    // Comma join + single-table filter.
    let mut q = SelectQuery::from_table(TableRef::new("users", "u"));
    q.select_items.push(SelectItem::new("*"));
    q.joins.push(comma_join("orders", "o"));
    q.where_conditions.push("u.id = o.user_id".to_string());
    q.where_conditions.push("o.status = 'A'".to_string());
    queries.push(q);

    // Scalar subquery in the select list.
    let mut q = SelectQuery::from_table(TableRef::new("orders", "o"));
    q.select_items.push(SelectItem::with_alias(
        "(SELECT name FROM products p WHERE p.id = o.product_id)",
        "pname",
    ));
    queries.push(q);

    // Trivial conjunct + pushable equality, qualified projections.
    let mut q = SelectQuery::from_table(TableRef::new("users", "u"));
    q.select_items.push(SelectItem::new("u.name"));
    q.where_conditions.push("1=1".to_string());
    q.where_conditions.push("u.id = 42".to_string());
    queries.push(q);

    // Reorderable inner joins plus an aggregation.
    let mut q = SelectQuery::from_table(TableRef::new("users", "u"));
    q.select_items.push(SelectItem::new("COUNT(*)"));
    q.joins.push(JoinClause {
        join_type: JoinType::Inner,
        table: TableRef::new("orders", "o"),
        on_conds: vec!["u.id = o.user_id".to_string()],
    });
    q.joins.push(JoinClause {
        join_type: JoinType::Inner,
        table: TableRef::new("products", "p"),
        on_conds: vec!["o.product_id = p.id".to_string()],
    });
    q.where_conditions.push("o.status = 'A'".to_string());
    q.group_by.push("u.name".to_string());
    queries.push(q);

    queries
}

#[test]
fn test_rewriting_is_idempotent() {
    let catalog = demo_catalog();
    let config = OptimizerConfig::default();
    let registry = default_rewrite_registry();
    let ctx = RewriteContext {
        catalog: &catalog,
        config: &config,
    };

    for (i, original) in sample_queries().into_iter().enumerate() {
        let mut once = original.clone();
        let mut trace = Trace::new();
        registry.run(&mut once, &ctx, &mut trace);

        let mut twice = once.clone();
        let mut second_trace = Trace::new();
        registry.run(&mut twice, &ctx, &mut second_trace);

        assert_eq!(once, twice, "query {i}: second rewrite changed the AST");
        assert!(
            second_trace.is_empty(),
            "query {i}: second rewrite produced trace entries: {second_trace}"
        );
        assert_eq!(
            select_query_to_sql(&once),
            select_query_to_sql(&twice),
            "query {i}: emitted SQL not stable"
        );
    }
}

#[test]
fn test_predicates_are_preserved() {
    let catalog = demo_catalog();
    let config = OptimizerConfig::default();
    let registry = default_rewrite_registry();
    let ctx = RewriteContext {
        catalog: &catalog,
        config: &config,
    };

    for (i, original) in sample_queries().into_iter().enumerate() {
        let mut expected: Vec<String> = original
            .where_conditions
            .iter()
            .filter(|c| !predicate::is_trivially_true(c))
            .cloned()
            .collect();

        let mut rewritten = original.clone();
        let mut trace = Trace::new();
        registry.run(&mut rewritten, &ctx, &mut trace);

        // Every original WHERE conjunct survives exactly once: as a pushed
        // filter, a join ON condition, or a residual WHERE conjunct.
        let mut actual: Vec<String> = Vec::new();
        actual.extend(rewritten.from_table.pushed_filters.iter().cloned());
        for join in &rewritten.joins {
            actual.extend(join.table.pushed_filters.iter().cloned());
            actual.extend(
                join.on_conds
                    .iter()
                    .filter(|c| !predicate::is_trivially_true(c))
                    .cloned(),
            );
        }
        actual.extend(rewritten.where_conditions.iter().cloned());
        // Decorrelation synthesizes new ON conditions; ignore predicates that
        // were not in the original WHERE list.
        actual.retain(|c| expected.contains(c));

        expected.sort();
        actual.sort();
        assert_eq!(expected, actual, "query {i}: predicate multiset changed");
    }
}

#[test]
fn test_optimization_is_deterministic() {
    let opt = demo_optimizer();
    for (i, query) in sample_queries().into_iter().enumerate() {
        let first = opt.optimize(&query).unwrap();
        let second = opt.optimize(&query).unwrap();
        assert_eq!(first.plan, second.plan, "query {i}: plan differs");
        assert_eq!(
            first.trace.entries(),
            second.trace.entries(),
            "query {i}: trace differs"
        );
        assert_eq!(
            first.rewritten_sql, second.rewritten_sql,
            "query {i}: rewritten SQL differs"
        );
        assert_eq!(
            first.plan.explain(),
            second.plan.explain(),
            "query {i}: explain differs"
        );
    }
}

#[test]
fn test_added_conjunct_never_increases_cardinality() {
    let opt = demo_optimizer();

    let mut base = SelectQuery::from_table(TableRef::new("orders", "o"));
    base.select_items.push(SelectItem::new("*"));
    base.where_conditions.push("o.status = 'A'".to_string());
    let without = opt.optimize(&base).unwrap();

    let mut narrowed = base.clone();
    narrowed.where_conditions.push("o.user_id = 7".to_string());
    let with = opt.optimize(&narrowed).unwrap();

    assert!(with.plan.estimated_cardinality <= without.plan.estimated_cardinality);
}

#[test]
fn test_rewritten_sql_round_trips_through_rewrite() {
    // Optimizing an already-rewritten query must not change its SQL again.
    let opt = demo_optimizer();
    for query in sample_queries() {
        let catalog = demo_catalog();
        let config = OptimizerConfig::default();
        let registry = default_rewrite_registry();
        let ctx = RewriteContext {
            catalog: &catalog,
            config: &config,
        };
        let mut rewritten = query.clone();
        let mut trace = Trace::new();
        registry.run(&mut rewritten, &ctx, &mut trace);

        let result = opt.optimize(&rewritten).unwrap();
        assert_eq!(result.rewritten_sql, select_query_to_sql(&rewritten));
    }
}
