//! # Built-in Query Rewrite Rules
//!
//! The default logical transformations over the parsed query, applied in a
//! fixed pipeline order. Each rule mutates the `SelectQuery` in place and
//! produces one trace entry iff it changed the query:
//!
//! 1. **`CommaJoinRule`**: Replaces the parser's `1=1` comma-join sentinels
//!    with the real join predicates found in WHERE, and reconstructs joins for
//!    queries that arrived without comma-join markers.
//! 2. **`ScalarSubqueryRule`**: Decorrelates scalar subqueries in the select
//!    list into LEFT joins.
//! 3. **`PredicatePushdownRule`**: Moves single-table WHERE conjuncts into the
//!    owning table's scan, never across a null-supplying join side.
//! 4. **`ProjectionPushdownRule`**: Records the column subset each scan must
//!    produce.
//! 5. **`ConstantFoldRule`**: Drops trivially true conjuncts and flags
//!    contradictions.
//! 6. **`JoinReorderRule`**: Heuristic ordering of consecutive inner joins by
//!    estimated input cardinality. The cost-based join search remains the
//!    authority; this stabilizes the textual rewrite.
//!
//! The order is semantic: pushdown must see the join predicates already moved
//! out of WHERE, and constant folding must see the pushed filter lists.

pub mod comma_join;
pub mod constant_fold;
pub mod decorrelate;
pub mod join_reorder;
pub mod predicate_pushdown;
pub mod projection_pushdown;

use qopt_core::rewrite::RewriteRegistry;

/// Create the default rewrite registry with all built-in rules in pipeline
/// order.
pub fn default_rewrite_registry() -> RewriteRegistry {
    let mut registry = RewriteRegistry::new();
    registry.add_rule(Box::new(comma_join::CommaJoinRule));
    registry.add_rule(Box::new(decorrelate::ScalarSubqueryRule));
    registry.add_rule(Box::new(predicate_pushdown::PredicatePushdownRule));
    registry.add_rule(Box::new(projection_pushdown::ProjectionPushdownRule));
    registry.add_rule(Box::new(constant_fold::ConstantFoldRule));
    registry.add_rule(Box::new(join_reorder::JoinReorderRule));
    registry
}
