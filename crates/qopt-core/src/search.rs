//! # Join-Order Search
//!
//! Dynamic-programming enumeration of join trees over the inner-join cluster
//! of a query. The state is one entry per non-empty subset of the base
//! relations, held in a bitmask-indexed table:
//!
//! - **Base case**: each singleton subset holds the lowest-cost scan for that
//!   relation.
//! - **Induction**: every subset of size >= 2 considers every partition into
//!   two non-empty halves, joining the halves' best plans on all predicates
//!   that straddle the partition. A partition with no connecting predicate is
//!   a cross join: its plan cost is multiplied by the configured penalty so
//!   any connected alternative wins.
//!
//! The search metric for a candidate is
//! `dp[L].cost + dp[R].cost + output_rows * (1 if connected else 10)`,
//! with `output_rows = max(1, |L| * |R| * equi_join_selectivity)` for
//! connected joins and `max(1, |L| * |R|)` for cross joins. Ties keep the
//! first-enumerated candidate; partitions are enumerated in decreasing
//! left-submask order, so the first candidate is the left-deep split with the
//! lowest-indexed relation alone on the right.
//!
//! Join graphs larger than the configured DP limit, and the (normally
//! unreachable) case of an unpopulated full-set cell, fall back to a greedy
//! left-to-right join in source order.

use crate::ast::JoinType;
use crate::config::OptimizerConfig;
use crate::cost::{CostEstimator, JoinAlgorithm};
use crate::error::OptimizerError;
use crate::plan::{PlanKind, PlanNode};
use crate::predicate;
use std::collections::BTreeMap;
use tracing::debug;

/// DP metric weight applied to the output rows of a connected join.
const CONNECTED_OUTPUT_WEIGHT: f64 = 1.0;
/// DP metric weight applied to the output rows of a cross join.
const CROSS_OUTPUT_WEIGHT: f64 = 10.0;

/// Join predicates keyed by the unordered pair of base-relation indices they
/// connect.
pub type JoinPredicateMap = BTreeMap<(usize, usize), Vec<String>>;

/// The chosen join tree and its search-metric cost.
#[derive(Debug, Clone)]
pub struct JoinSearchResult {
    pub plan: PlanNode,
    /// Accumulated search metric (scan costs plus weighted output rows), not
    /// the plan's `estimated_cost`.
    pub cost: f64,
}

#[derive(Debug, Clone)]
struct DpEntry {
    plan: PlanNode,
    cost: f64,
}

/// Cost-guided join-order enumerator.
pub struct JoinOrderSearch<'a> {
    estimator: CostEstimator,
    config: &'a OptimizerConfig,
}

impl<'a> JoinOrderSearch<'a> {
    pub fn new(config: &'a OptimizerConfig) -> Self {
        Self {
            estimator: CostEstimator::new(),
            config,
        }
    }

    /// Enumerate join orders over `base_scans` (the lowest-cost scan per
    /// relation, in source order) connected by `join_preds`.
    pub fn search(
        &self,
        base_scans: &[PlanNode],
        join_preds: &JoinPredicateMap,
    ) -> Result<JoinSearchResult, OptimizerError> {
        let n = base_scans.len();
        if n == 0 {
            return Err(OptimizerError::Fault(
                "join-order search invoked with no base relations".to_string(),
            ));
        }
        if n == 1 {
            return Ok(JoinSearchResult {
                plan: base_scans[0].clone(),
                cost: base_scans[0].estimated_cost,
            });
        }
        if n > self.config.max_dp_relations {
            debug!(
                relations = n,
                limit = self.config.max_dp_relations,
                "join graph exceeds DP limit, using greedy ordering"
            );
            return self.greedy(base_scans, join_preds);
        }
        debug_assert!(join_preds.keys().all(|&(a, b)| a < b && b < n));

        let full = 1usize << n;
        let mut dp: Vec<Option<DpEntry>> = vec![None; full];
        for (i, scan) in base_scans.iter().enumerate() {
            dp[1 << i] = Some(DpEntry {
                plan: scan.clone(),
                cost: scan.estimated_cost,
            });
        }

        for mask in 1..full {
            if mask.count_ones() < 2 {
                continue;
            }
            let mut best: Option<DpEntry> = None;
            let mut left = (mask - 1) & mask;
            while left != 0 {
                let right = mask ^ left;
                if let (Some(l), Some(r)) = (&dp[left], &dp[right]) {
                    let mut connecting = Vec::new();
                    for (&(a, b), conds) in join_preds {
                        if mask & (1 << a) != 0 && mask & (1 << b) != 0 {
                            let a_in_left = left & (1 << a) != 0;
                            let b_in_left = left & (1 << b) != 0;
                            if a_in_left != b_in_left {
                                connecting.extend(conds.iter().cloned());
                            }
                        }
                    }
                    let has_pred = !connecting.is_empty();
                    let weight = if has_pred {
                        CONNECTED_OUTPUT_WEIGHT
                    } else {
                        CROSS_OUTPUT_WEIGHT
                    };
                    let cand = make_join_node(
                        &self.estimator,
                        self.config,
                        JoinType::Inner,
                        connecting,
                        l.plan.clone(),
                        r.plan.clone(),
                    );
                    let cand_cost = l.cost + r.cost + cand.estimated_cardinality * weight;
                    let better = match &best {
                        None => true,
                        Some(b) => cand_cost < b.cost,
                    };
                    if better {
                        best = Some(DpEntry {
                            plan: cand,
                            cost: cand_cost,
                        });
                    }
                }
                left = (left - 1) & mask;
            }
            dp[mask] = best;
        }

        match dp[full - 1].take() {
            Some(entry) => Ok(JoinSearchResult {
                plan: entry.plan,
                cost: entry.cost,
            }),
            None => self.greedy(base_scans, join_preds),
        }
    }

    /// Left-to-right greedy join in source order, using the same search
    /// metric as the DP. This is both the fallback and the reference cost of
    /// one particular left-deep order.
    pub fn greedy(
        &self,
        base_scans: &[PlanNode],
        join_preds: &JoinPredicateMap,
    ) -> Result<JoinSearchResult, OptimizerError> {
        let n = base_scans.len();
        if n == 0 {
            return Err(OptimizerError::Fault(
                "join-order search invoked with no base relations".to_string(),
            ));
        }
        let mut plan = base_scans[0].clone();
        let mut cost = plan.estimated_cost;
        for (i, scan) in base_scans.iter().enumerate().skip(1) {
            let mut connecting = Vec::new();
            for (&(a, b), conds) in join_preds {
                if (b == i && a < i) || (a == i && b < i) {
                    connecting.extend(conds.iter().cloned());
                }
            }
            let has_pred = !connecting.is_empty();
            let weight = if has_pred {
                CONNECTED_OUTPUT_WEIGHT
            } else {
                CROSS_OUTPUT_WEIGHT
            };
            let cand = make_join_node(
                &self.estimator,
                self.config,
                JoinType::Inner,
                connecting,
                plan,
                scan.clone(),
            );
            cost += scan.estimated_cost + cand.estimated_cardinality * weight;
            plan = cand;
        }
        Ok(JoinSearchResult { plan, cost })
    }
}

/// Build a join node over two subtrees, estimating cardinality, picking the
/// cheaper join algorithm, and applying the cross-join penalty when no real
/// predicate connects the sides.
pub(crate) fn make_join_node(
    estimator: &CostEstimator,
    config: &OptimizerConfig,
    join_type: JoinType,
    conditions: Vec<String>,
    left: PlanNode,
    right: PlanNode,
) -> PlanNode {
    let left_rows = left.estimated_cardinality;
    let right_rows = right.estimated_cardinality;
    let has_pred = conditions.iter().any(|c| !predicate::is_trivially_true(c));

    let cardinality = if has_pred {
        (left_rows * right_rows * config.equi_join_selectivity).max(1.0)
    } else {
        (left_rows * right_rows).max(1.0)
    };

    let algorithm = if has_pred {
        let hash = estimator.join(JoinAlgorithm::Hash, left_rows, right_rows);
        let nested = estimator.join(JoinAlgorithm::NestedLoop, left_rows, right_rows);
        if nested.total() < hash.total() {
            JoinAlgorithm::NestedLoop
        } else {
            JoinAlgorithm::Hash
        }
    } else {
        JoinAlgorithm::NestedLoop
    };
    let local = estimator.join(algorithm, left_rows, right_rows);

    let mut cost = left.estimated_cost + right.estimated_cost + local.total();
    if !has_pred {
        cost *= config.cross_join_penalty;
    }

    let mut output_columns = left.output_columns.clone();
    output_columns.extend(right.output_columns.iter().cloned());

    PlanNode {
        kind: PlanKind::Join {
            join_type,
            algorithm,
            conditions,
            left: Box::new(left),
            right: Box::new(right),
        },
        estimated_cost: cost,
        estimated_cardinality: cardinality,
        output_columns,
    }
}
