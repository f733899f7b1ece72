//! Configuration knobs for the optimizer.
//!
//! These are deliberately few: limits that keep the join search tractable and
//! the estimation constants a deployment might want to tune.

use serde::{Deserialize, Serialize};

/// Tunable optimizer parameters with sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Maximum number of base relations enumerated by the DP join search.
    /// Larger join graphs fall back to greedy left-to-right ordering.
    pub max_dp_relations: usize,
    /// Multiplier applied to the cost of a join with no connecting predicate,
    /// so any connected alternative is preferred.
    pub cross_join_penalty: f64,
    /// Output selectivity assumed for an equi-join predicate.
    pub equi_join_selectivity: f64,
    /// Row count assumed for tables missing from the statistics catalog.
    pub default_row_count: u64,
    /// Rows per page assumed when synthesizing statistics for unknown tables.
    pub rows_per_page: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_dp_relations: 12,
            cross_join_penalty: 1000.0,
            equi_join_selectivity: 0.01,
            default_row_count: 100_000,
            rows_per_page: 100,
        }
    }
}
