//! # Cost Model
//!
//! Per-operator cost formulas over the statistics catalog. Costs are split
//! into I/O, CPU, memory, and network components; the total is their sum and
//! costs are additive up the plan tree (a node's cost is its local cost plus
//! the accumulated costs of its children).
//!
//! The constants below are deliberately unitless and tunable; their ratios are
//! what matters (a random page read is four sequential reads, an index probe
//! two sequential reads, and so on). Network cost is always zero here -- the
//! optimizer plans for a single-node backend -- but the component is kept so
//! the accounting matches distributed cost models.

use crate::catalog::TableStatistics;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

/// Cost of reading one page sequentially.
pub const SEQ_PAGE_COST: f64 = 1.0;
/// Cost of reading one page at a random offset.
pub const RAND_PAGE_COST: f64 = 4.0;
/// Cost of processing one tuple.
pub const CPU_TUPLE_COST: f64 = 0.01;
/// Cost of one index probe.
pub const INDEX_LOOKUP_COST: f64 = 2.0;
/// Per-tuple sort cost (reserved for alternative sort costing).
pub const SORT_COST_PER_TUPLE: f64 = 0.1;

/// Tuples assumed to fit in one external-sort page.
const SORT_PAGE_TUPLES: f64 = 1000.0;

/// A cost broken down by resource dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostComponents {
    pub io: f64,
    pub cpu: f64,
    pub memory: f64,
    pub network: f64,
}

impl CostComponents {
    pub fn total(&self) -> f64 {
        self.io + self.cpu + self.memory + self.network
    }
}

impl Add for CostComponents {
    type Output = CostComponents;

    fn add(self, rhs: CostComponents) -> CostComponents {
        CostComponents {
            io: self.io + rhs.io,
            cpu: self.cpu + rhs.cpu,
            memory: self.memory + rhs.memory,
            network: self.network + rhs.network,
        }
    }
}

impl AddAssign for CostComponents {
    fn add_assign(&mut self, rhs: CostComponents) {
        *self = *self + rhs;
    }
}

/// Physical join algorithms the cost model can score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinAlgorithm {
    /// For every outer row, scan all inner rows. Works for any condition.
    NestedLoop,
    /// Build a hash table on one side, probe with the other. Equi-joins only.
    Hash,
    /// Merge two sorted streams. Assumes both inputs arrive sorted.
    Merge,
}

impl JoinAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinAlgorithm::NestedLoop => "NESTED_LOOP",
            JoinAlgorithm::Hash => "HASH",
            JoinAlgorithm::Merge => "MERGE",
        }
    }
}

impl fmt::Display for JoinAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stateless estimator applying the operator formulas. Statistics are passed
/// in per call so the estimator works identically for cataloged tables and
/// for the synthesized defaults used when a table is unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostEstimator;

impl CostEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Sequential scan reading `page_count * selectivity` pages (at least one)
    /// and processing the matching fraction of tuples.
    pub fn table_scan(&self, stats: &TableStatistics, selectivity: f64) -> CostComponents {
        let pages = (stats.page_count as f64 * selectivity).ceil().max(1.0);
        let tuples = stats.row_count as f64 * selectivity;
        CostComponents {
            io: pages * SEQ_PAGE_COST,
            cpu: tuples * CPU_TUPLE_COST,
            ..Default::default()
        }
    }

    /// Index probe followed by random access to the matching data pages.
    pub fn index_scan(&self, stats: &TableStatistics, selectivity: f64) -> CostComponents {
        let data_pages = (stats.page_count as f64 * selectivity).ceil().max(1.0);
        let tuples = stats.row_count as f64 * selectivity;
        CostComponents {
            io: INDEX_LOOKUP_COST + data_pages * RAND_PAGE_COST,
            cpu: tuples * CPU_TUPLE_COST,
            ..Default::default()
        }
    }

    /// Join cost for the given algorithm and input cardinalities.
    pub fn join(&self, algorithm: JoinAlgorithm, left_rows: f64, right_rows: f64) -> CostComponents {
        match algorithm {
            JoinAlgorithm::NestedLoop => CostComponents {
                cpu: left_rows * right_rows * CPU_TUPLE_COST,
                io: (left_rows + right_rows) * SEQ_PAGE_COST,
                ..Default::default()
            },
            JoinAlgorithm::Hash => CostComponents {
                cpu: 2.0 * (left_rows + right_rows) * CPU_TUPLE_COST,
                memory: left_rows.max(right_rows) * 0.1,
                io: (left_rows + right_rows) * SEQ_PAGE_COST,
                ..Default::default()
            },
            JoinAlgorithm::Merge => CostComponents {
                cpu: (left_rows + right_rows) * CPU_TUPLE_COST,
                io: (left_rows + right_rows) * SEQ_PAGE_COST,
                ..Default::default()
            },
        }
    }

    /// External multi-pass sort over `num_tuples` rows with `key_columns` sort
    /// keys.
    pub fn sort(&self, num_tuples: f64, key_columns: usize) -> CostComponents {
        if num_tuples < 2.0 {
            return CostComponents {
                cpu: num_tuples * CPU_TUPLE_COST,
                ..Default::default()
            };
        }
        let passes = (num_tuples.log2() / SORT_PAGE_TUPLES.log2()).max(0.0);
        CostComponents {
            io: num_tuples * passes * RAND_PAGE_COST,
            cpu: num_tuples * num_tuples.log2() * key_columns as f64 * CPU_TUPLE_COST,
            ..Default::default()
        }
    }

    /// Hash aggregation over `input_rows` grouped by `group_by_cols` columns.
    pub fn aggregation(&self, input_rows: f64, group_by_cols: usize) -> CostComponents {
        CostComponents {
            cpu: input_rows * group_by_cols as f64 * CPU_TUPLE_COST,
            memory: input_rows * 0.1,
            ..Default::default()
        }
    }

    /// Predicate evaluation over `input_rows`, passing the given fraction.
    pub fn filter(&self, input_rows: f64, selectivity: f64) -> CostComponents {
        CostComponents {
            cpu: input_rows * CPU_TUPLE_COST,
            io: input_rows * selectivity * 0.1 * SEQ_PAGE_COST,
            ..Default::default()
        }
    }
}
