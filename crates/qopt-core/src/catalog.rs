//! # Statistics Catalog
//!
//! The catalog provides the optimizer with table-level metadata: row and page
//! counts, per-column statistics (distinct counts, min/max, equality
//! selectivity, frequency histograms), and available single-column indexes.
//! Statistics are loaded once at session initialization by an external loader
//! and are read-only for the lifetime of the catalog; a single catalog may be
//! shared by reference across concurrent optimizations of different queries.
//!
//! ## Lookups
//!
//! Backends differ in identifier case handling, so table and column resolution
//! is case-insensitive: an exact match is tried first, then a lowercase
//! comparison. Tables are stored in a `BTreeMap` so that every iteration order
//! is deterministic.
//!
//! ## Selectivity Estimation
//!
//! - **Equality** `col = v`: the histogram frequency when `v` is a histogram
//!   entry; otherwise `1/distinct_values`, capped at the column's recorded
//!   equality selectivity.
//! - **Range** (`<`, `>`, `<=`, `>=`): 0.30.
//! - **`LIKE`**: 0.10.
//! - **Inequality** (`<>`): 0.90.
//! - Unknown column or missing statistics: 0.10.

use crate::predicate::{self, CompareOp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum number of (value, frequency) histogram entries kept per column.
pub const HISTOGRAM_BUCKETS: usize = 10;

/// Fallback selectivity when nothing is known about a predicate.
pub const DEFAULT_SELECTIVITY: f64 = 0.1;
/// Selectivity assumed for range comparisons.
pub const RANGE_SELECTIVITY: f64 = 0.3;
/// Selectivity assumed for LIKE patterns.
pub const LIKE_SELECTIVITY: f64 = 0.1;
/// Selectivity assumed for inequality comparisons.
pub const NOT_EQUAL_SELECTIVITY: f64 = 0.9;

/// Per-column statistics used for selectivity estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub name: String,
    pub distinct_values: u64,
    pub min_value: String,
    pub max_value: String,
    /// Expected fraction of rows matched by an equality predicate on this
    /// column, in [0, 1].
    pub selectivity: f64,
    /// Most frequent values with their row frequency in [0, 1], sorted by
    /// descending frequency, at most [`HISTOGRAM_BUCKETS`] entries.
    pub histogram: Vec<(String, f64)>,
}

impl Default for ColumnStats {
    fn default() -> Self {
        Self {
            name: String::new(),
            distinct_values: 0,
            min_value: String::new(),
            max_value: String::new(),
            selectivity: DEFAULT_SELECTIVITY,
            histogram: Vec::new(),
        }
    }
}

impl ColumnStats {
    pub fn new(name: impl Into<String>, distinct_values: u64) -> Self {
        let selectivity = if distinct_values > 0 {
            (1.0 / distinct_values as f64).min(1.0)
        } else {
            DEFAULT_SELECTIVITY
        };
        Self {
            name: name.into(),
            distinct_values,
            selectivity,
            ..Default::default()
        }
    }

    /// Selectivity of `self op value` under the rules in the module docs.
    pub fn operator_selectivity(&self, op: CompareOp, value: &str) -> f64 {
        match op {
            CompareOp::Eq => {
                let literal = value.trim_matches('\'');
                if let Some((_, freq)) = self.histogram.iter().find(|(v, _)| v == literal) {
                    return *freq;
                }
                if self.distinct_values == 0 {
                    return DEFAULT_SELECTIVITY;
                }
                let uniform = 1.0 / self.distinct_values as f64;
                if self.selectivity > 0.0 {
                    uniform.min(self.selectivity)
                } else {
                    uniform
                }
            }
            CompareOp::Lt | CompareOp::LtEq | CompareOp::Gt | CompareOp::GtEq => RANGE_SELECTIVITY,
            CompareOp::Like => LIKE_SELECTIVITY,
            CompareOp::NotEq => NOT_EQUAL_SELECTIVITY,
        }
    }
}

/// A single-column (or composite) B-tree-like index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub index_name: String,
    pub columns: Vec<String>,
    pub is_unique: bool,
    pub cardinality: u64,
}

/// Statistics for one base table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableStatistics {
    pub table_name: String,
    pub row_count: u64,
    pub page_count: u64,
    pub column_stats: BTreeMap<String, ColumnStats>,
    pub available_indexes: Vec<IndexInfo>,
}

impl TableStatistics {
    /// Case-insensitive column lookup: exact match first, lowercase fallback.
    pub fn column_ci(&self, name: &str) -> Option<&ColumnStats> {
        if let Some(cs) = self.column_stats.get(name) {
            return Some(cs);
        }
        let target = name.to_lowercase();
        self.column_stats
            .iter()
            .find(|(k, _)| k.to_lowercase() == target)
            .map(|(_, v)| v)
    }

    pub fn has_column_ci(&self, name: &str) -> bool {
        self.column_ci(name).is_some()
    }

    /// Selectivity of a single predicate text against this table. The column
    /// qualifier, if any, is assumed to refer to this table (the caller pushed
    /// the predicate here). Unrecognized predicate shapes get the default.
    pub fn condition_selectivity(&self, cond: &str) -> f64 {
        if predicate::is_trivially_true(cond) {
            return 1.0;
        }
        if predicate::is_trivially_false(cond) {
            return 0.0;
        }
        let Some(cmp) = predicate::parse_comparison(cond) else {
            return DEFAULT_SELECTIVITY;
        };
        let column = match cmp.column.split_once('.') {
            Some((_, col)) => col,
            None => cmp.column.as_str(),
        };
        match self.column_ci(column) {
            Some(cs) => cs.operator_selectivity(cmp.op, &cmp.value),
            None => DEFAULT_SELECTIVITY,
        }
    }
}

/// The process-wide statistics catalog: table name → statistics.
///
/// Built once by the statistics loader and passed by reference into the
/// optimizer; never mutated during optimization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsCatalog {
    pub tables: BTreeMap<String, TableStatistics>,
}

impl StatsCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_table_stats(&mut self, stats: TableStatistics) {
        self.tables.insert(stats.table_name.clone(), stats);
    }

    /// Exact-name lookup.
    pub fn get_table_stats(&self, table_name: &str) -> Option<&TableStatistics> {
        self.tables.get(table_name)
    }

    /// Case-insensitive lookup: exact match first, then lowercase comparison.
    pub fn get_table_stats_ci(&self, table_name: &str) -> Option<&TableStatistics> {
        if let Some(ts) = self.tables.get(table_name) {
            return Some(ts);
        }
        let target = table_name.to_lowercase();
        self.tables
            .iter()
            .find(|(k, _)| k.to_lowercase() == target)
            .map(|(_, v)| v)
    }

    /// Resolve a table name to its catalog spelling; unknown names are
    /// returned unchanged.
    pub fn resolve_table_name_ci(&self, table_name: &str) -> String {
        if self.tables.contains_key(table_name) {
            return table_name.to_string();
        }
        let target = table_name.to_lowercase();
        self.tables
            .keys()
            .find(|k| k.to_lowercase() == target)
            .cloned()
            .unwrap_or_else(|| table_name.to_string())
    }

    /// Selectivity of `table.column op value`.
    pub fn estimate_selectivity(
        &self,
        table_name: &str,
        column: &str,
        op: CompareOp,
        value: &str,
    ) -> f64 {
        let Some(ts) = self.get_table_stats_ci(table_name) else {
            return DEFAULT_SELECTIVITY;
        };
        match ts.column_ci(column) {
            Some(cs) => cs.operator_selectivity(op, value),
            None => DEFAULT_SELECTIVITY,
        }
    }

    /// Selectivity of an arbitrary predicate text, resolving the column's
    /// qualifier through `alias_map` (lowercase alias → table name). An
    /// unqualified column is attributed to the unique in-scope table carrying
    /// it, when there is exactly one.
    pub fn estimate_condition_selectivity(
        &self,
        cond: &str,
        alias_map: &BTreeMap<String, String>,
    ) -> f64 {
        if predicate::is_trivially_true(cond) {
            return 1.0;
        }
        if predicate::is_trivially_false(cond) {
            return 0.0;
        }
        let Some(cmp) = predicate::parse_comparison(cond) else {
            return DEFAULT_SELECTIVITY;
        };
        let (table, column) = match cmp.column.split_once('.') {
            Some((qual, col)) => match alias_map.get(&qual.to_lowercase()) {
                Some(table) => (table.clone(), col.to_string()),
                None => return DEFAULT_SELECTIVITY,
            },
            None => {
                let mut owners = alias_map
                    .values()
                    .filter(|t| {
                        self.get_table_stats_ci(t)
                            .map(|ts| ts.has_column_ci(&cmp.column))
                            .unwrap_or(false)
                    })
                    .collect::<Vec<_>>();
                owners.dedup();
                match owners.as_slice() {
                    [t] => ((*t).clone(), cmp.column.clone()),
                    _ => return DEFAULT_SELECTIVITY,
                }
            }
        };
        self.estimate_selectivity(&table, &column, cmp.op, &cmp.value)
    }

    /// Estimated row count of a table scan at the given selectivity. Zero for
    /// unknown tables; callers substitute default statistics themselves.
    pub fn estimate_row_count(&self, table_name: &str, selectivity: f64) -> u64 {
        match self.get_table_stats_ci(table_name) {
            Some(ts) => (ts.row_count as f64 * selectivity) as u64,
            None => 0,
        }
    }

    /// Build a frequency histogram from sampled values, keeping the top
    /// [`HISTOGRAM_BUCKETS`] values by descending frequency.
    pub fn build_histogram(col_stats: &mut ColumnStats, values: &[String]) {
        if values.is_empty() {
            return;
        }
        let mut freq: BTreeMap<&str, usize> = BTreeMap::new();
        for v in values {
            *freq.entry(v.as_str()).or_default() += 1;
        }
        let total = values.len() as f64;
        let mut histogram: Vec<(String, f64)> = freq
            .into_iter()
            .map(|(v, n)| (v.to_string(), n as f64 / total))
            .collect();
        // Descending by frequency; the BTreeMap source makes equal-frequency
        // ordering deterministic (ascending by value).
        histogram.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        histogram.truncate(HISTOGRAM_BUCKETS);
        col_stats.histogram = histogram;
    }

    /// Install the built-in demonstration tables. Used by the examples and the
    /// test suite in place of a live statistics loader.
    pub fn load_defaults(&mut self) {
        self.update_table_stats(demo_table(
            "users",
            100_000,
            &[("id", 100_000), ("age", 100), ("name", 95_000)],
            &[("users_pkey", "id", true)],
        ));
        self.update_table_stats(demo_table(
            "orders",
            500_000,
            &[
                ("id", 500_000),
                ("user_id", 100_000),
                ("product_id", 20_000),
                ("status", 10),
            ],
            &[
                ("orders_pkey", "id", true),
                ("orders_user_id_idx", "user_id", false),
            ],
        ));
        self.update_table_stats(demo_table(
            "products",
            20_000,
            &[("id", 20_000), ("name", 19_500)],
            &[("products_pkey", "id", true)],
        ));
        self.update_table_stats(demo_table(
            "employee",
            10_000,
            &[("emp_id", 10_000), ("emp_name", 5_000), ("manager_id", 1_000)],
            &[("employee_pkey", "emp_id", true)],
        ));
    }
}

/// Rows per page assumed when a loader has no physical size information.
const ROWS_PER_PAGE: u64 = 100;

fn demo_table(
    name: &str,
    row_count: u64,
    columns: &[(&str, u64)],
    indexes: &[(&str, &str, bool)],
) -> TableStatistics {
    let mut column_stats = BTreeMap::new();
    for (col, distinct) in columns {
        column_stats.insert(col.to_string(), ColumnStats::new(*col, *distinct));
    }
    let available_indexes = indexes
        .iter()
        .map(|(idx_name, col, unique)| IndexInfo {
            index_name: idx_name.to_string(),
            columns: vec![col.to_string()],
            is_unique: *unique,
            cardinality: column_stats.get(*col).map(|c| c.distinct_values).unwrap_or(0),
        })
        .collect();
    TableStatistics {
        table_name: name.to_string(),
        row_count,
        page_count: row_count.div_ceil(ROWS_PER_PAGE),
        column_stats,
        available_indexes,
    }
}
