//! # Plan Generation
//!
//! Builds physical plan candidates for a rewritten query and selects the
//! cheapest one.
//!
//! For every base relation, [`PlanGenerator::generate_scan_plans`] emits one
//! sequential scan plus one index scan per indexed column. Scan cardinality is
//! `row_count * product(selectivity of pushed filters)`. Sequential scan cost
//! is computed at selectivity 1.0 (a full scan touches every page regardless
//! of filtering); an index scan is costed with the combined selectivity of the
//! pushed filters constraining its column, so it only wins when a selective
//! predicate actually uses the index.
//!
//! Single-relation queries build one pipeline per scan alternative, bottom-up:
//! scan, optional filter, optional aggregate, optional sort, optional limit,
//! and a final project. Multi-relation queries first run the join-order search
//! over the inner-join cluster (the maximal prefix of INNER joins), wrap the
//! remaining joins around the result in source order (outer joins never move),
//! and then apply the same operator pipeline.
//!
//! Best-plan selection: minimum estimated cost, then minimum cardinality,
//! then insertion order.

use crate::ast::{JoinType, SelectQuery, TableRef};
use crate::catalog::{StatsCatalog, TableStatistics};
use crate::config::OptimizerConfig;
use crate::cost::{CostEstimator, CPU_TUPLE_COST};
use crate::error::OptimizerError;
use crate::plan::{PlanKind, PlanNode};
use crate::predicate;
use crate::search::{make_join_node, JoinOrderSearch, JoinPredicateMap};
use ordered_float::OrderedFloat;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Generates and ranks physical plan candidates.
pub struct PlanGenerator<'a> {
    catalog: &'a StatsCatalog,
    config: &'a OptimizerConfig,
    estimator: CostEstimator,
}

impl<'a> PlanGenerator<'a> {
    pub fn new(catalog: &'a StatsCatalog, config: &'a OptimizerConfig) -> Self {
        Self {
            catalog,
            config,
            estimator: CostEstimator::new(),
        }
    }

    /// All candidate plans for the query. Single-relation queries yield one
    /// pipeline per scan alternative; multi-relation queries yield the
    /// pipeline over the join tree chosen by the search.
    pub fn generate_plans(&self, query: &SelectQuery) -> Result<Vec<PlanNode>, OptimizerError> {
        let alias_map = self.alias_map(query);
        if query.joins.is_empty() {
            let scans = self.generate_scan_plans(&query.from_table, &query.scan_projections);
            let plans = scans
                .into_iter()
                .map(|scan| self.apply_pipeline(query, &alias_map, scan, query.where_conditions.clone()))
                .collect();
            Ok(plans)
        } else {
            Ok(vec![self.generate_join_plan(query, &alias_map)?])
        }
    }

    /// Pick the winner: minimum cost, ties broken by smaller cardinality,
    /// further ties by insertion order.
    pub fn best_plan(plans: Vec<PlanNode>) -> Option<PlanNode> {
        plans.into_iter().min_by_key(|p| {
            (
                OrderedFloat(p.estimated_cost),
                OrderedFloat(p.estimated_cardinality),
            )
        })
    }

    /// One sequential scan plus one index scan per indexed column.
    pub fn generate_scan_plans(
        &self,
        table: &TableRef,
        projections: &BTreeMap<String, Vec<String>>,
    ) -> Vec<PlanNode> {
        let stats = self.stats_for(&table.name);
        let alias = table.effective_alias().to_string();
        let output_columns = projections.get(&alias).cloned().unwrap_or_default();

        let filter_sel: f64 = table
            .pushed_filters
            .iter()
            .map(|c| stats.condition_selectivity(c))
            .product();
        let cardinality = (stats.row_count as f64 * filter_sel).max(1.0);

        let mut plans = vec![PlanNode {
            kind: PlanKind::Scan {
                table: table.name.clone(),
                alias: alias.clone(),
                filters: table.pushed_filters.clone(),
            },
            estimated_cost: self.estimator.table_scan(&stats, 1.0).total(),
            estimated_cardinality: cardinality,
            output_columns: output_columns.clone(),
        }];

        for index in &stats.available_indexes {
            for column in &index.columns {
                // Selectivity the index can exploit: pushed filters that
                // constrain the indexed column. Without one, the index scan
                // reads everything through random I/O and can never win.
                let constraining: Vec<&String> = table
                    .pushed_filters
                    .iter()
                    .filter(|c| filter_constrains(c, column))
                    .collect();
                let index_sel: f64 = if constraining.is_empty() {
                    1.0
                } else {
                    constraining
                        .iter()
                        .map(|c| stats.condition_selectivity(c))
                        .product()
                };
                plans.push(PlanNode {
                    kind: PlanKind::IndexScan {
                        table: table.name.clone(),
                        alias: alias.clone(),
                        index_name: index.index_name.clone(),
                        index_column: column.clone(),
                        filters: table.pushed_filters.clone(),
                    },
                    estimated_cost: self.estimator.index_scan(&stats, index_sel).total(),
                    estimated_cardinality: cardinality,
                    output_columns: output_columns.clone(),
                });
            }
        }

        plans
    }

    // -----------------------------------------------------------------------
    // Multi-relation planning
    // -----------------------------------------------------------------------

    fn generate_join_plan(
        &self,
        query: &SelectQuery,
        alias_map: &BTreeMap<String, String>,
    ) -> Result<PlanNode, OptimizerError> {
        // The reorderable cluster: the FROM table plus the maximal prefix of
        // INNER joins. Everything from the first non-inner join onward keeps
        // its source position to preserve null-supplying sides.
        let cluster_len = query
            .joins
            .iter()
            .take_while(|j| j.join_type == JoinType::Inner)
            .count();
        let mut cluster_tables: Vec<&TableRef> = vec![&query.from_table];
        cluster_tables.extend(query.joins[..cluster_len].iter().map(|j| &j.table));

        let mut index_of: BTreeMap<String, usize> = BTreeMap::new();
        for (i, t) in cluster_tables.iter().enumerate() {
            index_of.insert(t.effective_alias().to_lowercase(), i);
        }

        // Classify cluster ON conditions: predicates connecting exactly two
        // cluster relations feed the DP; anything else is evaluated in the
        // residual filter above the join tree.
        let mut join_preds = JoinPredicateMap::new();
        let mut residual: Vec<String> = Vec::new();
        for join in &query.joins[..cluster_len] {
            for cond in &join.on_conds {
                if predicate::is_trivially_true(cond) {
                    continue;
                }
                let indices: BTreeSet<usize> = predicate::qualifier_candidates(cond)
                    .iter()
                    .filter_map(|q| index_of.get(&q.to_lowercase()).copied())
                    .collect();
                let mut it = indices.into_iter();
                match (it.next(), it.next(), it.next()) {
                    (Some(a), Some(b), None) => {
                        join_preds.entry((a, b)).or_default().push(cond.clone());
                    }
                    _ => residual.push(cond.clone()),
                }
            }
        }

        let base_scans = cluster_tables
            .iter()
            .map(|t| self.best_scan(t, &query.scan_projections))
            .collect::<Result<Vec<_>, _>>()?;

        let search = JoinOrderSearch::new(self.config);
        let result = search.search(&base_scans, &join_preds)?;
        debug!(
            relations = cluster_tables.len(),
            cost = result.cost,
            "join-order search finished"
        );
        let mut tree = result.plan;

        // Non-reorderable joins wrap the cluster in their fixed source order.
        for join in &query.joins[cluster_len..] {
            let right = self.best_scan(&join.table, &query.scan_projections)?;
            tree = make_join_node(
                &self.estimator,
                self.config,
                join.join_type,
                join.on_conds.clone(),
                tree,
                right,
            );
        }

        let mut filter_conds = residual;
        filter_conds.extend(query.where_conditions.iter().cloned());
        Ok(self.apply_pipeline(query, alias_map, tree, filter_conds))
    }

    fn best_scan(
        &self,
        table: &TableRef,
        projections: &BTreeMap<String, Vec<String>>,
    ) -> Result<PlanNode, OptimizerError> {
        Self::best_plan(self.generate_scan_plans(table, projections)).ok_or_else(|| {
            OptimizerError::Fault(format!(
                "no scan alternatives generated for table '{}'",
                table.name
            ))
        })
    }

    // -----------------------------------------------------------------------
    // Operator pipeline
    // -----------------------------------------------------------------------

    fn apply_pipeline(
        &self,
        query: &SelectQuery,
        alias_map: &BTreeMap<String, String>,
        mut node: PlanNode,
        filter_conds: Vec<String>,
    ) -> PlanNode {
        if !filter_conds.is_empty() {
            node = self.filter_node(alias_map, node, filter_conds);
        }
        let has_aggregate_items = query
            .select_items
            .iter()
            .any(|i| predicate::is_aggregate_expr(&i.expr));
        if !query.group_by.is_empty() || has_aggregate_items {
            node = self.aggregate_node(query, alias_map, node);
        }
        if !query.having_conditions.is_empty() {
            node = self.filter_node(alias_map, node, query.having_conditions.clone());
        }
        if !query.order_by.is_empty() {
            node = self.sort_node(query, node);
        }
        if query.limit >= 0 {
            node = limit_node(query.limit, node);
        }
        project_node(query, node)
    }

    fn filter_node(
        &self,
        alias_map: &BTreeMap<String, String>,
        child: PlanNode,
        conditions: Vec<String>,
    ) -> PlanNode {
        let input = child.estimated_cardinality;
        let selectivity: f64 = conditions
            .iter()
            .map(|c| self.catalog.estimate_condition_selectivity(c, alias_map))
            .product();
        let cost = child.estimated_cost + self.estimator.filter(input, selectivity).total();
        let output_columns = child.output_columns.clone();
        PlanNode {
            kind: PlanKind::Filter {
                conditions,
                child: Box::new(child),
            },
            estimated_cost: cost,
            estimated_cardinality: input * selectivity,
            output_columns,
        }
    }

    fn aggregate_node(
        &self,
        query: &SelectQuery,
        alias_map: &BTreeMap<String, String>,
        child: PlanNode,
    ) -> PlanNode {
        let input = child.estimated_cardinality;
        let cardinality = if query.group_by.is_empty() {
            1.0
        } else {
            // Product of group-key NDVs, capped by the input rows. Unknown
            // columns contribute the input row count (every row its own group
            // in the worst case).
            let mut groups = 1.0_f64;
            for col in &query.group_by {
                groups *= self.group_column_ndv(col, alias_map, input);
            }
            groups.min(input).max(1.0)
        };
        let aggregates: Vec<String> = query
            .select_items
            .iter()
            .filter(|i| predicate::is_aggregate_expr(&i.expr))
            .map(|i| i.expr.clone())
            .collect();
        let cost = child.estimated_cost
            + self
                .estimator
                .aggregation(input, query.group_by.len())
                .total();
        let mut output_columns = query.group_by.clone();
        output_columns.extend(aggregates.iter().cloned());
        PlanNode {
            kind: PlanKind::Aggregate {
                group_by: query.group_by.clone(),
                aggregates,
                child: Box::new(child),
            },
            estimated_cost: cost,
            estimated_cardinality: cardinality,
            output_columns,
        }
    }

    fn group_column_ndv(
        &self,
        col: &str,
        alias_map: &BTreeMap<String, String>,
        input_rows: f64,
    ) -> f64 {
        let (table, column) = match col.split_once('.') {
            Some((qual, c)) => (alias_map.get(&qual.to_lowercase()).cloned(), c),
            None => {
                let owners: Vec<&String> = alias_map
                    .values()
                    .filter(|t| {
                        self.catalog
                            .get_table_stats_ci(t)
                            .map(|ts| ts.has_column_ci(col))
                            .unwrap_or(false)
                    })
                    .collect();
                match owners.as_slice() {
                    [t] => (Some((*t).clone()), col),
                    _ => (None, col),
                }
            }
        };
        table
            .and_then(|t| self.catalog.get_table_stats_ci(&t).cloned())
            .and_then(|ts| ts.column_ci(column).cloned())
            .filter(|cs| cs.distinct_values > 0)
            .map(|cs| cs.distinct_values as f64)
            .unwrap_or(input_rows)
    }

    fn sort_node(&self, query: &SelectQuery, child: PlanNode) -> PlanNode {
        let rows = child.estimated_cardinality;
        let cost = child.estimated_cost
            + self.estimator.sort(rows, query.order_by.len()).total();
        let output_columns = child.output_columns.clone();
        PlanNode {
            kind: PlanKind::Sort {
                keys: query.order_by.clone(),
                child: Box::new(child),
            },
            estimated_cost: cost,
            estimated_cardinality: rows,
            output_columns,
        }
    }

    fn stats_for(&self, name: &str) -> TableStatistics {
        match self.catalog.get_table_stats_ci(name) {
            Some(ts) => ts.clone(),
            None => TableStatistics {
                table_name: name.to_string(),
                row_count: self.config.default_row_count,
                page_count: self
                    .config
                    .default_row_count
                    .div_ceil(self.config.rows_per_page.max(1)),
                ..Default::default()
            },
        }
    }

    fn alias_map(&self, query: &SelectQuery) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        let tables =
            std::iter::once(&query.from_table).chain(query.joins.iter().map(|j| &j.table));
        for t in tables {
            map.insert(
                t.effective_alias().to_lowercase(),
                self.catalog.resolve_table_name_ci(&t.name),
            );
        }
        map
    }
}

/// True when a pushed filter is a comparison on the given column.
fn filter_constrains(cond: &str, column: &str) -> bool {
    match predicate::parse_comparison(cond) {
        Some(cmp) => {
            let col = match cmp.column.split_once('.') {
                Some((_, c)) => c,
                None => cmp.column.as_str(),
            };
            col.eq_ignore_ascii_case(column)
        }
        None => false,
    }
}

fn limit_node(count: i64, child: PlanNode) -> PlanNode {
    let cardinality = child.estimated_cardinality.min(count as f64);
    let cost = child.estimated_cost;
    let output_columns = child.output_columns.clone();
    PlanNode {
        kind: PlanKind::Limit {
            count,
            child: Box::new(child),
        },
        estimated_cost: cost,
        estimated_cardinality: cardinality,
        output_columns,
    }
}

fn project_node(query: &SelectQuery, child: PlanNode) -> PlanNode {
    let items: Vec<String> = if query.select_items.is_empty() {
        vec!["*".to_string()]
    } else {
        query.select_items.iter().map(|i| i.rendered()).collect()
    };
    let rows = child.estimated_cardinality;
    let cost = child.estimated_cost + rows * CPU_TUPLE_COST;
    PlanNode {
        kind: PlanKind::Project {
            items: items.clone(),
            child: Box::new(child),
        },
        estimated_cost: cost,
        estimated_cardinality: rows,
        output_columns: items,
    }
}
