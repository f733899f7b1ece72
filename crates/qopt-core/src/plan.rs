//! # Physical Plan Tree
//!
//! A plan is a strict tree of operator nodes: scans at the leaves, joins with
//! exclusively-owned left/right subtrees, and single-child
//! filter/project/sort/aggregate/limit operators above them. Every node
//! carries its estimated cost (total, including children), estimated output
//! cardinality, and output columns.
//!
//! The operator set is a closed tagged enum and all dispatch is by `match`,
//! keeping exhaustiveness checkable.

use crate::ast::{JoinType, OrderItem};
use crate::cost::JoinAlgorithm;
use serde::{Deserialize, Serialize};

/// One node of the physical plan tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    pub kind: PlanKind,
    /// Total estimated cost of this subtree. Invariant: at least the sum of
    /// the children's estimated costs.
    pub estimated_cost: f64,
    /// Estimated output rows. Invariant: at least 1 for join nodes.
    pub estimated_cardinality: f64,
    /// Columns this node produces; empty means "not narrowed".
    pub output_columns: Vec<String>,
}

/// The operator variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanKind {
    Scan {
        table: String,
        alias: String,
        filters: Vec<String>,
    },
    IndexScan {
        table: String,
        alias: String,
        index_name: String,
        index_column: String,
        filters: Vec<String>,
    },
    Join {
        join_type: JoinType,
        algorithm: JoinAlgorithm,
        conditions: Vec<String>,
        left: Box<PlanNode>,
        right: Box<PlanNode>,
    },
    Filter {
        conditions: Vec<String>,
        child: Box<PlanNode>,
    },
    Project {
        items: Vec<String>,
        child: Box<PlanNode>,
    },
    Sort {
        keys: Vec<OrderItem>,
        child: Box<PlanNode>,
    },
    Aggregate {
        group_by: Vec<String>,
        aggregates: Vec<String>,
        child: Box<PlanNode>,
    },
    Limit {
        count: i64,
        child: Box<PlanNode>,
    },
}

impl PlanNode {
    /// Child nodes in left-to-right order.
    pub fn children(&self) -> Vec<&PlanNode> {
        match &self.kind {
            PlanKind::Scan { .. } | PlanKind::IndexScan { .. } => vec![],
            PlanKind::Join { left, right, .. } => vec![left, right],
            PlanKind::Filter { child, .. }
            | PlanKind::Project { child, .. }
            | PlanKind::Sort { child, .. }
            | PlanKind::Aggregate { child, .. }
            | PlanKind::Limit { child, .. } => vec![child],
        }
    }

    /// Depth-first readable printout, two spaces of indentation per level.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_into(0, &mut out);
        out
    }

    fn explain_into(&self, indent: usize, out: &mut String) {
        let pad = " ".repeat(indent);
        let rows = self.estimated_cardinality.round() as u64;
        let cost = self.estimated_cost;
        match &self.kind {
            PlanKind::Scan {
                table,
                alias,
                filters,
            } => {
                out.push_str(&format!("{pad}Scan(table={table}"));
                if alias != table {
                    out.push_str(&format!(" AS {alias}"));
                }
                out.push_str(&format!(", rows={rows}, cost={cost:.2}"));
                if !filters.is_empty() {
                    out.push_str(&format!(", filters=[{}]", filters.join(", ")));
                }
                out.push_str(")\n");
            }
            PlanKind::IndexScan {
                table,
                alias,
                index_column,
                filters,
                ..
            } => {
                out.push_str(&format!("{pad}IndexScan(table={table}"));
                if alias != table {
                    out.push_str(&format!(" AS {alias}"));
                }
                out.push_str(&format!(
                    ", index=[{index_column}], rows={rows}, cost={cost:.2}"
                ));
                if !filters.is_empty() {
                    out.push_str(&format!(", filters=[{}]", filters.join(", ")));
                }
                out.push_str(")\n");
            }
            PlanKind::Join {
                join_type,
                algorithm,
                conditions,
                left,
                right,
            } => {
                out.push_str(&format!(
                    "{pad}{} Join(algo={algorithm}, rows={rows}, cost={cost:.2}",
                    join_type.sql_token()
                ));
                if !conditions.is_empty() {
                    out.push_str(&format!(", conds=[{}]", conditions.join(", ")));
                }
                out.push_str(")\n");
                left.explain_into(indent + 2, out);
                right.explain_into(indent + 2, out);
            }
            PlanKind::Filter { conditions, child } => {
                out.push_str(&format!(
                    "{pad}Filter(rows={rows}, cost={cost:.2}, conds=[{}])\n",
                    conditions.join(", ")
                ));
                child.explain_into(indent + 2, out);
            }
            PlanKind::Project { items, child } => {
                out.push_str(&format!(
                    "{pad}Project(rows={rows}, cost={cost:.2}, items=[{}])\n",
                    items.join(", ")
                ));
                child.explain_into(indent + 2, out);
            }
            PlanKind::Sort { keys, child } => {
                let keys = keys
                    .iter()
                    .map(|k| format!("{} {}", k.expr, if k.ascending { "ASC" } else { "DESC" }))
                    .collect::<Vec<_>>()
                    .join(", ");
                out.push_str(&format!(
                    "{pad}Sort(rows={rows}, cost={cost:.2}, keys=[{keys}])\n"
                ));
                child.explain_into(indent + 2, out);
            }
            PlanKind::Aggregate {
                group_by, child, ..
            } => {
                out.push_str(&format!(
                    "{pad}Aggregate(group_by=[{}], rows={rows}, cost={cost:.2})\n",
                    group_by.join(", ")
                ));
                child.explain_into(indent + 2, out);
            }
            PlanKind::Limit { count, child } => {
                out.push_str(&format!("{pad}Limit(n={count}, rows={rows}, cost={cost:.2})\n"));
                child.explain_into(indent + 2, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(table: &str, alias: &str, rows: f64, cost: f64) -> PlanNode {
        PlanNode {
            kind: PlanKind::Scan {
                table: table.to_string(),
                alias: alias.to_string(),
                filters: vec![],
            },
            estimated_cost: cost,
            estimated_cardinality: rows,
            output_columns: vec![],
        }
    }

    #[test]
    fn test_explain_indents_children() {
        let join = PlanNode {
            kind: PlanKind::Join {
                join_type: JoinType::Inner,
                algorithm: JoinAlgorithm::Hash,
                conditions: vec!["u.id = o.user_id".to_string()],
                left: Box::new(scan("orders", "o", 50_000.0, 10_000.0)),
                right: Box::new(scan("users", "u", 100_000.0, 2_000.0)),
            },
            estimated_cost: 175_000.0,
            estimated_cardinality: 5e7,
            output_columns: vec![],
        };
        let text = join.explain();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("INNER Join(algo=HASH, rows=50000000, cost=175000.00"));
        assert!(lines[1].starts_with("  Scan(table=orders AS o, rows=50000, cost=10000.00"));
        assert!(lines[2].starts_with("  Scan(table=users AS u, rows=100000, cost=2000.00"));
    }

    #[test]
    fn test_explain_omits_alias_equal_to_table() {
        let text = scan("users", "users", 10.0, 1.0).explain();
        assert!(text.starts_with("Scan(table=users, rows=10, cost=1.00)"));
    }

    #[test]
    fn test_children_accessor() {
        let s = scan("users", "u", 1.0, 1.0);
        assert!(s.children().is_empty());
        let filter = PlanNode {
            kind: PlanKind::Filter {
                conditions: vec!["u.age > 30".to_string()],
                child: Box::new(s),
            },
            estimated_cost: 2.0,
            estimated_cardinality: 1.0,
            output_columns: vec![],
        };
        assert_eq!(filter.children().len(), 1);
    }
}
