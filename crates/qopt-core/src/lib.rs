//! # qopt-core: Rule- and Cost-Based SQL SELECT Optimizer Core
//!
//! This crate implements the core data structures and algorithms for a rule- and
//! cost-based optimizer over a practical subset of SQL `SELECT` queries. Given a
//! parsed query and a catalog of table statistics, it produces an optimized
//! physical plan tree, a human-readable trace of the transformations applied, and
//! an equivalent rewritten SQL string suitable for execution on an unmodified
//! backend.
//!
//! ## Module Overview
//!
//! - **`ast`**: The mutable query representation (`SelectQuery`, `TableRef`,
//!   `JoinClause`) handed over by the parser and rewritten in place.
//! - **`predicate`**: Regex/substring recognition over the opaque predicate texts.
//!   Predicates are never re-parsed into expression trees; the parser owns
//!   expression structure.
//! - **`catalog`**: The statistics catalog -- table/column statistics, indexes,
//!   histograms, and selectivity estimation.
//! - **`cost`**: Per-operator cost formulas (I/O, CPU, memory) built on the
//!   catalog's statistics.
//! - **`plan`**: The physical plan tree (`PlanNode`) with cost/cardinality
//!   annotations and the `explain` printer.
//! - **`semantics`**: Name and alias resolution against the catalog, classifying
//!   problems into warnings (optimization proceeds) and fatal errors.
//! - **`rewrite`**: The `RewriteRule` trait, rule registry, and transformation
//!   trace. The built-in rules live in the `qopt-rules` crate.
//! - **`search`**: Dynamic-programming join-order enumeration guided by the cost
//!   model, with cross-join penalties and a greedy fallback.
//! - **`generator`**: Physical plan generation -- scan alternatives, the
//!   filter/aggregate/sort/limit/project pipeline, and best-plan selection.
//! - **`sql`**: Deterministic AST-to-SQL re-emission of the rewritten query.
//! - **`optimizer`**: The entry point tying validation, rewriting, planning, and
//!   tracing together.

pub mod ast;
pub mod catalog;
pub mod config;
pub mod cost;
pub mod error;
pub mod generator;
pub mod optimizer;
pub mod plan;
pub mod predicate;
pub mod rewrite;
pub mod search;
pub mod semantics;
pub mod sql;
