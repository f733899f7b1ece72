//! # Optimizer Entry Point
//!
//! Ties the pieces together into the single-threaded, synchronous pipeline:
//! semantic validation, rewrite rules in registry order, SQL re-emission, plan
//! generation, and best-plan selection. The input query is cloned on entry and
//! the caller's copy is never touched; the catalog is only read.
//!
//! For identical inputs the produced `(plan, trace, rewritten_sql)` triple is
//! byte-identical across runs: every internal container iterated during
//! planning is keyed and ordered deterministically.

use crate::ast::SelectQuery;
use crate::catalog::StatsCatalog;
use crate::config::OptimizerConfig;
use crate::error::{OptimizeFailure, OptimizerError};
use crate::generator::PlanGenerator;
use crate::plan::PlanNode;
use crate::rewrite::{RewriteContext, RewriteRegistry, Trace};
use crate::semantics;
use crate::sql::select_query_to_sql;
use std::sync::Arc;
use tracing::{debug, warn};

/// A successful optimization.
#[derive(Debug, Clone)]
pub struct OptimizeResult {
    /// The chosen plan tree, owned by this result.
    pub plan: PlanNode,
    /// The rewritten query, serialized for execution on an unmodified backend.
    pub rewritten_sql: String,
    /// Numbered, human-readable record of the transformations applied.
    pub trace: Trace,
    /// Non-fatal problems encountered during validation.
    pub warnings: Vec<String>,
}

/// The rule- and cost-based optimizer.
///
/// Holds the shared read-only statistics catalog and the ordered rewrite rule
/// registry. One `Optimizer` may serve many queries; each call to
/// [`Optimizer::optimize`] is independent.
pub struct Optimizer {
    catalog: Arc<StatsCatalog>,
    registry: Arc<RewriteRegistry>,
    config: OptimizerConfig,
}

impl Optimizer {
    pub fn new(catalog: Arc<StatsCatalog>, registry: Arc<RewriteRegistry>) -> Self {
        Self::with_config(catalog, registry, OptimizerConfig::default())
    }

    pub fn with_config(
        catalog: Arc<StatsCatalog>,
        registry: Arc<RewriteRegistry>,
        config: OptimizerConfig,
    ) -> Self {
        Self {
            catalog,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Optimize one query. On a fatal error the failure carries the trace
    /// collected so far and the original SQL text; no partial plan is ever
    /// returned.
    pub fn optimize(&self, query: &SelectQuery) -> Result<OptimizeResult, OptimizeFailure> {
        let original_sql = select_query_to_sql(query);
        let mut trace = Trace::new();

        let warnings = match semantics::validate(query, &self.catalog) {
            Ok(warnings) => warnings,
            Err(err) => {
                return Err(OptimizeFailure {
                    error: err.into(),
                    trace,
                    original_sql,
                })
            }
        };
        for warning in &warnings {
            warn!("{warning}");
            trace.push("semantic_check", warning.clone());
        }

        let mut rewritten = query.clone();
        let ctx = RewriteContext {
            catalog: &self.catalog,
            config: &self.config,
        };
        self.registry.run(&mut rewritten, &ctx, &mut trace);
        let rewritten_sql = select_query_to_sql(&rewritten);
        debug!(%rewritten_sql, "rewrite finished");

        let generator = PlanGenerator::new(&self.catalog, &self.config);
        let plans = match generator.generate_plans(&rewritten) {
            Ok(plans) => plans,
            Err(err) => {
                return Err(OptimizeFailure {
                    error: err,
                    trace,
                    original_sql,
                })
            }
        };
        trace.push(
            "plan_generation",
            format!("generated {} candidate execution plans", plans.len()),
        );

        let plan = match PlanGenerator::best_plan(plans) {
            Some(plan) => plan,
            None => {
                return Err(OptimizeFailure {
                    error: OptimizerError::Fault(
                        "plan generation produced no candidates".to_string(),
                    ),
                    trace,
                    original_sql,
                })
            }
        };
        trace.push(
            "plan_selection",
            format!(
                "selected plan with estimated cost {:.2} and cardinality {}",
                plan.estimated_cost,
                plan.estimated_cardinality.round() as u64
            ),
        );

        Ok(OptimizeResult {
            plan,
            rewritten_sql,
            trace,
            warnings,
        })
    }
}
