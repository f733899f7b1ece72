//! # Rewrite Framework
//!
//! Logical query transformations are expressed as [`RewriteRule`]s applied to
//! the `SelectQuery` in a fixed registry order, each fully completing before
//! the next begins. A rule reports a human-readable summary iff it changed the
//! query, and that summary becomes one numbered [`Trace`] entry. The built-in
//! rules live in the `qopt-rules` crate; `qopt-core` only defines the seam.
//!
//! The trace is a human-readable record of what the optimizer did. It is not a
//! stable machine interface.

use crate::ast::SelectQuery;
use crate::catalog::StatsCatalog;
use crate::config::OptimizerConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Context handed to every rule application.
pub struct RewriteContext<'a> {
    pub catalog: &'a StatsCatalog,
    pub config: &'a OptimizerConfig,
}

/// A logical transformation over the parsed query.
///
/// `apply` mutates the query in place and returns a summary of what changed,
/// or `None` when the query was left untouched. Rules must be idempotent:
/// applying a rule twice in a row leaves the query as after the first
/// application.
pub trait RewriteRule: Send + Sync {
    /// Short snake_case tag used in trace entries.
    fn name(&self) -> &str;

    fn apply(&self, query: &mut SelectQuery, ctx: &RewriteContext<'_>) -> Option<String>;
}

/// Ordered collection of rewrite rules. Order is semantic: rules run exactly
/// in registration order.
#[derive(Default)]
pub struct RewriteRegistry {
    rules: Vec<Box<dyn RewriteRule>>,
}

impl RewriteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&mut self, rule: Box<dyn RewriteRule>) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[Box<dyn RewriteRule>] {
        &self.rules
    }

    /// Run every rule once, in order, appending one trace entry per rule that
    /// changed the query.
    pub fn run(&self, query: &mut SelectQuery, ctx: &RewriteContext<'_>, trace: &mut Trace) {
        for rule in &self.rules {
            if let Some(detail) = rule.apply(query, ctx) {
                debug!(rule = rule.name(), "{detail}");
                trace.push(rule.name(), detail);
            }
        }
    }
}

/// One step of the transformation trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub rule: String,
    pub detail: String,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.rule, self.detail)
    }
}

/// The ordered, numbered transformation trace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    entries: Vec<TraceEntry>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: &str, detail: impl Into<String>) {
        self.entries.push(TraceEntry {
            rule: rule.to_string(),
            detail: detail.into(),
        });
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if some entry was produced by the named rule.
    pub fn mentions(&self, rule: &str) -> bool {
        self.entries.iter().any(|e| e.rule == rule)
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            writeln!(f, "{}. {}", i + 1, entry)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rename;

    impl RewriteRule for Rename {
        fn name(&self) -> &str {
            "rename"
        }

        fn apply(&self, query: &mut SelectQuery, _ctx: &RewriteContext<'_>) -> Option<String> {
            if query.from_table.name == "old" {
                query.from_table.name = "new".to_string();
                Some("renamed table".to_string())
            } else {
                None
            }
        }
    }

    #[test]
    fn test_registry_traces_only_changes() {
        use crate::ast::{SelectQuery, TableRef};

        let catalog = StatsCatalog::new();
        let config = OptimizerConfig::default();
        let ctx = RewriteContext {
            catalog: &catalog,
            config: &config,
        };
        let mut registry = RewriteRegistry::new();
        registry.add_rule(Box::new(Rename));

        let mut q = SelectQuery::from_table(TableRef::new("old", ""));
        let mut trace = Trace::new();
        registry.run(&mut q, &ctx, &mut trace);
        assert_eq!(q.from_table.name, "new");
        assert_eq!(trace.len(), 1);
        assert!(trace.mentions("rename"));

        // Second run: nothing changes, nothing is traced.
        let mut trace2 = Trace::new();
        registry.run(&mut q, &ctx, &mut trace2);
        assert!(trace2.is_empty());
    }

    #[test]
    fn test_trace_display_is_numbered() {
        let mut trace = Trace::new();
        trace.push("constant_folding", "removed 1 trivially true predicate");
        trace.push("predicate_pushdown", "pushed 2 predicates into table scans");
        let text = trace.to_string();
        assert!(text.starts_with("1. [constant_folding] removed 1 trivially true predicate\n"));
        assert!(text.contains("2. [predicate_pushdown]"));
    }
}
