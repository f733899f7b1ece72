//! Error types for the optimizer.
//!
//! Semantic problems split into two severities: warnings (unknown unqualified
//! column, missing table statistics) accumulate into the trace and
//! optimization continues on default statistics; fatal errors (unknown alias,
//! ambiguous column, duplicate alias) abort optimization. A fatal outcome
//! still carries the trace collected so far and the original SQL text so the
//! caller can fall through to executing the query unoptimized.

use crate::rewrite::Trace;
use thiserror::Error;

/// Fatal name-resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    #[error("Unknown table/alias '{0}'")]
    UnknownAlias(String),
    #[error("Ambiguous column '{0}', specify table/alias")]
    AmbiguousColumn(String),
    #[error("Duplicate alias '{0}'")]
    DuplicateAlias(String),
}

/// Everything that can abort an optimization.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizerError {
    /// Upstream parser failure, surfaced untouched.
    #[error("parse error: {0}")]
    Parse(String),
    #[error(transparent)]
    Semantic(#[from] SemanticError),
    /// Internal invariant violation. Unreachable in production; the message
    /// carries enough context to reproduce.
    #[error("optimizer fault: {0}")]
    Fault(String),
}

/// A failed optimization: the error plus the trace collected before the
/// failure and the original SQL text. No partial plan is ever returned.
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct OptimizeFailure {
    pub error: OptimizerError,
    pub trace: Trace,
    pub original_sql: String,
}
