//! # Semantic Validation
//!
//! Resolves table names and column references against the statistics catalog
//! before any rewriting happens. Problems split into two severities:
//!
//! - **Warnings** -- unknown table (optimization proceeds on default
//!   statistics), unknown column, empty catalog. Returned to the caller and
//!   recorded in the trace.
//! - **Fatal errors** -- a qualified reference to an alias that is not in
//!   scope, an unqualified column matching more than one in-scope table, or a
//!   duplicate alias. These abort optimization; the backend would reject the
//!   query anyway.
//!
//! Column references are extracted from the predicate texts with the same
//! regex recognition the rewriter uses; expressions the recognizer does not
//! understand (function calls, arithmetic) are skipped rather than guessed at.

use crate::ast::SelectQuery;
use crate::catalog::StatsCatalog;
use crate::error::SemanticError;
use crate::predicate;
use std::collections::{BTreeMap, BTreeSet};

/// Validate a query against the catalog. Returns accumulated warnings, or the
/// first fatal error encountered.
pub fn validate(query: &SelectQuery, catalog: &StatsCatalog) -> Result<Vec<String>, SemanticError> {
    let mut warnings = Vec::new();

    if catalog.tables.is_empty() {
        warnings.push(
            "statistics catalog is empty; using default statistics for all tables".to_string(),
        );
    }

    let mut seen = BTreeSet::new();
    for alias in query.aliases() {
        if !seen.insert(alias.to_lowercase()) {
            return Err(SemanticError::DuplicateAlias(alias));
        }
    }

    // Lowercased alias -> resolved table name, or None when the table has no
    // statistics (column checks are skipped for those).
    let mut scope: BTreeMap<String, Option<String>> = BTreeMap::new();
    let tables = std::iter::once(&query.from_table).chain(query.joins.iter().map(|j| &j.table));
    for table in tables {
        let alias = table.effective_alias().to_lowercase();
        match catalog.get_table_stats_ci(&table.name) {
            Some(ts) => {
                scope.insert(alias, Some(ts.table_name.clone()));
            }
            None => {
                warnings.push(format!(
                    "table '{}' not found in statistics; using default statistics",
                    table.name
                ));
                scope.insert(alias, None);
            }
        }
    }

    let check_qualified = |qual: &str, col: &str, warnings: &mut Vec<String>| {
        match scope.get(&qual.to_lowercase()) {
            None => Err(SemanticError::UnknownAlias(qual.to_string())),
            Some(Some(table)) => {
                let known = catalog
                    .get_table_stats_ci(table)
                    .map(|ts| ts.has_column_ci(col))
                    .unwrap_or(false);
                if !known {
                    warnings.push(format!("column '{col}' not found in table '{table}'"));
                }
                Ok(())
            }
            Some(None) => Ok(()),
        }
    };

    let check_unqualified = |col: &str, scope: &BTreeMap<String, Option<String>>,
                             warnings: &mut Vec<String>|
     -> Result<(), SemanticError> {
        let matches = scope
            .values()
            .filter(|t| match t {
                Some(table) => catalog
                    .get_table_stats_ci(table)
                    .map(|ts| ts.has_column_ci(col))
                    .unwrap_or(false),
                None => false,
            })
            .count();
        match matches {
            0 => {
                warnings.push(format!("column '{col}' not found in any in-scope table"));
                Ok(())
            }
            1 => Ok(()),
            _ => Err(SemanticError::AmbiguousColumn(col.to_string())),
        }
    };

    // Every textual fragment that can carry column references.
    let mut fragments: Vec<&str> = Vec::new();
    for item in &query.select_items {
        fragments.push(&item.expr);
    }
    for join in &query.joins {
        fragments.extend(join.on_conds.iter().map(String::as_str));
    }
    fragments.extend(query.where_conditions.iter().map(String::as_str));
    fragments.extend(query.from_table.pushed_filters.iter().map(String::as_str));
    fragments.extend(query.having_conditions.iter().map(String::as_str));
    fragments.extend(query.group_by.iter().map(String::as_str));
    fragments.extend(query.order_by.iter().map(|o| o.expr.as_str()));

    for text in fragments {
        // Parenthesized expressions (function calls, scalar subqueries) are
        // opaque here: a subquery introduces aliases this scope cannot see.
        if text.trim() == "*" || text.contains('(') {
            continue;
        }
        for (qual, col) in predicate::qualified_refs(text) {
            check_qualified(&qual, &col, &mut warnings)?;
        }
        if let Some(ident) = predicate::bare_identifier(text) {
            check_unqualified(&ident, &scope, &mut warnings)?;
        } else if let Some(cmp) = predicate::parse_comparison(text) {
            // Simple comparisons may reference an unqualified column on the
            // left-hand side (`id = 42`).
            if !cmp.column.contains('.') && !predicate::is_trivially_true(text) {
                check_unqualified(&cmp.column, &scope, &mut warnings)?;
            }
        }
    }

    Ok(warnings)
}
