//! # AST-to-SQL Serialization
//!
//! Deterministic re-emission of a (possibly rewritten) query as a SQL string
//! executable on an unmodified backend. Clause order is fixed:
//!
//! `SELECT [DISTINCT] items FROM table [AS alias] {<type> JOIN tbl [AS alias]
//! ON conds} [WHERE ...] [GROUP BY ...] [HAVING ...] [ORDER BY ...]
//! [LIMIT n]`
//!
//! The WHERE clause re-collects every pushed filter (FROM table first, then
//! join tables in source order) ahead of the remaining global conditions, so
//! pushdown never changes the emitted query's meaning.

use crate::ast::SelectQuery;

/// Render the query as a single-line SQL string.
pub fn select_query_to_sql(query: &SelectQuery) -> String {
    let mut sql = String::from("SELECT ");
    if query.distinct {
        sql.push_str("DISTINCT ");
    }
    if query.select_items.is_empty() {
        sql.push('*');
    } else {
        let items: Vec<String> = query.select_items.iter().map(|i| i.rendered()).collect();
        sql.push_str(&items.join(", "));
    }

    sql.push_str(" FROM ");
    sql.push_str(&query.from_table.name);
    if !query.from_table.alias.is_empty() {
        sql.push_str(" AS ");
        sql.push_str(&query.from_table.alias);
    }

    for join in &query.joins {
        sql.push(' ');
        sql.push_str(join.join_type.sql_token());
        sql.push_str(" JOIN ");
        sql.push_str(&join.table.name);
        if !join.table.alias.is_empty() {
            sql.push_str(" AS ");
            sql.push_str(&join.table.alias);
        }
        if !join.on_conds.is_empty() {
            sql.push_str(" ON ");
            sql.push_str(&join.on_conds.join(" AND "));
        }
    }

    let mut filters: Vec<&str> = Vec::new();
    filters.extend(query.from_table.pushed_filters.iter().map(String::as_str));
    for join in &query.joins {
        filters.extend(join.table.pushed_filters.iter().map(String::as_str));
    }
    filters.extend(query.where_conditions.iter().map(String::as_str));
    if !filters.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&filters.join(" AND "));
    }

    if !query.group_by.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(&query.group_by.join(", "));
    }

    if !query.having_conditions.is_empty() {
        sql.push_str(" HAVING ");
        sql.push_str(&query.having_conditions.join(" AND "));
    }

    if !query.order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        let items: Vec<String> = query
            .order_by
            .iter()
            .map(|o| format!("{} {}", o.expr, if o.ascending { "ASC" } else { "DESC" }))
            .collect();
        sql.push_str(&items.join(", "));
    }

    if query.limit >= 0 {
        sql.push_str(&format!(" LIMIT {}", query.limit));
    }

    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{JoinClause, JoinType, OrderItem, SelectItem, SelectQuery, TableRef};

    #[test]
    fn test_minimal_query() {
        let mut q = SelectQuery::from_table(TableRef::new("users", ""));
        q.select_items.push(SelectItem::new("*"));
        assert_eq!(select_query_to_sql(&q), "SELECT * FROM users");
    }

    #[test]
    fn test_all_clauses_in_order() {
        let mut q = SelectQuery::from_table(TableRef::new("users", "u"));
        q.distinct = true;
        q.select_items
            .push(SelectItem::with_alias("u.name", "user_name"));
        q.joins.push(JoinClause {
            join_type: JoinType::Inner,
            table: TableRef::new("orders", "o"),
            on_conds: vec!["u.id = o.user_id".to_string()],
        });
        q.where_conditions.push("o.status = 'A'".to_string());
        q.group_by.push("u.name".to_string());
        q.having_conditions.push("COUNT(*) > 3".to_string());
        q.order_by.push(OrderItem {
            expr: "u.name".to_string(),
            ascending: true,
        });
        q.order_by.push(OrderItem {
            expr: "o.id".to_string(),
            ascending: false,
        });
        q.limit = 10;
        assert_eq!(
            select_query_to_sql(&q),
            "SELECT DISTINCT u.name AS user_name FROM users AS u \
             INNER JOIN orders AS o ON u.id = o.user_id \
             WHERE o.status = 'A' GROUP BY u.name HAVING COUNT(*) > 3 \
             ORDER BY u.name ASC, o.id DESC LIMIT 10"
        );
    }

    #[test]
    fn test_pushed_filters_reappear_in_where() {
        let mut q = SelectQuery::from_table(TableRef::new("users", "u"));
        q.select_items.push(SelectItem::new("*"));
        q.from_table.pushed_filters.push("u.age > 30".to_string());
        let mut join = JoinClause {
            join_type: JoinType::Inner,
            table: TableRef::new("orders", "o"),
            on_conds: vec!["u.id = o.user_id".to_string()],
        };
        join.table.pushed_filters.push("o.status = 'A'".to_string());
        q.joins.push(join);
        q.where_conditions.push("u.name <> o.note".to_string());
        assert_eq!(
            select_query_to_sql(&q),
            "SELECT * FROM users AS u INNER JOIN orders AS o ON u.id = o.user_id \
             WHERE u.age > 30 AND o.status = 'A' AND u.name <> o.note"
        );
    }

    #[test]
    fn test_outer_and_anti_join_tokens() {
        let mut q = SelectQuery::from_table(TableRef::new("a", ""));
        q.select_items.push(SelectItem::new("*"));
        for (jt, table) in [
            (JoinType::Left, "b"),
            (JoinType::RightAnti, "c"),
            (JoinType::FullOuterAnti, "d"),
        ] {
            q.joins.push(JoinClause {
                join_type: jt,
                table: TableRef::new(table, ""),
                on_conds: vec![format!("a.k = {table}.k")],
            });
        }
        assert_eq!(
            select_query_to_sql(&q),
            "SELECT * FROM a LEFT JOIN b ON a.k = b.k \
             RIGHT ANTI JOIN c ON a.k = c.k \
             FULL OUTER ANTI JOIN d ON a.k = d.k"
        );
    }

    #[test]
    fn test_join_without_on_clause() {
        let mut q = SelectQuery::from_table(TableRef::new("a", ""));
        q.select_items.push(SelectItem::new("*"));
        q.joins.push(JoinClause {
            join_type: JoinType::Natural,
            table: TableRef::new("b", ""),
            on_conds: vec![],
        });
        assert_eq!(select_query_to_sql(&q), "SELECT * FROM a NATURAL JOIN b");
    }
}
