//! SQL parsing and statement mutation.
//!
//! The parser turns raw SQL text into an owned, mutable
//! [`ParsedStatement`] whose outer filter clause can be tested, AND-merged
//! with new predicates, and rendered back to text. Statements the core
//! cannot represent (multiple statements, CTEs, set operations, anything
//! other than SELECT/UPDATE/DELETE) are rejected outright: silently
//! skipping the rewrite would execute an unrestricted statement.

use std::fmt;

use sqlparser::ast::{
    BinaryOperator, Expr, FromTable, SetExpr, Statement, TableFactor, TableWithJoins,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::error::WardError;

/// Parses SQL text into mutable [`ParsedStatement`] values.
pub struct StatementParser {
    dialect: GenericDialect,
}

impl Clone for StatementParser {
    fn clone(&self) -> Self {
        Self {
            dialect: GenericDialect {},
        }
    }
}

impl Default for StatementParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementParser {
    /// Create a new parser.
    pub fn new() -> Self {
        Self {
            dialect: GenericDialect {},
        }
    }

    /// Parse a single SELECT, UPDATE, or DELETE statement.
    pub fn parse(&self, sql: &str) -> Result<ParsedStatement, WardError> {
        let mut statements =
            Parser::parse_sql(&self.dialect, sql).map_err(|e| WardError::Parse(e.to_string()))?;

        let mut stmt = match (statements.pop(), statements.is_empty()) {
            (Some(stmt), true) => stmt,
            (Some(_), false) => {
                return Err(WardError::Parse(
                    "expected a single SQL statement".to_string(),
                ));
            }
            (None, _) => return Err(WardError::Parse("empty SQL statement".to_string())),
        };

        let (kind, filter) = extract_filter(&mut stmt)?;
        let tables = extract_tables(&stmt);

        Ok(ParsedStatement {
            kind,
            tables,
            filter,
            stmt,
        })
    }

    /// Parse a standalone boolean expression, e.g. a predicate fragment
    /// supplied by a custom policy provider.
    pub fn parse_predicate(&self, fragment: &str) -> Result<Expr, WardError> {
        Parser::new(&self.dialect)
            .try_with_sql(fragment)
            .map_err(|e| WardError::Parse(e.to_string()))?
            .parse_expr()
            .map_err(|e| WardError::Parse(e.to_string()))
    }
}

/// Detach the outer filter clause so the statement can be mutated through
/// one slot regardless of kind. The filter is reinstalled on render.
fn extract_filter(stmt: &mut Statement) -> Result<(StatementKind, Option<Expr>), WardError> {
    match stmt {
        Statement::Query(query) => {
            if query.with.is_some() {
                return Err(WardError::UnsupportedStatement {
                    reason: "common table expressions are not supported".to_string(),
                });
            }
            match query.body.as_mut() {
                SetExpr::Select(select) => Ok((StatementKind::Select, select.selection.take())),
                SetExpr::SetOperation { op, .. } => Err(WardError::UnsupportedStatement {
                    reason: format!("set operation {op} is not supported"),
                }),
                _ => Err(WardError::UnsupportedStatement {
                    reason: "query body is not a plain SELECT".to_string(),
                }),
            }
        }
        Statement::Update(update) => Ok((StatementKind::Update, update.selection.take())),
        Statement::Delete(delete) => Ok((StatementKind::Delete, delete.selection.take())),
        _ => Err(WardError::UnsupportedStatement {
            reason: "only SELECT, UPDATE, and DELETE statements are supported".to_string(),
        }),
    }
}

fn extract_tables(stmt: &Statement) -> Vec<TableReference> {
    let mut tables = Vec::new();
    match stmt {
        Statement::Query(query) => {
            if let Some(body) = query.body.as_select() {
                for table_with_joins in &body.from {
                    visit_table_with_joins(table_with_joins, &mut tables);
                }
            }
        }
        Statement::Update(update) => {
            visit_table_with_joins(&update.table, &mut tables);
        }
        Statement::Delete(delete) => match &delete.from {
            FromTable::WithFromKeyword(tables_with_joins)
            | FromTable::WithoutKeyword(tables_with_joins) => {
                for twj in tables_with_joins {
                    visit_table_with_joins(twj, &mut tables);
                }
            }
        },
        _ => {}
    }
    tables
}

fn visit_table_with_joins(table_with_joins: &TableWithJoins, tables: &mut Vec<TableReference>) {
    if let Some(reference) = table_reference(&table_with_joins.relation) {
        tables.push(reference);
    }
    for join in &table_with_joins.joins {
        if let Some(reference) = table_reference(&join.relation) {
            tables.push(reference);
        }
    }
}

fn table_reference(table_factor: &TableFactor) -> Option<TableReference> {
    match table_factor {
        TableFactor::Table { name, alias, .. } => Some(TableReference {
            name: name.to_string(),
            alias: alias.as_ref().map(|a| a.name.value.clone()),
        }),
        _ => None,
    }
}

/// A reference to a table in a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReference {
    /// The table name as written, schema prefix included.
    pub name: String,
    /// Optional alias.
    pub alias: Option<String>,
}

/// The supported statement kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Update,
    Delete,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatementKind::Select => "SELECT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// A parsed, mutable statement.
///
/// Owned exclusively by the rewrite that created it. The outer filter is
/// held detached from the AST so predicate merges go through one place;
/// [`ParsedStatement::render`] reinstalls it and serializes.
#[derive(Debug)]
pub struct ParsedStatement {
    kind: StatementKind,
    tables: Vec<TableReference>,
    filter: Option<Expr>,
    stmt: Statement,
}

impl ParsedStatement {
    /// The statement kind.
    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// Tables referenced by the statement, primary table first.
    pub fn tables(&self) -> &[TableReference] {
        &self.tables
    }

    /// The primary table: the first relation of the FROM clause (or the
    /// updated/deleted table). `None` for table-less selects like
    /// `SELECT 1`.
    pub fn primary_table(&self) -> Option<&TableReference> {
        self.tables.first()
    }

    /// Whether the statement carries a filter clause.
    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// AND-merge a predicate into the filter clause.
    ///
    /// Both sides are parenthesized to preserve precedence against
    /// whatever the caller wrote. With no existing filter the predicate
    /// becomes the sole filter.
    pub fn merge_filter(&mut self, predicate: Expr) {
        self.filter = Some(match self.filter.take() {
            Some(existing) => Expr::BinaryOp {
                left: Box::new(Expr::Nested(Box::new(existing))),
                op: BinaryOperator::And,
                right: Box::new(Expr::Nested(Box::new(predicate))),
            },
            None => predicate,
        });
    }

    /// Render the statement back to SQL text.
    pub fn render(mut self) -> String {
        let filter = self.filter.take();
        match &mut self.stmt {
            Statement::Query(query) => {
                if let SetExpr::Select(select) = query.body.as_mut() {
                    select.selection = filter;
                }
            }
            Statement::Update(update) => update.selection = filter,
            Statement::Delete(delete) => delete.selection = filter,
            _ => {}
        }
        self.stmt.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parser() -> StatementParser {
        StatementParser::new()
    }

    #[test]
    fn test_parse_simple_select() {
        let stmt = parser().parse("SELECT * FROM orders").unwrap();
        assert_eq!(stmt.kind(), StatementKind::Select);
        assert_eq!(stmt.tables().len(), 1);
        assert_eq!(stmt.tables()[0].name, "orders");
        assert!(!stmt.has_filter());
    }

    #[test]
    fn test_parse_select_with_alias_and_join() {
        let stmt = parser()
            .parse("SELECT * FROM orders o JOIN users u ON o.user_id = u.id")
            .unwrap();
        assert_eq!(stmt.tables().len(), 2);
        assert_eq!(stmt.primary_table().unwrap().name, "orders");
        assert_eq!(stmt.primary_table().unwrap().alias.as_deref(), Some("o"));
        assert_eq!(stmt.tables()[1].name, "users");
    }

    #[test]
    fn test_parse_update_and_delete() {
        let stmt = parser().parse("UPDATE t SET x = 1 WHERE id = 5").unwrap();
        assert_eq!(stmt.kind(), StatementKind::Update);
        assert!(stmt.has_filter());

        let stmt = parser().parse("DELETE FROM t").unwrap();
        assert_eq!(stmt.kind(), StatementKind::Delete);
        assert_eq!(stmt.primary_table().unwrap().name, "t");
        assert!(!stmt.has_filter());
    }

    #[test]
    fn test_reject_invalid_sql() {
        assert!(matches!(
            parser().parse("SELEKT * FROM t"),
            Err(WardError::Parse(_))
        ));
    }

    #[test]
    fn test_reject_multiple_statements() {
        assert!(matches!(
            parser().parse("SELECT 1; SELECT 2"),
            Err(WardError::Parse(_))
        ));
    }

    #[test]
    fn test_reject_cte() {
        let result = parser().parse("WITH x AS (SELECT 1) SELECT * FROM x");
        assert!(matches!(
            result,
            Err(WardError::UnsupportedStatement { .. })
        ));
    }

    #[test]
    fn test_reject_set_operation() {
        let result = parser().parse("SELECT a FROM t UNION SELECT a FROM u");
        assert!(matches!(
            result,
            Err(WardError::UnsupportedStatement { .. })
        ));
    }

    #[test]
    fn test_reject_other_kinds() {
        for sql in ["INSERT INTO t (a) VALUES (1)", "DROP TABLE t"] {
            assert!(matches!(
                parser().parse(sql),
                Err(WardError::UnsupportedStatement { .. })
            ));
        }
    }

    #[test]
    fn test_merge_into_empty_filter() {
        let mut stmt = parser().parse("SELECT * FROM orders").unwrap();
        let predicate = parser().parse_predicate("tenant_id = 't1'").unwrap();
        stmt.merge_filter(predicate);
        assert_eq!(
            stmt.render(),
            "SELECT * FROM orders WHERE tenant_id = 't1'"
        );
    }

    #[test]
    fn test_merge_parenthesizes_existing_filter() {
        let mut stmt = parser()
            .parse("SELECT * FROM orders WHERE status = 'pending' OR status = 'paid'")
            .unwrap();
        let predicate = parser().parse_predicate("tenant_id = 't1'").unwrap();
        stmt.merge_filter(predicate);
        assert_eq!(
            stmt.render(),
            "SELECT * FROM orders WHERE (status = 'pending' OR status = 'paid') AND (tenant_id = 't1')"
        );
    }

    #[test]
    fn test_render_preserves_trailing_clauses() {
        let mut stmt = parser()
            .parse("SELECT id FROM orders ORDER BY id LIMIT 10")
            .unwrap();
        let predicate = parser().parse_predicate("tenant_id = 't1'").unwrap();
        stmt.merge_filter(predicate);
        assert_eq!(
            stmt.render(),
            "SELECT id FROM orders WHERE tenant_id = 't1' ORDER BY id LIMIT 10"
        );
    }

    #[test]
    fn test_round_trip_without_mutation() {
        let sql = "SELECT id, status FROM orders WHERE status = 'pending'";
        assert_eq!(parser().parse(sql).unwrap().render(), sql);
    }
}
