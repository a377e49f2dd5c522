//! Table binding: view expansion, storage lookup, duplicate-alias checks.

use super::{AnalyzerCtx, RuleSelector, Scope};
use crate::error::{Error, Result};
use crate::plan::{Node, TableRef};
use crate::planning::Planner;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use std::collections::HashSet;

/// Substitutes view references with their parsed bodies under a subquery
/// alias, so downstream rules see an ordinary derived table.
pub(super) fn expand_views(
    ctx: &mut AnalyzerCtx,
    node: Node,
    _scope: &Scope,
    _selector: RuleSelector,
) -> Result<(Node, bool)> {
    let mut changed = false;
    let node = node.transform_up(&mut |n| {
        let Node::UnresolvedTable { database, name, alias } = &n else {
            return Ok(n);
        };
        let db_name = ctx.default_database(database.as_deref());
        let Ok(db) = ctx.catalog.database(&db_name) else {
            return Ok(n);
        };
        let Some(definition) = db.view(name) else {
            return Ok(n);
        };
        let statements = Parser::parse_sql(&MySqlDialect {}, &format!("SELECT * FROM ({}) AS v", definition))
            .map_err(|e| Error::SyntaxError(format!("view {}: {}", name, e)))?;
        let [sqlparser::ast::Statement::Query(query)] = statements.as_slice() else {
            return Err(Error::SyntaxError(format!("view {} does not define a query", name)));
        };
        let mut planner = Planner::new(ctx.session, ctx.catalog);
        let body = planner.plan_query(query)?;
        changed = true;
        Ok(Node::SubqueryAlias {
            name: alias.clone().unwrap_or_else(|| name.clone()),
            columns: Vec::new(),
            child: Box::new(body),
        })
    })?;
    Ok((node, changed))
}

/// Binds every remaining unresolved table to a storage provider.
pub(super) fn resolve_tables(
    ctx: &mut AnalyzerCtx,
    node: Node,
    _scope: &Scope,
    _selector: RuleSelector,
) -> Result<(Node, bool)> {
    let mut changed = false;
    let node = node.transform_up(&mut |n| {
        let Node::UnresolvedTable { database, name, alias } = &n else {
            return Ok(n);
        };
        let db_name = ctx.default_database(database.as_deref());
        if db_name.is_empty() {
            return Err(Error::DatabaseNotFound("no database selected".into()));
        }
        let table = ctx.catalog.table(&db_name, name)?;
        changed = true;
        Ok(Node::Table(TableRef {
            database: db_name,
            name: table.name().to_string(),
            alias: alias.clone(),
            table,
        }))
    })?;
    Ok((node, changed))
}

/// Every table or derived-table name within one FROM must be unique,
/// case-insensitively.
pub(super) fn check_duplicate_aliases(
    _ctx: &mut AnalyzerCtx,
    node: Node,
    _scope: &Scope,
    _selector: RuleSelector,
) -> Result<(Node, bool)> {
    fn collect(node: &Node, seen: &mut HashSet<String>) -> Result<()> {
        match node {
            Node::Join { left, right, .. } => {
                collect(left, seen)?;
                collect(right, seen)
            }
            Node::Table(t) => note(t.source_name(), seen),
            Node::IndexedTable { table, .. } => note(table.source_name(), seen),
            Node::UnresolvedTable { name, alias, .. } => {
                note(alias.as_deref().unwrap_or(name), seen)
            }
            Node::SubqueryAlias { name, .. } => note(name, seen),
            Node::RecursiveTableRef { name, .. } => note(name, seen),
            // Filters between join legs keep the same FROM region.
            Node::Filter { child, .. } => collect(child, seen),
            _ => Ok(()),
        }
    }

    fn note(name: &str, seen: &mut HashSet<String>) -> Result<()> {
        if !seen.insert(name.to_lowercase()) {
            return Err(Error::DuplicateAliasOrTable(name.to_string()));
        }
        Ok(())
    }

    let mut result = Ok(());
    node.walk(&mut |n| {
        if result.is_err() {
            return;
        }
        if let Node::Join { .. } = n {
            let mut seen = HashSet::new();
            result = collect(n, &mut seen);
        }
    });
    result?;
    Ok((node, false))
}
