//! The engine front door: sessions, the query/exec API, prepared
//! statements, and statement-level dispatch for DDL, SET, USE, EXPLAIN and
//! ANALYZE.

use crate::analyzer::{self, AnalyzerCtx, RuleSelector};
use crate::catalog::{Catalog, DatabaseProvider, TableStatistics};
use crate::error::{Error, Result};
use crate::execution::helpers::ExecOutcome;
use crate::execution::{self, QueryCtx, Rows};
use crate::plan::{Plan, SetAssignment, SetScope, TransactionOp};
use crate::planning::Planner;
use crate::session::{self, LockTable, PreparedStatement, Warning};
use crate::types::expression::Expression;
use crate::types::schema::{Column, Schema};
use crate::types::value::{Row, Value};
use crate::variables::GlobalVariables;
use crate::DataType;
use regex::Regex;
use sqlparser::ast::Statement;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// An embeddable SQL engine over a host-provided catalog.
#[derive(Clone)]
pub struct Engine {
    catalog: Catalog,
    globals: Arc<GlobalVariables>,
    locks: Arc<LockTable>,
    next_connection_id: Arc<AtomicU32>,
}

impl Engine {
    pub fn new(provider: Arc<dyn DatabaseProvider>) -> Engine {
        Engine {
            catalog: Catalog::new(provider),
            globals: GlobalVariables::new(),
            locks: LockTable::new(),
            next_connection_id: Arc::new(AtomicU32::new(1)),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Opens a session for a connection.
    pub fn session(&self, user: &str, database: &str) -> Session {
        let id = self.next_connection_id.fetch_add(1, Ordering::SeqCst);
        Session {
            engine: self.clone(),
            state: session::Session::new(id, user, database, self.globals.clone(), self.locks.clone()),
        }
    }
}

/// A streaming query result: the output schema and a pull iterator.
pub struct QueryResult {
    pub schema: Schema,
    pub rows: Rows,
}

impl QueryResult {
    pub fn collect(self) -> Result<Vec<Row>> {
        self.rows.collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    pub row_count: u64,
    pub last_insert_id: u64,
    pub warnings: Vec<Warning>,
}

enum StatementOutput {
    Rows(Schema, Rows),
    Count(ExecOutcome),
}

/// One connection to the engine.
#[derive(Clone)]
pub struct Session {
    engine: Engine,
    state: session::Session,
}

impl Session {
    pub fn state(&self) -> &session::Session {
        &self.state
    }

    pub fn cancel(&self) {
        self.state.cancel();
    }

    pub fn warnings(&self) -> Vec<Warning> {
        self.state.warnings()
    }

    /// Runs a statement and streams its rows. Statements that return no
    /// rows produce an empty schema and no rows; their counts land on the
    /// session.
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        match self.run_sql(sql)? {
            StatementOutput::Rows(schema, rows) => {
                let rows = count_found_rows(rows, self.state.clone());
                Ok(QueryResult { schema, rows })
            }
            StatementOutput::Count(outcome) => {
                self.note_outcome(&outcome);
                Ok(QueryResult { schema: Schema::empty(), rows: Box::new(std::iter::empty()) })
            }
        }
    }

    /// Runs a statement for its side effects.
    pub fn exec(&self, sql: &str) -> Result<ExecResult> {
        match self.run_sql(sql)? {
            StatementOutput::Rows(_, rows) => {
                for row in rows {
                    row?;
                }
                Ok(ExecResult { row_count: 0, last_insert_id: self.state.last_insert_id(), warnings: self.warnings() })
            }
            StatementOutput::Count(outcome) => {
                self.note_outcome(&outcome);
                Ok(ExecResult {
                    row_count: outcome.row_count,
                    last_insert_id: self.state.last_insert_id(),
                    warnings: self.warnings(),
                })
            }
        }
    }

    /// Prepares a statement; placeholders stay typed variables until
    /// execution.
    pub fn prepare(&self, sql: &str) -> Result<u32> {
        self.state.begin_statement();
        let statements = parse_sql(sql)?;
        let [statement] = statements.as_slice() else {
            return Err(Error::UnsupportedFeature("preparing multiple statements at once".into()));
        };
        let mut planner = Planner::new(&self.state, &self.engine.catalog);
        let plan = planner.plan_statement(statement)?;
        let parameter_count = planner.parameter_count();
        let mut ctx = AnalyzerCtx::new(&self.state, &self.engine.catalog);
        let plan = analyzer::analyze(&mut ctx, plan)?;
        self.state.cache_plan(sql, plan.clone());
        Ok(self.state.store_prepared(PreparedStatement { sql: sql.to_string(), plan, parameter_count }))
    }

    /// Executes a prepared statement with fresh bindings. The plan is
    /// re-analyzed under the reduced rule set so defaults and types settle
    /// against the bound values.
    pub fn execute(&self, statement_id: u32, bindings: Vec<Value>) -> Result<QueryResult> {
        let prepared = self.state.prepared(statement_id)?;
        if bindings.len() < prepared.parameter_count {
            return Err(Error::UnboundPreparedStatementVariable(bindings.len()));
        }
        self.state.begin_statement();
        let mut ctx = AnalyzerCtx::new(&self.state, &self.engine.catalog);
        let plan = analyzer::analyze_with_selector(&mut ctx, prepared.plan.clone(), RuleSelector::Prepared)?;
        let query_ctx = QueryCtx::new(self.state.clone(), self.engine.catalog.clone()).with_params(bindings);
        match self.run_plan(plan, &query_ctx)? {
            StatementOutput::Rows(schema, rows) => Ok(QueryResult { schema, rows }),
            StatementOutput::Count(outcome) => {
                self.note_outcome(&outcome);
                Ok(QueryResult { schema: Schema::empty(), rows: Box::new(std::iter::empty()) })
            }
        }
    }

    pub fn drop_prepared(&self, statement_id: u32) {
        self.state.drop_prepared(statement_id);
    }

    /// Plans and runs an already-parsed statement. Hosts that carry their
    /// own parser front-end hand the AST in here instead of SQL text.
    pub fn execute_statement(&self, statement: &Statement) -> Result<QueryResult> {
        self.state.begin_statement();
        self.state.clear_warnings();
        let mut planner = Planner::new(&self.state, &self.engine.catalog);
        let plan = planner.plan_statement(statement)?;
        let mut ctx = AnalyzerCtx::new(&self.state, &self.engine.catalog);
        let plan = analyzer::analyze(&mut ctx, plan)?;
        let query_ctx = QueryCtx::new(self.state.clone(), self.engine.catalog.clone());
        match self.run_plan(plan, &query_ctx)? {
            StatementOutput::Rows(schema, rows) => {
                let rows = count_found_rows(rows, self.state.clone());
                Ok(QueryResult { schema, rows })
            }
            StatementOutput::Count(outcome) => {
                self.note_outcome(&outcome);
                Ok(QueryResult { schema: Schema::empty(), rows: Box::new(std::iter::empty()) })
            }
        }
    }

    fn note_outcome(&self, outcome: &ExecOutcome) {
        self.state.set_row_count(outcome.row_count as i64);
        if outcome.last_insert_id != 0 {
            self.state.set_last_insert_id(outcome.last_insert_id);
        }
    }

    fn run_sql(&self, sql: &str) -> Result<StatementOutput> {
        // SHOW WARNINGS reads the previous statement's warnings; everything
        // else starts from a clean list.
        let keeps_warnings = sql.trim_start().to_uppercase().starts_with("SHOW WARNINGS");
        self.state.begin_statement();
        if !keeps_warnings {
            self.state.clear_warnings();
        }
        tracing::debug!(connection = self.state.connection_id(), sql, "statement start");

        let statements = parse_sql(sql)?;
        let mut plans = Vec::with_capacity(statements.len());
        for statement in &statements {
            let mut planner = Planner::new(&self.state, &self.engine.catalog);
            plans.push(planner.plan_statement(statement)?);
        }
        let plan = match plans.len() {
            1 => plans.pop().unwrap(),
            _ => Plan::Block(plans),
        };

        let mut ctx = AnalyzerCtx::new(&self.state, &self.engine.catalog);
        ctx.join_order_hint = extract_join_order_hint(sql);
        let plan = analyzer::analyze(&mut ctx, plan)?;

        let query_ctx = QueryCtx::new(self.state.clone(), self.engine.catalog.clone());
        self.run_plan(plan, &query_ctx)
    }

    fn run_plan(&self, plan: Plan, query_ctx: &QueryCtx) -> Result<StatementOutput> {
        match plan {
            Plan::Select(node) => {
                let schema = node.schema();
                let rows = execution::node_rows(&node, query_ctx, Arc::new(Vec::new()))?;
                Ok(StatementOutput::Rows(schema, rows))
            }
            Plan::Insert(insert) => Ok(StatementOutput::Count(execution::insert::execute(&insert, query_ctx)?)),
            Plan::Update(update) => Ok(StatementOutput::Count(execution::update::execute(&update, query_ctx)?)),
            Plan::Delete(delete) => Ok(StatementOutput::Count(execution::delete::execute(&delete, query_ctx)?)),

            Plan::CreateTable { database, def, if_not_exists } => {
                let db = self.database(database.as_deref())?;
                match db.create_table(def) {
                    Ok(()) => Ok(StatementOutput::Count(ExecOutcome::default())),
                    Err(Error::DuplicateTable(name)) if if_not_exists => {
                        self.state.warn(1050, format!("Table '{}' already exists", name));
                        Ok(StatementOutput::Count(ExecOutcome::default()))
                    }
                    Err(e) => Err(e),
                }
            }
            Plan::DropTable { database, names, if_exists } => {
                let db = self.database(database.as_deref())?;
                for name in names {
                    match db.drop_table(&name) {
                        Ok(()) => {}
                        Err(Error::TableNotFound(name)) if if_exists => {
                            self.state.warn(1051, format!("Unknown table '{}'", name));
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok(StatementOutput::Count(ExecOutcome::default()))
            }
            Plan::CreateIndex { database, table, index } => {
                let db = self.database(database.as_deref())?;
                db.create_index(&table, index)?;
                Ok(StatementOutput::Count(ExecOutcome::default()))
            }
            Plan::DropIndex { database, table, name } => {
                let db = self.database(database.as_deref())?;
                db.drop_index(&table, &name)?;
                Ok(StatementOutput::Count(ExecOutcome::default()))
            }
            Plan::CreateView { database, name, definition } => {
                let db = self.database(database.as_deref())?;
                db.create_view(&name, &definition)?;
                Ok(StatementOutput::Count(ExecOutcome::default()))
            }
            Plan::DropView { database, name, if_exists } => {
                let db = self.database(database.as_deref())?;
                match db.drop_view(&name) {
                    Ok(()) => {}
                    Err(Error::ViewNotFound(_)) if if_exists => {}
                    Err(e) => return Err(e),
                }
                Ok(StatementOutput::Count(ExecOutcome::default()))
            }

            Plan::Set(assignments) => {
                self.apply_set(&assignments, query_ctx)?;
                Ok(StatementOutput::Count(ExecOutcome::default()))
            }
            Plan::Use(name) => {
                if !self.engine.catalog.databases().iter().any(|d| d.eq_ignore_ascii_case(&name)) {
                    return Err(Error::DatabaseNotFound(name));
                }
                self.state.set_current_database(&name);
                Ok(StatementOutput::Count(ExecOutcome::default()))
            }
            Plan::Transaction(op) => {
                // The engine holds no transactional state itself; commit and
                // rollback are the storage provider's concern.
                tracing::debug!(?op, "transaction statement");
                if op == TransactionOp::Rollback {
                    self.state.warn(1196, "Some non-transactional tables could not be rolled back");
                }
                Ok(StatementOutput::Count(ExecOutcome::default()))
            }

            Plan::Explain(inner) => {
                let lines = match *inner {
                    Plan::Select(node) => node.describe(),
                    other => format!("{:#?}", other).lines().map(|l| l.to_string()).collect(),
                };
                let schema = Schema::new(vec![Column::new("plan", DataType::text())]);
                let rows: Vec<Row> = lines.into_iter().map(|l| vec![Value::Str(l)]).collect();
                Ok(StatementOutput::Rows(schema, Box::new(rows.into_iter().map(Ok))))
            }

            Plan::AnalyzeTable { database, tables } => {
                let db_name = self.database_name(database.as_deref());
                let mut rows = Vec::new();
                for table in tables {
                    let stats = self.compute_statistics(&db_name, &table)?;
                    self.engine.catalog.statistics().record(&db_name, &table, stats);
                    rows.push(vec![
                        Value::Str(format!("{}.{}", db_name, table)),
                        Value::Str("analyze".into()),
                        Value::Str("status".into()),
                        Value::Str("OK".into()),
                    ]);
                }
                let schema = Schema::new(vec![
                    Column::new("Table", DataType::text()),
                    Column::new("Op", DataType::text()),
                    Column::new("Msg_type", DataType::text()),
                    Column::new("Msg_text", DataType::text()),
                ]);
                Ok(StatementOutput::Rows(schema, Box::new(rows.into_iter().map(Ok))))
            }

            Plan::Block(items) => {
                let mut last = StatementOutput::Count(ExecOutcome::default());
                for item in items {
                    // Intermediate row outputs are drained so earlier
                    // statements fully run before later ones start.
                    last = match self.run_plan(item, query_ctx)? {
                        StatementOutput::Rows(schema, rows) => {
                            let drained: Vec<Result<Row>> = rows.collect();
                            StatementOutput::Rows(schema, Box::new(drained.into_iter()))
                        }
                        other => other,
                    };
                }
                Ok(last)
            }
        }
    }

    fn apply_set(&self, assignments: &[SetAssignment], query_ctx: &QueryCtx) -> Result<()> {
        for SetAssignment { scope, name, value } in assignments {
            // `SET sql_mode = ANSI` style bare identifiers read as strings.
            let value = match value {
                Expression::UnresolvedColumn { table: None, name } => Value::Str(name.clone()),
                expr => execution::expression::eval_constant(expr, query_ctx)?,
            };
            match scope {
                SetScope::UserVariable => self.state.set_user_variable(name, value),
                SetScope::Session => self.state.set_variable(name, value)?,
                SetScope::Global => self.state.set_global_variable(name, value)?,
            }
        }
        Ok(())
    }

    fn database_name(&self, database: Option<&str>) -> String {
        database
            .map(|d| d.to_string())
            .unwrap_or_else(|| self.state.current_database())
    }

    fn database(&self, database: Option<&str>) -> Result<Arc<dyn crate::catalog::Database>> {
        self.engine.catalog.database(&self.database_name(database))
    }

    fn compute_statistics(&self, database: &str, table: &str) -> Result<TableStatistics> {
        let table = self.engine.catalog.table(database, table)?;
        let schema = table.def().schema.clone();
        let mut row_count = 0u64;
        let mut distinct: Vec<std::collections::HashSet<Value>> =
            schema.iter().map(|_| std::collections::HashSet::new()).collect();
        for partition in table.partitions()? {
            for row in table.scan_partition(&partition)? {
                let row = row?;
                self.state.check_cancelled()?;
                row_count += 1;
                for (i, v) in row.into_iter().enumerate() {
                    if let Some(set) = distinct.get_mut(i) {
                        set.insert(v);
                    }
                }
            }
        }
        Ok(TableStatistics {
            row_count,
            column_cardinality: schema
                .iter()
                .zip(distinct)
                .map(|(c, set)| (c.name.clone(), set.len() as u64))
                .collect(),
        })
    }
}

fn parse_sql(sql: &str) -> Result<Vec<Statement>> {
    Parser::parse_sql(&MySqlDialect {}, sql).map_err(|e| Error::SyntaxError(e.to_string()))
}

/// Pulls a `/*+ JOIN_ORDER(a, b) */` hint out of the raw text; the parser
/// strips comments, so the hint travels alongside the AST.
fn extract_join_order_hint(sql: &str) -> Option<Vec<String>> {
    let re = Regex::new(r"(?i)/\*\+\s*JOIN_ORDER\s*\(([^)]*)\)\s*\*/").expect("static regex");
    let captures = re.captures(sql)?;
    let names: Vec<String> = captures[1]
        .split(',')
        .map(|s| s.trim().trim_matches('`').to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(names)
    }
}

/// Wraps a result stream so FOUND_ROWS() reports how many rows the
/// statement produced once the stream finishes.
fn count_found_rows(rows: Rows, state: session::Session) -> Rows {
    struct Counting {
        inner: Rows,
        state: session::Session,
        count: u64,
        done: bool,
    }
    impl Iterator for Counting {
        type Item = Result<Row>;

        fn next(&mut self) -> Option<Self::Item> {
            match self.inner.next() {
                Some(item) => {
                    if item.is_ok() {
                        self.count += 1;
                    }
                    Some(item)
                }
                None => {
                    if !self.done {
                        self.done = true;
                        self.state.set_found_rows(self.count);
                    }
                    None
                }
            }
        }
    }
    Box::new(Counting { inner: rows, state, count: 0, done: false })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_order_hint_extraction() {
        assert_eq!(
            extract_join_order_hint("SELECT /*+ JOIN_ORDER(b, a) */ * FROM a JOIN b ON 1"),
            Some(vec!["b".to_string(), "a".to_string()])
        );
        assert_eq!(extract_join_order_hint("SELECT 1"), None);
        assert_eq!(extract_join_order_hint("SELECT /*+ JOIN_ORDER() */ 1"), None);
    }
}
