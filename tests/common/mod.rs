//! Shared harness for the integration suites: an engine over an in-memory
//! catalog, plus small helpers for building tables and asserting rows.

#![allow(dead_code)]

use rowmill::catalog::Database;
use rowmill::storage::{MemoryDatabase, MemoryProvider, MemoryTable};
use rowmill::types::schema::TableDef;
use rowmill::{Engine, Error, Row, Session, Value};
use std::sync::Arc;

pub struct TestCtx {
    pub engine: Engine,
    pub session: Session,
    pub db: Arc<MemoryDatabase>,
}

pub fn setup_test() -> TestCtx {
    let (provider, db) = MemoryProvider::with_database("test");
    let engine = Engine::new(provider);
    let session = engine.session("root", "test");
    TestCtx { engine, session, db }
}

impl TestCtx {
    pub fn exec(&self, sql: &str) {
        if let Err(e) = self.session.exec(sql) {
            panic!("exec failed for {:?}: {}", sql, e);
        }
    }

    pub fn exec_err(&self, sql: &str) -> Error {
        match self.session.exec(sql) {
            Ok(_) => panic!("expected error for {:?}", sql),
            Err(e) => e,
        }
    }

    pub fn query(&self, sql: &str) -> Vec<Row> {
        match self.session.query(sql).and_then(|r| r.collect()) {
            Ok(rows) => rows,
            Err(e) => panic!("query failed for {:?}: {}", sql, e),
        }
    }

    pub fn query_err(&self, sql: &str) -> Error {
        match self.session.query(sql).and_then(|r| r.collect()) {
            Ok(rows) => panic!("expected error for {:?}, got {} rows", sql, rows.len()),
            Err(e) => e,
        }
    }

    pub fn assert_rows(&self, sql: &str, expected: Vec<Vec<Value>>) {
        let rows = self.query(sql);
        assert_eq!(rows, expected, "rows mismatch for {:?}", sql);
    }

    /// Registers a table straight through the catalog, for shapes the SQL
    /// surface does not cover (prefix indexes, generated columns).
    pub fn add_table(&self, def: TableDef, rows: Vec<Row>) {
        self.db.add_table(MemoryTable::with_rows(def, rows));
    }

    pub fn table_names(&self) -> Vec<String> {
        self.db.tables()
    }
}

/// Builder mirroring the common CREATE-then-INSERT opening of most tests.
pub struct TableBuilder<'a> {
    ctx: &'a TestCtx,
    name: String,
}

impl<'a> TableBuilder<'a> {
    pub fn new(ctx: &'a TestCtx, name: &str) -> TableBuilder<'a> {
        TableBuilder { ctx, name: name.to_string() }
    }

    pub fn create(self, columns: &str) -> Self {
        self.ctx.exec(&format!("CREATE TABLE {} ({})", self.name, columns));
        self
    }

    pub fn insert_values(self, values: &str) -> Self {
        self.ctx.exec(&format!("INSERT INTO {} VALUES {}", self.name, values));
        self
    }
}

pub fn i(v: i64) -> Value {
    Value::I64(v)
}

pub fn f(v: f64) -> Value {
    Value::F64(v)
}

pub fn s(v: &str) -> Value {
    Value::Str(v.to_string())
}

pub fn null() -> Value {
    Value::Null
}
