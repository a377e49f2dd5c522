//! Query execution: pull-based row iterators over an analyzed plan.
//!
//! One `Rows` tree is advanced by one thread at a time. Every iterator
//! consults the session's cancellation flag once per row; an error
//! terminates the stream. Resources are released when the iterator drops,
//! on every exit path.

pub mod aggregate;
pub mod delete;
pub mod executor;
pub mod expression;
pub mod helpers;
pub mod insert;
pub mod join;
pub mod update;
pub mod window;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::session::Session;
use crate::types::value::{Row, Value};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub use executor::node_rows;

/// A pull-based stream of rows.
pub type Rows = Box<dyn Iterator<Item = Result<Row>> + Send>;

/// The result of evaluating an uncorrelated subquery once per statement.
#[derive(Debug, Clone)]
pub enum CachedSubquery {
    Scalar(Value),
    Rows(Arc<Vec<Value>>),
    Exists(bool),
}

/// Per-statement execution context, cheaply cloneable into iterators.
#[derive(Clone)]
pub struct QueryCtx {
    pub session: Session,
    pub catalog: Catalog,
    /// Prepared-statement bindings, one per placeholder.
    pub params: Arc<Vec<Value>>,
    /// Uncorrelated subquery results, keyed by the analyzer's cache id.
    pub subquery_cache: Arc<Mutex<HashMap<usize, CachedSubquery>>>,
    /// Working tables of in-flight recursive CTEs, keyed by CTE name.
    pub cte_tables: Arc<Mutex<HashMap<String, Arc<Vec<Row>>>>>,
    /// When set, division by zero and conversion failures raise instead of
    /// producing NULL + warning. DML evaluation sets this under a strict
    /// `sql_mode` with ERROR_FOR_DIVISION_BY_ZERO.
    pub strict_errors: bool,
}

impl QueryCtx {
    pub fn new(session: Session, catalog: Catalog) -> QueryCtx {
        QueryCtx {
            session,
            catalog,
            params: Arc::new(Vec::new()),
            subquery_cache: Arc::new(Mutex::new(HashMap::new())),
            cte_tables: Arc::new(Mutex::new(HashMap::new())),
            strict_errors: false,
        }
    }

    pub fn with_params(mut self, params: Vec<Value>) -> QueryCtx {
        self.params = Arc::new(params);
        self
    }

    pub fn strict(mut self) -> QueryCtx {
        let mode = self.session.sql_mode();
        self.strict_errors = mode.strict && mode.error_for_division_by_zero;
        self
    }
}

/// Wraps an iterator with a cancellation check per row.
pub fn cancellable(rows: Rows, session: Session) -> Rows {
    Box::new(rows.map(move |r| {
        session.check_cancelled()?;
        r
    }))
}

/// Collects a stream, surfacing the first error.
pub fn collect(rows: Rows) -> Result<Vec<Row>> {
    rows.collect()
}
