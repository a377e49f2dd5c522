//! Per-connection session state.
//!
//! Everything globally mutable during a query — warnings, last-insert-id,
//! row counts, user variables, the cancellation flag — hangs off the
//! session, never off a process global, so concurrent sessions cannot
//! collide. The advisory lock table is the one deliberately shared piece;
//! it is keyed by name and scoped to the owning engine.

use crate::error::{Error, Result};
use crate::plan::Plan;
use crate::types::value::Value;
use crate::variables::{GlobalVariables, SqlMode};
use chrono::NaiveDateTime;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// How many analyzed plans a session keeps cached by statement text.
const PLAN_CACHE_CAPACITY: usize = 128;

#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub code: u16,
    pub message: String,
}

/// The engine-wide advisory lock table behind GET_LOCK / RELEASE_LOCK /
/// IS_USED_LOCK. Locks survive across statements and are released when the
/// owning session drops.
#[derive(Default)]
pub struct LockTable {
    locks: Mutex<HashMap<String, u32>>,
}

impl LockTable {
    pub fn new() -> Arc<LockTable> {
        Arc::new(LockTable::default())
    }

    /// Non-blocking acquire: the engine is single-threaded per query, so a
    /// held lock fails immediately rather than waiting out the timeout.
    pub fn acquire(&self, name: &str, session: u32) -> bool {
        let mut locks = self.locks.lock();
        match locks.get(name) {
            Some(owner) if *owner != session => false,
            _ => {
                locks.insert(name.to_string(), session);
                true
            }
        }
    }

    pub fn release(&self, name: &str, session: u32) -> Option<bool> {
        let mut locks = self.locks.lock();
        match locks.get(name) {
            Some(owner) if *owner == session => {
                locks.remove(name);
                Some(true)
            }
            Some(_) => Some(false),
            None => None,
        }
    }

    pub fn holder(&self, name: &str) -> Option<u32> {
        self.locks.lock().get(name).copied()
    }

    pub fn release_all(&self, session: u32) {
        self.locks.lock().retain(|_, owner| *owner != session);
    }
}

/// A prepared statement: the analyzed plan template plus its placeholder
/// count. Bindings are per-execution.
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    pub sql: String,
    pub plan: Plan,
    pub parameter_count: usize,
}

pub struct SessionState {
    pub connection_id: u32,
    pub user: String,
    globals: Arc<GlobalVariables>,
    locks: Arc<LockTable>,

    current_database: RwLock<String>,
    variables: RwLock<HashMap<String, Value>>,
    user_variables: RwLock<HashMap<String, Value>>,
    warnings: Mutex<Vec<Warning>>,

    last_insert_id: AtomicU64,
    row_count: AtomicI64,
    found_rows: AtomicU64,
    cancelled: AtomicBool,

    query_start: Mutex<NaiveDateTime>,

    prepared: Mutex<HashMap<u32, PreparedStatement>>,
    next_statement_id: AtomicU32,
    plan_cache: Mutex<lru::LruCache<String, Plan>>,
}

/// A cheaply cloneable handle to one connection's state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionState>,
}

impl Session {
    pub fn new(
        connection_id: u32,
        user: impl Into<String>,
        database: impl Into<String>,
        globals: Arc<GlobalVariables>,
        locks: Arc<LockTable>,
    ) -> Session {
        Session {
            inner: Arc::new(SessionState {
                connection_id,
                user: user.into(),
                globals,
                locks,
                current_database: RwLock::new(database.into()),
                variables: RwLock::new(HashMap::new()),
                user_variables: RwLock::new(HashMap::new()),
                warnings: Mutex::new(Vec::new()),
                last_insert_id: AtomicU64::new(0),
                row_count: AtomicI64::new(0),
                found_rows: AtomicU64::new(0),
                cancelled: AtomicBool::new(false),
                query_start: Mutex::new(chrono::Utc::now().naive_utc()),
                prepared: Mutex::new(HashMap::new()),
                next_statement_id: AtomicU32::new(1),
                plan_cache: Mutex::new(lru::LruCache::new(
                    NonZeroUsize::new(PLAN_CACHE_CAPACITY).expect("nonzero cache capacity"),
                )),
            }),
        }
    }

    pub fn connection_id(&self) -> u32 {
        self.inner.connection_id
    }

    pub fn user(&self) -> &str {
        &self.inner.user
    }

    pub fn current_database(&self) -> String {
        self.inner.current_database.read().clone()
    }

    pub fn set_current_database(&self, name: &str) {
        *self.inner.current_database.write() = name.to_string();
    }

    // System variables: session overrides shadow the shared globals.

    pub fn get_variable(&self, name: &str) -> Result<Value> {
        if let Some(v) = self.inner.variables.read().get(&name.to_lowercase()) {
            return Ok(v.clone());
        }
        self.inner.globals.get(name)
    }

    pub fn set_variable(&self, name: &str, value: Value) -> Result<()> {
        if !crate::variables::is_known(name) {
            return Err(Error::UnknownSystemVariable(name.to_string()));
        }
        if crate::variables::is_read_only(name) {
            return Err(Error::ReadOnlyVariable(name.to_string()));
        }
        self.inner.variables.write().insert(name.to_lowercase(), value);
        Ok(())
    }

    pub fn set_global_variable(&self, name: &str, value: Value) -> Result<()> {
        self.inner.globals.set(name, value)
    }

    pub fn all_variables(&self) -> Vec<(String, Value)> {
        let overrides = self.inner.variables.read();
        self.inner
            .globals
            .all()
            .into_iter()
            .map(|(name, v)| match overrides.get(&name) {
                Some(o) => (name, o.clone()),
                None => (name, v),
            })
            .collect()
    }

    pub fn sql_mode(&self) -> SqlMode {
        match self.get_variable("sql_mode") {
            Ok(Value::Str(s)) => SqlMode::parse(&s),
            _ => SqlMode::default(),
        }
    }

    // User variables (@name). Unset variables read as NULL.

    pub fn get_user_variable(&self, name: &str) -> Value {
        self.inner.user_variables.read().get(&name.to_lowercase()).cloned().unwrap_or(Value::Null)
    }

    pub fn set_user_variable(&self, name: &str, value: Value) {
        self.inner.user_variables.write().insert(name.to_lowercase(), value);
    }

    // Warnings.

    pub fn warn(&self, code: u16, message: impl Into<String>) {
        self.inner.warnings.lock().push(Warning { code, message: message.into() });
    }

    pub fn warnings(&self) -> Vec<Warning> {
        self.inner.warnings.lock().clone()
    }

    pub fn clear_warnings(&self) {
        self.inner.warnings.lock().clear();
    }

    // Last-query info.

    pub fn last_insert_id(&self) -> u64 {
        self.inner.last_insert_id.load(Ordering::SeqCst)
    }

    pub fn set_last_insert_id(&self, id: u64) {
        self.inner.last_insert_id.store(id, Ordering::SeqCst);
    }

    pub fn row_count(&self) -> i64 {
        self.inner.row_count.load(Ordering::SeqCst)
    }

    pub fn set_row_count(&self, n: i64) {
        self.inner.row_count.store(n, Ordering::SeqCst);
    }

    pub fn found_rows(&self) -> u64 {
        self.inner.found_rows.load(Ordering::SeqCst)
    }

    pub fn set_found_rows(&self, n: u64) {
        self.inner.found_rows.store(n, Ordering::SeqCst);
    }

    // Cancellation. Checked at every iterator boundary.

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::QueryCancelled)
        } else {
            Ok(())
        }
    }

    pub fn reset_cancelled(&self) {
        self.inner.cancelled.store(false, Ordering::SeqCst);
    }

    /// Stamps the start of a statement; NOW() and friends read this so a
    /// single statement sees a single timestamp.
    pub fn begin_statement(&self) {
        *self.inner.query_start.lock() = chrono::Utc::now().naive_utc();
        self.reset_cancelled();
    }

    pub fn statement_time(&self) -> NaiveDateTime {
        *self.inner.query_start.lock()
    }

    /// The session time zone as a UTC offset in minutes, when expressible.
    /// `SYSTEM` and `UTC` are offset zero; named zones need a host table.
    pub fn time_zone_offset_minutes(&self) -> Option<i32> {
        match self.get_variable("time_zone") {
            Ok(Value::Str(tz)) => parse_tz_offset(&tz),
            _ => Some(0),
        }
    }

    pub fn now(&self) -> NaiveDateTime {
        let base = self.statement_time();
        match self.time_zone_offset_minutes() {
            Some(offset) => base + chrono::Duration::minutes(offset as i64),
            None => base,
        }
    }

    // Advisory locks.

    pub fn locks(&self) -> &Arc<LockTable> {
        &self.inner.locks
    }

    // Prepared statements.

    pub fn store_prepared(&self, stmt: PreparedStatement) -> u32 {
        let id = self.inner.next_statement_id.fetch_add(1, Ordering::SeqCst);
        self.inner.prepared.lock().insert(id, stmt);
        id
    }

    pub fn prepared(&self, id: u32) -> Result<PreparedStatement> {
        self.inner
            .prepared
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::PreparedStatementNotFound(id.to_string()))
    }

    pub fn drop_prepared(&self, id: u32) {
        self.inner.prepared.lock().remove(&id);
    }

    pub fn cached_plan(&self, sql: &str) -> Option<Plan> {
        self.inner.plan_cache.lock().get(sql).cloned()
    }

    pub fn cache_plan(&self, sql: &str, plan: Plan) {
        self.inner.plan_cache.lock().put(sql.to_string(), plan);
    }
}

impl Drop for SessionState {
    fn drop(&mut self) {
        self.locks.release_all(self.connection_id);
    }
}

/// Parses `+05:30` / `-08:00` style offsets; `SYSTEM` and `UTC` are zero.
pub fn parse_tz_offset(tz: &str) -> Option<i32> {
    let tz = tz.trim();
    if tz.eq_ignore_ascii_case("SYSTEM") || tz.eq_ignore_ascii_case("UTC") {
        return Some(0);
    }
    let (sign, rest) = match tz.as_bytes().first()? {
        b'+' => (1, &tz[1..]),
        b'-' => (-1, &tz[1..]),
        _ => return None,
    };
    let (h, m) = rest.split_once(':')?;
    let h: i32 = h.parse().ok()?;
    let m: i32 = m.parse().ok()?;
    if h > 14 || m > 59 {
        return None;
    }
    Some(sign * (h * 60 + m))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: u32, locks: Arc<LockTable>) -> Session {
        Session::new(id, "root", "test", GlobalVariables::new(), locks)
    }

    #[test]
    fn advisory_locks_are_per_name_and_session() {
        let locks = LockTable::new();
        let a = session(1, locks.clone());
        let b = session(2, locks.clone());
        assert!(a.locks().acquire("m", a.connection_id()));
        assert!(!b.locks().acquire("m", b.connection_id()));
        assert_eq!(locks.holder("m"), Some(1));
        assert_eq!(a.locks().release("m", 1), Some(true));
        assert!(b.locks().acquire("m", 2));
    }

    #[test]
    fn locks_release_on_session_drop() {
        let locks = LockTable::new();
        {
            let a = session(7, locks.clone());
            assert!(a.locks().acquire("held", 7));
        }
        assert_eq!(locks.holder("held"), None);
    }

    #[test]
    fn tz_offsets() {
        assert_eq!(parse_tz_offset("+05:30"), Some(330));
        assert_eq!(parse_tz_offset("-08:00"), Some(-480));
        assert_eq!(parse_tz_offset("SYSTEM"), Some(0));
        assert_eq!(parse_tz_offset("America/New_York"), None);
    }

    #[test]
    fn session_variable_shadows_global() {
        let globals = GlobalVariables::new();
        let s = Session::new(1, "root", "", globals.clone(), LockTable::new());
        s.set_variable("max_allowed_packet", Value::I64(1024)).unwrap();
        assert_eq!(s.get_variable("max_allowed_packet").unwrap(), Value::I64(1024));
        assert_eq!(globals.get("max_allowed_packet").unwrap(), Value::I64(67108864));
    }
}
