//! Built-in SQL functions.
//!
//! Functions are looked up by lowercased name in a registry populated at
//! initialization; hosts may register more. Each function declares its
//! arity bounds, whether it is deterministic (non-deterministic functions
//! inhibit constant folding and pushdown), its static return type, and its
//! evaluation over concrete values.

mod conditional;
mod datetime;
mod json;
mod math;
mod regexp_fns;
mod spatial;
mod string;
mod system;

use crate::error::{Error, Result};
use crate::session::Session;
use crate::types::data_type::DataType;
use crate::types::value::Value;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Execution-time context handed to every function: the owning session
/// (time, variables, locks, query info).
pub struct FunctionContext<'a> {
    pub session: &'a Session,
}

#[derive(Debug, Clone, Copy)]
pub struct FunctionSignature {
    /// Uppercased display name.
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub deterministic: bool,
}

pub trait Function: Send + Sync {
    fn signature(&self) -> FunctionSignature;

    /// The static result type for the given argument types.
    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType>;

    fn execute(&self, args: &[Value], ctx: &FunctionContext) -> Result<Value>;
}

struct Registry {
    functions: HashMap<String, Arc<dyn Function>>,
}

impl Registry {
    fn register(&mut self, f: impl Function + 'static) {
        let f = Arc::new(f);
        self.functions.insert(f.signature().name.to_lowercase(), f);
    }

    fn alias(&mut self, name: &str, alias: &str) {
        if let Some(f) = self.functions.get(&name.to_lowercase()).cloned() {
            self.functions.insert(alias.to_lowercase(), f);
        }
    }
}

static BUILTINS: LazyLock<HashMap<String, Arc<dyn Function>>> = LazyLock::new(|| {
    let mut registry = Registry { functions: HashMap::new() };
    string::register(&mut registry);
    math::register(&mut registry);
    conditional::register(&mut registry);
    datetime::register(&mut registry);
    json::register(&mut registry);
    regexp_fns::register(&mut registry);
    system::register(&mut registry);
    spatial::register(&mut registry);
    registry.functions
});

/// Host-registered functions; consulted before the built-ins.
static HOST_FUNCTIONS: LazyLock<RwLock<HashMap<String, Arc<dyn Function>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Adds (or replaces) a host-provided function.
pub fn register_host_function(f: impl Function + 'static) {
    let f = Arc::new(f);
    HOST_FUNCTIONS.write().insert(f.signature().name.to_lowercase(), f);
}

pub fn lookup(name: &str) -> Option<Arc<dyn Function>> {
    let key = name.to_lowercase();
    if let Some(f) = HOST_FUNCTIONS.read().get(&key) {
        return Some(f.clone());
    }
    BUILTINS.get(&key).cloned()
}

pub fn is_known(name: &str) -> bool {
    lookup(name).is_some()
}

pub fn is_deterministic(name: &str) -> bool {
    lookup(name).map(|f| f.signature().deterministic).unwrap_or(false)
}

fn check_arity(sig: &FunctionSignature, actual: usize) -> Result<()> {
    if actual < sig.min_args || actual > sig.max_args {
        let expected = if sig.min_args == sig.max_args {
            sig.min_args.to_string()
        } else if sig.max_args == usize::MAX {
            format!("at least {}", sig.min_args)
        } else {
            format!("{} to {}", sig.min_args, sig.max_args)
        };
        return Err(Error::FunctionArity { name: sig.name.to_string(), expected, actual });
    }
    Ok(())
}

/// Validates a call and returns its static result type.
pub fn return_type(name: &str, arg_types: &[DataType]) -> Result<DataType> {
    let f = lookup(name).ok_or_else(|| Error::FunctionNotFound(name.to_string()))?;
    check_arity(&f.signature(), arg_types.len())?;
    f.return_type(arg_types)
}

/// Evaluates a call over concrete values.
pub fn execute(name: &str, args: &[Value], ctx: &FunctionContext) -> Result<Value> {
    let f = lookup(name).ok_or_else(|| Error::FunctionNotFound(name.to_string()))?;
    check_arity(&f.signature(), args.len())?;
    f.execute(args, ctx)
}

// Shared argument helpers. Most scalar functions are NULL-transparent: a
// NULL argument yields a NULL result, handled by the callers below.

pub(crate) fn str_arg(args: &[Value], i: usize) -> Result<Option<String>> {
    match args.get(i) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => Ok(Some(v.clone().into_text()?)),
    }
}

pub(crate) fn int_arg(args: &[Value], i: usize) -> Result<Option<i64>> {
    match args.get(i) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.to_i64().map(Some),
    }
}

pub(crate) fn f64_arg(args: &[Value], i: usize) -> Result<Option<f64>> {
    match args.get(i) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.to_f64().map(Some),
    }
}

pub(crate) fn json_arg(args: &[Value], i: usize) -> Result<Option<serde_json::Value>> {
    match args.get(i) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => match DataType::Json.convert(v.clone())? {
            Value::Json(j) => Ok(Some(j)),
            _ => Err(Error::Internal("json conversion produced non-json".into())),
        },
    }
}

/// A value argument turned into a JSON document fragment, the way
/// JSON_SET and friends treat their value arguments: SQL strings become
/// JSON strings, not parsed documents.
pub(crate) fn json_value_arg(args: &[Value], i: usize) -> serde_json::Value {
    match args.get(i) {
        None | Some(Value::Null) => serde_json::Value::Null,
        Some(Value::Json(j)) => j.clone(),
        Some(Value::Str(s)) => serde_json::Value::String(s.clone()),
        Some(v) if v.is_integer() => match v.to_i64() {
            Ok(n) => serde_json::Value::Number(n.into()),
            Err(_) => serde_json::Value::Null,
        },
        Some(Value::F32(f)) => serde_json::Number::from_f64(*f as f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(Value::F64(f)) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(v) => serde_json::Value::String(v.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert!(is_known("upper"));
        assert!(is_known("UPPER"));
        assert!(is_known("Upper"));
        assert!(!is_known("no_such_function"));
    }

    #[test]
    fn arity_errors_name_the_function() {
        let err = return_type("upper", &[]).unwrap_err();
        assert!(matches!(err, Error::FunctionArity { ref name, .. } if name == "UPPER"));
    }

    #[test]
    fn nondeterministic_markers() {
        assert!(is_deterministic("upper"));
        assert!(!is_deterministic("now"));
        assert!(!is_deterministic("rand"));
        assert!(!is_deterministic("uuid"));
        assert!(!is_deterministic("connection_id"));
        assert!(!is_deterministic("last_insert_id"));
    }
}
