//! MySQL system variables: the recognized set, persistent defaults, and the
//! shared global scope behind `SET GLOBAL`.

use crate::error::{Error, Result};
use crate::types::value::Value;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub const VERSION: &str = "8.0.33-rowmill";

/// Default recursion bound for recursive CTEs, per MySQL's
/// cte_max_recursion_depth.
pub const DEFAULT_CTE_RECURSION_DEPTH: u64 = 1000;

struct VariableDef {
    name: &'static str,
    default: fn() -> Value,
    read_only: bool,
}

const KNOWN: &[VariableDef] = &[
    VariableDef { name: "autocommit", default: || Value::I64(1), read_only: false },
    VariableDef {
        name: "sql_mode",
        default: || {
            Value::Str(
                "ONLY_FULL_GROUP_BY,STRICT_TRANS_TABLES,NO_ZERO_IN_DATE,NO_ZERO_DATE,\
                 ERROR_FOR_DIVISION_BY_ZERO,NO_ENGINE_SUBSTITUTION"
                    .into(),
            )
        },
        read_only: false,
    },
    VariableDef { name: "time_zone", default: || Value::Str("SYSTEM".into()), read_only: false },
    VariableDef { name: "system_time_zone", default: || Value::Str("UTC".into()), read_only: true },
    VariableDef { name: "character_set_client", default: || Value::Str("utf8mb4".into()), read_only: false },
    VariableDef { name: "character_set_connection", default: || Value::Str("utf8mb4".into()), read_only: false },
    VariableDef { name: "character_set_results", default: || Value::Str("utf8mb4".into()), read_only: false },
    VariableDef {
        name: "collation_connection",
        default: || Value::Str("utf8mb4_0900_bin".into()),
        read_only: false,
    },
    VariableDef { name: "collation_server", default: || Value::Str("utf8mb4_0900_bin".into()), read_only: false },
    VariableDef { name: "max_allowed_packet", default: || Value::I64(67108864), read_only: false },
    VariableDef { name: "version", default: || Value::Str(VERSION.into()), read_only: true },
    VariableDef { name: "version_comment", default: || Value::Str("rowmill embedded".into()), read_only: true },
    VariableDef { name: "gtid_mode", default: || Value::Str("OFF".into()), read_only: true },
    VariableDef {
        name: "cte_max_recursion_depth",
        default: || Value::I64(DEFAULT_CTE_RECURSION_DEPTH as i64),
        read_only: false,
    },
    VariableDef { name: "lower_case_table_names", default: || Value::I64(0), read_only: true },
    VariableDef { name: "sql_select_limit", default: || Value::I64(i64::MAX), read_only: false },
    VariableDef { name: "wait_timeout", default: || Value::I64(28800), read_only: false },
    VariableDef { name: "interactive_timeout", default: || Value::I64(28800), read_only: false },
    VariableDef { name: "net_write_timeout", default: || Value::I64(60), read_only: false },
    VariableDef { name: "net_read_timeout", default: || Value::I64(30), read_only: false },
    VariableDef { name: "auto_increment_increment", default: || Value::I64(1), read_only: false },
    VariableDef { name: "transaction_isolation", default: || Value::Str("REPEATABLE-READ".into()), read_only: false },
    VariableDef { name: "max_join_size", default: || Value::I64(i64::MAX), read_only: false },
];

fn find(name: &str) -> Option<&'static VariableDef> {
    KNOWN.iter().find(|d| d.name.eq_ignore_ascii_case(name))
}

pub fn is_known(name: &str) -> bool {
    find(name).is_some()
}

pub fn is_read_only(name: &str) -> bool {
    find(name).is_some_and(|d| d.read_only)
}

pub fn default_value(name: &str) -> Option<Value> {
    find(name).map(|d| (d.default)())
}

/// The global variable scope, shared by every session of an engine.
#[derive(Default)]
pub struct GlobalVariables {
    overrides: RwLock<HashMap<String, Value>>,
}

impl GlobalVariables {
    pub fn new() -> Arc<GlobalVariables> {
        Arc::new(GlobalVariables::default())
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        let key = name.to_lowercase();
        if let Some(v) = self.overrides.read().get(&key) {
            return Ok(v.clone());
        }
        default_value(&key).ok_or_else(|| Error::UnknownSystemVariable(name.to_string()))
    }

    pub fn set(&self, name: &str, value: Value) -> Result<()> {
        let def = find(name).ok_or_else(|| Error::UnknownSystemVariable(name.to_string()))?;
        if def.read_only {
            return Err(Error::ReadOnlyVariable(name.to_string()));
        }
        self.overrides.write().insert(name.to_lowercase(), value);
        Ok(())
    }

    /// Every known variable with its current global value, sorted by name.
    pub fn all(&self) -> Vec<(String, Value)> {
        let overrides = self.overrides.read();
        let mut out: Vec<(String, Value)> = KNOWN
            .iter()
            .map(|d| {
                let v = overrides.get(d.name).cloned().unwrap_or_else(d.default);
                (d.name.to_string(), v)
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

/// The pieces of `sql_mode` the engine changes behavior on.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlMode {
    pub strict: bool,
    pub error_for_division_by_zero: bool,
    pub only_full_group_by: bool,
}

impl SqlMode {
    pub fn parse(mode: &str) -> SqlMode {
        let mut out = SqlMode::default();
        for part in mode.split(',') {
            match part.trim().to_uppercase().as_str() {
                "STRICT_TRANS_TABLES" | "STRICT_ALL_TABLES" => out.strict = true,
                "ERROR_FOR_DIVISION_BY_ZERO" => out.error_for_division_by_zero = true,
                "ONLY_FULL_GROUP_BY" => out.only_full_group_by = true,
                _ => {}
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_variables_reject_set() {
        let globals = GlobalVariables::new();
        assert_eq!(globals.set("gtid_mode", Value::Str("ON".into())).unwrap_err(), Error::ReadOnlyVariable("gtid_mode".into()));
        assert_eq!(globals.get("gtid_mode").unwrap(), Value::Str("OFF".into()));
    }

    #[test]
    fn unknown_variable_errors() {
        let globals = GlobalVariables::new();
        assert!(matches!(globals.get("no_such_thing"), Err(Error::UnknownSystemVariable(_))));
    }

    #[test]
    fn sql_mode_parsing() {
        let mode = SqlMode::parse("ONLY_FULL_GROUP_BY,ERROR_FOR_DIVISION_BY_ZERO,STRICT_TRANS_TABLES");
        assert!(mode.strict && mode.error_for_division_by_zero && mode.only_full_group_by);
        let loose = SqlMode::parse("");
        assert!(!loose.strict && !loose.error_for_division_by_zero);
    }
}
