//! JSON functions over the document semantics in `types::json`.

use super::{json_arg, json_value_arg, str_arg, Function, FunctionContext, FunctionSignature, Registry};
use crate::error::{Error, Result};
use crate::types::data_type::DataType;
use crate::types::json::{self, SetMode};
use crate::types::value::Value;
use serde_json::Value as Json;

fn sig(name: &'static str, min: usize, max: usize) -> FunctionSignature {
    FunctionSignature { name, min_args: min, max_args: max, deterministic: true }
}

struct JsonExtract;
impl Function for JsonExtract {
    fn signature(&self) -> FunctionSignature {
        sig("JSON_EXTRACT", 2, usize::MAX)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::Json)
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let Some(doc) = json_arg(args, 0)? else { return Ok(Value::Null) };
        let mut found = Vec::new();
        for i in 1..args.len() {
            let Some(path) = str_arg(args, i)? else { return Ok(Value::Null) };
            let legs = json::parse_path(&path)?;
            if let Some(v) = json::lookup(&doc, &legs) {
                found.push(v.clone());
            }
        }
        Ok(match (found.len(), args.len() - 1) {
            (0, _) => Value::Null,
            (1, 1) => Value::Json(found.pop().unwrap()),
            _ => Value::Json(Json::Array(found)),
        })
    }
}

struct JsonUnquote;
impl Function for JsonUnquote {
    fn signature(&self) -> FunctionSignature {
        sig("JSON_UNQUOTE", 1, 1)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::text())
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        Ok(match &args[0] {
            Value::Null => Value::Null,
            Value::Json(Json::String(s)) => Value::Str(s.clone()),
            Value::Json(other) => Value::Str(json::to_mysql_string(other)),
            Value::Str(s) => match serde_json::from_str::<Json>(s) {
                Ok(Json::String(inner)) => Value::Str(inner),
                _ => Value::Str(s.clone()),
            },
            other => Value::Str(other.to_string()),
        })
    }
}

/// JSON_SET / JSON_INSERT / JSON_REPLACE: (doc, path, value, path, value...).
struct JsonAssign {
    name: &'static str,
    mode: SetMode,
}

impl Function for JsonAssign {
    fn signature(&self) -> FunctionSignature {
        sig(self.name, 3, usize::MAX)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::Json)
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        if (args.len() - 1) % 2 != 0 {
            return Err(Error::FunctionArity {
                name: self.name.to_string(),
                expected: "an odd number (doc, then path/value pairs)".into(),
                actual: args.len(),
            });
        }
        let Some(mut doc) = json_arg(args, 0)? else { return Ok(Value::Null) };
        let mut i = 1;
        while i < args.len() {
            let Some(path) = str_arg(args, i)? else { return Ok(Value::Null) };
            let legs = json::parse_path(&path)?;
            let value = json_value_arg(args, i + 1);
            let (next, _) = json::apply_set(&doc, &legs, value, self.mode)?;
            doc = next;
            i += 2;
        }
        Ok(Value::Json(doc))
    }
}

struct JsonRemove;
impl Function for JsonRemove {
    fn signature(&self) -> FunctionSignature {
        sig("JSON_REMOVE", 2, usize::MAX)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::Json)
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let Some(mut doc) = json_arg(args, 0)? else { return Ok(Value::Null) };
        for i in 1..args.len() {
            let Some(path) = str_arg(args, i)? else { return Ok(Value::Null) };
            let legs = json::parse_path(&path)?;
            let (next, _) = json::apply_remove(&doc, &legs)?;
            doc = next;
        }
        Ok(Value::Json(doc))
    }
}

struct JsonArrayAppend;
impl Function for JsonArrayAppend {
    fn signature(&self) -> FunctionSignature {
        sig("JSON_ARRAY_APPEND", 3, usize::MAX)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::Json)
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let Some(mut doc) = json_arg(args, 0)? else { return Ok(Value::Null) };
        let mut i = 1;
        while i < args.len() {
            let Some(path) = str_arg(args, i)? else { return Ok(Value::Null) };
            let legs = json::parse_path(&path)?;
            let (next, _) = json::apply_array_append(&doc, &legs, json_value_arg(args, i + 1))?;
            doc = next;
            i += 2;
        }
        Ok(Value::Json(doc))
    }
}

struct JsonArrayInsert;
impl Function for JsonArrayInsert {
    fn signature(&self) -> FunctionSignature {
        sig("JSON_ARRAY_INSERT", 3, usize::MAX)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::Json)
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let Some(mut doc) = json_arg(args, 0)? else { return Ok(Value::Null) };
        let mut i = 1;
        while i < args.len() {
            let Some(path) = str_arg(args, i)? else { return Ok(Value::Null) };
            let legs = json::parse_path(&path)?;
            let (next, _) = json::apply_array_insert(&doc, &legs, json_value_arg(args, i + 1))?;
            doc = next;
            i += 2;
        }
        Ok(Value::Json(doc))
    }
}

struct JsonContains;
impl Function for JsonContains {
    fn signature(&self) -> FunctionSignature {
        sig("JSON_CONTAINS", 2, 3)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::TinyInt { unsigned: false })
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let (Some(doc), Some(candidate)) = (json_arg(args, 0)?, json_arg(args, 1)?) else {
            return Ok(Value::Null);
        };
        let target = if args.len() > 2 {
            let Some(path) = str_arg(args, 2)? else { return Ok(Value::Null) };
            let legs = json::parse_path(&path)?;
            match json::lookup(&doc, &legs) {
                Some(v) => v.clone(),
                None => return Ok(Value::Null),
            }
        } else {
            doc
        };
        Ok(Value::I8(contains(&target, &candidate) as i8))
    }
}

/// MySQL containment: arrays contain candidates element-wise, objects by
/// key-and-contained-value, scalars by equality.
fn contains(target: &Json, candidate: &Json) -> bool {
    match (target, candidate) {
        (Json::Array(items), Json::Array(cands)) => cands.iter().all(|c| items.iter().any(|i| contains(i, c))),
        (Json::Array(items), c) => items.iter().any(|i| contains(i, c)),
        (Json::Object(map), Json::Object(cand)) => cand
            .iter()
            .all(|(k, v)| map.get(k).is_some_and(|tv| contains(tv, v))),
        (t, c) => t == c,
    }
}

struct JsonArray;
impl Function for JsonArray {
    fn signature(&self) -> FunctionSignature {
        sig("JSON_ARRAY", 0, usize::MAX)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::Json)
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let items: Vec<Json> = (0..args.len()).map(|i| json_value_arg(args, i)).collect();
        Ok(Value::Json(Json::Array(items)))
    }
}

struct JsonObject;
impl Function for JsonObject {
    fn signature(&self) -> FunctionSignature {
        sig("JSON_OBJECT", 0, usize::MAX)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::Json)
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        if args.len() % 2 != 0 {
            return Err(Error::FunctionArity {
                name: "JSON_OBJECT".into(),
                expected: "an even number".into(),
                actual: args.len(),
            });
        }
        let mut map = serde_json::Map::new();
        let mut i = 0;
        while i < args.len() {
            let Some(key) = str_arg(args, i)? else {
                return Err(Error::InvalidArgument("JSON_OBJECT key cannot be NULL".into()));
            };
            map.insert(key, json_value_arg(args, i + 1));
            i += 2;
        }
        Ok(Value::Json(Json::Object(map)))
    }
}

struct JsonLength;
impl Function for JsonLength {
    fn signature(&self) -> FunctionSignature {
        sig("JSON_LENGTH", 1, 2)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::bigint())
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let Some(doc) = json_arg(args, 0)? else { return Ok(Value::Null) };
        let target = if args.len() > 1 {
            let Some(path) = str_arg(args, 1)? else { return Ok(Value::Null) };
            match json::lookup(&doc, &json::parse_path(&path)?) {
                Some(v) => v.clone(),
                None => return Ok(Value::Null),
            }
        } else {
            doc
        };
        Ok(Value::I64(match target {
            Json::Array(items) => items.len() as i64,
            Json::Object(map) => map.len() as i64,
            _ => 1,
        }))
    }
}

struct JsonType;
impl Function for JsonType {
    fn signature(&self) -> FunctionSignature {
        sig("JSON_TYPE", 1, 1)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::text())
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let Some(doc) = json_arg(args, 0)? else { return Ok(Value::Null) };
        Ok(Value::Str(
            match doc {
                Json::Null => "NULL",
                Json::Bool(_) => "BOOLEAN",
                Json::Number(ref n) if n.is_f64() => "DOUBLE",
                Json::Number(_) => "INTEGER",
                Json::String(_) => "STRING",
                Json::Array(_) => "ARRAY",
                Json::Object(_) => "OBJECT",
            }
            .to_string(),
        ))
    }
}

struct JsonValid;
impl Function for JsonValid {
    fn signature(&self) -> FunctionSignature {
        sig("JSON_VALID", 1, 1)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::TinyInt { unsigned: false })
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        Ok(match &args[0] {
            Value::Null => Value::Null,
            Value::Json(_) => Value::I8(1),
            Value::Str(s) => Value::I8(serde_json::from_str::<Json>(s).is_ok() as i8),
            _ => Value::I8(0),
        })
    }
}

pub(super) fn register(registry: &mut Registry) {
    registry.register(JsonExtract);
    registry.register(JsonUnquote);
    registry.register(JsonAssign { name: "JSON_SET", mode: SetMode::Set });
    registry.register(JsonAssign { name: "JSON_INSERT", mode: SetMode::Insert });
    registry.register(JsonAssign { name: "JSON_REPLACE", mode: SetMode::Replace });
    registry.register(JsonRemove);
    registry.register(JsonArrayAppend);
    registry.register(JsonArrayInsert);
    registry.register(JsonContains);
    registry.register(JsonArray);
    registry.register(JsonObject);
    registry.register(JsonLength);
    registry.register(JsonType);
    registry.register(JsonValid);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{LockTable, Session};
    use crate::variables::GlobalVariables;
    use serde_json::json;

    fn run(f: &dyn Function, args: &[Value]) -> Value {
        let session = Session::new(1, "root", "", GlobalVariables::new(), LockTable::new());
        let ctx = FunctionContext { session: &session };
        f.execute(args, &ctx).unwrap()
    }

    #[test]
    fn set_insert_replace() {
        let doc = Value::Str(r#"{"a":1}"#.into());
        let path = |p: &str| Value::Str(p.into());
        assert_eq!(
            run(&JsonAssign { name: "JSON_SET", mode: SetMode::Set }, &[doc.clone(), path("$.b"), Value::I64(42)]),
            Value::Json(json!({"a": 1, "b": 42}))
        );
        assert_eq!(
            run(&JsonAssign { name: "JSON_INSERT", mode: SetMode::Insert }, &[doc.clone(), path("$.a"), Value::I64(42)]),
            Value::Json(json!({"a": 1}))
        );
        assert_eq!(
            run(&JsonAssign { name: "JSON_REPLACE", mode: SetMode::Replace }, &[doc, path("$.b"), Value::I64(42)]),
            Value::Json(json!({"a": 1}))
        );
    }

    #[test]
    fn containment() {
        assert!(contains(&json!([1, 2, 3]), &json!(2)));
        assert!(contains(&json!({"a": 1, "b": 2}), &json!({"a": 1})));
        assert!(!contains(&json!({"a": 1}), &json!({"a": 2})));
    }

    #[test]
    fn extract_multiple_paths_wraps() {
        let doc = Value::Str(r#"{"a":1,"b":2}"#.into());
        assert_eq!(
            run(&JsonExtract, &[doc.clone(), Value::Str("$.a".into())]),
            Value::Json(json!(1))
        );
        assert_eq!(
            run(&JsonExtract, &[doc, Value::Str("$.a".into()), Value::Str("$.b".into())]),
            Value::Json(json!([1, 2]))
        );
    }
}
