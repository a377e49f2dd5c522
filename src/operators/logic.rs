//! Three-valued logic connectives. AND/OR short-circuit in the evaluator;
//! these kernels combine already-evaluated truth values.

use crate::error::Result;
use crate::types::value::Value;

fn truth(v: Option<bool>) -> Value {
    match v {
        Some(true) => Value::I8(1),
        Some(false) => Value::I8(0),
        None => Value::Null,
    }
}

pub fn execute_and(left: &Value, right: &Value) -> Result<Value> {
    Ok(truth(match (left.is_true(), right.is_true()) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }))
}

pub fn execute_or(left: &Value, right: &Value) -> Result<Value> {
    Ok(truth(match (left.is_true(), right.is_true()) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }))
}

pub fn execute_xor(left: &Value, right: &Value) -> Result<Value> {
    Ok(truth(match (left.is_true(), right.is_true()) {
        (Some(l), Some(r)) => Some(l ^ r),
        _ => None,
    }))
}

pub fn execute_not(v: &Value) -> Result<Value> {
    Ok(truth(v.is_true().map(|b| !b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_propagation() {
        assert_eq!(execute_and(&Value::Null, &Value::I8(0)).unwrap(), Value::I8(0));
        assert_eq!(execute_and(&Value::Null, &Value::I8(1)).unwrap(), Value::Null);
        assert_eq!(execute_or(&Value::Null, &Value::I8(1)).unwrap(), Value::I8(1));
        assert_eq!(execute_or(&Value::Null, &Value::I8(0)).unwrap(), Value::Null);
        assert_eq!(execute_xor(&Value::Null, &Value::I8(1)).unwrap(), Value::Null);
        assert_eq!(execute_not(&Value::Null).unwrap(), Value::Null);
    }
}
