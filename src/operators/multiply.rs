//! Multiplication.

use super::helpers::{numeric_pair, overflow, NumericPair};
use crate::error::Result;
use crate::types::value::Value;

pub fn execute(left: &Value, right: &Value) -> Result<Value> {
    match numeric_pair(left, right)? {
        NumericPair::Int(l, r) => l.checked_mul(r).map(Value::I64).ok_or_else(|| overflow(l)),
        NumericPair::Uint(l, r) => l.checked_mul(r).map(Value::U64).ok_or_else(|| overflow(l)),
        NumericPair::Float(l, r) => Ok(Value::F64(l * r)),
        NumericPair::Decimal(l, r) => l.checked_mul(r).map(Value::Decimal).ok_or_else(|| overflow(l)),
    }
}
