//! The `%` / MOD operator.

use super::helpers::{numeric_pair, overflow, NumericPair};
use crate::error::{Error, Result};
use crate::types::value::Value;

pub fn execute(left: &Value, right: &Value) -> Result<Value> {
    match numeric_pair(left, right)? {
        NumericPair::Int(l, r) => {
            if r == 0 {
                return Err(Error::DivisionByZero);
            }
            l.checked_rem(r).map(Value::I64).ok_or_else(|| overflow(l))
        }
        NumericPair::Uint(l, r) => {
            if r == 0 {
                return Err(Error::DivisionByZero);
            }
            Ok(Value::U64(l % r))
        }
        NumericPair::Float(l, r) => {
            if r == 0.0 {
                return Err(Error::DivisionByZero);
            }
            Ok(Value::F64(l % r))
        }
        NumericPair::Decimal(l, r) => {
            if r.is_zero() {
                return Err(Error::DivisionByZero);
            }
            l.checked_rem(r).map(Value::Decimal).ok_or_else(|| overflow(l))
        }
    }
}
