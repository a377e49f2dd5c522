//! Subtraction, including temporal - interval and date difference.

use super::add::{shift_date, shift_datetime};
use super::helpers::{numeric_pair, overflow, NumericPair};
use crate::error::Result;
use crate::types::value::Value;

pub fn execute(left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Date(d), Value::Interval(i)) => Ok(shift_date(*d, i, -1)),
        (Value::DateTime(dt), Value::Interval(i)) => Ok(shift_datetime(*dt, i, -1)),
        (Value::Date(a), Value::Date(b)) => Ok(Value::I64((*a - *b).num_days())),
        _ => match numeric_pair(left, right)? {
            NumericPair::Int(l, r) => l.checked_sub(r).map(Value::I64).ok_or_else(|| overflow(l)),
            NumericPair::Uint(l, r) => {
                // Unsigned subtraction that dips below zero errors, as MySQL
                // does outside of NO_UNSIGNED_SUBTRACTION.
                l.checked_sub(r).map(Value::U64).ok_or_else(|| overflow(l))
            }
            NumericPair::Float(l, r) => Ok(Value::F64(l - r)),
            NumericPair::Decimal(l, r) => Ok(Value::Decimal(l - r)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_underflow_errors() {
        assert!(execute(&Value::U64(1), &Value::U64(2)).is_err());
        assert_eq!(execute(&Value::I64(1), &Value::I64(2)).unwrap(), Value::I64(-1));
    }
}
