//! Division. Plain `/` computes in decimal unless a float is involved;
//! `DIV` truncates toward zero and errors if the result exceeds int64.

use super::helpers::{numeric_pair, overflow, NumericPair};
use crate::error::{Error, Result};
use crate::types::data_type::DIV_SCALE_INCREMENT;
use crate::types::value::Value;
use rust_decimal::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};

pub fn execute(left: &Value, right: &Value) -> Result<Value> {
    match numeric_pair(left, right)? {
        NumericPair::Float(l, r) => {
            if r == 0.0 {
                return Err(Error::DivisionByZero);
            }
            Ok(Value::F64(l / r))
        }
        pair => {
            let (l, r) = pair_to_decimals(pair)?;
            if r.is_zero() {
                return Err(Error::DivisionByZero);
            }
            let scale = (l.scale() + DIV_SCALE_INCREMENT).min(30);
            let q = l.checked_div(r).ok_or_else(|| overflow(l))?;
            Ok(Value::Decimal(q.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)))
        }
    }
}

/// Integer division: operands are taken through decimal, the quotient is
/// truncated toward zero.
pub fn execute_int(left: &Value, right: &Value) -> Result<Value> {
    let (l, r) = match numeric_pair(left, right)? {
        NumericPair::Float(l, r) => (
            Decimal::from_f64(l).ok_or_else(|| overflow(l))?,
            Decimal::from_f64(r).ok_or_else(|| overflow(r))?,
        ),
        pair => pair_to_decimals(pair)?,
    };
    if r.is_zero() {
        return Err(Error::DivisionByZero);
    }
    let q = l.checked_div(r).ok_or_else(|| overflow(l))?.trunc();
    q.to_i64().map(Value::I64).ok_or_else(|| overflow(q))
}

fn pair_to_decimals(pair: NumericPair) -> Result<(Decimal, Decimal)> {
    match pair {
        NumericPair::Int(l, r) => Ok((Decimal::from(l), Decimal::from(r))),
        NumericPair::Uint(l, r) => Ok((
            Decimal::from_u64(l).ok_or_else(|| overflow(l))?,
            Decimal::from_u64(r).ok_or_else(|| overflow(r))?,
        )),
        NumericPair::Decimal(l, r) => Ok((l, r)),
        NumericPair::Float(..) => unreachable!("float pairs handled by callers"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_division_returns_decimal() {
        let v = execute(&Value::I64(7), &Value::I64(2)).unwrap();
        assert_eq!(v, Value::Decimal(Decimal::new(35, 1)));
    }

    #[test]
    fn div_truncates_toward_zero() {
        assert_eq!(execute_int(&Value::I64(-7), &Value::I64(2)).unwrap(), Value::I64(-3));
        assert_eq!(execute_int(&Value::F64(7.9), &Value::F64(2.0)).unwrap(), Value::I64(3));
    }

    #[test]
    fn zero_divisor_is_an_error_kind() {
        assert_eq!(execute(&Value::I64(1), &Value::I64(0)).unwrap_err(), Error::DivisionByZero);
        assert_eq!(execute_int(&Value::I64(1), &Value::I64(0)).unwrap_err(), Error::DivisionByZero);
    }
}
