//! Shared numeric classification for the arithmetic kernels.

use crate::error::{Error, Result};
use crate::types::value::Value;
use rust_decimal::Decimal;

/// The numeric domain a pair of operands computes in. Decimal wins over
/// integers, float wins over decimal, strings are parsed as doubles.
pub enum NumericPair {
    Int(i64, i64),
    Uint(u64, u64),
    Float(f64, f64),
    Decimal(Decimal, Decimal),
}

pub fn numeric_pair(left: &Value, right: &Value) -> Result<NumericPair> {
    use Value::*;
    let float = |v: &Value| matches!(v, F32(_) | F64(_) | Str(_) | Bytes(_));
    let decimal = |v: &Value| matches!(v, Value::Decimal(_));
    if float(left) || float(right) {
        return Ok(NumericPair::Float(left.to_f64()?, right.to_f64()?));
    }
    if decimal(left) || decimal(right) {
        return Ok(NumericPair::Decimal(left.to_decimal()?, right.to_decimal()?));
    }
    // Both integers. u64 math only when a value doesn't fit i64.
    match (left.to_i64(), right.to_i64()) {
        (Ok(l), Ok(r)) => Ok(NumericPair::Int(l, r)),
        _ => {
            let l = left.to_u64()?;
            let r = right.to_u64()?;
            Ok(NumericPair::Uint(l, r))
        }
    }
}

pub fn overflow<T: std::fmt::Display>(what: T) -> Error {
    Error::NumericOverflow(what.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_compute_as_floats() {
        match numeric_pair(&Value::Str("20a".into()), &Value::I64(1)).unwrap() {
            NumericPair::Float(l, r) => {
                assert_eq!(l, 20.0);
                assert_eq!(r, 1.0);
            }
            _ => panic!("expected float pair"),
        }
    }

    #[test]
    fn decimal_beats_integer() {
        match numeric_pair(&Value::Decimal(Decimal::new(15, 1)), &Value::I64(2)).unwrap() {
            NumericPair::Decimal(..) => {}
            _ => panic!("expected decimal pair"),
        }
    }
}
