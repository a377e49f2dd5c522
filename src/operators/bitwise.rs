//! Bit operators. Both sides coerce to u64; negative values wrap, matching
//! MySQL's BIGINT UNSIGNED bit semantics.

use crate::error::Result;
use crate::types::expression::ArithOp;
use crate::types::value::Value;

pub fn execute(op: ArithOp, left: &Value, right: &Value) -> Result<Value> {
    let l = coerce(left)?;
    let r = coerce(right)?;
    let out = match op {
        ArithOp::BitAnd => l & r,
        ArithOp::BitOr => l | r,
        ArithOp::BitXor => l ^ r,
        ArithOp::ShiftLeft => {
            if r >= 64 {
                0
            } else {
                l.wrapping_shl(r as u32)
            }
        }
        ArithOp::ShiftRight => {
            if r >= 64 {
                0
            } else {
                l.wrapping_shr(r as u32)
            }
        }
        _ => unreachable!("non-bitwise op dispatched to bitwise kernel"),
    };
    Ok(Value::U64(out))
}

fn coerce(v: &Value) -> Result<u64> {
    match v {
        Value::F32(f) => Ok((*f as f64).round() as i64 as u64),
        Value::F64(f) => Ok(f.round() as i64 as u64),
        Value::Str(s) => Ok(crate::types::data_type::numeric_prefix(s).round() as i64 as u64),
        other => other.to_u64(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negatives_wrap() {
        assert_eq!(execute(ArithOp::BitAnd, &Value::I64(-1), &Value::U64(0xff)).unwrap(), Value::U64(0xff));
    }

    #[test]
    fn oversized_shift_zeroes() {
        assert_eq!(execute(ArithOp::ShiftLeft, &Value::I64(1), &Value::I64(64)).unwrap(), Value::U64(0));
    }
}
