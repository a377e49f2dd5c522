//! Typed comparison. Operands are coerced to a common comparison type per
//! MySQL's rules, then compared with that type's comparator.

use crate::error::Result;
use crate::types::coercion::comparison_type;
use crate::types::expression::CmpOp;
use crate::types::value::Value;
use std::cmp::Ordering;

/// Compares two values under comparison coercion. `None` when either side
/// is NULL.
pub fn compare_values(left: &Value, right: &Value) -> Result<Option<Ordering>> {
    if left.is_null() || right.is_null() {
        return Ok(None);
    }
    let t = comparison_type(&left.data_type(), &right.data_type());
    t.compare(left, right).map(Some)
}

/// Evaluates a comparison operator to I8(0/1) or NULL. `<=>` never returns
/// NULL.
pub fn execute_compare(op: CmpOp, left: &Value, right: &Value) -> Result<Value> {
    if op == CmpOp::NullSafeEq {
        let eq = match (left.is_null(), right.is_null()) {
            (true, true) => true,
            (true, false) | (false, true) => false,
            (false, false) => compare_values(left, right)?.map(|o| o == Ordering::Equal).unwrap_or(false),
        };
        return Ok(Value::I8(eq as i8));
    }
    let Some(ord) = compare_values(left, right)? else {
        return Ok(Value::Null);
    };
    let result = match op {
        CmpOp::Eq => ord == Ordering::Equal,
        CmpOp::NotEq => ord != Ordering::Equal,
        CmpOp::Lt => ord == Ordering::Less,
        CmpOp::LtEq => ord != Ordering::Greater,
        CmpOp::Gt => ord == Ordering::Greater,
        CmpOp::GtEq => ord != Ordering::Less,
        CmpOp::NullSafeEq => unreachable!(),
    };
    Ok(Value::I8(result as i8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_vs_string_compares_numerically() {
        assert_eq!(execute_compare(CmpOp::Eq, &Value::I64(20), &Value::Str("20a".into())).unwrap(), Value::I8(1));
    }

    #[test]
    fn null_comparison_is_null_except_spaceship() {
        assert_eq!(execute_compare(CmpOp::Eq, &Value::I64(1), &Value::Null).unwrap(), Value::Null);
        assert_eq!(execute_compare(CmpOp::NullSafeEq, &Value::Null, &Value::Null).unwrap(), Value::I8(1));
        assert_eq!(execute_compare(CmpOp::NullSafeEq, &Value::I64(1), &Value::Null).unwrap(), Value::I8(0));
    }

    #[test]
    fn date_vs_string() {
        let d = Value::Date(chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(execute_compare(CmpOp::Eq, &d, &Value::Str("2024-03-01".into())).unwrap(), Value::I8(1));
    }
}
