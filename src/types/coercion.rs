//! Type coercion rules for arithmetic and comparison.
//!
//! Arithmetic promotion: decimal beats integer, float beats decimal,
//! strings count as doubles. Comparison between families follows MySQL:
//! number vs. string compares numerically, date vs. string as dates,
//! decimal vs. float as double.

use crate::types::data_type::{Collation, DataType, DIV_SCALE_INCREMENT};
use crate::types::expression::ArithOp;

fn scale_of(t: &DataType) -> u8 {
    match t {
        DataType::Decimal { scale, .. } => *scale,
        _ => 0,
    }
}

fn unsigned_result(l: &DataType, r: &DataType) -> bool {
    l.is_unsigned() || r.is_unsigned()
}

/// The result type of a binary arithmetic expression.
pub fn arithmetic_result_type(op: ArithOp, l: &DataType, r: &DataType) -> DataType {
    if op.is_bitwise() {
        return DataType::ubigint();
    }
    match op {
        ArithOp::IntDivide => DataType::BigInt { unsigned: unsigned_result(l, r) },
        ArithOp::Divide => {
            if l.is_float() || r.is_float() || l.is_text() || r.is_text() {
                DataType::Double
            } else {
                let scale = (scale_of(l) as u32 + DIV_SCALE_INCREMENT).min(30) as u8;
                DataType::Decimal { precision: 65, scale }
            }
        }
        ArithOp::Add | ArithOp::Subtract | ArithOp::Multiply | ArithOp::Modulo => {
            // Date arithmetic with intervals keeps the temporal type.
            if *r == DataType::Interval && l.is_temporal() {
                return l.clone();
            }
            if *l == DataType::Interval && r.is_temporal() {
                return r.clone();
            }
            if l.is_float() || r.is_float() || l.is_text() || r.is_text() {
                DataType::Double
            } else if l.is_decimal() || r.is_decimal() {
                let scale = match op {
                    ArithOp::Multiply => (scale_of(l) as u32 + scale_of(r) as u32).min(30) as u8,
                    _ => scale_of(l).max(scale_of(r)),
                };
                DataType::Decimal { precision: 65, scale }
            } else {
                DataType::BigInt { unsigned: unsigned_result(l, r) }
            }
        }
        _ => DataType::bigint(),
    }
}

/// The common type two expressions unify to, used by CASE branches, union
/// columns and COALESCE.
pub fn common_type(a: &DataType, b: &DataType) -> DataType {
    if a == b {
        return a.clone();
    }
    match (a, b) {
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),
        (x, y) if x.is_integer() && y.is_integer() => DataType::BigInt { unsigned: x.is_unsigned() && y.is_unsigned() },
        (x, y) if x.is_numeric() && y.is_numeric() => {
            if x.is_float() || y.is_float() {
                DataType::Double
            } else {
                let scale = scale_of(x).max(scale_of(y));
                DataType::Decimal { precision: 65, scale }
            }
        }
        (x, y) if x.is_temporal() && y.is_temporal() => DataType::Datetime,
        (DataType::Json, _) | (_, DataType::Json) => DataType::Json,
        _ => DataType::text(),
    }
}

/// The type a comparison between two operand types executes under. Returns
/// the type whose `compare` is used after converting both sides.
pub fn comparison_type(l: &DataType, r: &DataType) -> DataType {
    if l == r {
        return l.clone();
    }
    match (l, r) {
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),
        (DataType::Tuple(n), _) | (_, DataType::Tuple(n)) => DataType::Tuple(*n),
        (DataType::Json, _) | (_, DataType::Json) => DataType::Json,

        // decimal vs. float compares as double
        (x, y) if x.is_decimal() && y.is_float() => DataType::Double,
        (x, y) if x.is_float() && y.is_decimal() => DataType::Double,
        (x, y) if x.is_numeric() && y.is_numeric() => {
            if x.is_float() || y.is_float() {
                DataType::Double
            } else if x.is_decimal() || y.is_decimal() {
                DataType::Decimal { precision: 65, scale: scale_of(x).max(scale_of(y)) }
            } else {
                DataType::BigInt { unsigned: x.is_unsigned() && y.is_unsigned() }
            }
        }

        // date vs. string compares as the temporal type
        (x, y) if x.is_temporal() && (y.is_text() || y.is_binary()) => x.clone(),
        (x, y) if y.is_temporal() && (x.is_text() || x.is_binary()) => y.clone(),
        (x, y) if x.is_temporal() && y.is_temporal() => DataType::Datetime,

        // number vs. string compares numerically
        (x, y) if x.is_numeric() && (y.is_text() || y.is_binary()) => DataType::Double,
        (x, y) if y.is_numeric() && (x.is_text() || x.is_binary()) => DataType::Double,

        (x, y) if x.is_text() && y.is_text() => {
            let collation = x.collation().or(y.collation()).unwrap_or(Collation::default());
            DataType::Text { collation }
        }
        _ => DataType::text(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn division_widens_decimal_scale() {
        let t = arithmetic_result_type(
            ArithOp::Divide,
            &DataType::Decimal { precision: 10, scale: 2 },
            &DataType::bigint(),
        );
        assert_eq!(t, DataType::Decimal { precision: 65, scale: 6 });
    }

    #[test]
    fn multiply_adds_scales() {
        let t = arithmetic_result_type(
            ArithOp::Multiply,
            &DataType::Decimal { precision: 10, scale: 2 },
            &DataType::Decimal { precision: 10, scale: 3 },
        );
        assert_eq!(t, DataType::Decimal { precision: 65, scale: 5 });
    }

    #[test]
    fn float_wins_arithmetic() {
        let t = arithmetic_result_type(ArithOp::Add, &DataType::Float, &DataType::Decimal { precision: 5, scale: 1 });
        assert_eq!(t, DataType::Double);
    }

    #[test]
    fn bitwise_coerces_to_unsigned_bigint() {
        let t = arithmetic_result_type(ArithOp::BitAnd, &DataType::int(), &DataType::text());
        assert_eq!(t, DataType::ubigint());
    }

    #[test]
    fn comparison_families() {
        assert_eq!(comparison_type(&DataType::int(), &DataType::text()), DataType::Double);
        assert_eq!(comparison_type(&DataType::Date, &DataType::text()), DataType::Date);
        assert_eq!(
            comparison_type(&DataType::Decimal { precision: 5, scale: 2 }, &DataType::Double),
            DataType::Double
        );
    }
}
