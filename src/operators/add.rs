//! Addition, including temporal + interval arithmetic.

use super::helpers::{numeric_pair, overflow, NumericPair};
use crate::error::Result;
use crate::types::data_type::Interval;
use crate::types::value::Value;
use chrono::{Duration, Months};

pub fn execute(left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Date(d), Value::Interval(i)) | (Value::Interval(i), Value::Date(d)) => {
            Ok(shift_date(*d, i, 1))
        }
        (Value::DateTime(dt), Value::Interval(i)) | (Value::Interval(i), Value::DateTime(dt)) => {
            Ok(shift_datetime(*dt, i, 1))
        }
        (Value::Interval(a), Value::Interval(b)) => Ok(Value::Interval(combine(a, b, 1))),
        _ => match numeric_pair(left, right)? {
            NumericPair::Int(l, r) => l.checked_add(r).map(Value::I64).ok_or_else(|| overflow(l)),
            NumericPair::Uint(l, r) => l.checked_add(r).map(Value::U64).ok_or_else(|| overflow(l)),
            NumericPair::Float(l, r) => Ok(Value::F64(l + r)),
            NumericPair::Decimal(l, r) => Ok(Value::Decimal(l + r)),
        },
    }
}

pub(super) fn combine(a: &Interval, b: &Interval, sign: i32) -> Interval {
    Interval {
        months: a.months + sign * b.months,
        days: a.days + sign * b.days,
        micros: a.micros + sign as i64 * b.micros,
    }
}

pub(crate) fn shift_date(d: chrono::NaiveDate, i: &Interval, sign: i32) -> Value {
    let with_months = if i.months * sign >= 0 {
        d.checked_add_months(Months::new((i.months * sign) as u32))
    } else {
        d.checked_sub_months(Months::new((-(i.months * sign)) as u32))
    };
    let Some(d) = with_months else { return Value::Null };
    let d = d + Duration::days((i.days * sign) as i64);
    if i.micros != 0 {
        let dt = d.and_hms_opt(0, 0, 0).unwrap() + Duration::microseconds(i.micros * sign as i64);
        Value::DateTime(dt)
    } else {
        Value::Date(d)
    }
}

pub(crate) fn shift_datetime(dt: chrono::NaiveDateTime, i: &Interval, sign: i32) -> Value {
    let with_months = if i.months * sign >= 0 {
        dt.checked_add_months(Months::new((i.months * sign) as u32))
    } else {
        dt.checked_sub_months(Months::new((-(i.months * sign)) as u32))
    };
    let Some(dt) = with_months else { return Value::Null };
    let dt = dt + Duration::days((i.days * sign) as i64) + Duration::microseconds(i.micros * sign as i64);
    Value::DateTime(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn integer_overflow_errors() {
        assert!(execute(&Value::I64(i64::MAX), &Value::I64(1)).is_err());
    }

    #[test]
    fn string_addition_is_numeric() {
        assert_eq!(execute(&Value::Str("1".into()), &Value::Str("2".into())).unwrap(), Value::F64(3.0));
    }

    #[test]
    fn date_plus_month_interval() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let i = Interval { months: 1, days: 0, micros: 0 };
        assert_eq!(
            execute(&Value::Date(d), &Value::Interval(i)).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
    }
}
