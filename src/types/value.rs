//! Dynamic SQL values.
//!
//! A `Value` is one nullable cell. Equality and ordering between values of
//! the same family go through the natural comparisons here; typed
//! comparisons with collation or JSON precedence go through
//! `DataType::compare`.

use crate::error::{Error, Result};
use crate::types::data_type::{numeric_prefix, DataType, Interval};
use crate::types::spatial::Geometry;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

/// A row of values, shape fixed by a Schema.
pub type Row = Vec<Value>;

#[derive(Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Str(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Year(u16),
    Json(serde_json::Value),
    Geometry(Geometry),
    Interval(Interval),
    Tuple(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Value::I8(_)
                | Value::I16(_)
                | Value::I32(_)
                | Value::I64(_)
                | Value::U8(_)
                | Value::U16(_)
                | Value::U32(_)
                | Value::U64(_)
                | Value::Year(_)
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, Value::F32(_) | Value::F64(_) | Value::Decimal(_))
    }

    /// The narrowest data type that holds this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::I8(_) => DataType::TinyInt { unsigned: false },
            Value::I16(_) => DataType::SmallInt { unsigned: false },
            Value::I32(_) => DataType::Int { unsigned: false },
            Value::I64(_) => DataType::BigInt { unsigned: false },
            Value::U8(_) => DataType::TinyInt { unsigned: true },
            Value::U16(_) => DataType::SmallInt { unsigned: true },
            Value::U32(_) => DataType::Int { unsigned: true },
            Value::U64(_) => DataType::BigInt { unsigned: true },
            Value::F32(_) => DataType::Float,
            Value::F64(_) => DataType::Double,
            Value::Decimal(d) => DataType::Decimal { precision: 65, scale: d.scale().min(30) as u8 },
            Value::Str(_) => DataType::text(),
            Value::Bytes(_) => DataType::Blob,
            Value::Date(_) => DataType::Date,
            Value::Time(_) => DataType::Time,
            Value::DateTime(_) => DataType::Datetime,
            Value::Year(_) => DataType::Year,
            Value::Json(_) => DataType::Json,
            Value::Geometry(g) => DataType::Spatial { class: g.class(), srid: g.srid },
            Value::Interval(_) => DataType::Interval,
            Value::Tuple(vs) => DataType::Tuple(vs.len()),
        }
    }

    pub fn to_i64(&self) -> Result<i64> {
        match self {
            Value::I8(n) => Ok(*n as i64),
            Value::I16(n) => Ok(*n as i64),
            Value::I32(n) => Ok(*n as i64),
            Value::I64(n) => Ok(*n),
            Value::U8(n) => Ok(*n as i64),
            Value::U16(n) => Ok(*n as i64),
            Value::U32(n) => Ok(*n as i64),
            Value::Year(n) => Ok(*n as i64),
            Value::U64(n) => i64::try_from(*n).map_err(|_| Error::NumericOverflow(n.to_string())),
            Value::F32(f) => Ok(f.round() as i64),
            Value::F64(f) => Ok(f.round() as i64),
            Value::Decimal(d) => d
                .round()
                .to_i64()
                .ok_or_else(|| Error::NumericOverflow(d.to_string())),
            Value::Str(s) => Ok(numeric_prefix(s).round() as i64),
            other => Err(Error::ConvertError { value: other.to_string(), to: "BIGINT".into() }),
        }
    }

    pub fn to_u64(&self) -> Result<u64> {
        match self {
            Value::U64(n) => Ok(*n),
            Value::U8(n) => Ok(*n as u64),
            Value::U16(n) => Ok(*n as u64),
            Value::U32(n) => Ok(*n as u64),
            // Negative signed values wrap, matching MySQL's bit-op coercion.
            other => Ok(other.to_i64()? as u64),
        }
    }

    pub fn to_f64(&self) -> Result<f64> {
        match self {
            Value::F32(f) => Ok(*f as f64),
            Value::F64(f) => Ok(*f),
            Value::Decimal(d) => d.to_f64().ok_or_else(|| Error::NumericOverflow(d.to_string())),
            Value::Str(s) => Ok(numeric_prefix(s)),
            Value::Null => Ok(0.0),
            other if other.is_integer() => Ok(other.to_i64().map(|n| n as f64).unwrap_or_else(|_| {
                // u64 values above i64::MAX
                if let Value::U64(n) = other {
                    *n as f64
                } else {
                    0.0
                }
            })),
            other => Err(Error::ConvertError { value: other.to_string(), to: "DOUBLE".into() }),
        }
    }

    pub fn to_decimal(&self) -> Result<Decimal> {
        match self {
            Value::Decimal(d) => Ok(*d),
            Value::F32(f) => Decimal::from_f32(*f).ok_or_else(|| Error::NumericOverflow(f.to_string())),
            Value::F64(f) => Decimal::from_f64(*f).ok_or_else(|| Error::NumericOverflow(f.to_string())),
            Value::U64(n) => Decimal::from_u64(*n).ok_or_else(|| Error::NumericOverflow(n.to_string())),
            Value::Str(s) => Ok(Decimal::from_f64(numeric_prefix(s)).unwrap_or(Decimal::ZERO)),
            other if other.is_integer() => {
                Decimal::from_i64(other.to_i64()?).ok_or_else(|| Error::NumericOverflow(other.to_string()))
            }
            other => Err(Error::ConvertError { value: other.to_string(), to: "DECIMAL".into() }),
        }
    }

    /// MySQL boolean context: non-zero numeric or non-zero numeric-parse of
    /// a string. `None` for NULL.
    pub fn is_true(&self) -> Option<bool> {
        match self {
            Value::Null => None,
            Value::Str(s) => Some(numeric_prefix(s) != 0.0),
            Value::F32(f) => Some(*f != 0.0 && !f.is_nan()),
            Value::F64(f) => Some(*f != 0.0 && !f.is_nan()),
            Value::Decimal(d) => Some(!d.is_zero()),
            other if other.is_integer() => Some(other.to_u64().map(|n| n != 0).unwrap_or(true)),
            _ => Some(true),
        }
    }

    /// The MySQL text serialization of the value, without quoting.
    pub fn into_text(self) -> Result<String> {
        Ok(match self {
            Value::Str(s) => s,
            Value::Bytes(b) => String::from_utf8_lossy(&b).into_owned(),
            Value::Json(j) => crate::types::json::to_mysql_string(&j),
            Value::Null => return Err(Error::ConvertError { value: "NULL".into(), to: "text".into() }),
            other => other.to_string(),
        })
    }

    pub fn as_str_lossy(&self) -> Cow<'_, str> {
        match self {
            Value::Str(s) => Cow::Borrowed(s),
            Value::Bytes(b) => String::from_utf8_lossy(b),
            other => Cow::Owned(other.to_string()),
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Value::Bytes(b) => Ok(b),
            Value::Str(s) => Ok(s.into_bytes()),
            other => Ok(other.to_string().into_bytes()),
        }
    }

    /// The `<=>` law: NULL<=>NULL is true, x<=>NULL is false, otherwise
    /// ordinary typed equality.
    pub fn null_safe_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.null_safe_eq(y))
            }
            (a, b) => a == b,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal && !(self.is_null() ^ other.is_null())
    }
}

impl Eq for Value {}

impl Ord for Value {
    /// Total order for sort purposes: NULL sorts before everything, numeric
    /// families compare across widths, everything else compares within its
    /// own family and falls back to type tag order across families.
    fn cmp(&self, other: &Self) -> Ordering {
        use Value::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,

            (a, b) if a.is_integer() && b.is_integer() => match (a, b) {
                (U64(x), U64(y)) => x.cmp(y),
                (U64(x), y) => match y.to_i64() {
                    Ok(y) if y < 0 => Ordering::Greater,
                    Ok(y) => x.cmp(&(y as u64)),
                    Err(_) => Ordering::Equal,
                },
                (x, U64(y)) => match x.to_i64() {
                    Ok(x) if x < 0 => Ordering::Less,
                    Ok(x) => (x as u64).cmp(y),
                    Err(_) => Ordering::Equal,
                },
                (x, y) => x.to_i64().unwrap_or(0).cmp(&y.to_i64().unwrap_or(0)),
            },
            (a, b) if a.is_numeric() && b.is_numeric() => {
                if let (Value::Decimal(x), Value::Decimal(y)) = (a, b) {
                    x.cmp(y)
                } else {
                    a.to_f64()
                        .unwrap_or(f64::NAN)
                        .partial_cmp(&b.to_f64().unwrap_or(f64::NAN))
                        .unwrap_or(Ordering::Equal)
                }
            }

            (Str(a), Str(b)) => a.cmp(b),
            (Bytes(a), Bytes(b)) => a.cmp(b),
            (Str(a), Bytes(b)) => a.as_bytes().cmp(b.as_slice()),
            (Bytes(a), Str(b)) => a.as_slice().cmp(b.as_bytes()),

            (Date(a), Date(b)) => a.cmp(b),
            (Time(a), Time(b)) => a.cmp(b),
            (DateTime(a), DateTime(b)) => a.cmp(b),
            (Date(a), DateTime(b)) => a.and_hms_opt(0, 0, 0).unwrap().cmp(b),
            (DateTime(a), Date(b)) => a.cmp(&b.and_hms_opt(0, 0, 0).unwrap()),

            (Json(a), Json(b)) => crate::types::json::compare(a, b),
            (Value::Interval(a), Value::Interval(b)) => {
                (a.months, a.days, a.micros).cmp(&(b.months, b.days, b.micros))
            }
            (Value::Geometry(a), Value::Geometry(b)) => a.cmp(b),
            (Tuple(a), Tuple(b)) => a.cmp(b),

            // Numbers compare to strings numerically.
            (a, Str(s)) if a.is_numeric() => a
                .to_f64()
                .unwrap_or(f64::NAN)
                .partial_cmp(&numeric_prefix(s))
                .unwrap_or(Ordering::Equal),
            (Str(s), b) if b.is_numeric() => numeric_prefix(s)
                .partial_cmp(&b.to_f64().unwrap_or(f64::NAN))
                .unwrap_or(Ordering::Equal),

            (a, b) => a.type_tag().cmp(&b.type_tag()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Value {
    fn type_tag(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::I8(_) | Value::I16(_) | Value::I32(_) | Value::I64(_) => 1,
            Value::U8(_) | Value::U16(_) | Value::U32(_) | Value::U64(_) | Value::Year(_) => 2,
            Value::F32(_) | Value::F64(_) => 3,
            Value::Decimal(_) => 4,
            Value::Str(_) => 5,
            Value::Bytes(_) => 6,
            Value::Date(_) => 7,
            Value::Time(_) => 8,
            Value::DateTime(_) => 9,
            Value::Json(_) => 10,
            Value::Geometry(_) => 11,
            Value::Interval(_) => 12,
            Value::Tuple(_) => 13,
        }
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0u8.hash(state),
            // All integers hash by widened value so cross-width equality holds.
            v if v.is_integer() => match v.to_i64() {
                Ok(n) => n.hash(state),
                Err(_) => {
                    if let Value::U64(n) = v {
                        n.hash(state)
                    }
                }
            },
            Value::F32(f) => (*f as f64).to_bits().hash(state),
            Value::F64(f) => f.to_bits().hash(state),
            Value::Decimal(d) => d.normalize().hash(state),
            Value::Str(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::Date(d) => d.hash(state),
            Value::Time(t) => t.hash(state),
            Value::DateTime(dt) => dt.hash(state),
            Value::Json(j) => crate::types::json::to_mysql_string(j).hash(state),
            Value::Geometry(g) => g.hash(state),
            Value::Interval(i) => (i.months, i.days, i.micros).hash(state),
            Value::Tuple(vs) => {
                for v in vs {
                    v.hash(state);
                }
            }
            _ => unreachable!(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::I8(n) => write!(f, "{}", n),
            Value::I16(n) => write!(f, "{}", n),
            Value::I32(n) => write!(f, "{}", n),
            Value::I64(n) => write!(f, "{}", n),
            Value::U8(n) => write!(f, "{}", n),
            Value::U16(n) => write!(f, "{}", n),
            Value::U32(n) => write!(f, "{}", n),
            Value::U64(n) => write!(f, "{}", n),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "x'{}'", hex::encode(b)),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::Year(y) => write!(f, "{:04}", y),
            Value::Json(j) => write!(f, "{}", crate::types::json::to_mysql_string(j)),
            Value::Geometry(g) => write!(f, "{}", g),
            Value::Interval(i) => write!(f, "{}", i),
            Value::Tuple(vs) => {
                write!(f, "(")?;
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Decimal(d) => write!(f, "Decimal({})", d),
            Value::Json(j) => write!(f, "Json({})", crate::types::json::to_mysql_string(j)),
            Value::Tuple(vs) => f.debug_list().entries(vs.iter()).finish(),
            other => write!(f, "{}({})", variant_name(other), other),
        }
    }
}

fn variant_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "Null",
        Value::I8(_) => "I8",
        Value::I16(_) => "I16",
        Value::I32(_) => "I32",
        Value::I64(_) => "I64",
        Value::U8(_) => "U8",
        Value::U16(_) => "U16",
        Value::U32(_) => "U32",
        Value::U64(_) => "U64",
        Value::F32(_) => "F32",
        Value::F64(_) => "F64",
        Value::Decimal(_) => "Decimal",
        Value::Str(_) => "Str",
        Value::Bytes(_) => "Bytes",
        Value::Date(_) => "Date",
        Value::Time(_) => "Time",
        Value::DateTime(_) => "DateTime",
        Value::Year(_) => "Year",
        Value::Json(_) => "Json",
        Value::Geometry(_) => "Geometry",
        Value::Interval(_) => "Interval",
        Value::Tuple(_) => "Tuple",
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::I64(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::F64(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sorts_first() {
        let mut vals = vec![Value::I64(2), Value::Null, Value::I64(1)];
        vals.sort();
        assert_eq!(vals, vec![Value::Null, Value::I64(1), Value::I64(2)]);
    }

    #[test]
    fn cross_width_integer_equality() {
        assert_eq!(Value::I8(5), Value::I64(5));
        assert_eq!(Value::U32(5), Value::I64(5));
        assert!(Value::U64(u64::MAX) > Value::I64(-1));
    }

    #[test]
    fn null_safe_equality() {
        assert!(Value::Null.null_safe_eq(&Value::Null));
        assert!(!Value::I64(1).null_safe_eq(&Value::Null));
        assert!(Value::I64(1).null_safe_eq(&Value::I64(1)));
    }

    #[test]
    fn boolean_context() {
        assert_eq!(Value::Str("1abc".into()).is_true(), Some(true));
        assert_eq!(Value::Str("abc".into()).is_true(), Some(false));
        assert_eq!(Value::I64(0).is_true(), Some(false));
        assert_eq!(Value::Null.is_true(), None);
    }

    #[test]
    fn number_string_comparison_is_numeric() {
        assert_eq!(Value::I64(20).cmp(&Value::Str("20a".into())), Ordering::Equal);
        assert_eq!(Value::Str("20".into()).cmp(&Value::I64(100)), Ordering::Less);
    }
}
