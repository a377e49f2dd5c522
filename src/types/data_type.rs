//! The closed family of SQL data types.
//!
//! Every type knows how to compare, convert, promote and zero its values.
//! Conversion follows MySQL's rules, including the leading-digit parse for
//! strings (`'20a'` converts to 20, `'a'` to 0).

use crate::error::{Error, Result};
use crate::types::spatial::Geometry;
use crate::types::value::Value;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Scale added to the left operand's scale on every decimal division.
pub const DIV_SCALE_INCREMENT: u32 = 4;

/// String collation. The engine carries the two collations the MySQL 8.0
/// surface defaults between; `utf8mb4_0900_bin` is the engine default and is
/// case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Collation {
    #[default]
    Utf8mb4Bin,
    Utf8mb4AiCi,
}

impl Collation {
    pub fn name(&self) -> &'static str {
        match self {
            Collation::Utf8mb4Bin => "utf8mb4_0900_bin",
            Collation::Utf8mb4AiCi => "utf8mb4_0900_ai_ci",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "utf8mb4_0900_bin" | "binary" => Some(Collation::Utf8mb4Bin),
            "utf8mb4_0900_ai_ci" | "utf8mb4_general_ci" => Some(Collation::Utf8mb4AiCi),
            _ => None,
        }
    }

    pub fn case_sensitive(&self) -> bool {
        matches!(self, Collation::Utf8mb4Bin)
    }

    /// Compares two strings under this collation.
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        if self.case_sensitive() {
            a.cmp(b)
        } else {
            a.to_lowercase().cmp(&b.to_lowercase())
        }
    }

    pub fn equals(&self, a: &str, b: &str) -> bool {
        self.compare(a, b) == Ordering::Equal
    }
}

/// Spatial type class. All spatial values carry an SRID alongside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpatialClass {
    Geometry,
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl SpatialClass {
    pub fn name(&self) -> &'static str {
        match self {
            SpatialClass::Geometry => "geometry",
            SpatialClass::Point => "point",
            SpatialClass::LineString => "linestring",
            SpatialClass::Polygon => "polygon",
            SpatialClass::MultiPoint => "multipoint",
            SpatialClass::MultiLineString => "multilinestring",
            SpatialClass::MultiPolygon => "multipolygon",
            SpatialClass::GeometryCollection => "geomcollection",
        }
    }
}

/// A calendar interval, used by date arithmetic and the INTERVAL expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Interval {
    pub months: i32,
    pub days: i32,
    pub micros: i64,
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "INTERVAL {} months {} days {} microseconds",
            self.months, self.days, self.micros
        )
    }
}

/// Units accepted by `INTERVAL n unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntervalUnit {
    Microsecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl IntervalUnit {
    pub fn to_interval(&self, n: i64) -> Interval {
        match self {
            IntervalUnit::Microsecond => Interval { months: 0, days: 0, micros: n },
            IntervalUnit::Second => Interval { months: 0, days: 0, micros: n * 1_000_000 },
            IntervalUnit::Minute => Interval { months: 0, days: 0, micros: n * 60_000_000 },
            IntervalUnit::Hour => Interval { months: 0, days: 0, micros: n * 3_600_000_000 },
            IntervalUnit::Day => Interval { months: 0, days: n as i32, micros: 0 },
            IntervalUnit::Week => Interval { months: 0, days: n as i32 * 7, micros: 0 },
            IntervalUnit::Month => Interval { months: n as i32, days: 0, micros: 0 },
            IntervalUnit::Quarter => Interval { months: n as i32 * 3, days: 0, micros: 0 },
            IntervalUnit::Year => Interval { months: n as i32 * 12, days: 0, micros: 0 },
        }
    }
}

/// SQL data types. A column or expression has exactly one of these; the
/// parameters (length, precision, collation, SRID, members) take part in
/// type equality, so `ENUM('a','b')` is not `ENUM('a','b','c')`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// The type of the NULL literal before coercion pins it down.
    Null,
    TinyInt { unsigned: bool },
    SmallInt { unsigned: bool },
    MediumInt { unsigned: bool },
    Int { unsigned: bool },
    BigInt { unsigned: bool },
    Float,
    Double,
    Decimal { precision: u8, scale: u8 },
    Char { length: u16, collation: Collation },
    Varchar { length: u16, collation: Collation },
    Text { collation: Collation },
    Binary { length: u16 },
    Varbinary { length: u16 },
    Blob,
    Date,
    Time,
    Datetime,
    Timestamp,
    Year,
    Json,
    Enum { values: Vec<String>, collation: Collation },
    Set { values: Vec<String>, collation: Collation },
    Spatial { class: SpatialClass, srid: u32 },
    Interval,
    /// Row value with a fixed column count; only occurs inside expressions.
    Tuple(usize),
}

impl DataType {
    pub fn bigint() -> DataType {
        DataType::BigInt { unsigned: false }
    }

    pub fn ubigint() -> DataType {
        DataType::BigInt { unsigned: true }
    }

    pub fn int() -> DataType {
        DataType::Int { unsigned: false }
    }

    pub fn text() -> DataType {
        DataType::Text { collation: Collation::default() }
    }

    pub fn varchar(length: u16) -> DataType {
        DataType::Varchar { length, collation: Collation::default() }
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, DataType::Float | DataType::Double | DataType::Decimal { .. })
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::TinyInt { .. }
                | DataType::SmallInt { .. }
                | DataType::MediumInt { .. }
                | DataType::Int { .. }
                | DataType::BigInt { .. }
                | DataType::Year
        )
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            DataType::TinyInt { unsigned: true }
                | DataType::SmallInt { unsigned: true }
                | DataType::MediumInt { unsigned: true }
                | DataType::Int { unsigned: true }
                | DataType::BigInt { unsigned: true }
                | DataType::Year
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float | DataType::Double)
    }

    pub fn is_decimal(&self) -> bool {
        matches!(self, DataType::Decimal { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(
            self,
            DataType::Char { .. } | DataType::Varchar { .. } | DataType::Text { .. } | DataType::Enum { .. } | DataType::Set { .. }
        )
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, DataType::Binary { .. } | DataType::Varbinary { .. } | DataType::Blob)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            DataType::Date | DataType::Time | DataType::Datetime | DataType::Timestamp | DataType::Year
        )
    }

    pub fn is_spatial(&self) -> bool {
        matches!(self, DataType::Spatial { .. })
    }

    pub fn collation(&self) -> Option<Collation> {
        match self {
            DataType::Char { collation, .. }
            | DataType::Varchar { collation, .. }
            | DataType::Text { collation }
            | DataType::Enum { collation, .. }
            | DataType::Set { collation, .. } => Some(*collation),
            _ => None,
        }
    }

    /// Widens to the largest representative of the same family. Arithmetic
    /// and aggregation work over promoted types.
    pub fn promote(&self) -> DataType {
        match self {
            t if t.is_integer() => DataType::BigInt { unsigned: t.is_unsigned() },
            DataType::Float | DataType::Double => DataType::Double,
            DataType::Char { collation, .. } | DataType::Varchar { collation, .. } | DataType::Text { collation } => {
                DataType::Text { collation: *collation }
            }
            DataType::Binary { .. } | DataType::Varbinary { .. } | DataType::Blob => DataType::Blob,
            other => other.clone(),
        }
    }

    /// The zero value of the type, used for padding and defaults.
    pub fn zero(&self) -> Value {
        match self {
            DataType::Null => Value::Null,
            t if t.is_integer() && !t.is_unsigned() => Value::I64(0),
            DataType::Year => Value::Year(0),
            t if t.is_integer() => Value::U64(0),
            DataType::Float => Value::F32(0.0),
            DataType::Double => Value::F64(0.0),
            DataType::Decimal { .. } => Value::Decimal(Decimal::ZERO),
            t if t.is_text() => Value::Str(String::new()),
            t if t.is_binary() => Value::Bytes(Vec::new()),
            DataType::Date => Value::Date(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()),
            DataType::Time => Value::Time(NaiveTime::from_hms_opt(0, 0, 0).unwrap()),
            DataType::Datetime | DataType::Timestamp => Value::DateTime(
                NaiveDate::from_ymd_opt(2000, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            ),
            DataType::Json => Value::Json(serde_json::Value::Null),
            DataType::Spatial { srid, .. } => Value::Geometry(Geometry::point(*srid, 0.0, 0.0)),
            DataType::Interval => Value::Interval(Interval::default()),
            DataType::Tuple(n) => Value::Tuple(vec![Value::Null; *n]),
            _ => unreachable!("DataType::zero: all variants covered by guards above"),
        }
    }

    /// Maximum number of bytes the text form of a value of this type needs.
    pub fn max_text_length(&self) -> u32 {
        match self {
            DataType::Null => 4,
            DataType::TinyInt { .. } => 4,
            DataType::SmallInt { .. } => 6,
            DataType::MediumInt { .. } => 9,
            DataType::Int { .. } => 11,
            DataType::BigInt { .. } => 20,
            DataType::Float => 12,
            DataType::Double => 22,
            DataType::Decimal { precision, .. } => *precision as u32 + 2,
            DataType::Char { length, .. } | DataType::Varchar { length, .. } => *length as u32 * 4,
            DataType::Text { .. } | DataType::Blob | DataType::Json => u32::MAX,
            DataType::Binary { length } | DataType::Varbinary { length } => *length as u32,
            DataType::Date => 10,
            DataType::Time => 17,
            DataType::Datetime | DataType::Timestamp => 26,
            DataType::Year => 4,
            DataType::Enum { values, .. } => values.iter().map(|v| v.len() as u32 * 4).max().unwrap_or(0),
            DataType::Set { values, .. } => values.iter().map(|v| v.len() as u32 * 4 + 1).sum(),
            DataType::Spatial { .. } => u32::MAX,
            DataType::Interval => 64,
            DataType::Tuple(_) => u32::MAX,
        }
    }

    /// Total order over two non-NULL values of this type.
    ///
    /// NULL ordering (first on ascending sorts) and the tri-state result of
    /// comparison expressions are the callers' business; this is the raw
    /// comparator.
    pub fn compare(&self, a: &Value, b: &Value) -> Result<Ordering> {
        match (a, b) {
            (Value::Null, Value::Null) => return Ok(Ordering::Equal),
            (Value::Null, _) => return Ok(Ordering::Less),
            (_, Value::Null) => return Ok(Ordering::Greater),
            _ => {}
        }
        match self {
            t if t.is_text() => {
                let collation = t.collation().unwrap_or_default();
                let a = self.convert(a.clone())?;
                let b = self.convert(b.clone())?;
                Ok(collation.compare(a.as_str_lossy().as_ref(), b.as_str_lossy().as_ref()))
            }
            DataType::Json => {
                let a = self.convert(a.clone())?;
                let b = self.convert(b.clone())?;
                match (a, b) {
                    (Value::Json(a), Value::Json(b)) => Ok(crate::types::json::compare(&a, &b)),
                    _ => Err(Error::Internal("json convert produced non-json".into())),
                }
            }
            DataType::Tuple(n) => compare_tuples(*n, a, b),
            _ => {
                let a = self.convert(a.clone())?;
                let b = self.convert(b.clone())?;
                a.partial_cmp(&b)
                    .ok_or_else(|| Error::TypeMismatch { expected: self.to_string(), found: b.data_type().to_string() })
            }
        }
    }

    /// Converts a value of a compatible type to this type's canonical
    /// representation. NULL converts to NULL for every type.
    pub fn convert(&self, v: Value) -> Result<Value> {
        if v.is_null() {
            return Ok(Value::Null);
        }
        match self {
            DataType::Null => Ok(Value::Null),
            DataType::TinyInt { unsigned } => convert_int(v, 8, *unsigned),
            DataType::SmallInt { unsigned } => convert_int(v, 16, *unsigned),
            DataType::MediumInt { unsigned } => convert_int(v, 24, *unsigned),
            DataType::Int { unsigned } => convert_int(v, 32, *unsigned),
            DataType::BigInt { unsigned } => convert_int(v, 64, *unsigned),
            DataType::Float => Ok(Value::F32(value_to_f64(&v)? as f32)),
            DataType::Double => Ok(Value::F64(value_to_f64(&v)?)),
            DataType::Decimal { precision, scale } => convert_decimal(v, *precision, *scale),
            DataType::Char { length, .. } | DataType::Varchar { length, .. } => {
                let s = v.into_text()?;
                if s.chars().count() > *length as usize {
                    return Err(Error::ConvertError { value: s, to: self.to_string() });
                }
                Ok(Value::Str(s))
            }
            DataType::Text { .. } => Ok(Value::Str(v.into_text()?)),
            DataType::Binary { length } | DataType::Varbinary { length } => {
                let b = v.into_bytes()?;
                if b.len() > *length as usize {
                    return Err(Error::ConvertError { value: hex::encode(&b), to: self.to_string() });
                }
                Ok(Value::Bytes(b))
            }
            DataType::Blob => Ok(Value::Bytes(v.into_bytes()?)),
            DataType::Date => convert_date(v),
            DataType::Time => convert_time(v),
            DataType::Datetime | DataType::Timestamp => convert_datetime(v),
            DataType::Year => convert_year(v),
            DataType::Json => convert_json(v),
            DataType::Enum { values, collation } => convert_enum(v, values, *collation),
            DataType::Set { values, collation } => convert_set(v, values, *collation),
            DataType::Spatial { class, .. } => match v {
                Value::Geometry(g) => {
                    if *class != SpatialClass::Geometry && g.class() != *class {
                        return Err(Error::ConvertError { value: g.to_string(), to: self.to_string() });
                    }
                    Ok(Value::Geometry(g))
                }
                other => Err(Error::ConvertError { value: other.to_string(), to: self.to_string() }),
            },
            DataType::Interval => match v {
                Value::Interval(i) => Ok(Value::Interval(i)),
                other => Err(Error::ConvertError { value: other.to_string(), to: self.to_string() }),
            },
            DataType::Tuple(n) => match v {
                Value::Tuple(vs) if vs.len() == *n => Ok(Value::Tuple(vs)),
                Value::Tuple(vs) => Err(Error::InvalidOperandColumns { expected: *n, actual: vs.len() }),
                other if *n == 1 => Ok(Value::Tuple(vec![other])),
                _ => Err(Error::InvalidOperandColumns { expected: *n, actual: 1 }),
            },
        }
    }

    /// Validates a geometry value against this column's declared SRID.
    pub fn match_srid(&self, v: &Value) -> Result<()> {
        if let (DataType::Spatial { srid, .. }, Value::Geometry(g)) = (self, v) {
            if g.srid != *srid {
                return Err(Error::SridMismatch { value: g.srid, expected: *srid });
            }
        }
        Ok(())
    }
}

/// Lexicographic tuple comparison with recursive arity validation.
fn compare_tuples(arity: usize, a: &Value, b: &Value) -> Result<Ordering> {
    let (av, bv) = match (a, b) {
        (Value::Tuple(av), Value::Tuple(bv)) => (av, bv),
        _ => {
            return Err(Error::TypeMismatch { expected: format!("tuple of {arity}"), found: b.data_type().to_string() })
        }
    };
    if av.len() != arity {
        return Err(Error::InvalidOperandColumns { expected: arity, actual: av.len() });
    }
    if bv.len() != arity {
        return Err(Error::InvalidOperandColumns { expected: arity, actual: bv.len() });
    }
    for (x, y) in av.iter().zip(bv.iter()) {
        match x.data_type().promote().compare(x, y)? {
            Ordering::Equal => continue,
            other => return Ok(other),
        }
    }
    Ok(Ordering::Equal)
}

/// MySQL's leading-digit numeric parse for strings: the longest numeric
/// prefix is taken, an empty prefix counts as zero.
pub fn numeric_prefix(s: &str) -> f64 {
    let s = s.trim();
    let bytes = s.as_bytes();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'+' | b'-' if i == 0 => end = i + 1,
            b'+' | b'-' if i > 0 && (bytes[i - 1] == b'e' || bytes[i - 1] == b'E') => end = i + 1,
            b'0'..=b'9' => {
                seen_digit = true;
                end = i + 1;
            }
            b'.' if !seen_dot && !seen_exp => {
                seen_dot = true;
                end = i + 1;
            }
            b'e' | b'E' if seen_digit && !seen_exp => {
                seen_exp = true;
                end = i + 1;
            }
            _ => break,
        }
    }
    // Trim a trailing exponent marker (or its sign) that never got digits.
    let mut prefix = &s[..end];
    loop {
        if prefix.ends_with(['e', 'E']) {
            prefix = &prefix[..prefix.len() - 1];
        } else if prefix.ends_with(['+', '-'])
            && prefix[..prefix.len() - 1].ends_with(['e', 'E'])
        {
            prefix = &prefix[..prefix.len() - 2];
        } else {
            break;
        }
    }
    if prefix.is_empty() || prefix == "+" || prefix == "-" {
        return 0.0;
    }
    prefix.parse::<f64>().unwrap_or(0.0)
}

fn value_to_f64(v: &Value) -> Result<f64> {
    match v {
        Value::I8(n) => Ok(*n as f64),
        Value::I16(n) => Ok(*n as f64),
        Value::I32(n) => Ok(*n as f64),
        Value::I64(n) => Ok(*n as f64),
        Value::U8(n) => Ok(*n as f64),
        Value::U16(n) => Ok(*n as f64),
        Value::U32(n) => Ok(*n as f64),
        Value::U64(n) => Ok(*n as f64),
        Value::Year(n) => Ok(*n as f64),
        Value::F32(n) => Ok(*n as f64),
        Value::F64(n) => Ok(*n),
        Value::Decimal(d) => d
            .to_f64()
            .ok_or_else(|| Error::NumericOverflow(d.to_string())),
        Value::Str(s) => Ok(numeric_prefix(s)),
        Value::Bytes(b) => Ok(numeric_prefix(&String::from_utf8_lossy(b))),
        Value::Date(d) => Ok(format!("{}{:02}{:02}", d.year(), d.month(), d.day()).parse().unwrap_or(0.0)),
        Value::DateTime(dt) => Ok(dt.and_utc().timestamp() as f64),
        Value::Json(j) => Ok(j.as_f64().unwrap_or(0.0)),
        other => Err(Error::ConvertError { value: other.to_string(), to: "DOUBLE".into() }),
    }
}

fn convert_int(v: Value, bits: u32, unsigned: bool) -> Result<Value> {
    let f = value_to_f64(&v)?;
    let rounded = f.round();
    if unsigned {
        let max = if bits == 64 { u64::MAX as f64 } else { (1u64 << bits) as f64 - 1.0 };
        if rounded < 0.0 || rounded > max {
            return Err(Error::NumericOverflow(v.to_string()));
        }
        let n = rounded as u64;
        Ok(match bits {
            8 => Value::U8(n as u8),
            16 => Value::U16(n as u16),
            24 | 32 => Value::U32(n as u32),
            _ => Value::U64(n),
        })
    } else {
        let max = if bits == 64 { i64::MAX as f64 } else { (1i64 << (bits - 1)) as f64 - 1.0 };
        let min = if bits == 64 { i64::MIN as f64 } else { -((1i64 << (bits - 1)) as f64) };
        if rounded < min || rounded > max {
            return Err(Error::NumericOverflow(v.to_string()));
        }
        let n = rounded as i64;
        Ok(match bits {
            8 => Value::I8(n as i8),
            16 => Value::I16(n as i16),
            24 | 32 => Value::I32(n as i32),
            _ => Value::I64(n),
        })
    }
}

fn convert_decimal(v: Value, precision: u8, scale: u8) -> Result<Value> {
    let d = match &v {
        Value::Decimal(d) => *d,
        Value::I8(_) | Value::I16(_) | Value::I32(_) | Value::I64(_) => {
            Decimal::from_i64(match &v {
                Value::I8(n) => *n as i64,
                Value::I16(n) => *n as i64,
                Value::I32(n) => *n as i64,
                Value::I64(n) => *n,
                _ => unreachable!(),
            })
            .ok_or_else(|| Error::NumericOverflow(v.to_string()))?
        }
        Value::U8(_) | Value::U16(_) | Value::U32(_) | Value::U64(_) | Value::Year(_) => {
            Decimal::from_u64(match &v {
                Value::U8(n) => *n as u64,
                Value::U16(n) => *n as u64,
                Value::U32(n) => *n as u64,
                Value::U64(n) => *n,
                Value::Year(n) => *n as u64,
                _ => unreachable!(),
            })
            .ok_or_else(|| Error::NumericOverflow(v.to_string()))?
        }
        Value::F32(f) => Decimal::from_f32(*f).ok_or_else(|| Error::NumericOverflow(v.to_string()))?,
        Value::F64(f) => Decimal::from_f64(*f).ok_or_else(|| Error::NumericOverflow(v.to_string()))?,
        Value::Str(s) => Decimal::from_f64(numeric_prefix(s)).unwrap_or(Decimal::ZERO),
        other => return Err(Error::ConvertError { value: other.to_string(), to: "DECIMAL".into() }),
    };
    let d = d.round_dp_with_strategy(scale as u32, RoundingStrategy::MidpointAwayFromZero);
    if precision > 0 {
        let integral_digits = d.trunc().abs().to_string().trim_start_matches('0').len().max(1);
        if integral_digits > (precision - scale) as usize && !d.is_zero() {
            return Err(Error::NumericOverflow(d.to_string()));
        }
    }
    Ok(Value::Decimal(d))
}

pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .ok()
}

pub(crate) fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| parse_date(s).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

fn convert_date(v: Value) -> Result<Value> {
    match v {
        Value::Date(d) => Ok(Value::Date(d)),
        Value::DateTime(dt) => Ok(Value::Date(dt.date())),
        Value::Str(s) => parse_date(&s)
            .map(Value::Date)
            .ok_or(Error::ConvertingToTime(s)),
        other => Err(Error::ConvertingToTime(other.to_string())),
    }
}

fn convert_time(v: Value) -> Result<Value> {
    match v {
        Value::Time(t) => Ok(Value::Time(t)),
        Value::DateTime(dt) => Ok(Value::Time(dt.time())),
        Value::Str(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
            .or_else(|_| NaiveTime::parse_from_str(s.trim(), "%H:%M"))
            .map(Value::Time)
            .map_err(|_| Error::ConvertingToTime(s)),
        other => Err(Error::ConvertingToTime(other.to_string())),
    }
}

fn convert_datetime(v: Value) -> Result<Value> {
    match v {
        Value::DateTime(dt) => Ok(Value::DateTime(dt)),
        Value::Date(d) => Ok(Value::DateTime(d.and_hms_opt(0, 0, 0).unwrap())),
        Value::Str(s) => parse_datetime(&s)
            .map(Value::DateTime)
            .ok_or(Error::ConvertingToTime(s)),
        other => Err(Error::ConvertingToTime(other.to_string())),
    }
}

fn convert_year(v: Value) -> Result<Value> {
    let n = value_to_f64(&v)?.round() as i64;
    let expanded = match n {
        0 => 0,
        1..=69 => 2000 + n,
        70..=99 => 1900 + n,
        1901..=2155 => n,
        _ => return Err(Error::NumericOverflow(v.to_string())),
    };
    Ok(Value::Year(expanded as u16))
}

fn convert_json(v: Value) -> Result<Value> {
    match v {
        Value::Json(j) => Ok(Value::Json(j)),
        Value::Str(s) => serde_json::from_str(&s)
            .map(Value::Json)
            .map_err(|e| Error::InvalidJsonText(e.to_string())),
        Value::I8(n) => Ok(Value::Json(n.into())),
        Value::I16(n) => Ok(Value::Json(n.into())),
        Value::I32(n) => Ok(Value::Json(n.into())),
        Value::I64(n) => Ok(Value::Json(n.into())),
        Value::U8(n) => Ok(Value::Json(n.into())),
        Value::U16(n) => Ok(Value::Json(n.into())),
        Value::U32(n) => Ok(Value::Json(n.into())),
        Value::U64(n) => Ok(Value::Json(n.into())),
        Value::F64(n) => Ok(Value::Json(
            serde_json::Number::from_f64(n).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null),
        )),
        other => Err(Error::ConvertError { value: other.to_string(), to: "JSON".into() }),
    }
}

fn convert_enum(v: Value, values: &[String], collation: Collation) -> Result<Value> {
    match v {
        Value::Str(s) => {
            for candidate in values {
                if collation.equals(candidate, &s) {
                    return Ok(Value::Str(candidate.clone()));
                }
            }
            Err(Error::ConvertError { value: s, to: "ENUM".into() })
        }
        ref n if n.data_type().is_integer() => {
            let idx = value_to_f64(n)? as usize;
            values
                .get(idx.wrapping_sub(1))
                .map(|s| Value::Str(s.clone()))
                .ok_or_else(|| Error::ConvertError { value: n.to_string(), to: "ENUM".into() })
        }
        other => Err(Error::ConvertError { value: other.to_string(), to: "ENUM".into() }),
    }
}

fn convert_set(v: Value, values: &[String], collation: Collation) -> Result<Value> {
    match v {
        Value::Str(s) => {
            let mut members: Vec<&String> = Vec::new();
            for part in s.split(',').filter(|p| !p.is_empty()) {
                let found = values.iter().find(|c| collation.equals(c, part));
                match found {
                    Some(c) if !members.iter().any(|m| *m == c) => members.push(c),
                    Some(_) => {}
                    None => return Err(Error::ConvertError { value: part.to_string(), to: "SET".into() }),
                }
            }
            // Normalize to declaration order.
            let normalized: Vec<&str> = values.iter().filter(|c| members.contains(c)).map(|s| s.as_str()).collect();
            Ok(Value::Str(normalized.join(",")))
        }
        other => Err(Error::ConvertError { value: other.to_string(), to: "SET".into() }),
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn unsigned_suffix(unsigned: &bool) -> &'static str {
            if *unsigned {
                " unsigned"
            } else {
                ""
            }
        }
        match self {
            DataType::Null => write!(f, "null"),
            DataType::TinyInt { unsigned } => write!(f, "tinyint{}", unsigned_suffix(unsigned)),
            DataType::SmallInt { unsigned } => write!(f, "smallint{}", unsigned_suffix(unsigned)),
            DataType::MediumInt { unsigned } => write!(f, "mediumint{}", unsigned_suffix(unsigned)),
            DataType::Int { unsigned } => write!(f, "int{}", unsigned_suffix(unsigned)),
            DataType::BigInt { unsigned } => write!(f, "bigint{}", unsigned_suffix(unsigned)),
            DataType::Float => write!(f, "float"),
            DataType::Double => write!(f, "double"),
            DataType::Decimal { precision, scale } => write!(f, "decimal({},{})", precision, scale),
            DataType::Char { length, .. } => write!(f, "char({})", length),
            DataType::Varchar { length, .. } => write!(f, "varchar({})", length),
            DataType::Text { .. } => write!(f, "text"),
            DataType::Binary { length } => write!(f, "binary({})", length),
            DataType::Varbinary { length } => write!(f, "varbinary({})", length),
            DataType::Blob => write!(f, "blob"),
            DataType::Date => write!(f, "date"),
            DataType::Time => write!(f, "time"),
            DataType::Datetime => write!(f, "datetime"),
            DataType::Timestamp => write!(f, "timestamp"),
            DataType::Year => write!(f, "year"),
            DataType::Json => write!(f, "json"),
            DataType::Enum { values, .. } => {
                write!(f, "enum(")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "'{}'", v)?;
                }
                write!(f, ")")
            }
            DataType::Set { values, .. } => {
                write!(f, "set(")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "'{}'", v)?;
                }
                write!(f, ")")
            }
            DataType::Spatial { class, srid } => {
                if *srid == 0 {
                    write!(f, "{}", class.name())
                } else {
                    write!(f, "{} /*!80003 SRID {} */", class.name(), srid)
                }
            }
            DataType::Interval => write!(f, "interval"),
            DataType::Tuple(n) => write!(f, "tuple({})", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_numeric_prefix_parse() {
        assert_eq!(numeric_prefix("20a"), 20.0);
        assert_eq!(numeric_prefix("a"), 0.0);
        assert_eq!(numeric_prefix(""), 0.0);
        assert_eq!(numeric_prefix("1.5x"), 1.5);
        assert_eq!(numeric_prefix("-3abc"), -3.0);
        assert_eq!(numeric_prefix("  42  "), 42.0);
        assert_eq!(numeric_prefix("1e2z"), 100.0);
    }

    #[test]
    fn int_conversion_bounds() {
        let tiny = DataType::TinyInt { unsigned: false };
        assert_eq!(tiny.convert(Value::Str("20a".into())).unwrap(), Value::I8(20));
        assert!(tiny.convert(Value::I64(200)).is_err());
        let utiny = DataType::TinyInt { unsigned: true };
        assert!(utiny.convert(Value::I64(-1)).is_err());
        assert_eq!(utiny.convert(Value::I64(200)).unwrap(), Value::U8(200));
    }

    #[test]
    fn year_expansion() {
        assert_eq!(DataType::Year.convert(Value::I64(69)).unwrap(), Value::Year(2069));
        assert_eq!(DataType::Year.convert(Value::I64(70)).unwrap(), Value::Year(1970));
        assert_eq!(DataType::Year.convert(Value::I64(2001)).unwrap(), Value::Year(2001));
        assert!(DataType::Year.convert(Value::I64(1900)).is_err());
    }

    #[test]
    fn enum_parameters_take_part_in_equality() {
        let ab = DataType::Enum { values: vec!["a".into(), "b".into()], collation: Collation::default() };
        let abc = DataType::Enum { values: vec!["a".into(), "b".into(), "c".into()], collation: Collation::default() };
        assert_ne!(ab, abc);
    }

    #[test]
    fn set_normalizes_to_declaration_order() {
        let t = DataType::Set { values: vec!["a".into(), "b".into(), "c".into()], collation: Collation::default() };
        assert_eq!(t.convert(Value::Str("c,a".into())).unwrap(), Value::Str("a,c".into()));
        assert!(t.convert(Value::Str("d".into())).is_err());
    }

    #[test]
    fn tuple_arity_mismatch() {
        let t = DataType::Tuple(2);
        let err = t
            .compare(
                &Value::Tuple(vec![Value::I64(1), Value::I64(2)]),
                &Value::Tuple(vec![Value::I64(1)]),
            )
            .unwrap_err();
        assert_eq!(err, Error::InvalidOperandColumns { expected: 2, actual: 1 });
    }

    #[test]
    fn promote_widens_families() {
        assert_eq!(DataType::TinyInt { unsigned: false }.promote(), DataType::bigint());
        assert_eq!(DataType::Float.promote(), DataType::Double);
        assert_eq!(DataType::varchar(10).promote(), DataType::text());
    }
}
