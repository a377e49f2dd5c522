//! Date and time functions. NOW() and friends read the statement timestamp
//! from the session, so one statement sees one clock.

use super::{str_arg, Function, FunctionContext, FunctionSignature, Registry};
use crate::error::{Error, Result};
use crate::session::parse_tz_offset;
#[cfg_attr(not(test), allow(unused_imports))]
use crate::types::data_type::{parse_date, parse_datetime, DataType};
use crate::types::value::Value;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

fn sig(name: &'static str, min: usize, max: usize) -> FunctionSignature {
    FunctionSignature { name, min_args: min, max_args: max, deterministic: true }
}

fn volatile(name: &'static str, min: usize, max: usize) -> FunctionSignature {
    FunctionSignature { name, min_args: min, max_args: max, deterministic: false }
}

fn datetime_of(v: &Value) -> Result<Option<NaiveDateTime>> {
    Ok(match v {
        Value::Null => None,
        Value::Date(d) => Some(d.and_hms_opt(0, 0, 0).unwrap()),
        Value::DateTime(dt) => Some(*dt),
        Value::Str(s) => Some(parse_datetime(s).ok_or_else(|| Error::ConvertingToTime(s.clone()))?),
        other => return Err(Error::ConvertingToTime(other.to_string())),
    })
}

struct Now;
impl Function for Now {
    fn signature(&self) -> FunctionSignature {
        volatile("NOW", 0, 1)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::Datetime)
    }
    fn execute(&self, _: &[Value], ctx: &FunctionContext) -> Result<Value> {
        Ok(Value::DateTime(ctx.session.now()))
    }
}

struct CurDate;
impl Function for CurDate {
    fn signature(&self) -> FunctionSignature {
        volatile("CURDATE", 0, 0)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::Date)
    }
    fn execute(&self, _: &[Value], ctx: &FunctionContext) -> Result<Value> {
        Ok(Value::Date(ctx.session.now().date()))
    }
}

struct CurTime;
impl Function for CurTime {
    fn signature(&self) -> FunctionSignature {
        volatile("CURTIME", 0, 0)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::Time)
    }
    fn execute(&self, _: &[Value], ctx: &FunctionContext) -> Result<Value> {
        Ok(Value::Time(ctx.session.now().time()))
    }
}

/// YEAR/MONTH/DAY/HOUR/MINUTE/SECOND share one shape.
struct DatePart {
    name: &'static str,
    part: fn(&NaiveDateTime) -> i64,
}

impl Function for DatePart {
    fn signature(&self) -> FunctionSignature {
        sig(self.name, 1, 1)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::bigint())
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        match datetime_of(&args[0])? {
            Some(dt) => Ok(Value::I64((self.part)(&dt))),
            None => Ok(Value::Null),
        }
    }
}

struct DateFn;
impl Function for DateFn {
    fn signature(&self) -> FunctionSignature {
        sig("DATE", 1, 1)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::Date)
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        match datetime_of(&args[0])? {
            Some(dt) => Ok(Value::Date(dt.date())),
            None => Ok(Value::Null),
        }
    }
}

struct DateDiff;
impl Function for DateDiff {
    fn signature(&self) -> FunctionSignature {
        sig("DATEDIFF", 2, 2)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::bigint())
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        match (datetime_of(&args[0])?, datetime_of(&args[1])?) {
            (Some(a), Some(b)) => Ok(Value::I64((a.date() - b.date()).num_days())),
            _ => Ok(Value::Null),
        }
    }
}

/// DATE_ADD / DATE_SUB; the planner lowers `INTERVAL n unit` to an interval
/// value argument.
struct DateArith {
    name: &'static str,
    sign: i32,
}

impl Function for DateArith {
    fn signature(&self) -> FunctionSignature {
        sig(self.name, 2, 2)
    }
    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        Ok(match arg_types.first() {
            Some(DataType::Date) => DataType::Date,
            _ => DataType::Datetime,
        })
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let Value::Interval(interval) = &args[1] else {
            return Err(Error::InvalidArgument(format!("{} requires an INTERVAL", self.name)));
        };
        Ok(match &args[0] {
            Value::Null => Value::Null,
            Value::Date(d) => crate::operators::add::shift_date(*d, interval, self.sign),
            other => match datetime_of(other)? {
                Some(dt) => crate::operators::add::shift_datetime(dt, interval, self.sign),
                None => Value::Null,
            },
        })
    }
}

/// Translates MySQL's DATE_FORMAT specifiers into chrono's.
fn translate_format(mysql: &str) -> Result<String> {
    let mut out = String::with_capacity(mysql.len());
    let mut chars = mysql.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('Y') => out.push_str("%Y"),
            Some('y') => out.push_str("%y"),
            Some('m') => out.push_str("%m"),
            Some('c') => out.push_str("%-m"),
            Some('d') => out.push_str("%d"),
            Some('e') => out.push_str("%-d"),
            Some('H') => out.push_str("%H"),
            Some('h') | Some('I') => out.push_str("%I"),
            Some('i') => out.push_str("%M"),
            Some('s') | Some('S') => out.push_str("%S"),
            Some('f') => out.push_str("%6f"),
            Some('p') => out.push_str("%p"),
            Some('M') => out.push_str("%B"),
            Some('b') => out.push_str("%b"),
            Some('W') => out.push_str("%A"),
            Some('a') => out.push_str("%a"),
            Some('j') => out.push_str("%j"),
            Some('T') => out.push_str("%H:%M:%S"),
            Some('r') => out.push_str("%I:%M:%S %p"),
            Some('%') => out.push_str("%%"),
            Some(other) => return Err(Error::InvalidArgument(format!("DATE_FORMAT specifier %{}", other))),
            None => return Err(Error::InvalidArgument("trailing % in format".into())),
        }
    }
    Ok(out)
}

struct DateFormat;
impl Function for DateFormat {
    fn signature(&self) -> FunctionSignature {
        sig("DATE_FORMAT", 2, 2)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::text())
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let (Some(dt), Some(format)) = (datetime_of(&args[0])?, str_arg(args, 1)?) else {
            return Ok(Value::Null);
        };
        let chrono_format = translate_format(&format)?;
        Ok(Value::Str(dt.format(&chrono_format).to_string()))
    }
}

struct StrToDate;
impl Function for StrToDate {
    fn signature(&self) -> FunctionSignature {
        sig("STR_TO_DATE", 2, 2)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::Datetime)
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let (Some(s), Some(format)) = (str_arg(args, 0)?, str_arg(args, 1)?) else {
            return Ok(Value::Null);
        };
        let chrono_format = translate_format(&format)?;
        if let Ok(dt) = NaiveDateTime::parse_from_str(&s, &chrono_format) {
            return Ok(Value::DateTime(dt));
        }
        if let Ok(d) = NaiveDate::parse_from_str(&s, &chrono_format) {
            return Ok(Value::Date(d));
        }
        Ok(Value::Null)
    }
}

struct ConvertTz;
impl Function for ConvertTz {
    fn signature(&self) -> FunctionSignature {
        sig("CONVERT_TZ", 3, 3)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::Datetime)
    }
    fn execute(&self, args: &[Value], ctx: &FunctionContext) -> Result<Value> {
        let (Some(dt), Some(from), Some(to)) = (datetime_of(&args[0])?, str_arg(args, 1)?, str_arg(args, 2)?) else {
            return Ok(Value::Null);
        };
        // Numeric offsets work without a time-zone table. Named zones need
        // one from the host; without it the result is NULL plus a warning.
        match (parse_tz_offset(&from), parse_tz_offset(&to)) {
            (Some(from_min), Some(to_min)) => {
                Ok(Value::DateTime(dt + Duration::minutes((to_min - from_min) as i64)))
            }
            _ => {
                ctx.session.warn(
                    1298,
                    format!("CONVERT_TZ: time zone tables not loaded, cannot resolve '{}'/'{}'", from, to),
                );
                Ok(Value::Null)
            }
        }
    }
}

struct UnixTimestamp;
impl Function for UnixTimestamp {
    fn signature(&self) -> FunctionSignature {
        volatile("UNIX_TIMESTAMP", 0, 1)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::bigint())
    }
    fn execute(&self, args: &[Value], ctx: &FunctionContext) -> Result<Value> {
        let dt = match args.first() {
            None => ctx.session.now(),
            Some(v) => match datetime_of(v)? {
                Some(dt) => dt,
                None => return Ok(Value::Null),
            },
        };
        Ok(Value::I64(dt.and_utc().timestamp()))
    }
}

struct Extract;
impl Function for Extract {
    fn signature(&self) -> FunctionSignature {
        sig("EXTRACT", 2, 2)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::bigint())
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let Some(unit) = str_arg(args, 0)? else { return Ok(Value::Null) };
        let Some(dt) = datetime_of(&args[1])? else { return Ok(Value::Null) };
        let v = match unit.to_uppercase().as_str() {
            "YEAR" => dt.year() as i64,
            "QUARTER" => (dt.month0() / 3 + 1) as i64,
            "MONTH" => dt.month() as i64,
            "DAY" => dt.day() as i64,
            "HOUR" => dt.hour() as i64,
            "MINUTE" => dt.minute() as i64,
            "SECOND" => dt.second() as i64,
            "MICROSECOND" => (dt.and_utc().timestamp_subsec_micros()) as i64,
            other => return Err(Error::InvalidArgument(format!("EXTRACT unit {}", other))),
        };
        Ok(Value::I64(v))
    }
}

struct LastDay;
impl Function for LastDay {
    fn signature(&self) -> FunctionSignature {
        sig("LAST_DAY", 1, 1)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::Date)
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let Some(dt) = datetime_of(&args[0])? else { return Ok(Value::Null) };
        let (y, m) = (dt.year(), dt.month());
        let first_next = if m == 12 {
            NaiveDate::from_ymd_opt(y + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(y, m + 1, 1)
        };
        Ok(first_next.map(|d| Value::Date(d - Duration::days(1))).unwrap_or(Value::Null))
    }
}

pub(super) fn register(registry: &mut Registry) {
    registry.register(Now);
    registry.register(CurDate);
    registry.register(CurTime);
    registry.register(DateFn);
    registry.register(DateDiff);
    registry.register(DateFormat);
    registry.register(StrToDate);
    registry.register(ConvertTz);
    registry.register(UnixTimestamp);
    registry.register(Extract);
    registry.register(LastDay);
    registry.register(DateArith { name: "DATE_ADD", sign: 1 });
    registry.register(DateArith { name: "DATE_SUB", sign: -1 });
    registry.register(DatePart { name: "YEAR", part: |dt| dt.year() as i64 });
    registry.register(DatePart { name: "MONTH", part: |dt| dt.month() as i64 });
    registry.register(DatePart { name: "DAY", part: |dt| dt.day() as i64 });
    registry.register(DatePart { name: "HOUR", part: |dt| dt.hour() as i64 });
    registry.register(DatePart { name: "MINUTE", part: |dt| dt.minute() as i64 });
    registry.register(DatePart { name: "SECOND", part: |dt| dt.second() as i64 });
    registry.register(DatePart { name: "DAYOFWEEK", part: |dt| dt.weekday().number_from_sunday() as i64 });
    registry.register(DatePart { name: "DAYOFYEAR", part: |dt| dt.ordinal() as i64 });
    registry.alias("now", "current_timestamp");
    registry.alias("now", "localtime");
    registry.alias("now", "localtimestamp");
    registry.alias("curdate", "current_date");
    registry.alias("curtime", "current_time");
    registry.alias("day", "dayofmonth");
    registry.alias("date_add", "adddate");
    registry.alias("date_sub", "subdate");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_translation() {
        assert_eq!(translate_format("%Y-%m-%d").unwrap(), "%Y-%m-%d");
        assert_eq!(translate_format("%H:%i:%s").unwrap(), "%H:%M:%S");
        assert!(translate_format("%Q").is_err());
    }

    #[test]
    fn parse_date_helpers() {
        assert!(parse_date("2024-02-29").is_some());
        assert!(parse_date("2023-02-29").is_none());
    }
}
