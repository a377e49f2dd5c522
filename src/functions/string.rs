//! String functions.

use super::{str_arg, Function, FunctionContext, FunctionSignature, Registry};
use crate::error::Result;
use crate::types::data_type::DataType;
use crate::types::value::Value;

fn sig(name: &'static str, min: usize, max: usize) -> FunctionSignature {
    FunctionSignature { name, min_args: min, max_args: max, deterministic: true }
}

fn text() -> DataType {
    DataType::text()
}

/// NULL-transparent unary string function.
macro_rules! unary_string {
    ($struct_name:ident, $sql_name:literal, $ret:expr, $body:expr) => {
        struct $struct_name;
        impl Function for $struct_name {
            fn signature(&self) -> FunctionSignature {
                sig($sql_name, 1, 1)
            }
            fn return_type(&self, _: &[DataType]) -> Result<DataType> {
                Ok($ret)
            }
            fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
                let Some(s) = str_arg(args, 0)? else { return Ok(Value::Null) };
                let f: fn(String) -> Value = $body;
                Ok(f(s))
            }
        }
    };
}

unary_string!(Length, "LENGTH", DataType::bigint(), |s| Value::I64(s.len() as i64));
unary_string!(CharLength, "CHAR_LENGTH", DataType::bigint(), |s| Value::I64(s.chars().count() as i64));
unary_string!(Upper, "UPPER", text(), |s| Value::Str(s.to_uppercase()));
unary_string!(Lower, "LOWER", text(), |s| Value::Str(s.to_lowercase()));
unary_string!(Reverse, "REVERSE", text(), |s| Value::Str(s.chars().rev().collect()));
unary_string!(Ltrim, "LTRIM", text(), |s| Value::Str(s.trim_start().to_string()));
unary_string!(Rtrim, "RTRIM", text(), |s| Value::Str(s.trim_end().to_string()));
unary_string!(Trim, "TRIM", text(), |s| Value::Str(s.trim().to_string()));

struct Concat;
impl Function for Concat {
    fn signature(&self) -> FunctionSignature {
        sig("CONCAT", 1, usize::MAX)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(text())
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let mut out = String::new();
        for (i, arg) in args.iter().enumerate() {
            if arg.is_null() {
                return Ok(Value::Null);
            }
            out.push_str(&str_arg(args, i)?.unwrap_or_default());
        }
        Ok(Value::Str(out))
    }
}

struct ConcatWs;
impl Function for ConcatWs {
    fn signature(&self) -> FunctionSignature {
        sig("CONCAT_WS", 2, usize::MAX)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(text())
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        // NULL separator makes the whole result NULL; NULL pieces are
        // skipped.
        let Some(sep) = str_arg(args, 0)? else { return Ok(Value::Null) };
        let mut pieces = Vec::new();
        for i in 1..args.len() {
            if let Some(s) = str_arg(args, i)? {
                pieces.push(s);
            }
        }
        Ok(Value::Str(pieces.join(&sep)))
    }
}

struct Substring;
impl Function for Substring {
    fn signature(&self) -> FunctionSignature {
        sig("SUBSTRING", 2, 3)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(text())
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let (Some(s), Some(pos)) = (str_arg(args, 0)?, super::int_arg(args, 1)?) else {
            return Ok(Value::Null);
        };
        let len = if args.len() > 2 {
            match super::int_arg(args, 2)? {
                Some(l) => l,
                None => return Ok(Value::Null),
            }
        } else {
            i64::MAX
        };
        let chars: Vec<char> = s.chars().collect();
        let n = chars.len() as i64;
        // MySQL positions are 1-based; negative counts from the end; zero
        // yields the empty string.
        let start = if pos > 0 {
            pos - 1
        } else if pos < 0 {
            n + pos
        } else {
            return Ok(Value::Str(String::new()));
        };
        if start < 0 || start >= n || len <= 0 {
            return Ok(Value::Str(String::new()));
        }
        let end = (start + len.min(n)).min(n);
        Ok(Value::Str(chars[start as usize..end as usize].iter().collect()))
    }
}

struct Replace;
impl Function for Replace {
    fn signature(&self) -> FunctionSignature {
        sig("REPLACE", 3, 3)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(text())
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let (Some(s), Some(from), Some(to)) = (str_arg(args, 0)?, str_arg(args, 1)?, str_arg(args, 2)?) else {
            return Ok(Value::Null);
        };
        if from.is_empty() {
            return Ok(Value::Str(s));
        }
        Ok(Value::Str(s.replace(&from, &to)))
    }
}

struct Left;
impl Function for Left {
    fn signature(&self) -> FunctionSignature {
        sig("LEFT", 2, 2)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(text())
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let (Some(s), Some(n)) = (str_arg(args, 0)?, super::int_arg(args, 1)?) else {
            return Ok(Value::Null);
        };
        Ok(Value::Str(s.chars().take(n.max(0) as usize).collect()))
    }
}

struct Right;
impl Function for Right {
    fn signature(&self) -> FunctionSignature {
        sig("RIGHT", 2, 2)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(text())
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let (Some(s), Some(n)) = (str_arg(args, 0)?, super::int_arg(args, 1)?) else {
            return Ok(Value::Null);
        };
        let chars: Vec<char> = s.chars().collect();
        let skip = chars.len().saturating_sub(n.max(0) as usize);
        Ok(Value::Str(chars[skip..].iter().collect()))
    }
}

struct Instr;
impl Function for Instr {
    fn signature(&self) -> FunctionSignature {
        sig("INSTR", 2, 2)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::bigint())
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let (Some(s), Some(needle)) = (str_arg(args, 0)?, str_arg(args, 1)?) else {
            return Ok(Value::Null);
        };
        match s.find(&needle) {
            Some(byte_pos) => Ok(Value::I64(s[..byte_pos].chars().count() as i64 + 1)),
            None => Ok(Value::I64(0)),
        }
    }
}

fn pad(s: String, n: i64, with: String, left: bool) -> Value {
    if n < 0 {
        return Value::Null;
    }
    let n = n as usize;
    let len = s.chars().count();
    if len >= n {
        return Value::Str(s.chars().take(n).collect());
    }
    if with.is_empty() {
        return Value::Str(String::new());
    }
    let fill: String = with.chars().cycle().take(n - len).collect();
    Value::Str(if left { format!("{}{}", fill, s) } else { format!("{}{}", s, fill) })
}

struct Lpad;
impl Function for Lpad {
    fn signature(&self) -> FunctionSignature {
        sig("LPAD", 3, 3)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(text())
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let (Some(s), Some(n), Some(w)) = (str_arg(args, 0)?, super::int_arg(args, 1)?, str_arg(args, 2)?) else {
            return Ok(Value::Null);
        };
        Ok(pad(s, n, w, true))
    }
}

struct Rpad;
impl Function for Rpad {
    fn signature(&self) -> FunctionSignature {
        sig("RPAD", 3, 3)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(text())
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let (Some(s), Some(n), Some(w)) = (str_arg(args, 0)?, super::int_arg(args, 1)?, str_arg(args, 2)?) else {
            return Ok(Value::Null);
        };
        Ok(pad(s, n, w, false))
    }
}

pub(super) fn register(registry: &mut Registry) {
    registry.register(Length);
    registry.register(CharLength);
    registry.register(Upper);
    registry.register(Lower);
    registry.register(Reverse);
    registry.register(Trim);
    registry.register(Ltrim);
    registry.register(Rtrim);
    registry.register(Concat);
    registry.register(ConcatWs);
    registry.register(Substring);
    registry.register(Replace);
    registry.register(Left);
    registry.register(Right);
    registry.register(Instr);
    registry.register(Lpad);
    registry.register(Rpad);
    registry.alias("char_length", "character_length");
    registry.alias("upper", "ucase");
    registry.alias("lower", "lcase");
    registry.alias("substring", "substr");
    registry.alias("substring", "mid");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{LockTable, Session};
    use crate::variables::GlobalVariables;

    fn ctx_session() -> Session {
        Session::new(1, "root", "test", GlobalVariables::new(), LockTable::new())
    }

    #[test]
    fn substring_positions() {
        let session = ctx_session();
        let ctx = FunctionContext { session: &session };
        let s = |v: &str| Value::Str(v.into());
        assert_eq!(Substring.execute(&[s("Quadratically"), Value::I64(5)], &ctx).unwrap(), s("ratically"));
        assert_eq!(Substring.execute(&[s("Sakila"), Value::I64(-3)], &ctx).unwrap(), s("ila"));
        assert_eq!(
            Substring.execute(&[s("Quadratically"), Value::I64(5), Value::I64(6)], &ctx).unwrap(),
            s("ratica")
        );
        assert_eq!(Substring.execute(&[s("Sakila"), Value::I64(0)], &ctx).unwrap(), s(""));
    }

    #[test]
    fn concat_ws_skips_nulls() {
        let session = ctx_session();
        let ctx = FunctionContext { session: &session };
        let s = |v: &str| Value::Str(v.into());
        assert_eq!(
            ConcatWs.execute(&[s(","), s("a"), Value::Null, s("b")], &ctx).unwrap(),
            s("a,b")
        );
        assert_eq!(ConcatWs.execute(&[Value::Null, s("a")], &ctx).unwrap(), Value::Null);
    }
}
