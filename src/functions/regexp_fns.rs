//! REGEXP_LIKE and REGEXP_REPLACE over the regexp kernels.

use super::{int_arg, str_arg, Function, FunctionContext, FunctionSignature, Registry};
use crate::error::{Error, Result};
use crate::operators::regexp;
use crate::types::data_type::DataType;
use crate::types::value::Value;

fn sig(name: &'static str, min: usize, max: usize) -> FunctionSignature {
    FunctionSignature { name, min_args: min, max_args: max, deterministic: true }
}

fn parse_flags(flags: Option<String>) -> Result<bool> {
    let Some(flags) = flags else { return Ok(false) };
    let mut case_insensitive = false;
    for c in flags.chars() {
        match c {
            'i' => case_insensitive = true,
            'c' => case_insensitive = false,
            'm' | 'n' | 'u' => {}
            other => return Err(Error::InvalidArgument(format!("regexp flag '{}'", other))),
        }
    }
    Ok(case_insensitive)
}

struct RegexpLike;
impl Function for RegexpLike {
    fn signature(&self) -> FunctionSignature {
        sig("REGEXP_LIKE", 2, 3)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::TinyInt { unsigned: false })
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let (Some(text), Some(pattern)) = (str_arg(args, 0)?, str_arg(args, 1)?) else {
            return Ok(Value::Null);
        };
        let ci = parse_flags(if args.len() > 2 { str_arg(args, 2)? } else { None })?;
        Ok(Value::I8(regexp::matches(&text, &pattern, ci)? as i8))
    }
}

struct RegexpReplace;
impl Function for RegexpReplace {
    fn signature(&self) -> FunctionSignature {
        sig("REGEXP_REPLACE", 3, 6)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::text())
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let (Some(text), Some(pattern), Some(replacement)) =
            (str_arg(args, 0)?, str_arg(args, 1)?, str_arg(args, 2)?)
        else {
            return Ok(Value::Null);
        };
        let pos = match if args.len() > 3 { int_arg(args, 3)? } else { Some(1) } {
            Some(p) if p >= 1 => p as usize,
            Some(p) => return Err(Error::InvalidArgument(format!("REGEXP_REPLACE position {}", p))),
            None => return Ok(Value::Null),
        };
        let occurrence = match if args.len() > 4 { int_arg(args, 4)? } else { Some(0) } {
            Some(o) if o >= 0 => o as usize,
            Some(o) => return Err(Error::InvalidArgument(format!("REGEXP_REPLACE occurrence {}", o))),
            None => return Ok(Value::Null),
        };
        let ci = parse_flags(if args.len() > 5 { str_arg(args, 5)? } else { None })?;
        Ok(Value::Str(regexp::replace(&text, &pattern, &replacement, pos, occurrence, ci)?))
    }
}

pub(super) fn register(registry: &mut Registry) {
    registry.register(RegexpLike);
    registry.register(RegexpReplace);
}
