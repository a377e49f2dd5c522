//! Math functions.

use super::{f64_arg, int_arg, Function, FunctionContext, FunctionSignature, Registry};
use crate::error::{Error, Result};
use crate::types::data_type::DataType;
use crate::types::value::Value;
use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;

fn sig(name: &'static str, min: usize, max: usize) -> FunctionSignature {
    FunctionSignature { name, min_args: min, max_args: max, deterministic: true }
}

struct Abs;
impl Function for Abs {
    fn signature(&self) -> FunctionSignature {
        sig("ABS", 1, 1)
    }
    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        Ok(arg_types.first().cloned().unwrap_or(DataType::Double))
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        Ok(match &args[0] {
            Value::Null => Value::Null,
            Value::Decimal(d) => Value::Decimal(d.abs()),
            Value::F32(f) => Value::F32(f.abs()),
            Value::F64(f) => Value::F64(f.abs()),
            v if v.is_integer() => {
                let n = v.to_i64()?;
                Value::I64(n.checked_abs().ok_or_else(|| Error::NumericOverflow(n.to_string()))?)
            }
            v => Value::F64(v.to_f64()?.abs()),
        })
    }
}

struct Ceil;
impl Function for Ceil {
    fn signature(&self) -> FunctionSignature {
        sig("CEIL", 1, 1)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::bigint())
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let Some(f) = f64_arg(args, 0)? else { return Ok(Value::Null) };
        Ok(Value::I64(f.ceil() as i64))
    }
}

struct Floor;
impl Function for Floor {
    fn signature(&self) -> FunctionSignature {
        sig("FLOOR", 1, 1)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::bigint())
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let Some(f) = f64_arg(args, 0)? else { return Ok(Value::Null) };
        Ok(Value::I64(f.floor() as i64))
    }
}

struct Round;
impl Function for Round {
    fn signature(&self) -> FunctionSignature {
        sig("ROUND", 1, 2)
    }
    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        Ok(match arg_types.first() {
            Some(t) if t.is_decimal() || t.is_integer() => t.clone(),
            _ => DataType::Double,
        })
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        if args[0].is_null() {
            return Ok(Value::Null);
        }
        let digits = if args.len() > 1 {
            match int_arg(args, 1)? {
                Some(d) => d,
                None => return Ok(Value::Null),
            }
        } else {
            0
        };
        Ok(match &args[0] {
            Value::Decimal(d) => {
                let scale = digits.clamp(0, 30) as u32;
                Value::Decimal(d.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero))
            }
            v if v.is_integer() && digits >= 0 => v.clone(),
            v => {
                let factor = 10f64.powi(digits as i32);
                Value::F64((v.to_f64()? * factor).round() / factor)
            }
        })
    }
}

struct Mod;
impl Function for Mod {
    fn signature(&self) -> FunctionSignature {
        sig("MOD", 2, 2)
    }
    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        Ok(crate::types::coercion::arithmetic_result_type(
            crate::types::expression::ArithOp::Modulo,
            arg_types.first().unwrap_or(&DataType::bigint()),
            arg_types.get(1).unwrap_or(&DataType::bigint()),
        ))
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        if args[0].is_null() || args[1].is_null() {
            return Ok(Value::Null);
        }
        crate::operators::remainder::execute(&args[0], &args[1])
    }
}

struct Pow;
impl Function for Pow {
    fn signature(&self) -> FunctionSignature {
        sig("POW", 2, 2)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::Double)
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let (Some(base), Some(exp)) = (f64_arg(args, 0)?, f64_arg(args, 1)?) else {
            return Ok(Value::Null);
        };
        Ok(Value::F64(base.powf(exp)))
    }
}

struct Sqrt;
impl Function for Sqrt {
    fn signature(&self) -> FunctionSignature {
        sig("SQRT", 1, 1)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::Double)
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let Some(f) = f64_arg(args, 0)? else { return Ok(Value::Null) };
        if f < 0.0 {
            return Ok(Value::Null);
        }
        Ok(Value::F64(f.sqrt()))
    }
}

struct Sign;
impl Function for Sign {
    fn signature(&self) -> FunctionSignature {
        sig("SIGN", 1, 1)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::bigint())
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let Some(f) = f64_arg(args, 0)? else { return Ok(Value::Null) };
        Ok(Value::I64(if f > 0.0 {
            1
        } else if f < 0.0 {
            -1
        } else {
            0
        }))
    }
}

struct Truncate;
impl Function for Truncate {
    fn signature(&self) -> FunctionSignature {
        sig("TRUNCATE", 2, 2)
    }
    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        Ok(match arg_types.first() {
            Some(t) if t.is_decimal() || t.is_integer() => t.clone(),
            _ => DataType::Double,
        })
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let (Some(_), Some(digits)) = (f64_arg(args, 0)?, int_arg(args, 1)?) else {
            return Ok(Value::Null);
        };
        Ok(match &args[0] {
            Value::Decimal(d) => Value::Decimal(d.round_dp_with_strategy(
                digits.clamp(0, 30) as u32,
                RoundingStrategy::ToZero,
            )),
            v => {
                let factor = 10f64.powi(digits as i32);
                Value::F64((v.to_f64()? * factor).trunc() / factor)
            }
        })
    }
}

/// GREATEST / LEAST share everything but the direction.
struct Extremum {
    greatest: bool,
}

impl Function for Extremum {
    fn signature(&self) -> FunctionSignature {
        sig(if self.greatest { "GREATEST" } else { "LEAST" }, 2, usize::MAX)
    }
    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        let mut t = DataType::Null;
        for a in arg_types {
            t = crate::types::coercion::common_type(&t, a);
        }
        Ok(t)
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let mut best: Option<&Value> = None;
        for arg in args {
            if arg.is_null() {
                return Ok(Value::Null);
            }
            best = Some(match best {
                None => arg,
                Some(cur) => {
                    let ord = crate::operators::compare_values(cur, arg)?
                        .unwrap_or(std::cmp::Ordering::Equal);
                    let take = if self.greatest {
                        ord == std::cmp::Ordering::Less
                    } else {
                        ord == std::cmp::Ordering::Greater
                    };
                    if take {
                        arg
                    } else {
                        cur
                    }
                }
            });
        }
        Ok(best.cloned().unwrap_or(Value::Null))
    }
}

struct Pi;
impl Function for Pi {
    fn signature(&self) -> FunctionSignature {
        sig("PI", 0, 0)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::Double)
    }
    fn execute(&self, _: &[Value], _: &FunctionContext) -> Result<Value> {
        Ok(Value::F64(std::f64::consts::PI))
    }
}

struct Rand;
impl Function for Rand {
    fn signature(&self) -> FunctionSignature {
        FunctionSignature { name: "RAND", min_args: 0, max_args: 1, deterministic: false }
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::Double)
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        // Seeded RAND(n) is reproducible per call site; unseeded derives
        // from a fresh uuid, the engine's only entropy source.
        let seed = match int_arg(args, 0)? {
            Some(n) => n as u64,
            None => uuid::Uuid::new_v4().as_u128() as u64,
        };
        // xorshift over the seed, scaled into [0, 1).
        let mut x = seed.wrapping_mul(0x9E3779B97F4A7C15) | 1;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        let r = (x.wrapping_mul(0x2545F4914F6CDD1D) >> 11) as f64 / (1u64 << 53) as f64;
        Ok(Value::F64(r))
    }
}

pub(super) fn register(registry: &mut Registry) {
    registry.register(Abs);
    registry.register(Ceil);
    registry.register(Floor);
    registry.register(Round);
    registry.register(Mod);
    registry.register(Pow);
    registry.register(Sqrt);
    registry.register(Sign);
    registry.register(Truncate);
    registry.register(Extremum { greatest: true });
    registry.register(Extremum { greatest: false });
    registry.register(Pi);
    registry.register(Rand);
    registry.alias("ceil", "ceiling");
    registry.alias("pow", "power");
}
