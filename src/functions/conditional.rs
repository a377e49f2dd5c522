//! Conditional functions: IF, IFNULL, NULLIF, COALESCE.

use super::{Function, FunctionContext, FunctionSignature, Registry};
use crate::error::Result;
use crate::types::coercion::common_type;
use crate::types::data_type::DataType;
use crate::types::value::Value;

fn sig(name: &'static str, min: usize, max: usize) -> FunctionSignature {
    FunctionSignature { name, min_args: min, max_args: max, deterministic: true }
}

struct If;
impl Function for If {
    fn signature(&self) -> FunctionSignature {
        sig("IF", 3, 3)
    }
    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        Ok(common_type(
            arg_types.get(1).unwrap_or(&DataType::Null),
            arg_types.get(2).unwrap_or(&DataType::Null),
        ))
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        Ok(if args[0].is_true() == Some(true) {
            args[1].clone()
        } else {
            args[2].clone()
        })
    }
}

struct IfNull;
impl Function for IfNull {
    fn signature(&self) -> FunctionSignature {
        sig("IFNULL", 2, 2)
    }
    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        Ok(common_type(
            arg_types.first().unwrap_or(&DataType::Null),
            arg_types.get(1).unwrap_or(&DataType::Null),
        ))
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        Ok(if args[0].is_null() { args[1].clone() } else { args[0].clone() })
    }
}

struct NullIf;
impl Function for NullIf {
    fn signature(&self) -> FunctionSignature {
        sig("NULLIF", 2, 2)
    }
    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        Ok(arg_types.first().cloned().unwrap_or(DataType::Null))
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        if args[0].is_null() || args[1].is_null() {
            return Ok(args[0].clone());
        }
        let eq = crate::operators::compare_values(&args[0], &args[1])?
            .map(|o| o == std::cmp::Ordering::Equal)
            .unwrap_or(false);
        Ok(if eq { Value::Null } else { args[0].clone() })
    }
}

struct Coalesce;
impl Function for Coalesce {
    fn signature(&self) -> FunctionSignature {
        sig("COALESCE", 1, usize::MAX)
    }
    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        let mut t = DataType::Null;
        for a in arg_types {
            t = common_type(&t, a);
        }
        Ok(t)
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        for arg in args {
            if !arg.is_null() {
                return Ok(arg.clone());
            }
        }
        Ok(Value::Null)
    }
}

pub(super) fn register(registry: &mut Registry) {
    registry.register(If);
    registry.register(IfNull);
    registry.register(NullIf);
    registry.register(Coalesce);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{LockTable, Session};
    use crate::variables::GlobalVariables;

    #[test]
    fn nullif_compares_typed() {
        let session = Session::new(1, "root", "", GlobalVariables::new(), LockTable::new());
        let ctx = FunctionContext { session: &session };
        assert_eq!(NullIf.execute(&[Value::I64(1), Value::Str("1".into())], &ctx).unwrap(), Value::Null);
        assert_eq!(NullIf.execute(&[Value::I64(1), Value::I64(2)], &ctx).unwrap(), Value::I64(1));
        assert_eq!(NullIf.execute(&[Value::Null, Value::Null], &ctx).unwrap(), Value::Null);
    }
}
