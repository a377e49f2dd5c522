//! Spatial functions.

use super::{f64_arg, int_arg, Function, FunctionContext, FunctionSignature, Registry};
use crate::error::{Error, Result};
use crate::types::data_type::{DataType, SpatialClass};
use crate::types::spatial::Geometry;
use crate::types::value::Value;

fn sig(name: &'static str, min: usize, max: usize) -> FunctionSignature {
    FunctionSignature { name, min_args: min, max_args: max, deterministic: true }
}

fn geometry_arg<'a>(args: &'a [Value], i: usize) -> Result<Option<&'a Geometry>> {
    match args.get(i) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Geometry(g)) => Ok(Some(g)),
        Some(other) => Err(Error::TypeMismatch { expected: "geometry".into(), found: other.data_type().to_string() }),
    }
}

struct PointFn;
impl Function for PointFn {
    fn signature(&self) -> FunctionSignature {
        sig("POINT", 2, 2)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::Spatial { class: SpatialClass::Point, srid: 0 })
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let (Some(x), Some(y)) = (f64_arg(args, 0)?, f64_arg(args, 1)?) else {
            return Ok(Value::Null);
        };
        Ok(Value::Geometry(Geometry::point(0, x, y)))
    }
}

struct StX;
impl Function for StX {
    fn signature(&self) -> FunctionSignature {
        sig("ST_X", 1, 1)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::Double)
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        match geometry_arg(args, 0)? {
            Some(g) => g
                .x()
                .map(Value::F64)
                .ok_or_else(|| Error::InvalidArgument("ST_X requires a point".into())),
            None => Ok(Value::Null),
        }
    }
}

struct StY;
impl Function for StY {
    fn signature(&self) -> FunctionSignature {
        sig("ST_Y", 1, 1)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::Double)
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        match geometry_arg(args, 0)? {
            Some(g) => g
                .y()
                .map(Value::F64)
                .ok_or_else(|| Error::InvalidArgument("ST_Y requires a point".into())),
            None => Ok(Value::Null),
        }
    }
}

struct StSrid;
impl Function for StSrid {
    fn signature(&self) -> FunctionSignature {
        sig("ST_SRID", 1, 2)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::ubigint())
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let Some(g) = geometry_arg(args, 0)? else { return Ok(Value::Null) };
        if args.len() > 1 {
            let Some(srid) = int_arg(args, 1)? else { return Ok(Value::Null) };
            let mut updated = g.clone();
            updated.srid = srid as u32;
            return Ok(Value::Geometry(updated));
        }
        Ok(Value::U64(g.srid as u64))
    }
}

struct StDistance;
impl Function for StDistance {
    fn signature(&self) -> FunctionSignature {
        sig("ST_DISTANCE", 2, 2)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::Double)
    }
    fn execute(&self, args: &[Value], _: &FunctionContext) -> Result<Value> {
        let (Some(a), Some(b)) = (geometry_arg(args, 0)?, geometry_arg(args, 1)?) else {
            return Ok(Value::Null);
        };
        if a.srid != b.srid {
            return Err(Error::SridMismatch { value: b.srid, expected: a.srid });
        }
        a.distance(b)
            .map(Value::F64)
            .ok_or_else(|| Error::InvalidArgument("ST_DISTANCE requires points".into()))
    }
}

pub(super) fn register(registry: &mut Registry) {
    registry.register(PointFn);
    registry.register(StX);
    registry.register(StY);
    registry.register(StSrid);
    registry.register(StDistance);
}
