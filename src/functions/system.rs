//! Session and system functions. Everything here is non-deterministic for
//! rewrite purposes: the analyzer must not fold or push these around.

use super::{int_arg, str_arg, Function, FunctionContext, FunctionSignature, Registry};
use crate::error::Result;
use crate::types::data_type::DataType;
use crate::types::value::Value;

fn volatile(name: &'static str, min: usize, max: usize) -> FunctionSignature {
    FunctionSignature { name, min_args: min, max_args: max, deterministic: false }
}

struct DatabaseFn;
impl Function for DatabaseFn {
    fn signature(&self) -> FunctionSignature {
        volatile("DATABASE", 0, 0)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::text())
    }
    fn execute(&self, _: &[Value], ctx: &FunctionContext) -> Result<Value> {
        let db = ctx.session.current_database();
        Ok(if db.is_empty() { Value::Null } else { Value::Str(db) })
    }
}

struct UserFn;
impl Function for UserFn {
    fn signature(&self) -> FunctionSignature {
        volatile("USER", 0, 0)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::text())
    }
    fn execute(&self, _: &[Value], ctx: &FunctionContext) -> Result<Value> {
        Ok(Value::Str(format!("{}@%", ctx.session.user())))
    }
}

struct ConnectionId;
impl Function for ConnectionId {
    fn signature(&self) -> FunctionSignature {
        volatile("CONNECTION_ID", 0, 0)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::ubigint())
    }
    fn execute(&self, _: &[Value], ctx: &FunctionContext) -> Result<Value> {
        Ok(Value::U64(ctx.session.connection_id() as u64))
    }
}

struct LastInsertId;
impl Function for LastInsertId {
    fn signature(&self) -> FunctionSignature {
        volatile("LAST_INSERT_ID", 0, 1)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::ubigint())
    }
    fn execute(&self, args: &[Value], ctx: &FunctionContext) -> Result<Value> {
        if let Some(v) = int_arg(args, 0)? {
            ctx.session.set_last_insert_id(v as u64);
        }
        Ok(Value::U64(ctx.session.last_insert_id()))
    }
}

struct RowCount;
impl Function for RowCount {
    fn signature(&self) -> FunctionSignature {
        volatile("ROW_COUNT", 0, 0)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::bigint())
    }
    fn execute(&self, _: &[Value], ctx: &FunctionContext) -> Result<Value> {
        Ok(Value::I64(ctx.session.row_count()))
    }
}

struct FoundRows;
impl Function for FoundRows {
    fn signature(&self) -> FunctionSignature {
        volatile("FOUND_ROWS", 0, 0)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::ubigint())
    }
    fn execute(&self, _: &[Value], ctx: &FunctionContext) -> Result<Value> {
        Ok(Value::U64(ctx.session.found_rows()))
    }
}

struct VersionFn;
impl Function for VersionFn {
    fn signature(&self) -> FunctionSignature {
        volatile("VERSION", 0, 0)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::text())
    }
    fn execute(&self, _: &[Value], _: &FunctionContext) -> Result<Value> {
        Ok(Value::Str(crate::variables::VERSION.to_string()))
    }
}

struct UuidFn;
impl Function for UuidFn {
    fn signature(&self) -> FunctionSignature {
        volatile("UUID", 0, 0)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::varchar(36))
    }
    fn execute(&self, _: &[Value], _: &FunctionContext) -> Result<Value> {
        Ok(Value::Str(uuid::Uuid::new_v4().to_string()))
    }
}

struct GetLock;
impl Function for GetLock {
    fn signature(&self) -> FunctionSignature {
        volatile("GET_LOCK", 2, 2)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::bigint())
    }
    fn execute(&self, args: &[Value], ctx: &FunctionContext) -> Result<Value> {
        let Some(name) = str_arg(args, 0)? else { return Ok(Value::Null) };
        let ok = ctx.session.locks().acquire(&name, ctx.session.connection_id());
        Ok(Value::I64(ok as i64))
    }
}

struct ReleaseLock;
impl Function for ReleaseLock {
    fn signature(&self) -> FunctionSignature {
        volatile("RELEASE_LOCK", 1, 1)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::bigint())
    }
    fn execute(&self, args: &[Value], ctx: &FunctionContext) -> Result<Value> {
        let Some(name) = str_arg(args, 0)? else { return Ok(Value::Null) };
        Ok(match ctx.session.locks().release(&name, ctx.session.connection_id()) {
            Some(released) => Value::I64(released as i64),
            None => Value::Null,
        })
    }
}

struct IsUsedLock;
impl Function for IsUsedLock {
    fn signature(&self) -> FunctionSignature {
        volatile("IS_USED_LOCK", 1, 1)
    }
    fn return_type(&self, _: &[DataType]) -> Result<DataType> {
        Ok(DataType::ubigint())
    }
    fn execute(&self, args: &[Value], ctx: &FunctionContext) -> Result<Value> {
        let Some(name) = str_arg(args, 0)? else { return Ok(Value::Null) };
        Ok(match ctx.session.locks().holder(&name) {
            Some(owner) => Value::U64(owner as u64),
            None => Value::Null,
        })
    }
}

pub(super) fn register(registry: &mut Registry) {
    registry.register(DatabaseFn);
    registry.register(UserFn);
    registry.register(ConnectionId);
    registry.register(LastInsertId);
    registry.register(RowCount);
    registry.register(FoundRows);
    registry.register(VersionFn);
    registry.register(UuidFn);
    registry.register(GetLock);
    registry.register(ReleaseLock);
    registry.register(IsUsedLock);
    registry.alias("database", "schema");
    registry.alias("user", "current_user");
    registry.alias("user", "session_user");
}
