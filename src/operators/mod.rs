//! Value kernels for the expression evaluator: arithmetic, comparison,
//! logic and pattern matching over dynamic `Value`s.
//!
//! NULL handling follows SQL: any NULL operand yields NULL, except for the
//! three-valued logic connectives and `<=>`. Division by zero surfaces as
//! `Error::DivisionByZero`; the evaluator decides whether that becomes NULL
//! plus a warning or a hard error based on `sql_mode`.

pub mod add;
pub mod bitwise;
pub mod compare;
pub mod divide;
pub mod helpers;
pub mod like;
pub mod logic;
pub mod multiply;
pub mod regexp;
pub mod remainder;
pub mod subtract;

use crate::error::Result;
use crate::types::expression::{ArithOp, CmpOp};
use crate::types::value::Value;

pub use compare::{compare_values, execute_compare};
pub use logic::{execute_and, execute_not, execute_or, execute_xor};

/// Dispatches a binary arithmetic operator.
pub fn execute_arithmetic(op: ArithOp, left: &Value, right: &Value) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    match op {
        ArithOp::Add => add::execute(left, right),
        ArithOp::Subtract => subtract::execute(left, right),
        ArithOp::Multiply => multiply::execute(left, right),
        ArithOp::Divide => divide::execute(left, right),
        ArithOp::IntDivide => divide::execute_int(left, right),
        ArithOp::Modulo => remainder::execute(left, right),
        ArithOp::BitAnd | ArithOp::BitOr | ArithOp::BitXor | ArithOp::ShiftLeft | ArithOp::ShiftRight => {
            bitwise::execute(op, left, right)
        }
    }
}

/// Dispatches a comparison operator; returns I8(0/1) or NULL.
pub fn execute_comparison(op: CmpOp, left: &Value, right: &Value) -> Result<Value> {
    execute_compare(op, left, right)
}
