//! The expression evaluator.
//!
//! `eval(expr, row, outer, ctx)` computes a value against the current row.
//! Field indices below the row width read the row; indices past it read the
//! outer scope (the enclosing rows of a correlated subquery, nearest
//! first). AND/OR short-circuit; division by zero becomes NULL plus a
//! warning unless the context is strict.

use crate::error::{Error, Result};
use crate::execution::{executor, CachedSubquery, QueryCtx};
use crate::functions::{self, FunctionContext};
use crate::operators;
use crate::plan::Node;
use crate::types::expression::{CmpOp, Expression, SubqueryExpr};
use crate::types::value::{Row, Value};
use std::cmp::Ordering;
use std::sync::Arc;

pub fn eval(expr: &Expression, row: &Row, outer: &[Value], ctx: &QueryCtx) -> Result<Value> {
    match expr {
        Expression::Literal { value, .. } => Ok(value.clone()),

        Expression::Field { index, name, .. } => {
            if *index < row.len() {
                Ok(row[*index].clone())
            } else if *index - row.len() < outer.len() {
                Ok(outer[*index - row.len()].clone())
            } else {
                Err(Error::Internal(format!("field index {} ({}) out of range", index, name)))
            }
        }

        Expression::UnresolvedColumn { name, .. } => Err(Error::ColumnNotFound(name.clone())),
        Expression::Star { .. } => Err(Error::Internal("unexpanded * reached evaluation".into())),

        Expression::Parameter(i) => ctx
            .params
            .get(*i)
            .cloned()
            .ok_or(Error::UnboundPreparedStatementVariable(*i)),

        Expression::UserVariable(name) => Ok(ctx.session.get_user_variable(name)),
        Expression::SystemVariable(name) => ctx.session.get_variable(name),

        Expression::Arithmetic { op, left, right } => {
            let l = eval(left, row, outer, ctx)?;
            let r = eval(right, row, outer, ctx)?;
            match operators::execute_arithmetic(*op, &l, &r) {
                Err(Error::DivisionByZero) if !ctx.strict_errors => {
                    ctx.session.warn(1365, "Division by 0");
                    Ok(Value::Null)
                }
                other => other,
            }
        }

        Expression::Negate(e) => {
            let v = eval(e, row, outer, ctx)?;
            if v.is_null() {
                return Ok(Value::Null);
            }
            operators::execute_arithmetic(
                crate::types::expression::ArithOp::Subtract,
                &Value::I64(0),
                &v,
            )
        }

        Expression::Compare { op, left, right } => {
            let l = eval(left, row, outer, ctx)?;
            let r = eval(right, row, outer, ctx)?;
            operators::execute_compare(*op, &l, &r)
        }

        Expression::InList { expr, list, negated } => {
            let needle = eval(expr, row, outer, ctx)?;
            let mut saw_null = needle.is_null();
            for item in list {
                let candidate = eval(item, row, outer, ctx)?;
                match eq_with_null(&needle, &candidate)? {
                    Some(true) => return Ok(truth(!negated)),
                    Some(false) => {}
                    None => saw_null = true,
                }
            }
            Ok(if saw_null { Value::Null } else { truth(*negated) })
        }

        Expression::InSubquery { expr, subquery, negated } => {
            let needle = eval(expr, row, outer, ctx)?;
            let candidates = subquery_rows(subquery, row, outer, ctx)?;
            let mut saw_null = needle.is_null();
            for candidate in candidates.iter() {
                match eq_with_null(&needle, candidate)? {
                    Some(true) => return Ok(truth(!negated)),
                    Some(false) => {}
                    None => saw_null = true,
                }
            }
            Ok(if saw_null { Value::Null } else { truth(*negated) })
        }

        Expression::Between { expr, low, high, negated } => {
            let v = eval(expr, row, outer, ctx)?;
            let lo = eval(low, row, outer, ctx)?;
            let hi = eval(high, row, outer, ctx)?;
            let ge = operators::execute_compare(CmpOp::GtEq, &v, &lo)?;
            let le = operators::execute_compare(CmpOp::LtEq, &v, &hi)?;
            let result = operators::execute_and(&ge, &le)?;
            if *negated {
                operators::execute_not(&result)
            } else {
                Ok(result)
            }
        }

        Expression::Like { expr, pattern, escape, negated } => {
            let v = eval(expr, row, outer, ctx)?;
            let p = eval(pattern, row, outer, ctx)?;
            if v.is_null() || p.is_null() {
                return Ok(Value::Null);
            }
            let case_insensitive = expr
                .data_type()
                .collation()
                .map(|c| !c.case_sensitive())
                .unwrap_or(false);
            let matched = operators::like::matches(
                v.as_str_lossy().as_ref(),
                p.as_str_lossy().as_ref(),
                *escape,
                case_insensitive,
            )?;
            Ok(truth(matched != *negated))
        }

        Expression::Regexp { expr, pattern, negated } => {
            let v = eval(expr, row, outer, ctx)?;
            let p = eval(pattern, row, outer, ctx)?;
            if v.is_null() || p.is_null() {
                return Ok(Value::Null);
            }
            let case_insensitive = expr
                .data_type()
                .collation()
                .map(|c| !c.case_sensitive())
                .unwrap_or(false);
            let matched =
                operators::regexp::matches(v.as_str_lossy().as_ref(), p.as_str_lossy().as_ref(), case_insensitive)?;
            Ok(truth(matched != *negated))
        }

        Expression::And(l, r) => {
            let lv = eval(l, row, outer, ctx)?;
            if lv.is_true() == Some(false) {
                return Ok(truth(false));
            }
            let rv = eval(r, row, outer, ctx)?;
            operators::execute_and(&lv, &rv)
        }

        Expression::Or(l, r) => {
            let lv = eval(l, row, outer, ctx)?;
            if lv.is_true() == Some(true) {
                return Ok(truth(true));
            }
            let rv = eval(r, row, outer, ctx)?;
            operators::execute_or(&lv, &rv)
        }

        Expression::Xor(l, r) => {
            let lv = eval(l, row, outer, ctx)?;
            let rv = eval(r, row, outer, ctx)?;
            operators::execute_xor(&lv, &rv)
        }

        Expression::Not(e) => {
            let v = eval(e, row, outer, ctx)?;
            operators::execute_not(&v)
        }

        Expression::IsNull { expr, negated } => {
            let v = eval(expr, row, outer, ctx)?;
            Ok(truth(v.is_null() != *negated))
        }

        Expression::Case { operand, branches, else_expr } => {
            let operand_value = operand.as_ref().map(|o| eval(o, row, outer, ctx)).transpose()?;
            for (when, then) in branches {
                let matched = match &operand_value {
                    Some(op_v) => {
                        let w = eval(when, row, outer, ctx)?;
                        eq_with_null(op_v, &w)? == Some(true)
                    }
                    None => eval(when, row, outer, ctx)?.is_true() == Some(true),
                };
                if matched {
                    return eval(then, row, outer, ctx);
                }
            }
            match else_expr {
                Some(e) => eval(e, row, outer, ctx),
                None => Ok(Value::Null),
            }
        }

        Expression::Tuple(items) => {
            let mut vs = Vec::with_capacity(items.len());
            for item in items {
                vs.push(eval(item, row, outer, ctx)?);
            }
            Ok(Value::Tuple(vs))
        }

        Expression::ScalarSubquery(subquery) => scalar_subquery(subquery, row, outer, ctx),

        Expression::Exists { subquery, negated } => {
            let exists = exists_subquery(subquery, row, outer, ctx)?;
            Ok(truth(exists != *negated))
        }

        // Aggregates and window functions only produce values inside their
        // operators; a bare reference evaluates to NULL.
        Expression::Aggregate { .. } | Expression::WindowFunction { .. } => Ok(Value::Null),

        Expression::FunctionCall { name, args } => {
            let mut values = Vec::with_capacity(args.len());
            for a in args {
                values.push(eval(a, row, outer, ctx)?);
            }
            functions::execute(name, &values, &FunctionContext { session: &ctx.session })
        }

        Expression::Cast { expr, to } => {
            let v = eval(expr, row, outer, ctx)?;
            match to.convert(v) {
                Ok(v) => Ok(v),
                Err(e @ (Error::ConvertError { .. } | Error::ConvertingToTime(_))) if !ctx.strict_errors => {
                    ctx.session.warn(1292, e.to_string());
                    Ok(Value::Null)
                }
                Err(e) => Err(e),
            }
        }

        Expression::Interval { value, unit } => {
            let v = eval(value, row, outer, ctx)?;
            if v.is_null() {
                return Ok(Value::Null);
            }
            Ok(Value::Interval(unit.to_interval(v.to_i64()?)))
        }
    }
}

/// Evaluates a predicate in a filter position: errors MySQL treats as
/// non-matches (bad conversions) drop the row instead of failing the query.
pub fn eval_filter(predicate: &Expression, row: &Row, outer: &[Value], ctx: &QueryCtx) -> Result<bool> {
    match eval(predicate, row, outer, ctx) {
        Ok(v) => Ok(v.is_true() == Some(true)),
        Err(e) if e.filter_safe() => Ok(false),
        Err(e) => Err(e),
    }
}

fn truth(b: bool) -> Value {
    Value::I8(b as i8)
}

/// Equality with SQL NULL semantics: None when NULL decides the outcome.
/// Tuples compare element-wise.
pub fn eq_with_null(a: &Value, b: &Value) -> Result<Option<bool>> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => Ok(None),
        (Value::Tuple(xs), Value::Tuple(ys)) => {
            if xs.len() != ys.len() {
                return Err(Error::InvalidOperandColumns { expected: xs.len(), actual: ys.len() });
            }
            let mut saw_null = false;
            for (x, y) in xs.iter().zip(ys.iter()) {
                match eq_with_null(x, y)? {
                    Some(false) => return Ok(Some(false)),
                    Some(true) => {}
                    None => saw_null = true,
                }
            }
            Ok(if saw_null { None } else { Some(true) })
        }
        (a, b) => Ok(operators::compare_values(a, b)?.map(|o| o == Ordering::Equal)),
    }
}

/// The outer scope a subquery sees: the current row, then the enclosing
/// scope beyond it.
fn subquery_scope(row: &Row, outer: &[Value]) -> Vec<Value> {
    let mut scope = row.clone();
    scope.extend(outer.iter().cloned());
    scope
}

fn run_subquery(node: &Node, row: &Row, outer: &[Value], ctx: &QueryCtx) -> Result<Vec<Row>> {
    let scope = Arc::new(subquery_scope(row, outer));
    let rows = executor::node_rows(node, ctx, scope)?;
    rows.collect()
}

fn scalar_subquery(subquery: &SubqueryExpr, row: &Row, outer: &[Value], ctx: &QueryCtx) -> Result<Value> {
    if let Some(id) = subquery.cache_id {
        if let Some(CachedSubquery::Scalar(v)) = ctx.subquery_cache.lock().get(&id) {
            return Ok(v.clone());
        }
    }
    let mut rows = run_subquery(&subquery.node, row, outer, ctx)?;
    if rows.len() > 1 {
        return Err(Error::InvalidValue("scalar subquery returned more than one row".into()));
    }
    let value = match rows.pop() {
        None => Value::Null,
        Some(mut r) if r.len() == 1 => r.pop().unwrap(),
        Some(r) => Value::Tuple(r),
    };
    if let Some(id) = subquery.cache_id {
        ctx.subquery_cache.lock().insert(id, CachedSubquery::Scalar(value.clone()));
    }
    Ok(value)
}

fn subquery_rows(subquery: &SubqueryExpr, row: &Row, outer: &[Value], ctx: &QueryCtx) -> Result<Arc<Vec<Value>>> {
    if let Some(id) = subquery.cache_id {
        if let Some(CachedSubquery::Rows(rows)) = ctx.subquery_cache.lock().get(&id) {
            return Ok(rows.clone());
        }
    }
    let rows = run_subquery(&subquery.node, row, outer, ctx)?;
    let values: Vec<Value> = rows
        .into_iter()
        .map(|mut r| if r.len() == 1 { r.pop().unwrap() } else { Value::Tuple(r) })
        .collect();
    let values = Arc::new(values);
    if let Some(id) = subquery.cache_id {
        ctx.subquery_cache.lock().insert(id, CachedSubquery::Rows(values.clone()));
    }
    Ok(values)
}

fn exists_subquery(subquery: &SubqueryExpr, row: &Row, outer: &[Value], ctx: &QueryCtx) -> Result<bool> {
    if let Some(id) = subquery.cache_id {
        if let Some(CachedSubquery::Exists(b)) = ctx.subquery_cache.lock().get(&id) {
            return Ok(*b);
        }
    }
    let scope = Arc::new(subquery_scope(row, outer));
    let mut rows = executor::node_rows(&subquery.node, ctx, scope)?;
    let exists = match rows.next() {
        Some(Ok(_)) => true,
        Some(Err(e)) => return Err(e),
        None => false,
    };
    if let Some(id) = subquery.cache_id {
        ctx.subquery_cache.lock().insert(id, CachedSubquery::Exists(exists));
    }
    Ok(exists)
}

/// Evaluates an expression that must be constant (no field references), as
/// index bounds and LIMIT counts are.
pub fn eval_constant(expr: &Expression, ctx: &QueryCtx) -> Result<Value> {
    eval(expr, &Vec::new(), &[], ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::session::{LockTable, Session};
    use crate::storage::MemoryProvider;
    use crate::types::expression::ArithOp;
    use crate::variables::GlobalVariables;

    fn test_ctx() -> QueryCtx {
        let (provider, _db) = MemoryProvider::with_database("test");
        let session = Session::new(1, "root", "test", GlobalVariables::new(), LockTable::new());
        QueryCtx::new(session, Catalog::new(provider))
    }

    fn lit(v: Value) -> Expression {
        Expression::literal(v)
    }

    #[test]
    fn division_by_zero_yields_null_and_warning() {
        let ctx = test_ctx();
        let e = Expression::Arithmetic {
            op: ArithOp::Divide,
            left: Box::new(lit(Value::I64(1))),
            right: Box::new(lit(Value::I64(0))),
        };
        assert_eq!(eval(&e, &vec![], &[], &ctx).unwrap(), Value::Null);
        assert_eq!(ctx.session.warnings().len(), 1);
    }

    #[test]
    fn in_list_null_semantics() {
        let ctx = test_ctx();
        let make = |needle: Value, list: Vec<Value>| Expression::InList {
            expr: Box::new(lit(needle)),
            list: list.into_iter().map(lit).collect(),
            negated: false,
        };
        // hit
        let e = make(Value::I64(1), vec![Value::Null, Value::I64(1)]);
        assert_eq!(eval(&e, &vec![], &[], &ctx).unwrap(), Value::I8(1));
        // miss with NULL in list
        let e = make(Value::I64(9), vec![Value::Null, Value::I64(1)]);
        assert_eq!(eval(&e, &vec![], &[], &ctx).unwrap(), Value::Null);
        // plain miss
        let e = make(Value::I64(9), vec![Value::I64(1)]);
        assert_eq!(eval(&e, &vec![], &[], &ctx).unwrap(), Value::I8(0));
    }

    #[test]
    fn field_reads_outer_scope_past_row_width() {
        let ctx = test_ctx();
        let field = Expression::field(1, "t", "x", crate::types::DataType::bigint(), false);
        let row = vec![Value::I64(10)];
        let outer = vec![Value::I64(42)];
        assert_eq!(eval(&field, &row, &outer, &ctx).unwrap(), Value::I64(42));
    }

    #[test]
    fn short_circuit_and_skips_rhs_errors() {
        let ctx = test_ctx();
        let rhs = Expression::FunctionCall { name: "no_such_fn".into(), args: vec![] };
        let e = Expression::And(Box::new(lit(Value::I8(0))), Box::new(rhs));
        assert_eq!(eval(&e, &vec![], &[], &ctx).unwrap(), Value::I8(0));
    }

    #[test]
    fn tuple_equality_null_elementwise() {
        assert_eq!(
            eq_with_null(
                &Value::Tuple(vec![Value::I64(1), Value::Null]),
                &Value::Tuple(vec![Value::I64(1), Value::I64(2)])
            )
            .unwrap(),
            None
        );
        assert_eq!(
            eq_with_null(
                &Value::Tuple(vec![Value::I64(1), Value::Null]),
                &Value::Tuple(vec![Value::I64(2), Value::I64(2)])
            )
            .unwrap(),
            Some(false)
        );
    }
}
