//! Lowering of `sqlparser` expressions into the engine's expression tree.
//! Nothing is resolved here: column references stay by-name, subqueries are
//! planned into unresolved nodes, aggregates and window calls are
//! recognized syntactically.

use crate::error::{Error, Result};
use crate::planning::Planner;
use crate::types::data_type::IntervalUnit;
use crate::types::expression::{
    AggregateFunc, ArithOp, CmpOp, Expression, FrameBound, FrameUnits, SortField, SubqueryExpr, WindowFrame,
    WindowFunc, WindowSpec,
};
use crate::types::value::Value;
use rust_decimal::Decimal;
use sqlparser::ast as sql;
use std::str::FromStr;

impl Planner<'_> {
    pub(crate) fn lower_expr(&mut self, expr: &sql::Expr) -> Result<Expression> {
        match expr {
            sql::Expr::Value(v) => self.lower_value(v),
            sql::Expr::Identifier(ident) => Ok(self.lower_ident(None, ident)),
            sql::Expr::CompoundIdentifier(parts) => self.lower_compound_ident(parts),
            sql::Expr::Wildcard => Ok(Expression::Star { table: None }),
            sql::Expr::QualifiedWildcard(name) => Ok(Expression::Star {
                table: Some(object_name_string(name)),
            }),
            sql::Expr::Nested(inner) => self.lower_expr(inner),

            sql::Expr::BinaryOp { left, op, right } => self.lower_binary(left, op, right),
            sql::Expr::UnaryOp { op, expr } => {
                let inner = self.lower_expr(expr)?;
                match op {
                    sql::UnaryOperator::Plus => Ok(inner),
                    sql::UnaryOperator::Minus => Ok(Expression::Negate(Box::new(inner))),
                    sql::UnaryOperator::Not => Ok(Expression::Not(Box::new(inner))),
                    other => Err(Error::UnsupportedFeature(format!("unary operator {:?}", other))),
                }
            }

            sql::Expr::IsNull(e) => Ok(Expression::IsNull { expr: Box::new(self.lower_expr(e)?), negated: false }),
            sql::Expr::IsNotNull(e) => Ok(Expression::IsNull { expr: Box::new(self.lower_expr(e)?), negated: true }),
            sql::Expr::IsTrue(e) => Ok(Expression::Compare {
                op: CmpOp::NullSafeEq,
                left: Box::new(self.lower_expr(e)?),
                right: Box::new(Expression::literal(Value::I8(1))),
            }),
            sql::Expr::IsFalse(e) => Ok(Expression::Compare {
                op: CmpOp::NullSafeEq,
                left: Box::new(self.lower_expr(e)?),
                right: Box::new(Expression::literal(Value::I8(0))),
            }),

            sql::Expr::InList { expr, list, negated } => Ok(Expression::InList {
                expr: Box::new(self.lower_expr(expr)?),
                list: list.iter().map(|e| self.lower_expr(e)).collect::<Result<_>>()?,
                negated: *negated,
            }),
            sql::Expr::InSubquery { expr, subquery, negated } => {
                let node = self.plan_query(subquery)?;
                Ok(Expression::InSubquery {
                    expr: Box::new(self.lower_expr(expr)?),
                    subquery: Box::new(SubqueryExpr::new(node)),
                    negated: *negated,
                })
            }
            sql::Expr::Between { expr, negated, low, high } => Ok(Expression::Between {
                expr: Box::new(self.lower_expr(expr)?),
                low: Box::new(self.lower_expr(low)?),
                high: Box::new(self.lower_expr(high)?),
                negated: *negated,
            }),
            sql::Expr::Like { negated, expr, pattern, escape_char, .. } => {
                let escape = parse_escape(escape_char.as_deref())?;
                Ok(Expression::Like {
                    expr: Box::new(self.lower_expr(expr)?),
                    pattern: Box::new(self.lower_expr(pattern)?),
                    escape,
                    negated: *negated,
                })
            }
            sql::Expr::RLike { negated, expr, pattern, .. } => Ok(Expression::Regexp {
                expr: Box::new(self.lower_expr(expr)?),
                pattern: Box::new(self.lower_expr(pattern)?),
                negated: *negated,
            }),

            sql::Expr::Case { operand, conditions, results, else_result } => {
                let operand = operand.as_ref().map(|o| self.lower_expr(o).map(Box::new)).transpose()?;
                let mut branches = Vec::with_capacity(conditions.len());
                for (when, then) in conditions.iter().zip(results.iter()) {
                    branches.push((self.lower_expr(when)?, self.lower_expr(then)?));
                }
                let else_expr = else_result.as_ref().map(|e| self.lower_expr(e).map(Box::new)).transpose()?;
                Ok(Expression::Case { operand, branches, else_expr })
            }

            sql::Expr::Tuple(items) => Ok(Expression::Tuple(
                items.iter().map(|e| self.lower_expr(e)).collect::<Result<_>>()?,
            )),

            sql::Expr::Exists { subquery, negated } => {
                let node = self.plan_query(subquery)?;
                Ok(Expression::Exists { subquery: Box::new(SubqueryExpr::new(node)), negated: *negated })
            }
            sql::Expr::Subquery(query) => {
                let node = self.plan_query(query)?;
                Ok(Expression::ScalarSubquery(Box::new(SubqueryExpr::new(node))))
            }

            sql::Expr::Cast { expr, data_type, .. } => Ok(Expression::Cast {
                expr: Box::new(self.lower_expr(expr)?),
                to: self.lower_data_type(data_type)?,
            }),

            sql::Expr::Function(f) => self.lower_function(f),

            sql::Expr::Interval(interval) => self.lower_interval(interval),

            sql::Expr::Extract { field, expr, .. } => Ok(Expression::FunctionCall {
                name: "extract".into(),
                args: vec![
                    Expression::literal(Value::Str(format!("{:?}", field).to_uppercase())),
                    self.lower_expr(expr)?,
                ],
            }),
            sql::Expr::Substring { expr, substring_from, substring_for, .. } => {
                let mut args = vec![self.lower_expr(expr)?];
                args.push(match substring_from {
                    Some(from) => self.lower_expr(from)?,
                    None => Expression::literal(Value::I64(1)),
                });
                if let Some(len) = substring_for {
                    args.push(self.lower_expr(len)?);
                }
                Ok(Expression::FunctionCall { name: "substring".into(), args })
            }
            sql::Expr::Trim { expr, trim_what, .. } => {
                if trim_what.is_some() {
                    return Err(Error::UnsupportedFeature("TRIM with a custom removal string".into()));
                }
                Ok(Expression::FunctionCall { name: "trim".into(), args: vec![self.lower_expr(expr)?] })
            }
            sql::Expr::Position { expr, r#in } => Ok(Expression::FunctionCall {
                name: "instr".into(),
                args: vec![self.lower_expr(r#in)?, self.lower_expr(expr)?],
            }),
            sql::Expr::Ceil { expr, .. } => Ok(Expression::FunctionCall {
                name: "ceil".into(),
                args: vec![self.lower_expr(expr)?],
            }),
            sql::Expr::Floor { expr, .. } => Ok(Expression::FunctionCall {
                name: "floor".into(),
                args: vec![self.lower_expr(expr)?],
            }),

            other => Err(Error::UnsupportedFeature(format!("expression {}", other))),
        }
    }

    fn lower_value(&mut self, v: &sql::Value) -> Result<Expression> {
        Ok(match v {
            sql::Value::Number(text, _) => Expression::literal(parse_number(text)?),
            sql::Value::SingleQuotedString(s) | sql::Value::DoubleQuotedString(s) => {
                Expression::literal(Value::Str(s.clone()))
            }
            sql::Value::HexStringLiteral(hex_text) => {
                let bytes = hex::decode(hex_text)
                    .map_err(|_| Error::SyntaxError(format!("invalid hex literal x'{}'", hex_text)))?;
                Expression::literal(Value::Bytes(bytes))
            }
            sql::Value::Boolean(b) => Expression::literal(Value::I8(*b as i8)),
            sql::Value::Null => Expression::literal(Value::Null),
            sql::Value::Placeholder(_) => {
                let i = self.next_parameter;
                self.next_parameter += 1;
                Expression::Parameter(i)
            }
            other => return Err(Error::UnsupportedFeature(format!("literal {}", other))),
        })
    }

    fn lower_ident(&mut self, table: Option<String>, ident: &sql::Ident) -> Expression {
        let name = ident.value.clone();
        if let Some(system) = name.strip_prefix("@@") {
            let system = system
                .strip_prefix("global.")
                .or_else(|| system.strip_prefix("session."))
                .unwrap_or(system);
            return Expression::SystemVariable(system.to_string());
        }
        if let Some(user) = name.strip_prefix('@') {
            return Expression::UserVariable(user.to_string());
        }
        Expression::UnresolvedColumn { table, name }
    }

    fn lower_compound_ident(&mut self, parts: &[sql::Ident]) -> Result<Expression> {
        if let Some(first) = parts.first() {
            if let Some(scope) = first.value.strip_prefix("@@") {
                // @@global.x / @@session.x
                if parts.len() == 2 && (scope.eq_ignore_ascii_case("global") || scope.eq_ignore_ascii_case("session")) {
                    return Ok(Expression::SystemVariable(parts[1].value.clone()));
                }
            }
        }
        match parts {
            [table, column] => Ok(self.lower_ident(Some(table.value.clone()), column)),
            [_db, table, column] => Ok(self.lower_ident(Some(table.value.clone()), column)),
            _ => Err(Error::SyntaxError(format!(
                "unexpected identifier {}",
                parts.iter().map(|p| p.value.clone()).collect::<Vec<_>>().join(".")
            ))),
        }
    }

    fn lower_binary(&mut self, left: &sql::Expr, op: &sql::BinaryOperator, right: &sql::Expr) -> Result<Expression> {
        use sql::BinaryOperator as B;
        let l = Box::new(self.lower_expr(left)?);
        let r = Box::new(self.lower_expr(right)?);
        let arith = |op: ArithOp, l, r| Expression::Arithmetic { op, left: l, right: r };
        let cmp = |op: CmpOp, l, r| Expression::Compare { op, left: l, right: r };
        Ok(match op {
            B::Plus => arith(ArithOp::Add, l, r),
            B::Minus => arith(ArithOp::Subtract, l, r),
            B::Multiply => arith(ArithOp::Multiply, l, r),
            B::Divide => arith(ArithOp::Divide, l, r),
            B::Modulo => arith(ArithOp::Modulo, l, r),
            B::MyIntegerDivide => arith(ArithOp::IntDivide, l, r),
            B::BitwiseAnd => arith(ArithOp::BitAnd, l, r),
            B::BitwiseOr => arith(ArithOp::BitOr, l, r),
            B::BitwiseXor => arith(ArithOp::BitXor, l, r),
            B::PGBitwiseShiftLeft => arith(ArithOp::ShiftLeft, l, r),
            B::PGBitwiseShiftRight => arith(ArithOp::ShiftRight, l, r),
            B::Eq => cmp(CmpOp::Eq, l, r),
            B::NotEq => cmp(CmpOp::NotEq, l, r),
            B::Lt => cmp(CmpOp::Lt, l, r),
            B::LtEq => cmp(CmpOp::LtEq, l, r),
            B::Gt => cmp(CmpOp::Gt, l, r),
            B::GtEq => cmp(CmpOp::GtEq, l, r),
            B::Spaceship => cmp(CmpOp::NullSafeEq, l, r),
            B::And => Expression::And(l, r),
            B::Or => Expression::Or(l, r),
            B::Xor => Expression::Xor(l, r),
            B::StringConcat => Expression::FunctionCall { name: "concat".into(), args: vec![*l, *r] },
            other => return Err(Error::UnsupportedFeature(format!("binary operator {:?}", other))),
        })
    }

    fn lower_function(&mut self, f: &sql::Function) -> Result<Expression> {
        let name = object_name_string(&f.name).to_lowercase();

        let (args, distinct) = self.lower_function_args(&f.args)?;

        // Window call?
        if let Some(over) = &f.over {
            let spec = match over {
                sql::WindowType::WindowSpec(spec) => self.lower_window_spec(spec)?,
                sql::WindowType::NamedWindow(ident) => {
                    return Err(Error::UnsupportedFeature(format!("named window {}", ident)));
                }
            };
            let func = window_func(&name, &args)?;
            return Ok(Expression::WindowFunction { func, args: window_args(&name, args), over: spec });
        }

        // Aggregate call?
        if let Some(agg) = aggregate_func(&name) {
            let star = args.first().map(|a| matches!(a, Expression::Star { .. })).unwrap_or(true);
            let (func, arg) = if agg == AggregateFunc::CountStar {
                if star {
                    (AggregateFunc::CountStar, None)
                } else {
                    (AggregateFunc::Count, Some(Box::new(args.into_iter().next().unwrap())))
                }
            } else {
                let first = args.into_iter().next().ok_or_else(|| Error::FunctionArity {
                    name: name.to_uppercase(),
                    expected: "1".into(),
                    actual: 0,
                })?;
                (agg, Some(Box::new(first)))
            };
            return Ok(Expression::Aggregate { func, arg, distinct });
        }

        Ok(Expression::FunctionCall { name, args })
    }

    fn lower_function_args(&mut self, args: &sql::FunctionArguments) -> Result<(Vec<Expression>, bool)> {
        match args {
            sql::FunctionArguments::None => Ok((Vec::new(), false)),
            sql::FunctionArguments::Subquery(query) => {
                let node = self.plan_query(query)?;
                Ok((vec![Expression::ScalarSubquery(Box::new(SubqueryExpr::new(node)))], false))
            }
            sql::FunctionArguments::List(list) => {
                let distinct = matches!(list.duplicate_treatment, Some(sql::DuplicateTreatment::Distinct));
                let mut out = Vec::with_capacity(list.args.len());
                for arg in &list.args {
                    match arg {
                        sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Expr(e)) => out.push(self.lower_expr(e)?),
                        sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Wildcard) => {
                            out.push(Expression::Star { table: None })
                        }
                        sql::FunctionArg::Unnamed(sql::FunctionArgExpr::QualifiedWildcard(name)) => {
                            out.push(Expression::Star { table: Some(object_name_string(name)) })
                        }
                        other => {
                            return Err(Error::UnsupportedFeature(format!("function argument {}", other)));
                        }
                    }
                }
                Ok((out, distinct))
            }
        }
    }

    pub(crate) fn lower_window_spec(&mut self, spec: &sql::WindowSpec) -> Result<WindowSpec> {
        let partition_by = spec
            .partition_by
            .iter()
            .map(|e| self.lower_expr(e))
            .collect::<Result<Vec<_>>>()?;
        let order_by = spec
            .order_by
            .iter()
            .map(|o| self.lower_order_by_expr(o))
            .collect::<Result<Vec<_>>>()?;
        let frame = spec.window_frame.as_ref().map(|f| self.lower_frame(f)).transpose()?;
        Ok(WindowSpec { partition_by, order_by, frame })
    }

    pub(crate) fn lower_order_by_expr(&mut self, o: &sql::OrderByExpr) -> Result<SortField> {
        Ok(SortField {
            expr: self.lower_expr(&o.expr)?,
            ascending: o.asc.unwrap_or(true),
        })
    }

    fn lower_frame(&mut self, frame: &sql::WindowFrame) -> Result<WindowFrame> {
        let units = match frame.units {
            sql::WindowFrameUnits::Rows => FrameUnits::Rows,
            sql::WindowFrameUnits::Range => FrameUnits::Range,
            sql::WindowFrameUnits::Groups => {
                return Err(Error::UnsupportedFeature("GROUPS window frames".into()));
            }
        };
        let start = self.lower_frame_bound(&frame.start_bound)?;
        let end = match &frame.end_bound {
            Some(b) => self.lower_frame_bound(b)?,
            None => FrameBound::CurrentRow,
        };
        Ok(WindowFrame { units, start, end })
    }

    fn lower_frame_bound(&mut self, bound: &sql::WindowFrameBound) -> Result<FrameBound> {
        Ok(match bound {
            sql::WindowFrameBound::CurrentRow => FrameBound::CurrentRow,
            sql::WindowFrameBound::Preceding(None) => FrameBound::UnboundedPreceding,
            sql::WindowFrameBound::Following(None) => FrameBound::UnboundedFollowing,
            sql::WindowFrameBound::Preceding(Some(e)) => FrameBound::Preceding(self.frame_offset(e)?),
            sql::WindowFrameBound::Following(Some(e)) => FrameBound::Following(self.frame_offset(e)?),
        })
    }

    fn frame_offset(&mut self, e: &sql::Expr) -> Result<u64> {
        match self.lower_expr(e)? {
            Expression::Literal { value, .. } => {
                let n = value.to_i64()?;
                if n < 0 {
                    return Err(Error::InvalidArgument(format!("negative frame offset {}", n)));
                }
                Ok(n as u64)
            }
            other => Err(Error::InvalidArgument(format!("frame offset {}", other))),
        }
    }

    fn lower_interval(&mut self, interval: &sql::Interval) -> Result<Expression> {
        let value = self.lower_expr(&interval.value)?;
        let unit = match &interval.leading_field {
            Some(sql::DateTimeField::Year) => IntervalUnit::Year,
            Some(sql::DateTimeField::Quarter) => IntervalUnit::Quarter,
            Some(sql::DateTimeField::Month) => IntervalUnit::Month,
            Some(sql::DateTimeField::Week(_)) => IntervalUnit::Week,
            Some(sql::DateTimeField::Day) => IntervalUnit::Day,
            Some(sql::DateTimeField::Hour) => IntervalUnit::Hour,
            Some(sql::DateTimeField::Minute) => IntervalUnit::Minute,
            Some(sql::DateTimeField::Second) => IntervalUnit::Second,
            Some(sql::DateTimeField::Microsecond) => IntervalUnit::Microsecond,
            other => {
                return Err(Error::UnsupportedFeature(format!("interval unit {:?}", other)));
            }
        };
        Ok(Expression::Interval { value: Box::new(value), unit })
    }
}

fn parse_escape(escape: Option<&str>) -> Result<Option<char>> {
    match escape {
        None => Ok(None),
        Some(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Some(c)),
                _ => Err(Error::InvalidArgument(format!("LIKE escape '{}' must be a single character", s))),
            }
        }
    }
}

pub(crate) fn parse_number(text: &str) -> Result<Value> {
    if !text.contains(['.', 'e', 'E']) {
        if let Ok(n) = text.parse::<i64>() {
            return Ok(Value::I64(n));
        }
        if let Ok(n) = text.parse::<u64>() {
            return Ok(Value::U64(n));
        }
    }
    if let Ok(d) = Decimal::from_str(text) {
        if text.contains('.') && !text.contains(['e', 'E']) {
            return Ok(Value::Decimal(d));
        }
    }
    text.parse::<f64>()
        .map(Value::F64)
        .map_err(|_| Error::SyntaxError(format!("invalid numeric literal {}", text)))
}

pub(crate) fn object_name_string(name: &sql::ObjectName) -> String {
    name.0
        .iter()
        .map(|i| i.value.clone())
        .collect::<Vec<_>>()
        .join(".")
}

/// The last identifier of a possibly-qualified name, with the database
/// qualifier (if any) alongside.
pub(crate) fn split_object_name(name: &sql::ObjectName) -> (Option<String>, String) {
    let parts: Vec<String> = name.0.iter().map(|i| i.value.clone()).collect();
    match parts.as_slice() {
        [single] => (None, single.clone()),
        [db, table] => (Some(db.clone()), table.clone()),
        _ => (None, parts.join(".")),
    }
}

fn aggregate_func(name: &str) -> Option<AggregateFunc> {
    match name {
        "count" => Some(AggregateFunc::CountStar),
        "sum" => Some(AggregateFunc::Sum),
        "avg" => Some(AggregateFunc::Avg),
        "min" => Some(AggregateFunc::Min),
        "max" => Some(AggregateFunc::Max),
        _ => None,
    }
}

fn window_func(name: &str, args: &[Expression]) -> Result<WindowFunc> {
    let offset_of = |args: &[Expression]| -> u64 {
        match args.get(1) {
            Some(Expression::Literal { value, .. }) => value.to_i64().map(|n| n.max(0) as u64).unwrap_or(1),
            _ => 1,
        }
    };
    Ok(match name {
        "row_number" => WindowFunc::RowNumber,
        "rank" => WindowFunc::Rank,
        "dense_rank" => WindowFunc::DenseRank,
        "percent_rank" => WindowFunc::PercentRank,
        "lag" => WindowFunc::Lag { offset: offset_of(args) },
        "lead" => WindowFunc::Lead { offset: offset_of(args) },
        "first_value" => WindowFunc::FirstValue,
        "last_value" => WindowFunc::LastValue,
        "count" => WindowFunc::Agg(if args.is_empty() || matches!(args[0], Expression::Star { .. }) {
            AggregateFunc::CountStar
        } else {
            AggregateFunc::Count
        }),
        "sum" => WindowFunc::Agg(AggregateFunc::Sum),
        "avg" => WindowFunc::Agg(AggregateFunc::Avg),
        "min" => WindowFunc::Agg(AggregateFunc::Min),
        "max" => WindowFunc::Agg(AggregateFunc::Max),
        other => return Err(Error::UnsupportedFeature(format!("window function {}", other))),
    })
}

/// LAG/LEAD keep (value, default) as evaluation args; the offset moved into
/// the function. COUNT(*) keeps no args.
fn window_args(name: &str, args: Vec<Expression>) -> Vec<Expression> {
    match name {
        "lag" | "lead" => {
            let mut iter = args.into_iter();
            let mut out = Vec::new();
            if let Some(value) = iter.next() {
                out.push(value);
            }
            // Skip the offset argument.
            let _ = iter.next();
            if let Some(default) = iter.next() {
                out.push(default);
            }
            out
        }
        "count" => args
            .into_iter()
            .filter(|a| !matches!(a, Expression::Star { .. }))
            .collect(),
        _ => args,
    }
}
