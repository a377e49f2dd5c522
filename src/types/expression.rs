//! The typed expression tree.
//!
//! Expressions are side-effect-free value computations, evaluated against a
//! row during execution. Column references carry a zero-based field index
//! into the enclosing operator's input row; the analyzer keeps those indices
//! valid across every rewrite. Every resolved expression reports a static
//! result type and a nullability flag.

use crate::error::Result;
use crate::plan::Node;
use crate::types::coercion;
use crate::types::data_type::{DataType, IntervalUnit};
use crate::types::value::Value;
use std::fmt;
use std::fmt::Display;

/// Binary arithmetic and bit operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    /// Integer division, truncating toward zero.
    IntDivide,
    Modulo,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
}

impl ArithOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Subtract => "-",
            ArithOp::Multiply => "*",
            ArithOp::Divide => "/",
            ArithOp::IntDivide => "DIV",
            ArithOp::Modulo => "%",
            ArithOp::BitAnd => "&",
            ArithOp::BitOr => "|",
            ArithOp::BitXor => "^",
            ArithOp::ShiftLeft => "<<",
            ArithOp::ShiftRight => ">>",
        }
    }

    pub fn is_bitwise(&self) -> bool {
        matches!(
            self,
            ArithOp::BitAnd | ArithOp::BitOr | ArithOp::BitXor | ArithOp::ShiftLeft | ArithOp::ShiftRight
        )
    }
}

/// Comparison operators. `NullSafeEq` is `<=>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NullSafeEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    NotEq,
}

impl CmpOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::NullSafeEq => "<=>",
            CmpOp::Lt => "<",
            CmpOp::LtEq => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtEq => ">=",
            CmpOp::NotEq => "!=",
        }
    }

    pub fn flip(&self) -> CmpOp {
        match self {
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::LtEq => CmpOp::GtEq,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::GtEq => CmpOp::LtEq,
            other => *other,
        }
    }
}

/// Aggregate functions recognized by the grouping operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
    CountStar,
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunc {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunc::CountStar | AggregateFunc::Count => "COUNT",
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Avg => "AVG",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
        }
    }
}

/// Window-only functions, plus aggregates used over a window.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowFunc {
    RowNumber,
    Rank,
    DenseRank,
    PercentRank,
    Lag { offset: u64 },
    Lead { offset: u64 },
    FirstValue,
    LastValue,
    Agg(AggregateFunc),
}

impl WindowFunc {
    pub fn name(&self) -> &'static str {
        match self {
            WindowFunc::RowNumber => "ROW_NUMBER",
            WindowFunc::Rank => "RANK",
            WindowFunc::DenseRank => "DENSE_RANK",
            WindowFunc::PercentRank => "PERCENT_RANK",
            WindowFunc::Lag { .. } => "LAG",
            WindowFunc::Lead { .. } => "LEAD",
            WindowFunc::FirstValue => "FIRST_VALUE",
            WindowFunc::LastValue => "LAST_VALUE",
            WindowFunc::Agg(a) => a.name(),
        }
    }
}

/// One ORDER BY key. Ascending order puts NULL first.
#[derive(Debug, Clone, PartialEq)]
pub struct SortField {
    pub expr: Expression,
    pub ascending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameUnits {
    Rows,
    Range,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameBound {
    UnboundedPreceding,
    Preceding(u64),
    CurrentRow,
    Following(u64),
    UnboundedFollowing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowFrame {
    pub units: FrameUnits,
    pub start: FrameBound,
    pub end: FrameBound,
}

/// A window's partition/order/frame specification.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WindowSpec {
    pub partition_by: Vec<Expression>,
    pub order_by: Vec<SortField>,
    pub frame: Option<WindowFrame>,
}

/// A subquery used as an expression. `correlated` is stamped by the
/// analyzer; uncorrelated subqueries are evaluated once per statement and
/// cached.
#[derive(Debug, Clone, PartialEq)]
pub struct SubqueryExpr {
    pub node: Node,
    pub correlated: bool,
    /// Cache slot id for uncorrelated subqueries, assigned by the analyzer.
    pub cache_id: Option<usize>,
}

impl SubqueryExpr {
    pub fn new(node: Node) -> SubqueryExpr {
        SubqueryExpr { node, correlated: false, cache_id: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal { value: Value, data_type: DataType },
    /// A resolved column reference: index into the operator's input row,
    /// plus the name tags it resolved from.
    Field {
        index: usize,
        table: String,
        name: String,
        data_type: DataType,
        nullable: bool,
    },
    /// A column reference the analyzer has not bound yet.
    UnresolvedColumn { table: Option<String>, name: String },
    /// `*` or `table.*`; removed by star expansion.
    Star { table: Option<String> },
    /// Prepared-statement placeholder, zero-indexed.
    Parameter(usize),
    /// `@name`
    UserVariable(String),
    /// `@@name`
    SystemVariable(String),

    Arithmetic { op: ArithOp, left: Box<Expression>, right: Box<Expression> },
    Negate(Box<Expression>),

    Compare { op: CmpOp, left: Box<Expression>, right: Box<Expression> },
    InList { expr: Box<Expression>, list: Vec<Expression>, negated: bool },
    InSubquery { expr: Box<Expression>, subquery: Box<SubqueryExpr>, negated: bool },
    Between { expr: Box<Expression>, low: Box<Expression>, high: Box<Expression>, negated: bool },
    Like { expr: Box<Expression>, pattern: Box<Expression>, escape: Option<char>, negated: bool },
    Regexp { expr: Box<Expression>, pattern: Box<Expression>, negated: bool },

    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Xor(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    IsNull { expr: Box<Expression>, negated: bool },

    Case {
        operand: Option<Box<Expression>>,
        branches: Vec<(Expression, Expression)>,
        else_expr: Option<Box<Expression>>,
    },
    Tuple(Vec<Expression>),

    ScalarSubquery(Box<SubqueryExpr>),
    Exists { subquery: Box<SubqueryExpr>, negated: bool },

    Aggregate { func: AggregateFunc, arg: Option<Box<Expression>>, distinct: bool },
    WindowFunction { func: WindowFunc, args: Vec<Expression>, over: WindowSpec },
    FunctionCall { name: String, args: Vec<Expression> },

    Cast { expr: Box<Expression>, to: DataType },
    Interval { value: Box<Expression>, unit: IntervalUnit },
}

impl Expression {
    pub fn literal(value: Value) -> Expression {
        let data_type = value.data_type();
        Expression::Literal { value, data_type }
    }

    pub fn field(index: usize, table: &str, name: &str, data_type: DataType, nullable: bool) -> Expression {
        Expression::Field {
            index,
            table: table.to_string(),
            name: name.to_string(),
            data_type,
            nullable,
        }
    }

    pub fn column(name: &str) -> Expression {
        Expression::UnresolvedColumn { table: None, name: name.to_string() }
    }

    /// The static result type. Unresolved references report `Null` until
    /// the analyzer binds them.
    pub fn data_type(&self) -> DataType {
        match self {
            Expression::Literal { data_type, .. } => data_type.clone(),
            Expression::Field { data_type, .. } => data_type.clone(),
            Expression::UnresolvedColumn { .. } | Expression::Star { .. } | Expression::Parameter(_) => DataType::Null,
            Expression::UserVariable(_) | Expression::SystemVariable(_) => DataType::text(),
            Expression::Arithmetic { op, left, right } => {
                coercion::arithmetic_result_type(*op, &left.data_type(), &right.data_type())
            }
            Expression::Negate(e) => match e.data_type() {
                t if t.is_decimal() => t,
                t if t.is_float() => DataType::Double,
                _ => DataType::bigint(),
            },
            Expression::Compare { .. }
            | Expression::InList { .. }
            | Expression::InSubquery { .. }
            | Expression::Between { .. }
            | Expression::Like { .. }
            | Expression::Regexp { .. }
            | Expression::And(..)
            | Expression::Or(..)
            | Expression::Xor(..)
            | Expression::Not(_)
            | Expression::IsNull { .. }
            | Expression::Exists { .. } => DataType::TinyInt { unsigned: false },
            Expression::Case { branches, else_expr, .. } => {
                let mut result = else_expr.as_ref().map(|e| e.data_type()).unwrap_or(DataType::Null);
                for (_, then) in branches {
                    result = coercion::common_type(&result, &then.data_type());
                }
                result
            }
            Expression::Tuple(items) => DataType::Tuple(items.len()),
            Expression::ScalarSubquery(sq) => sq
                .node
                .schema()
                .column(0)
                .map(|c| c.data_type.clone())
                .unwrap_or(DataType::Null),
            Expression::Aggregate { func, arg, .. } => match func {
                AggregateFunc::CountStar | AggregateFunc::Count => DataType::bigint(),
                AggregateFunc::Sum | AggregateFunc::Avg => DataType::Double,
                AggregateFunc::Min | AggregateFunc::Max => {
                    arg.as_ref().map(|a| a.data_type()).unwrap_or(DataType::Null)
                }
            },
            Expression::WindowFunction { func, args, .. } => match func {
                WindowFunc::RowNumber | WindowFunc::Rank | WindowFunc::DenseRank => DataType::bigint(),
                WindowFunc::PercentRank => DataType::Double,
                WindowFunc::Lag { .. } | WindowFunc::Lead { .. } | WindowFunc::FirstValue | WindowFunc::LastValue => {
                    args.first().map(|a| a.data_type()).unwrap_or(DataType::Null)
                }
                WindowFunc::Agg(agg) => match agg {
                    AggregateFunc::CountStar | AggregateFunc::Count => DataType::bigint(),
                    AggregateFunc::Sum | AggregateFunc::Avg => DataType::Double,
                    AggregateFunc::Min | AggregateFunc::Max => {
                        args.first().map(|a| a.data_type()).unwrap_or(DataType::Null)
                    }
                },
            },
            Expression::FunctionCall { name, args } => {
                let arg_types: Vec<DataType> = args.iter().map(|a| a.data_type()).collect();
                crate::functions::return_type(name, &arg_types).unwrap_or(DataType::Null)
            }
            Expression::Cast { to, .. } => to.clone(),
            Expression::Interval { .. } => DataType::Interval,
        }
    }

    /// Whether the expression can produce NULL.
    pub fn nullable(&self) -> bool {
        match self {
            Expression::Literal { value, .. } => value.is_null(),
            Expression::Field { nullable, .. } => *nullable,
            Expression::Star { .. } => false,
            Expression::Compare { op: CmpOp::NullSafeEq, .. } => false,
            Expression::IsNull { .. } | Expression::Exists { .. } => false,
            Expression::Aggregate { func: AggregateFunc::CountStar | AggregateFunc::Count, .. } => false,
            Expression::WindowFunction { func, .. } => !matches!(
                func,
                WindowFunc::RowNumber | WindowFunc::Rank | WindowFunc::DenseRank | WindowFunc::PercentRank
            ),
            Expression::Arithmetic { left, right, .. } => left.nullable() || right.nullable(),
            Expression::And(l, r) | Expression::Or(l, r) | Expression::Xor(l, r) => l.nullable() || r.nullable(),
            Expression::Not(e) | Expression::Negate(e) => e.nullable(),
            Expression::Cast { expr, .. } => expr.nullable(),
            Expression::Tuple(items) => items.iter().any(|i| i.nullable()),
            _ => true,
        }
    }

    /// Whether the expression tree is fully resolved: no unresolved columns,
    /// stars, or unbound name lookups remain.
    pub fn resolved(&self) -> bool {
        let mut ok = true;
        self.walk(&mut |e| {
            if matches!(e, Expression::UnresolvedColumn { .. } | Expression::Star { .. }) {
                ok = false;
            }
        });
        ok
    }

    /// Direct children, not descending into subquery plans.
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Literal { .. }
            | Expression::Field { .. }
            | Expression::UnresolvedColumn { .. }
            | Expression::Star { .. }
            | Expression::Parameter(_)
            | Expression::UserVariable(_)
            | Expression::SystemVariable(_)
            | Expression::ScalarSubquery(_)
            | Expression::Exists { .. } => vec![],
            Expression::Arithmetic { left, right, .. } | Expression::Compare { left, right, .. } => {
                vec![left, right]
            }
            Expression::And(l, r) | Expression::Or(l, r) | Expression::Xor(l, r) => vec![l, r],
            Expression::Negate(e) | Expression::Not(e) => vec![e],
            Expression::IsNull { expr, .. } => vec![expr],
            Expression::InList { expr, list, .. } => {
                let mut v: Vec<&Expression> = vec![expr];
                v.extend(list.iter());
                v
            }
            Expression::InSubquery { expr, .. } => vec![expr],
            Expression::Between { expr, low, high, .. } => vec![expr, low, high],
            Expression::Like { expr, pattern, .. } | Expression::Regexp { expr, pattern, .. } => {
                vec![expr, pattern]
            }
            Expression::Case { operand, branches, else_expr } => {
                let mut v: Vec<&Expression> = Vec::new();
                if let Some(op) = operand {
                    v.push(op);
                }
                for (when, then) in branches {
                    v.push(when);
                    v.push(then);
                }
                if let Some(e) = else_expr {
                    v.push(e);
                }
                v
            }
            Expression::Tuple(items) => items.iter().collect(),
            Expression::Aggregate { arg, .. } => arg.iter().map(|b| b.as_ref()).collect(),
            Expression::WindowFunction { args, over, .. } => {
                let mut v: Vec<&Expression> = args.iter().collect();
                v.extend(over.partition_by.iter());
                v.extend(over.order_by.iter().map(|s| &s.expr));
                v
            }
            Expression::FunctionCall { args, .. } => args.iter().collect(),
            Expression::Cast { expr, .. } => vec![expr],
            Expression::Interval { value, .. } => vec![value],
        }
    }

    /// Visits every expression in the tree, this one included, not
    /// descending into subquery plans.
    pub fn walk(&self, f: &mut impl FnMut(&Expression)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Rewrites the tree bottom-up. `f` sees each node after its children
    /// were rewritten. Subquery plans are not entered; rules that care about
    /// them handle subqueries explicitly.
    pub fn transform_up(self, f: &mut impl FnMut(Expression) -> Result<Expression>) -> Result<Expression> {
        let rebuilt = match self {
            Expression::Arithmetic { op, left, right } => Expression::Arithmetic {
                op,
                left: Box::new(left.transform_up(f)?),
                right: Box::new(right.transform_up(f)?),
            },
            Expression::Negate(e) => Expression::Negate(Box::new(e.transform_up(f)?)),
            Expression::Compare { op, left, right } => Expression::Compare {
                op,
                left: Box::new(left.transform_up(f)?),
                right: Box::new(right.transform_up(f)?),
            },
            Expression::InList { expr, list, negated } => Expression::InList {
                expr: Box::new(expr.transform_up(f)?),
                list: list.into_iter().map(|e| e.transform_up(f)).collect::<Result<_>>()?,
                negated,
            },
            Expression::InSubquery { expr, subquery, negated } => Expression::InSubquery {
                expr: Box::new(expr.transform_up(f)?),
                subquery,
                negated,
            },
            Expression::Between { expr, low, high, negated } => Expression::Between {
                expr: Box::new(expr.transform_up(f)?),
                low: Box::new(low.transform_up(f)?),
                high: Box::new(high.transform_up(f)?),
                negated,
            },
            Expression::Like { expr, pattern, escape, negated } => Expression::Like {
                expr: Box::new(expr.transform_up(f)?),
                pattern: Box::new(pattern.transform_up(f)?),
                escape,
                negated,
            },
            Expression::Regexp { expr, pattern, negated } => Expression::Regexp {
                expr: Box::new(expr.transform_up(f)?),
                pattern: Box::new(pattern.transform_up(f)?),
                negated,
            },
            Expression::And(l, r) => Expression::And(Box::new(l.transform_up(f)?), Box::new(r.transform_up(f)?)),
            Expression::Or(l, r) => Expression::Or(Box::new(l.transform_up(f)?), Box::new(r.transform_up(f)?)),
            Expression::Xor(l, r) => Expression::Xor(Box::new(l.transform_up(f)?), Box::new(r.transform_up(f)?)),
            Expression::Not(e) => Expression::Not(Box::new(e.transform_up(f)?)),
            Expression::IsNull { expr, negated } => Expression::IsNull {
                expr: Box::new(expr.transform_up(f)?),
                negated,
            },
            Expression::Case { operand, branches, else_expr } => Expression::Case {
                operand: operand.map(|o| o.transform_up(f).map(Box::new)).transpose()?,
                branches: branches
                    .into_iter()
                    .map(|(w, t)| Ok((w.transform_up(f)?, t.transform_up(f)?)))
                    .collect::<Result<_>>()?,
                else_expr: else_expr.map(|e| e.transform_up(f).map(Box::new)).transpose()?,
            },
            Expression::Tuple(items) => {
                Expression::Tuple(items.into_iter().map(|e| e.transform_up(f)).collect::<Result<_>>()?)
            }
            Expression::Aggregate { func, arg, distinct } => Expression::Aggregate {
                func,
                arg: arg.map(|a| a.transform_up(f).map(Box::new)).transpose()?,
                distinct,
            },
            Expression::WindowFunction { func, args, over } => Expression::WindowFunction {
                func,
                args: args.into_iter().map(|e| e.transform_up(f)).collect::<Result<_>>()?,
                over: WindowSpec {
                    partition_by: over
                        .partition_by
                        .into_iter()
                        .map(|e| e.transform_up(f))
                        .collect::<Result<_>>()?,
                    order_by: over
                        .order_by
                        .into_iter()
                        .map(|s| {
                            Ok(SortField { expr: s.expr.transform_up(f)?, ascending: s.ascending })
                        })
                        .collect::<Result<_>>()?,
                    frame: over.frame,
                },
            },
            Expression::FunctionCall { name, args } => Expression::FunctionCall {
                name,
                args: args.into_iter().map(|e| e.transform_up(f)).collect::<Result<_>>()?,
            },
            Expression::Cast { expr, to } => Expression::Cast { expr: Box::new(expr.transform_up(f)?), to },
            Expression::Interval { value, unit } => Expression::Interval {
                value: Box::new(value.transform_up(f)?),
                unit,
            },
            leaf => leaf,
        };
        f(rebuilt)
    }

    /// Whether this tree contains an aggregate call outside of window specs.
    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if matches!(e, Expression::Aggregate { .. }) {
                found = true;
            }
        });
        found
    }

    pub fn contains_window(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if matches!(e, Expression::WindowFunction { .. }) {
                found = true;
            }
        });
        found
    }

    /// Whether the tree is free of non-deterministic functions, subqueries
    /// and variables, making it safe to fold or move across operators.
    pub fn deterministic(&self) -> bool {
        let mut det = true;
        self.walk(&mut |e| match e {
            Expression::FunctionCall { name, .. } => {
                if !crate::functions::is_deterministic(name) {
                    det = false;
                }
            }
            Expression::ScalarSubquery(_)
            | Expression::InSubquery { .. }
            | Expression::Exists { .. }
            | Expression::UserVariable(_)
            | Expression::SystemVariable(_)
            | Expression::Parameter(_) => det = false,
            _ => {}
        });
        det
    }

    /// The highest field index referenced, if any. Used by validation.
    pub fn max_field_index(&self) -> Option<usize> {
        let mut max = None;
        self.walk(&mut |e| {
            if let Expression::Field { index, .. } = e {
                max = Some(max.map_or(*index, |m: usize| m.max(*index)));
            }
        });
        max
    }

    /// The column label this expression produces in a result set.
    pub fn result_name(&self) -> String {
        match self {
            Expression::Field { name, .. } => name.clone(),
            Expression::UnresolvedColumn { name, .. } => name.clone(),
            other => other.to_string(),
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal { value, .. } => match value {
                Value::Str(s) => write!(f, "'{}'", s),
                other => write!(f, "{}", other),
            },
            Expression::Field { table, name, .. } => {
                if table.is_empty() {
                    write!(f, "{}", name)
                } else {
                    write!(f, "{}.{}", table, name)
                }
            }
            Expression::UnresolvedColumn { table: Some(t), name } => write!(f, "{}.{}", t, name),
            Expression::UnresolvedColumn { table: None, name } => write!(f, "{}", name),
            Expression::Star { table: Some(t) } => write!(f, "{}.*", t),
            Expression::Star { table: None } => write!(f, "*"),
            Expression::Parameter(i) => write!(f, "?{}", i),
            Expression::UserVariable(name) => write!(f, "@{}", name),
            Expression::SystemVariable(name) => write!(f, "@@{}", name),
            Expression::Arithmetic { op, left, right } => write!(f, "({} {} {})", left, op.symbol(), right),
            Expression::Negate(e) => write!(f, "(-{})", e),
            Expression::Compare { op, left, right } => write!(f, "({} {} {})", left, op.symbol(), right),
            Expression::InList { expr, list, negated } => {
                write!(f, "{}{} IN (", expr, if *negated { " NOT" } else { "" })?;
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Expression::InSubquery { expr, negated, .. } => {
                write!(f, "{}{} IN (subquery)", expr, if *negated { " NOT" } else { "" })
            }
            Expression::Between { expr, low, high, negated } => {
                write!(f, "{}{} BETWEEN {} AND {}", expr, if *negated { " NOT" } else { "" }, low, high)
            }
            Expression::Like { expr, pattern, negated, .. } => {
                write!(f, "{}{} LIKE {}", expr, if *negated { " NOT" } else { "" }, pattern)
            }
            Expression::Regexp { expr, pattern, negated } => {
                write!(f, "{}{} REGEXP {}", expr, if *negated { " NOT" } else { "" }, pattern)
            }
            Expression::And(l, r) => write!(f, "({} AND {})", l, r),
            Expression::Or(l, r) => write!(f, "({} OR {})", l, r),
            Expression::Xor(l, r) => write!(f, "({} XOR {})", l, r),
            Expression::Not(e) => write!(f, "(NOT {})", e),
            Expression::IsNull { expr, negated } => {
                write!(f, "{} IS{} NULL", expr, if *negated { " NOT" } else { "" })
            }
            Expression::Case { operand, branches, else_expr } => {
                write!(f, "CASE")?;
                if let Some(op) = operand {
                    write!(f, " {}", op)?;
                }
                for (when, then) in branches {
                    write!(f, " WHEN {} THEN {}", when, then)?;
                }
                if let Some(e) = else_expr {
                    write!(f, " ELSE {}", e)?;
                }
                write!(f, " END")
            }
            Expression::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Expression::ScalarSubquery(_) => write!(f, "(subquery)"),
            Expression::Exists { negated, .. } => {
                write!(f, "{}EXISTS (subquery)", if *negated { "NOT " } else { "" })
            }
            Expression::Aggregate { func, arg, distinct } => {
                write!(f, "{}(", func.name())?;
                if *distinct {
                    write!(f, "DISTINCT ")?;
                }
                match arg {
                    Some(a) => write!(f, "{}", a)?,
                    None => write!(f, "*")?,
                }
                write!(f, ")")
            }
            Expression::WindowFunction { func, args, .. } => {
                write!(f, "{}(", func.name())?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ") OVER (..)")
            }
            Expression::FunctionCall { name, args } => {
                write!(f, "{}(", name.to_uppercase())?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
            Expression::Cast { expr, to } => write!(f, "CAST({} AS {})", expr, to),
            Expression::Interval { value, unit } => write!(f, "INTERVAL {} {:?}", value, unit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_names() {
        let col = Expression::field(0, "t", "i", DataType::bigint(), false);
        assert_eq!(col.result_name(), "i");
        let agg = Expression::Aggregate {
            func: AggregateFunc::Sum,
            arg: Some(Box::new(col)),
            distinct: false,
        };
        assert_eq!(agg.result_name(), "SUM(t.i)");
    }

    #[test]
    fn transform_up_rebuilds() {
        let e = Expression::And(
            Box::new(Expression::literal(Value::I64(1))),
            Box::new(Expression::literal(Value::I64(2))),
        );
        let flipped = e
            .transform_up(&mut |e| {
                Ok(match e {
                    Expression::Literal { value: Value::I64(n), .. } => Expression::literal(Value::I64(n * 10)),
                    other => other,
                })
            })
            .unwrap();
        assert_eq!(
            flipped,
            Expression::And(
                Box::new(Expression::literal(Value::I64(10))),
                Box::new(Expression::literal(Value::I64(20))),
            )
        );
    }

    #[test]
    fn resolved_flags_unbound_columns() {
        assert!(!Expression::column("x").resolved());
        assert!(Expression::literal(Value::I64(1)).resolved());
    }
}
