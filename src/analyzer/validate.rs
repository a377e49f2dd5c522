//! Final validation: a fully resolved tree or a user error. Everything the
//! earlier rules left lenient hardens here.

use super::resolve_columns::node_input_schema;
use super::{AnalyzerCtx, RuleSelector, Scope};
use crate::error::{Error, Result};
use crate::plan::Node;
use crate::types::expression::Expression;

pub(super) fn validate(
    _ctx: &mut AnalyzerCtx,
    node: Node,
    scope: &Scope,
    _selector: RuleSelector,
) -> Result<(Node, bool)> {
    let scope_width: usize = scope.outer.iter().map(|s| s.len()).sum();
    let mut result: Result<()> = Ok(());
    node.walk(&mut |n| {
        if result.is_err() {
            return;
        }
        result = validate_node(n, scope_width);
    });
    result?;
    Ok((node, false))
}

fn validate_node(node: &Node, scope_width: usize) -> Result<()> {
    if let Node::UnresolvedTable { name, .. } = node {
        return Err(Error::TableNotFound(name.clone()));
    }
    let input = node_input_schema(node);
    let limit = input.len() + scope_width;
    let aggregates_allowed = matches!(node, Node::Aggregate { .. });
    let windows_allowed = matches!(node, Node::Window { .. });

    for expr in node.expressions() {
        let mut err: Result<()> = Ok(());
        expr.walk(&mut |e| {
            if err.is_err() {
                return;
            }
            err = match e {
                Expression::UnresolvedColumn { table: Some(t), name } => {
                    Err(Error::TableColumnNotFound { table: t.clone(), column: name.clone() })
                }
                Expression::UnresolvedColumn { table: None, name } => Err(Error::ColumnNotFound(name.clone())),
                Expression::Star { .. } => Err(Error::ColumnNotFound("*".into())),
                Expression::Field { index, name, .. } if *index >= limit => Err(Error::Internal(format!(
                    "field {} index {} out of range for {} input columns",
                    name, index, limit
                ))),
                Expression::Aggregate { .. } if !aggregates_allowed => Err(Error::InvalidGroupFunction),
                Expression::WindowFunction { .. } if !windows_allowed => {
                    Err(Error::InvalidGroupFunction)
                }
                Expression::InSubquery { expr, subquery, .. } => {
                    let lhs_width = match expr.as_ref() {
                        Expression::Tuple(items) => items.len(),
                        _ => 1,
                    };
                    let rhs_width = subquery.node.schema().len();
                    if lhs_width != rhs_width {
                        Err(Error::InvalidOperandColumns { expected: lhs_width, actual: rhs_width })
                    } else {
                        Ok(())
                    }
                }
                Expression::FunctionCall { name, args } => {
                    // Arity and existence settle before execution.
                    let arg_types: Vec<_> = args.iter().map(|a| a.data_type()).collect();
                    crate::functions::return_type(name, &arg_types).map(|_| ())
                }
                _ => Ok(()),
            };
        });
        err?;
    }

    // Union legs must agree on width.
    if let Node::Union { left, right, .. } = node {
        let (l, r) = (left.schema().len(), right.schema().len());
        if l != r {
            return Err(Error::InvalidOperandColumns { expected: l, actual: r });
        }
    }
    Ok(())
}
