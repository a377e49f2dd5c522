//! ORDER BY resolution: ordinals bind to the n-th projected column,
//! aliases resolve through the projection's output schema, and keys that
//! only exist in the projection's input are satisfied by extending the
//! projection with hidden columns and trimming them back above the sort.

use super::aggregates::absorb_into_aggregate;
use super::{AnalyzerCtx, RuleSelector, Scope};
use crate::error::{Error, Result};
use crate::plan::Node;
use crate::types::expression::{Expression, SortField};
use crate::types::DataType;

pub(super) fn resolve_sorts(
    _ctx: &mut AnalyzerCtx,
    node: Node,
    _scope: &Scope,
    _selector: RuleSelector,
) -> Result<(Node, bool)> {
    let mut changed = false;
    let node = node.transform_up(&mut |n| {
        let (child, mut order_by) = match n {
            Node::Sort { child, order_by } => (child, order_by),
            other => return Ok(other),
        };
        let child_schema = child.schema();
        let width = child_schema.len();
        let mut local_change = false;

        // Ordinals first: ORDER BY n names the n-th output column.
        for field in order_by.iter_mut() {
            if let Expression::Literal { value, .. } = &field.expr {
                if value.is_integer() {
                    let ordinal = value.to_i64().unwrap_or(0);
                    if ordinal < 1 || ordinal as usize > width {
                        return Err(Error::ColumnNotFound(ordinal.to_string()));
                    }
                    let col = &child_schema.0[ordinal as usize - 1];
                    field.expr = Expression::Field {
                        index: ordinal as usize - 1,
                        table: col.source.clone(),
                        name: col.name.clone(),
                        data_type: col.data_type.clone(),
                        nullable: col.nullable,
                    };
                    local_change = true;
                }
            }
        }

        // Keys the projection's output cannot satisfy become hidden
        // columns when the child is a projection.
        let needs_hidden: Vec<usize> = order_by
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.expr.resolved() || f.expr.contains_aggregate())
            .map(|(i, _)| i)
            .collect();

        if needs_hidden.is_empty() {
            changed |= local_change;
            return Ok(Node::Sort { child, order_by });
        }

        if !matches!(*child, Node::Project { .. }) {
            // Nothing to extend; validation reports leftovers.
            changed |= local_change;
            return Ok(Node::Sort { child, order_by });
        }
        let Node::Project { child: project_child, mut expressions, mut aliases } = *child else {
            unreachable!("matched above");
        };

        let original_width = expressions.len();
        for &i in &needs_hidden {
            let hidden = order_by[i].expr.clone();
            let index = expressions.len();
            expressions.push(hidden.clone());
            aliases.push(None);
            order_by[i] = SortField {
                expr: Expression::Field {
                    index,
                    table: String::new(),
                    name: hidden.result_name(),
                    data_type: DataType::Null,
                    nullable: true,
                },
                ascending: order_by[i].ascending,
            };
        }

        // Hidden aggregates fold into the grouping operator below.
        let project_child = if expressions.iter().any(|e| e.contains_aggregate()) {
            match *project_child {
                Node::Aggregate { .. } => {
                    let (agg, rewritten, _) = absorb_into_aggregate(*project_child, expressions)?;
                    expressions = rewritten;
                    Box::new(agg)
                }
                Node::Filter { child: inner, predicate } if matches!(*inner, Node::Aggregate { .. }) => {
                    let (agg, rewritten, _) = absorb_into_aggregate(*inner, expressions)?;
                    expressions = rewritten;
                    Box::new(Node::Filter { child: Box::new(agg), predicate })
                }
                other => Box::new(other),
            }
        } else {
            project_child
        };

        let extended = Node::Project { child: project_child, expressions, aliases };
        let extended_schema = extended.schema();
        let sort = Node::Sort { child: Box::new(extended), order_by };

        // Trim the hidden columns back off above the sort.
        let trim_exprs: Vec<Expression> = (0..original_width)
            .map(|i| {
                let col = &extended_schema.0[i];
                Expression::Field {
                    index: i,
                    table: col.source.clone(),
                    name: col.name.clone(),
                    data_type: col.data_type.clone(),
                    nullable: col.nullable,
                }
            })
            .collect();
        changed = true;
        Ok(Node::Project {
            child: Box::new(sort),
            expressions: trim_exprs,
            aliases: vec![None; original_width],
        })
    })?;
    Ok((node, changed))
}
