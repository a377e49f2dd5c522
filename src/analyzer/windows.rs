//! Window insertion: pulls window-function calls out of projections into a
//! Window operator below. Multiple window expressions share the one
//! operator; each carries its own partition/order/frame spec.

use super::{AnalyzerCtx, RuleSelector, Scope};
use crate::error::Result;
use crate::plan::Node;
use crate::types::expression::Expression;

pub(super) fn plan_windows(
    _ctx: &mut AnalyzerCtx,
    node: Node,
    _scope: &Scope,
    _selector: RuleSelector,
) -> Result<(Node, bool)> {
    let mut changed = false;
    let node = node.transform_up(&mut |n| {
        let (child, expressions, aliases) = match n {
            Node::Project { child, expressions, aliases } => (child, expressions, aliases),
            other => return Ok(other),
        };
        if !expressions.iter().any(|e| e.contains_window()) {
            return Ok(Node::Project { child, expressions, aliases });
        }

        let input = child.schema();
        let width = input.len();

        // The window operator passes the whole input row through, then one
        // column per window call.
        let mut window_exprs: Vec<Expression> = (0..width)
            .map(|i| {
                let col = &input.0[i];
                Expression::Field {
                    index: i,
                    table: col.source.clone(),
                    name: col.name.clone(),
                    data_type: col.data_type.clone(),
                    nullable: col.nullable,
                }
            })
            .collect();

        let mut new_project = Vec::with_capacity(expressions.len());
        for e in expressions {
            let rewritten = e.transform_up(&mut |inner| {
                if let Expression::WindowFunction { .. } = &inner {
                    let pos = match window_exprs[width..].iter().position(|have| have == &inner) {
                        Some(pos) => pos,
                        None => {
                            window_exprs.push(inner.clone());
                            window_exprs.len() - width - 1
                        }
                    };
                    return Ok(Expression::Field {
                        index: width + pos,
                        table: String::new(),
                        name: inner.result_name(),
                        data_type: inner.data_type(),
                        nullable: inner.nullable(),
                    });
                }
                Ok(inner)
            })?;
            new_project.push(rewritten);
        }

        changed = true;
        Ok(Node::Project {
            child: Box::new(Node::Window { child, expressions: window_exprs }),
            expressions: new_project,
            aliases,
        })
    })?;
    Ok((node, changed))
}
