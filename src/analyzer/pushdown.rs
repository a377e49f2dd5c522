//! Filter pushdown: filters merge with filters, move through projections
//! by substituting the projected expressions, and split across join inputs
//! when a conjunct only references one side. Volatile functions, aggregate
//! or window outputs, and correlated references pin a predicate where it
//! is.

use super::{AnalyzerCtx, RuleSelector, Scope};
use crate::error::Result;
use crate::plan::{JoinKind, Node};
use crate::types::expression::Expression;

fn split_conjuncts(e: Expression, out: &mut Vec<Expression>) {
    match e {
        Expression::And(l, r) => {
            split_conjuncts(*l, out);
            split_conjuncts(*r, out);
        }
        other => out.push(other),
    }
}

fn conjoin(mut parts: Vec<Expression>) -> Option<Expression> {
    let first = parts.pop()?;
    Some(parts.into_iter().rev().fold(first, |acc, p| {
        Expression::And(Box::new(p), Box::new(acc))
    }))
}

/// Field index range a predicate touches: (min, max), None when field-free.
fn field_range(e: &Expression) -> Option<(usize, usize)> {
    let mut range: Option<(usize, usize)> = None;
    e.walk(&mut |inner| {
        if let Expression::Field { index, .. } = inner {
            range = Some(match range {
                None => (*index, *index),
                Some((lo, hi)) => (lo.min(*index), hi.max(*index)),
            });
        }
    });
    range
}

fn shift_fields(e: Expression, delta: usize) -> Expression {
    e.transform_up(&mut |inner| {
        Ok(match inner {
            Expression::Field { index, table, name, data_type, nullable } => Expression::Field {
                index: index - delta,
                table,
                name,
                data_type,
                nullable,
            },
            other => other,
        })
    })
    .expect("field shift cannot fail")
}

pub(super) fn pushdown_filters(
    _ctx: &mut AnalyzerCtx,
    node: Node,
    _scope: &Scope,
    _selector: RuleSelector,
) -> Result<(Node, bool)> {
    let mut changed = false;
    let node = node.transform_up(&mut |n| {
        match n {
            // Adjacent filters merge.
            Node::Filter { child, predicate } if matches!(*child, Node::Filter { .. }) => {
                let Node::Filter { child: inner, predicate: inner_predicate } = *child else {
                    unreachable!();
                };
                changed = true;
                Ok(Node::Filter {
                    child: inner,
                    predicate: Expression::And(Box::new(inner_predicate), Box::new(predicate)),
                })
            }

            // Filter over projection: substitute and swap, when every
            // substituted expression is deterministic and row-local.
            Node::Filter { child, predicate } if matches!(*child, Node::Project { .. }) => {
                let Node::Project { child: pchild, expressions, aliases } = *child else {
                    unreachable!();
                };
                let width = expressions.len();
                let safe = predicate.deterministic()
                    && !predicate.contains_aggregate()
                    && !predicate.contains_window()
                    && field_range(&predicate).map(|(_, hi)| hi < width).unwrap_or(true)
                    && {
                        let mut refs_safe = true;
                        predicate.walk(&mut |inner| {
                            if let Expression::Field { index, .. } = inner {
                                let target = &expressions[*index];
                                if !target.deterministic()
                                    || target.contains_aggregate()
                                    || target.contains_window()
                                {
                                    refs_safe = false;
                                }
                            }
                        });
                        refs_safe
                    };
                if !safe {
                    return Ok(Node::Filter {
                        child: Box::new(Node::Project { child: pchild, expressions, aliases }),
                        predicate,
                    });
                }
                let substituted = predicate.transform_up(&mut |inner| {
                    Ok(match inner {
                        Expression::Field { index, .. } if index < width => expressions[index].clone(),
                        other => other,
                    })
                })?;
                changed = true;
                Ok(Node::Project {
                    child: Box::new(Node::Filter { child: pchild, predicate: substituted }),
                    expressions,
                    aliases,
                })
            }

            // Filter over a join: route one-sided conjuncts below.
            Node::Filter { child, predicate } if matches!(*child, Node::Join { .. }) => {
                let Node::Join { left, right, kind, on, strategy, natural, using } = *child else {
                    unreachable!();
                };
                if natural || !using.is_empty() {
                    return Ok(Node::Filter {
                        child: Box::new(Node::Join { left, right, kind, on, strategy, natural, using }),
                        predicate,
                    });
                }
                let left_width = left.schema().len();
                let total_width = left_width + right.schema().len();
                let push_left_ok = matches!(kind, JoinKind::Inner | JoinKind::Cross | JoinKind::Left);
                let push_right_ok = matches!(kind, JoinKind::Inner | JoinKind::Cross | JoinKind::Right);

                let mut conjuncts = Vec::new();
                split_conjuncts(predicate, &mut conjuncts);
                let mut to_left = Vec::new();
                let mut to_right = Vec::new();
                let mut keep = Vec::new();
                for c in conjuncts {
                    if !c.deterministic() || c.contains_aggregate() || c.contains_window() {
                        keep.push(c);
                        continue;
                    }
                    match field_range(&c) {
                        Some((_, hi)) if hi < left_width && push_left_ok => to_left.push(c),
                        Some((lo, hi)) if lo >= left_width && hi < total_width && push_right_ok => {
                            to_right.push(shift_fields(c, left_width))
                        }
                        _ => keep.push(c),
                    }
                }
                if to_left.is_empty() && to_right.is_empty() {
                    let predicate = conjoin(keep).expect("kept all conjuncts");
                    return Ok(Node::Filter {
                        child: Box::new(Node::Join { left, right, kind, on, strategy, natural, using }),
                        predicate,
                    });
                }
                changed = true;
                let left = match conjoin(to_left) {
                    Some(p) => Box::new((*left).filter(p)),
                    None => left,
                };
                let right = match conjoin(to_right) {
                    Some(p) => Box::new((*right).filter(p)),
                    None => right,
                };
                let joined = Node::Join { left, right, kind, on, strategy, natural, using };
                Ok(match conjoin(keep) {
                    Some(p) => joined.filter(p),
                    None => joined,
                })
            }

            other => Ok(other),
        }
    })?;
    Ok((node, changed))
}
