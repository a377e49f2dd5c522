//! Aggregation planning: fills the GroupBy operator with every aggregate
//! the projection and HAVING use, rewrites those call sites into field
//! references over the grouped output, and resolves GROUP BY ordinals and
//! projection aliases (aliases are visible to HAVING and GROUP BY, never to
//! WHERE).

use super::{AnalyzerCtx, RuleSelector, Scope};
use crate::error::{Error, Result};
use crate::plan::Node;
use crate::types::expression::Expression;

/// Replaces alias references (and, at the top level only, ordinals) with
/// the projection expressions they name. Real input columns win over
/// aliases on a name tie.
fn substitute_aliases(
    expr: Expression,
    project_exprs: &[Expression],
    aliases: &[Option<String>],
    input: &crate::types::schema::Schema,
    allow_ordinals: bool,
) -> Result<(Expression, bool)> {
    if allow_ordinals {
        if let Expression::Literal { value, .. } = &expr {
            if value.is_integer() {
                let n = value.to_i64().unwrap_or(0);
                if n >= 1 && (n as usize) <= project_exprs.len() {
                    let replacement = project_exprs[n as usize - 1].clone();
                    let changed = replacement != expr;
                    return Ok((replacement, changed));
                }
                return Err(Error::ColumnNotFound(n.to_string()));
            }
        }
    }
    let mut changed = false;
    let out = expr.transform_up(&mut |e| {
        if let Expression::UnresolvedColumn { table: None, name } = &e {
            if input.resolve(None, name).ok().flatten().is_none() {
                for (i, alias) in aliases.iter().enumerate() {
                    if alias.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(name)) {
                        changed = true;
                        return Ok(project_exprs[i].clone());
                    }
                }
            }
        }
        Ok(e)
    })?;
    Ok((out, changed))
}

/// Collects every aggregate call in an expression, outermost occurrences
/// only.
fn collect_aggregates(expr: &Expression, out: &mut Vec<Expression>) {
    expr.walk(&mut |e| {
        if matches!(e, Expression::Aggregate { .. }) && !out.iter().any(|have| have == e) {
            out.push(e.clone());
        }
    });
}

/// Rewrites aggregate calls in `expr` into fields over the grouped output,
/// given the grouping width and the aggregate list.
fn rewrite_aggregate_refs(expr: Expression, group_width: usize, aggregates: &[Expression]) -> Result<(Expression, bool)> {
    let mut changed = false;
    let out = expr.transform_up(&mut |e| {
        if let Expression::Aggregate { .. } = &e {
            if let Some(pos) = aggregates.iter().position(|a| a == &e) {
                changed = true;
                return Ok(Expression::Field {
                    index: group_width + pos,
                    table: String::new(),
                    name: e.to_string(),
                    data_type: e.data_type(),
                    nullable: e.nullable(),
                });
            }
        }
        Ok(e)
    })?;
    Ok((out, changed))
}

/// Absorbs aggregate expressions found in `exprs` into the given Aggregate
/// node, returning the updated node and the rewritten expressions. Used by
/// the sort resolver for ORDER BY aggregates that surfaced late.
pub(super) fn absorb_into_aggregate(node: Node, exprs: Vec<Expression>) -> Result<(Node, Vec<Expression>, bool)> {
    let (child, group_by, mut aggregates) = match node {
        Node::Aggregate { child, group_by, aggregates } => (child, group_by, aggregates),
        other => return Ok((other, exprs, false)),
    };
    let mut changed = false;
    let mut found = Vec::new();
    for e in &exprs {
        collect_aggregates(e, &mut found);
    }
    for agg in found {
        if !aggregates.iter().any(|have| have == &agg) {
            aggregates.push(agg);
            changed = true;
        }
    }
    let group_width = group_by.len();
    let mut rewritten = Vec::with_capacity(exprs.len());
    for e in exprs {
        let (e, c) = rewrite_aggregate_refs(e, group_width, &aggregates)?;
        changed |= c;
        rewritten.push(e);
    }
    Ok((Node::Aggregate { child, group_by, aggregates }, rewritten, changed))
}

pub(super) fn plan_aggregates(
    _ctx: &mut AnalyzerCtx,
    node: Node,
    _scope: &Scope,
    _selector: RuleSelector,
) -> Result<(Node, bool)> {
    let mut changed = false;
    let node = node.transform_up(&mut |n| {
        // Match Project over [Having-filter over] Aggregate.
        let (child, expressions, aliases) = match n {
            Node::Project { child, expressions, aliases } => (child, expressions, aliases),
            other => return Ok(other),
        };
        let (having, agg_node) = match *child {
            Node::Filter { child: inner, predicate } if matches!(*inner, Node::Aggregate { .. }) => {
                (Some(predicate), *inner)
            }
            agg @ Node::Aggregate { .. } => (None, agg),
            other => {
                return Ok(Node::Project { child: Box::new(other), expressions, aliases });
            }
        };
        let Node::Aggregate { child: agg_child, mut group_by, mut aggregates } = agg_node else {
            unreachable!("matched above");
        };
        let input = agg_child.schema();

        let mut local_change = false;

        // GROUP BY ordinals and projection aliases resolve against the
        // projection list.
        let mut resolved_groups = Vec::with_capacity(group_by.len());
        for g in group_by.drain(..) {
            let (g, c) = substitute_aliases(g, &expressions, &aliases, &input, true)?;
            if g.contains_aggregate() {
                return Err(Error::InvalidGroupFunction);
            }
            local_change |= c;
            resolved_groups.push(g);
        }
        let group_by = resolved_groups;

        // HAVING sees aliases too, with lower precedence than ORDER BY.
        let having = match having {
            Some(h) => {
                let (h, c) = substitute_aliases(h, &expressions, &aliases, &input, false)?;
                local_change |= c;
                Some(h)
            }
            None => None,
        };

        // Gather aggregates from the projection and HAVING.
        let mut found = Vec::new();
        for e in &expressions {
            collect_aggregates(e, &mut found);
        }
        if let Some(h) = &having {
            collect_aggregates(h, &mut found);
        }
        for agg in found {
            if let Expression::Aggregate { arg: Some(arg), .. } = &agg {
                if arg.contains_aggregate() {
                    return Err(Error::InvalidGroupFunction);
                }
            }
            if !aggregates.iter().any(|have| have == &agg) {
                aggregates.push(agg);
                local_change = true;
            }
        }

        // Rewrite call sites into grouped-output fields.
        let group_width = group_by.len();
        let mut new_exprs = Vec::with_capacity(expressions.len());
        for e in expressions {
            let (e, c) = rewrite_aggregate_refs(e, group_width, &aggregates)?;
            local_change |= c;
            new_exprs.push(e);
        }
        let having = match having {
            Some(h) => {
                let (h, c) = rewrite_aggregate_refs(h, group_width, &aggregates)?;
                local_change |= c;
                Some(h)
            }
            None => None,
        };

        let mut rebuilt = Node::Aggregate { child: agg_child, group_by, aggregates };
        if let Some(h) = having {
            rebuilt = rebuilt.filter(h);
        }
        changed |= local_change;
        Ok(Node::Project { child: Box::new(rebuilt), expressions: new_exprs, aliases })
    })?;
    Ok((node, changed))
}
