//! Constant folding and predicate normalisation: evaluate deterministic
//! constant subtrees eagerly, collapse boolean identities, and prune
//! filters whose predicates decided at analysis time.

use super::{AnalyzerCtx, RuleSelector, Scope};
use crate::error::Result;
use crate::execution::expression::eval_constant;
use crate::execution::QueryCtx;
use crate::plan::Node;
use crate::types::expression::Expression;
use crate::types::value::Value;

/// Whether a subtree can be evaluated now: deterministic, and free of row
/// and operator references.
fn foldable(e: &Expression) -> bool {
    if !e.deterministic() {
        return false;
    }
    let mut ok = true;
    e.walk(&mut |inner| {
        if matches!(
            inner,
            Expression::Field { .. }
                | Expression::UnresolvedColumn { .. }
                | Expression::Star { .. }
                | Expression::Aggregate { .. }
                | Expression::WindowFunction { .. }
        ) {
            ok = false;
        }
    });
    ok
}

pub(super) fn fold_constants(
    ctx: &mut AnalyzerCtx,
    node: Node,
    _scope: &Scope,
    _selector: RuleSelector,
) -> Result<(Node, bool)> {
    let query_ctx = QueryCtx::new(ctx.session.clone(), ctx.catalog.clone());
    let mut changed = false;
    let node = node.transform_expressions_up(&mut |e| {
        if matches!(e, Expression::Literal { .. }) || !foldable(&e) {
            return Ok(e);
        }
        // Evaluation failures (division by zero, bad conversions) keep the
        // expression for runtime, where sql_mode decides their fate.
        match eval_constant(&e, &query_ctx) {
            Ok(v) => {
                changed = true;
                Ok(Expression::literal(v))
            }
            Err(_) => Ok(e),
        }
    })?;
    Ok((node, changed))
}

fn truth_of(e: &Expression) -> Option<bool> {
    match e {
        Expression::Literal { value: Value::Null, .. } => None,
        Expression::Literal { value, .. } => value.is_true(),
        _ => None,
    }
}

fn is_literal(e: &Expression) -> bool {
    matches!(e, Expression::Literal { .. })
}

pub(super) fn simplify_predicates(
    _ctx: &mut AnalyzerCtx,
    node: Node,
    _scope: &Scope,
    _selector: RuleSelector,
) -> Result<(Node, bool)> {
    let mut changed = false;
    let node = node.transform_expressions_up(&mut |e| {
        let simplified = match &e {
            Expression::Not(inner) => match inner.as_ref() {
                Expression::Not(x) => Some((**x).clone()),
                _ => None,
            },
            Expression::And(l, r) => match (truth_of(l), truth_of(r)) {
                (Some(true), _) if !is_literal(r) => Some((**r).clone()),
                (_, Some(true)) if !is_literal(l) => Some((**l).clone()),
                (Some(false), _) | (_, Some(false)) => Some(Expression::literal(Value::I8(0))),
                _ => None,
            },
            Expression::Or(l, r) => match (truth_of(l), truth_of(r)) {
                (Some(false), _) if !is_literal(r) => Some((**r).clone()),
                (_, Some(false)) if !is_literal(l) => Some((**l).clone()),
                (Some(true), _) | (_, Some(true)) => Some(Expression::literal(Value::I8(1))),
                _ => None,
            },
            _ => None,
        };
        match simplified {
            Some(s) if s != e => {
                changed = true;
                Ok(s)
            }
            _ => Ok(e),
        }
    })?;
    Ok((node, changed))
}

/// Filters decided at analysis time disappear: a true predicate unwraps,
/// a false or NULL predicate prunes the branch to the empty relation.
pub(super) fn prune_filters(
    _ctx: &mut AnalyzerCtx,
    node: Node,
    _scope: &Scope,
    _selector: RuleSelector,
) -> Result<(Node, bool)> {
    let mut changed = false;
    let node = node.transform_up(&mut |n| {
        let (child, predicate) = match n {
            Node::Filter { child, predicate } => (child, predicate),
            other => return Ok(other),
        };
        if let Expression::Literal { value, .. } = &predicate {
            changed = true;
            return Ok(match value.is_true() {
                Some(true) => *child,
                _ => Node::Nothing { schema: child.schema() },
            });
        }
        Ok(Node::Filter { child, predicate })
    })?;
    Ok((node, changed))
}
