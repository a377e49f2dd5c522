//! Index selection: turns a filter over a table scan into an index range
//! access. Conjunctive equality predicates cover a leading prefix of an
//! index; one range predicate may follow on the next column. The index
//! covering the longest prefix wins, and the full predicate stays above
//! the access as a residual filter, which also re-checks rows a prefix
//! index matched only on its truncated key.

use super::{AnalyzerCtx, RuleSelector, Scope};
use crate::error::Result;
use crate::plan::{IndexRangeSpec, Node};
use crate::types::expression::{CmpOp, Expression};
use crate::types::schema::IndexDef;
use std::collections::HashMap;

/// A sargable conjunct: `column <op> literal`.
struct Sarg {
    column: String,
    op: CmpOp,
    literal: Expression,
}

fn extract_sargs(predicate: &Expression) -> Vec<Sarg> {
    let mut conjuncts = Vec::new();
    fn split(e: &Expression, out: &mut Vec<Expression>) {
        match e {
            Expression::And(l, r) => {
                split(l, out);
                split(r, out);
            }
            other => out.push(other.clone()),
        }
    }
    split(predicate, &mut conjuncts);

    let mut out = Vec::new();
    for c in conjuncts {
        let Expression::Compare { op, left, right } = c else { continue };
        let (column, op, literal) = match (&*left, &*right) {
            (Expression::Field { name, .. }, Expression::Literal { .. }) => {
                (name.clone(), op, (*right).clone())
            }
            (Expression::Literal { .. }, Expression::Field { name, .. }) => {
                (name.clone(), op.flip(), (*left).clone())
            }
            _ => continue,
        };
        if matches!(op, CmpOp::Eq | CmpOp::Lt | CmpOp::LtEq | CmpOp::Gt | CmpOp::GtEq) {
            out.push(Sarg { column, op, literal });
        }
    }
    out
}

/// How many leading index columns the sargs cover, and the resulting spec.
fn plan_index(index: &IndexDef, sargs: &[Sarg]) -> Option<(usize, IndexRangeSpec)> {
    let by_column: HashMap<String, Vec<&Sarg>> = {
        let mut m: HashMap<String, Vec<&Sarg>> = HashMap::new();
        for s in sargs {
            m.entry(s.column.to_lowercase()).or_default().push(s);
        }
        m
    };

    let mut prefix = Vec::new();
    let mut lower = None;
    let mut upper = None;
    let mut covered = 0;
    for ic in &index.columns {
        let Some(matches) = by_column.get(&ic.name.to_lowercase()) else { break };
        if let Some(eq) = matches.iter().find(|s| s.op == CmpOp::Eq) {
            prefix.push(eq.literal.clone());
            covered += 1;
            continue;
        }
        // A range ends the covered prefix.
        for s in matches {
            match s.op {
                CmpOp::Gt => lower = Some((s.literal.clone(), false)),
                CmpOp::GtEq => lower = Some((s.literal.clone(), true)),
                CmpOp::Lt => upper = Some((s.literal.clone(), false)),
                CmpOp::LtEq => upper = Some((s.literal.clone(), true)),
                _ => {}
            }
        }
        if lower.is_some() || upper.is_some() {
            covered += 1;
        }
        break;
    }
    if covered == 0 {
        return None;
    }
    Some((covered, IndexRangeSpec { index: index.clone(), prefix, lower, upper }))
}

pub(super) fn select_indexes(
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
        let Node::Table(table_ref) = child.as_ref() else {
            return Ok(Node::Filter { child, predicate });
        };
        if table_ref.table.as_indexed().is_none() {
            return Ok(Node::Filter { child, predicate });
        }

        let sargs = extract_sargs(&predicate);
        if sargs.is_empty() {
            return Ok(Node::Filter { child, predicate });
        }
        let best = table_ref
            .def()
            .indexes
            .iter()
            .filter_map(|ix| plan_index(ix, &sargs))
            .max_by_key(|(covered, spec)| (*covered, spec.index.unique));
        let Some((covered, spec)) = best else {
            return Ok(Node::Filter { child, predicate });
        };
        tracing::debug!(
            table = %table_ref.name,
            index = %spec.index.name,
            covered,
            "index range access selected"
        );
        changed = true;
        // The predicate stays whole above the access: higher conjuncts were
        // never covered, and prefix-truncated keys need the recheck.
        Ok(Node::Filter {
            child: Box::new(Node::IndexedTable { table: table_ref.clone(), spec }),
            predicate,
        })
    })?;
    Ok((node, changed))
}
