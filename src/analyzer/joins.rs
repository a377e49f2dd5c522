//! Join planning: apply a well-formed JOIN_ORDER hint to an inner-join
//! chain, then pick an execution strategy per join — hash when an equijoin
//! key exists and the build side is bounded, index lookup when the inner
//! side exposes a matching index, nested loop otherwise. Join order is
//! deterministic: hint order when hinted, source order otherwise.

use super::{AnalyzerCtx, RuleSelector, Scope};
use crate::error::Result;
use crate::plan::{JoinKind, JoinStrategy, Node};
use crate::types::expression::{CmpOp, Expression};

/// Rows on the build side beyond this make a hash join unattractive.
const HASH_JOIN_BUILD_THRESHOLD: u64 = 100_000;

struct JoinChain {
    leaves: Vec<Node>,
    predicates: Vec<Expression>,
}

/// Collects a left-deep chain of inner/cross joins over named leaves.
fn collect_chain(node: &Node, chain: &mut JoinChain) -> bool {
    match node {
        Node::Join { left, right, kind: JoinKind::Inner | JoinKind::Cross, on, strategy, natural, using }
            if *strategy == JoinStrategy::NestedLoop && !*natural && using.is_empty() =>
        {
            if !collect_chain(left, chain) {
                return false;
            }
            if leaf_name(right).is_none() {
                return false;
            }
            chain.leaves.push((**right).clone());
            if let Some(on) = on {
                chain.predicates.push(on.clone());
            }
            true
        }
        leaf if leaf_name(leaf).is_some() => {
            chain.leaves.push(leaf.clone());
            true
        }
        _ => false,
    }
}

fn leaf_name(node: &Node) -> Option<String> {
    match node {
        Node::Table(t) => Some(t.source_name().to_string()),
        Node::IndexedTable { table, .. } => Some(table.source_name().to_string()),
        Node::SubqueryAlias { name, .. } => Some(name.clone()),
        _ => None,
    }
}

pub(super) fn apply_join_order_hint(
    ctx: &mut AnalyzerCtx,
    node: Node,
    _scope: &Scope,
    _selector: RuleSelector,
) -> Result<(Node, bool)> {
    let Some(hint) = ctx.join_order_hint.clone() else {
        return Ok((node, false));
    };
    let mut changed = false;
    let node = node.transform_up(&mut |n| {
        if changed || !matches!(n, Node::Join { .. }) {
            return Ok(n);
        }
        let mut chain = JoinChain { leaves: Vec::new(), predicates: Vec::new() };
        if !collect_chain(&n, &mut chain) {
            return Ok(n);
        }
        let names: Vec<String> = chain
            .leaves
            .iter()
            .map(|l| leaf_name(l).unwrap_or_default().to_lowercase())
            .collect();
        let wanted: Vec<String> = hint.iter().map(|h| h.to_lowercase()).collect();
        // The hint must name exactly the joined tables to be well-formed.
        if names.len() != wanted.len() {
            return Ok(n);
        }
        let mut order = Vec::with_capacity(wanted.len());
        for w in &wanted {
            match names.iter().position(|have| have == w) {
                Some(i) if !order.contains(&i) => order.push(i),
                _ => return Ok(n),
            }
        }
        if order.iter().enumerate().all(|(a, b)| a == *b) {
            return Ok(n);
        }

        // Old combined row = leaves in source order; remap field indices to
        // the hinted order.
        let widths: Vec<usize> = chain.leaves.iter().map(|l| l.schema().len()).collect();
        let old_offsets: Vec<usize> = widths
            .iter()
            .scan(0, |acc, w| {
                let at = *acc;
                *acc += w;
                Some(at)
            })
            .collect();
        let mut new_offsets = vec![0usize; widths.len()];
        let mut running = 0;
        for &leaf in &order {
            new_offsets[leaf] = running;
            running += widths[leaf];
        }
        let remap = |e: Expression| {
            e.transform_up(&mut |inner| {
                Ok(match inner {
                    Expression::Field { index, table, name, data_type, nullable } => {
                        let leaf = old_offsets
                            .iter()
                            .rposition(|&off| off <= index)
                            .unwrap_or(0);
                        let new_index = new_offsets[leaf] + (index - old_offsets[leaf]);
                        Expression::Field { index: new_index, table, name, data_type, nullable }
                    }
                    other => other,
                })
            })
        };

        let mut leaves = chain.leaves;
        let mut rebuilt = leaves[order[0]].clone();
        for &leaf in order.iter().skip(1) {
            rebuilt = Node::Join {
                left: Box::new(rebuilt),
                right: Box::new(std::mem::replace(&mut leaves[leaf], Node::Nothing { schema: Default::default() })),
                kind: JoinKind::Inner,
                on: None,
                strategy: JoinStrategy::NestedLoop,
                natural: false,
                using: Vec::new(),
            };
        }
        let mut predicate: Option<Expression> = None;
        for p in chain.predicates {
            let p = remap(p)?;
            predicate = Some(match predicate {
                None => p,
                Some(prev) => Expression::And(Box::new(prev), Box::new(p)),
            });
        }
        let rebuilt = match predicate {
            Some(p) => rebuilt.filter(p),
            None => rebuilt,
        };

        // Operators above still address columns in source order; restore it
        // with a projection over the reordered join.
        let rebuilt_schema = rebuilt.schema();
        let mut restore = Vec::with_capacity(rebuilt_schema.len());
        for (leaf, &width) in widths.iter().enumerate() {
            for k in 0..width {
                let index = new_offsets[leaf] + k;
                let col = &rebuilt_schema.0[index];
                restore.push(Expression::Field {
                    index,
                    table: col.source.clone(),
                    name: col.name.clone(),
                    data_type: col.data_type.clone(),
                    nullable: col.nullable,
                });
            }
        }
        let restore_len = restore.len();
        changed = true;
        tracing::debug!(order = ?wanted, "applied JOIN_ORDER hint");
        Ok(Node::Project {
            child: Box::new(rebuilt),
            expressions: restore,
            aliases: vec![None; restore_len],
        })
    })?;
    if changed {
        // One application per statement; the hint names one join region.
        ctx.join_order_hint = None;
    }
    Ok((node, changed))
}

/// Equijoin conjuncts of an ON predicate: (left key, right key shifted to
/// the right child's row).
fn equijoin_keys(on: &Expression, left_width: usize, total_width: usize) -> (Vec<Expression>, Vec<Expression>) {
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
    split(on, &mut conjuncts);

    let side_of = |e: &Expression| -> Option<u8> {
        let mut side = None;
        let mut clean = true;
        e.walk(&mut |inner| match inner {
            Expression::Field { index, .. } => {
                let s = if *index < left_width {
                    0
                } else if *index < total_width {
                    1
                } else {
                    clean = false;
                    return;
                };
                match side {
                    None => side = Some(s),
                    Some(have) if have != s => clean = false,
                    _ => {}
                }
            }
            Expression::ScalarSubquery(_) | Expression::InSubquery { .. } | Expression::Exists { .. } => {
                clean = false
            }
            _ => {}
        });
        if clean {
            side
        } else {
            None
        }
    };

    let mut left_keys = Vec::new();
    let mut right_keys = Vec::new();
    for c in conjuncts {
        let Expression::Compare { op: CmpOp::Eq, left, right } = c else { continue };
        match (side_of(&left), side_of(&right)) {
            (Some(0), Some(1)) => {
                left_keys.push(*left);
                right_keys.push(shift_right(*right, left_width));
            }
            (Some(1), Some(0)) => {
                left_keys.push(*right);
                right_keys.push(shift_right(*left, left_width));
            }
            _ => {}
        }
    }
    (left_keys, right_keys)
}

fn shift_right(e: Expression, left_width: usize) -> Expression {
    e.transform_up(&mut |inner| {
        Ok(match inner {
            Expression::Field { index, table, name, data_type, nullable } => Expression::Field {
                index: index - left_width,
                table,
                name,
                data_type,
                nullable,
            },
            other => other,
        })
    })
    .expect("shift cannot fail")
}

pub(super) fn choose_join_strategy(
    _ctx: &mut AnalyzerCtx,
    node: Node,
    _scope: &Scope,
    _selector: RuleSelector,
) -> Result<(Node, bool)> {
    let mut changed = false;
    let node = node.transform_up(&mut |n| {
        let (left, right, kind, on, strategy, natural, using) = match n {
            Node::Join { left, right, kind, on, strategy, natural, using } => {
                (left, right, kind, on, strategy, natural, using)
            }
            other => return Ok(other),
        };
        let rebuild = |left, right, strategy| Node::Join { left, right, kind, on: on.clone(), strategy, natural, using: using.clone() };
        if strategy != JoinStrategy::NestedLoop || kind == JoinKind::Right {
            return Ok(rebuild(left, right, strategy));
        }
        let Some(on_expr) = on.clone() else {
            return Ok(rebuild(left, right, strategy));
        };
        let left_width = left.schema().len();
        let total_width = left_width + right.schema().len();
        let (left_keys, right_keys) = equijoin_keys(&on_expr, left_width, total_width);
        if left_keys.is_empty() {
            return Ok(rebuild(left, right, strategy));
        }

        // Index join: the inner side is a plain table with an index whose
        // leading columns are exactly the equijoin columns.
        if let Node::Table(table_ref) = right.as_ref() {
            if table_ref.table.as_indexed().is_some() {
                let key_columns: Option<Vec<&str>> = right_keys
                    .iter()
                    .map(|k| match k {
                        Expression::Field { name, .. } => Some(name.as_str()),
                        _ => None,
                    })
                    .collect();
                if let Some(key_columns) = key_columns {
                    let found = table_ref.def().indexes.iter().find(|ix| {
                        ix.columns.len() >= key_columns.len()
                            && ix
                                .columns
                                .iter()
                                .zip(key_columns.iter())
                                .all(|(ic, kc)| ic.name.eq_ignore_ascii_case(kc))
                    });
                    if let Some(index) = found {
                        changed = true;
                        tracing::debug!(table = %table_ref.name, index = %index.name, "index join selected");
                        let strategy = JoinStrategy::Index { index: index.clone(), left_keys };
                        return Ok(rebuild(left, right, strategy));
                    }
                }
            }
        }

        // Hash join when the build side is bounded (or its size unknown).
        let build_small = match right.as_ref() {
            Node::Table(t) => t
                .table
                .row_count_hint()
                .map(|n| n <= HASH_JOIN_BUILD_THRESHOLD)
                .unwrap_or(true),
            _ => true,
        };
        if build_small {
            changed = true;
            let strategy = JoinStrategy::Hash { left_keys, right_keys };
            return Ok(rebuild(left, right, strategy));
        }
        Ok(rebuild(left, right, strategy))
    })?;
    Ok((node, changed))
}
