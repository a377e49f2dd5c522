//! Join execution: nested-loop by default, hash-joined on an equijoin key
//! when the analyzer chose it, index-joined when the inner side exposes a
//! matching index. LEFT and RIGHT preserve their outer rows, padding the
//! unmatched side with NULL.

use crate::error::{Error, Result};
use crate::execution::expression::{eval, eval_filter};
use crate::execution::{executor, QueryCtx, Rows};
use crate::plan::{JoinKind, JoinStrategy, Node};
use crate::storage::IndexLookup;
use crate::types::expression::Expression;
use crate::types::value::{Row, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub fn rows(
    left: &Node,
    right: &Node,
    kind: JoinKind,
    on: Option<&Expression>,
    strategy: &JoinStrategy,
    ctx: &QueryCtx,
    outer: Arc<Row>,
) -> Result<Rows> {
    match strategy {
        JoinStrategy::Hash { left_keys, right_keys } => {
            hash_join(left, right, kind, on, left_keys, right_keys, ctx, outer)
        }
        JoinStrategy::Index { index, left_keys } => index_join(left, right, kind, on, index, left_keys, ctx, outer),
        JoinStrategy::NestedLoop => nested_loop(left, right, kind, on, ctx, outer),
    }
}

fn null_pad(width: usize) -> Row {
    vec![Value::Null; width]
}

fn combined(l: &Row, r: &Row) -> Row {
    let mut row = Vec::with_capacity(l.len() + r.len());
    row.extend(l.iter().cloned());
    row.extend(r.iter().cloned());
    row
}

fn matches(on: Option<&Expression>, row: &Row, outer: &[Value], ctx: &QueryCtx) -> Result<bool> {
    match on {
        Some(predicate) => eval_filter(predicate, row, outer, ctx),
        None => Ok(true),
    }
}

fn nested_loop(
    left: &Node,
    right: &Node,
    kind: JoinKind,
    on: Option<&Expression>,
    ctx: &QueryCtx,
    outer: Arc<Row>,
) -> Result<Rows> {
    let left_width = left.schema().len();
    let right_width = right.schema().len();

    if kind == JoinKind::Right {
        // Right joins drive from the right side and pad the left.
        let left_rows: Vec<Row> = executor::node_rows(left, ctx, outer.clone())?.collect::<Result<_>>()?;
        let right_rows = executor::node_rows(right, ctx, outer.clone())?;
        let mut out = Vec::new();
        for r in right_rows {
            let r = r?;
            ctx.session.check_cancelled()?;
            let mut matched = false;
            for l in &left_rows {
                let row = combined(l, &r);
                if matches(on, &row, &outer, ctx)? {
                    matched = true;
                    out.push(row);
                }
            }
            if !matched {
                out.push(combined(&null_pad(left_width), &r));
            }
        }
        return Ok(Box::new(out.into_iter().map(Ok)));
    }

    let right_rows: Vec<Row> = executor::node_rows(right, ctx, outer.clone())?.collect::<Result<_>>()?;
    let left_rows = executor::node_rows(left, ctx, outer.clone())?;
    let mut out = Vec::new();
    for l in left_rows {
        let l = l?;
        ctx.session.check_cancelled()?;
        let mut matched = false;
        for r in &right_rows {
            let row = combined(&l, r);
            if matches(on, &row, &outer, ctx)? {
                matched = true;
                out.push(row);
            }
        }
        if !matched && kind == JoinKind::Left {
            out.push(combined(&l, &null_pad(right_width)));
        }
    }
    Ok(Box::new(out.into_iter().map(Ok)))
}

fn hash_join(
    left: &Node,
    right: &Node,
    kind: JoinKind,
    on: Option<&Expression>,
    left_keys: &[Expression],
    right_keys: &[Expression],
    ctx: &QueryCtx,
    outer: Arc<Row>,
) -> Result<Rows> {
    // Right joins fall back to the nested loop; the analyzer only picks
    // hash for inner and left shapes where the right side fits the build
    // threshold.
    if kind == JoinKind::Right {
        return nested_loop(left, right, kind, on, ctx, outer);
    }
    let right_width = right.schema().len();

    // Build side: the right child, keyed by its equijoin tuple. NULL keys
    // can never match and stay out of the table.
    let mut build: HashMap<Vec<Value>, Vec<Row>> = HashMap::new();
    for r in executor::node_rows(right, ctx, outer.clone())? {
        let r = r?;
        ctx.session.check_cancelled()?;
        let mut key = Vec::with_capacity(right_keys.len());
        for e in right_keys {
            key.push(eval(e, &r, &outer, ctx)?);
        }
        if key.iter().any(|v| v.is_null()) {
            continue;
        }
        build.entry(key).or_default().push(r);
    }

    let left_rows = executor::node_rows(left, ctx, outer.clone())?;
    let mut out = Vec::new();
    for l in left_rows {
        let l = l?;
        ctx.session.check_cancelled()?;
        let mut key = Vec::with_capacity(left_keys.len());
        for e in left_keys {
            key.push(eval(e, &l, &outer, ctx)?);
        }
        let mut matched = false;
        if !key.iter().any(|v| v.is_null()) {
            if let Some(candidates) = build.get(&key) {
                for r in candidates {
                    let row = combined(&l, r);
                    if matches(on, &row, &outer, ctx)? {
                        matched = true;
                        out.push(row);
                    }
                }
            }
        }
        if !matched && kind == JoinKind::Left {
            out.push(combined(&l, &null_pad(right_width)));
        }
    }
    Ok(Box::new(out.into_iter().map(Ok)))
}

fn index_join(
    left: &Node,
    right: &Node,
    kind: JoinKind,
    on: Option<&Expression>,
    index: &crate::types::schema::IndexDef,
    left_keys: &[Expression],
    ctx: &QueryCtx,
    outer: Arc<Row>,
) -> Result<Rows> {
    // The analyzer guarantees the right side is a plain resolved table with
    // IndexedAccess; anything else falls back to the nested loop.
    let Node::Table(table_ref) = right else {
        return nested_loop(left, right, kind, on, ctx, outer);
    };
    let Some(_) = table_ref.table.as_indexed() else {
        return nested_loop(left, right, kind, on, ctx, outer);
    };
    let right_width = right.schema().len();
    let table = table_ref.table.clone();
    let index = index.clone();

    let left_rows = executor::node_rows(left, ctx, outer.clone())?;
    let mut out = Vec::new();
    for l in left_rows {
        let l = l?;
        ctx.session.check_cancelled()?;
        let mut key = Vec::with_capacity(left_keys.len());
        for e in left_keys {
            key.push(eval(e, &l, &outer, ctx)?);
        }
        let mut matched = false;
        if !key.iter().any(|v| v.is_null()) {
            let indexed = table.as_indexed().ok_or_else(|| {
                Error::Internal(format!("index join over {} lost IndexedAccess", table.name()))
            })?;
            for r in indexed.index_lookup(&index, &IndexLookup::equality(key))? {
                let row = combined(&l, &r?);
                if matches(on, &row, &outer, ctx)? {
                    matched = true;
                    out.push(row);
                }
            }
        }
        if !matched && kind == JoinKind::Left {
            out.push(combined(&l, &null_pad(right_width)));
        }
    }
    Ok(Box::new(out.into_iter().map(Ok)))
}
