//! Window evaluation: buffer each partition, order it by the window's ORDER
//! BY, then evaluate each function per row over its frame.
//!
//! With an ORDER BY and no explicit frame, the frame is RANGE BETWEEN
//! UNBOUNDED PRECEDING AND CURRENT ROW (peers included); without ORDER BY,
//! the whole partition. Output rows keep the input order.

use crate::error::{Error, Result};
use crate::execution::aggregate::Accumulator;
use crate::execution::executor::compare_sort_keys;
use crate::execution::expression::eval;
use crate::execution::{QueryCtx, Rows};
use crate::types::expression::{
    Expression, FrameBound, FrameUnits, SortField, WindowFrame, WindowFunc, WindowSpec,
};
use crate::types::value::{Row, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub fn rows(input: Rows, expressions: &[Expression], ctx: &QueryCtx, outer: Arc<Row>) -> Result<Rows> {
    let buffered: Vec<Row> = input.collect::<Result<_>>()?;
    let n = buffered.len();

    let mut columns: Vec<Vec<Value>> = Vec::with_capacity(expressions.len());
    for e in expressions {
        match e {
            Expression::WindowFunction { func, args, over } => {
                columns.push(window_column(func, args, over, &buffered, ctx, &outer)?);
            }
            other => {
                let mut col = Vec::with_capacity(n);
                for row in &buffered {
                    col.push(eval(other, row, &outer, ctx)?);
                }
                columns.push(col);
            }
        }
    }

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        out.push(columns.iter().map(|c| c[i].clone()).collect::<Row>());
    }
    Ok(Box::new(out.into_iter().map(Ok)))
}

/// Row indices grouped into partitions, each partition sorted by the
/// window's ORDER BY (stable, so input order breaks ties).
fn partitions(
    spec: &WindowSpec,
    rows: &[Row],
    ctx: &QueryCtx,
    outer: &[Value],
) -> Result<Vec<Vec<usize>>> {
    let mut order: Vec<Vec<Value>> = Vec::new();
    let mut groups: HashMap<Vec<Value>, Vec<usize>> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        ctx.session.check_cancelled()?;
        let mut key = Vec::with_capacity(spec.partition_by.len());
        for e in &spec.partition_by {
            key.push(eval(e, row, outer, ctx)?);
        }
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(i);
    }

    let mut out = Vec::with_capacity(order.len());
    for key in order {
        let mut indices = groups.remove(&key).unwrap_or_default();
        if !spec.order_by.is_empty() {
            let mut keys: HashMap<usize, Vec<Value>> = HashMap::new();
            for &i in &indices {
                let mut k = Vec::with_capacity(spec.order_by.len());
                for field in &spec.order_by {
                    k.push(eval(&field.expr, &rows[i], outer, ctx)?);
                }
                keys.insert(i, k);
            }
            indices.sort_by(|a, b| compare_sort_keys(&keys[a], &keys[b], &spec.order_by));
        }
        out.push(indices);
    }
    Ok(out)
}

fn sort_keys_equal(order_by: &[SortField], a: &[Value], b: &[Value]) -> bool {
    compare_sort_keys(a, b, order_by) == std::cmp::Ordering::Equal
}

/// The frame of sorted-partition positions a function at `pos` sees.
fn frame_range(
    frame: Option<&WindowFrame>,
    order_by: &[SortField],
    keys: &[Vec<Value>],
    pos: usize,
    len: usize,
) -> Result<(usize, usize)> {
    let Some(frame) = frame else {
        if order_by.is_empty() {
            return Ok((0, len));
        }
        // Default frame: everything up to and including the current row's
        // peers.
        let mut end = pos + 1;
        while end < len && sort_keys_equal(order_by, &keys[end], &keys[pos]) {
            end += 1;
        }
        return Ok((0, end));
    };

    let start = match (&frame.units, &frame.start) {
        (_, FrameBound::UnboundedPreceding) => 0,
        (FrameUnits::Rows, FrameBound::Preceding(k)) => pos.saturating_sub(*k as usize),
        (FrameUnits::Rows, FrameBound::Following(k)) => (pos + *k as usize).min(len),
        (_, FrameBound::CurrentRow) => match frame.units {
            FrameUnits::Rows => pos,
            FrameUnits::Range => {
                let mut start = pos;
                while start > 0 && sort_keys_equal(order_by, &keys[start - 1], &keys[pos]) {
                    start -= 1;
                }
                start
            }
        },
        (FrameUnits::Range, FrameBound::Preceding(_)) | (FrameUnits::Range, FrameBound::Following(_)) => {
            return Err(Error::UnsupportedFeature("RANGE frames with numeric offsets".into()));
        }
        (_, FrameBound::UnboundedFollowing) => {
            return Err(Error::InvalidArgument("frame start cannot be UNBOUNDED FOLLOWING".into()));
        }
    };
    let end = match (&frame.units, &frame.end) {
        (_, FrameBound::UnboundedFollowing) => len,
        (FrameUnits::Rows, FrameBound::Following(k)) => (pos + 1 + *k as usize).min(len),
        (FrameUnits::Rows, FrameBound::Preceding(k)) => (pos + 1).saturating_sub(*k as usize),
        (_, FrameBound::CurrentRow) => match frame.units {
            FrameUnits::Rows => pos + 1,
            FrameUnits::Range => {
                let mut end = pos + 1;
                while end < len && sort_keys_equal(order_by, &keys[end], &keys[pos]) {
                    end += 1;
                }
                end
            }
        },
        (FrameUnits::Range, FrameBound::Preceding(_)) | (FrameUnits::Range, FrameBound::Following(_)) => {
            return Err(Error::UnsupportedFeature("RANGE frames with numeric offsets".into()));
        }
        (_, FrameBound::UnboundedPreceding) => {
            return Err(Error::InvalidArgument("frame end cannot be UNBOUNDED PRECEDING".into()));
        }
    };
    Ok((start.min(len), end.min(len)))
}

fn window_column(
    func: &WindowFunc,
    args: &[Expression],
    over: &WindowSpec,
    rows: &[Row],
    ctx: &QueryCtx,
    outer: &[Value],
) -> Result<Vec<Value>> {
    let mut out = vec![Value::Null; rows.len()];
    for partition in partitions(over, rows, ctx, outer)? {
        let len = partition.len();
        // Pre-evaluate ORDER BY keys once per partition row for rank and
        // frame peer computations.
        let mut keys: Vec<Vec<Value>> = Vec::with_capacity(len);
        for &i in &partition {
            let mut k = Vec::with_capacity(over.order_by.len());
            for field in &over.order_by {
                k.push(eval(&field.expr, &rows[i], outer, ctx)?);
            }
            keys.push(k);
        }

        match func {
            WindowFunc::RowNumber => {
                for (pos, &i) in partition.iter().enumerate() {
                    out[i] = Value::I64(pos as i64 + 1);
                }
            }
            WindowFunc::Rank | WindowFunc::DenseRank | WindowFunc::PercentRank => {
                let mut rank: i64 = 0;
                let mut dense: i64 = 0;
                for (pos, &i) in partition.iter().enumerate() {
                    let new_group = pos == 0 || !sort_keys_equal(&over.order_by, &keys[pos], &keys[pos - 1]);
                    if new_group {
                        rank = pos as i64 + 1;
                        dense += 1;
                    }
                    out[i] = match func {
                        WindowFunc::Rank => Value::I64(rank),
                        WindowFunc::DenseRank => Value::I64(dense),
                        WindowFunc::PercentRank => {
                            if len <= 1 {
                                Value::F64(0.0)
                            } else {
                                Value::F64((rank - 1) as f64 / (len - 1) as f64)
                            }
                        }
                        _ => unreachable!(),
                    };
                }
            }
            WindowFunc::Lag { offset } | WindowFunc::Lead { offset } => {
                let arg = args.first().ok_or_else(|| {
                    Error::FunctionArity { name: func.name().into(), expected: "1 to 3".into(), actual: 0 }
                })?;
                for (pos, &i) in partition.iter().enumerate() {
                    let target = match func {
                        WindowFunc::Lag { .. } => pos.checked_sub(*offset as usize),
                        _ => {
                            let t = pos + *offset as usize;
                            if t < len {
                                Some(t)
                            } else {
                                None
                            }
                        }
                    };
                    out[i] = match target {
                        Some(t) => eval(arg, &rows[partition[t]], outer, ctx)?,
                        None => match args.get(1) {
                            Some(default) => eval(default, &rows[i], outer, ctx)?,
                            None => Value::Null,
                        },
                    };
                }
            }
            WindowFunc::FirstValue | WindowFunc::LastValue => {
                let arg = args.first().ok_or_else(|| {
                    Error::FunctionArity { name: func.name().into(), expected: "1".into(), actual: 0 }
                })?;
                for (pos, &i) in partition.iter().enumerate() {
                    let (start, end) = frame_range(over.frame.as_ref(), &over.order_by, &keys, pos, len)?;
                    if start >= end {
                        out[i] = Value::Null;
                        continue;
                    }
                    let target = if *func == WindowFunc::FirstValue { start } else { end - 1 };
                    out[i] = eval(arg, &rows[partition[target]], outer, ctx)?;
                }
            }
            WindowFunc::Agg(agg) => {
                for (pos, &i) in partition.iter().enumerate() {
                    let (start, end) = frame_range(over.frame.as_ref(), &over.order_by, &keys, pos, len)?;
                    let mut acc = Accumulator::new(*agg, false);
                    for &j in partition.iter().take(end).skip(start) {
                        let value = match args.first() {
                            Some(a) => eval(a, &rows[j], outer, ctx)?,
                            None => Value::I64(1),
                        };
                        acc.feed(value)?;
                    }
                    out[i] = acc.finish();
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_frame_includes_peers() {
        let order_by = vec![SortField {
            expr: Expression::field(0, "t", "k", crate::types::DataType::bigint(), false),
            ascending: true,
        }];
        let keys = vec![
            vec![Value::I64(1)],
            vec![Value::I64(2)],
            vec![Value::I64(2)],
            vec![Value::I64(3)],
        ];
        // Row 1 and 2 are peers; both frames run through index 3 exclusive.
        assert_eq!(frame_range(None, &order_by, &keys, 1, 4).unwrap(), (0, 3));
        assert_eq!(frame_range(None, &order_by, &keys, 2, 4).unwrap(), (0, 3));
        assert_eq!(frame_range(None, &order_by, &keys, 3, 4).unwrap(), (0, 4));
    }

    #[test]
    fn rows_frame_bounds() {
        let frame = WindowFrame {
            units: FrameUnits::Rows,
            start: FrameBound::Preceding(1),
            end: FrameBound::Following(1),
        };
        assert_eq!(frame_range(Some(&frame), &[], &[], 0, 5).unwrap(), (0, 2));
        assert_eq!(frame_range(Some(&frame), &[], &[], 2, 5).unwrap(), (1, 4));
        assert_eq!(frame_range(Some(&frame), &[], &[], 4, 5).unwrap(), (3, 5));
    }
}
