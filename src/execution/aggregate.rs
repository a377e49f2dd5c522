//! Grouped aggregation: partition the input by the grouping-key tuple, feed
//! each partition through the aggregate accumulators, then stream one row
//! per partition. With no grouping columns and no input, aggregates return
//! their identity (COUNT 0, everything else NULL).

use crate::error::Result;
use crate::execution::expression::eval;
use crate::execution::{QueryCtx, Rows};
use crate::types::expression::{AggregateFunc, Expression};
use crate::types::value::{Row, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One running aggregate.
pub struct Accumulator {
    func: AggregateFunc,
    distinct: bool,
    seen: HashSet<Value>,
    count: u64,
    sum: f64,
    extreme: Option<Value>,
}

impl Accumulator {
    pub fn new(func: AggregateFunc, distinct: bool) -> Accumulator {
        Accumulator { func, distinct, seen: HashSet::new(), count: 0, sum: 0.0, extreme: None }
    }

    pub fn feed(&mut self, value: Value) -> Result<()> {
        if self.func == AggregateFunc::CountStar {
            self.count += 1;
            return Ok(());
        }
        if value.is_null() {
            return Ok(());
        }
        if self.distinct && !self.seen.insert(value.clone()) {
            return Ok(());
        }
        match self.func {
            AggregateFunc::Count => self.count += 1,
            AggregateFunc::Sum | AggregateFunc::Avg => {
                self.count += 1;
                self.sum += value.to_f64()?;
            }
            AggregateFunc::Min => {
                let replace = match &self.extreme {
                    None => true,
                    Some(cur) => crate::operators::compare_values(&value, cur)?
                        .map(|o| o == std::cmp::Ordering::Less)
                        .unwrap_or(false),
                };
                if replace {
                    self.extreme = Some(value);
                }
            }
            AggregateFunc::Max => {
                let replace = match &self.extreme {
                    None => true,
                    Some(cur) => crate::operators::compare_values(&value, cur)?
                        .map(|o| o == std::cmp::Ordering::Greater)
                        .unwrap_or(false),
                };
                if replace {
                    self.extreme = Some(value);
                }
            }
            AggregateFunc::CountStar => unreachable!(),
        }
        Ok(())
    }

    pub fn finish(&self) -> Value {
        match self.func {
            AggregateFunc::CountStar | AggregateFunc::Count => Value::I64(self.count as i64),
            AggregateFunc::Sum => {
                if self.count == 0 {
                    Value::Null
                } else {
                    Value::F64(self.sum)
                }
            }
            AggregateFunc::Avg => {
                if self.count == 0 {
                    Value::Null
                } else {
                    Value::F64(self.sum / self.count as f64)
                }
            }
            AggregateFunc::Min | AggregateFunc::Max => self.extreme.clone().unwrap_or(Value::Null),
        }
    }
}

fn accumulator_parts(e: &Expression) -> (AggregateFunc, Option<&Expression>, bool) {
    match e {
        Expression::Aggregate { func, arg, distinct } => (*func, arg.as_deref(), *distinct),
        // Validation guarantees only aggregate expressions land here.
        _ => (AggregateFunc::CountStar, None, false),
    }
}

pub fn rows(
    input: Rows,
    group_by: &[Expression],
    aggregates: &[Expression],
    ctx: &QueryCtx,
    outer: Arc<Row>,
) -> Result<Rows> {
    // Partitions keep first-seen order so deterministic storage order gives
    // deterministic output order.
    let mut order: Vec<Vec<Value>> = Vec::new();
    let mut states: HashMap<Vec<Value>, Vec<Accumulator>> = HashMap::new();

    for r in input {
        let row = r?;
        ctx.session.check_cancelled()?;
        let mut key = Vec::with_capacity(group_by.len());
        for e in group_by {
            key.push(eval(e, &row, &outer, ctx)?);
        }
        let accs = match states.get_mut(&key) {
            Some(accs) => accs,
            None => {
                order.push(key.clone());
                states.entry(key.clone()).or_insert_with(|| {
                    aggregates
                        .iter()
                        .map(|a| {
                            let (func, _, distinct) = accumulator_parts(a);
                            Accumulator::new(func, distinct)
                        })
                        .collect()
                })
            }
        };
        for (acc, agg_expr) in accs.iter_mut().zip(aggregates.iter()) {
            let (_, arg, _) = accumulator_parts(agg_expr);
            let value = match arg {
                Some(a) => eval(a, &row, &outer, ctx)?,
                None => Value::I64(1),
            };
            acc.feed(value)?;
        }
    }

    // A grand total over an empty input still produces one identity row.
    if order.is_empty() && group_by.is_empty() {
        let identity: Row = aggregates
            .iter()
            .map(|a| {
                let (func, _, distinct) = accumulator_parts(a);
                Accumulator::new(func, distinct).finish()
            })
            .collect();
        return Ok(Box::new(std::iter::once(Ok(identity))));
    }

    let mut out = Vec::with_capacity(order.len());
    for key in order {
        let accs = &states[&key];
        let mut row = key.clone();
        row.extend(accs.iter().map(|a| a.finish()));
        out.push(row);
    }
    Ok(Box::new(out.into_iter().map(Ok)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_identities() {
        let mut count = Accumulator::new(AggregateFunc::CountStar, false);
        assert_eq!(count.finish(), Value::I64(0));
        count.feed(Value::Null).unwrap();
        assert_eq!(count.finish(), Value::I64(1));

        let sum = Accumulator::new(AggregateFunc::Sum, false);
        assert_eq!(sum.finish(), Value::Null);
        let min = Accumulator::new(AggregateFunc::Min, false);
        assert_eq!(min.finish(), Value::Null);
    }

    #[test]
    fn aggregates_skip_nulls() {
        let mut sum = Accumulator::new(AggregateFunc::Sum, false);
        for v in [Value::I64(1), Value::Null, Value::I64(2)] {
            sum.feed(v).unwrap();
        }
        assert_eq!(sum.finish(), Value::F64(3.0));

        let mut count = Accumulator::new(AggregateFunc::Count, false);
        for v in [Value::I64(1), Value::Null, Value::I64(2)] {
            count.feed(v).unwrap();
        }
        assert_eq!(count.finish(), Value::I64(2));
    }

    #[test]
    fn distinct_dedups() {
        let mut sum = Accumulator::new(AggregateFunc::Sum, true);
        for v in [Value::I64(5), Value::I64(5), Value::I64(3)] {
            sum.feed(v).unwrap();
        }
        assert_eq!(sum.finish(), Value::F64(8.0));
    }
}
