//! Iterator construction for every relational operator.

use crate::error::{Error, Result};
use crate::execution::expression::{eval, eval_constant, eval_filter};
use crate::execution::{aggregate, cancellable, join, window, QueryCtx, Rows};
use crate::plan::Node;
use crate::storage::{IndexLookup, Table};
use crate::types::expression::{Expression, SortField};
use crate::types::value::{Row, Value};
use crate::variables::DEFAULT_CTE_RECURSION_DEPTH;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

/// Builds the row iterator for a node. `outer` is the scope row a
/// correlated subquery sees past its own row width; empty at the top level.
pub fn node_rows(node: &Node, ctx: &QueryCtx, outer: Arc<Row>) -> Result<Rows> {
    ctx.session.check_cancelled()?;
    match node {
        Node::UnresolvedTable { name, .. } => Err(Error::Internal(format!(
            "unresolved table {} reached execution",
            name
        ))),

        Node::Table(table_ref) => scan_all(table_ref.table.clone(), ctx),

        Node::IndexedTable { table, spec } => {
            let mut prefix = Vec::with_capacity(spec.prefix.len());
            for e in &spec.prefix {
                prefix.push(eval(e, &Vec::new(), &outer, ctx)?);
            }
            let lower = spec
                .lower
                .as_ref()
                .map(|(e, inc)| Ok::<_, Error>((eval(e, &Vec::new(), &outer, ctx)?, *inc)))
                .transpose()?;
            let upper = spec
                .upper
                .as_ref()
                .map(|(e, inc)| Ok::<_, Error>((eval(e, &Vec::new(), &outer, ctx)?, *inc)))
                .transpose()?;
            let lookup = IndexLookup { prefix, lower, upper };
            match table.table.as_indexed() {
                Some(indexed) => Ok(cancellable(indexed.index_lookup(&spec.index, &lookup)?, ctx.session.clone())),
                None => scan_all(table.table.clone(), ctx),
            }
        }

        Node::SubqueryAlias { child, .. } => node_rows(child, ctx, outer),

        Node::Values { rows, .. } => {
            let mut out = Vec::with_capacity(rows.len());
            for row_exprs in rows {
                let mut row = Vec::with_capacity(row_exprs.len());
                for e in row_exprs {
                    row.push(eval(e, &Vec::new(), &outer, ctx)?);
                }
                out.push(row);
            }
            Ok(Box::new(out.into_iter().map(Ok)))
        }

        Node::Filter { child, predicate } => {
            let rows = node_rows(child, ctx, outer.clone())?;
            let predicate = predicate.clone();
            let ctx = ctx.clone();
            Ok(Box::new(rows.filter_map(move |r| match r {
                Err(e) => Some(Err(e)),
                Ok(row) => match eval_filter(&predicate, &row, &outer, &ctx) {
                    Ok(true) => Some(Ok(row)),
                    Ok(false) => None,
                    Err(e) => Some(Err(e)),
                },
            })))
        }

        Node::Project { child, expressions, .. } => {
            let rows = node_rows(child, ctx, outer.clone())?;
            let expressions = expressions.clone();
            let ctx = ctx.clone();
            Ok(Box::new(rows.map(move |r| {
                let row = r?;
                let mut out = Vec::with_capacity(expressions.len());
                for e in &expressions {
                    out.push(eval(e, &row, &outer, &ctx)?);
                }
                Ok(out)
            })))
        }

        Node::Aggregate { child, group_by, aggregates } => {
            let input = node_rows(child, ctx, outer.clone())?;
            aggregate::rows(input, group_by, aggregates, ctx, outer)
        }

        Node::Window { child, expressions } => {
            let input = node_rows(child, ctx, outer.clone())?;
            window::rows(input, expressions, ctx, outer)
        }

        Node::Sort { child, order_by } => {
            let input = node_rows(child, ctx, outer.clone())?;
            sort_rows(input, order_by, ctx, outer)
        }

        Node::Limit { child, limit } => {
            let rows = node_rows(child, ctx, outer)?;
            Ok(Box::new(rows.take(*limit as usize)))
        }

        Node::Offset { child, offset } => {
            let rows = node_rows(child, ctx, outer)?;
            Ok(Box::new(rows.skip(*offset as usize)))
        }

        Node::Distinct { child } => {
            let rows = node_rows(child, ctx, outer)?;
            Ok(distinct_rows(rows))
        }

        Node::Join { left, right, kind, on, strategy, .. } => {
            join::rows(left, right, *kind, on.as_ref(), strategy, ctx, outer)
        }

        Node::Union { left, right, distinct } => {
            let l = node_rows(left, ctx, outer.clone())?;
            let r = node_rows(right, ctx, outer)?;
            let chained: Rows = Box::new(l.chain(r));
            Ok(if *distinct { distinct_rows(chained) } else { chained })
        }

        Node::RecursiveCte { name, init, recursive, distinct, .. } => {
            recursive_cte_rows(name, init, recursive, *distinct, ctx, outer)
        }

        Node::RecursiveTableRef { name, .. } => {
            let table = ctx
                .cte_tables
                .lock()
                .get(name)
                .cloned()
                .ok_or_else(|| Error::Internal(format!("recursive reference {} outside its CTE", name)))?;
            Ok(Box::new(RecursiveRefIter { rows: table, pos: 0 }))
        }

        Node::Nothing { .. } => Ok(Box::new(std::iter::empty())),
    }
}

struct RecursiveRefIter {
    rows: Arc<Vec<Row>>,
    pos: usize,
}

impl Iterator for RecursiveRefIter {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.get(self.pos)?.clone();
        self.pos += 1;
        Some(Ok(row))
    }
}

fn scan_all(table: Arc<dyn Table>, ctx: &QueryCtx) -> Result<Rows> {
    let partitions = table.partitions()?;
    let mut iters = Vec::with_capacity(partitions.len());
    for p in &partitions {
        iters.push(table.scan_partition(p)?);
    }
    let chained: Rows = Box::new(iters.into_iter().flatten());
    Ok(cancellable(chained, ctx.session.clone()))
}

fn distinct_rows(rows: Rows) -> Rows {
    let mut seen: HashSet<Row> = HashSet::new();
    Box::new(rows.filter_map(move |r| match r {
        Err(e) => Some(Err(e)),
        Ok(row) => {
            if seen.insert(row.clone()) {
                Some(Ok(row))
            } else {
                None
            }
        }
    }))
}

/// Compares two evaluated sort keys: NULL sorts first on ascending keys.
pub fn compare_sort_keys(a: &[Value], b: &[Value], order_by: &[SortField]) -> Ordering {
    for (i, field) in order_by.iter().enumerate() {
        let (x, y) = (&a[i], &b[i]);
        let ord = match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => crate::operators::compare_values(x, y)
                .ok()
                .flatten()
                .unwrap_or(Ordering::Equal),
        };
        let ord = if field.ascending { ord } else { ord.reverse() };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn sort_rows(input: Rows, order_by: &[SortField], ctx: &QueryCtx, outer: Arc<Row>) -> Result<Rows> {
    // Full materialization: evaluate the keys once, then a stable sort so
    // equal keys keep their input order.
    let mut decorated: Vec<(Vec<Value>, Row)> = Vec::new();
    for r in input {
        let row = r?;
        ctx.session.check_cancelled()?;
        let mut key = Vec::with_capacity(order_by.len());
        for field in order_by {
            key.push(eval(&field.expr, &row, &outer, ctx)?);
        }
        decorated.push((key, row));
    }
    let order_by = order_by.to_vec();
    decorated.sort_by(|(a, _), (b, _)| compare_sort_keys(a, b, &order_by));
    Ok(Box::new(decorated.into_iter().map(|(_, row)| Ok(row))))
}

fn recursive_cte_rows(
    name: &str,
    init: &Node,
    recursive: &Node,
    distinct: bool,
    ctx: &QueryCtx,
    outer: Arc<Row>,
) -> Result<Rows> {
    let max_depth = ctx
        .session
        .get_variable("cte_max_recursion_depth")
        .ok()
        .and_then(|v| v.to_i64().ok())
        .map(|n| n as u64)
        .unwrap_or(DEFAULT_CTE_RECURSION_DEPTH);

    let mut seen: HashSet<Row> = HashSet::new();
    let mut acc: Vec<Row> = Vec::new();
    let mut frontier: Vec<Row> = Vec::new();
    for r in node_rows(init, ctx, outer.clone())? {
        let row = r?;
        if distinct && !seen.insert(row.clone()) {
            continue;
        }
        acc.push(row.clone());
        frontier.push(row);
    }

    let mut iterations: u64 = 0;
    while !frontier.is_empty() {
        iterations += 1;
        if iterations > max_depth {
            return Err(Error::CteRecursionLimit(name.to_string()));
        }
        ctx.session.check_cancelled()?;

        // Bind the previous iteration's rows as the working table, keeping
        // whatever an enclosing evaluation had bound under the same name.
        let previous = ctx
            .cte_tables
            .lock()
            .insert(name.to_string(), Arc::new(std::mem::take(&mut frontier)));
        let result: Result<Vec<Row>> = (|| node_rows(recursive, ctx, outer.clone())?.collect())();
        {
            let mut tables = ctx.cte_tables.lock();
            match previous {
                Some(p) => {
                    tables.insert(name.to_string(), p);
                }
                None => {
                    tables.remove(name);
                }
            }
        }
        let produced = result?;

        for row in produced {
            if distinct && !seen.insert(row.clone()) {
                continue;
            }
            acc.push(row.clone());
            frontier.push(row);
        }
    }
    tracing::trace!(cte = name, rows = acc.len(), iterations, "recursive cte fixpoint");
    Ok(Box::new(acc.into_iter().map(Ok)))
}

/// Evaluates a LIMIT/OFFSET count expression to a non-negative integer.
pub fn eval_count(expr: &Expression, ctx: &QueryCtx) -> Result<u64> {
    let v = eval_constant(expr, ctx)?;
    let n = v.to_i64()?;
    if n < 0 {
        return Err(Error::InvalidArgument(format!("negative LIMIT/OFFSET {}", n)));
    }
    Ok(n as u64)
}
