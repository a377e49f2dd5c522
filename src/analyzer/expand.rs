//! Star expansion and NATURAL/USING join rewriting.

use super::{AnalyzerCtx, RuleSelector, Scope};
use crate::error::{Error, Result};
use crate::plan::Node;
use crate::types::expression::{CmpOp, Expression};
use crate::types::schema::Schema;

fn field_from(schema: &Schema, index: usize) -> Expression {
    let col = &schema.0[index];
    Expression::Field {
        index,
        table: col.source.clone(),
        name: col.name.clone(),
        data_type: col.data_type.clone(),
        nullable: col.nullable,
    }
}

/// Replaces `*` and `table.*` in projections with explicit field lists,
/// preserving source-table tags.
pub(super) fn expand_stars(
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
        if !expressions.iter().any(|e| matches!(e, Expression::Star { .. })) {
            return Ok(Node::Project { child, expressions, aliases });
        }
        if !child.resolved() {
            return Ok(Node::Project { child, expressions, aliases });
        }
        let input = child.schema();
        let mut out_exprs = Vec::new();
        let mut out_aliases = Vec::new();
        for (expr, alias) in expressions.into_iter().zip(aliases.into_iter()) {
            match expr {
                Expression::Star { table: None } => {
                    for i in 0..input.len() {
                        out_exprs.push(field_from(&input, i));
                        out_aliases.push(None);
                    }
                }
                Expression::Star { table: Some(t) } => {
                    let mut any = false;
                    for (i, col) in input.iter().enumerate() {
                        if col.source.eq_ignore_ascii_case(&t) {
                            out_exprs.push(field_from(&input, i));
                            out_aliases.push(None);
                            any = true;
                        }
                    }
                    if !any {
                        return Err(Error::TableNotFound(t));
                    }
                }
                other => {
                    out_exprs.push(other);
                    out_aliases.push(alias);
                }
            }
        }
        changed = true;
        Ok(Node::Project { child, expressions: out_exprs, aliases: out_aliases })
    })?;
    Ok((node, changed))
}

/// Rewrites NATURAL and USING joins into an explicit equality predicate
/// under a projection that deduplicates the join columns: shared columns
/// first (from the left side), then the remaining left columns, then the
/// remaining right columns.
pub(super) fn expand_natural_joins(
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
        if !natural && using.is_empty() {
            return Ok(Node::Join { left, right, kind, on, strategy, natural, using });
        }
        if !left.resolved() || !right.resolved() {
            return Ok(Node::Join { left, right, kind, on, strategy, natural, using });
        }

        let l = left.schema();
        let r = right.schema();
        let shared: Vec<String> = if natural {
            l.iter()
                .map(|c| c.name.clone())
                .filter(|name| r.resolve(None, name).ok().flatten().is_some())
                .collect()
        } else {
            using.clone()
        };

        let mut predicate: Option<Expression> = None;
        let mut pairs = Vec::new();
        for name in &shared {
            let li = l
                .resolve(None, name)?
                .ok_or_else(|| Error::ColumnNotFound(name.clone()))?;
            let ri = r
                .resolve(None, name)?
                .ok_or_else(|| Error::ColumnNotFound(name.clone()))?;
            pairs.push((li, ri));
            let eq = Expression::Compare {
                op: CmpOp::Eq,
                left: Box::new(field_from(&l, li)),
                right: Box::new({
                    let mut f = field_from(&r, ri);
                    if let Expression::Field { index, .. } = &mut f {
                        *index += l.len();
                    }
                    f
                }),
            };
            predicate = Some(match predicate {
                None => eq,
                Some(prev) => Expression::And(Box::new(prev), Box::new(eq)),
            });
        }

        let combined = match predicate {
            None => on,
            Some(p) => Some(match on {
                None => p,
                Some(existing) => Expression::And(Box::new(p), Box::new(existing)),
            }),
        };

        // Deduplicating projection over the rewritten join.
        let join_schema_left_len = l.len();
        let mut project_exprs = Vec::new();
        for &(li, _) in &pairs {
            project_exprs.push(field_from(&l, li));
        }
        for i in 0..l.len() {
            if !pairs.iter().any(|&(li, _)| li == i) {
                project_exprs.push(field_from(&l, i));
            }
        }
        for j in 0..r.len() {
            if !pairs.iter().any(|&(_, rj)| rj == j) {
                let mut f = field_from(&r, j);
                if let Expression::Field { index, .. } = &mut f {
                    *index += join_schema_left_len;
                }
                project_exprs.push(f);
            }
        }
        let alias_count = project_exprs.len();

        changed = true;
        Ok(Node::Project {
            child: Box::new(Node::Join {
                left,
                right,
                kind,
                on: combined,
                strategy,
                natural: false,
                using: Vec::new(),
            }),
            expressions: project_exprs,
            aliases: vec![None; alias_count],
        })
    })?;
    Ok((node, changed))
}
