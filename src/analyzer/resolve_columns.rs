//! Column binding: rewrites every name reference into a field index over
//! the enclosing operator's input row, walks the scope stack for
//! correlated references, analyzes subquery expressions with an extended
//! scope, and classifies them correlated or cacheable.
//!
//! The rule is lenient: a name it cannot bind is left in place for a later
//! rule (sort resolution adds hidden columns) and the final validation pass
//! turns leftovers into user errors.

use super::{analyze_node, AnalyzerCtx, RuleSelector, Scope};
use crate::error::Result;
use crate::plan::Node;
use crate::types::expression::{Expression, SubqueryExpr};
use crate::types::schema::Schema;

pub(super) fn resolve_columns(
    ctx: &mut AnalyzerCtx,
    node: Node,
    scope: &Scope,
    selector: RuleSelector,
) -> Result<(Node, bool)> {
    let original = node.clone();
    let resolved = resolve_node(ctx, node, scope, selector)?;
    let changed = resolved != original;
    Ok((resolved, changed))
}

/// The schema an operator's expressions see: for joins the concatenation
/// of both sides, otherwise the (first) child's output.
pub(super) fn node_input_schema(node: &Node) -> Schema {
    match node {
        Node::Join { left, right, .. } => left.schema().join(&right.schema()),
        other => other
            .children()
            .first()
            .map(|c| c.schema())
            .unwrap_or_else(Schema::empty),
    }
}

fn resolve_node(ctx: &mut AnalyzerCtx, node: Node, scope: &Scope, selector: RuleSelector) -> Result<Node> {
    // Recursive CTEs order their own resolution: the init leg defines the
    // working-table schema the recursive leg reads through its
    // self-reference.
    let node = match node {
        Node::RecursiveCte { name, columns, init, recursive, distinct } => {
            return resolve_recursive_cte(ctx, name, columns, *init, *recursive, distinct, scope, selector);
        }
        other => other,
    };

    // Children first, same scope: the scope only grows at subquery
    // expression boundaries, not between parent and child operators.
    let kids: Vec<Node> = node.children().into_iter().cloned().collect();
    let node = if kids.is_empty() {
        node
    } else {
        let mut resolved_kids = Vec::with_capacity(kids.len());
        for kid in kids {
            resolved_kids.push(resolve_node(ctx, kid, scope, selector)?);
        }
        node.with_children(resolved_kids)?
    };

    let exprs: Vec<Expression> = node.expressions().into_iter().cloned().collect();
    if exprs.is_empty() {
        return Ok(node);
    }
    let input = node_input_schema(&node);
    let mut rewritten = Vec::with_capacity(exprs.len());
    for e in exprs {
        rewritten.push(resolve_expression(ctx, e, &input, scope, selector)?);
    }
    node.with_expressions(rewritten)
}

/// The init leg resolves first and defines the working-table schema; the
/// recursive leg's self-references get that schema stamped before they
/// resolve.
#[allow(clippy::too_many_arguments)]
fn resolve_recursive_cte(
    ctx: &mut AnalyzerCtx,
    name: String,
    columns: Vec<String>,
    init: Node,
    recursive: Node,
    distinct: bool,
    scope: &Scope,
    selector: RuleSelector,
) -> Result<Node> {
    let init = resolve_node(ctx, init, scope, selector)?;
    let shell = Node::RecursiveCte {
        name: name.clone(),
        columns: columns.clone(),
        init: Box::new(init),
        recursive: Box::new(Node::Nothing { schema: Schema::empty() }),
        distinct,
    };
    let cte_schema = shell.schema();
    let Node::RecursiveCte { init, .. } = shell else { unreachable!() };

    let stamped = recursive.transform_up(&mut |n| match n {
        Node::RecursiveTableRef { name: ref_name, schema } => {
            if ref_name.eq_ignore_ascii_case(&name) && schema != cte_schema {
                Ok(Node::RecursiveTableRef { name: ref_name, schema: cte_schema.clone() })
            } else {
                Ok(Node::RecursiveTableRef { name: ref_name, schema })
            }
        }
        other => Ok(other),
    })?;
    let recursive = resolve_node(ctx, stamped, scope, selector)?;
    Ok(Node::RecursiveCte {
        name,
        columns,
        init,
        recursive: Box::new(recursive),
        distinct,
    })
}

pub(super) fn resolve_expression(
    ctx: &mut AnalyzerCtx,
    expr: Expression,
    input: &Schema,
    scope: &Scope,
    selector: RuleSelector,
) -> Result<Expression> {
    let input_width = input.len();
    expr.transform_up(&mut |e| {
        match e {
            Expression::UnresolvedColumn { table, name } => {
                if let Some(i) = input.resolve(table.as_deref(), &name)? {
                    let col = &input.0[i];
                    return Ok(Expression::Field {
                        index: i,
                        table: col.source.clone(),
                        name: col.name.clone(),
                        data_type: col.data_type.clone(),
                        nullable: col.nullable,
                    });
                }
                if let Some((offset, col)) = scope.resolve(table.as_deref(), &name)? {
                    return Ok(Expression::Field {
                        index: input_width + offset,
                        table: col.source.clone(),
                        name: col.name.clone(),
                        data_type: col.data_type.clone(),
                        nullable: col.nullable,
                    });
                }
                // Left for the sort resolver or the final validation.
                Ok(Expression::UnresolvedColumn { table, name })
            }

            // Re-stamp field types once the child schema settled; fields
            // minted by operator rewrites start out untyped.
            Expression::Field { index, table, name, data_type, nullable } => {
                if index < input_width {
                    let col = &input.0[index];
                    if col.data_type != data_type && data_type == crate::types::DataType::Null {
                        return Ok(Expression::Field {
                            index,
                            table,
                            name,
                            data_type: col.data_type.clone(),
                            nullable: col.nullable,
                        });
                    }
                }
                Ok(Expression::Field { index, table, name, data_type, nullable })
            }

            Expression::ScalarSubquery(sq) => {
                let sq = resolve_subquery(ctx, *sq, input, scope, selector)?;
                Ok(Expression::ScalarSubquery(Box::new(sq)))
            }
            Expression::InSubquery { expr, subquery, negated } => {
                let subquery = resolve_subquery(ctx, *subquery, input, scope, selector)?;
                Ok(Expression::InSubquery { expr, subquery: Box::new(subquery), negated })
            }
            Expression::Exists { subquery, negated } => {
                let subquery = resolve_subquery(ctx, *subquery, input, scope, selector)?;
                Ok(Expression::Exists { subquery: Box::new(subquery), negated })
            }

            other => Ok(other),
        }
    })
}

/// Analyzes a subquery's plan with the enclosing input schema pushed onto
/// the scope, then classifies it: a subquery that resolved anything through
/// the scope is correlated and re-evaluates per outer row; anything else is
/// evaluated once per statement and cached under a stable id.
fn resolve_subquery(
    ctx: &mut AnalyzerCtx,
    sq: SubqueryExpr,
    input: &Schema,
    scope: &Scope,
    selector: RuleSelector,
) -> Result<SubqueryExpr> {
    let sub_scope = scope.child(input.clone());
    let node = analyze_node(ctx, sq.node, &sub_scope, selector)?;
    let correlated = sub_scope.used_outer();
    let cache_id = if correlated {
        None
    } else {
        sq.cache_id.or_else(|| Some(ctx.next_subquery_cache_id()))
    };
    Ok(SubqueryExpr { node, correlated, cache_id })
}
