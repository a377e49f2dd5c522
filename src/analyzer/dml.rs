//! DML analysis: binds INSERT/UPDATE/DELETE to their destination tables,
//! probes the storage capabilities the statement requires, and wraps the
//! INSERT source in a projection shaped exactly like the destination —
//! specified columns forwarded by field index, omitted columns taking
//! their defaults, auto-increment columns left for the generator, and
//! writes to generated or omitted NOT-NULL columns rejected before any row
//! flows.

use super::{analyze_node, AnalyzerCtx, RuleSelector, Scope};
use crate::error::{Error, Result};
use crate::plan::{DeletePlan, InsertPlan, Node, TableRef, UpdatePlan};
use crate::types::expression::Expression;
use crate::types::schema::Schema;
use crate::types::value::Value;

fn resolve_destination(ctx: &mut AnalyzerCtx, database: Option<&str>, table: &str) -> Result<TableRef> {
    let db = ctx.default_database(database);
    let table = ctx.catalog.table(&db, table)?;
    Ok(TableRef {
        database: db,
        name: table.name().to_string(),
        alias: None,
        table,
    })
}

/// Binds every column reference in `expr` against `schema`, offset by
/// `base`. Used for defaults, generated columns and assignment values,
/// which resolve against the destination row.
fn resolve_against(expr: Expression, schema: &Schema, base: usize, table: &str) -> Result<Expression> {
    expr.transform_up(&mut |e| match e {
        Expression::UnresolvedColumn { name, .. } => {
            let i = schema
                .resolve(None, &name)?
                .ok_or_else(|| Error::TableColumnNotFound { table: table.to_string(), column: name.clone() })?;
            let col = &schema.0[i];
            Ok(Expression::Field {
                index: base + i,
                table: col.source.clone(),
                name: col.name.clone(),
                data_type: col.data_type.clone(),
                nullable: col.nullable,
            })
        }
        other => Ok(other),
    })
}

fn null_literal() -> Expression {
    Expression::literal(Value::Null)
}

pub(super) fn analyze_insert(
    ctx: &mut AnalyzerCtx,
    mut plan: InsertPlan,
    _selector: RuleSelector,
) -> Result<InsertPlan> {
    // An already-bound INSERT (prepared statement re-analysis) only lets
    // its source resettle under the narrow rule set.
    if plan.destination.is_some() {
        plan.source = analyze_node(ctx, plan.source, &Scope::empty(), RuleSelector::InsertSource)?;
        return Ok(plan);
    }
    let dest = resolve_destination(ctx, plan.database.as_deref(), &plan.table)?;
    let def = dest.def().clone();

    // Capability checks happen before any row flows.
    if plan.replace {
        if dest.table.as_replaceable().is_none() {
            return Err(Error::TableNotReplaceable(def.name.clone()));
        }
    } else if dest.table.as_insertable().is_none() {
        return Err(Error::TableNotInsertable(def.name.clone()));
    }
    if !plan.on_duplicate.is_empty() && dest.table.as_updatable().is_none() {
        return Err(Error::TableNotUpdatable(def.name.clone()));
    }

    // Fill or validate the column list.
    let columns: Vec<String> = if plan.columns.is_empty() {
        def.schema
            .iter()
            .map(|c| {
                if c.generated.is_some() {
                    Err(Error::GeneratedColumnValue(c.name.clone()))
                } else {
                    Ok(c.name.clone())
                }
            })
            .collect::<Result<_>>()?
    } else {
        let mut seen = std::collections::HashSet::new();
        for name in &plan.columns {
            let idx = def
                .schema
                .resolve(None, name)?
                .ok_or_else(|| Error::InsertIntoNonexistentColumn(name.clone()))?;
            if !seen.insert(name.to_lowercase()) {
                return Err(Error::InvalidValue(format!("column '{}' specified twice", name)));
            }
            if def.schema.0[idx].generated.is_some() {
                return Err(Error::GeneratedColumnValue(name.clone()));
            }
        }
        plan.columns.clone()
    };

    // The source is analyzed on its own, with the narrower rule set.
    let source = analyze_node(ctx, plan.source, &Scope::empty(), RuleSelector::InsertSource)?;
    let source_schema = source.schema();
    if source_schema.len() != columns.len() {
        return Err(Error::InsertIntoMismatchValueCount);
    }

    // Wrap the source in a projection shaped like the destination.
    let mut wrap_exprs = Vec::with_capacity(def.schema.len());
    let mut post_defaults = Vec::new();
    let mut generated = Vec::new();
    for (i, col) in def.schema.iter().enumerate() {
        if let Some(gen_expr) = &col.generated {
            wrap_exprs.push(null_literal());
            generated.push((i, resolve_against(gen_expr.clone(), &def.schema, 0, &def.name)?));
            continue;
        }
        if let Some(pos) = columns.iter().position(|c| c.eq_ignore_ascii_case(&col.name)) {
            let src = &source_schema.0[pos];
            wrap_exprs.push(Expression::Field {
                index: pos,
                table: src.source.clone(),
                name: src.name.clone(),
                data_type: src.data_type.clone(),
                nullable: src.nullable,
            });
            continue;
        }
        if col.auto_increment {
            wrap_exprs.push(null_literal());
            continue;
        }
        if let Some(default) = &col.default {
            let references_columns = {
                let mut found = false;
                default.walk(&mut |e| {
                    if matches!(e, Expression::UnresolvedColumn { .. } | Expression::Field { .. }) {
                        found = true;
                    }
                });
                found
            };
            if references_columns {
                // Column-referencing defaults evaluate against the
                // assembled destination row, fix-indexed here.
                wrap_exprs.push(null_literal());
                post_defaults.push((i, resolve_against(default.clone(), &def.schema, 0, &def.name)?));
            } else {
                wrap_exprs.push(default.clone());
            }
            continue;
        }
        if col.nullable {
            wrap_exprs.push(null_literal());
            continue;
        }
        return Err(Error::InsertIntoNonNullable(col.name.clone()));
    }
    let alias_count = wrap_exprs.len();
    let source = Node::Project {
        child: Box::new(source),
        expressions: wrap_exprs,
        aliases: vec![None; alias_count],
    };

    // ON DUPLICATE KEY UPDATE: plain columns read the stored row,
    // VALUES(col) reads the row that failed to insert.
    let mut resolved_on_duplicate = Vec::with_capacity(plan.on_duplicate.len());
    for (name, value) in &plan.on_duplicate {
        let idx = def
            .schema
            .resolve(None, name)?
            .ok_or_else(|| Error::TableColumnNotFound { table: def.name.clone(), column: name.clone() })?;
        if def.schema.0[idx].generated.is_some() {
            return Err(Error::GeneratedColumnValue(name.clone()));
        }
        let schema_len = def.schema.len();
        let value = value.clone().transform_up(&mut |e| match e {
            Expression::FunctionCall { name: fname, args } if fname.eq_ignore_ascii_case("values") => {
                let [Expression::UnresolvedColumn { name: col, .. }] = args.as_slice() else {
                    return Err(Error::InvalidArgument("VALUES() takes one column name".into()));
                };
                let i = def
                    .schema
                    .resolve(None, col)?
                    .ok_or_else(|| Error::TableColumnNotFound { table: def.name.clone(), column: col.clone() })?;
                let c = &def.schema.0[i];
                Ok(Expression::Field {
                    index: schema_len + i,
                    table: c.source.clone(),
                    name: c.name.clone(),
                    data_type: c.data_type.clone(),
                    nullable: c.nullable,
                })
            }
            other => Ok(other),
        })?;
        let value = resolve_against(value, &def.schema, 0, &def.name)?;
        resolved_on_duplicate.push((idx, value));
    }

    plan.columns = columns;
    plan.source = source;
    plan.destination = Some(dest);
    plan.post_defaults = post_defaults;
    plan.generated = generated;
    plan.resolved_on_duplicate = resolved_on_duplicate;
    Ok(plan)
}

pub(super) fn analyze_update(
    ctx: &mut AnalyzerCtx,
    mut plan: UpdatePlan,
    selector: RuleSelector,
) -> Result<UpdatePlan> {
    if plan.destination.is_some() {
        plan.source = analyze_node(ctx, plan.source, &Scope::empty(), selector)?;
        return Ok(plan);
    }
    let dest = resolve_destination(ctx, plan.database.as_deref(), &plan.table)?;
    let def = dest.def().clone();
    if dest.table.as_updatable().is_none() {
        return Err(Error::TableNotUpdatable(def.name.clone()));
    }

    let source = analyze_node(ctx, plan.source, &Scope::empty(), selector)?;

    let mut resolved = Vec::with_capacity(plan.assignments.len());
    for (name, value) in &plan.assignments {
        let idx = def
            .schema
            .resolve(None, name)?
            .ok_or_else(|| Error::TableColumnNotFound { table: def.name.clone(), column: name.clone() })?;
        if def.schema.0[idx].generated.is_some() {
            return Err(Error::GeneratedColumnValue(name.clone()));
        }
        resolved.push((idx, resolve_against(value.clone(), &def.schema, 0, &def.name)?));
    }

    let mut generated = Vec::new();
    for (i, col) in def.schema.iter().enumerate() {
        if let Some(gen_expr) = &col.generated {
            generated.push((i, resolve_against(gen_expr.clone(), &def.schema, 0, &def.name)?));
        }
    }

    plan.source = source;
    plan.destination = Some(dest);
    plan.resolved_assignments = resolved;
    plan.generated = generated;
    Ok(plan)
}

pub(super) fn analyze_delete(
    ctx: &mut AnalyzerCtx,
    mut plan: DeletePlan,
    selector: RuleSelector,
) -> Result<DeletePlan> {
    if plan.destination.is_some() {
        plan.source = analyze_node(ctx, plan.source, &Scope::empty(), selector)?;
        return Ok(plan);
    }
    let dest = resolve_destination(ctx, plan.database.as_deref(), &plan.table)?;
    if dest.table.as_updatable().is_none() {
        return Err(Error::TableNotUpdatable(dest.def().name.clone()));
    }
    plan.source = analyze_node(ctx, plan.source, &Scope::empty(), selector)?;
    plan.destination = Some(dest);
    Ok(plan)
}
