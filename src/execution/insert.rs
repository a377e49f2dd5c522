//! INSERT / REPLACE execution. The analyzer already wrapped the source in
//! a projection shaped like the destination schema; this stage fills in
//! auto-increment values, column-referencing defaults and generated
//! columns, enforces constraints, and writes through the storage
//! capabilities.

use crate::error::{Error, Result};
use crate::execution::expression::eval;
use crate::execution::helpers::{
    check_foreign_keys_child, check_foreign_keys_parent, find_conflicting_row, finish_row, ExecOutcome,
};
use crate::execution::{executor, QueryCtx};
use crate::plan::InsertPlan;
use crate::types::value::{Row, Value};
use std::sync::Arc;

pub fn execute(plan: &InsertPlan, ctx: &QueryCtx) -> Result<ExecOutcome> {
    let dest = plan
        .destination
        .as_ref()
        .ok_or_else(|| Error::Internal("INSERT reached execution unresolved".into()))?;
    let table = &dest.table;
    let def = dest.def().clone();
    let ctx = ctx.clone().strict();

    let source_rows: Vec<Row> =
        executor::node_rows(&plan.source, &ctx, Arc::new(Vec::new()))?.collect::<Result<_>>()?;

    let mut outcome = ExecOutcome::default();
    let mut first_generated_id: Option<u64> = None;

    for mut row in source_rows {
        ctx.session.check_cancelled()?;
        if row.len() != def.schema.len() {
            return Err(Error::InsertIntoMismatchValueCount);
        }

        // Auto-increment: NULL or zero claims the next value; explicit
        // values push the watermark.
        for (i, col) in def.schema.iter().enumerate() {
            if !col.auto_increment {
                continue;
            }
            let auto = table
                .as_auto_increment()
                .ok_or_else(|| Error::Storage(format!("{} has no auto-increment support", def.name)))?;
            let explicit = match &row[i] {
                Value::Null => None,
                v => match v.to_i64() {
                    Ok(0) => None,
                    Ok(n) => Some(n as u64),
                    Err(_) => None,
                },
            };
            match explicit {
                Some(v) => auto.set_auto_increment_watermark(v)?,
                None => {
                    let v = auto.next_auto_increment()?;
                    row[i] = col.data_type.convert(Value::U64(v))?;
                    first_generated_id.get_or_insert(v);
                }
            }
        }

        for (i, expr) in &plan.post_defaults {
            if row[*i].is_null() {
                row[*i] = eval(expr, &row, &[], &ctx)?;
            }
        }
        for (i, expr) in &plan.generated {
            row[*i] = eval(expr, &row, &[], &ctx)?;
        }

        let row = finish_row(&def, row)?;
        check_foreign_keys_child(dest, &row, &ctx)?;

        if plan.replace {
            let replaceable = table
                .as_replaceable()
                .ok_or_else(|| Error::TableNotReplaceable(def.name.clone()))?;
            outcome.row_count += replaceable.replace(row)?;
            continue;
        }

        let insertable = table
            .as_insertable()
            .ok_or_else(|| Error::TableNotInsertable(def.name.clone()))?;
        match insertable.insert(row.clone()) {
            Ok(()) => outcome.row_count += 1,
            Err(Error::UniqueKeyViolation(key)) if !plan.resolved_on_duplicate.is_empty() => {
                outcome.row_count += on_duplicate_update(plan, dest, &row, &ctx)?;
                tracing::trace!(table = %def.name, key = %key, "insert fell back to on-duplicate update");
            }
            Err(Error::UniqueKeyViolation(key)) if plan.ignore => {
                ctx.session.warn(1062, format!("Duplicate entry '{}'", key));
            }
            Err(e) => return Err(e),
        }
    }

    if let Some(id) = first_generated_id {
        ctx.session.set_last_insert_id(id);
        outcome.last_insert_id = id;
    }
    Ok(outcome)
}

/// Applies ON DUPLICATE KEY UPDATE against the conflicting stored row.
/// Assignment expressions see `old_row ++ new_row`, so plain column
/// references read the stored row and VALUES(col) references read the row
/// that failed to insert.
fn on_duplicate_update(
    plan: &InsertPlan,
    dest: &crate::plan::TableRef,
    new_row: &Row,
    ctx: &QueryCtx,
) -> Result<u64> {
    let def = dest.def().clone();
    let old = find_conflicting_row(dest, new_row)?
        .ok_or_else(|| Error::Internal("duplicate key reported but no conflicting row found".into()))?;

    let mut eval_row = old.clone();
    eval_row.extend(new_row.iter().cloned());

    let mut updated = old.clone();
    for (i, expr) in &plan.resolved_on_duplicate {
        updated[*i] = eval(expr, &eval_row, &[], ctx)?;
    }
    for (i, expr) in &plan.generated {
        updated[*i] = eval(expr, &updated, &[], ctx)?;
    }
    let updated = finish_row(&def, updated)?;
    if updated == old {
        return Ok(0);
    }
    check_foreign_keys_child(dest, &updated, ctx)?;
    check_foreign_keys_parent(dest, &old, Some(&updated), ctx)?;

    let updatable = dest
        .table
        .as_updatable()
        .ok_or_else(|| Error::TableNotUpdatable(def.name.clone()))?;
    updatable.update(&old, updated)?;
    // MySQL reports two affected rows for an insert that became an update.
    Ok(2)
}
