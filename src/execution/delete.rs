//! DELETE execution.

use crate::error::{Error, Result};
use crate::execution::helpers::{check_foreign_keys_parent, ExecOutcome};
use crate::execution::{executor, QueryCtx};
use crate::plan::DeletePlan;
use crate::types::value::Row;
use std::sync::Arc;

pub fn execute(plan: &DeletePlan, ctx: &QueryCtx) -> Result<ExecOutcome> {
    let dest = plan
        .destination
        .as_ref()
        .ok_or_else(|| Error::Internal("DELETE reached execution unresolved".into()))?;
    let def = dest.def().clone();

    let updatable = dest
        .table
        .as_updatable()
        .ok_or_else(|| Error::TableNotUpdatable(def.name.clone()))?;

    let rows: Vec<Row> =
        executor::node_rows(&plan.source, ctx, Arc::new(Vec::new()))?.collect::<Result<_>>()?;

    let mut outcome = ExecOutcome::default();
    for row in rows {
        ctx.session.check_cancelled()?;
        check_foreign_keys_parent(dest, &row, None, ctx)?;
        updatable.delete(&row)?;
        outcome.row_count += 1;
    }
    Ok(outcome)
}
