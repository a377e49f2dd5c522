//! UPDATE execution. The source streams the rows to change; assignments
//! apply left to right, each seeing the effects of the previous one, as
//! MySQL does.

use crate::error::{Error, Result};
use crate::execution::expression::eval;
use crate::execution::helpers::{
    check_foreign_keys_child, check_foreign_keys_parent, finish_row, ExecOutcome,
};
use crate::execution::{executor, QueryCtx};
use crate::plan::UpdatePlan;
use crate::types::value::Row;
use std::sync::Arc;

pub fn execute(plan: &UpdatePlan, ctx: &QueryCtx) -> Result<ExecOutcome> {
    let dest = plan
        .destination
        .as_ref()
        .ok_or_else(|| Error::Internal("UPDATE reached execution unresolved".into()))?;
    let def = dest.def().clone();
    let ctx = ctx.clone().strict();

    let updatable = dest
        .table
        .as_updatable()
        .ok_or_else(|| Error::TableNotUpdatable(def.name.clone()))?;

    let old_rows: Vec<Row> =
        executor::node_rows(&plan.source, &ctx, Arc::new(Vec::new()))?.collect::<Result<_>>()?;

    let mut outcome = ExecOutcome::default();
    for old in old_rows {
        ctx.session.check_cancelled()?;
        let mut new = old.clone();
        for (i, expr) in &plan.resolved_assignments {
            new[*i] = eval(expr, &new, &[], &ctx)?;
        }
        for (i, expr) in &plan.generated {
            new[*i] = eval(expr, &new, &[], &ctx)?;
        }
        let new = finish_row(&def, new)?;
        if new == old {
            continue;
        }
        check_foreign_keys_child(dest, &new, &ctx)?;
        check_foreign_keys_parent(dest, &old, Some(&new), &ctx)?;
        updatable.update(&old, new)?;
        outcome.row_count += 1;
    }
    Ok(outcome)
}
