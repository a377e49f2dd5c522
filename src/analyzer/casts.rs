//! Cast insertion: gives every comparison operand types its executor
//! kernel handles directly. String literals compared against temporal
//! columns are cast to the temporal type so the comparison and any index
//! range derived from it run over date semantics, per MySQL's coercion
//! table.

use super::{AnalyzerCtx, RuleSelector, Scope};
use crate::error::Result;
use crate::plan::Node;
use crate::types::expression::Expression;

fn needs_temporal_cast(side: &Expression, other: &Expression) -> bool {
    other.data_type().is_temporal()
        && matches!(side, Expression::Literal { value: crate::types::Value::Str(_), .. })
}

pub(super) fn insert_casts(
    _ctx: &mut AnalyzerCtx,
    node: Node,
    _scope: &Scope,
    _selector: RuleSelector,
) -> Result<(Node, bool)> {
    let mut changed = false;
    let node = node.transform_expressions_up(&mut |e| {
        let (op, left, right) = match e {
            Expression::Compare { op, left, right } => (op, left, right),
            other => return Ok(other),
        };
        let (left, right) = if needs_temporal_cast(&left, &right) {
            changed = true;
            let to = right.data_type();
            (Box::new(Expression::Cast { expr: left, to }), right)
        } else if needs_temporal_cast(&right, &left) {
            changed = true;
            let to = left.data_type();
            (left, Box::new(Expression::Cast { expr: right, to }))
        } else {
            (left, right)
        };
        Ok(Expression::Compare { op, left, right })
    })?;
    Ok((node, changed))
}
