//! Shared DML machinery: row finishing (type conversion, NOT NULL and SRID
//! checks) and foreign-key enforcement. The in-engine policy for foreign
//! keys is RESTRICT; cascading actions belong to providers that declare
//! them.

use crate::error::{Error, Result};
use crate::execution::QueryCtx;
use crate::plan::TableRef;
use crate::types::schema::TableDef;
use crate::types::value::{Row, Value};

/// The result of a DML statement.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOutcome {
    pub row_count: u64,
    pub last_insert_id: u64,
}

/// Converts every cell to its column type and enforces NOT NULL and SRID
/// constraints.
pub fn finish_row(def: &TableDef, mut row: Row) -> Result<Row> {
    for (i, col) in def.schema.iter().enumerate() {
        let v = std::mem::replace(&mut row[i], Value::Null);
        if v.is_null() {
            if !col.nullable && !col.auto_increment {
                return Err(Error::InsertIntoNonNullable(col.name.clone()));
            }
            continue;
        }
        let converted = col.data_type.convert(v)?;
        col.data_type.match_srid(&converted)?;
        row[i] = converted;
    }
    Ok(row)
}

fn scan_table_rows(table: &dyn crate::storage::Table) -> Result<Vec<Row>> {
    let mut out = Vec::new();
    for p in table.partitions()? {
        for r in table.scan_partition(&p)? {
            out.push(r?);
        }
    }
    Ok(out)
}

fn key_values(def: &TableDef, columns: &[String], row: &Row) -> Result<Vec<Value>> {
    let mut out = Vec::with_capacity(columns.len());
    for name in columns {
        let idx = def
            .schema
            .resolve(None, name)?
            .ok_or_else(|| Error::ColumnNotFound(name.clone()))?;
        out.push(row[idx].clone());
    }
    Ok(out)
}

/// Child-side check: every foreign key with fully non-NULL values must have
/// a matching parent row.
pub fn check_foreign_keys_child(dest: &TableRef, row: &Row, ctx: &QueryCtx) -> Result<()> {
    let Some(fk_table) = dest.table.as_foreign_keys() else { return Ok(()) };
    for fk in fk_table.foreign_keys() {
        let child_key = key_values(dest.def(), &fk.columns, row)?;
        if child_key.iter().any(|v| v.is_null()) {
            continue;
        }
        let parent = ctx.catalog.table(&dest.database, &fk.parent_table)?;
        let parent_def = parent.def().clone();
        let mut found = false;
        for parent_row in scan_table_rows(parent.as_ref())? {
            if key_values(&parent_def, &fk.parent_columns, &parent_row)? == child_key {
                found = true;
                break;
            }
        }
        if !found {
            return Err(Error::ForeignKeyViolation(fk.name.clone()));
        }
    }
    Ok(())
}

/// Parent-side check before a delete, or before an update that changes the
/// referenced key: no child row may still reference the old key.
pub fn check_foreign_keys_parent(dest: &TableRef, old: &Row, new: Option<&Row>, ctx: &QueryCtx) -> Result<()> {
    let db = ctx.catalog.database(&dest.database)?;
    for table_name in db.tables() {
        let Some(child) = db.table(&table_name) else { continue };
        let Some(fk_table) = child.as_foreign_keys() else { continue };
        let child_def = child.def().clone();
        for fk in fk_table.foreign_keys() {
            if !fk.parent_table.eq_ignore_ascii_case(&dest.name) {
                continue;
            }
            let old_key = key_values(dest.def(), &fk.parent_columns, old)?;
            if old_key.iter().any(|v| v.is_null()) {
                continue;
            }
            if let Some(new) = new {
                // Updates only matter when they move the referenced key.
                if key_values(dest.def(), &fk.parent_columns, new)? == old_key {
                    continue;
                }
            }
            for child_row in scan_table_rows(child.as_ref())? {
                if key_values(&child_def, &fk.columns, &child_row)? == old_key {
                    return Err(Error::ForeignKeyViolation(fk.name.clone()));
                }
            }
        }
    }
    Ok(())
}

/// Finds the stored row that collides with `row` on the primary key or any
/// unique index, for ON DUPLICATE KEY UPDATE.
pub fn find_conflicting_row(dest: &TableRef, row: &Row) -> Result<Option<Row>> {
    let def = dest.def();
    for existing in scan_table_rows(dest.table.as_ref())? {
        if !def.primary_key.is_empty() {
            let a: Vec<&Value> = def.primary_key.iter().map(|&i| &existing[i]).collect();
            let b: Vec<&Value> = def.primary_key.iter().map(|&i| &row[i]).collect();
            if a == b && !b.iter().any(|v| v.is_null()) {
                return Ok(Some(existing));
            }
        }
        for index in def.indexes.iter().filter(|i| i.unique) {
            let a = index.key_for_row(&def.schema, &existing)?;
            let b = index.key_for_row(&def.schema, row)?;
            if a == b && !b.iter().any(|v| v.is_null()) {
                return Ok(Some(existing));
            }
        }
    }
    Ok(None)
}
