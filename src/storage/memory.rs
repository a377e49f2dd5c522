//! In-memory storage: the reference implementation of the provider
//! contract, used by the test suites and by embedders that want a scratch
//! catalog. Rows live in a BTreeMap keyed by a stable row id; every declared
//! index is maintained as an ordered map from truncated key to row ids.

use crate::catalog::{Database, DatabaseProvider};
use crate::error::{Error, Result};
use crate::types::schema::{apply_prefix, ForeignKeyDef, IndexDef, TableDef};
use crate::types::value::{Row, Value};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::{
    AutoIncrementable, ForeignKeyTable, IndexLookup, Insertable, IndexedAccess, Partition, Replaceable, RowIter,
    Table, Updatable,
};

struct TableState {
    rows: BTreeMap<u64, Row>,
    next_row_id: u64,
    auto_increment: u64,
    /// index name -> ordered key -> row ids
    indexes: HashMap<String, BTreeMap<Vec<Value>, Vec<u64>>>,
}

pub struct MemoryTable {
    def: TableDef,
    state: RwLock<TableState>,
}

impl MemoryTable {
    pub fn new(def: TableDef) -> Arc<MemoryTable> {
        let mut indexes = HashMap::new();
        for index in &def.indexes {
            indexes.insert(index.name.clone(), BTreeMap::new());
        }
        Arc::new(MemoryTable {
            def,
            state: RwLock::new(TableState {
                rows: BTreeMap::new(),
                next_row_id: 0,
                auto_increment: 1,
                indexes,
            }),
        })
    }

    /// Builds a table and loads the given rows, bypassing constraints.
    /// Test harness convenience.
    pub fn with_rows(def: TableDef, rows: Vec<Row>) -> Arc<MemoryTable> {
        let table = MemoryTable::new(def);
        for row in rows {
            table.insert(row).expect("seed row");
        }
        table
    }

    fn primary_key_of(&self, row: &Row) -> Option<Vec<Value>> {
        if self.def.primary_key.is_empty() {
            return None;
        }
        Some(self.def.primary_key.iter().map(|&i| row[i].clone()).collect())
    }

    fn check_unique(&self, state: &TableState, row: &Row, ignore_row: Option<u64>) -> Result<()> {
        if let Some(pk) = self.primary_key_of(row) {
            if pk.iter().all(|v| !v.is_null()) {
                for (id, existing) in &state.rows {
                    if Some(*id) == ignore_row {
                        continue;
                    }
                    if self.primary_key_of(existing).as_ref() == Some(&pk) {
                        return Err(Error::UniqueKeyViolation(format_key(&pk)));
                    }
                }
            }
        }
        for index in self.def.indexes.iter().filter(|i| i.unique) {
            let key = index.key_for_row(&self.def.schema, row)?;
            if key.iter().any(|v| v.is_null()) {
                continue;
            }
            if let Some(ids) = state.indexes.get(&index.name).and_then(|m| m.get(&key)) {
                if ids.iter().any(|id| Some(*id) != ignore_row) {
                    return Err(Error::UniqueKeyViolation(format_key(&key)));
                }
            }
        }
        Ok(())
    }

    fn index_insert(&self, state: &mut TableState, row_id: u64, row: &Row) -> Result<()> {
        for index in &self.def.indexes {
            let key = index.key_for_row(&self.def.schema, row)?;
            state.indexes.get_mut(&index.name).expect("index map").entry(key).or_default().push(row_id);
        }
        Ok(())
    }

    fn index_remove(&self, state: &mut TableState, row_id: u64, row: &Row) -> Result<()> {
        for index in &self.def.indexes {
            let key = index.key_for_row(&self.def.schema, row)?;
            if let Some(ids) = state.indexes.get_mut(&index.name).expect("index map").get_mut(&key) {
                ids.retain(|id| *id != row_id);
            }
        }
        Ok(())
    }

    fn find_row_id(&self, state: &TableState, row: &Row) -> Option<u64> {
        state.rows.iter().find(|(_, r)| *r == row).map(|(id, _)| *id)
    }

    fn touch_auto_increment(&self, state: &mut TableState, row: &Row) {
        for (i, col) in self.def.schema.iter().enumerate() {
            if col.auto_increment {
                if let Ok(v) = row[i].to_u64() {
                    if v >= state.auto_increment {
                        state.auto_increment = v + 1;
                    }
                }
            }
        }
    }
}

fn format_key(key: &[Value]) -> String {
    key.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
}

impl Table for MemoryTable {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn def(&self) -> &TableDef {
        &self.def
    }

    fn partitions(&self) -> Result<Vec<Partition>> {
        Ok(vec![Partition::single()])
    }

    fn scan_partition(&self, _partition: &Partition) -> Result<RowIter> {
        let rows: Vec<Row> = self.state.read().rows.values().cloned().collect();
        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    fn row_count_hint(&self) -> Option<u64> {
        Some(self.state.read().rows.len() as u64)
    }

    fn as_insertable(&self) -> Option<&dyn Insertable> {
        Some(self)
    }

    fn as_updatable(&self) -> Option<&dyn Updatable> {
        Some(self)
    }

    fn as_replaceable(&self) -> Option<&dyn Replaceable> {
        Some(self)
    }

    fn as_auto_increment(&self) -> Option<&dyn AutoIncrementable> {
        if self.def.schema.iter().any(|c| c.auto_increment) {
            Some(self)
        } else {
            None
        }
    }

    fn as_indexed(&self) -> Option<&dyn IndexedAccess> {
        if self.def.indexes.is_empty() {
            None
        } else {
            Some(self)
        }
    }

    fn as_foreign_keys(&self) -> Option<&dyn ForeignKeyTable> {
        if self.def.foreign_keys.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl Insertable for MemoryTable {
    fn insert(&self, row: Row) -> Result<()> {
        if row.len() != self.def.schema.len() {
            return Err(Error::InsertIntoMismatchValueCount);
        }
        let mut state = self.state.write();
        self.check_unique(&state, &row, None)?;
        self.touch_auto_increment(&mut state, &row);
        let id = state.next_row_id;
        state.next_row_id += 1;
        self.index_insert(&mut state, id, &row)?;
        state.rows.insert(id, row);
        Ok(())
    }
}

impl Updatable for MemoryTable {
    fn update(&self, old: &Row, new: Row) -> Result<()> {
        let mut state = self.state.write();
        let id = self
            .find_row_id(&state, old)
            .ok_or_else(|| Error::Storage(format!("row to update not found in {}", self.def.name)))?;
        self.check_unique(&state, &new, Some(id))?;
        self.index_remove(&mut state, id, old)?;
        self.touch_auto_increment(&mut state, &new);
        self.index_insert(&mut state, id, &new)?;
        state.rows.insert(id, new);
        Ok(())
    }

    fn delete(&self, row: &Row) -> Result<()> {
        let mut state = self.state.write();
        let id = self
            .find_row_id(&state, row)
            .ok_or_else(|| Error::Storage(format!("row to delete not found in {}", self.def.name)))?;
        self.index_remove(&mut state, id, row)?;
        state.rows.remove(&id);
        Ok(())
    }
}

impl Replaceable for MemoryTable {
    fn replace(&self, row: Row) -> Result<u64> {
        let conflicting: Vec<Row> = {
            let state = self.state.read();
            let mut found = Vec::new();
            for (_, existing) in state.rows.iter() {
                if let (Some(a), Some(b)) = (self.primary_key_of(existing), self.primary_key_of(&row)) {
                    if a == b {
                        found.push(existing.clone());
                        continue;
                    }
                }
                for index in self.def.indexes.iter().filter(|i| i.unique) {
                    let a = index.key_for_row(&self.def.schema, existing)?;
                    let b = index.key_for_row(&self.def.schema, &row)?;
                    if a == b && !a.iter().any(|v| v.is_null()) {
                        found.push(existing.clone());
                        break;
                    }
                }
            }
            found
        };
        let displaced = conflicting.len() as u64;
        for old in &conflicting {
            self.delete(old)?;
        }
        self.insert(row)?;
        Ok(displaced + 1)
    }
}

impl AutoIncrementable for MemoryTable {
    fn peek_next_auto_increment(&self) -> Result<u64> {
        Ok(self.state.read().auto_increment)
    }

    fn next_auto_increment(&self) -> Result<u64> {
        let mut state = self.state.write();
        let v = state.auto_increment;
        state.auto_increment += 1;
        Ok(v)
    }

    fn set_auto_increment_watermark(&self, value: u64) -> Result<()> {
        let mut state = self.state.write();
        if value >= state.auto_increment {
            state.auto_increment = value + 1;
        }
        Ok(())
    }
}

impl IndexedAccess for MemoryTable {
    fn index_lookup(&self, index: &IndexDef, lookup: &IndexLookup) -> Result<RowIter> {
        let state = self.state.read();
        let map = state
            .indexes
            .get(&index.name)
            .ok_or_else(|| Error::IndexNotFound(index.name.clone()))?;
        // Truncate the probe values the same way keys were truncated.
        let prefix: Vec<Value> = lookup
            .prefix
            .iter()
            .zip(index.columns.iter())
            .map(|(v, ic)| apply_prefix(v, ic.prefix))
            .collect();
        let plen = prefix.len();
        let mut out: Vec<Row> = Vec::new();
        for (key, ids) in map.range(prefix.clone()..) {
            if key.len() < plen || key[..plen] != prefix[..] {
                break;
            }
            if let Some(next) = key.get(plen) {
                if let Some((lo, inclusive)) = &lookup.lower {
                    let ord = next.cmp(lo);
                    if ord == std::cmp::Ordering::Less || (!inclusive && ord == std::cmp::Ordering::Equal) {
                        continue;
                    }
                }
                if let Some((hi, inclusive)) = &lookup.upper {
                    let ord = next.cmp(hi);
                    if ord == std::cmp::Ordering::Greater || (!inclusive && ord == std::cmp::Ordering::Equal) {
                        continue;
                    }
                }
            }
            for id in ids {
                if let Some(row) = state.rows.get(id) {
                    out.push(row.clone());
                }
            }
        }
        Ok(Box::new(out.into_iter().map(Ok)))
    }
}

impl ForeignKeyTable for MemoryTable {
    fn foreign_keys(&self) -> Vec<ForeignKeyDef> {
        self.def.foreign_keys.clone()
    }
}

/// A named collection of in-memory tables and view definitions.
pub struct MemoryDatabase {
    name: String,
    tables: RwLock<HashMap<String, Arc<MemoryTable>>>,
    views: RwLock<HashMap<String, String>>,
}

impl MemoryDatabase {
    pub fn new(name: impl Into<String>) -> Arc<MemoryDatabase> {
        Arc::new(MemoryDatabase {
            name: name.into(),
            tables: RwLock::new(HashMap::new()),
            views: RwLock::new(HashMap::new()),
        })
    }

    pub fn add_table(&self, table: Arc<MemoryTable>) {
        self.tables.write().insert(table.name().to_lowercase(), table);
    }
}

impl Database for MemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().values().map(|t| t.name().to_string()).collect();
        names.sort();
        names
    }

    fn table(&self, name: &str) -> Option<Arc<dyn Table>> {
        self.tables.read().get(&name.to_lowercase()).map(|t| t.clone() as Arc<dyn Table>)
    }

    fn create_table(&self, def: TableDef) -> Result<()> {
        def.validate_indexes()?;
        let key = def.name.to_lowercase();
        let mut tables = self.tables.write();
        if tables.contains_key(&key) {
            return Err(Error::DuplicateTable(def.name));
        }
        tables.insert(key, MemoryTable::new(def));
        Ok(())
    }

    fn drop_table(&self, name: &str) -> Result<()> {
        self.tables
            .write()
            .remove(&name.to_lowercase())
            .map(|_| ())
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    fn views(&self) -> Vec<(String, String)> {
        let mut v: Vec<(String, String)> = self.views.read().iter().map(|(k, s)| (k.clone(), s.clone())).collect();
        v.sort();
        v
    }

    fn view(&self, name: &str) -> Option<String> {
        self.views.read().get(&name.to_lowercase()).cloned()
    }

    fn create_view(&self, name: &str, definition: &str) -> Result<()> {
        self.views.write().insert(name.to_lowercase(), definition.to_string());
        Ok(())
    }

    fn drop_view(&self, name: &str) -> Result<()> {
        self.views
            .write()
            .remove(&name.to_lowercase())
            .map(|_| ())
            .ok_or_else(|| Error::ViewNotFound(name.to_string()))
    }

    /// Rebuilds the table with the new index, re-inserting every row so
    /// unique constraints are enforced against existing data.
    fn create_index(&self, table: &str, index: crate::types::schema::IndexDef) -> Result<()> {
        let key = table.to_lowercase();
        let existing = self
            .tables
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::TableNotFound(table.to_string()))?;
        let mut def = existing.def().clone();
        if def.index(&index.name).is_some() {
            return Err(Error::Storage(format!("index {} already exists on {}", index.name, table)));
        }
        def.indexes.push(index);
        def.validate_indexes()?;
        let rebuilt = MemoryTable::new(def);
        for partition in existing.partitions()? {
            for row in existing.scan_partition(&partition)? {
                rebuilt.insert(row?)?;
            }
        }
        self.tables.write().insert(key, rebuilt);
        Ok(())
    }

    fn drop_index(&self, table: &str, name: &str) -> Result<()> {
        let key = table.to_lowercase();
        let existing = self
            .tables
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::TableNotFound(table.to_string()))?;
        let mut def = existing.def().clone();
        let before = def.indexes.len();
        def.indexes.retain(|i| !i.name.eq_ignore_ascii_case(name));
        if def.indexes.len() == before {
            return Err(Error::IndexNotFound(name.to_string()));
        }
        let rebuilt = MemoryTable::new(def);
        for partition in existing.partitions()? {
            for row in existing.scan_partition(&partition)? {
                rebuilt.insert(row?)?;
            }
        }
        self.tables.write().insert(key, rebuilt);
        Ok(())
    }
}

/// A provider over in-memory databases.
pub struct MemoryProvider {
    databases: RwLock<HashMap<String, Arc<MemoryDatabase>>>,
}

impl MemoryProvider {
    pub fn new() -> Arc<MemoryProvider> {
        Arc::new(MemoryProvider { databases: RwLock::new(HashMap::new()) })
    }

    pub fn with_database(name: impl Into<String>) -> (Arc<MemoryProvider>, Arc<MemoryDatabase>) {
        let provider = MemoryProvider::new();
        let db = MemoryDatabase::new(name);
        provider.add_database(db.clone());
        (provider, db)
    }

    pub fn add_database(&self, db: Arc<MemoryDatabase>) {
        self.databases.write().insert(db.name().to_lowercase(), db);
    }
}

impl DatabaseProvider for MemoryProvider {
    fn databases(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.read().values().map(|d| d.name().to_string()).collect();
        names.sort();
        names
    }

    fn database(&self, name: &str) -> Option<Arc<dyn Database>> {
        self.databases.read().get(&name.to_lowercase()).map(|d| d.clone() as Arc<dyn Database>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::data_type::DataType;
    use crate::types::schema::{Column, IndexColumn, Schema};

    fn prefix_table() -> Arc<MemoryTable> {
        let def = TableDef::new(
            "t",
            Schema::new(vec![Column::new("v", DataType::varchar(10)), Column::new("n", DataType::bigint())]),
        )
        .with_index(IndexDef {
            name: "v_prefix".into(),
            unique: true,
            columns: vec![IndexColumn { name: "v".into(), prefix: Some(3) }],
        });
        MemoryTable::new(def)
    }

    #[test]
    fn unique_prefix_index_rejects_shared_prefix() {
        let t = prefix_table();
        t.insert(vec![Value::Str("abcdef".into()), Value::I64(1)]).unwrap();
        let err = t.insert(vec![Value::Str("abcxyz".into()), Value::I64(2)]).unwrap_err();
        assert!(matches!(err, Error::UniqueKeyViolation(_)));
        t.insert(vec![Value::Str("abd000".into()), Value::I64(3)]).unwrap();
    }

    #[test]
    fn unique_index_ignores_nulls() {
        let t = prefix_table();
        t.insert(vec![Value::Null, Value::I64(1)]).unwrap();
        t.insert(vec![Value::Null, Value::I64(2)]).unwrap();
    }

    #[test]
    fn index_lookup_equality_and_range() {
        let def = TableDef::new(
            "nums",
            Schema::new(vec![Column::new("a", DataType::bigint()), Column::new("b", DataType::bigint())]),
        )
        .with_index(IndexDef {
            name: "ab".into(),
            unique: false,
            columns: vec![
                IndexColumn { name: "a".into(), prefix: None },
                IndexColumn { name: "b".into(), prefix: None },
            ],
        });
        let t = MemoryTable::new(def.clone());
        for (a, b) in [(1, 10), (1, 20), (2, 10), (2, 30)] {
            t.insert(vec![Value::I64(a), Value::I64(b)]).unwrap();
        }
        let index = def.indexes[0].clone();
        let rows: Vec<Row> = t
            .index_lookup(&index, &IndexLookup::equality(vec![Value::I64(1)]))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(rows.len(), 2);

        let lookup = IndexLookup {
            prefix: vec![Value::I64(2)],
            lower: Some((Value::I64(10), false)),
            upper: None,
        };
        let rows: Vec<Row> = t.index_lookup(&index, &lookup).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(rows, vec![vec![Value::I64(2), Value::I64(30)]]);
    }

    #[test]
    fn replace_displaces_by_primary_key() {
        let def = TableDef::new(
            "kv",
            Schema::new(vec![Column::new("k", DataType::bigint()), Column::new("v", DataType::text())]),
        )
        .with_primary_key(&["k"]);
        let t = MemoryTable::new(def);
        assert_eq!(t.replace(vec![Value::I64(1), Value::Str("a".into())]).unwrap(), 1);
        assert_eq!(t.replace(vec![Value::I64(1), Value::Str("b".into())]).unwrap(), 2);
        let rows: Vec<Row> = t.scan_partition(&Partition::single()).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(rows, vec![vec![Value::I64(1), Value::Str("b".into())]]);
    }

    #[test]
    fn auto_increment_watermark_advances() {
        let def = TableDef::new(
            "t",
            Schema::new(vec![Column::new("id", DataType::bigint()).auto_increment()]),
        );
        let t = MemoryTable::new(def);
        assert_eq!(t.next_auto_increment().unwrap(), 1);
        t.insert(vec![Value::I64(10)]).unwrap();
        assert_eq!(t.peek_next_auto_increment().unwrap(), 11);
    }
}
