//! The catalog contract: how the engine obtains databases and tables from
//! its host, and the synthesized `information_schema` database.

pub mod info_schema;

use crate::error::{Error, Result};
use crate::storage::Table;
use crate::types::schema::TableDef;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A database: a named namespace of tables and views.
pub trait Database: Send + Sync {
    fn name(&self) -> &str;

    /// Table names, sorted.
    fn tables(&self) -> Vec<String>;

    fn table(&self, name: &str) -> Option<Arc<dyn Table>>;

    fn create_table(&self, def: TableDef) -> Result<()>;

    fn drop_table(&self, name: &str) -> Result<()>;

    /// (name, definition SQL), sorted by name.
    fn views(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn view(&self, _name: &str) -> Option<String> {
        None
    }

    fn create_view(&self, name: &str, _definition: &str) -> Result<()> {
        Err(Error::UnsupportedFeature(format!("CREATE VIEW on database {}", name)))
    }

    fn drop_view(&self, name: &str) -> Result<()> {
        Err(Error::ViewNotFound(name.to_string()))
    }

    fn create_index(&self, table: &str, _index: crate::types::schema::IndexDef) -> Result<()> {
        Err(Error::UnsupportedFeature(format!("CREATE INDEX on table {}", table)))
    }

    fn drop_index(&self, _table: &str, name: &str) -> Result<()> {
        Err(Error::IndexNotFound(name.to_string()))
    }
}

/// The host-provided catalog root.
pub trait DatabaseProvider: Send + Sync {
    /// Database names, sorted.
    fn databases(&self) -> Vec<String>;

    fn database(&self, name: &str) -> Option<Arc<dyn Database>>;

    fn has_database(&self, name: &str) -> bool {
        self.database(name).is_some()
    }
}

/// Table statistics materialized by ANALYZE TABLE, surfaced through
/// `information_schema.STATISTICS` and `COLUMN_STATISTICS`.
#[derive(Default)]
pub struct StatisticsRegistry {
    rows: RwLock<HashMap<(String, String), TableStatistics>>,
}

#[derive(Debug, Clone, Default)]
pub struct TableStatistics {
    pub row_count: u64,
    /// (column name, distinct count)
    pub column_cardinality: Vec<(String, u64)>,
}

impl StatisticsRegistry {
    pub fn new() -> Arc<StatisticsRegistry> {
        Arc::new(StatisticsRegistry::default())
    }

    pub fn record(&self, database: &str, table: &str, stats: TableStatistics) {
        self.rows
            .write()
            .insert((database.to_lowercase(), table.to_lowercase()), stats);
    }

    pub fn get(&self, database: &str, table: &str) -> Option<TableStatistics> {
        self.rows
            .read()
            .get(&(database.to_lowercase(), table.to_lowercase()))
            .cloned()
    }
}

/// The engine's view of the world: the host provider plus the synthesized
/// information_schema database and the statistics registry.
#[derive(Clone)]
pub struct Catalog {
    provider: Arc<dyn DatabaseProvider>,
    statistics: Arc<StatisticsRegistry>,
}

impl Catalog {
    pub fn new(provider: Arc<dyn DatabaseProvider>) -> Catalog {
        Catalog { provider, statistics: StatisticsRegistry::new() }
    }

    pub fn provider(&self) -> &Arc<dyn DatabaseProvider> {
        &self.provider
    }

    pub fn statistics(&self) -> &Arc<StatisticsRegistry> {
        &self.statistics
    }

    pub fn databases(&self) -> Vec<String> {
        let mut names = self.provider.databases();
        names.push(info_schema::INFORMATION_SCHEMA.to_string());
        names.sort();
        names
    }

    pub fn database(&self, name: &str) -> Result<Arc<dyn Database>> {
        if name.eq_ignore_ascii_case(info_schema::INFORMATION_SCHEMA) {
            return Ok(info_schema::information_schema_db(
                self.provider.clone(),
                self.statistics.clone(),
            ));
        }
        self.provider
            .database(name)
            .ok_or_else(|| Error::DatabaseNotFound(name.to_string()))
    }

    pub fn table(&self, database: &str, name: &str) -> Result<Arc<dyn Table>> {
        let db = self.database(database)?;
        db.table(name).ok_or_else(|| Error::TableNotFound(name.to_string()))
    }
}
