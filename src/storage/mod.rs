//! The storage-provider contract.
//!
//! The engine consumes tables through `Table` plus optional capability
//! traits, probed at analysis time through the `as_*` accessors. A missing
//! capability degrades the plan: no `IndexedAccess` means full scans with
//! in-engine filtering, no `Insertable` means INSERT fails analysis.

pub mod memory;

use crate::error::Result;
use crate::types::schema::{ForeignKeyDef, IndexDef, TableDef};
use crate::types::value::{Row, Value};
use std::sync::Arc;

pub use memory::{MemoryDatabase, MemoryProvider, MemoryTable};

/// A pull-based stream of rows.
pub type RowIter = Box<dyn Iterator<Item = Result<Row>> + Send>;

/// A slice of a table the provider can scan independently; the unit of
/// parallelism for the optional exchange operator.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub key: Vec<u8>,
}

impl Partition {
    pub fn single() -> Partition {
        Partition { key: Vec::new() }
    }
}

/// An index lookup: equality on a leading prefix of the index columns plus
/// an optional range on the following column. Values are compared after
/// prefix-length truncation where the index declares one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexLookup {
    pub prefix: Vec<Value>,
    pub lower: Option<(Value, bool)>,
    pub upper: Option<(Value, bool)>,
}

impl IndexLookup {
    pub fn equality(prefix: Vec<Value>) -> IndexLookup {
        IndexLookup { prefix, lower: None, upper: None }
    }
}

/// A table the engine can read.
pub trait Table: Send + Sync {
    fn name(&self) -> &str;

    fn def(&self) -> &TableDef;

    fn partitions(&self) -> Result<Vec<Partition>>;

    fn scan_partition(&self, partition: &Partition) -> Result<RowIter>;

    /// Total row count if cheaply known; feeds ANALYZE TABLE and join-side
    /// sizing.
    fn row_count_hint(&self) -> Option<u64> {
        None
    }

    // Capability probes. Absence forces scan-and-filter fallbacks.

    fn as_insertable(&self) -> Option<&dyn Insertable> {
        None
    }

    fn as_updatable(&self) -> Option<&dyn Updatable> {
        None
    }

    fn as_replaceable(&self) -> Option<&dyn Replaceable> {
        None
    }

    fn as_auto_increment(&self) -> Option<&dyn AutoIncrementable> {
        None
    }

    fn as_indexed(&self) -> Option<&dyn IndexedAccess> {
        None
    }

    fn as_foreign_keys(&self) -> Option<&dyn ForeignKeyTable> {
        None
    }

    fn as_projected(&self) -> Option<&dyn ProjectedTable> {
        None
    }

    fn as_filtered(&self) -> Option<&dyn FilteredTable> {
        None
    }
}

pub trait Insertable {
    /// Inserts a full-width row. Unique and primary keys are enforced here.
    fn insert(&self, row: Row) -> Result<()>;
}

pub trait Updatable {
    fn update(&self, old: &Row, new: Row) -> Result<()>;

    fn delete(&self, row: &Row) -> Result<()>;
}

pub trait Replaceable {
    /// REPLACE semantics: delete any row sharing a unique key, then insert.
    /// Returns the number of rows the statement touched (1 for a plain
    /// insert, 2 for delete-then-insert).
    fn replace(&self, row: Row) -> Result<u64>;
}

pub trait AutoIncrementable {
    /// The value the next insert would receive.
    fn peek_next_auto_increment(&self) -> Result<u64>;

    /// Claims and returns the next value.
    fn next_auto_increment(&self) -> Result<u64>;

    /// Raises the counter after an explicit value was inserted.
    fn set_auto_increment_watermark(&self, value: u64) -> Result<()>;
}

pub trait IndexedAccess {
    /// Walks an index and returns only the matching rows, in index order.
    fn index_lookup(&self, index: &IndexDef, lookup: &IndexLookup) -> Result<RowIter>;
}

pub trait ForeignKeyTable {
    fn foreign_keys(&self) -> Vec<ForeignKeyDef>;
}

pub trait ProjectedTable {
    /// A view of this table restricted to the given column indices.
    fn with_projection(&self, columns: &[usize]) -> Result<Arc<dyn Table>>;
}

pub trait FilteredTable {
    /// A view of this table with the predicate pushed into storage.
    fn with_filter(&self, predicate: &crate::types::expression::Expression) -> Result<Arc<dyn Table>>;
}
