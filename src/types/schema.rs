//! Schemas: ordered column lists with source-table tags, plus the
//! catalog-side table definition (indexes, keys, constraints).

use crate::error::{Error, Result};
use crate::types::data_type::DataType;
use crate::types::expression::Expression;
use crate::types::value::{Row, Value};
use std::fmt;

/// A column of a schema. `source` tags the table (or alias) the column came
/// from so `table.col` references stay resolvable through joins and
/// projections.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    /// Default expression; may reference other columns of the same table.
    pub default: Option<Expression>,
    pub auto_increment: bool,
    /// Stored generated column expression. Generated columns cannot be
    /// assigned in INSERT/UPDATE.
    pub generated: Option<Expression>,
    pub comment: String,
    pub source: String,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Column {
        Column {
            name: name.into(),
            data_type,
            nullable: true,
            default: None,
            auto_increment: false,
            generated: None,
            comment: String::new(),
            source: String::new(),
        }
    }

    pub fn not_null(mut self) -> Column {
        self.nullable = false;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Column {
        self.source = source.into();
        self
    }

    pub fn with_default(mut self, expr: Expression) -> Column {
        self.default = Some(expr);
        self
    }

    pub fn auto_increment(mut self) -> Column {
        self.auto_increment = true;
        self.nullable = false;
        self
    }
}

/// An ordered list of columns; the shape of every row an operator produces.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema(pub Vec<Column>);

impl Schema {
    pub fn new(columns: Vec<Column>) -> Schema {
        Schema(columns)
    }

    pub fn empty() -> Schema {
        Schema(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Column> {
        self.0.iter()
    }

    pub fn column(&self, i: usize) -> Option<&Column> {
        self.0.get(i)
    }

    /// Finds the field index for a possibly-qualified column name. Matching
    /// is case-insensitive; a tie across different source tables is an
    /// ambiguity error.
    pub fn resolve(&self, table: Option<&str>, name: &str) -> Result<Option<usize>> {
        let mut found: Option<usize> = None;
        for (i, col) in self.0.iter().enumerate() {
            if !col.name.eq_ignore_ascii_case(name) {
                continue;
            }
            if let Some(t) = table {
                if !col.source.eq_ignore_ascii_case(t) {
                    continue;
                }
            }
            match found {
                None => found = Some(i),
                Some(prev) => {
                    // Same source tag twice means a self-join projection
                    // collision; different tags mean an unqualified tie.
                    if self.0[prev].source.eq_ignore_ascii_case(&col.source) && table.is_some() {
                        continue;
                    }
                    return Err(Error::AmbiguousColumn(name.to_string()));
                }
            }
        }
        Ok(found)
    }

    /// Concatenation, as produced by joins.
    pub fn join(&self, other: &Schema) -> Schema {
        let mut cols = self.0.clone();
        cols.extend(other.0.iter().cloned());
        Schema(cols)
    }

    /// Re-tags every column with a new source name, as a subquery alias does.
    pub fn with_source(&self, source: &str) -> Schema {
        Schema(
            self.0
                .iter()
                .map(|c| {
                    let mut c = c.clone();
                    c.source = source.to_string();
                    c
                })
                .collect(),
        )
    }

    /// Marks every column nullable, for the padded side of an outer join.
    pub fn nullable(&self) -> Schema {
        Schema(
            self.0
                .iter()
                .map(|c| {
                    let mut c = c.clone();
                    c.nullable = true;
                    c
                })
                .collect(),
        )
    }

    pub fn column_names(&self) -> Vec<String> {
        self.0.iter().map(|c| c.name.clone()).collect()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if c.source.is_empty() {
                write!(f, "{} {}", c.name, c.data_type)?;
            } else {
                write!(f, "{}.{} {}", c.source, c.name, c.data_type)?;
            }
        }
        write!(f, ")")
    }
}

/// One column of an index, with an optional prefix length for text and
/// binary columns.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexColumn {
    pub name: String,
    pub prefix: Option<u16>,
}

/// A secondary or unique index declared on a table.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDef {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<IndexColumn>,
}

impl IndexDef {
    /// The key this index extracts from a full table row, applying prefix
    /// truncation per column.
    pub fn key_for_row(&self, schema: &Schema, row: &Row) -> Result<Vec<Value>> {
        let mut key = Vec::with_capacity(self.columns.len());
        for ic in &self.columns {
            let idx = schema
                .resolve(None, &ic.name)?
                .ok_or_else(|| Error::ColumnNotFound(ic.name.clone()))?;
            key.push(apply_prefix(&row[idx], ic.prefix));
        }
        Ok(key)
    }
}

/// Truncates a text or binary value to an index prefix length.
pub fn apply_prefix(v: &Value, prefix: Option<u16>) -> Value {
    match (v, prefix) {
        (Value::Str(s), Some(p)) => Value::Str(s.chars().take(p as usize).collect()),
        (Value::Bytes(b), Some(p)) => Value::Bytes(b.iter().take(p as usize).copied().collect()),
        (other, _) => other.clone(),
    }
}

/// A foreign key constraint declared on a child table.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyDef {
    pub name: String,
    pub columns: Vec<String>,
    pub parent_table: String,
    pub parent_columns: Vec<String>,
}

/// A complete table definition as held by the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDef {
    pub name: String,
    pub schema: Schema,
    pub primary_key: Vec<usize>,
    pub indexes: Vec<IndexDef>,
    pub foreign_keys: Vec<ForeignKeyDef>,
    pub comment: String,
}

impl TableDef {
    pub fn new(name: impl Into<String>, schema: Schema) -> TableDef {
        let name = name.into();
        let schema = schema.with_source(&name);
        TableDef {
            name,
            schema,
            primary_key: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            comment: String::new(),
        }
    }

    pub fn with_primary_key(mut self, columns: &[&str]) -> TableDef {
        self.primary_key = columns
            .iter()
            .filter_map(|n| self.schema.resolve(None, n).ok().flatten())
            .collect();
        for &i in &self.primary_key {
            self.schema.0[i].nullable = false;
        }
        self
    }

    pub fn with_index(mut self, index: IndexDef) -> TableDef {
        self.indexes.push(index);
        self
    }

    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name.eq_ignore_ascii_case(name))
    }

    /// Validates prefix lengths: only text/binary columns can carry one, and
    /// it must be non-zero and within the declared column length.
    pub fn validate_indexes(&self) -> Result<()> {
        for index in &self.indexes {
            for ic in &index.columns {
                let idx = self
                    .schema
                    .resolve(None, &ic.name)?
                    .ok_or_else(|| Error::ColumnNotFound(ic.name.clone()))?;
                let dt = &self.schema.0[idx].data_type;
                if let Some(p) = ic.prefix {
                    let max = match dt {
                        DataType::Char { length, .. } | DataType::Varchar { length, .. } => *length,
                        DataType::Binary { length } | DataType::Varbinary { length } => *length,
                        DataType::Text { .. } | DataType::Blob => u16::MAX,
                        _ => {
                            return Err(Error::InvalidIndexPrefix { column: ic.name.clone(), length: p });
                        }
                    };
                    if p == 0 || p > max {
                        return Err(Error::InvalidIndexPrefix { column: ic.name.clone(), length: p });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_table_schema() -> Schema {
        Schema(vec![
            Column::new("id", DataType::bigint()).with_source("a"),
            Column::new("name", DataType::text()).with_source("a"),
            Column::new("id", DataType::bigint()).with_source("b"),
        ])
    }

    #[test]
    fn qualified_resolution() {
        let s = two_table_schema();
        assert_eq!(s.resolve(Some("b"), "id").unwrap(), Some(2));
        assert_eq!(s.resolve(Some("a"), "id").unwrap(), Some(0));
        assert_eq!(s.resolve(None, "name").unwrap(), Some(1));
    }

    #[test]
    fn unqualified_tie_is_ambiguous() {
        let s = two_table_schema();
        assert_eq!(s.resolve(None, "id").unwrap_err(), Error::AmbiguousColumn("id".into()));
    }

    #[test]
    fn resolution_is_case_insensitive() {
        let s = two_table_schema();
        assert_eq!(s.resolve(Some("A"), "ID").unwrap(), Some(0));
    }

    #[test]
    fn index_prefix_validation() {
        let def = TableDef::new(
            "t",
            Schema(vec![Column::new("v", DataType::varchar(10)), Column::new("n", DataType::bigint())]),
        )
        .with_index(IndexDef {
            name: "v_idx".into(),
            unique: true,
            columns: vec![IndexColumn { name: "v".into(), prefix: Some(3) }],
        });
        assert!(def.validate_indexes().is_ok());

        let bad = TableDef::new("t", Schema(vec![Column::new("n", DataType::bigint())])).with_index(IndexDef {
            name: "n_idx".into(),
            unique: false,
            columns: vec![IndexColumn { name: "n".into(), prefix: Some(3) }],
        });
        assert!(matches!(bad.validate_indexes(), Err(Error::InvalidIndexPrefix { .. })));
    }

    #[test]
    fn prefix_truncation() {
        assert_eq!(apply_prefix(&Value::Str("abcdef".into()), Some(3)), Value::Str("abc".into()));
        assert_eq!(apply_prefix(&Value::I64(5), Some(3)), Value::I64(5));
    }
}
