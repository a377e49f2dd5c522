//! The synthesized `information_schema` database.
//!
//! Every table is materialized as a point-in-time snapshot over the host
//! provider when it is opened; SHOW statements plan into ordinary queries
//! against these tables.

use crate::catalog::{Database, DatabaseProvider, StatisticsRegistry};
use crate::error::{Error, Result};
use crate::storage::{MemoryTable, Table};
use crate::types::data_type::DataType;
use crate::types::schema::{Column, Schema, TableDef};
use crate::types::value::{Row, Value};
use std::sync::Arc;

pub const INFORMATION_SCHEMA: &str = "information_schema";

const DEF_CATALOG: &str = "def";

/// Catalog tables that exist but always report no rows.
const EMPTY_TABLES: &[&str] = &[
    "partitions",
    "files",
    "plugins",
    "routines",
    "triggers",
    "innodb_tables",
    "innodb_columns",
];

pub fn information_schema_db(
    provider: Arc<dyn DatabaseProvider>,
    statistics: Arc<StatisticsRegistry>,
) -> Arc<dyn Database> {
    Arc::new(InfoSchemaDb { provider, statistics })
}

struct InfoSchemaDb {
    provider: Arc<dyn DatabaseProvider>,
    statistics: Arc<StatisticsRegistry>,
}

fn str_col(name: &str) -> Column {
    Column::new(name, DataType::varchar(255))
}

fn int_col(name: &str) -> Column {
    Column::new(name, DataType::bigint())
}

fn build(name: &str, columns: Vec<Column>, rows: Vec<Row>) -> Arc<dyn Table> {
    let def = TableDef::new(name, Schema::new(columns));
    MemoryTable::with_rows(def, rows) as Arc<dyn Table>
}

fn s(v: impl Into<String>) -> Value {
    Value::Str(v.into())
}

impl InfoSchemaDb {
    fn schemata(&self) -> Arc<dyn Table> {
        let mut rows = Vec::new();
        let mut names = self.provider.databases();
        names.push(INFORMATION_SCHEMA.to_string());
        names.sort();
        for db in names {
            rows.push(vec![s(DEF_CATALOG), s(db), s("utf8mb4"), s("utf8mb4_0900_bin"), Value::Null]);
        }
        build(
            "schemata",
            vec![
                str_col("catalog_name"),
                str_col("schema_name"),
                str_col("default_character_set_name"),
                str_col("default_collation_name"),
                str_col("sql_path"),
            ],
            rows,
        )
    }

    fn tables(&self) -> Arc<dyn Table> {
        let mut rows = Vec::new();
        for db_name in self.provider.databases() {
            let Some(db) = self.provider.database(&db_name) else { continue };
            for table_name in db.tables() {
                let row_count = db
                    .table(&table_name)
                    .and_then(|t| t.row_count_hint())
                    .map(|n| Value::U64(n))
                    .unwrap_or(Value::Null);
                let comment = db
                    .table(&table_name)
                    .map(|t| t.def().comment.clone())
                    .unwrap_or_default();
                rows.push(vec![
                    s(DEF_CATALOG),
                    s(&db_name),
                    s(&table_name),
                    s("BASE TABLE"),
                    s("rowmill"),
                    row_count,
                    s(comment),
                ]);
            }
            for (view_name, _) in db.views() {
                rows.push(vec![
                    s(DEF_CATALOG),
                    s(&db_name),
                    s(view_name),
                    s("VIEW"),
                    Value::Null,
                    Value::Null,
                    s(""),
                ]);
            }
        }
        build(
            "tables",
            vec![
                str_col("table_catalog"),
                str_col("table_schema"),
                str_col("table_name"),
                str_col("table_type"),
                str_col("engine"),
                int_col("table_rows"),
                str_col("table_comment"),
            ],
            rows,
        )
    }

    fn columns(&self) -> Arc<dyn Table> {
        let mut rows = Vec::new();
        for db_name in self.provider.databases() {
            let Some(db) = self.provider.database(&db_name) else { continue };
            for table_name in db.tables() {
                let Some(table) = db.table(&table_name) else { continue };
                let def = table.def();
                for (i, col) in def.schema.iter().enumerate() {
                    let key = if def.primary_key.contains(&i) {
                        "PRI"
                    } else if def.indexes.iter().any(|ix| {
                        ix.unique && ix.columns.len() == 1 && ix.columns[0].name.eq_ignore_ascii_case(&col.name)
                    }) {
                        "UNI"
                    } else if def
                        .indexes
                        .iter()
                        .any(|ix| ix.columns.first().is_some_and(|c| c.name.eq_ignore_ascii_case(&col.name)))
                    {
                        "MUL"
                    } else {
                        ""
                    };
                    let extra = if col.auto_increment {
                        "auto_increment"
                    } else if col.generated.is_some() {
                        "STORED GENERATED"
                    } else {
                        ""
                    };
                    rows.push(vec![
                        s(DEF_CATALOG),
                        s(&db_name),
                        s(&table_name),
                        s(&col.name),
                        Value::U64(i as u64 + 1),
                        col.default.as_ref().map(|d| s(d.to_string())).unwrap_or(Value::Null),
                        s(if col.nullable { "YES" } else { "NO" }),
                        s(col.data_type.to_string()),
                        s(key),
                        s(extra),
                        s(&col.comment),
                    ]);
                }
            }
        }
        build(
            "columns",
            vec![
                str_col("table_catalog"),
                str_col("table_schema"),
                str_col("table_name"),
                str_col("column_name"),
                int_col("ordinal_position"),
                str_col("column_default"),
                str_col("is_nullable"),
                str_col("column_type"),
                str_col("column_key"),
                str_col("extra"),
                str_col("column_comment"),
            ],
            rows,
        )
    }

    fn table_constraints(&self) -> Arc<dyn Table> {
        let mut rows = Vec::new();
        for db_name in self.provider.databases() {
            let Some(db) = self.provider.database(&db_name) else { continue };
            for table_name in db.tables() {
                let Some(table) = db.table(&table_name) else { continue };
                let def = table.def();
                if !def.primary_key.is_empty() {
                    rows.push(vec![s(DEF_CATALOG), s(&db_name), s("PRIMARY"), s(&db_name), s(&table_name), s("PRIMARY KEY")]);
                }
                for index in def.indexes.iter().filter(|i| i.unique) {
                    rows.push(vec![s(DEF_CATALOG), s(&db_name), s(&index.name), s(&db_name), s(&table_name), s("UNIQUE")]);
                }
                for fk in &def.foreign_keys {
                    rows.push(vec![s(DEF_CATALOG), s(&db_name), s(&fk.name), s(&db_name), s(&table_name), s("FOREIGN KEY")]);
                }
            }
        }
        build(
            "table_constraints",
            vec![
                str_col("constraint_catalog"),
                str_col("constraint_schema"),
                str_col("constraint_name"),
                str_col("table_schema"),
                str_col("table_name"),
                str_col("constraint_type"),
            ],
            rows,
        )
    }

    fn key_column_usage(&self) -> Arc<dyn Table> {
        let mut rows = Vec::new();
        for db_name in self.provider.databases() {
            let Some(db) = self.provider.database(&db_name) else { continue };
            for table_name in db.tables() {
                let Some(table) = db.table(&table_name) else { continue };
                let def = table.def();
                for (seq, &col_idx) in def.primary_key.iter().enumerate() {
                    let col = &def.schema.0[col_idx];
                    rows.push(vec![
                        s("PRIMARY"),
                        s(&db_name),
                        s(&table_name),
                        s(&col.name),
                        Value::U64(seq as u64 + 1),
                        Value::Null,
                        Value::Null,
                    ]);
                }
                for fk in &def.foreign_keys {
                    for (seq, col) in fk.columns.iter().enumerate() {
                        rows.push(vec![
                            s(&fk.name),
                            s(&db_name),
                            s(&table_name),
                            s(col),
                            Value::U64(seq as u64 + 1),
                            s(&fk.parent_table),
                            fk.parent_columns.get(seq).map(s).unwrap_or(Value::Null),
                        ]);
                    }
                }
            }
        }
        build(
            "key_column_usage",
            vec![
                str_col("constraint_name"),
                str_col("table_schema"),
                str_col("table_name"),
                str_col("column_name"),
                int_col("ordinal_position"),
                str_col("referenced_table_name"),
                str_col("referenced_column_name"),
            ],
            rows,
        )
    }

    fn statistics(&self) -> Arc<dyn Table> {
        let mut rows = Vec::new();
        for db_name in self.provider.databases() {
            let Some(db) = self.provider.database(&db_name) else { continue };
            for table_name in db.tables() {
                let Some(table) = db.table(&table_name) else { continue };
                let cardinality = self
                    .statistics
                    .get(&db_name, &table_name)
                    .map(|st| Value::U64(st.row_count))
                    .unwrap_or(Value::Null);
                for index in &table.def().indexes {
                    for (seq, ic) in index.columns.iter().enumerate() {
                        rows.push(vec![
                            s(&db_name),
                            s(&table_name),
                            Value::I64(if index.unique { 0 } else { 1 }),
                            s(&index.name),
                            Value::U64(seq as u64 + 1),
                            s(&ic.name),
                            ic.prefix.map(|p| Value::U64(p as u64)).unwrap_or(Value::Null),
                            cardinality.clone(),
                        ]);
                    }
                }
            }
        }
        build(
            "statistics",
            vec![
                str_col("table_schema"),
                str_col("table_name"),
                int_col("non_unique"),
                str_col("index_name"),
                int_col("seq_in_index"),
                str_col("column_name"),
                int_col("sub_part"),
                int_col("cardinality"),
            ],
            rows,
        )
    }

    fn views_table(&self) -> Arc<dyn Table> {
        let mut rows = Vec::new();
        for db_name in self.provider.databases() {
            let Some(db) = self.provider.database(&db_name) else { continue };
            for (name, definition) in db.views() {
                rows.push(vec![s(DEF_CATALOG), s(&db_name), s(name), s(definition)]);
            }
        }
        build(
            "views",
            vec![str_col("table_catalog"), str_col("table_schema"), str_col("table_name"), str_col("view_definition")],
            rows,
        )
    }

    fn column_statistics(&self) -> Arc<dyn Table> {
        let mut rows = Vec::new();
        for db_name in self.provider.databases() {
            let Some(db) = self.provider.database(&db_name) else { continue };
            for table_name in db.tables() {
                if let Some(stats) = self.statistics.get(&db_name, &table_name) {
                    for (column, distinct) in &stats.column_cardinality {
                        let histogram = serde_json::json!({
                            "buckets": [],
                            "data-type": "json",
                            "distinct-count": distinct,
                            "null-count": 0,
                        });
                        rows.push(vec![s(&db_name), s(&table_name), s(column), Value::Json(histogram)]);
                    }
                }
            }
        }
        build(
            "column_statistics",
            vec![
                str_col("schema_name"),
                str_col("table_name"),
                str_col("column_name"),
                Column::new("histogram", DataType::Json),
            ],
            rows,
        )
    }

    fn collations(&self) -> Arc<dyn Table> {
        let rows = vec![
            vec![s("utf8mb4_0900_bin"), s("utf8mb4"), Value::I64(309), s(""), s("Yes"), Value::I64(1)],
            vec![s("utf8mb4_0900_ai_ci"), s("utf8mb4"), Value::I64(255), s("Yes"), s("Yes"), Value::I64(0)],
        ];
        build(
            "collations",
            vec![
                str_col("collation_name"),
                str_col("character_set_name"),
                int_col("id"),
                str_col("is_default"),
                str_col("is_compiled"),
                int_col("sortlen"),
            ],
            rows,
        )
    }

    fn character_sets(&self) -> Arc<dyn Table> {
        let rows = vec![vec![s("utf8mb4"), s("utf8mb4_0900_ai_ci"), s("UTF-8 Unicode"), Value::I64(4)]];
        build(
            "character_sets",
            vec![
                str_col("character_set_name"),
                str_col("default_collate_name"),
                str_col("description"),
                int_col("maxlen"),
            ],
            rows,
        )
    }

    fn empty_table(&self, name: &str) -> Arc<dyn Table> {
        build(
            name,
            vec![str_col("table_schema"), str_col("table_name"), str_col("name"), str_col("value")],
            Vec::new(),
        )
    }
}

impl Database for InfoSchemaDb {
    fn name(&self) -> &str {
        INFORMATION_SCHEMA
    }

    fn tables(&self) -> Vec<String> {
        let mut names: Vec<String> = [
            "schemata",
            "tables",
            "columns",
            "table_constraints",
            "key_column_usage",
            "statistics",
            "views",
            "column_statistics",
            "collations",
            "character_sets",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        names.extend(EMPTY_TABLES.iter().map(|s| s.to_string()));
        names.sort();
        names
    }

    fn table(&self, name: &str) -> Option<Arc<dyn Table>> {
        let lower = name.to_lowercase();
        match lower.as_str() {
            "schemata" => Some(self.schemata()),
            "tables" => Some(self.tables()),
            "columns" => Some(self.columns()),
            "table_constraints" => Some(self.table_constraints()),
            "key_column_usage" => Some(self.key_column_usage()),
            "statistics" => Some(self.statistics()),
            "views" => Some(self.views_table()),
            "column_statistics" => Some(self.column_statistics()),
            "collations" => Some(self.collations()),
            "character_sets" => Some(self.character_sets()),
            other if EMPTY_TABLES.contains(&other) => Some(self.empty_table(other)),
            _ => None,
        }
    }

    fn create_table(&self, def: TableDef) -> Result<()> {
        Err(Error::Storage(format!("information_schema is read-only, cannot create {}", def.name)))
    }

    fn drop_table(&self, name: &str) -> Result<()> {
        Err(Error::Storage(format!("information_schema is read-only, cannot drop {}", name)))
    }
}
