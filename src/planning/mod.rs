//! Statement planning: lowering the parser's AST into the unresolved plan
//! the analyzer works on. SHOW statements lower into queries over the
//! synthesized information_schema; session-dependent SHOW output (warnings,
//! variables) materializes as a values list at planning time.

mod expr;
mod select;

pub(crate) use expr::{object_name_string, split_object_name};
pub(crate) use select::single_row;

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::plan::{
    DeletePlan, InsertPlan, Node, Plan, SetAssignment, SetScope, TransactionOp, UpdatePlan,
};
use crate::session::Session;
use crate::types::data_type::{Collation, DataType, SpatialClass};
use crate::types::expression::Expression;
use crate::types::schema::{Column, ForeignKeyDef, IndexColumn, IndexDef, Schema, TableDef};
use crate::types::value::Value;
use sqlparser::ast as sql;
use std::collections::{HashMap, HashSet};

#[derive(Clone)]
pub(crate) enum CteBinding {
    Planned { columns: Vec<String>, node: Node },
    Recursive(Node),
    /// The name of the CTE currently being planned; references to it become
    /// recursive table refs.
    RecursiveMarker,
}

pub struct Planner<'a> {
    pub session: &'a Session,
    pub catalog: &'a Catalog,
    pub(crate) cte_scopes: Vec<HashMap<String, CteBinding>>,
    pub(crate) used_recursive: HashSet<String>,
    pub(crate) next_parameter: usize,
}

impl<'a> Planner<'a> {
    pub fn new(session: &'a Session, catalog: &'a Catalog) -> Planner<'a> {
        Planner {
            session,
            catalog,
            cte_scopes: Vec::new(),
            used_recursive: HashSet::new(),
            next_parameter: 0,
        }
    }

    /// The number of `?` placeholders the planned statement used.
    pub fn parameter_count(&self) -> usize {
        self.next_parameter
    }

    pub fn plan_statement(&mut self, stmt: &sql::Statement) -> Result<Plan> {
        match stmt {
            sql::Statement::Query(query) => Ok(Plan::Select(self.plan_query(query)?)),

            sql::Statement::Insert(insert) => self.plan_insert(insert),
            sql::Statement::Update { table, assignments, selection, .. } => {
                self.plan_update(table, assignments, selection.as_ref())
            }
            sql::Statement::Delete(delete) => self.plan_delete(delete),

            sql::Statement::CreateTable(create) => self.plan_create_table(create),
            sql::Statement::Drop { object_type, if_exists, names, .. } => match object_type {
                sql::ObjectType::Table => Ok(Plan::DropTable {
                    database: None,
                    names: names.iter().map(|n| split_object_name(n).1).collect(),
                    if_exists: *if_exists,
                }),
                sql::ObjectType::View => {
                    let name = names
                        .first()
                        .map(|n| split_object_name(n).1)
                        .ok_or_else(|| Error::SyntaxError("DROP VIEW without a name".into()))?;
                    Ok(Plan::DropView { database: None, name, if_exists: *if_exists })
                }
                other => Err(Error::UnsupportedFeature(format!("DROP {:?}", other))),
            },
            sql::Statement::CreateIndex(create) => self.plan_create_index(create),
            sql::Statement::CreateView { name, query, .. } => {
                let (database, view_name) = split_object_name(name);
                Ok(Plan::CreateView { database, name: view_name, definition: query.to_string() })
            }

            sql::Statement::ShowTables { full, db_name, filter, .. } => {
                self.plan_show_tables(*full, db_name.as_ref(), filter.as_ref())
            }
            sql::Statement::ShowColumns { table_name, filter, .. } => {
                self.plan_show_columns(table_name, filter.as_ref())
            }
            sql::Statement::ShowCreate { obj_type, obj_name } => self.plan_show_create(obj_type, obj_name),
            sql::Statement::ShowVariables { filter, global, .. } => {
                self.plan_show_variables(*global, filter.as_ref())
            }
            sql::Statement::ShowCollation { filter } => self.plan_show_collation(filter.as_ref()),
            sql::Statement::ShowVariable { variable } => self.plan_show_keyword(variable),

            sql::Statement::SetVariable { variables, value, .. } => self.plan_set(variables, value),
            sql::Statement::Use(u) => {
                let name = match u {
                    sql::Use::Object(name) | sql::Use::Database(name) | sql::Use::Schema(name) => {
                        object_name_string(name)
                    }
                    other => return Err(Error::UnsupportedFeature(format!("USE {:?}", other))),
                };
                Ok(Plan::Use(name))
            }

            sql::Statement::StartTransaction { .. } => Ok(Plan::Transaction(TransactionOp::Begin)),
            sql::Statement::Commit { .. } => Ok(Plan::Transaction(TransactionOp::Commit)),
            sql::Statement::Rollback { .. } => Ok(Plan::Transaction(TransactionOp::Rollback)),

            sql::Statement::Explain { statement, .. } => {
                Ok(Plan::Explain(Box::new(self.plan_statement(statement)?)))
            }
            sql::Statement::ExplainTable { table_name, .. } => self.plan_show_columns(table_name, None),
            sql::Statement::Analyze { table_name, .. } => {
                let (database, table) = split_object_name(table_name);
                Ok(Plan::AnalyzeTable { database, tables: vec![table] })
            }

            other => {
                // SHOW shapes with dedicated AST variants funnel through
                // the keyword path via their rendered form.
                let text = other.to_string();
                if text.to_uppercase().starts_with("SHOW ") {
                    let keywords: Vec<sql::Ident> =
                        text[5..].split_whitespace().map(sql::Ident::new).collect();
                    return self.plan_show_keyword(&keywords);
                }
                Err(Error::UnsupportedFeature(format!("statement {}", text)))
            }
        }
    }

    // DML

    fn plan_insert(&mut self, insert: &sql::Insert) -> Result<Plan> {
        let (database, table) = split_object_name(&insert.table_name);
        let source = match &insert.source {
            Some(query) => self.plan_query(query)?,
            None => single_row(),
        };
        let columns: Vec<String> = insert.columns.iter().map(|c| c.value.clone()).collect();
        let on_duplicate = match &insert.on {
            Some(sql::OnInsert::DuplicateKeyUpdate(assignments)) => {
                self.lower_assignments(assignments)?
            }
            Some(other) => {
                return Err(Error::UnsupportedFeature(format!("INSERT ... {:?}", other)));
            }
            None => Vec::new(),
        };
        Ok(Plan::Insert(Box::new(InsertPlan {
            database,
            table,
            columns,
            source,
            on_duplicate,
            replace: insert.replace_into,
            ignore: insert.ignore,
            destination: None,
            post_defaults: Vec::new(),
            generated: Vec::new(),
            resolved_on_duplicate: Vec::new(),
        })))
    }

    fn lower_assignments(&mut self, assignments: &[sql::Assignment]) -> Result<Vec<(String, Expression)>> {
        let mut out = Vec::with_capacity(assignments.len());
        for a in assignments {
            let name = match &a.target {
                sql::AssignmentTarget::ColumnName(name) => split_object_name(name).1,
                sql::AssignmentTarget::Tuple(_) => {
                    return Err(Error::UnsupportedFeature("tuple assignment targets".into()));
                }
            };
            out.push((name, self.lower_expr(&a.value)?));
        }
        Ok(out)
    }

    fn plan_update(
        &mut self,
        table: &sql::TableWithJoins,
        assignments: &[sql::Assignment],
        selection: Option<&sql::Expr>,
    ) -> Result<Plan> {
        let sql::TableFactor::Table { name, alias, .. } = &table.relation else {
            return Err(Error::UnsupportedFeature("UPDATE over a non-table target".into()));
        };
        if !table.joins.is_empty() {
            return Err(Error::UnsupportedFeature("multi-table UPDATE".into()));
        }
        let (database, table_name) = split_object_name(name);
        let mut source: Node = Node::UnresolvedTable {
            database: database.clone(),
            name: table_name.clone(),
            alias: alias.as_ref().map(|a| a.name.value.clone()),
        };
        if let Some(filter) = selection {
            source = source.filter(self.lower_expr(filter)?);
        }
        Ok(Plan::Update(Box::new(UpdatePlan {
            database,
            table: table_name,
            assignments: self.lower_assignments(assignments)?,
            source,
            destination: None,
            resolved_assignments: Vec::new(),
            generated: Vec::new(),
        })))
    }

    fn plan_delete(&mut self, delete: &sql::Delete) -> Result<Plan> {
        let tables = match &delete.from {
            sql::FromTable::WithFromKeyword(t) | sql::FromTable::WithoutKeyword(t) => t,
        };
        let [table] = tables.as_slice() else {
            return Err(Error::UnsupportedFeature("multi-table DELETE".into()));
        };
        let sql::TableFactor::Table { name, alias, .. } = &table.relation else {
            return Err(Error::UnsupportedFeature("DELETE from a non-table target".into()));
        };
        let (database, table_name) = split_object_name(name);
        let mut source: Node = Node::UnresolvedTable {
            database: database.clone(),
            name: table_name.clone(),
            alias: alias.as_ref().map(|a| a.name.value.clone()),
        };
        if let Some(filter) = &delete.selection {
            source = source.filter(self.lower_expr(filter)?);
        }
        Ok(Plan::Delete(Box::new(DeletePlan {
            database,
            table: table_name,
            source,
            destination: None,
        })))
    }

    // DDL

    fn plan_create_table(&mut self, create: &sql::CreateTable) -> Result<Plan> {
        let (database, name) = split_object_name(&create.name);
        let mut columns = Vec::with_capacity(create.columns.len());
        let mut primary_key: Vec<String> = Vec::new();
        let mut indexes: Vec<IndexDef> = Vec::new();
        let mut foreign_keys: Vec<ForeignKeyDef> = Vec::new();

        for col_def in &create.columns {
            let mut column = Column::new(col_def.name.value.clone(), self.lower_data_type(&col_def.data_type)?);
            for option in &col_def.options {
                match &option.option {
                    sql::ColumnOption::Null => column.nullable = true,
                    sql::ColumnOption::NotNull => column.nullable = false,
                    sql::ColumnOption::Default(e) => column.default = Some(self.lower_expr(e)?),
                    sql::ColumnOption::Comment(c) => column.comment = c.clone(),
                    sql::ColumnOption::Unique { is_primary, .. } => {
                        if *is_primary {
                            primary_key.push(column.name.clone());
                            column.nullable = false;
                        } else {
                            indexes.push(IndexDef {
                                name: format!("{}_unique", column.name),
                                unique: true,
                                columns: vec![IndexColumn { name: column.name.clone(), prefix: None }],
                            });
                        }
                    }
                    sql::ColumnOption::ForeignKey { foreign_table, referred_columns, .. } => {
                        foreign_keys.push(ForeignKeyDef {
                            name: format!("fk_{}_{}", name, column.name),
                            columns: vec![column.name.clone()],
                            parent_table: split_object_name(foreign_table).1,
                            parent_columns: referred_columns.iter().map(|c| c.value.clone()).collect(),
                        });
                    }
                    sql::ColumnOption::Generated { generation_expr, .. } => {
                        column.generated = generation_expr
                            .as_ref()
                            .map(|e| self.lower_expr(e))
                            .transpose()?;
                    }
                    sql::ColumnOption::DialectSpecific(tokens) => {
                        let auto = tokens.iter().any(|t| {
                            t.to_string().eq_ignore_ascii_case("auto_increment")
                        });
                        if auto {
                            column.auto_increment = true;
                            column.nullable = false;
                        }
                    }
                    _ => {}
                }
            }
            columns.push(column);
        }

        for constraint in &create.constraints {
            match constraint {
                sql::TableConstraint::PrimaryKey { columns: cols, .. } => {
                    primary_key.extend(cols.iter().map(|c| c.value.clone()));
                }
                sql::TableConstraint::Unique { name: cname, columns: cols, .. } => {
                    indexes.push(IndexDef {
                        name: cname
                            .as_ref()
                            .map(|n| n.value.clone())
                            .unwrap_or_else(|| format!("unique_{}", indexes.len())),
                        unique: true,
                        columns: cols.iter().map(|c| IndexColumn { name: c.value.clone(), prefix: None }).collect(),
                    });
                }
                sql::TableConstraint::Index { name: cname, columns: cols, .. } => {
                    indexes.push(IndexDef {
                        name: cname
                            .as_ref()
                            .map(|n| n.value.clone())
                            .unwrap_or_else(|| format!("index_{}", indexes.len())),
                        unique: false,
                        columns: cols.iter().map(|c| IndexColumn { name: c.value.clone(), prefix: None }).collect(),
                    });
                }
                sql::TableConstraint::ForeignKey {
                    name: cname, columns: cols, foreign_table, referred_columns, ..
                } => {
                    foreign_keys.push(ForeignKeyDef {
                        name: cname
                            .as_ref()
                            .map(|n| n.value.clone())
                            .unwrap_or_else(|| format!("fk_{}_{}", name, foreign_keys.len())),
                        columns: cols.iter().map(|c| c.value.clone()).collect(),
                        parent_table: split_object_name(foreign_table).1,
                        parent_columns: referred_columns.iter().map(|c| c.value.clone()).collect(),
                    });
                }
                other => {
                    return Err(Error::UnsupportedFeature(format!("table constraint {}", other)));
                }
            }
        }

        let pk_refs: Vec<&str> = primary_key.iter().map(|s| s.as_str()).collect();
        let mut def = TableDef::new(name, Schema::new(columns)).with_primary_key(&pk_refs);
        def.indexes = indexes;
        def.foreign_keys = foreign_keys;
        def.validate_indexes()?;
        Ok(Plan::CreateTable { database, def, if_not_exists: create.if_not_exists })
    }

    fn plan_create_index(&mut self, create: &sql::CreateIndex) -> Result<Plan> {
        let (database, table) = split_object_name(&create.table_name);
        let name = create
            .name
            .as_ref()
            .map(|n| split_object_name(n).1)
            .ok_or_else(|| Error::SyntaxError("CREATE INDEX needs a name".into()))?;
        let mut columns = Vec::with_capacity(create.columns.len());
        for c in &create.columns {
            match &c.expr {
                sql::Expr::Identifier(ident) => {
                    columns.push(IndexColumn { name: ident.value.clone(), prefix: None })
                }
                sql::Expr::Function(f) => {
                    // MySQL's prefix syntax `col(10)` parses as a call.
                    let col = object_name_string(&f.name);
                    let prefix = match self.lower_function_prefix(f)? {
                        Some(p) => Some(p),
                        None => {
                            return Err(Error::UnsupportedFeature(format!("index expression {}", c.expr)));
                        }
                    };
                    columns.push(IndexColumn { name: col, prefix });
                }
                other => {
                    return Err(Error::UnsupportedFeature(format!("index expression {}", other)));
                }
            }
        }
        Ok(Plan::CreateIndex {
            database,
            table,
            index: IndexDef { name, unique: create.unique, columns },
        })
    }

    fn lower_function_prefix(&mut self, f: &sql::Function) -> Result<Option<u16>> {
        if let sql::FunctionArguments::List(list) = &f.args {
            if let [sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Expr(sql::Expr::Value(
                sql::Value::Number(n, _),
            )))] = list.args.as_slice()
            {
                return Ok(n.parse::<u16>().ok());
            }
        }
        Ok(None)
    }

    // SHOW surface

    fn info_schema_table(&self, table: &str) -> Node {
        Node::UnresolvedTable {
            database: Some("information_schema".into()),
            name: table.into(),
            alias: None,
        }
    }

    fn apply_show_filter(
        &mut self,
        node: Node,
        column: &str,
        filter: Option<&sql::ShowStatementFilter>,
    ) -> Result<Node> {
        match filter {
            None => Ok(node),
            Some(sql::ShowStatementFilter::Like(pattern)) => Ok(node.filter(Expression::Like {
                expr: Box::new(Expression::column(column)),
                pattern: Box::new(Expression::literal(Value::Str(pattern.clone()))),
                escape: None,
                negated: false,
            })),
            Some(sql::ShowStatementFilter::Where(e)) => {
                let predicate = self.lower_expr(e)?;
                Ok(node.filter(predicate))
            }
            Some(other) => Err(Error::UnsupportedFeature(format!("SHOW filter {}", other))),
        }
    }

    fn plan_show_tables(
        &mut self,
        full: bool,
        db_name: Option<&sql::Ident>,
        filter: Option<&sql::ShowStatementFilter>,
    ) -> Result<Plan> {
        let db = db_name
            .map(|d| d.value.clone())
            .unwrap_or_else(|| self.session.current_database());
        let node = self.info_schema_table("tables").filter(Expression::Compare {
            op: crate::types::expression::CmpOp::Eq,
            left: Box::new(Expression::column("table_schema")),
            right: Box::new(Expression::literal(Value::Str(db.clone()))),
        });
        let label = format!("Tables_in_{}", db);
        let (exprs, aliases) = if full {
            (
                vec![Expression::column("table_name"), Expression::column("table_type")],
                vec![Some(label), Some("Table_type".to_string())],
            )
        } else {
            (vec![Expression::column("table_name")], vec![Some(label)])
        };
        let node = self.apply_show_filter(node, "table_name", filter)?;
        let node = Node::Sort {
            child: Box::new(node.project(exprs, aliases)),
            order_by: vec![crate::types::expression::SortField {
                expr: Expression::literal(Value::I64(1)),
                ascending: true,
            }],
        };
        Ok(Plan::Select(node))
    }

    fn plan_show_columns(
        &mut self,
        table_name: &sql::ObjectName,
        filter: Option<&sql::ShowStatementFilter>,
    ) -> Result<Plan> {
        let (db, table) = split_object_name(table_name);
        let db = db.unwrap_or_else(|| self.session.current_database());
        let eq = |col: &str, val: String| Expression::Compare {
            op: crate::types::expression::CmpOp::Eq,
            left: Box::new(Expression::column(col)),
            right: Box::new(Expression::literal(Value::Str(val))),
        };
        let node = self
            .info_schema_table("columns")
            .filter(Expression::And(
                Box::new(eq("table_schema", db)),
                Box::new(eq("table_name", table)),
            ));
        let node = self.apply_show_filter(node, "column_name", filter)?;
        let node = node.project(
            vec![
                Expression::column("column_name"),
                Expression::column("column_type"),
                Expression::column("is_nullable"),
                Expression::column("column_key"),
                Expression::column("column_default"),
                Expression::column("extra"),
            ],
            ["Field", "Type", "Null", "Key", "Default", "Extra"]
                .iter()
                .map(|s| Some(s.to_string()))
                .collect(),
        );
        Ok(Plan::Select(node))
    }

    fn plan_show_create(&mut self, obj_type: &sql::ShowCreateObject, obj_name: &sql::ObjectName) -> Result<Plan> {
        let (db, name) = split_object_name(obj_name);
        let db = db.unwrap_or_else(|| self.session.current_database());
        match obj_type {
            sql::ShowCreateObject::Table => {
                let table = self.catalog.table(&db, &name)?;
                let ddl = render_create_table(table.def());
                Ok(Plan::Select(values_row(
                    vec![("Table", Value::Str(name)), ("Create Table", Value::Str(ddl))],
                )))
            }
            sql::ShowCreateObject::View => {
                let database = self.catalog.database(&db)?;
                let definition = database
                    .view(&name)
                    .ok_or_else(|| Error::ViewNotFound(name.clone()))?;
                let ddl = format!("CREATE VIEW `{}` AS {}", name, definition);
                Ok(Plan::Select(values_row(
                    vec![("View", Value::Str(name)), ("Create View", Value::Str(ddl))],
                )))
            }
            other => Err(Error::UnsupportedFeature(format!("SHOW CREATE {:?}", other))),
        }
    }

    fn plan_show_variables(&mut self, _global: bool, filter: Option<&sql::ShowStatementFilter>) -> Result<Plan> {
        let rows: Vec<Vec<Expression>> = self
            .session
            .all_variables()
            .into_iter()
            .map(|(name, value)| {
                vec![
                    Expression::literal(Value::Str(name)),
                    Expression::literal(Value::Str(value.to_string())),
                ]
            })
            .collect();
        let schema = Schema::new(vec![
            Column::new("Variable_name", DataType::varchar(64)),
            Column::new("Value", DataType::text()),
        ]);
        let node = Node::Values { rows, schema };
        let node = self.apply_show_filter(node, "Variable_name", filter)?;
        Ok(Plan::Select(node))
    }

    fn plan_show_collation(&mut self, filter: Option<&sql::ShowStatementFilter>) -> Result<Plan> {
        let node = self.info_schema_table("collations").project(
            vec![
                Expression::column("collation_name"),
                Expression::column("character_set_name"),
                Expression::column("id"),
                Expression::column("is_default"),
                Expression::column("is_compiled"),
                Expression::column("sortlen"),
            ],
            ["Collation", "Charset", "Id", "Default", "Compiled", "Sortlen"]
                .iter()
                .map(|s| Some(s.to_string()))
                .collect(),
        );
        let node = self.apply_show_filter(node, "Collation", filter)?;
        Ok(Plan::Select(node))
    }

    /// The generic `SHOW <keywords>` shapes the parser funnels into a
    /// keyword list: WARNINGS, DATABASES, ENGINES, TABLE STATUS, INDEX FROM.
    fn plan_show_keyword(&mut self, keywords: &[sql::Ident]) -> Result<Plan> {
        let words: Vec<String> = keywords.iter().map(|k| k.value.to_lowercase()).collect();
        match words.first().map(|s| s.as_str()) {
            Some("warnings") => {
                let rows: Vec<Vec<Expression>> = self
                    .session
                    .warnings()
                    .into_iter()
                    .map(|w| {
                        vec![
                            Expression::literal(Value::Str("Warning".into())),
                            Expression::literal(Value::U64(w.code as u64)),
                            Expression::literal(Value::Str(w.message)),
                        ]
                    })
                    .collect();
                let schema = Schema::new(vec![
                    Column::new("Level", DataType::varchar(7)),
                    Column::new("Code", DataType::Int { unsigned: true }),
                    Column::new("Message", DataType::text()),
                ]);
                Ok(Plan::Select(Node::Values { rows, schema }))
            }
            Some("databases") | Some("schemas") => {
                let node = self.info_schema_table("schemata").project(
                    vec![Expression::column("schema_name")],
                    vec![Some("Database".to_string())],
                );
                Ok(Plan::Select(node))
            }
            Some("engines") => Ok(Plan::Select(values_rows(
                vec![
                    ("Engine", DataType::varchar(64)),
                    ("Support", DataType::varchar(8)),
                    ("Comment", DataType::text()),
                ],
                vec![vec![
                    Value::Str("rowmill".into()),
                    Value::Str("DEFAULT".into()),
                    Value::Str("Embedded pluggable-storage engine".into()),
                ]],
            ))),
            Some("table") if words.get(1).map(|s| s.as_str()) == Some("status") => {
                let db = self.session.current_database();
                let node = self
                    .info_schema_table("tables")
                    .filter(Expression::Compare {
                        op: crate::types::expression::CmpOp::Eq,
                        left: Box::new(Expression::column("table_schema")),
                        right: Box::new(Expression::literal(Value::Str(db))),
                    })
                    .project(
                        vec![
                            Expression::column("table_name"),
                            Expression::column("engine"),
                            Expression::column("table_rows"),
                            Expression::column("table_comment"),
                        ],
                        ["Name", "Engine", "Rows", "Comment"].iter().map(|s| Some(s.to_string())).collect(),
                    );
                Ok(Plan::Select(node))
            }
            Some("index") | Some("indexes") | Some("keys") => {
                // SHOW INDEX FROM table
                let table = words
                    .iter()
                    .skip_while(|w| *w != "from")
                    .nth(1)
                    .cloned()
                    .ok_or_else(|| Error::SyntaxError("SHOW INDEX needs FROM <table>".into()))?;
                let db = self.session.current_database();
                let eq = |col: &str, val: String| Expression::Compare {
                    op: crate::types::expression::CmpOp::Eq,
                    left: Box::new(Expression::column(col)),
                    right: Box::new(Expression::literal(Value::Str(val))),
                };
                let node = self
                    .info_schema_table("statistics")
                    .filter(Expression::And(
                        Box::new(eq("table_schema", db)),
                        Box::new(eq("table_name", table)),
                    ))
                    .project(
                        vec![
                            Expression::column("table_name"),
                            Expression::column("non_unique"),
                            Expression::column("index_name"),
                            Expression::column("seq_in_index"),
                            Expression::column("column_name"),
                            Expression::column("sub_part"),
                            Expression::column("cardinality"),
                        ],
                        ["Table", "Non_unique", "Key_name", "Seq_in_index", "Column_name", "Sub_part", "Cardinality"]
                            .iter()
                            .map(|s| Some(s.to_string()))
                            .collect(),
                    );
                Ok(Plan::Select(node))
            }
            Some("function") if words.get(1).map(|s| s.as_str()) == Some("status") => {
                Ok(Plan::Select(values_rows(
                    vec![
                        ("Db", DataType::varchar(64)),
                        ("Name", DataType::varchar(64)),
                        ("Type", DataType::varchar(16)),
                    ],
                    Vec::new(),
                )))
            }
            _ => Err(Error::UnsupportedFeature(format!("SHOW {}", words.join(" ")))),
        }
    }

    // SET

    fn plan_set(
        &mut self,
        variables: &sql::OneOrManyWithParens<sql::ObjectName>,
        values: &[sql::Expr],
    ) -> Result<Plan> {
        let names: Vec<&sql::ObjectName> = match variables {
            sql::OneOrManyWithParens::One(name) => vec![name],
            sql::OneOrManyWithParens::Many(names) => names.iter().collect(),
        };
        if names.len() != values.len() {
            return Err(Error::SyntaxError("SET with mismatched variable/value counts".into()));
        }
        let mut assignments = Vec::with_capacity(names.len());
        for (name, value) in names.iter().zip(values.iter()) {
            let parts: Vec<String> = name.0.iter().map(|i| i.value.clone()).collect();
            let (scope, var_name) = match parts.as_slice() {
                [single] if single.starts_with("@@") => {
                    let trimmed = single.trim_start_matches("@@");
                    let (scope, rest) = if let Some(rest) = trimmed.strip_prefix("global.") {
                        (SetScope::Global, rest)
                    } else if let Some(rest) = trimmed.strip_prefix("session.") {
                        (SetScope::Session, rest)
                    } else {
                        (SetScope::Session, trimmed)
                    };
                    (scope, rest.to_string())
                }
                [single] if single.starts_with('@') => {
                    (SetScope::UserVariable, single.trim_start_matches('@').to_string())
                }
                [scope, rest] if scope.eq_ignore_ascii_case("global") => (SetScope::Global, rest.clone()),
                [scope, rest] if scope.eq_ignore_ascii_case("session") => (SetScope::Session, rest.clone()),
                [single] => (SetScope::Session, single.clone()),
                _ => {
                    return Err(Error::UnsupportedFeature(format!("SET target {}", parts.join("."))));
                }
            };
            assignments.push(SetAssignment { scope, name: var_name, value: self.lower_expr(value)? });
        }
        Ok(Plan::Set(assignments))
    }

    // Types

    pub(crate) fn lower_data_type(&self, dt: &sql::DataType) -> Result<DataType> {
        parse_mysql_type(&dt.to_string())
    }
}

fn values_row(cells: Vec<(&str, Value)>) -> Node {
    let schema = Schema::new(cells.iter().map(|(n, _)| Column::new(*n, DataType::text())).collect());
    let row = cells.into_iter().map(|(_, v)| Expression::literal(v)).collect();
    Node::Values { rows: vec![row], schema }
}

fn values_rows(columns: Vec<(&str, DataType)>, rows: Vec<Vec<Value>>) -> Node {
    let schema = Schema::new(columns.into_iter().map(|(n, t)| Column::new(n, t)).collect());
    let rows = rows
        .into_iter()
        .map(|r| r.into_iter().map(Expression::literal).collect())
        .collect();
    Node::Values { rows, schema }
}

/// Renders a table definition as the SHOW CREATE TABLE text.
pub fn render_create_table(def: &TableDef) -> String {
    let mut lines = Vec::new();
    for col in def.schema.iter() {
        let mut line = format!("  `{}` {}", col.name, col.data_type);
        if !col.nullable {
            line.push_str(" NOT NULL");
        }
        if col.auto_increment {
            line.push_str(" AUTO_INCREMENT");
        }
        if let Some(default) = &col.default {
            line.push_str(&format!(" DEFAULT {}", default));
        }
        if let Some(generated) = &col.generated {
            line.push_str(&format!(" GENERATED ALWAYS AS ({}) STORED", generated));
        }
        if !col.comment.is_empty() {
            line.push_str(&format!(" COMMENT '{}'", col.comment));
        }
        lines.push(line);
    }
    if !def.primary_key.is_empty() {
        let cols: Vec<String> = def
            .primary_key
            .iter()
            .filter_map(|&i| def.schema.column(i).map(|c| format!("`{}`", c.name)))
            .collect();
        lines.push(format!("  PRIMARY KEY ({})", cols.join(",")));
    }
    for index in &def.indexes {
        let cols: Vec<String> = index
            .columns
            .iter()
            .map(|c| match c.prefix {
                Some(p) => format!("`{}`({})", c.name, p),
                None => format!("`{}`", c.name),
            })
            .collect();
        let kind = if index.unique { "UNIQUE KEY" } else { "KEY" };
        lines.push(format!("  {} `{}` ({})", kind, index.name, cols.join(",")));
    }
    for fk in &def.foreign_keys {
        let cols: Vec<String> = fk.columns.iter().map(|c| format!("`{}`", c)).collect();
        let parents: Vec<String> = fk.parent_columns.iter().map(|c| format!("`{}`", c)).collect();
        lines.push(format!(
            "  CONSTRAINT `{}` FOREIGN KEY ({}) REFERENCES `{}` ({})",
            fk.name,
            cols.join(","),
            fk.parent_table,
            parents.join(",")
        ));
    }
    format!(
        "CREATE TABLE `{}` (\n{}\n) ENGINE=rowmill DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_0900_bin",
        def.name,
        lines.join(",\n")
    )
}

/// Maps a MySQL type spelling onto the engine's type family. Matching on
/// the rendered form keeps this stable across parser releases.
pub fn parse_mysql_type(spelling: &str) -> Result<DataType> {
    let s = spelling.trim().to_lowercase();
    let (base, args) = match s.split_once('(') {
        Some((base, rest)) => (base.trim(), rest.strip_suffix(')').unwrap_or(rest).trim()),
        None => (s.as_str(), ""),
    };
    let unsigned = base.contains("unsigned") || s.contains("unsigned");
    let base = base.replace("unsigned", "");
    let base = base.trim();
    let first_arg = || args.split(',').next().and_then(|a| a.trim().parse::<u16>().ok());
    let quoted_args = || -> Vec<String> {
        args.split(',')
            .map(|a| a.trim().trim_matches('\'').trim_matches('"').to_string())
            .filter(|a| !a.is_empty())
            .collect()
    };

    Ok(match base {
        "tinyint" | "bool" | "boolean" => DataType::TinyInt { unsigned },
        "smallint" => DataType::SmallInt { unsigned },
        "mediumint" => DataType::MediumInt { unsigned },
        "int" | "integer" => DataType::Int { unsigned },
        "bigint" => DataType::BigInt { unsigned },
        "float" | "real" => DataType::Float,
        "double" | "double precision" => DataType::Double,
        "decimal" | "numeric" | "dec" => {
            let mut parts = args.split(',').map(|a| a.trim().parse::<u8>().ok());
            let precision = parts.next().flatten().unwrap_or(10);
            let scale = parts.next().flatten().unwrap_or(0);
            DataType::Decimal { precision, scale }
        }
        "char" | "character" => DataType::Char { length: first_arg().unwrap_or(1), collation: Collation::default() },
        "varchar" | "character varying" | "char varying" | "nvarchar" => {
            DataType::Varchar { length: first_arg().unwrap_or(255), collation: Collation::default() }
        }
        "text" | "tinytext" | "mediumtext" | "longtext" | "string" => DataType::text(),
        "binary" => DataType::Binary { length: first_arg().unwrap_or(1) },
        "varbinary" => DataType::Varbinary { length: first_arg().unwrap_or(255) },
        "blob" | "tinyblob" | "mediumblob" | "longblob" | "bytea" => DataType::Blob,
        "date" => DataType::Date,
        "time" => DataType::Time,
        "datetime" => DataType::Datetime,
        "timestamp" => DataType::Timestamp,
        "year" => DataType::Year,
        "json" => DataType::Json,
        "enum" => DataType::Enum { values: quoted_args(), collation: Collation::default() },
        "set" => DataType::Set { values: quoted_args(), collation: Collation::default() },
        "geometry" => DataType::Spatial { class: SpatialClass::Geometry, srid: 0 },
        "point" => DataType::Spatial { class: SpatialClass::Point, srid: 0 },
        "linestring" => DataType::Spatial { class: SpatialClass::LineString, srid: 0 },
        "polygon" => DataType::Spatial { class: SpatialClass::Polygon, srid: 0 },
        "multipoint" => DataType::Spatial { class: SpatialClass::MultiPoint, srid: 0 },
        "multilinestring" => DataType::Spatial { class: SpatialClass::MultiLineString, srid: 0 },
        "multipolygon" => DataType::Spatial { class: SpatialClass::MultiPolygon, srid: 0 },
        "geometrycollection" | "geomcollection" => {
            DataType::Spatial { class: SpatialClass::GeometryCollection, srid: 0 }
        }
        other => return Err(Error::UnsupportedFeature(format!("column type {}", other))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mysql_type_parsing() {
        assert_eq!(parse_mysql_type("BIGINT").unwrap(), DataType::bigint());
        assert_eq!(parse_mysql_type("INT UNSIGNED").unwrap(), DataType::Int { unsigned: true });
        assert_eq!(parse_mysql_type("VARCHAR(20)").unwrap(), DataType::varchar(20));
        assert_eq!(
            parse_mysql_type("DECIMAL(10,2)").unwrap(),
            DataType::Decimal { precision: 10, scale: 2 }
        );
        assert_eq!(
            parse_mysql_type("ENUM('a','b')").unwrap(),
            DataType::Enum { values: vec!["a".into(), "b".into()], collation: Collation::default() }
        );
        assert!(parse_mysql_type("frobnicate").is_err());
    }
}
