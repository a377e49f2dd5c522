//! The relational plan tree.
//!
//! `Node` is a relational operator; `Plan` is a whole statement. Trees are
//! immutable: every rewrite builds new parents and shares unchanged
//! children. Each node exposes its output schema, its children and its
//! expressions, and can be rebuilt through `with_children` /
//! `with_expressions` — the contract every analyzer rule relies on.

use crate::error::{Error, Result};
use crate::storage::Table;
use crate::types::coercion;
use crate::types::expression::{Expression, SortField};
use crate::types::schema::{Column, IndexDef, Schema, TableDef};
use std::fmt;
use std::sync::Arc;

/// A resolved reference to a storage table, tagged with the name it is
/// visible under in the query (its alias, if one was given).
#[derive(Clone)]
pub struct TableRef {
    pub database: String,
    pub name: String,
    pub alias: Option<String>,
    pub table: Arc<dyn Table>,
}

impl TableRef {
    /// The name columns of this table resolve under.
    pub fn source_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn schema(&self) -> Schema {
        self.table.def().schema.with_source(self.source_name())
    }

    pub fn def(&self) -> &TableDef {
        self.table.def()
    }
}

impl fmt::Debug for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(a) => write!(f, "TableRef({}.{} as {})", self.database, self.name, a),
            None => write!(f, "TableRef({}.{})", self.database, self.name),
        }
    }
}

// Structural equality: same table identity and shape. The storage handle
// itself does not take part, which keeps analyzed-plan equality checkable.
impl PartialEq for TableRef {
    fn eq(&self, other: &Self) -> bool {
        self.database == other.database
            && self.name == other.name
            && self.alias == other.alias
            && self.table.def() == other.table.def()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinKind {
    pub fn name(&self) -> &'static str {
        match self {
            JoinKind::Inner => "InnerJoin",
            JoinKind::Left => "LeftJoin",
            JoinKind::Right => "RightJoin",
            JoinKind::Cross => "CrossJoin",
        }
    }
}

/// How a join is executed. The analyzer upgrades nested-loop joins to hash
/// or index joins when an equijoin key is available.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum JoinStrategy {
    #[default]
    NestedLoop,
    Hash {
        left_keys: Vec<Expression>,
        right_keys: Vec<Expression>,
    },
    /// Lookup into an index on the right side for each left row.
    Index {
        index: IndexDef,
        left_keys: Vec<Expression>,
    },
}

/// An index access chosen by the analyzer: equality over a leading prefix
/// of the index columns plus an optional range on the next one. The
/// expressions must be constant at iterator-build time.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRangeSpec {
    pub index: IndexDef,
    pub prefix: Vec<Expression>,
    pub lower: Option<(Expression, bool)>,
    pub upper: Option<(Expression, bool)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A table reference the analyzer has not bound to storage yet.
    UnresolvedTable {
        database: Option<String>,
        name: String,
        alias: Option<String>,
    },
    /// A full scan of a resolved table.
    Table(TableRef),
    /// An index-backed range access of a resolved table.
    IndexedTable { table: TableRef, spec: IndexRangeSpec },
    /// A derived table: `(subquery) AS name`, with optional column
    /// renames from a `name(col, ...)` alias list.
    SubqueryAlias { name: String, columns: Vec<String>, child: Box<Node> },
    /// A literal row list.
    Values { rows: Vec<Vec<Expression>>, schema: Schema },
    Filter { child: Box<Node>, predicate: Expression },
    Project {
        child: Box<Node>,
        expressions: Vec<Expression>,
        aliases: Vec<Option<String>>,
    },
    /// Grouped aggregation; output is the grouping columns followed by one
    /// column per aggregate.
    Aggregate {
        child: Box<Node>,
        group_by: Vec<Expression>,
        aggregates: Vec<Expression>,
    },
    /// Window evaluation; `expressions` mixes pass-through fields and
    /// window-function calls, one output column each.
    Window { child: Box<Node>, expressions: Vec<Expression> },
    Sort { child: Box<Node>, order_by: Vec<SortField> },
    Limit { child: Box<Node>, limit: u64 },
    Offset { child: Box<Node>, offset: u64 },
    Distinct { child: Box<Node> },
    Join {
        left: Box<Node>,
        right: Box<Node>,
        kind: JoinKind,
        on: Option<Expression>,
        strategy: JoinStrategy,
        /// NATURAL JOIN marker; expanded by the analyzer into an equality
        /// predicate plus a deduplicating projection.
        natural: bool,
        /// USING column list; expanded the same way.
        using: Vec<String>,
    },
    Union { left: Box<Node>, right: Box<Node>, distinct: bool },
    /// WITH RECURSIVE: the init leg runs once, then the recursive leg runs
    /// against the working table to a fixpoint.
    RecursiveCte {
        name: String,
        columns: Vec<String>,
        init: Box<Node>,
        recursive: Box<Node>,
        distinct: bool,
    },
    /// The self-reference inside a recursive leg, reading the working table.
    RecursiveTableRef { name: String, schema: Schema },
    /// The empty relation.
    Nothing { schema: Schema },
}

impl Node {
    pub fn filter(self, predicate: Expression) -> Node {
        Node::Filter { child: Box::new(self), predicate }
    }

    pub fn project(self, expressions: Vec<Expression>, aliases: Vec<Option<String>>) -> Node {
        Node::Project { child: Box::new(self), expressions, aliases }
    }

    /// The output schema. Referentially transparent: depends only on the
    /// children's schemas and this node's own expressions.
    pub fn schema(&self) -> Schema {
        match self {
            Node::UnresolvedTable { .. } => Schema::empty(),
            Node::Table(t) => t.schema(),
            Node::IndexedTable { table, .. } => table.schema(),
            Node::SubqueryAlias { name, columns, child } => {
                let mut schema = child.schema();
                for (i, rename) in columns.iter().enumerate() {
                    if let Some(col) = schema.0.get_mut(i) {
                        col.name = rename.clone();
                    }
                }
                schema.with_source(name)
            }
            Node::Values { schema, .. } => schema.clone(),
            Node::Filter { child, .. } | Node::Distinct { child } => child.schema(),
            Node::Limit { child, .. } | Node::Offset { child, .. } | Node::Sort { child, .. } => child.schema(),
            Node::Project { expressions, aliases, .. } => project_schema(expressions, aliases),
            Node::Aggregate { group_by, aggregates, .. } => {
                let mut cols = Vec::with_capacity(group_by.len() + aggregates.len());
                for e in group_by.iter().chain(aggregates.iter()) {
                    cols.push(expression_column(e, None));
                }
                Schema::new(cols)
            }
            Node::Window { expressions, .. } => {
                Schema::new(expressions.iter().map(|e| expression_column(e, None)).collect())
            }
            Node::Join { left, right, kind, .. } => {
                let l = left.schema();
                let r = right.schema();
                match kind {
                    JoinKind::Left => l.join(&r.nullable()),
                    JoinKind::Right => l.nullable().join(&r),
                    _ => l.join(&r),
                }
            }
            Node::Union { left, right, .. } => {
                let l = left.schema();
                let r = right.schema();
                let cols = l
                    .iter()
                    .zip(r.iter())
                    .map(|(a, b)| {
                        let mut c = a.clone();
                        c.data_type = coercion::common_type(&a.data_type, &b.data_type);
                        c.nullable = a.nullable || b.nullable;
                        c
                    })
                    .collect();
                Schema::new(cols)
            }
            Node::RecursiveCte { name, columns, init, .. } => {
                let base = init.schema();
                let cols = base
                    .iter()
                    .enumerate()
                    .map(|(i, c)| {
                        let mut c = c.clone();
                        if let Some(n) = columns.get(i) {
                            c.name = n.clone();
                        }
                        c.source = name.clone();
                        c.nullable = true;
                        c
                    })
                    .collect();
                Schema::new(cols)
            }
            Node::RecursiveTableRef { schema, .. } => schema.clone(),
            Node::Nothing { schema } => schema.clone(),
        }
    }

    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::UnresolvedTable { .. }
            | Node::Table(_)
            | Node::IndexedTable { .. }
            | Node::Values { .. }
            | Node::RecursiveTableRef { .. }
            | Node::Nothing { .. } => vec![],
            Node::SubqueryAlias { child, .. }
            | Node::Filter { child, .. }
            | Node::Project { child, .. }
            | Node::Aggregate { child, .. }
            | Node::Window { child, .. }
            | Node::Sort { child, .. }
            | Node::Limit { child, .. }
            | Node::Offset { child, .. }
            | Node::Distinct { child } => vec![child],
            Node::Join { left, right, .. } | Node::Union { left, right, .. } => vec![left, right],
            Node::RecursiveCte { init, recursive, .. } => vec![init, recursive],
        }
    }

    /// Rebuilds this node with new children, in `children()` order.
    pub fn with_children(self, mut new: Vec<Node>) -> Result<Node> {
        let expected = self.children().len();
        if new.len() != expected {
            return Err(Error::Internal(format!(
                "with_children: node {} expected {} children, got {}",
                self.name(),
                expected,
                new.len()
            )));
        }
        let mut take = || Box::new(new.remove(0));
        Ok(match self {
            Node::SubqueryAlias { name, columns, .. } => Node::SubqueryAlias { name, columns, child: take() },
            Node::Filter { predicate, .. } => Node::Filter { child: take(), predicate },
            Node::Project { expressions, aliases, .. } => Node::Project { child: take(), expressions, aliases },
            Node::Aggregate { group_by, aggregates, .. } => Node::Aggregate { child: take(), group_by, aggregates },
            Node::Window { expressions, .. } => Node::Window { child: take(), expressions },
            Node::Sort { order_by, .. } => Node::Sort { child: take(), order_by },
            Node::Limit { limit, .. } => Node::Limit { child: take(), limit },
            Node::Offset { offset, .. } => Node::Offset { child: take(), offset },
            Node::Distinct { .. } => Node::Distinct { child: take() },
            Node::Join { kind, on, strategy, natural, using, .. } => {
                Node::Join { left: take(), right: take(), kind, on, strategy, natural, using }
            }
            Node::Union { distinct, .. } => Node::Union { left: take(), right: take(), distinct },
            Node::RecursiveCte { name, columns, distinct, .. } => Node::RecursiveCte {
                name,
                columns,
                init: take(),
                recursive: take(),
                distinct,
            },
            leaf => leaf,
        })
    }

    /// The expressions this node owns, in a stable order matched by
    /// `with_expressions`.
    pub fn expressions(&self) -> Vec<&Expression> {
        match self {
            Node::Filter { predicate, .. } => vec![predicate],
            Node::Project { expressions, .. } | Node::Window { expressions, .. } => expressions.iter().collect(),
            Node::Aggregate { group_by, aggregates, .. } => group_by.iter().chain(aggregates.iter()).collect(),
            Node::Sort { order_by, .. } => order_by.iter().map(|s| &s.expr).collect(),
            Node::Join { on, strategy, .. } => {
                let mut v: Vec<&Expression> = on.iter().collect();
                match strategy {
                    JoinStrategy::Hash { left_keys, right_keys } => {
                        v.extend(left_keys.iter());
                        v.extend(right_keys.iter());
                    }
                    JoinStrategy::Index { left_keys, .. } => v.extend(left_keys.iter()),
                    JoinStrategy::NestedLoop => {}
                }
                v
            }
            Node::Values { rows, .. } => rows.iter().flatten().collect(),
            Node::IndexedTable { spec, .. } => {
                let mut v: Vec<&Expression> = spec.prefix.iter().collect();
                if let Some((e, _)) = &spec.lower {
                    v.push(e);
                }
                if let Some((e, _)) = &spec.upper {
                    v.push(e);
                }
                v
            }
            _ => vec![],
        }
    }

    /// Rebuilds this node with new expressions, in `expressions()` order.
    pub fn with_expressions(self, mut new: Vec<Expression>) -> Result<Node> {
        let expected = self.expressions().len();
        if new.len() != expected {
            return Err(Error::Internal(format!(
                "with_expressions: node {} expected {} expressions, got {}",
                self.name(),
                expected,
                new.len()
            )));
        }
        let mut take = || new.remove(0);
        Ok(match self {
            Node::Filter { child, .. } => Node::Filter { child, predicate: take() },
            Node::Project { child, aliases, expressions } => {
                let expressions = expressions.into_iter().map(|_| take()).collect();
                Node::Project { child, expressions, aliases }
            }
            Node::Window { child, expressions } => {
                let expressions = expressions.into_iter().map(|_| take()).collect();
                Node::Window { child, expressions }
            }
            Node::Aggregate { child, group_by, aggregates } => {
                let group_by = group_by.into_iter().map(|_| take()).collect();
                let aggregates = aggregates.into_iter().map(|_| take()).collect();
                Node::Aggregate { child, group_by, aggregates }
            }
            Node::Sort { child, order_by } => {
                let order_by = order_by
                    .into_iter()
                    .map(|s| SortField { expr: take(), ascending: s.ascending })
                    .collect();
                Node::Sort { child, order_by }
            }
            Node::Join { left, right, kind, on, strategy, natural, using } => {
                let on = on.map(|_| take());
                let strategy = match strategy {
                    JoinStrategy::Hash { left_keys, right_keys } => JoinStrategy::Hash {
                        left_keys: left_keys.into_iter().map(|_| take()).collect(),
                        right_keys: right_keys.into_iter().map(|_| take()).collect(),
                    },
                    JoinStrategy::Index { index, left_keys } => JoinStrategy::Index {
                        index,
                        left_keys: left_keys.into_iter().map(|_| take()).collect(),
                    },
                    JoinStrategy::NestedLoop => JoinStrategy::NestedLoop,
                };
                Node::Join { left, right, kind, on, strategy, natural, using }
            }
            Node::Values { rows, schema } => {
                let rows = rows
                    .into_iter()
                    .map(|row| row.into_iter().map(|_| take()).collect())
                    .collect();
                Node::Values { rows, schema }
            }
            Node::IndexedTable { table, spec } => {
                let prefix = spec.prefix.iter().map(|_| take()).collect();
                let lower = spec.lower.as_ref().map(|(_, inc)| (take(), *inc));
                let upper = spec.upper.as_ref().map(|(_, inc)| (take(), *inc));
                Node::IndexedTable {
                    table,
                    spec: IndexRangeSpec { index: spec.index, prefix, lower, upper },
                }
            }
            other => other,
        })
    }

    /// Whether the whole tree is bound: every table resolved, every
    /// expression resolved. A fully resolved tree is the precondition for
    /// execution.
    pub fn resolved(&self) -> bool {
        if matches!(self, Node::UnresolvedTable { .. }) {
            return false;
        }
        self.expressions().iter().all(|e| e.resolved()) && self.children().iter().all(|c| c.resolved())
    }

    /// Rewrites the tree bottom-up; `f` sees each node after its children
    /// were rewritten.
    pub fn transform_up(self, f: &mut impl FnMut(Node) -> Result<Node>) -> Result<Node> {
        let children = self.children().len();
        let node = if children == 0 {
            self
        } else {
            let mut rebuilt = Vec::with_capacity(children);
            // Clone-free child extraction via with_children round trip.
            let mut owned = self;
            let kids: Vec<Node> = owned.children().into_iter().cloned().collect();
            for child in kids {
                rebuilt.push(child.transform_up(f)?);
            }
            owned = owned.with_children(rebuilt)?;
            owned
        };
        f(node)
    }

    /// Visits every node top-down.
    pub fn walk(&self, f: &mut impl FnMut(&Node)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Applies `f` to every expression of every node in the tree.
    pub fn transform_expressions_up(
        self,
        f: &mut impl FnMut(Expression) -> Result<Expression>,
    ) -> Result<Node> {
        self.transform_up(&mut |node| {
            let exprs: Vec<Expression> = node.expressions().into_iter().cloned().collect();
            if exprs.is_empty() {
                return Ok(node);
            }
            let rewritten: Vec<Expression> =
                exprs.into_iter().map(|e| e.transform_up(f)).collect::<Result<_>>()?;
            node.with_expressions(rewritten)
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Node::UnresolvedTable { .. } => "UnresolvedTable",
            Node::Table(_) => "Table",
            Node::IndexedTable { .. } => "IndexedTableAccess",
            Node::SubqueryAlias { .. } => "SubqueryAlias",
            Node::Values { .. } => "Values",
            Node::Filter { .. } => "Filter",
            Node::Project { .. } => "Project",
            Node::Aggregate { .. } => "GroupBy",
            Node::Window { .. } => "Window",
            Node::Sort { .. } => "Sort",
            Node::Limit { .. } => "Limit",
            Node::Offset { .. } => "Offset",
            Node::Distinct { .. } => "Distinct",
            Node::Join { kind, .. } => kind.name(),
            Node::Union { .. } => "Union",
            Node::RecursiveCte { .. } => "RecursiveCTE",
            Node::RecursiveTableRef { .. } => "RecursiveTableRef",
            Node::Nothing { .. } => "Nothing",
        }
    }

    fn describe_line(&self) -> String {
        match self {
            Node::UnresolvedTable { name, alias, .. } => match alias {
                Some(a) => format!("UnresolvedTable({} as {})", name, a),
                None => format!("UnresolvedTable({})", name),
            },
            Node::Table(t) => format!("Table({})", t.source_name()),
            Node::IndexedTable { table, spec } => {
                format!("IndexedTableAccess({} on {})", table.source_name(), spec.index.name)
            }
            Node::SubqueryAlias { name, .. } => format!("SubqueryAlias({})", name),
            Node::Values { rows, .. } => format!("Values({} rows)", rows.len()),
            Node::Filter { predicate, .. } => format!("Filter({})", predicate),
            Node::Project { expressions, aliases, .. } => {
                let cols: Vec<String> = expressions
                    .iter()
                    .zip(aliases.iter())
                    .map(|(e, a)| match a {
                        Some(a) => format!("{} as {}", e, a),
                        None => e.to_string(),
                    })
                    .collect();
                format!("Project({})", cols.join(", "))
            }
            Node::Aggregate { group_by, aggregates, .. } => {
                let g: Vec<String> = group_by.iter().map(|e| e.to_string()).collect();
                let a: Vec<String> = aggregates.iter().map(|e| e.to_string()).collect();
                format!("GroupBy(group: [{}], aggregates: [{}])", g.join(", "), a.join(", "))
            }
            Node::Window { expressions, .. } => {
                let e: Vec<String> = expressions.iter().map(|e| e.to_string()).collect();
                format!("Window({})", e.join(", "))
            }
            Node::Sort { order_by, .. } => {
                let keys: Vec<String> = order_by
                    .iter()
                    .map(|s| format!("{} {}", s.expr, if s.ascending { "ASC" } else { "DESC" }))
                    .collect();
                format!("Sort({})", keys.join(", "))
            }
            Node::Limit { limit, .. } => format!("Limit({})", limit),
            Node::Offset { offset, .. } => format!("Offset({})", offset),
            Node::Distinct { .. } => "Distinct".to_string(),
            Node::Join { kind, on, strategy, .. } => {
                let s = match strategy {
                    JoinStrategy::NestedLoop => "",
                    JoinStrategy::Hash { .. } => " [hash]",
                    JoinStrategy::Index { .. } => " [index]",
                };
                match on {
                    Some(on) => format!("{}({}){}", kind.name(), on, s),
                    None => format!("{}{}", kind.name(), s),
                }
            }
            Node::Union { distinct, .. } => {
                if *distinct {
                    "Union(distinct)".to_string()
                } else {
                    "Union(all)".to_string()
                }
            }
            Node::RecursiveCte { name, .. } => format!("RecursiveCTE({})", name),
            Node::RecursiveTableRef { name, .. } => format!("RecursiveTableRef({})", name),
            Node::Nothing { .. } => "Nothing".to_string(),
        }
    }

    fn describe_into(&self, indent: usize, out: &mut Vec<String>) {
        out.push(format!("{}{}", " ".repeat(indent), self.describe_line()));
        for child in self.children() {
            child.describe_into(indent + 1, out);
        }
    }

    /// One line per operator, children indented. The EXPLAIN surface.
    pub fn describe(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.describe_into(0, &mut out);
        out
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe().join("\n"))
    }
}

fn expression_column(e: &Expression, alias: Option<&String>) -> Column {
    let name = alias.cloned().unwrap_or_else(|| e.result_name());
    let source = match e {
        Expression::Field { table, .. } => table.clone(),
        _ => String::new(),
    };
    Column {
        name,
        data_type: e.data_type(),
        nullable: e.nullable(),
        default: None,
        auto_increment: false,
        generated: None,
        comment: String::new(),
        source,
    }
}

fn project_schema(expressions: &[Expression], aliases: &[Option<String>]) -> Schema {
    Schema::new(
        expressions
            .iter()
            .enumerate()
            .map(|(i, e)| expression_column(e, aliases.get(i).and_then(|a| a.as_ref())))
            .collect(),
    )
}

/// Which scope a SET statement targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetScope {
    Session,
    Global,
    UserVariable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetAssignment {
    pub scope: SetScope,
    pub name: String,
    pub value: Expression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOp {
    Begin,
    Commit,
    Rollback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertPlan {
    pub database: Option<String>,
    pub table: String,
    /// The user's column list; empty means all columns, filled in by the
    /// analyzer.
    pub columns: Vec<String>,
    pub source: Node,
    pub on_duplicate: Vec<(String, Expression)>,
    pub replace: bool,
    pub ignore: bool,
    /// Destination binding, stamped by the analyzer.
    pub destination: Option<TableRef>,
    /// Column defaults that reference other columns; evaluated against the
    /// assembled destination row after the source projection ran.
    /// (destination column index, default expression fix-indexed against
    /// the destination schema)
    pub post_defaults: Vec<(usize, Expression)>,
    /// Stored generated columns, recomputed on every write.
    pub generated: Vec<(usize, Expression)>,
    /// ON DUPLICATE KEY UPDATE assignments resolved to destination column
    /// indices; value expressions see `old_row ++ new_row`.
    pub resolved_on_duplicate: Vec<(usize, Expression)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    pub database: Option<String>,
    pub table: String,
    pub assignments: Vec<(String, Expression)>,
    /// Scan + filter over the destination producing the rows to update.
    pub source: Node,
    pub destination: Option<TableRef>,
    /// (column index, value expression), stamped by the analyzer.
    pub resolved_assignments: Vec<(usize, Expression)>,
    /// Stored generated columns, recomputed after assignments apply.
    pub generated: Vec<(usize, Expression)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeletePlan {
    pub database: Option<String>,
    pub table: String,
    pub source: Node,
    pub destination: Option<TableRef>,
}

/// A whole statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Select(Node),
    Insert(Box<InsertPlan>),
    Update(Box<UpdatePlan>),
    Delete(Box<DeletePlan>),
    CreateTable {
        database: Option<String>,
        def: TableDef,
        if_not_exists: bool,
    },
    DropTable {
        database: Option<String>,
        names: Vec<String>,
        if_exists: bool,
    },
    CreateIndex {
        database: Option<String>,
        table: String,
        index: IndexDef,
    },
    DropIndex {
        database: Option<String>,
        table: String,
        name: String,
    },
    CreateView {
        database: Option<String>,
        name: String,
        definition: String,
    },
    DropView {
        database: Option<String>,
        name: String,
        if_exists: bool,
    },
    Set(Vec<SetAssignment>),
    Use(String),
    Explain(Box<Plan>),
    AnalyzeTable {
        database: Option<String>,
        tables: Vec<String>,
    },
    Transaction(TransactionOp),
    /// A sequence of statements executed in order; the shape trigger bodies
    /// and multi-statement scripts plan into.
    Block(Vec<Plan>),
}

impl Plan {
    pub fn is_query(&self) -> bool {
        matches!(self, Plan::Select(_) | Plan::Explain(_))
    }

    /// Applies `f` to every relational node tree contained in the plan.
    pub fn map_nodes(self, f: &mut impl FnMut(Node) -> Result<Node>) -> Result<Plan> {
        Ok(match self {
            Plan::Select(node) => Plan::Select(f(node)?),
            Plan::Insert(mut p) => {
                p.source = f(p.source)?;
                Plan::Insert(p)
            }
            Plan::Update(mut p) => {
                p.source = f(p.source)?;
                Plan::Update(p)
            }
            Plan::Delete(mut p) => {
                p.source = f(p.source)?;
                Plan::Delete(p)
            }
            Plan::Explain(inner) => Plan::Explain(Box::new(inner.map_nodes(f)?)),
            Plan::Block(items) => {
                Plan::Block(items.into_iter().map(|p| p.map_nodes(f)).collect::<Result<_>>()?)
            }
            other => other,
        })
    }

    /// The result schema of the statement, if it returns rows.
    pub fn schema(&self) -> Option<Schema> {
        match self {
            Plan::Select(node) => Some(node.schema()),
            Plan::Explain(_) => Some(Schema::new(vec![Column::new("plan", crate::types::DataType::text())])),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::value::Value;
    use crate::types::DataType;

    fn values_node() -> Node {
        Node::Values {
            rows: vec![vec![Expression::literal(Value::I64(1))]],
            schema: Schema::new(vec![Column::new("c0", DataType::bigint()).not_null()]),
        }
    }

    #[test]
    fn with_children_arity_mismatch_errors() {
        let filter = values_node().filter(Expression::literal(Value::I8(1)));
        assert!(filter.with_children(vec![]).is_err());
    }

    #[test]
    fn with_expressions_round_trip() {
        let filter = values_node().filter(Expression::literal(Value::I8(1)));
        let exprs: Vec<Expression> = filter.expressions().into_iter().cloned().collect();
        let rebuilt = filter.clone().with_expressions(exprs).unwrap();
        assert_eq!(filter, rebuilt);
    }

    #[test]
    fn outer_join_schema_pads_nullable() {
        let left = values_node();
        let right = values_node();
        let join = Node::Join {
            left: Box::new(left),
            right: Box::new(right),
            kind: JoinKind::Left,
            on: None,
            strategy: JoinStrategy::NestedLoop,
            natural: false,
            using: Vec::new(),
        };
        let schema = join.schema();
        assert!(!schema.0[0].nullable);
        assert!(schema.0[1].nullable);
    }
}
