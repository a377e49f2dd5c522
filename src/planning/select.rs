//! Lowering of queries: SELECT bodies, FROM trees, set operations and
//! common table expressions.
//!
//! The planner is purely syntactic. Names stay unresolved, aggregates and
//! window calls stay inside the projection, and the analyzer turns the
//! shape into an executable one. CTEs are expanded here because they are
//! lexical; views are expanded by the analyzer, which needs the catalog.

use crate::error::{Error, Result};
use crate::plan::{JoinKind, JoinStrategy, Node};
use crate::planning::expr::split_object_name;
use crate::planning::{CteBinding, Planner};
use crate::types::expression::Expression;
use crate::types::schema::{Column, Schema};
use crate::types::DataType;
use sqlparser::ast as sql;
use std::collections::HashMap;

impl Planner<'_> {
    pub(crate) fn plan_query(&mut self, query: &sql::Query) -> Result<Node> {
        let pushed_scope = match &query.with {
            Some(with) => {
                self.plan_with(with)?;
                true
            }
            None => false,
        };

        let result = (|| {
            let mut node = self.plan_set_expr(&query.body)?;

            if let Some(order_by) = &query.order_by {
                if !order_by.exprs.is_empty() {
                    let fields = order_by
                        .exprs
                        .iter()
                        .map(|o| self.lower_order_by_expr(o))
                        .collect::<Result<Vec<_>>>()?;
                    node = Node::Sort { child: Box::new(node), order_by: fields };
                }
            }

            if let Some(offset) = &query.offset {
                node = Node::Offset { child: Box::new(node), offset: self.constant_count(&offset.value)? };
            }
            if let Some(limit) = &query.limit {
                node = Node::Limit { child: Box::new(node), limit: self.constant_count(limit)? };
            }
            Ok(node)
        })();

        if pushed_scope {
            self.cte_scopes.pop();
        }
        result
    }

    fn constant_count(&mut self, e: &sql::Expr) -> Result<u64> {
        match self.lower_expr(e)? {
            Expression::Literal { value, .. } => {
                let n = value.to_i64()?;
                if n < 0 {
                    return Err(Error::SyntaxError(format!("negative LIMIT/OFFSET {}", n)));
                }
                Ok(n as u64)
            }
            other => Err(Error::UnsupportedFeature(format!("non-constant LIMIT/OFFSET {}", other))),
        }
    }

    fn plan_with(&mut self, with: &sql::With) -> Result<()> {
        self.cte_scopes.push(HashMap::new());
        for cte in &with.cte_tables {
            let name = cte.alias.name.value.clone();
            let columns: Vec<String> = cte.alias.columns.iter().map(|c| c.to_string()).collect();
            let binding = if with.recursive {
                self.plan_recursive_cte(&name, &columns, &cte.query)?
            } else {
                let node = self.plan_query(&cte.query)?;
                CteBinding::Planned { columns: columns.clone(), node }
            };
            let scope = self.cte_scopes.last_mut().expect("cte scope pushed");
            scope.insert(name.to_lowercase(), binding);
        }
        Ok(())
    }

    /// Plans one CTE of a WITH RECURSIVE block. The legs that reference the
    /// CTE's own name become the recursive part; a body with no
    /// self-reference degrades to an ordinary CTE.
    fn plan_recursive_cte(&mut self, name: &str, columns: &[String], query: &sql::Query) -> Result<CteBinding> {
        let mut legs = Vec::new();
        let mut distinct = false;
        flatten_union(&query.body, &mut legs, &mut distinct)?;

        // Bind the name as a recursion marker while planning the legs.
        let scope = self.cte_scopes.last_mut().expect("cte scope pushed");
        scope.insert(name.to_lowercase(), CteBinding::RecursiveMarker);

        let mut init: Option<Node> = None;
        let mut recursive: Option<Node> = None;
        for leg in legs {
            self.used_recursive.remove(&name.to_lowercase());
            let node = self.plan_set_expr(leg)?;
            let is_recursive = self.used_recursive.remove(&name.to_lowercase());
            let slot = if is_recursive { &mut recursive } else { &mut init };
            *slot = Some(match slot.take() {
                None => node,
                Some(prev) => Node::Union { left: Box::new(prev), right: Box::new(node), distinct },
            });
        }

        let init = init.ok_or_else(|| {
            Error::SyntaxError(format!("recursive CTE {} needs a non-recursive first leg", name))
        })?;
        match recursive {
            Some(recursive) => Ok(CteBinding::Recursive(Node::RecursiveCte {
                name: name.to_string(),
                columns: columns.to_vec(),
                init: Box::new(init),
                recursive: Box::new(recursive),
                distinct,
            })),
            None => Ok(CteBinding::Planned { columns: columns.to_vec(), node: init }),
        }
    }

    pub(crate) fn plan_set_expr(&mut self, body: &sql::SetExpr) -> Result<Node> {
        match body {
            sql::SetExpr::Select(select) => self.plan_select(select),
            sql::SetExpr::Query(query) => self.plan_query(query),
            sql::SetExpr::Values(values) => self.plan_values(values),
            sql::SetExpr::SetOperation { op, set_quantifier, left, right } => {
                if *op != sql::SetOperator::Union {
                    return Err(Error::UnsupportedFeature(format!("set operation {:?}", op)));
                }
                let distinct = !matches!(
                    set_quantifier,
                    sql::SetQuantifier::All | sql::SetQuantifier::AllByName
                );
                let left = self.plan_set_expr(left)?;
                let right = self.plan_set_expr(right)?;
                Ok(Node::Union { left: Box::new(left), right: Box::new(right), distinct })
            }
            other => Err(Error::UnsupportedFeature(format!("query body {}", other))),
        }
    }

    pub(crate) fn plan_values(&mut self, values: &sql::Values) -> Result<Node> {
        let mut rows = Vec::with_capacity(values.rows.len());
        for row in &values.rows {
            rows.push(row.iter().map(|e| self.lower_expr(e)).collect::<Result<Vec<_>>>()?);
        }
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        for row in &rows {
            if row.len() != width {
                return Err(Error::InsertIntoMismatchValueCount);
            }
        }
        let schema = Schema::new(
            (0..width)
                .map(|i| {
                    let data_type = rows
                        .first()
                        .map(|r| r[i].data_type())
                        .filter(|t| *t != DataType::Null)
                        .unwrap_or(DataType::text());
                    Column::new(format!("column_{}", i), data_type)
                })
                .collect(),
        );
        Ok(Node::Values { rows, schema })
    }

    fn plan_select(&mut self, select: &sql::Select) -> Result<Node> {
        // FROM: no table means one empty row, so literal selects produce
        // exactly one row.
        let mut node = match select.from.len() {
            0 => single_row(),
            _ => {
                let mut iter = select.from.iter();
                let mut node = self.plan_table_with_joins(iter.next().unwrap())?;
                for twj in iter {
                    let right = self.plan_table_with_joins(twj)?;
                    node = Node::Join {
                        left: Box::new(node),
                        right: Box::new(right),
                        kind: JoinKind::Cross,
                        on: None,
                        strategy: JoinStrategy::NestedLoop,
                        natural: false,
                        using: Vec::new(),
                    };
                }
                node
            }
        };

        if let Some(selection) = &select.selection {
            node = node.filter(self.lower_expr(selection)?);
        }

        // Projection expressions and aliases.
        let mut expressions = Vec::with_capacity(select.projection.len());
        let mut aliases: Vec<Option<String>> = Vec::with_capacity(select.projection.len());
        for item in &select.projection {
            match item {
                sql::SelectItem::UnnamedExpr(e) => {
                    expressions.push(self.lower_expr(e)?);
                    aliases.push(None);
                }
                sql::SelectItem::ExprWithAlias { expr, alias } => {
                    expressions.push(self.lower_expr(expr)?);
                    aliases.push(Some(alias.value.clone()));
                }
                sql::SelectItem::Wildcard(_) => {
                    expressions.push(Expression::Star { table: None });
                    aliases.push(None);
                }
                sql::SelectItem::QualifiedWildcard(name, _) => {
                    expressions.push(Expression::Star { table: Some(crate::planning::expr::object_name_string(name)) });
                    aliases.push(None);
                }
            }
        }

        // Grouping: explicit GROUP BY, or implicit when any projected or
        // HAVING expression aggregates.
        let group_by = match &select.group_by {
            sql::GroupByExpr::Expressions(exprs, _) => {
                exprs.iter().map(|e| self.lower_expr(e)).collect::<Result<Vec<_>>>()?
            }
            sql::GroupByExpr::All(_) => {
                return Err(Error::UnsupportedFeature("GROUP BY ALL".into()));
            }
        };
        let having = select.having.as_ref().map(|h| self.lower_expr(h)).transpose()?;
        let grouped = !group_by.is_empty()
            || expressions.iter().any(|e| e.contains_aggregate())
            || having.as_ref().map(|h| h.contains_aggregate()).unwrap_or(false);

        if grouped {
            // HAVING below the projection; the aggregation rule rewrites
            // its aggregates and alias references over the grouped output.
            node = Node::Aggregate { child: Box::new(node), group_by, aggregates: Vec::new() };
            if let Some(having) = having {
                node = node.filter(having);
            }
            node = node.project(expressions, aliases);
        } else {
            // Ungrouped HAVING filters the projected row, so projection
            // aliases are visible to it (and never to WHERE).
            node = node.project(expressions, aliases);
            if let Some(having) = having {
                node = node.filter(having);
            }
        }

        if select.distinct.is_some() {
            node = Node::Distinct { child: Box::new(node) };
        }
        Ok(node)
    }

    fn plan_table_with_joins(&mut self, twj: &sql::TableWithJoins) -> Result<Node> {
        let mut node = self.plan_table_factor(&twj.relation)?;
        for join in &twj.joins {
            let right = self.plan_table_factor(&join.relation)?;
            let (kind, constraint) = match &join.join_operator {
                sql::JoinOperator::Inner(c) => (JoinKind::Inner, Some(c)),
                sql::JoinOperator::LeftOuter(c) => (JoinKind::Left, Some(c)),
                sql::JoinOperator::RightOuter(c) => (JoinKind::Right, Some(c)),
                sql::JoinOperator::CrossJoin => (JoinKind::Cross, None),
                other => {
                    return Err(Error::UnsupportedFeature(format!("join type {:?}", other)));
                }
            };
            let (on, natural, using) = match constraint {
                None | Some(sql::JoinConstraint::None) => (None, false, Vec::new()),
                Some(sql::JoinConstraint::On(e)) => (Some(self.lower_expr(e)?), false, Vec::new()),
                Some(sql::JoinConstraint::Using(cols)) => {
                    (None, false, cols.iter().map(|c| c.value.clone()).collect())
                }
                Some(sql::JoinConstraint::Natural) => (None, true, Vec::new()),
            };
            node = Node::Join {
                left: Box::new(node),
                right: Box::new(right),
                kind,
                on,
                strategy: JoinStrategy::NestedLoop,
                natural,
                using,
            };
        }
        Ok(node)
    }

    fn plan_table_factor(&mut self, factor: &sql::TableFactor) -> Result<Node> {
        match factor {
            sql::TableFactor::Table { name, alias, .. } => {
                let (database, table_name) = split_object_name(name);
                let alias_name = alias.as_ref().map(|a| a.name.value.clone());

                // CTE names shadow real tables, innermost scope first.
                if database.is_none() {
                    let key = table_name.to_lowercase();
                    let binding = self
                        .cte_scopes
                        .iter()
                        .rev()
                        .find_map(|scope| scope.get(&key))
                        .cloned();
                    match binding {
                        Some(CteBinding::Planned { columns, node }) => {
                            return Ok(Node::SubqueryAlias {
                                name: alias_name.unwrap_or(table_name),
                                columns,
                                child: Box::new(node),
                            });
                        }
                        Some(CteBinding::Recursive(node)) => {
                            let node = match alias_name {
                                Some(alias) => Node::SubqueryAlias {
                                    name: alias,
                                    columns: Vec::new(),
                                    child: Box::new(node),
                                },
                                None => node,
                            };
                            return Ok(node);
                        }
                        Some(CteBinding::RecursiveMarker) => {
                            self.used_recursive.insert(key.clone());
                            return Ok(Node::RecursiveTableRef {
                                name: table_name,
                                schema: Schema::empty(),
                            });
                        }
                        None => {}
                    }
                }

                Ok(Node::UnresolvedTable { database, name: table_name, alias: alias_name })
            }
            sql::TableFactor::Derived { subquery, alias, .. } => {
                let node = self.plan_query(subquery)?;
                let alias = alias
                    .as_ref()
                    .ok_or_else(|| Error::SyntaxError("every derived table must have its own alias".into()))?;
                Ok(Node::SubqueryAlias {
                    name: alias.name.value.clone(),
                    columns: alias.columns.iter().map(|c| c.to_string()).collect(),
                    child: Box::new(node),
                })
            }
            sql::TableFactor::NestedJoin { table_with_joins, alias } => {
                let node = self.plan_table_with_joins(table_with_joins)?;
                Ok(match alias {
                    Some(alias) => Node::SubqueryAlias {
                        name: alias.name.value.clone(),
                        columns: Vec::new(),
                        child: Box::new(node),
                    },
                    None => node,
                })
            }
            other => Err(Error::UnsupportedFeature(format!("table factor {}", other))),
        }
    }
}

/// One empty row: the FROM-less SELECT source.
pub(crate) fn single_row() -> Node {
    Node::Values { rows: vec![Vec::new()], schema: Schema::empty() }
}

/// Flattens a tree of UNIONs into its legs, left to right.
fn flatten_union<'a>(body: &'a sql::SetExpr, legs: &mut Vec<&'a sql::SetExpr>, distinct: &mut bool) -> Result<()> {
    match body {
        sql::SetExpr::SetOperation { op: sql::SetOperator::Union, set_quantifier, left, right } => {
            if !matches!(set_quantifier, sql::SetQuantifier::All | sql::SetQuantifier::AllByName) {
                *distinct = true;
            }
            flatten_union(left, legs, distinct)?;
            flatten_union(right, legs, distinct)?;
            Ok(())
        }
        other => {
            legs.push(other);
            Ok(())
        }
    }
}
