//! The analyzer: a fixed-point rewriter that turns an unresolved plan into
//! a fully-typed, executable one.
//!
//! Rules are grouped into ordered batches. The driver applies every rule of
//! a batch in order; when any rule changes the tree it restarts the batch,
//! and a batch ends after one full pass with no change. A global iteration
//! cap guards against rules that keep toggling. A `RuleSelector` narrows
//! the set for INSERT sources and prepared-statement re-binding.

mod aggregates;
mod casts;
mod dml;
mod expand;
mod indexes;
mod joins;
mod pushdown;
mod resolve_columns;
mod resolve_tables;
mod simplify;
mod sorts;
mod validate;
mod windows;

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::plan::{Node, Plan};
use crate::session::Session;
use crate::types::schema::Schema;
use std::cell::Cell;

/// How many batch restarts one analysis may spend before giving up.
const MAX_ITERATIONS: usize = 256;

/// Which rule set applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSelector {
    /// Top-level queries: everything.
    Default,
    /// INSERT source subtrees: resolution and rewriting, but no access-path
    /// planning; the destination shape drives the plan.
    InsertSource,
    /// Prepared-statement re-binding: let defaults and types resettle
    /// against bound values without redoing access planning.
    Prepared,
}

impl RuleSelector {
    fn includes(&self, batch: &str) -> bool {
        match self {
            RuleSelector::Default => true,
            RuleSelector::InsertSource | RuleSelector::Prepared => batch != "access",
        }
    }
}

/// The scope stack visible to name resolution: the input schemas of every
/// enclosing operator, nearest first (outermost last). Every entry carries
/// the correlation flag of the subquery boundary that pushed it; a lookup
/// that crosses k boundaries marks all k, which is how nested subqueries
/// learn they are correlated even when only an inner level references the
/// outer query.
pub struct Scope {
    pub outer: Vec<Schema>,
    flags: Vec<std::rc::Rc<Cell<bool>>>,
}

impl Scope {
    pub fn empty() -> Scope {
        Scope { outer: Vec::new(), flags: Vec::new() }
    }

    /// A subquery's scope: the enclosing operator's input schema in front
    /// of everything already visible.
    pub fn child(&self, input: Schema) -> Scope {
        let mut outer = Vec::with_capacity(self.outer.len() + 1);
        outer.push(input);
        outer.extend(self.outer.iter().cloned());
        let mut flags = Vec::with_capacity(self.flags.len() + 1);
        flags.push(std::rc::Rc::new(Cell::new(false)));
        flags.extend(self.flags.iter().cloned());
        Scope { outer, flags }
    }

    /// Whether resolution crossed this scope's own boundary.
    pub fn used_outer(&self) -> bool {
        self.flags.first().map(|f| f.get()).unwrap_or(false)
    }

    /// Looks a name up across the stack. The returned index is relative to
    /// the start of the flattened outer row; callers add their input width.
    pub fn resolve(&self, table: Option<&str>, name: &str) -> Result<Option<(usize, crate::types::schema::Column)>> {
        let mut offset = 0;
        for (level, schema) in self.outer.iter().enumerate() {
            if let Some(i) = schema.resolve(table, name)? {
                for flag in self.flags.iter().take(level + 1) {
                    flag.set(true);
                }
                return Ok(Some((offset + i, schema.0[i].clone())));
            }
            offset += schema.len();
        }
        Ok(None)
    }
}

pub struct AnalyzerCtx<'a> {
    pub session: &'a Session,
    pub catalog: &'a Catalog,
    /// Table names from a `/*+ JOIN_ORDER(a,b) */` hint, if one was given.
    pub join_order_hint: Option<Vec<String>>,
    next_cache_id: usize,
}

impl<'a> AnalyzerCtx<'a> {
    pub fn new(session: &'a Session, catalog: &'a Catalog) -> AnalyzerCtx<'a> {
        AnalyzerCtx { session, catalog, join_order_hint: None, next_cache_id: 0 }
    }

    pub(crate) fn next_subquery_cache_id(&mut self) -> usize {
        let id = self.next_cache_id;
        self.next_cache_id += 1;
        id
    }

    pub fn default_database(&self, database: Option<&str>) -> String {
        database
            .map(|d| d.to_string())
            .unwrap_or_else(|| self.session.current_database())
    }
}

type NodeRule = fn(&mut AnalyzerCtx, Node, &Scope, RuleSelector) -> Result<(Node, bool)>;

struct Batch {
    name: &'static str,
    rules: &'static [(&'static str, NodeRule)],
}

const BATCHES: &[Batch] = &[
    Batch {
        name: "resolution",
        rules: &[
            ("expand_views", resolve_tables::expand_views),
            ("resolve_tables", resolve_tables::resolve_tables),
            ("check_duplicate_aliases", resolve_tables::check_duplicate_aliases),
        ],
    },
    Batch {
        name: "expansion",
        rules: &[
            // Join expansion first: `*` must see the deduplicated schema.
            ("expand_natural_joins", expand::expand_natural_joins),
            ("expand_stars", expand::expand_stars),
        ],
    },
    Batch {
        name: "operators",
        rules: &[
            ("plan_aggregates", aggregates::plan_aggregates),
            ("plan_windows", windows::plan_windows),
        ],
    },
    Batch {
        name: "names",
        rules: &[
            ("resolve_columns", resolve_columns::resolve_columns),
            ("resolve_sorts", sorts::resolve_sorts),
        ],
    },
    Batch {
        name: "types",
        rules: &[("insert_casts", casts::insert_casts)],
    },
    Batch {
        name: "simplification",
        rules: &[
            ("fold_constants", simplify::fold_constants),
            ("simplify_predicates", simplify::simplify_predicates),
            ("prune_filters", simplify::prune_filters),
            ("pushdown_filters", pushdown::pushdown_filters),
        ],
    },
    Batch {
        name: "access",
        rules: &[
            ("apply_join_order_hint", joins::apply_join_order_hint),
            ("choose_join_strategy", joins::choose_join_strategy),
            ("select_indexes", indexes::select_indexes),
        ],
    },
    Batch {
        name: "finalize",
        rules: &[("validate", validate::validate)],
    },
];

/// Runs the batch list over one relational tree.
pub fn analyze_node(
    ctx: &mut AnalyzerCtx,
    mut node: Node,
    scope: &Scope,
    selector: RuleSelector,
) -> Result<Node> {
    let mut iterations = 0;
    for batch in BATCHES {
        if !selector.includes(batch.name) {
            continue;
        }
        loop {
            let mut changed_in_pass = false;
            for (rule_name, rule) in batch.rules {
                let (next, changed) = rule(ctx, node, scope, selector)?;
                node = next;
                if changed {
                    tracing::trace!(batch = batch.name, rule = %rule_name, "rule changed plan");
                    changed_in_pass = true;
                }
            }
            if !changed_in_pass {
                break;
            }
            iterations += 1;
            if iterations > MAX_ITERATIONS {
                return Err(Error::AnalyzerFixpoint(batch.name.to_string()));
            }
        }
    }
    Ok(node)
}

/// Analyzes a whole statement: resolves DML shells, then runs the node
/// batches over every contained relational tree.
pub fn analyze(ctx: &mut AnalyzerCtx, plan: Plan) -> Result<Plan> {
    analyze_with_selector(ctx, plan, RuleSelector::Default)
}

pub fn analyze_with_selector(ctx: &mut AnalyzerCtx, plan: Plan, selector: RuleSelector) -> Result<Plan> {
    let scope = Scope::empty();
    match plan {
        Plan::Select(node) => Ok(Plan::Select(analyze_node(ctx, node, &scope, selector)?)),
        Plan::Insert(insert) => dml::analyze_insert(ctx, *insert, selector).map(|p| Plan::Insert(Box::new(p))),
        Plan::Update(update) => dml::analyze_update(ctx, *update, selector).map(|p| Plan::Update(Box::new(p))),
        Plan::Delete(delete) => dml::analyze_delete(ctx, *delete, selector).map(|p| Plan::Delete(Box::new(p))),
        Plan::Explain(inner) => Ok(Plan::Explain(Box::new(analyze_with_selector(ctx, *inner, selector)?))),
        Plan::Block(items) => Ok(Plan::Block(
            items
                .into_iter()
                .map(|p| analyze_with_selector(ctx, p, selector))
                .collect::<Result<_>>()?,
        )),
        // DDL, SET, USE and friends carry no relational trees to rewrite.
        other => Ok(other),
    }
}
