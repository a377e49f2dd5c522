//! Analyzer-level invariants: idempotence, resolution errors, typed
//! comparison coercions and NULL propagation laws.

mod common;

use common::{i, null, setup_test, TableBuilder};
use rowmill::analyzer::{analyze, AnalyzerCtx};
use rowmill::planning::Planner;
use rowmill::Error;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

fn seed(ctx: &common::TestCtx) {
    TableBuilder::new(ctx, "t")
        .create("a BIGINT, b BIGINT, v VARCHAR(20)")
        .insert_values("(1, 10, 'x'), (2, 20, 'y')");
    TableBuilder::new(ctx, "u")
        .create("a BIGINT, c BIGINT, INDEX a_idx (a)")
        .insert_values("(1, 100), (2, 200)");
}

fn analyzed(ctx: &common::TestCtx, sql: &str) -> rowmill::plan::Plan {
    let statements = Parser::parse_sql(&MySqlDialect {}, sql).expect("parse");
    let state = ctx.session.state().clone();
    let mut planner = Planner::new(&state, ctx.engine.catalog());
    let plan = planner.plan_statement(&statements[0]).expect("plan");
    let mut actx = AnalyzerCtx::new(&state, ctx.engine.catalog());
    analyze(&mut actx, plan).expect("analyze")
}

#[test]
fn analysis_is_idempotent() {
    let ctx = setup_test();
    seed(&ctx);
    let queries = [
        "SELECT a, b FROM t WHERE a > 1 ORDER BY b LIMIT 2",
        "SELECT v, SUM(b) FROM t GROUP BY v HAVING SUM(b) > 5 ORDER BY v",
        "SELECT t.a, c FROM t JOIN u ON t.a = u.a WHERE c > 50",
        "SELECT a, (SELECT max(c) FROM u WHERE u.a < t.a) FROM t ORDER BY 1",
        "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 5) SELECT SUM(i) FROM n",
        "INSERT INTO t (a) SELECT a FROM u",
        "SELECT a, ROW_NUMBER() OVER (PARTITION BY v ORDER BY b) FROM t",
    ];
    for sql in queries {
        let once = analyzed(&ctx, sql);
        let state = ctx.session.state().clone();
        let mut actx = AnalyzerCtx::new(&state, ctx.engine.catalog());
        let twice = analyze(&mut actx, once.clone()).expect("re-analyze");
        assert_eq!(once, twice, "analysis not idempotent for {:?}", sql);
    }
}

#[test]
fn unknown_names_error_with_the_right_kinds() {
    let ctx = setup_test();
    seed(&ctx);
    assert_eq!(ctx.query_err("SELECT nope FROM t"), Error::ColumnNotFound("nope".into()));
    assert_eq!(
        ctx.query_err("SELECT t.nope FROM t"),
        Error::TableColumnNotFound { table: "t".into(), column: "nope".into() }
    );
    assert_eq!(ctx.query_err("SELECT * FROM missing"), Error::TableNotFound("missing".into()));
    assert!(matches!(ctx.query_err("SELECT NOPE_FN(1)"), Error::FunctionNotFound(_)));
}

#[test]
fn null_propagation_laws() {
    let ctx = setup_test();
    // x = NULL is NULL, never false.
    ctx.assert_rows("SELECT 1 = NULL", vec![vec![null()]]);
    ctx.assert_rows("SELECT NULL = NULL", vec![vec![null()]]);
    // <=> is boolean.
    ctx.assert_rows("SELECT 1 <=> NULL, NULL <=> NULL", vec![vec![i(0), i(1)]]);
    // IN with NULL: hit is true, miss is NULL.
    ctx.assert_rows("SELECT 1 IN (1, NULL)", vec![vec![i(1)]]);
    ctx.assert_rows("SELECT 9 IN (1, NULL)", vec![vec![null()]]);
}

#[test]
fn tuple_comparisons() {
    let ctx = setup_test();
    ctx.assert_rows("SELECT (1, 2) = (1, 2)", vec![vec![i(1)]]);
    ctx.assert_rows("SELECT (1, 2) < (1, 3)", vec![vec![i(1)]]);
    ctx.assert_rows("SELECT (1, NULL) = (1, 2)", vec![vec![null()]]);
    ctx.assert_rows("SELECT (1, NULL) = (2, 2)", vec![vec![i(0)]]);
    let err = ctx.query_err("SELECT (1, 2) = (1, 2, 3)");
    assert!(matches!(err, Error::InvalidOperandColumns { .. }), "got {:?}", err);
}

#[test]
fn comparison_coercion_families() {
    let ctx = setup_test();
    // Number vs string compares numerically.
    ctx.assert_rows("SELECT 20 = '20a'", vec![vec![i(1)]]);
    ctx.assert_rows("SELECT '5' < 40", vec![vec![i(1)]]);
    // Date vs string compares as dates.
    ctx.assert_rows("SELECT DATE('2024-03-01') = '2024-03-01'", vec![vec![i(1)]]);
    ctx.assert_rows("SELECT DATE('2024-03-01') < '2024-03-02'", vec![vec![i(1)]]);
}

#[test]
fn index_ranges_are_selected_for_sargable_filters() {
    let ctx = setup_test();
    seed(&ctx);
    let plan: Vec<String> = ctx
        .query("EXPLAIN SELECT c FROM u WHERE a = 1")
        .into_iter()
        .map(|r| r[0].to_string())
        .collect();
    assert!(
        plan.iter().any(|l| l.contains("IndexedTableAccess")),
        "no index access in:\n{}",
        plan.join("\n")
    );
    // Residual predicates still filter above the access.
    ctx.assert_rows("SELECT c FROM u WHERE a = 1 AND c > 99", vec![vec![i(100)]]);
    ctx.assert_rows("SELECT c FROM u WHERE a = 1 AND c > 150", vec![]);
    // Range shapes use the index too.
    ctx.assert_rows("SELECT c FROM u WHERE a > 1 ORDER BY c", vec![vec![i(200)]]);
}

#[test]
fn constant_folding_prunes_dead_branches() {
    let ctx = setup_test();
    seed(&ctx);
    let plan: Vec<String> = ctx
        .query("EXPLAIN SELECT a FROM t WHERE 1 = 0")
        .into_iter()
        .map(|r| r[0].to_string())
        .collect();
    assert!(plan.iter().any(|l| l.contains("Nothing")), "plan:\n{}", plan.join("\n"));
    ctx.assert_rows("SELECT a FROM t WHERE 1 = 0", vec![]);
    // A tautology disappears entirely.
    let plan: Vec<String> = ctx
        .query("EXPLAIN SELECT a FROM t WHERE 1 = 1")
        .into_iter()
        .map(|r| r[0].to_string())
        .collect();
    assert!(!plan.iter().any(|l| l.contains("Filter")), "plan:\n{}", plan.join("\n"));
}

#[test]
fn volatile_functions_do_not_fold() {
    let ctx = setup_test();
    seed(&ctx);
    let plan: Vec<String> = ctx
        .query("EXPLAIN SELECT a FROM t WHERE RAND() < 2")
        .into_iter()
        .map(|r| r[0].to_string())
        .collect();
    assert!(plan.iter().any(|l| l.contains("Filter")), "plan:\n{}", plan.join("\n"));
}
