//! Core query shapes: literal selects, filters, projection, ordering,
//! limits, distinct and unions.

mod common;

use common::{i, null, s, setup_test, TableBuilder};
use rowmill::Value;

#[test]
fn literal_select_produces_one_row() {
    let ctx = setup_test();
    ctx.assert_rows("SELECT 1", vec![vec![i(1)]]);
    ctx.assert_rows("SELECT 1 + 2 * 3, 'x'", vec![vec![i(7), s("x")]]);
}

#[test]
fn where_filters_and_null_drops() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "t")
        .create("a BIGINT, b BIGINT")
        .insert_values("(1, 10), (2, NULL), (3, 30)");

    ctx.assert_rows("SELECT a FROM t WHERE b > 5", vec![vec![i(1)], vec![i(3)]]);
    // A NULL predicate is not true, so the row drops.
    ctx.assert_rows("SELECT a FROM t WHERE b = NULL", vec![]);
    ctx.assert_rows("SELECT a FROM t WHERE b <=> NULL", vec![vec![i(2)]]);
}

#[test]
fn order_by_with_nulls_first_on_asc() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "t")
        .create("a BIGINT, b BIGINT")
        .insert_values("(1, 10), (2, NULL), (3, 5)");

    ctx.assert_rows(
        "SELECT a FROM t ORDER BY b",
        vec![vec![i(2)], vec![i(3)], vec![i(1)]],
    );
    ctx.assert_rows(
        "SELECT a FROM t ORDER BY b DESC",
        vec![vec![i(1)], vec![i(3)], vec![i(2)]],
    );
}

#[test]
fn order_by_alias_ordinal_and_hidden_column() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "t")
        .create("a BIGINT, b BIGINT")
        .insert_values("(1, 30), (2, 20), (3, 10)");

    ctx.assert_rows("SELECT a AS x FROM t ORDER BY x DESC", vec![vec![i(3)], vec![i(2)], vec![i(1)]]);
    ctx.assert_rows("SELECT a FROM t ORDER BY 1 DESC", vec![vec![i(3)], vec![i(2)], vec![i(1)]]);
    // b is not projected; the sort still sees it.
    ctx.assert_rows("SELECT a FROM t ORDER BY b", vec![vec![i(3)], vec![i(2)], vec![i(1)]]);
}

#[test]
fn limit_and_offset() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "t")
        .create("a BIGINT")
        .insert_values("(1), (2), (3), (4), (5)");

    ctx.assert_rows("SELECT a FROM t ORDER BY a LIMIT 2", vec![vec![i(1)], vec![i(2)]]);
    ctx.assert_rows("SELECT a FROM t ORDER BY a LIMIT 2 OFFSET 3", vec![vec![i(4)], vec![i(5)]]);
    ctx.assert_rows("SELECT a FROM t ORDER BY a LIMIT 2 OFFSET 99", vec![]);
}

#[test]
fn distinct_dedups_typed_rows() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "t")
        .create("a BIGINT, b VARCHAR(10)")
        .insert_values("(1, 'x'), (1, 'x'), (1, 'y'), (NULL, 'x'), (NULL, 'x')");

    ctx.assert_rows(
        "SELECT DISTINCT a, b FROM t",
        vec![vec![i(1), s("x")], vec![i(1), s("y")], vec![null(), s("x")]],
    );
}

#[test]
fn union_all_and_distinct() {
    let ctx = setup_test();
    ctx.assert_rows(
        "SELECT 1 UNION ALL SELECT 1 UNION ALL SELECT 2",
        vec![vec![i(1)], vec![i(1)], vec![i(2)]],
    );
    ctx.assert_rows("SELECT 1 UNION SELECT 1 UNION SELECT 2", vec![vec![i(1)], vec![i(2)]]);
}

#[test]
fn order_by_binds_to_the_union() {
    let ctx = setup_test();
    ctx.assert_rows(
        "SELECT 2 AS n UNION ALL SELECT 1 ORDER BY n",
        vec![vec![i(1)], vec![i(2)]],
    );
}

#[test]
fn case_expressions() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "t")
        .create("a BIGINT")
        .insert_values("(1), (2), (3)");

    ctx.assert_rows(
        "SELECT CASE WHEN a = 1 THEN 'one' WHEN a = 2 THEN 'two' ELSE 'many' END FROM t ORDER BY a",
        vec![vec![s("one")], vec![s("two")], vec![s("many")]],
    );
    ctx.assert_rows(
        "SELECT CASE a WHEN 1 THEN 'one' ELSE 'other' END FROM t ORDER BY a",
        vec![vec![s("one")], vec![s("other")], vec![s("other")]],
    );
}

#[test]
fn between_and_in_lists() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "t")
        .create("a BIGINT")
        .insert_values("(1), (2), (3), (4)");

    ctx.assert_rows("SELECT a FROM t WHERE a BETWEEN 2 AND 3", vec![vec![i(2)], vec![i(3)]]);
    ctx.assert_rows("SELECT a FROM t WHERE a IN (1, 4)", vec![vec![i(1)], vec![i(4)]]);
    ctx.assert_rows("SELECT a FROM t WHERE a NOT IN (1, 2, 3)", vec![vec![i(4)]]);
}

#[test]
fn like_and_regexp() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "t")
        .create("v VARCHAR(20)")
        .insert_values("('first row'), ('second row'), ('third')");

    ctx.assert_rows("SELECT v FROM t WHERE v LIKE '%row'", vec![vec![s("first row")], vec![s("second row")]]);
    ctx.assert_rows("SELECT v FROM t WHERE v LIKE '_hird'", vec![vec![s("third")]]);
    ctx.assert_rows("SELECT v FROM t WHERE v REGEXP '^f'", vec![vec![s("first row")]]);
}

#[test]
fn division_by_zero_yields_null_and_warning() {
    let ctx = setup_test();
    ctx.assert_rows("SELECT 1 / 0", vec![vec![null()]]);
    let warnings = ctx.session.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("Division by 0"));
}

#[test]
fn found_rows_tracks_last_result() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "t")
        .create("a BIGINT")
        .insert_values("(1), (2), (3)");
    let _ = ctx.query("SELECT a FROM t WHERE a > 1");
    ctx.assert_rows("SELECT FOUND_ROWS()", vec![vec![Value::U64(2)]]);
}

#[test]
fn derived_tables_require_an_alias() {
    let ctx = setup_test();
    let err = ctx.query_err("SELECT * FROM (SELECT 1)");
    assert!(matches!(err, rowmill::Error::SyntaxError(_)));
    ctx.assert_rows("SELECT * FROM (SELECT 1 AS n) AS d", vec![vec![i(1)]]);
}
