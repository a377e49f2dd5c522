//! Aggregation: grand totals, GROUP BY, HAVING, ordinals and aliases.

mod common;

use common::{f, i, null, s, setup_test, TableBuilder};

fn mytable(ctx: &common::TestCtx) {
    TableBuilder::new(ctx, "mytable")
        .create("i BIGINT PRIMARY KEY, s VARCHAR(20)")
        .insert_values("(1, 'first row'), (2, 'second row'), (3, 'third row')");
}

#[test]
fn scalar_aggregation() {
    let ctx = setup_test();
    mytable(&ctx);
    ctx.assert_rows("SELECT SUM(i) FROM mytable", vec![vec![f(6.0)]]);
    ctx.assert_rows("SELECT COUNT(*) FROM mytable", vec![vec![i(3)]]);
    ctx.assert_rows("SELECT AVG(i) FROM mytable", vec![vec![f(2.0)]]);
    ctx.assert_rows("SELECT MIN(i), MAX(i) FROM mytable", vec![vec![i(1), i(3)]]);
}

#[test]
fn aggregates_over_empty_input_return_identities() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "empty").create("i BIGINT");
    ctx.assert_rows(
        "SELECT COUNT(*), SUM(i), AVG(i), MIN(i), MAX(i) FROM empty",
        vec![vec![i(0), null(), null(), null(), null()]],
    );
}

#[test]
fn aggregates_skip_nulls() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "t")
        .create("age BIGINT")
        .insert_values("(11), (90), (NULL), (3), (NULL)");
    ctx.assert_rows("SELECT SUM(age) FROM t", vec![vec![f(104.0)]]);
    ctx.assert_rows("SELECT COUNT(age), COUNT(*) FROM t", vec![vec![i(3), i(5)]]);
}

#[test]
fn group_by_with_having() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "orders")
        .create("customer VARCHAR(10), amount BIGINT")
        .insert_values("('a', 10), ('a', 20), ('b', 5), ('c', 1), ('c', 2)");

    ctx.assert_rows(
        "SELECT customer, SUM(amount) FROM orders GROUP BY customer HAVING SUM(amount) > 4 ORDER BY customer",
        vec![vec![s("a"), f(30.0)], vec![s("b"), f(5.0)]],
    );
}

#[test]
fn group_by_ordinal_and_alias() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "orders")
        .create("customer VARCHAR(10), amount BIGINT")
        .insert_values("('a', 10), ('a', 20), ('b', 5)");

    ctx.assert_rows(
        "SELECT customer AS c, COUNT(*) FROM orders GROUP BY c ORDER BY c",
        vec![vec![s("a"), i(2)], vec![s("b"), i(1)]],
    );
    ctx.assert_rows(
        "SELECT customer, COUNT(*) FROM orders GROUP BY 1 ORDER BY 1",
        vec![vec![s("a"), i(2)], vec![s("b"), i(1)]],
    );
}

#[test]
fn having_alias_works_where_alias_fails() {
    let ctx = setup_test();
    mytable(&ctx);
    // Projection aliases are visible to HAVING, never to WHERE.
    let err = ctx.query_err("SELECT i AS x FROM mytable WHERE x > 0");
    assert!(matches!(err, rowmill::Error::ColumnNotFound(ref name) if name == "x"), "got {:?}", err);
    ctx.assert_rows(
        "SELECT i AS x FROM mytable HAVING x > 1 ORDER BY x",
        vec![vec![i(2)], vec![i(3)]],
    );
}

#[test]
fn count_distinct() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "t")
        .create("a BIGINT")
        .insert_values("(1), (1), (2), (NULL)");
    ctx.assert_rows("SELECT COUNT(DISTINCT a) FROM t", vec![vec![i(2)]]);
    ctx.assert_rows("SELECT SUM(DISTINCT a) FROM t", vec![vec![f(3.0)]]);
}

#[test]
fn order_by_aggregate_not_in_projection() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "orders")
        .create("customer VARCHAR(10), amount BIGINT")
        .insert_values("('a', 1), ('b', 10), ('b', 10), ('c', 5)");

    ctx.assert_rows(
        "SELECT customer FROM orders GROUP BY customer ORDER BY SUM(amount) DESC",
        vec![vec![s("b")], vec![s("c")], vec![s("a")]],
    );
}

#[test]
fn aggregate_of_expression() {
    let ctx = setup_test();
    mytable(&ctx);
    ctx.assert_rows("SELECT SUM(i + 1) FROM mytable", vec![vec![f(9.0)]]);
    ctx.assert_rows("SELECT SUM(1 + 2) FROM mytable", vec![vec![f(9.0)]]);
}
