//! Joins: inner/left/right semantics, NATURAL and USING dedup, strategy
//! upgrades, hints and ambiguity errors.

mod common;

use common::{i, null, s, setup_test, TableBuilder};
use rowmill::Error;

fn setup_pair(ctx: &common::TestCtx) {
    TableBuilder::new(ctx, "l")
        .create("id BIGINT, lv VARCHAR(10)")
        .insert_values("(1, 'a'), (2, 'b'), (3, 'c')");
    TableBuilder::new(ctx, "r")
        .create("id BIGINT, rv VARCHAR(10)")
        .insert_values("(2, 'x'), (3, 'y'), (4, 'z')");
}

#[test]
fn inner_join_on_equality() {
    let ctx = setup_test();
    setup_pair(&ctx);
    ctx.assert_rows(
        "SELECT l.id, lv, rv FROM l JOIN r ON l.id = r.id ORDER BY l.id",
        vec![vec![i(2), s("b"), s("x")], vec![i(3), s("c"), s("y")]],
    );
}

#[test]
fn left_join_pads_with_null() {
    let ctx = setup_test();
    setup_pair(&ctx);
    ctx.assert_rows(
        "SELECT l.id, rv FROM l LEFT JOIN r ON l.id = r.id ORDER BY l.id",
        vec![vec![i(1), null()], vec![i(2), s("x")], vec![i(3), s("y")]],
    );
}

#[test]
fn right_join_pads_with_null() {
    let ctx = setup_test();
    setup_pair(&ctx);
    ctx.assert_rows(
        "SELECT r.id, lv FROM l RIGHT JOIN r ON l.id = r.id ORDER BY r.id",
        vec![vec![i(2), s("b")], vec![i(3), s("c")], vec![i(4), null()]],
    );
}

#[test]
fn cross_join_is_a_product() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "a").create("x BIGINT").insert_values("(1), (2)");
    TableBuilder::new(&ctx, "b").create("y BIGINT").insert_values("(10), (20)");
    let rows = ctx.query("SELECT x, y FROM a, b ORDER BY x, y");
    assert_eq!(rows.len(), 4);
}

#[test]
fn using_join_deduplicates_the_shared_column() {
    let ctx = setup_test();
    setup_pair(&ctx);
    let result = ctx.session.query("SELECT * FROM l JOIN r USING (id) ORDER BY id").unwrap();
    assert_eq!(result.schema.column_names(), vec!["id", "lv", "rv"]);
    let rows = result.collect().unwrap();
    assert_eq!(rows, vec![vec![i(2), s("b"), s("x")], vec![i(3), s("c"), s("y")]]);
}

#[test]
fn natural_join_matches_shared_names() {
    let ctx = setup_test();
    setup_pair(&ctx);
    let result = ctx.session.query("SELECT * FROM l NATURAL JOIN r ORDER BY id").unwrap();
    assert_eq!(result.schema.column_names(), vec!["id", "lv", "rv"]);
    assert_eq!(result.collect().unwrap().len(), 2);
}

#[test]
fn duplicate_alias_in_from_errors() {
    let ctx = setup_test();
    setup_pair(&ctx);
    assert_eq!(
        ctx.query_err("SELECT * FROM l JOIN l ON 1 = 1"),
        Error::DuplicateAliasOrTable("l".into())
    );
    assert_eq!(
        ctx.query_err("SELECT * FROM l a JOIN r a ON 1 = 1"),
        Error::DuplicateAliasOrTable("a".into())
    );
    // Distinct aliases make a self join fine.
    let rows = ctx.query("SELECT a.id FROM l a JOIN l b ON a.id = b.id");
    assert_eq!(rows.len(), 3);
}

#[test]
fn ambiguous_column_errors() {
    let ctx = setup_test();
    setup_pair(&ctx);
    assert_eq!(
        ctx.query_err("SELECT id FROM l JOIN r ON l.id = r.id"),
        Error::AmbiguousColumn("id".into())
    );
}

#[test]
fn index_backed_join_matches_nested_loop_results() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "orders")
        .create("id BIGINT PRIMARY KEY, customer_id BIGINT")
        .insert_values("(1, 10), (2, 20), (3, 10), (4, 30)");
    ctx.exec("CREATE TABLE customers (customer_id BIGINT, name VARCHAR(10), INDEX cid (customer_id))");
    ctx.exec("INSERT INTO customers VALUES (10, 'ten'), (20, 'twenty')");

    ctx.assert_rows(
        "SELECT o.id, c.name FROM orders o JOIN customers c ON o.customer_id = c.customer_id ORDER BY o.id",
        vec![vec![i(1), s("ten")], vec![i(2), s("twenty")], vec![i(3), s("ten")]],
    );
    // The plan should actually use the index.
    let plan: Vec<String> = ctx
        .query("EXPLAIN SELECT o.id, c.name FROM orders o JOIN customers c ON o.customer_id = c.customer_id")
        .into_iter()
        .map(|r| r[0].to_string())
        .collect();
    assert!(plan.iter().any(|line| line.contains("[index]")), "plan was:\n{}", plan.join("\n"));
}

#[test]
fn join_order_hint_reorders_without_changing_results() {
    let ctx = setup_test();
    setup_pair(&ctx);
    let hinted = ctx.query(
        "SELECT /*+ JOIN_ORDER(r, l) */ l.id, rv FROM l JOIN r ON l.id = r.id ORDER BY l.id",
    );
    let plain = ctx.query("SELECT l.id, rv FROM l JOIN r ON l.id = r.id ORDER BY l.id");
    assert_eq!(hinted, plain);

    let plan: Vec<String> = ctx
        .query("EXPLAIN SELECT /*+ JOIN_ORDER(r, l) */ lv FROM l JOIN r ON l.id = r.id")
        .into_iter()
        .map(|r| r[0].to_string())
        .collect();
    let l_line = plan.iter().position(|p| p.contains("Table(l)"));
    let r_line = plan.iter().position(|p| p.contains("Table(r)"));
    assert!(r_line < l_line, "hint did not reorder:\n{}", plan.join("\n"));
}

#[test]
fn filter_pushes_below_the_join() {
    let ctx = setup_test();
    setup_pair(&ctx);
    ctx.assert_rows(
        "SELECT l.id, rv FROM l JOIN r ON l.id = r.id WHERE lv = 'b'",
        vec![vec![i(2), s("x")]],
    );
}
