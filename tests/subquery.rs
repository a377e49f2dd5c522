//! Subqueries: scalar, correlated, IN/EXISTS, NULL semantics and operand
//! arity.

mod common;

use common::{i, null, setup_test, TableBuilder};
use rowmill::Error;

fn one_pk(ctx: &common::TestCtx) {
    TableBuilder::new(ctx, "one_pk")
        .create("pk BIGINT PRIMARY KEY")
        .insert_values("(0), (1), (2), (3)");
}

#[test]
fn correlated_scalar_subquery() {
    let ctx = setup_test();
    one_pk(&ctx);
    ctx.assert_rows(
        "SELECT pk, (SELECT max(pk) FROM one_pk WHERE pk < opk.pk) FROM one_pk opk ORDER BY 1",
        vec![
            vec![i(0), null()],
            vec![i(1), i(0)],
            vec![i(2), i(1)],
            vec![i(3), i(2)],
        ],
    );
}

#[test]
fn uncorrelated_scalar_subquery() {
    let ctx = setup_test();
    one_pk(&ctx);
    ctx.assert_rows(
        "SELECT pk FROM one_pk WHERE pk = (SELECT max(pk) FROM one_pk) - 3",
        vec![vec![i(0)]],
    );
}

#[test]
fn scalar_subquery_with_no_rows_is_null() {
    let ctx = setup_test();
    one_pk(&ctx);
    ctx.assert_rows("SELECT (SELECT pk FROM one_pk WHERE pk > 99)", vec![vec![null()]]);
}

#[test]
fn scalar_subquery_with_many_rows_errors() {
    let ctx = setup_test();
    one_pk(&ctx);
    let err = ctx.query_err("SELECT (SELECT pk FROM one_pk)");
    assert!(matches!(err, Error::InvalidValue(_)));
}

#[test]
fn in_subquery_null_semantics() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "vals")
        .create("v BIGINT")
        .insert_values("(1), (NULL)");
    // Hit: true even with a NULL in the set.
    ctx.assert_rows("SELECT 1 IN (SELECT v FROM vals)", vec![vec![i(1)]]);
    // Miss against a set containing NULL: NULL, not false.
    ctx.assert_rows("SELECT 9 IN (SELECT v FROM vals)", vec![vec![null()]]);
    ctx.assert_rows("SELECT 9 NOT IN (SELECT v FROM vals)", vec![vec![null()]]);
    // Miss against a NULL-free set: false.
    ctx.assert_rows("SELECT 9 IN (SELECT v FROM vals WHERE v IS NOT NULL)", vec![vec![i(0)]]);
}

#[test]
fn exists_subquery() {
    let ctx = setup_test();
    one_pk(&ctx);
    ctx.assert_rows(
        "SELECT pk FROM one_pk opk WHERE EXISTS (SELECT 1 FROM one_pk WHERE pk > opk.pk) ORDER BY pk",
        vec![vec![i(0)], vec![i(1)], vec![i(2)]],
    );
    ctx.assert_rows("SELECT EXISTS (SELECT 1 FROM one_pk WHERE pk > 99)", vec![vec![i(0)]]);
}

#[test]
fn in_subquery_arity_mismatch_errors() {
    let ctx = setup_test();
    one_pk(&ctx);
    let err = ctx.query_err("SELECT (1, 2) IN (SELECT pk FROM one_pk)");
    assert_eq!(err, Error::InvalidOperandColumns { expected: 2, actual: 1 });
}

#[test]
fn subquery_in_from_resolves_through_alias() {
    let ctx = setup_test();
    one_pk(&ctx);
    ctx.assert_rows(
        "SELECT d.pk FROM (SELECT pk FROM one_pk WHERE pk > 1) AS d ORDER BY d.pk",
        vec![vec![i(2)], vec![i(3)]],
    );
}

#[test]
fn correlated_subquery_two_levels_deep() {
    let ctx = setup_test();
    one_pk(&ctx);
    // The innermost subquery reaches past one subquery boundary to the
    // outermost table.
    ctx.assert_rows(
        "SELECT pk, (SELECT (SELECT min(pk) FROM one_pk WHERE pk > opk.pk)) FROM one_pk opk ORDER BY 1",
        vec![
            vec![i(0), i(1)],
            vec![i(1), i(2)],
            vec![i(2), i(3)],
            vec![i(3), null()],
        ],
    );
}
