//! Common table expressions, recursive and plain.

mod common;

use common::{f, i, setup_test};
use rowmill::Error;

#[test]
fn recursive_counter_sums_to_55() {
    let ctx = setup_test();
    ctx.assert_rows(
        "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i + 1 <= 10) \
         SELECT SUM(i) FROM n",
        vec![vec![f(55.0)]],
    );
}

#[test]
fn recursive_cte_rows_in_production_order() {
    let ctx = setup_test();
    ctx.assert_rows(
        "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i + 1 <= 3) \
         SELECT i FROM n",
        vec![vec![i(1)], vec![i(2)], vec![i(3)]],
    );
}

#[test]
fn runaway_recursion_hits_the_limit() {
    let ctx = setup_test();
    let err = ctx.query_err(
        "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n) SELECT SUM(i) FROM n",
    );
    assert_eq!(err, Error::CteRecursionLimit("n".into()));
}

#[test]
fn recursion_limit_is_a_session_variable() {
    let ctx = setup_test();
    ctx.exec("SET cte_max_recursion_depth = 5");
    let err = ctx.query_err(
        "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 100) SELECT COUNT(*) FROM n",
    );
    assert_eq!(err, Error::CteRecursionLimit("n".into()));
}

#[test]
fn union_of_recursive_cte_with_scalar_select() {
    let ctx = setup_test();
    ctx.assert_rows(
        "WITH RECURSIVE a AS (SELECT 1 UNION ALL SELECT 2) SELECT * FROM a UNION SELECT 10",
        vec![vec![i(1)], vec![i(2)], vec![i(10)]],
    );
}

#[test]
fn recursive_union_distinct_reaches_fixpoint() {
    let ctx = setup_test();
    // UNION DISTINCT: re-produced rows do not feed another iteration, so
    // this terminates without hitting the depth limit.
    ctx.assert_rows(
        "WITH RECURSIVE n(i) AS (SELECT 1 UNION SELECT 1 + (i % 3) FROM n) SELECT COUNT(*) FROM n",
        vec![vec![i(3)]],
    );
}

#[test]
fn plain_cte_expands_like_a_derived_table() {
    let ctx = setup_test();
    common::TableBuilder::new(&ctx, "t")
        .create("a BIGINT")
        .insert_values("(1), (2), (3)");
    ctx.assert_rows(
        "WITH big(v) AS (SELECT a FROM t WHERE a > 1) SELECT v FROM big ORDER BY v",
        vec![vec![i(2)], vec![i(3)]],
    );
}

#[test]
fn cte_referenced_twice() {
    let ctx = setup_test();
    ctx.assert_rows(
        "WITH x(v) AS (SELECT 1 UNION ALL SELECT 2) \
         SELECT a.v, b.v FROM x a JOIN x b ON a.v = b.v ORDER BY a.v",
        vec![vec![i(1), i(1)], vec![i(2), i(2)]],
    );
}
