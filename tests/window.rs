//! Window functions: numbering, ranks, offsets and framed aggregates.

mod common;

use common::{f, i, null, s, setup_test, TableBuilder};

fn mytable(ctx: &common::TestCtx) {
    TableBuilder::new(ctx, "mytable")
        .create("i BIGINT PRIMARY KEY, s VARCHAR(20)")
        .insert_values("(1, 'first row'), (2, 'second row'), (3, 'third row')");
}

#[test]
fn row_number_over_descending_order() {
    let ctx = setup_test();
    mytable(&ctx);
    ctx.assert_rows(
        "SELECT i, ROW_NUMBER() OVER (ORDER BY i DESC) FROM mytable ORDER BY i",
        vec![vec![i(1), i(3)], vec![i(2), i(2)], vec![i(3), i(1)]],
    );
}

fn scores(ctx: &common::TestCtx) {
    TableBuilder::new(ctx, "scores")
        .create("team VARCHAR(4), score BIGINT")
        .insert_values("('a', 10), ('a', 20), ('a', 20), ('b', 5), ('b', 7)");
}

#[test]
fn rank_and_dense_rank_with_ties() {
    let ctx = setup_test();
    scores(&ctx);
    ctx.assert_rows(
        "SELECT team, score, RANK() OVER (PARTITION BY team ORDER BY score DESC), \
                DENSE_RANK() OVER (PARTITION BY team ORDER BY score DESC) \
         FROM scores ORDER BY team, score DESC",
        vec![
            vec![s("a"), i(20), i(1), i(1)],
            vec![s("a"), i(20), i(1), i(1)],
            vec![s("a"), i(10), i(3), i(2)],
            vec![s("b"), i(7), i(1), i(1)],
            vec![s("b"), i(5), i(2), i(2)],
        ],
    );
}

#[test]
fn percent_rank() {
    let ctx = setup_test();
    mytable(&ctx);
    ctx.assert_rows(
        "SELECT i, PERCENT_RANK() OVER (ORDER BY i) FROM mytable ORDER BY i",
        vec![vec![i(1), f(0.0)], vec![i(2), f(0.5)], vec![i(3), f(1.0)]],
    );
}

#[test]
fn lag_and_lead() {
    let ctx = setup_test();
    mytable(&ctx);
    ctx.assert_rows(
        "SELECT i, LAG(i, 1) OVER (ORDER BY i), LEAD(i, 1) OVER (ORDER BY i) FROM mytable ORDER BY i",
        vec![
            vec![i(1), null(), i(2)],
            vec![i(2), i(1), i(3)],
            vec![i(3), i(2), null()],
        ],
    );
    ctx.assert_rows(
        "SELECT i, LAG(i, 1, -1) OVER (ORDER BY i) FROM mytable ORDER BY i",
        vec![vec![i(1), i(-1)], vec![i(2), i(1)], vec![i(3), i(2)]],
    );
}

#[test]
fn first_and_last_value_default_frame() {
    let ctx = setup_test();
    mytable(&ctx);
    // The default frame with ORDER BY runs to the current row's peers, so
    // LAST_VALUE sees itself.
    ctx.assert_rows(
        "SELECT i, FIRST_VALUE(i) OVER (ORDER BY i), LAST_VALUE(i) OVER (ORDER BY i) FROM mytable ORDER BY i",
        vec![
            vec![i(1), i(1), i(1)],
            vec![i(2), i(1), i(2)],
            vec![i(3), i(1), i(3)],
        ],
    );
}

#[test]
fn running_sum_and_whole_partition_frame() {
    let ctx = setup_test();
    mytable(&ctx);
    ctx.assert_rows(
        "SELECT i, SUM(i) OVER (ORDER BY i) FROM mytable ORDER BY i",
        vec![vec![i(1), f(1.0)], vec![i(2), f(3.0)], vec![i(3), f(6.0)]],
    );
    ctx.assert_rows(
        "SELECT i, SUM(i) OVER (ORDER BY i ROWS BETWEEN UNBOUNDED PRECEDING AND UNBOUNDED FOLLOWING) \
         FROM mytable ORDER BY i",
        vec![vec![i(1), f(6.0)], vec![i(2), f(6.0)], vec![i(3), f(6.0)]],
    );
}

#[test]
fn sliding_rows_frame() {
    let ctx = setup_test();
    mytable(&ctx);
    ctx.assert_rows(
        "SELECT i, SUM(i) OVER (ORDER BY i ROWS BETWEEN 1 PRECEDING AND 1 FOLLOWING) \
         FROM mytable ORDER BY i",
        vec![vec![i(1), f(3.0)], vec![i(2), f(6.0)], vec![i(3), f(5.0)]],
    );
}

#[test]
fn partitioned_aggregate_window() {
    let ctx = setup_test();
    scores(&ctx);
    ctx.assert_rows(
        "SELECT team, score, SUM(score) OVER (PARTITION BY team) FROM scores ORDER BY team, score",
        vec![
            vec![s("a"), i(10), f(50.0)],
            vec![s("a"), i(20), f(50.0)],
            vec![s("a"), i(20), f(50.0)],
            vec![s("b"), i(5), f(12.0)],
            vec![s("b"), i(7), f(12.0)],
        ],
    );
}
