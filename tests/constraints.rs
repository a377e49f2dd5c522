//! Type and constraint behavior: index prefixes, enum/set domains,
//! decimal arithmetic rules, SRID validation and strict-mode division.

mod common;

use common::{i, null, s, setup_test, TableBuilder};
use rowmill::catalog::Database;
use rowmill::types::schema::{Column, IndexColumn, IndexDef, Schema, TableDef};
use rowmill::types::spatial::Geometry;
use rowmill::{DataType, Error, Value};
use rust_decimal::Decimal;

#[test]
fn unique_prefix_index_compares_truncated_keys() {
    let ctx = setup_test();
    let def = TableDef::new(
        "t",
        Schema::new(vec![Column::new("v", DataType::varchar(10)), Column::new("n", DataType::bigint())]),
    )
    .with_index(IndexDef {
        name: "v_prefix".into(),
        unique: true,
        columns: vec![IndexColumn { name: "v".into(), prefix: Some(3) }],
    });
    ctx.add_table(def, vec![]);

    ctx.exec("INSERT INTO t VALUES ('abcdef', 1)");
    // Shares the first three characters: rejected.
    let err = ctx.exec_err("INSERT INTO t VALUES ('abcxyz', 2)");
    assert!(matches!(err, Error::UniqueKeyViolation(_)));
    // Differs within the prefix: accepted.
    ctx.exec("INSERT INTO t VALUES ('abd000', 3)");
    ctx.assert_rows("SELECT COUNT(*) FROM t", vec![vec![i(2)]]);
}

#[test]
fn prefix_lengths_only_apply_to_text_and_binary() {
    let def = TableDef::new("t", Schema::new(vec![Column::new("n", DataType::bigint())])).with_index(IndexDef {
        name: "bad".into(),
        unique: false,
        columns: vec![IndexColumn { name: "n".into(), prefix: Some(3) }],
    });
    assert!(matches!(def.validate_indexes(), Err(Error::InvalidIndexPrefix { .. })));
}

#[test]
fn enum_and_set_domains() {
    let ctx = setup_test();
    let collation = Default::default();
    let def = TableDef::new(
        "shirts",
        Schema::new(vec![
            Column::new(
                "size",
                DataType::Enum {
                    values: vec!["small".into(), "medium".into(), "large".into()],
                    collation,
                },
            ),
            Column::new(
                "tags",
                DataType::Set { values: vec!["a".into(), "b".into(), "c".into()], collation },
            ),
        ]),
    );
    ctx.add_table(def, vec![]);

    ctx.exec("INSERT INTO shirts VALUES ('medium', 'c,a')");
    // Set members normalize to declaration order.
    ctx.assert_rows("SELECT size, tags FROM shirts", vec![vec![s("medium"), s("a,c")]]);
    let err = ctx.exec_err("INSERT INTO shirts VALUES ('tiny', 'a')");
    assert!(matches!(err, Error::ConvertError { .. }));
}

#[test]
fn decimal_scale_rules() {
    let ctx = setup_test();
    // Division widens scale by four.
    ctx.assert_rows("SELECT 7 / 2", vec![vec![Value::Decimal(Decimal::new(35000, 4))]]);
    // DIV truncates toward zero.
    ctx.assert_rows("SELECT 7 DIV 2, -7 DIV 2", vec![vec![i(3), i(-3)]]);
    ctx.assert_rows("SELECT CAST(1.25 AS DECIMAL(10, 1))", vec![vec![Value::Decimal(Decimal::new(13, 1))]]);
}

#[test]
fn string_to_number_conversion_uses_leading_digits() {
    let ctx = setup_test();
    ctx.assert_rows("SELECT CAST('20a' AS SIGNED), CAST('a' AS SIGNED), CAST('' AS SIGNED)", vec![vec![
        i(20),
        i(0),
        i(0),
    ]]);
    ctx.assert_rows("SELECT '20a' + 0", vec![vec![common::f(20.0)]]);
}

#[test]
fn srid_validation_on_write() {
    let ctx = setup_test();
    let def = TableDef::new(
        "places",
        Schema::new(vec![
            Column::new("id", DataType::bigint()),
            Column::new(
                "pos",
                DataType::Spatial { class: rowmill::types::SpatialClass::Point, srid: 4326 },
            ),
        ]),
    );
    ctx.add_table(def, vec![]);

    let table = ctx.db.table("places").unwrap();
    let insert = table.as_insertable().unwrap();
    // Matching SRID through the engine-side row finisher.
    let good = vec![Value::I64(1), Value::Geometry(Geometry::point(4326, 1.0, 2.0))];
    let checked = rowmill::execution::helpers::finish_row(table.def(), good).unwrap();
    insert.insert(checked).unwrap();

    let bad = vec![Value::I64(2), Value::Geometry(Geometry::point(0, 1.0, 2.0))];
    let err = rowmill::execution::helpers::finish_row(table.def(), bad).unwrap_err();
    assert_eq!(err, Error::SridMismatch { value: 0, expected: 4326 });
}

#[test]
fn spatial_functions() {
    let ctx = setup_test();
    ctx.assert_rows("SELECT ST_X(POINT(3, 4)), ST_Y(POINT(3, 4))", vec![vec![common::f(3.0), common::f(4.0)]]);
    ctx.assert_rows("SELECT ST_DISTANCE(POINT(0, 0), POINT(3, 4))", vec![vec![common::f(5.0)]]);
    ctx.assert_rows("SELECT ST_SRID(POINT(1, 1))", vec![vec![Value::U64(0)]]);
}

#[test]
fn strict_mode_turns_dml_division_by_zero_into_an_error() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "t").create("a BIGINT").insert_values("(1)");

    // Default sql_mode carries ERROR_FOR_DIVISION_BY_ZERO + strict.
    let err = ctx.exec_err("UPDATE t SET a = 1 / 0");
    assert_eq!(err, Error::DivisionByZero);

    // Relaxed mode: NULL plus a warning instead.
    ctx.exec("SET sql_mode = ''");
    ctx.exec("UPDATE t SET a = 1 / 0");
    ctx.assert_rows("SELECT a FROM t", vec![vec![null()]]);
}

#[test]
fn year_and_temporal_columns() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "events")
        .create("y YEAR, d DATE, ts DATETIME")
        .insert_values("(69, '2024-02-29', '2024-02-29 12:30:00')");
    ctx.assert_rows(
        "SELECT y, YEAR(d), HOUR(ts) FROM events",
        vec![vec![Value::Year(2069), i(2024), i(12)]],
    );
    let err = ctx.exec_err("INSERT INTO events VALUES (1, '2023-02-29', NULL)");
    assert!(matches!(err, Error::NumericOverflow(_) | Error::ConvertingToTime(_)), "got {:?}", err);
}

#[test]
fn interval_arithmetic() {
    let ctx = setup_test();
    ctx.assert_rows(
        "SELECT DATE('2024-01-31') + INTERVAL 1 MONTH",
        vec![vec![Value::Date(chrono::NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())]],
    );
    ctx.assert_rows(
        "SELECT DATE_ADD('2024-01-01', INTERVAL 10 DAY)",
        vec![vec![Value::Date(chrono::NaiveDate::from_ymd_opt(2024, 1, 11).unwrap())]],
    );
    ctx.assert_rows("SELECT DATEDIFF('2024-01-11', '2024-01-01')", vec![vec![i(10)]]);
}
