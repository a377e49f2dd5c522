//! INSERT analysis and execution: column lists, defaults, auto-increment,
//! ON DUPLICATE KEY UPDATE, REPLACE, IGNORE, and the constraint errors the
//! analyzer raises before any row flows.

mod common;

use common::{i, null, s, setup_test, TableBuilder};
use rowmill::types::expression::{ArithOp, Expression};
use rowmill::types::schema::{Column, Schema, TableDef};
use rowmill::{DataType, Error, Value};

#[test]
fn insert_with_column_list_fills_defaults() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "t").create("a BIGINT, b BIGINT NOT NULL DEFAULT 7, c VARCHAR(10)");
    ctx.exec("INSERT INTO t (a) VALUES (1)");
    ctx.assert_rows("SELECT a, b, c FROM t", vec![vec![i(1), i(7), null()]]);
}

#[test]
fn omitted_not_null_without_default_fails_analysis() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "t").create("a BIGINT, b BIGINT NOT NULL");
    let err = ctx.exec_err("INSERT INTO t (a) VALUES (1)");
    assert_eq!(err, Error::InsertIntoNonNullable("b".into()));
    // Nothing flowed.
    ctx.assert_rows("SELECT COUNT(*) FROM t", vec![vec![i(0)]]);
}

#[test]
fn mismatched_value_count_fails() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "t").create("a BIGINT, b BIGINT");
    assert_eq!(ctx.exec_err("INSERT INTO t (a, b) VALUES (1)"), Error::InsertIntoMismatchValueCount);
    assert!(matches!(
        ctx.exec_err("INSERT INTO t (a, a) VALUES (1, 2)"),
        Error::InvalidValue(_)
    ));
    assert_eq!(
        ctx.exec_err("INSERT INTO t (a, nope) VALUES (1, 2)"),
        Error::InsertIntoNonexistentColumn("nope".into())
    );
}

#[test]
fn auto_increment_assigns_and_reports() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "t").create("id BIGINT PRIMARY KEY AUTO_INCREMENT, v VARCHAR(10)");
    ctx.exec("INSERT INTO t (v) VALUES ('a'), ('b')");
    ctx.assert_rows("SELECT id, v FROM t ORDER BY id", vec![vec![i(1), s("a")], vec![i(2), s("b")]]);
    ctx.assert_rows("SELECT LAST_INSERT_ID()", vec![vec![Value::U64(1)]]);

    // An explicit value pushes the watermark.
    ctx.exec("INSERT INTO t VALUES (10, 'c')");
    ctx.exec("INSERT INTO t (v) VALUES ('d')");
    ctx.assert_rows("SELECT id FROM t WHERE v = 'd'", vec![vec![i(11)]]);
}

#[test]
fn unique_key_violation_and_ignore() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "t").create("id BIGINT PRIMARY KEY, v VARCHAR(10)");
    ctx.exec("INSERT INTO t VALUES (1, 'a')");
    let err = ctx.exec_err("INSERT INTO t VALUES (1, 'b')");
    assert!(matches!(err, Error::UniqueKeyViolation(_)));

    ctx.exec("INSERT IGNORE INTO t VALUES (1, 'b'), (2, 'c')");
    ctx.assert_rows("SELECT id, v FROM t ORDER BY id", vec![vec![i(1), s("a")], vec![i(2), s("c")]]);
    assert!(!ctx.session.warnings().is_empty());
}

#[test]
fn on_duplicate_key_update() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "counters").create("k VARCHAR(10) PRIMARY KEY, n BIGINT NOT NULL");
    ctx.exec("INSERT INTO counters VALUES ('hits', 1) ON DUPLICATE KEY UPDATE n = n + 1");
    ctx.exec("INSERT INTO counters VALUES ('hits', 1) ON DUPLICATE KEY UPDATE n = n + 1");
    ctx.assert_rows("SELECT n FROM counters WHERE k = 'hits'", vec![vec![i(2)]]);

    // VALUES() reads the row that failed to insert.
    ctx.exec("INSERT INTO counters VALUES ('hits', 40) ON DUPLICATE KEY UPDATE n = VALUES(n)");
    ctx.assert_rows("SELECT n FROM counters WHERE k = 'hits'", vec![vec![i(40)]]);
}

#[test]
fn replace_displaces_conflicting_rows() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "t").create("id BIGINT PRIMARY KEY, v VARCHAR(10)");
    ctx.exec("INSERT INTO t VALUES (1, 'a')");
    ctx.exec("REPLACE INTO t VALUES (1, 'b')");
    ctx.assert_rows("SELECT id, v FROM t", vec![vec![i(1), s("b")]]);
}

#[test]
fn insert_from_select() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "src")
        .create("a BIGINT")
        .insert_values("(1), (2), (3)");
    TableBuilder::new(&ctx, "dst").create("a BIGINT, doubled BIGINT");
    ctx.exec("INSERT INTO dst SELECT a, a * 2 FROM src WHERE a > 1");
    ctx.assert_rows("SELECT a, doubled FROM dst ORDER BY a", vec![vec![i(2), i(4)], vec![i(3), i(6)]]);
}

#[test]
fn generated_columns_reject_writes_and_compute() {
    let ctx = setup_test();
    // Stored generated columns come in through the catalog API.
    let total = Expression::Arithmetic {
        op: ArithOp::Add,
        left: Box::new(Expression::column("a")),
        right: Box::new(Expression::column("b")),
    };
    let def = TableDef::new(
        "gen",
        Schema::new(vec![
            Column::new("a", DataType::bigint()),
            Column::new("b", DataType::bigint()),
            {
                let mut c = Column::new("total", DataType::bigint());
                c.generated = Some(total);
                c
            },
        ]),
    );
    ctx.add_table(def, vec![]);

    assert_eq!(
        ctx.exec_err("INSERT INTO gen (a, b, total) VALUES (1, 2, 99)"),
        Error::GeneratedColumnValue("total".into())
    );
    // Without a column list the table is unwritable, as the generated
    // column cannot take a value.
    assert!(matches!(ctx.exec_err("INSERT INTO gen VALUES (1, 2, 3)"), Error::GeneratedColumnValue(_)));

    ctx.exec("INSERT INTO gen (a, b) VALUES (1, 2)");
    ctx.assert_rows("SELECT total FROM gen", vec![vec![i(3)]]);

    ctx.exec("UPDATE gen SET b = 10");
    ctx.assert_rows("SELECT total FROM gen", vec![vec![i(11)]]);
    assert_eq!(ctx.exec_err("UPDATE gen SET total = 5"), Error::GeneratedColumnValue("total".into()));
}

#[test]
fn column_referencing_default() {
    let ctx = setup_test();
    let def = TableDef::new(
        "t",
        Schema::new(vec![
            Column::new("a", DataType::bigint()),
            Column::new("b", DataType::bigint()).with_default(Expression::Arithmetic {
                op: ArithOp::Multiply,
                left: Box::new(Expression::column("a")),
                right: Box::new(Expression::literal(Value::I64(10))),
            }),
        ]),
    );
    ctx.add_table(def, vec![]);
    ctx.exec("INSERT INTO t (a) VALUES (4)");
    ctx.assert_rows("SELECT a, b FROM t", vec![vec![i(4), i(40)]]);
}

#[test]
fn update_and_delete_row_counts() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "t")
        .create("a BIGINT, b BIGINT")
        .insert_values("(1, 0), (2, 0), (3, 0)");

    let result = ctx.session.exec("UPDATE t SET b = 1 WHERE a > 1").unwrap();
    assert_eq!(result.row_count, 2);
    // Updating to the same values touches nothing.
    let result = ctx.session.exec("UPDATE t SET b = 1 WHERE a > 1").unwrap();
    assert_eq!(result.row_count, 0);

    let result = ctx.session.exec("DELETE FROM t WHERE a = 1").unwrap();
    assert_eq!(result.row_count, 1);
    ctx.assert_rows("SELECT COUNT(*) FROM t", vec![vec![i(2)]]);
}

#[test]
fn foreign_key_restricts() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "parent")
        .create("id BIGINT PRIMARY KEY")
        .insert_values("(1), (2)");
    ctx.exec(
        "CREATE TABLE child (id BIGINT PRIMARY KEY, pid BIGINT, \
         CONSTRAINT fk_child FOREIGN KEY (pid) REFERENCES parent (id))",
    );

    ctx.exec("INSERT INTO child VALUES (10, 1)");
    assert_eq!(
        ctx.exec_err("INSERT INTO child VALUES (11, 99)"),
        Error::ForeignKeyViolation("fk_child".into())
    );
    // NULL child keys are exempt.
    ctx.exec("INSERT INTO child VALUES (12, NULL)");

    // The referenced parent row cannot go away.
    assert_eq!(
        ctx.exec_err("DELETE FROM parent WHERE id = 1"),
        Error::ForeignKeyViolation("fk_child".into())
    );
    ctx.exec("DELETE FROM parent WHERE id = 2");
}
