//! Session surface: SHOW statements, system and user variables, USE,
//! information_schema, warnings, EXPLAIN, ANALYZE, prepared statements,
//! advisory locks and cancellation.

mod common;

use common::{i, s, setup_test, TableBuilder};
use rowmill::{Error, Value};

#[test]
fn show_tables_and_databases() {
    let ctx = setup_test();
    ctx.exec("CREATE TABLE beta (a BIGINT)");
    ctx.exec("CREATE TABLE alpha (a BIGINT)");
    ctx.assert_rows("SHOW TABLES", vec![vec![s("alpha")], vec![s("beta")]]);
    ctx.assert_rows("SHOW TABLES LIKE 'al%'", vec![vec![s("alpha")]]);

    let dbs = ctx.query("SHOW DATABASES");
    assert!(dbs.contains(&vec![s("test")]));
    assert!(dbs.contains(&vec![s("information_schema")]));
}

#[test]
fn show_full_tables_includes_views() {
    let ctx = setup_test();
    ctx.exec("CREATE TABLE t (a BIGINT)");
    ctx.exec("CREATE VIEW v AS SELECT a FROM t");
    let rows = ctx.query("SHOW FULL TABLES");
    assert!(rows.contains(&vec![s("t"), s("BASE TABLE")]));
    assert!(rows.contains(&vec![s("v"), s("VIEW")]));
}

#[test]
fn views_expand_in_queries() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "t")
        .create("a BIGINT")
        .insert_values("(1), (2), (3)");
    ctx.exec("CREATE VIEW big AS SELECT a FROM t WHERE a > 1");
    ctx.assert_rows("SELECT a FROM big ORDER BY a", vec![vec![i(2)], vec![i(3)]]);
    ctx.assert_rows("SELECT COUNT(*) FROM big", vec![vec![i(2)]]);
}

#[test]
fn describe_columns() {
    let ctx = setup_test();
    ctx.exec("CREATE TABLE t (id BIGINT PRIMARY KEY, v VARCHAR(20) NOT NULL)");
    let rows = ctx.query("DESCRIBE t");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], s("id"));
    assert_eq!(rows[0][3], s("PRI"));
    assert_eq!(rows[1][0], s("v"));
    assert_eq!(rows[1][2], s("NO"));
}

#[test]
fn show_create_table_round_trips_shape() {
    let ctx = setup_test();
    ctx.exec("CREATE TABLE t (id BIGINT PRIMARY KEY, v VARCHAR(20))");
    let rows = ctx.query("SHOW CREATE TABLE t");
    assert_eq!(rows[0][0], s("t"));
    let ddl = rows[0][1].to_string();
    assert!(ddl.contains("CREATE TABLE `t`"), "{}", ddl);
    assert!(ddl.contains("`id` bigint"), "{}", ddl);
    assert!(ddl.contains("PRIMARY KEY (`id`)"), "{}", ddl);
}

#[test]
fn system_variables_set_and_show() {
    let ctx = setup_test();
    ctx.assert_rows("SELECT @@autocommit", vec![vec![i(1)]]);
    ctx.exec("SET autocommit = 0");
    ctx.assert_rows("SELECT @@autocommit", vec![vec![i(0)]]);

    let rows = ctx.query("SHOW VARIABLES LIKE 'version'");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], s("version"));

    assert_eq!(ctx.exec_err("SET gtid_mode = 'ON'"), Error::ReadOnlyVariable("gtid_mode".into()));
    assert!(matches!(ctx.exec_err("SET no_such_var = 1"), Error::UnknownSystemVariable(_)));
}

#[test]
fn session_set_does_not_leak_across_sessions() {
    let ctx = setup_test();
    ctx.exec("SET max_allowed_packet = 1024");
    let other = ctx.engine.session("root", "test");
    let rows = other.query("SELECT @@max_allowed_packet").unwrap().collect().unwrap();
    assert_eq!(rows, vec![vec![i(67108864)]]);

    // SET GLOBAL is visible to fresh sessions.
    ctx.exec("SET GLOBAL max_allowed_packet = 2048");
    let third = ctx.engine.session("root", "test");
    let rows = third.query("SELECT @@max_allowed_packet").unwrap().collect().unwrap();
    assert_eq!(rows, vec![vec![i(2048)]]);
}

#[test]
fn user_variables() {
    let ctx = setup_test();
    ctx.exec("SET @x = 41");
    ctx.assert_rows("SELECT @x + 1", vec![vec![f(42.0)]]);
    ctx.assert_rows("SELECT @unset", vec![vec![Value::Null]]);
}

use common::f;

#[test]
fn use_database_and_database_function() {
    let ctx = setup_test();
    ctx.assert_rows("SELECT DATABASE()", vec![vec![s("test")]]);
    assert!(matches!(ctx.exec_err("USE nope"), Error::DatabaseNotFound(_)));
    ctx.exec("USE information_schema");
    ctx.assert_rows("SELECT DATABASE()", vec![vec![s("information_schema")]]);
}

#[test]
fn information_schema_columns() {
    let ctx = setup_test();
    ctx.exec("CREATE TABLE t (id BIGINT PRIMARY KEY, v VARCHAR(20))");
    ctx.assert_rows(
        "SELECT column_name FROM information_schema.columns \
         WHERE table_schema = 'test' AND table_name = 't' ORDER BY ordinal_position",
        vec![vec![s("id")], vec![s("v")]],
    );
}

#[test]
fn show_warnings_surfaces_the_last_statement() {
    let ctx = setup_test();
    let _ = ctx.query("SELECT 1 / 0");
    let warnings = ctx.query("SHOW WARNINGS");
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0][0], s("Warning"));
    // The next statement clears them.
    let _ = ctx.query("SELECT 1");
    assert_eq!(ctx.query("SHOW WARNINGS").len(), 0);
}

#[test]
fn analyze_table_feeds_statistics() {
    let ctx = setup_test();
    ctx.exec("CREATE TABLE t (a BIGINT, INDEX a_idx (a))");
    ctx.exec("INSERT INTO t VALUES (1), (2), (2)");
    ctx.exec("ANALYZE TABLE t");
    ctx.assert_rows(
        "SELECT cardinality FROM information_schema.statistics WHERE table_name = 't'",
        vec![vec![Value::U64(3)]],
    );
}

#[test]
fn explain_prints_the_plan_tree() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "t").create("a BIGINT");
    let lines: Vec<String> = ctx
        .query("EXPLAIN SELECT a FROM t WHERE a > 1")
        .into_iter()
        .map(|r| r[0].to_string())
        .collect();
    assert!(lines[0].starts_with("Project"), "{:?}", lines);
    assert!(lines.iter().any(|l| l.contains("Filter")), "{:?}", lines);
    assert!(lines.iter().any(|l| l.contains("Table(t)")), "{:?}", lines);
}

#[test]
fn prepared_statements_bind_per_execution() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "t")
        .create("a BIGINT, b VARCHAR(10)")
        .insert_values("(1, 'one'), (2, 'two'), (3, 'three')");

    let stmt = ctx.session.prepare("SELECT b FROM t WHERE a = ?").unwrap();
    let rows = ctx.session.execute(stmt, vec![i(2)]).unwrap().collect().unwrap();
    assert_eq!(rows, vec![vec![s("two")]]);
    let rows = ctx.session.execute(stmt, vec![i(3)]).unwrap().collect().unwrap();
    assert_eq!(rows, vec![vec![s("three")]]);

    let err = match ctx.session.execute(stmt, vec![]) {
        Ok(_) => panic!("expected unbound-variable error"),
        Err(e) => e,
    };
    assert_eq!(err, Error::UnboundPreparedStatementVariable(0));

    // Prepared INSERT re-settles defaults against the bound values.
    let ins = ctx.session.prepare("INSERT INTO t (a) VALUES (?)").unwrap();
    ctx.session.execute(ins, vec![i(9)]).unwrap().collect().unwrap();
    ctx.assert_rows("SELECT b FROM t WHERE a = 9", vec![vec![Value::Null]]);
}

#[test]
fn advisory_locks_via_sql() {
    let ctx = setup_test();
    ctx.assert_rows("SELECT GET_LOCK('m', 0)", vec![vec![i(1)]]);
    ctx.assert_rows("SELECT IS_USED_LOCK('m')", vec![vec![Value::U64(1)]]);

    let other = ctx.engine.session("root", "test");
    let rows = other.query("SELECT GET_LOCK('m', 0)").unwrap().collect().unwrap();
    assert_eq!(rows, vec![vec![i(0)]]);

    ctx.assert_rows("SELECT RELEASE_LOCK('m')", vec![vec![i(1)]]);
    ctx.assert_rows("SELECT IS_USED_LOCK('m')", vec![vec![Value::Null]]);
}

#[test]
fn cancellation_stops_iteration() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "t")
        .create("a BIGINT")
        .insert_values("(1), (2), (3)");
    let result = ctx.session.query("SELECT a FROM t").unwrap();
    ctx.session.cancel();
    let err = result.collect().unwrap_err();
    assert_eq!(err, Error::QueryCancelled);
}
