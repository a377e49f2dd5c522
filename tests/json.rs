//! JSON documents through the SQL surface: mutation semantics, normalized
//! printing, containment and extraction.

mod common;

use common::{i, null, s, setup_test, TableBuilder};
use rowmill::Value;

fn json_row(doc: &str) -> Vec<Value> {
    vec![Value::Json(serde_json::from_str(doc).unwrap())]
}

#[test]
fn json_set_insert_replace() {
    let ctx = setup_test();
    ctx.assert_rows("SELECT JSON_SET('{\"a\":1}', '$.b', 42)", vec![json_row(r#"{"a":1,"b":42}"#)]);
    ctx.assert_rows("SELECT JSON_INSERT('{\"a\":1}', '$.a', 42)", vec![json_row(r#"{"a":1}"#)]);
    ctx.assert_rows("SELECT JSON_REPLACE('{\"a\":1}', '$.b', 42)", vec![json_row(r#"{"a":1}"#)]);
}

#[test]
fn json_remove_and_array_ops() {
    let ctx = setup_test();
    ctx.assert_rows("SELECT JSON_REMOVE('{\"a\":1,\"b\":2}', '$.b')", vec![json_row(r#"{"a":1}"#)]);
    ctx.assert_rows("SELECT JSON_ARRAY_APPEND('[1,2]', '$', 3)", vec![json_row("[1,2,3]")]);
    ctx.assert_rows("SELECT JSON_ARRAY_INSERT('[1,3]', '$[1]', 2)", vec![json_row("[1,2,3]")]);
}

#[test]
fn json_extract_with_paths() {
    let ctx = setup_test();
    ctx.assert_rows("SELECT JSON_EXTRACT('{\"a\":{\"b\":[1,2,3]}}', '$.a.b[last]')", vec![json_row("3")]);
    ctx.assert_rows("SELECT JSON_EXTRACT('{\"a\":1}', '$.missing')", vec![vec![null()]]);
    let err = ctx.query_err("SELECT JSON_EXTRACT('{}', 'a.b')");
    assert!(matches!(err, rowmill::Error::InvalidJsonPath(_)));
}

#[test]
fn printed_form_is_normalized() {
    let ctx = setup_test();
    // Sorted keys, ", " and ": " separators.
    ctx.assert_rows(
        "SELECT CAST(JSON_SET('{\"b\":2,\"a\":1}', '$.c', 3) AS CHAR(100))",
        vec![vec![s(r#"{"a": 1, "b": 2, "c": 3}"#)]],
    );
}

#[test]
fn json_contains_and_type() {
    let ctx = setup_test();
    ctx.assert_rows("SELECT JSON_CONTAINS('[1,2,3]', '2')", vec![vec![i(1)]]);
    ctx.assert_rows("SELECT JSON_CONTAINS('{\"a\":1,\"b\":2}', '{\"a\":1}')", vec![vec![i(1)]]);
    ctx.assert_rows("SELECT JSON_CONTAINS('{\"a\":1}', '{\"a\":2}')", vec![vec![i(0)]]);
    ctx.assert_rows("SELECT JSON_TYPE('[1]'), JSON_TYPE('\"x\"')", vec![vec![s("ARRAY"), s("STRING")]]);
    ctx.assert_rows("SELECT JSON_VALID('{\"a\":1}'), JSON_VALID('nope')", vec![vec![i(1), i(0)]]);
}

#[test]
fn json_columns_round_trip() {
    let ctx = setup_test();
    TableBuilder::new(&ctx, "docs")
        .create("id BIGINT PRIMARY KEY, doc JSON")
        .insert_values("(1, '{\"b\":2,\"a\":1}')");
    ctx.assert_rows("SELECT doc FROM docs", vec![json_row(r#"{"a":1,"b":2}"#)]);
    ctx.exec("UPDATE docs SET doc = JSON_SET(doc, '$.c', 3) WHERE id = 1");
    ctx.assert_rows("SELECT JSON_EXTRACT(doc, '$.c') FROM docs", vec![json_row("3")]);
}

#[test]
fn json_length_and_unquote() {
    let ctx = setup_test();
    ctx.assert_rows("SELECT JSON_LENGTH('[1,2,3]'), JSON_LENGTH('{\"a\":1}'), JSON_LENGTH('5')", vec![vec![
        i(3),
        i(1),
        i(1),
    ]]);
    ctx.assert_rows("SELECT JSON_UNQUOTE('\"hello\"')", vec![vec![s("hello")]]);
}
