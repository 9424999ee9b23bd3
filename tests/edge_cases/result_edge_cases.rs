//! Edge cases in the shape of query results

use crate::common::{diff_files, sample_data, TestFixture};
use querydiff::session::DiffSummary;
use querydiff::QueryDiffError;

fn two_snapshots(first: &str, second: &str) -> TestFixture {
    let fixture = TestFixture::new().unwrap();
    fixture.execute_working(first).unwrap();
    fixture.commit("v1").unwrap();
    fixture.execute_working(second).unwrap();
    fixture.commit("v2").unwrap();
    fixture
}

fn items_history() -> TestFixture {
    let fixture = TestFixture::new().unwrap();
    fixture.load_items(sample_data::simple_items()).unwrap();
    fixture.commit("v1").unwrap();
    fixture.load_items(sample_data::updated_items()).unwrap();
    fixture.commit("v2").unwrap();
    fixture
}

#[test]
fn test_unordered_query_reports_plan() {
    let fixture = items_history();
    let (result, lines) = diff_files(
        &fixture.snapshot_database("v1"),
        &fixture.snapshot_database("v2"),
        "SELECT id, name FROM items",
    );

    let err = result.unwrap_err();
    assert!(matches!(err, QueryDiffError::UnorderedResult { .. }));
    assert!(err.to_string().contains("Add ORDER BY statement"));
    assert!(lines.is_empty());
}

#[test]
fn test_order_by_expression_outside_result_is_unordered() {
    let fixture = items_history();
    let (result, _) = diff_files(
        &fixture.snapshot_database("v1"),
        &fixture.snapshot_database("v2"),
        "SELECT name FROM items ORDER BY price",
    );

    assert!(matches!(result, Err(QueryDiffError::UnorderedResult { .. })));
}

#[test]
fn test_schema_change_between_snapshots() {
    let fixture = two_snapshots(
        "CREATE TABLE t (id INTEGER, name VARCHAR); INSERT INTO t VALUES (1, 'a');",
        "ALTER TABLE t ADD COLUMN score DOUBLE;",
    );
    let (result, _) = diff_files(
        &fixture.snapshot_database("v1"),
        &fixture.snapshot_database("v2"),
        "SELECT * FROM t ORDER BY id",
    );

    let err = result.unwrap_err();
    assert!(matches!(err, QueryDiffError::SchemaMismatch { .. }));
    assert!(err.to_string().contains("score"));
}

#[test]
fn test_column_type_change_is_a_schema_mismatch() {
    let fixture = two_snapshots(
        "CREATE TABLE t (id INTEGER, v INTEGER); INSERT INTO t VALUES (1, 1);",
        "CREATE OR REPLACE TABLE t (id INTEGER, v VARCHAR); INSERT INTO t VALUES (1, '1');",
    );
    let (result, _) = diff_files(
        &fixture.snapshot_database("v1"),
        &fixture.snapshot_database("v2"),
        "SELECT id, v FROM t ORDER BY id",
    );

    assert!(matches!(result, Err(QueryDiffError::SchemaMismatch { .. })));
}

#[test]
fn test_table_missing_on_one_side() {
    let fixture = two_snapshots(
        "CREATE TABLE a (id INTEGER); INSERT INTO a VALUES (1);",
        "CREATE TABLE b (id INTEGER); INSERT INTO b VALUES (1);",
    );
    let (result, _) = diff_files(
        &fixture.snapshot_database("v1"),
        &fixture.snapshot_database("v2"),
        "SELECT id FROM b ORDER BY id",
    );

    let err = result.unwrap_err();
    assert!(err.to_string().contains("cannot execute query at from revision"));
}

#[test]
fn test_empty_results() {
    let fixture = items_history();
    let (result, lines) = diff_files(
        &fixture.snapshot_database("v1"),
        &fixture.snapshot_database("v2"),
        "SELECT id, name, price FROM items WHERE id < 0 ORDER BY id",
    );

    assert!(result.unwrap().is_empty());
    assert_eq!(lines, vec!["   | id | name | price |", "   |----+------+-------|"]);
}

#[test]
fn test_one_side_empty() {
    let fixture = items_history();
    let (result, lines) = diff_files(
        &fixture.snapshot_database("v1"),
        &fixture.snapshot_database("v2"),
        "SELECT id FROM items WHERE id > 3 ORDER BY id",
    );

    let summary = result.unwrap();
    assert_eq!((summary.removed, summary.added), (0, 1));
    assert_eq!(lines[2], " + | 4  |");
}

#[test]
fn test_trailing_semicolon_is_accepted() {
    let fixture = items_history();
    let (result, _) = diff_files(
        &fixture.snapshot_database("v1"),
        &fixture.snapshot_database("v2"),
        "SELECT id, name, price FROM items ORDER BY id;",
    );

    assert_eq!(result.unwrap().removed, 2);
}

#[test]
fn test_decimal_change_in_last_digit_is_detected() {
    let fixture = two_snapshots(
        "CREATE TABLE ledger (id INTEGER, amount DECIMAL(18,3)); \
         INSERT INTO ledger VALUES (1, 123456789012345.678);",
        "UPDATE ledger SET amount = 123456789012345.679;",
    );
    let (result, lines) = diff_files(
        &fixture.snapshot_database("v1"),
        &fixture.snapshot_database("v2"),
        "SELECT id, amount FROM ledger ORDER BY id",
    );

    assert_eq!(result.unwrap(), DiffSummary { removed: 1, added: 1 });
    assert_eq!(lines[2], " - | 1  | 123456789012345.678 |");
    assert_eq!(lines[3], " + | 1  | 123456789012345.679 |");
}

#[test]
fn test_join_ordered_by_unprojected_column_is_unordered() {
    let fixture = two_snapshots(
        "CREATE TABLE a (k INTEGER, id INTEGER); CREATE TABLE b (k INTEGER, id INTEGER, val VARCHAR); \
         INSERT INTO a VALUES (1, 20), (2, 10); INSERT INTO b VALUES (1, 1, 'x'), (2, 2, 'y');",
        "UPDATE b SET val = 'z' WHERE k = 2;",
    );
    let (result, lines) = diff_files(
        &fixture.snapshot_database("v1"),
        &fixture.snapshot_database("v2"),
        "SELECT a.id, b.val FROM a JOIN b ON a.k = b.k ORDER BY b.id",
    );

    assert!(matches!(result, Err(QueryDiffError::UnorderedResult { .. })));
    assert!(lines.is_empty());
}
