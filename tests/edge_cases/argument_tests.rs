//! Edge cases in query-diff argument handling

use crate::common::{sample_data, CliTestRunner};
use querydiff::cli::QUERY_DIFF_USAGE;
use querydiff::commands::query_diff_command;
use querydiff::QueryDiffError;

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn runner_with_snapshot() -> CliTestRunner {
    let runner = CliTestRunner::new().unwrap();
    runner.fixture().load_items(sample_data::simple_items()).unwrap();
    runner.fixture().commit("v1").unwrap();
    runner
}

#[test]
fn test_missing_query() {
    let runner = runner_with_snapshot();
    let err = query_diff_command(Some(runner.fixture().root()), None, &args(&["v1"])).unwrap_err();

    match &err {
        QueryDiffError::Argument { message, usage } => {
            assert_eq!(message, "missing query");
            assert_eq!(usage, QUERY_DIFF_USAGE);
        }
        other => panic!("expected argument error, got {other}"),
    }
    assert!(err.to_string().contains("usage: querydiff query-diff"));
}

#[test]
fn test_no_arguments_at_all() {
    let runner = runner_with_snapshot();
    let err = query_diff_command(Some(runner.fixture().root()), None, &[]).unwrap_err();
    assert!(matches!(err, QueryDiffError::Argument { ref message, .. } if message == "missing query"));
}

#[test]
fn test_too_many_arguments() {
    let runner = runner_with_snapshot();
    let err = query_diff_command(
        Some(runner.fixture().root()),
        None,
        &args(&["v1", "WORKING", sample_data::ITEMS_QUERY, "extra"]),
    )
    .unwrap_err();

    match err {
        QueryDiffError::Argument { message, .. } => {
            assert_eq!(message, format!("too many arguments: {} extra", sample_data::ITEMS_QUERY));
        }
        other => panic!("expected argument error, got {other}"),
    }
}

#[test]
fn test_unknown_revision_is_treated_as_query_text() {
    let runner = runner_with_snapshot();
    let err = query_diff_command(
        Some(runner.fixture().root()),
        None,
        &args(&["nosuch", sample_data::ITEMS_QUERY]),
    )
    .unwrap_err();

    assert!(err.to_string().starts_with("too many arguments: nosuch"));
}

#[test]
fn test_invalid_color_mode() {
    let runner = runner_with_snapshot();
    let err = query_diff_command(
        Some(runner.fixture().root()),
        Some("sometimes"),
        &args(&[sample_data::ITEMS_QUERY]),
    )
    .unwrap_err();

    assert!(matches!(err, QueryDiffError::Argument { .. }));
}

#[test]
fn test_head_without_snapshots() {
    let runner = CliTestRunner::new().unwrap();
    runner.fixture().load_items(sample_data::simple_items()).unwrap();

    let err = runner.expect_failure(&["query-diff", sample_data::ITEMS_QUERY]);
    assert!(err.to_string().contains("no snapshots committed yet"));
}

#[test]
fn test_missing_query_reported_before_missing_snapshots() {
    let runner = CliTestRunner::new().unwrap();
    let err = runner.expect_failure(&["query-diff"]);
    assert!(matches!(err, QueryDiffError::Argument { .. }));
}
