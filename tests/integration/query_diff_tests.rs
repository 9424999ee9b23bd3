//! Integration tests for the query-diff command

use crate::common::{sample_data, CliTestRunner};
use querydiff::commands::query_diff_command;
use querydiff::session::DiffSummary;

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn runner_with_history() -> CliTestRunner {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    fixture.load_items(sample_data::simple_items()).unwrap();
    fixture.commit("v1").unwrap();
    fixture.load_items(sample_data::updated_items()).unwrap();
    fixture.commit("v2").unwrap();
    runner
}

#[test]
fn test_query_diff_between_named_snapshots() {
    let runner = runner_with_history();
    let summary = query_diff_command(
        Some(runner.fixture().root()),
        Some("never"),
        &args(&["v1", "v2", sample_data::ITEMS_QUERY]),
    )
    .unwrap();

    assert_eq!(summary, DiffSummary { removed: 2, added: 2 });
}

#[test]
fn test_query_diff_defaults_to_head_against_working() {
    let runner = runner_with_history();
    let fixture = runner.fixture();

    let summary = query_diff_command(Some(fixture.root()), Some("never"), &args(&[sample_data::ITEMS_QUERY]))
        .unwrap();
    assert!(summary.is_empty());

    fixture
        .execute_working("DELETE FROM items WHERE id = 2;")
        .unwrap();
    let summary = query_diff_command(Some(fixture.root()), Some("never"), &args(&[sample_data::ITEMS_QUERY]))
        .unwrap();
    assert_eq!(summary, DiffSummary { removed: 1, added: 0 });
}

#[test]
fn test_query_diff_single_revision_compares_with_working() {
    let runner = runner_with_history();
    let summary = query_diff_command(
        Some(runner.fixture().root()),
        Some("never"),
        &args(&["HEAD~1", sample_data::ITEMS_QUERY]),
    )
    .unwrap();

    assert_eq!(summary, DiffSummary { removed: 2, added: 2 });
}

#[test]
fn test_query_diff_through_cli() {
    let runner = runner_with_history();
    runner.expect_success(&["query-diff", "--color", "never", "v1", "HEAD", sample_data::ITEMS_QUERY]);
}

#[test]
fn test_query_diff_respects_query_shape() {
    let runner = runner_with_history();
    // Only names are compared, so the repriced Apple is not a difference
    let summary = query_diff_command(
        Some(runner.fixture().root()),
        Some("never"),
        &args(&["v1", "v2", "SELECT name FROM items ORDER BY name"]),
    )
    .unwrap();

    assert_eq!(summary, DiffSummary { removed: 1, added: 1 });
}
