//! End-to-end diffs between committed snapshots

use crate::common::{diff_files, diff_files_with, sample_data, TestFixture};
use querydiff::session::{DiffOptions, DiffSummary};

fn fixture_with_history() -> TestFixture {
    let fixture = TestFixture::new().unwrap();
    fixture.load_items(sample_data::simple_items()).unwrap();
    fixture.commit("v1").unwrap();
    fixture.load_items(sample_data::updated_items()).unwrap();
    fixture.commit("v2").unwrap();
    fixture
}

#[test]
fn test_rendered_diff_between_snapshots() {
    let fixture = fixture_with_history();
    let (result, lines) = diff_files(
        &fixture.snapshot_database("v1"),
        &fixture.snapshot_database("v2"),
        sample_data::ITEMS_QUERY,
    );

    assert_eq!(result.unwrap(), DiffSummary { removed: 2, added: 2 });
    assert_eq!(
        lines,
        vec![
            "   | id | name   | price |",
            "   |----+--------+-------|",
            " - | 1  | Apple  | 1.5   |",
            " + | 1  | Apple  | 1.6   |",
            " - | 3  | Cherry | 2     |",
            " + | 4  | Date   | 3     |",
        ]
    );
}

#[test]
fn test_reverse_direction_swaps_sides() {
    let fixture = fixture_with_history();
    let (result, lines) = diff_files(
        &fixture.snapshot_database("v2"),
        &fixture.snapshot_database("v1"),
        sample_data::ITEMS_QUERY,
    );

    assert_eq!(result.unwrap(), DiffSummary { removed: 2, added: 2 });
    assert_eq!(lines[2], " - | 1  | Apple  | 1.6   |");
    assert_eq!(lines[3], " + | 1  | Apple  | 1.5   |");
    assert_eq!(lines[4], " + | 3  | Cherry | 2     |");
    assert_eq!(lines[5], " - | 4  | Date   | 3     |");
}

#[test]
fn test_unchanged_working_database_has_no_rows() {
    let fixture = fixture_with_history();
    let (result, lines) = diff_files(
        &fixture.snapshot_database("v2"),
        &fixture.working_database(),
        sample_data::ITEMS_QUERY,
    );

    assert!(result.unwrap().is_empty());
    assert_eq!(lines.len(), 2);
}

#[test]
fn test_null_values_are_printed() {
    let fixture = TestFixture::new().unwrap();
    fixture.load_items("(1, 'Apple', 1.5)").unwrap();
    fixture.commit("v1").unwrap();
    fixture.load_items("(1, 'Apple', 1.5), (2, NULL, NULL)").unwrap();
    fixture.commit("v2").unwrap();

    let (result, lines) = diff_files(
        &fixture.snapshot_database("v1"),
        &fixture.snapshot_database("v2"),
        sample_data::ITEMS_QUERY,
    );

    assert_eq!(result.unwrap(), DiffSummary { removed: 0, added: 1 });
    assert_eq!(lines[2], " + | 2  | <NULL> | <NULL> |");
}

#[test]
fn test_narrow_columns_are_hash_filled() {
    let fixture = fixture_with_history();
    let options = DiffOptions {
        fwt_max_width: 4,
        ..DiffOptions::default()
    };
    let (result, lines) = diff_files_with(
        &fixture.snapshot_database("v1"),
        &fixture.snapshot_database("v2"),
        sample_data::ITEMS_QUERY,
        options,
    );

    result.unwrap();
    assert_eq!(lines[0], "   | id | name | #### |");
    assert_eq!(lines[4], " - | 3  | #### | 2    |");
}

#[test]
fn test_small_buffers_and_samples_keep_order() {
    let fixture = TestFixture::new().unwrap();
    // three digit ids so the sampled widths fit every row
    let from: Vec<String> = (100..400).map(|i| format!("({}, 'n{}', {})", i, i, i)).collect();
    fixture.load_items(&from.join(", ")).unwrap();
    fixture.commit("v1").unwrap();
    let to: Vec<String> = (100..400)
        .filter(|i| i % 3 != 0)
        .map(|i| format!("({}, 'n{}', {})", i, i, i))
        .collect();
    fixture.load_items(&to.join(", ")).unwrap();
    fixture.commit("v2").unwrap();

    let options = DiffOptions {
        buffer_size: 2,
        fwt_sample_rows: 5,
        ..DiffOptions::default()
    };
    let (result, lines) = diff_files_with(
        &fixture.snapshot_database("v1"),
        &fixture.snapshot_database("v2"),
        sample_data::ITEMS_QUERY,
        options,
    );

    assert_eq!(result.unwrap(), DiffSummary { removed: 100, added: 0 });
    assert_eq!(lines.len(), 102);
    let ids: Vec<i64> = lines[2..]
        .iter()
        .map(|line| line.split('|').nth(1).unwrap().trim().parse().unwrap())
        .collect();
    let expected: Vec<i64> = (100..400).filter(|i| i % 3 == 0).collect();
    assert_eq!(ids, expected);
}
