//! Unit tests for workspace layout and configuration

use crate::common::{assertions, TestFixture};
use querydiff::config::{ColorMode, WorkspaceConfig, DEFAULT_WORKING_DATABASE};
use querydiff::QueryDiffWorkspace;
use std::fs;

#[test]
fn test_workspace_layout() {
    let fixture = TestFixture::new().unwrap();
    let workspace = &fixture.workspace;

    assertions::assert_dir_exists(&workspace.querydiff_dir);
    assertions::assert_dir_exists(&workspace.snapshots_dir);
    assertions::assert_file_exists_and_not_empty(&workspace.config_path());
    assert_eq!(fixture.working_database(), fixture.root().join(DEFAULT_WORKING_DATABASE));
}

#[test]
fn test_snapshot_paths() {
    let fixture = TestFixture::new().unwrap();
    let (db, json) = fixture.workspace.snapshot_paths("v1");
    assert_eq!(db, fixture.workspace.snapshots_dir.join("v1.duckdb"));
    assert_eq!(json, fixture.workspace.snapshots_dir.join("v1.json"));
}

#[test]
fn test_list_snapshots_ignores_databases_without_metadata() {
    let fixture = TestFixture::new().unwrap();
    let dir = &fixture.workspace.snapshots_dir;
    fs::write(dir.join("b.json"), "{}").unwrap();
    fs::write(dir.join("a.json"), "{}").unwrap();
    fs::write(dir.join("orphan.duckdb"), "").unwrap();

    assert_eq!(fixture.workspace.list_snapshots().unwrap(), vec!["a", "b"]);
    fixture.assert_snapshot_exists("a");
    fixture.assert_snapshot_not_exists("orphan");
}

#[test]
fn test_gitignore_entry_added_once() {
    let fixture = TestFixture::new().unwrap();
    let gitignore = fixture.root().join(".gitignore");
    fs::write(&gitignore, "target/\n").unwrap();

    fixture.workspace.ensure_gitignore().unwrap();
    fixture.workspace.ensure_gitignore().unwrap();

    let content = fs::read_to_string(&gitignore).unwrap();
    assert!(content.starts_with("target/\n"));
    assert_eq!(content.matches(".querydiff/snapshots/*.duckdb").count(), 1);
}

#[test]
fn test_find_from_subdirectory() {
    let fixture = TestFixture::new().unwrap();
    let nested = fixture.root().join("reports").join("q3");
    fs::create_dir_all(&nested).unwrap();

    let found = QueryDiffWorkspace::find(Some(&nested)).unwrap();
    assert_eq!(found.root, fixture.root());
}

#[test]
fn test_config_overrides_are_loaded() {
    let fixture = TestFixture::new().unwrap();
    let mut config = fixture.workspace.load_config().unwrap();
    config.working_database = "warehouse.duckdb".to_string();
    config.color = ColorMode::Never;
    config.pipeline.buffer_size = 8;
    config.save(&fixture.workspace.config_path()).unwrap();

    let loaded = fixture.workspace.load_config().unwrap();
    assert_eq!(loaded, config);
    assert_eq!(fixture.working_database(), fixture.root().join("warehouse.duckdb"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let fixture = TestFixture::new().unwrap();
    fs::write(
        fixture.workspace.config_path(),
        r#"{"pipeline": {"buffer_size": 1}}"#,
    )
    .unwrap();

    let err = fixture.workspace.load_config().unwrap_err();
    assert!(err.to_string().contains("buffer_size"));
    assert!(WorkspaceConfig::default().validate().is_ok());
}
