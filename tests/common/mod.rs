//! Common test utilities and helpers

use querydiff::engine::DuckDbEngine;
use querydiff::session::{diff_query, DiffOptions, DiffSummary};
use querydiff::sink::ColorDiffSink;
use querydiff::snapshot::{SnapshotCreator, SnapshotMetadata};
use querydiff::{QueryDiffWorkspace, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Test fixture manager for creating temporary test environments
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub workspace: QueryDiffWorkspace,
}

impl TestFixture {
    /// Create a new test fixture with initialized workspace
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let workspace = QueryDiffWorkspace::create_new(temp_dir.path().to_path_buf(), false)?;

        Ok(Self {
            temp_dir,
            workspace,
        })
    }

    /// Create a new test fixture without initializing workspace
    pub fn new_empty() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let workspace = QueryDiffWorkspace::from_root(temp_dir.path().to_path_buf());

        Ok(Self {
            temp_dir,
            workspace,
        })
    }

    /// Get the root path of the test fixture
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn working_database(&self) -> PathBuf {
        let config = self.workspace.load_config().expect("config should load");
        self.workspace.working_database(&config)
    }

    /// Run SQL against the working database and checkpoint it to disk
    pub fn execute_working(&self, sql: &str) -> Result<()> {
        let connection = duckdb::Connection::open(self.working_database())?;
        connection.execute_batch(sql)?;
        connection.execute_batch("CHECKPOINT;")?;
        Ok(())
    }

    /// Replace the working `items` table with the given rows
    pub fn load_items(&self, values: &str) -> Result<()> {
        self.execute_working(&format!(
            "CREATE OR REPLACE TABLE items (id INTEGER, name VARCHAR, price DOUBLE); \
             INSERT INTO items VALUES {};",
            values
        ))
    }

    /// Commit the working database as snapshot `name`
    pub fn commit(&self, name: &str) -> Result<SnapshotMetadata> {
        SnapshotCreator::new(false).commit(&self.workspace, &self.working_database(), name, None)
    }

    pub fn snapshot_database(&self, name: &str) -> PathBuf {
        self.workspace.snapshot_paths(name).0
    }

    /// Assert that a snapshot exists
    pub fn assert_snapshot_exists(&self, name: &str) {
        assert!(self.workspace.snapshot_exists(name), "Snapshot '{}' should exist", name);
    }

    /// Assert that a snapshot does not exist
    pub fn assert_snapshot_not_exists(&self, name: &str) {
        assert!(!self.workspace.snapshot_exists(name), "Snapshot '{}' should not exist", name);
    }
}

/// Helper for running CLI commands in tests
pub struct CliTestRunner {
    fixture: TestFixture,
}

impl CliTestRunner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            fixture: TestFixture::new()?,
        })
    }

    pub fn new_empty() -> Result<Self> {
        Ok(Self {
            fixture: TestFixture::new_empty()?,
        })
    }

    pub fn fixture(&self) -> &TestFixture {
        &self.fixture
    }

    /// Run a querydiff command and return the result
    pub fn run_command(&self, args: &[&str]) -> Result<()> {
        use clap::Parser;
        use querydiff::cli::Cli;
        use querydiff::commands::execute_command;

        let mut cmd_args = vec!["querydiff"];
        cmd_args.extend(args);

        let cli = Cli::try_parse_from(cmd_args)
            .map_err(|e| querydiff::QueryDiffError::invalid_input(e.to_string()))?;

        // default to the fixture root when no --workspace was given
        let workspace_path = cli.workspace.as_deref().or(Some(self.fixture.root()));
        execute_command(cli.command, workspace_path)
    }

    /// Run a command and expect it to succeed
    pub fn expect_success(&self, args: &[&str]) {
        if let Err(e) = self.run_command(args) {
            panic!("Command {:?} should succeed: {}", args, e);
        }
    }

    /// Run a command and expect it to fail
    pub fn expect_failure(&self, args: &[&str]) -> querydiff::QueryDiffError {
        self.run_command(args).expect_err("Command should fail")
    }
}

/// In-memory writer that can be read back after the sink is gone
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// Diff `query` between two database files, returning the rendered lines
pub fn diff_files(from: &Path, to: &Path, query: &str) -> (Result<DiffSummary>, Vec<String>) {
    diff_files_with(from, to, query, DiffOptions::default())
}

pub fn diff_files_with(
    from: &Path,
    to: &Path,
    query: &str,
    options: DiffOptions,
) -> (Result<DiffSummary>, Vec<String>) {
    let out = SharedBuffer::default();
    let result = DuckDbEngine::open(from).and_then(|from| {
        let to = DuckDbEngine::open(to)?;
        diff_query(&from, &to, query, ColorDiffSink::new(out.clone(), false), options)
    });
    (result, out.lines())
}

/// Sample data generators for testing
pub mod sample_data {
    pub const ITEMS_QUERY: &str = "SELECT id, name, price FROM items ORDER BY id";

    pub fn simple_items() -> &'static str {
        "(1, 'Apple', 1.5), (2, 'Banana', 0.75), (3, 'Cherry', 2.0)"
    }

    /// Apple repriced, Cherry removed, Date added
    pub fn updated_items() -> &'static str {
        "(1, 'Apple', 1.6), (2, 'Banana', 0.75), (4, 'Date', 3.0)"
    }
}

/// Assertion helpers for test validation
pub mod assertions {
    use querydiff::Result;
    use std::path::Path;

    /// Assert that a file exists and is not empty
    pub fn assert_file_exists_and_not_empty(path: &Path) {
        assert!(path.exists(), "File should exist: {}", path.display());
        let metadata = std::fs::metadata(path).expect("Should be able to read file metadata");
        assert!(metadata.len() > 0, "File should not be empty: {}", path.display());
    }

    /// Assert that a directory exists
    pub fn assert_dir_exists(path: &Path) {
        assert!(path.exists(), "Directory should exist: {}", path.display());
        assert!(path.is_dir(), "Path should be a directory: {}", path.display());
    }

    /// Assert that a JSON file contains expected keys
    pub fn assert_json_contains_keys(path: &Path, keys: &[&str]) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        let json: serde_json::Value = serde_json::from_str(&content)?;

        for key in keys {
            assert!(json.get(key).is_some(), "JSON should contain key '{}': {}", key, path.display());
        }

        Ok(())
    }
}
