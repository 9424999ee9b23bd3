//! Workspace management for querydiff operations

use crate::config::WorkspaceConfig;
use crate::error::{QueryDiffError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the workspace directory under the project root
pub const WORKSPACE_DIR: &str = ".querydiff";

/// Manages the .querydiff workspace directory
#[derive(Debug, Clone)]
pub struct QueryDiffWorkspace {
    /// Project root directory (where .querydiff/ lives)
    pub root: PathBuf,
    /// .querydiff/ directory path
    pub querydiff_dir: PathBuf,
    /// .querydiff/snapshots/ directory path
    pub snapshots_dir: PathBuf,
}

impl QueryDiffWorkspace {
    /// Find an existing workspace at or above `start_dir` (default: the
    /// current directory)
    pub fn find(start_dir: Option<&Path>) -> Result<Self> {
        let current_dir = std::env::current_dir()?;
        let start = start_dir.unwrap_or(&current_dir);

        Self::find_existing(start)?.ok_or_else(|| {
            QueryDiffError::workspace(format!(
                "no {} workspace found at or above {} (run `querydiff init`)",
                WORKSPACE_DIR,
                start.display()
            ))
        })
    }

    /// Find existing .querydiff workspace by walking up directory tree
    fn find_existing(start_dir: &Path) -> Result<Option<Self>> {
        let mut current = start_dir;

        loop {
            let querydiff_dir = current.join(WORKSPACE_DIR);
            if querydiff_dir.is_dir() {
                return Ok(Some(Self::from_root(current.to_path_buf())));
            }

            // a git root bounds the search
            if current.join(".git").exists() {
                break;
            }

            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        Ok(None)
    }

    /// Create a new workspace in the specified root directory
    pub fn create_new(root: PathBuf, force: bool) -> Result<Self> {
        let workspace = Self::from_root(root);

        fs::create_dir_all(&workspace.snapshots_dir)?;
        workspace.create_config(force)?;
        workspace.ensure_gitignore()?;

        log::info!("Created querydiff workspace at: {}", workspace.root.display());

        Ok(workspace)
    }

    pub fn from_root(root: PathBuf) -> Self {
        let querydiff_dir = root.join(WORKSPACE_DIR);
        let snapshots_dir = querydiff_dir.join("snapshots");

        Self {
            root,
            querydiff_dir,
            snapshots_dir,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.querydiff_dir.join("config.json")
    }

    pub fn load_config(&self) -> Result<WorkspaceConfig> {
        WorkspaceConfig::load_or_default(&self.config_path())
    }

    /// Path of the working database named by the config
    pub fn working_database(&self, config: &WorkspaceConfig) -> PathBuf {
        self.root.join(&config.working_database)
    }

    /// Get paths for a snapshot (database and JSON metadata)
    pub fn snapshot_paths(&self, name: &str) -> (PathBuf, PathBuf) {
        let db_path = self.snapshots_dir.join(format!("{}.duckdb", name));
        let json_path = self.snapshots_dir.join(format!("{}.json", name));
        (db_path, json_path)
    }

    /// Names of all snapshots with metadata, sorted by name
    pub fn list_snapshots(&self) -> Result<Vec<String>> {
        let mut snapshots = Vec::new();

        if !self.snapshots_dir.exists() {
            return Ok(snapshots);
        }

        for entry in fs::read_dir(&self.snapshots_dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                    snapshots.push(name.to_string());
                }
            }
        }

        snapshots.sort();
        Ok(snapshots)
    }

    pub fn snapshot_exists(&self, name: &str) -> bool {
        let (_, json_path) = self.snapshot_paths(name);
        json_path.exists()
    }

    /// Write the initial config file; an existing one is only replaced
    /// with `force`
    fn create_config(&self, force: bool) -> Result<()> {
        let config_path = self.config_path();

        if config_path.exists() && !force {
            return Ok(());
        }

        WorkspaceConfig::default().save(&config_path)
    }

    /// Ensure .gitignore contains querydiff entries
    pub fn ensure_gitignore(&self) -> Result<()> {
        let gitignore_path = self.root.join(".gitignore");
        let entry = ".querydiff/snapshots/*.duckdb";
        let block = format!("# Ignore querydiff snapshot databases\n{}\n", entry);

        if gitignore_path.exists() {
            let content = fs::read_to_string(&gitignore_path)?;
            if !content.contains(entry) {
                let new_content = if content.ends_with('\n') {
                    format!("{}\n{}", content, block)
                } else {
                    format!("{}\n\n{}", content, block)
                };
                fs::write(gitignore_path, new_content)?;
                log::info!("Updated .gitignore with querydiff entries");
            }
        } else {
            fs::write(gitignore_path, block)?;
            log::info!("Created .gitignore with querydiff entries");
        }

        Ok(())
    }
}
