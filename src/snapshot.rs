//! Snapshot creation and management

use crate::error::{QueryDiffError, Result};
use crate::progress::create_file_progress;
use crate::workspace::QueryDiffWorkspace;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;

/// Snapshot metadata stored in JSON format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub format_version: String,
    pub name: String,
    #[serde(default)]
    pub message: Option<String>,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub sequence_number: u64,
    /// blake3 of the database file
    pub content_hash: String,
    pub size_bytes: u64,
}

/// Names that would shadow revision specifiers
fn validate_name(name: &str) -> Result<()> {
    let upper = name.to_uppercase();
    if name.trim().is_empty() {
        return Err(QueryDiffError::invalid_input("snapshot name must not be empty"));
    }
    if upper == "WORKING" || upper == "HEAD" || upper.starts_with("HEAD~") {
        return Err(QueryDiffError::invalid_input(format!(
            "'{}' is a reserved revision name",
            name
        )));
    }
    if name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(QueryDiffError::invalid_input(format!(
            "invalid snapshot name '{}'",
            name
        )));
    }
    Ok(())
}

/// blake3 hex digest of a file's contents
pub fn hash_file(path: &Path) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    let mut reader = BufReader::new(File::open(path)?);
    io::copy(&mut reader, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}

/// Fold any write-ahead log into the database file so the file alone holds
/// every committed change
fn checkpoint_database(path: &Path) -> Result<()> {
    let connection = duckdb::Connection::open(path)?;
    connection.execute_batch("CHECKPOINT;")?;
    log::debug!("checkpointed {}", path.display());
    Ok(())
}

/// Commits the working database into immutable snapshots
pub struct SnapshotCreator {
    show_progress: bool,
}

impl SnapshotCreator {
    pub fn new(show_progress: bool) -> Self {
        Self { show_progress }
    }

    /// Copy `working_db` into the workspace as snapshot `name`
    pub fn commit(
        &self,
        workspace: &QueryDiffWorkspace,
        working_db: &Path,
        name: &str,
        message: Option<String>,
    ) -> Result<SnapshotMetadata> {
        validate_name(name)?;

        if workspace.snapshot_exists(name) {
            return Err(QueryDiffError::invalid_input(format!(
                "snapshot '{}' already exists",
                name
            )));
        }
        if !working_db.is_file() {
            return Err(QueryDiffError::workspace(format!(
                "working database not found: {}",
                working_db.display()
            )));
        }

        checkpoint_database(working_db)?;
        let content_hash = hash_file(working_db)?;
        let chain = SnapshotChain::build_chain(workspace)?;
        let parent = chain.head_metadata();

        if let Some(head) = parent {
            if head.content_hash == content_hash {
                return Err(QueryDiffError::invalid_input(format!(
                    "nothing to commit, working database matches snapshot '{}'",
                    head.name
                )));
            }
        }

        let (db_path, json_path) = workspace.snapshot_paths(name);
        fs::create_dir_all(&workspace.snapshots_dir)?;
        let size_bytes = self.copy_database(working_db, &db_path)?;

        let metadata = SnapshotMetadata {
            format_version: crate::FORMAT_VERSION.to_string(),
            name: name.to_string(),
            message,
            created: Utc::now(),
            parent: parent.map(|p| p.name.clone()),
            sequence_number: parent.map_or(0, |p| p.sequence_number + 1),
            content_hash,
            size_bytes,
        };

        fs::write(&json_path, serde_json::to_string_pretty(&metadata)?)?;
        log::info!(
            "Committed snapshot '{}' ({} bytes, parent: {})",
            metadata.name,
            metadata.size_bytes,
            metadata.parent.as_deref().unwrap_or("none")
        );

        Ok(metadata)
    }

    fn copy_database(&self, from: &Path, to: &Path) -> Result<u64> {
        let total = fs::metadata(from)?.len();
        let pb = create_file_progress(total, "Copying database", self.show_progress);

        let mut reader = BufReader::new(File::open(from)?);
        let mut writer = pb.wrap_write(File::create(to)?);
        let copied = io::copy(&mut reader, &mut writer)?;

        pb.finish_and_clear();
        Ok(copied)
    }
}

/// Snapshot loader for reading existing snapshots
pub struct SnapshotLoader;

impl SnapshotLoader {
    /// Load snapshot metadata from JSON file
    pub fn load_metadata<P: AsRef<Path>>(json_path: P) -> Result<SnapshotMetadata> {
        let path = json_path.as_ref();
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|_| QueryDiffError::InvalidSnapshot {
            path: path.to_path_buf(),
        })
    }
}

/// All snapshots of a workspace, oldest first
#[derive(Debug, Clone)]
pub struct SnapshotChain {
    pub snapshots: Vec<SnapshotMetadata>,
    pub head: Option<String>,
}

impl SnapshotChain {
    /// Build snapshot chain from workspace
    pub fn build_chain(workspace: &QueryDiffWorkspace) -> Result<Self> {
        let mut snapshots = Vec::new();

        for name in workspace.list_snapshots()? {
            let (_, json_path) = workspace.snapshot_paths(&name);
            snapshots.push(SnapshotLoader::load_metadata(&json_path)?);
        }

        // Sort by sequence number and creation time
        snapshots.sort_by(|a, b| {
            a.sequence_number
                .cmp(&b.sequence_number)
                .then_with(|| a.created.cmp(&b.created))
        });

        let head = snapshots.last().map(|s| s.name.clone());

        Ok(Self { snapshots, head })
    }

    pub fn get(&self, name: &str) -> Option<&SnapshotMetadata> {
        self.snapshots.iter().find(|s| s.name == name)
    }

    pub fn head_metadata(&self) -> Option<&SnapshotMetadata> {
        self.head.as_deref().and_then(|name| self.get(name))
    }

    pub fn get_parent(&self, snapshot: &str) -> Option<&SnapshotMetadata> {
        self.get(snapshot)
            .and_then(|s| s.parent.as_deref())
            .and_then(|parent| self.get(parent))
    }

    /// The snapshot `generations` parents behind head
    pub fn ancestor_of_head(&self, generations: usize) -> Option<&SnapshotMetadata> {
        let mut current = self.head_metadata()?;
        for _ in 0..generations {
            current = self.get_parent(&current.name)?;
        }
        Some(current)
    }

    /// Newest first, for display
    pub fn newest_first(&self) -> impl Iterator<Item = &SnapshotMetadata> {
        self.snapshots.iter().rev()
    }
}
