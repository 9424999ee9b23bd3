//! Output formatting utilities

use crate::error::Result;
use crate::session::DiffSummary;
use crate::snapshot::SnapshotMetadata;
use crate::workspace::QueryDiffWorkspace;

/// Pretty printer for querydiff output
pub struct PrettyPrinter;

impl PrettyPrinter {
    pub fn print_init(workspace: &QueryDiffWorkspace, working_database: &std::path::Path) {
        println!("✅ Initialized querydiff workspace at: {}", workspace.root.display());
        println!("├─ Workspace directory: {}", workspace.querydiff_dir.display());
        println!("└─ Working database: {}", working_database.display());
    }

    pub fn print_commit(metadata: &SnapshotMetadata) {
        println!("📸 Committed snapshot: {}", metadata.name);
        println!("├─ Parent: {}", metadata.parent.as_deref().unwrap_or("none"));
        println!("├─ Size: {}", format_bytes(metadata.size_bytes));
        println!("└─ Hash: {}", short_hash(&metadata.content_hash));
    }

    /// Print snapshots newest first, marking `head`
    pub fn print_snapshot_log<'a>(
        snapshots: impl IntoIterator<Item = &'a SnapshotMetadata>,
        head: Option<&str>,
    ) {
        let lines = snapshot_log_lines(snapshots, head);
        if lines.is_empty() {
            println!("No snapshots found.");
            return;
        }
        println!("📸 Snapshots:");
        for line in lines {
            println!("{}", line);
        }
    }

    /// Summary of a finished diff, written to stderr so stdout holds only rows
    pub fn print_diff_summary(from: &str, to: &str, summary: &DiffSummary) {
        if summary.is_empty() {
            eprintln!("✅ No differences between {} and {}", from, to);
        } else {
            eprintln!("🔍 {} → {}", from, to);
            eprintln!("├─ Rows only in {}: {}", from, summary.removed);
            eprintln!("└─ Rows only in {}: {}", to, summary.added);
        }
    }
}

/// Tree lines for a snapshot listing
pub fn snapshot_log_lines<'a>(
    snapshots: impl IntoIterator<Item = &'a SnapshotMetadata>,
    head: Option<&str>,
) -> Vec<String> {
    let snapshots: Vec<_> = snapshots.into_iter().collect();
    let last = snapshots.len().saturating_sub(1);

    let mut lines = Vec::new();
    for (i, snapshot) in snapshots.iter().enumerate() {
        let (prefix, indent) = if i == last { ("└─", "   ") } else { ("├─", "│  ") };
        let marker = if head == Some(snapshot.name.as_str()) { " (HEAD)" } else { "" };
        lines.push(format!(
            "{} {}{}  {}  {}",
            prefix,
            snapshot.name,
            marker,
            snapshot.created.format("%Y-%m-%d %H:%M:%S"),
            format_bytes(snapshot.size_bytes)
        ));
        if let Some(message) = &snapshot.message {
            lines.push(format!("{}  {}", indent, message));
        }
    }
    lines
}

pub struct JsonFormatter;

impl JsonFormatter {
    /// Format any serializable data as JSON
    pub fn format<T: serde::Serialize + ?Sized>(data: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

/// Format bytes in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
