//! Command-line interface for querydiff

use crate::config::ColorMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Usage text printed with query-diff argument errors
pub const QUERY_DIFF_USAGE: &str = "\
usage: querydiff query-diff [<from_revision>] [<to_revision>] <query>

Runs <query> against both revisions and shows the rows that differ.
Revisions are WORKING, HEAD, HEAD~N or a snapshot name. Without revisions
HEAD is compared with WORKING; with one, it is compared with WORKING.
The query must end in an ORDER BY over its result columns.";

#[derive(Parser)]
#[command(name = "querydiff")]
#[command(about = "Diff the results of a SQL query between two snapshots of a dataset")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override workspace location
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Log level before `RUST_LOG` is applied
    pub fn log_level(&self) -> log::LevelFilter {
        if self.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize querydiff workspace
    Init {
        /// Overwrite an existing workspace config
        #[arg(long)]
        force: bool,
    },

    /// Snapshot the working database
    Commit {
        /// Name for the snapshot
        #[arg(long)]
        name: String,

        /// Description stored with the snapshot
        #[arg(short, long)]
        message: Option<String>,
    },

    /// List snapshots, newest first
    Log {
        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },

    /// Diff the results of a query between two revisions
    QueryDiff {
        /// Color output: "auto", "always", "never" (defaults to the workspace config)
        #[arg(long)]
        color: Option<String>,

        /// [from] [to] query
        #[arg(num_args = 0.., allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

/// Parse output format string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    Pretty,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {}. Use 'pretty' or 'json'", s)),
        }
    }
}

/// Parse a color mode string
pub fn parse_color_mode(s: &str) -> Result<ColorMode, String> {
    match s.to_lowercase().as_str() {
        "auto" => Ok(ColorMode::Auto),
        "always" => Ok(ColorMode::Always),
        "never" => Ok(ColorMode::Never),
        _ => Err(format!("Invalid color mode: {}. Use 'auto', 'always' or 'never'", s)),
    }
}
