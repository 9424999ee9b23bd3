//! # querydiff
//!
//! Diffs the results of one SQL query between two snapshots of a dataset.
//! Both ordered results are merged side by side, and the rows present on
//! only one side stream through a staged pipeline into a colored table.

pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod joiner;
pub mod merger;
pub mod ordering;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod resolver;
pub mod row;
pub mod session;
pub mod sink;
pub mod snapshot;
pub mod source;
pub mod transforms;
pub mod workspace;

pub use error::{QueryDiffError, Result};
pub use resolver::RevisionResolver;
pub use session::{diff_query, DiffOptions, DiffSummary};
pub use workspace::QueryDiffWorkspace;

/// Current format version for querydiff files
pub const FORMAT_VERSION: &str = "1.0.0";
