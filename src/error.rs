//! Error types for querydiff operations

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueryDiffError>;

#[derive(Error, Debug)]
pub enum QueryDiffError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("cannot diff query, result schemas are not equal: {message}")]
    SchemaMismatch { message: String },

    #[error("Cannot diff query, query is not ordered. Add ORDER BY statement.\nquery plan:\n{plan}")]
    UnorderedResult { plan: String },

    #[error("Cannot diff query, query is not ordered. Error describing query plan: {cause}")]
    UnorderedResultNoPlan { cause: String },

    #[error("error reading {side} rows: {message}")]
    SourceRead { side: String, message: String },

    #[error("Row conversion error: {message}")]
    RowConversion { message: String },

    #[error("Failed transforming row\n{stage}\n{details}")]
    TransformFailed { stage: String, details: String },

    #[error("{message}\n\n{usage}")]
    Argument { message: String, usage: String },

    #[error("Join error: {message}")]
    Join { message: String },

    #[error("Pipeline error: {message}")]
    Pipeline { message: String },

    #[error("Query error: {message}")]
    Query { message: String },

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Snapshot not found: {name}")]
    SnapshotNotFound { name: String },

    #[error("Invalid snapshot format: {path}")]
    InvalidSnapshot { path: PathBuf },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl QueryDiffError {
    pub fn workspace(msg: impl Into<String>) -> Self {
        Self::Workspace(msg.into())
    }

    pub fn schema_mismatch(msg: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: msg.into(),
        }
    }

    pub fn source_read(side: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::SourceRead {
            side: side.into(),
            message: msg.into(),
        }
    }

    pub fn row_conversion(msg: impl Into<String>) -> Self {
        Self::RowConversion {
            message: msg.into(),
        }
    }

    pub fn join(msg: impl Into<String>) -> Self {
        Self::Join {
            message: msg.into(),
        }
    }

    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::Pipeline {
            message: msg.into(),
        }
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query {
            message: msg.into(),
        }
    }

    pub fn argument(msg: impl Into<String>, usage: impl Into<String>) -> Self {
        Self::Argument {
            message: msg.into(),
            usage: usage.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    /// Wrap an error with the revision side it happened on, keeping
    /// already-classified diff errors untouched.
    pub fn at_side(self, side: &str) -> Self {
        match self {
            Self::SourceRead { .. }
            | Self::RowConversion { .. }
            | Self::SchemaMismatch { .. }
            | Self::UnorderedResult { .. }
            | Self::UnorderedResultNoPlan { .. } => self,
            other => Self::source_read(side, other.to_string()),
        }
    }
}
