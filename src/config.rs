//! Workspace configuration stored in `.querydiff/config.json`

use crate::error::{QueryDiffError, Result};
use crate::pipeline::DEFAULT_BUFFER_SIZE;
use crate::transforms::{DEFAULT_FWT_MAX_WIDTH, DEFAULT_FWT_SAMPLE_ROWS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default name of the working database, relative to the workspace root
pub const DEFAULT_WORKING_DATABASE: &str = "data.duckdb";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn enabled(&self, is_terminal: bool) -> bool {
        match self {
            ColorMode::Auto => is_terminal,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

/// Tuning for the diff pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Queue capacity between pipeline workers
    pub buffer_size: usize,
    /// Rows sampled before fixed-width columns are sized
    pub fwt_sample_rows: usize,
    pub fwt_max_width: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            fwt_sample_rows: DEFAULT_FWT_SAMPLE_ROWS,
            fwt_max_width: DEFAULT_FWT_MAX_WIDTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub format_version: String,
    pub created: DateTime<Utc>,
    pub working_database: String,
    pub pipeline: PipelineConfig,
    pub color: ColorMode,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            format_version: crate::FORMAT_VERSION.to_string(),
            created: Utc::now(),
            working_database: DEFAULT_WORKING_DATABASE.to_string(),
            pipeline: PipelineConfig::default(),
            color: ColorMode::default(),
        }
    }
}

impl WorkspaceConfig {
    /// Read and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            QueryDiffError::config(format!("{} is not valid: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config at `path`, or defaults when there is none
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.buffer_size <= 1 {
            return Err(QueryDiffError::config(format!(
                "pipeline.buffer_size must be greater than 1, got {}",
                self.pipeline.buffer_size
            )));
        }
        if self.pipeline.fwt_sample_rows == 0 {
            return Err(QueryDiffError::config(
                "pipeline.fwt_sample_rows must be greater than 0",
            ));
        }
        if self.pipeline.fwt_max_width == 0 {
            return Err(QueryDiffError::config(
                "pipeline.fwt_max_width must be greater than 0",
            ));
        }
        if self.working_database.trim().is_empty() {
            return Err(QueryDiffError::config("working_database must not be empty"));
        }
        Ok(())
    }
}
