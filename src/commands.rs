//! Command implementations for querydiff CLI

use crate::cli::{parse_color_mode, Commands, OutputFormat, QUERY_DIFF_USAGE};
use crate::engine::DuckDbEngine;
use crate::error::{QueryDiffError, Result};
use crate::output::{JsonFormatter, PrettyPrinter};
use crate::progress::ProgressReporter;
use crate::resolver::{get_diff_roots, RevisionResolver};
use crate::session::{diff_query, DiffOptions, DiffSummary};
use crate::sink::ColorDiffSink;
use crate::snapshot::{SnapshotChain, SnapshotCreator};
use crate::workspace::QueryDiffWorkspace;
use std::io::IsTerminal;
use std::path::Path;

/// Execute a command
pub fn execute_command(command: Commands, workspace_path: Option<&Path>) -> Result<()> {
    match command {
        Commands::Init { force } => init_command(workspace_path, force),
        Commands::Commit { name, message } => commit_command(workspace_path, &name, message),
        Commands::Log { format } => log_command(workspace_path, &format),
        Commands::QueryDiff { color, args } => {
            query_diff_command(workspace_path, color.as_deref(), &args).map(|_| ())
        }
    }
}

/// Initialize querydiff workspace
fn init_command(workspace_path: Option<&Path>, force: bool) -> Result<()> {
    let current_dir = std::env::current_dir()?;
    let root = workspace_path.unwrap_or(&current_dir);

    // init never searches parent directories
    let workspace = QueryDiffWorkspace::create_new(root.to_path_buf(), force)?;
    let config = workspace.load_config()?;

    PrettyPrinter::print_init(&workspace, &workspace.working_database(&config));
    Ok(())
}

/// Snapshot the working database
fn commit_command(workspace_path: Option<&Path>, name: &str, message: Option<String>) -> Result<()> {
    let workspace = QueryDiffWorkspace::find(workspace_path)?;
    let config = workspace.load_config()?;
    let working_db = workspace.working_database(&config);

    let progress = ProgressReporter::new();
    let creator = SnapshotCreator::new(progress.is_visible());
    let metadata = creator.commit(&workspace, &working_db, name, message)?;

    PrettyPrinter::print_commit(&metadata);
    Ok(())
}

/// List snapshots, newest first
fn log_command(workspace_path: Option<&Path>, format: &str) -> Result<()> {
    let output_format = OutputFormat::parse(format).map_err(QueryDiffError::invalid_input)?;

    let workspace = QueryDiffWorkspace::find(workspace_path)?;
    let chain = SnapshotChain::build_chain(&workspace)?;

    match output_format {
        OutputFormat::Pretty => {
            PrettyPrinter::print_snapshot_log(chain.newest_first(), chain.head.as_deref())
        }
        OutputFormat::Json => {
            let snapshots: Vec<_> = chain.newest_first().collect();
            println!("{}", JsonFormatter::format(&snapshots)?);
        }
    }
    Ok(())
}

/// Diff a query between two revisions, writing the rows to stdout
pub fn query_diff_command(
    workspace_path: Option<&Path>,
    color: Option<&str>,
    args: &[String],
) -> Result<DiffSummary> {
    let color = color
        .map(parse_color_mode)
        .transpose()
        .map_err(|e| QueryDiffError::argument(e, QUERY_DIFF_USAGE))?;

    let workspace = QueryDiffWorkspace::find(workspace_path)?;
    let resolver = RevisionResolver::new(workspace)?;

    let roots = get_diff_roots(&resolver, args);
    let query = match roots.leftover.as_slice() {
        [] => return Err(QueryDiffError::argument("missing query", QUERY_DIFF_USAGE)),
        [query] => query.as_str(),
        extra => {
            return Err(QueryDiffError::argument(
                format!("too many arguments: {}", extra.join(" ")),
                QUERY_DIFF_USAGE,
            ))
        }
    };

    let mut progress = ProgressReporter::new();
    progress.step("Resolving revisions...");
    let from = resolver.require(&roots.from)?;
    let to = resolver.require(&roots.to)?;
    log::debug!(
        "Diffing {} ({}) against {} ({})",
        from.name,
        from.database.display(),
        to.name,
        to.database.display()
    );

    progress.step("Opening databases...");
    let from_engine = DuckDbEngine::open(&from.database)?;
    let to_engine = DuckDbEngine::open(&to.database)?;

    let config = resolver.config();
    let options = DiffOptions {
        buffer_size: config.pipeline.buffer_size,
        fwt_sample_rows: config.pipeline.fwt_sample_rows,
        fwt_max_width: config.pipeline.fwt_max_width,
        ..DiffOptions::default()
    };
    let use_color = color
        .unwrap_or(config.color)
        .enabled(std::io::stdout().is_terminal());

    // rows stream to stdout from here on
    progress.clear();

    let summary = diff_query(
        &from_engine,
        &to_engine,
        query,
        ColorDiffSink::stdout(use_color),
        options,
    )?;

    log::info!(
        "Diff finished in {:.2?}: {} removed, {} added",
        progress.elapsed(),
        summary.removed,
        summary.added
    );
    PrettyPrinter::print_diff_summary(&from.name, &to.name, &summary);
    Ok(summary)
}
