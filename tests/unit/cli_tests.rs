//! Unit tests for CLI parsing

use clap::Parser;
use querydiff::cli::{parse_color_mode, Cli, Commands, OutputFormat};
use querydiff::config::ColorMode;

fn parse(args: &[&str]) -> Cli {
    let mut full = vec!["querydiff"];
    full.extend(args);
    Cli::try_parse_from(full).expect("arguments should parse")
}

#[test]
fn test_init_parsing() {
    match parse(&["init"]).command {
        Commands::Init { force } => assert!(!force),
        _ => panic!("expected init"),
    }
    match parse(&["init", "--force"]).command {
        Commands::Init { force } => assert!(force),
        _ => panic!("expected init"),
    }
}

#[test]
fn test_commit_parsing() {
    match parse(&["commit", "--name", "v1", "-m", "first load"]).command {
        Commands::Commit { name, message } => {
            assert_eq!(name, "v1");
            assert_eq!(message.as_deref(), Some("first load"));
        }
        _ => panic!("expected commit"),
    }
}

#[test]
fn test_commit_requires_name() {
    assert!(Cli::try_parse_from(["querydiff", "commit"]).is_err());
}

#[test]
fn test_log_default_format() {
    match parse(&["log"]).command {
        Commands::Log { format } => assert_eq!(OutputFormat::parse(&format), Ok(OutputFormat::Pretty)),
        _ => panic!("expected log"),
    }
}

#[test]
fn test_query_diff_without_arguments_parses() {
    match parse(&["query-diff"]).command {
        Commands::QueryDiff { args, .. } => assert!(args.is_empty()),
        _ => panic!("expected query-diff"),
    }
}

#[test]
fn test_query_diff_with_revisions_and_color() {
    let cli = parse(&["query-diff", "--color", "never", "v1", "v2", "SELECT 1 ORDER BY 1"]);
    match cli.command {
        Commands::QueryDiff { args, color } => {
            assert_eq!(args, vec!["v1", "v2", "SELECT 1 ORDER BY 1"]);
            assert_eq!(color.as_deref().map(parse_color_mode), Some(Ok(ColorMode::Never)));
        }
        _ => panic!("expected query-diff"),
    }
}

#[test]
fn test_global_flags() {
    let cli = parse(&["--verbose", "--workspace", "/tmp/data", "log"]);
    assert!(cli.verbose);
    assert_eq!(cli.workspace.as_deref(), Some(std::path::Path::new("/tmp/data")));
}

#[test]
fn test_verbose_selects_debug_logging() {
    assert_eq!(parse(&["log"]).log_level(), log::LevelFilter::Info);
    assert_eq!(parse(&["log", "-v"]).log_level(), log::LevelFilter::Debug);
}
