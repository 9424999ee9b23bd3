//! Revision specifier resolution

use crate::config::WorkspaceConfig;
use crate::error::{QueryDiffError, Result};
use crate::snapshot::SnapshotChain;
use crate::workspace::QueryDiffWorkspace;
use std::path::PathBuf;

pub const WORKING: &str = "WORKING";
pub const HEAD: &str = "HEAD";

/// What a revision specifier names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionSpec {
    Working,
    /// `HEAD` (0) or `HEAD~N`
    Head(usize),
    Name(String),
}

impl RevisionSpec {
    pub fn parse(s: &str) -> Self {
        let upper = s.to_uppercase();
        if upper == WORKING {
            return Self::Working;
        }
        if upper == HEAD {
            return Self::Head(0);
        }
        if let Some(n) = upper.strip_prefix("HEAD~") {
            if let Ok(n) = n.parse::<usize>() {
                return Self::Head(n);
            }
        }
        Self::Name(s.to_string())
    }
}

/// A revision located on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRevision {
    /// Specifier as the user wrote it
    pub spec: String,
    /// `WORKING` or the snapshot name
    pub name: String,
    pub database: PathBuf,
}

/// Resolves revision specifiers to database files
#[derive(Debug)]
pub struct RevisionResolver {
    workspace: QueryDiffWorkspace,
    config: WorkspaceConfig,
    chain: SnapshotChain,
}

impl RevisionResolver {
    pub fn new(workspace: QueryDiffWorkspace) -> Result<Self> {
        let config = workspace.load_config()?;
        let chain = SnapshotChain::build_chain(&workspace)?;
        Ok(Self {
            workspace,
            config,
            chain,
        })
    }

    pub fn workspace(&self) -> &QueryDiffWorkspace {
        &self.workspace
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    /// Resolve a specifier; `None` when it names nothing
    pub fn resolve(&self, spec: &str) -> Option<ResolvedRevision> {
        let name = match RevisionSpec::parse(spec) {
            RevisionSpec::Working => {
                return Some(ResolvedRevision {
                    spec: spec.to_string(),
                    name: WORKING.to_string(),
                    database: self.workspace.working_database(&self.config),
                });
            }
            RevisionSpec::Head(n) => self.chain.ancestor_of_head(n)?.name.clone(),
            RevisionSpec::Name(name) => self.chain.get(&name)?.name.clone(),
        };

        let (database, _) = self.workspace.snapshot_paths(&name);
        Some(ResolvedRevision {
            spec: spec.to_string(),
            name,
            database,
        })
    }

    /// Resolve a specifier that must exist
    pub fn require(&self, spec: &str) -> Result<ResolvedRevision> {
        self.resolve(spec).ok_or_else(|| match RevisionSpec::parse(spec) {
            RevisionSpec::Head(_) if self.chain.head.is_none() => {
                QueryDiffError::workspace(format!("'{}' does not resolve: no snapshots committed yet", spec))
            }
            _ => QueryDiffError::SnapshotNotFound {
                name: spec.to_string(),
            },
        })
    }
}

/// Revisions and leftover arguments of a query diff invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffArgs {
    pub from: String,
    pub to: String,
    pub leftover: Vec<String>,
}

/// Split `[from] [to] <query...>` into revisions and leftover arguments.
///
/// Leading arguments count as revisions only while they resolve; without
/// any, `HEAD` is compared with `WORKING`, and a single revision is compared
/// with `WORKING`.
pub fn get_diff_roots(resolver: &RevisionResolver, args: &[String]) -> DiffArgs {
    let defaults = |leftover: &[String]| DiffArgs {
        from: HEAD.to_string(),
        to: WORKING.to_string(),
        leftover: leftover.to_vec(),
    };

    let Some(first) = args.first() else {
        return defaults(args);
    };
    if resolver.resolve(first).is_none() {
        return defaults(args);
    }

    match args.get(1) {
        None => DiffArgs {
            from: first.clone(),
            to: WORKING.to_string(),
            leftover: Vec::new(),
        },
        Some(second) if resolver.resolve(second).is_none() => DiffArgs {
            from: first.clone(),
            to: WORKING.to_string(),
            leftover: args[1..].to_vec(),
        },
        Some(second) => DiffArgs {
            from: first.clone(),
            to: second.clone(),
            leftover: args[2..].to_vec(),
        },
    }
}
