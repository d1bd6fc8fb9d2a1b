//! Phase 1: Target Resolution
//!
//! Expands the include patterns, drops excluded repositories and resolves every
//! remaining reference concurrently. Each reference is resolved on its own; a
//! failure becomes a [`Resolution::Failed`] entry and never stops the others.
//!
//! Resolved repositories are then bound to their local directories
//! (`root/<name>`). Two repositories with the same short name cannot share a
//! directory; the first in full-name order keeps it.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use log::{debug, info};
use rayon::prelude::*;

use super::{FailureStage, InitFailure, Patterns, WorkspaceRepo};
use crate::error::Error;
use crate::git::GitSession;
use crate::hosting::HostingConnection;
use crate::repository::{RepositoryReference, Resolution, ResolvedRepository};

/// Expand, filter and resolve `patterns`.
pub fn execute(connection: &HostingConnection, patterns: &Patterns) -> Vec<Resolution> {
    let references = filter_excluded(connection.expand_patterns(&patterns.include), &patterns.exclude);
    info!("Resolving {} repositories", references.len());

    references
        .into_par_iter()
        .map(|reference| match connection.resolve(&reference) {
            Ok(repo) => {
                debug!("resolved {} at {}", repo.full_name(), repo.r#ref);
                Resolution::Resolved(repo)
            }
            Err(error) => Resolution::Failed { reference, error },
        })
        .collect()
}

/// Drop references whose full name matches an exclude entry, ignoring case.
pub fn filter_excluded<S: AsRef<str>>(
    references: Vec<RepositoryReference>,
    exclude: &[S],
) -> Vec<RepositoryReference> {
    let excluded: HashSet<String> = exclude
        .iter()
        .map(|e| e.as_ref().trim().to_lowercase())
        .collect();

    references
        .into_iter()
        .filter(|reference| {
            let keep = !excluded.contains(&reference.key());
            if !keep {
                debug!("excluding {}", reference.full_name);
            }
            keep
        })
        .collect()
}

/// Bind each resolved repository to `root/<name>` and a session on it.
pub fn assign_directories(
    root: &Path,
    mut resolved: Vec<ResolvedRepository>,
) -> (Vec<WorkspaceRepo>, Vec<InitFailure>) {
    resolved.sort_by_key(|r| r.full_name().to_lowercase());

    // Directory names compared without case for case-insensitive filesystems.
    let mut taken: HashMap<String, String> = HashMap::new();
    let mut repos = Vec::with_capacity(resolved.len());
    let mut failures = Vec::new();

    for repository in resolved {
        let directory = root.join(repository.name());
        let slot = repository.name().to_lowercase();

        if let Some(existing) = taken.get(&slot) {
            failures.push(InitFailure {
                full_name: repository.full_name().to_string(),
                stage: FailureStage::Resolve,
                error: Error::DirectoryConflict {
                    full_name: repository.full_name().to_string(),
                    directory: directory.display().to_string(),
                    existing: existing.clone(),
                },
            });
            continue;
        }

        taken.insert(slot, repository.full_name().to_string());
        repos.push(WorkspaceRepo {
            session: GitSession::new(&directory),
            directory,
            repository,
        });
    }

    (repos, failures)
}
