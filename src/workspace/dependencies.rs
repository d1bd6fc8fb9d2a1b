//! Phase 4: Manifest Merge
//!
//! Starts only after every sync task has settled. Collects each synchronized
//! repository's manifest, merges them and writes the workspace files. The
//! installer runs afterwards, from the orchestrator.

use std::path::Path;

use log::{debug, info};

use super::{FailureStage, InitFailure, WorkspaceRepo};
use crate::error::Result;
use crate::manifest::{self, DependencyConflict, LocalPackage, PackageManifest};

/// Merge the manifests of `repos` into `root`.
///
/// A repository whose manifest cannot be read stays in the workspace but
/// contributes nothing; it is reported as a [`FailureStage::Manifest`] failure.
/// Writing the merged files is fatal on error.
pub fn execute(
    root: &Path,
    repos: &[WorkspaceRepo],
) -> Result<(Vec<DependencyConflict>, Vec<InitFailure>)> {
    let mut packages = Vec::new();
    let mut failures = Vec::new();

    for repo in repos {
        match collect(repo) {
            Ok(Some(package)) => packages.push(package),
            Ok(None) => debug!("{} has no {}", repo.repository.full_name(), manifest::MANIFEST_FILE),
            Err(error) => failures.push(InitFailure {
                full_name: repo.repository.full_name().to_string(),
                stage: FailureStage::Manifest,
                error,
            }),
        }
    }

    info!("Merging {} package manifests", packages.len());
    let merged = manifest::merge(&packages)?;
    manifest::write_workspace_files(root, &merged)?;

    Ok((merged.conflicts, failures))
}

fn collect(repo: &WorkspaceRepo) -> Result<Option<LocalPackage>> {
    let Some(manifest) = PackageManifest::read(&repo.directory)? else {
        return Ok(None);
    };
    Ok(Some(LocalPackage {
        source: repo.repository.full_name().to_string(),
        directory: repo.directory.clone(),
        head_revision: repo.session.head_revision()?,
        manifest,
    }))
}
