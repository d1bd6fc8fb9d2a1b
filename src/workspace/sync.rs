//! Phase 3: Synchronization
//!
//! Brings every repository directory to its target ref. Repositories are
//! processed on the rayon pool, but at most `limiter.max_concurrent()` git
//! operations run at once. One repository failing does not stop the others.

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rayon::prelude::*;

use super::{FailureStage, InitFailure, WorkspaceRepo};
use crate::error::Result;
use crate::git::DEFAULT_REMOTE;
use crate::limiter::RateLimiter;

/// Synchronize `repos`, returning those that succeeded (in input order) and a
/// failure record for each that did not.
pub fn execute(
    repos: Vec<WorkspaceRepo>,
    limiter: &RateLimiter,
    verbose: bool,
) -> (Vec<WorkspaceRepo>, Vec<InitFailure>) {
    info!(
        "Synchronizing {} repositories ({} at a time)",
        repos.len(),
        limiter.max_concurrent()
    );
    let progress = progress_bar(repos.len(), verbose);

    let outcomes: Vec<(WorkspaceRepo, Result<()>)> = repos
        .into_par_iter()
        .map(|repo| {
            let outcome = limiter.schedule(|| synchronize(&repo));
            progress.set_message(repo.repository.full_name().to_string());
            progress.inc(1);
            (repo, outcome)
        })
        .collect();
    progress.finish_and_clear();

    let mut synced = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    for (repo, outcome) in outcomes {
        match outcome {
            Ok(()) => synced.push(repo),
            Err(error) => {
                warn!("Failed to synchronize {}: {}", repo.repository.full_name(), error);
                failures.push(InitFailure {
                    full_name: repo.repository.full_name().to_string(),
                    stage: FailureStage::Sync,
                    error,
                });
            }
        }
    }
    (synced, failures)
}

/// Bring one repository to its target ref.
///
/// An existing working copy is fetched and scrubbed of local changes; anything
/// else is cloned. The target is then checked out and, when it names a branch
/// on `origin`, moved to the fetched tip.
pub fn synchronize(repo: &WorkspaceRepo) -> Result<()> {
    let session = &repo.session;
    let target = repo.repository.target_ref();

    if session.is_initialized() {
        debug!("updating {}", session.directory().display());
        session.fetch(None)?;
        session.reset_hard()?;
    } else {
        debug!(
            "cloning {} into {}",
            repo.repository.clone_url(),
            session.directory().display()
        );
        session.clone_from(repo.repository.clone_url())?;
    }

    session.checkout(target)?;
    if session.has_remote_branch(DEFAULT_REMOTE, target) {
        session.fast_forward(DEFAULT_REMOTE, target)?;
    }
    Ok(())
}

fn progress_bar(len: usize, verbose: bool) -> ProgressBar {
    if !verbose {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar
}
