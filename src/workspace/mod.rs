//! # Workspace Orchestration
//!
//! A [`Workspace`] turns a set of repository patterns into a directory of
//! synchronized checkouts with one merged, installed dependency manifest.
//!
//! ## Phases of `init`
//!
//! 0. Preflight: `git` and the installer must be runnable. Nothing on disk is
//!    touched before this passes.
//! 1. [`resolve`]: expand patterns, apply excludes, resolve each reference and
//!    bind it to `root/<name>`.
//! 2. [`prepare`]: wipe the root on `fresh`, clear stale directories.
//! 3. [`sync`]: clone or update every repository through the local limiter.
//! 4. [`dependencies`]: merge the manifests and write the workspace files.
//! 5. Install: the installer runs once at the root.
//!
//! Each phase starts after the previous one has finished for every
//! repository. Per-repository problems are collected into the
//! [`InitReport`]; only preflight, filesystem and installer failures abort.
//!
//! ## State
//!
//! `Uninitialized → Initializing → Initialized`. There is no way back: a
//! second `init` fails with [`Error::AlreadyInitialized`], including after an
//! `init` that aborted part way.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::git::GitSession;
use crate::github::GitHubApi;
use crate::hosting::{HostingApi, HostingConnection};
use crate::installer::{CommandInstaller, PackageInstaller};
use crate::limiter::RateLimiter;
use crate::manifest::DependencyConflict;
use crate::repository::{self, ResolvedRepository};
use crate::tools;

pub mod dependencies;
pub mod prepare;
pub mod resolve;
pub mod sync;

/// Which repositories belong in the workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patterns {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Patterns {
    pub fn new<I, E>(include: I, exclude: E) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        Self {
            include: include.into_iter().map(Into::into).collect(),
            exclude: exclude.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitOptions {
    /// Clear cached metadata and delete the workspace root first.
    pub fresh: bool,
    /// Show a progress bar while synchronizing.
    pub verbose: bool,
}

/// One repository in the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceRepo {
    pub directory: PathBuf,
    pub session: GitSession,
    pub repository: ResolvedRepository,
}

/// Where in `init` a repository dropped out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Resolve,
    Sync,
    Manifest,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureStage::Resolve => "resolve",
            FailureStage::Sync => "sync",
            FailureStage::Manifest => "manifest",
        })
    }
}

#[derive(Debug)]
pub struct InitFailure {
    pub full_name: String,
    pub stage: FailureStage,
    pub error: Error,
}

/// Outcome of a successful `init`.
#[derive(Debug, Default)]
pub struct InitReport {
    /// Repositories now in the workspace, sorted by full name.
    pub repos: Vec<WorkspaceRepo>,
    pub failures: Vec<InitFailure>,
    pub conflicts: Vec<DependencyConflict>,
}

impl InitReport {
    pub fn failure(&self, full_name: &str) -> Option<&InitFailure> {
        self.failures
            .iter()
            .find(|f| f.full_name.eq_ignore_ascii_case(full_name))
    }
}

/// Outcome of `run`, partitioned by repository.
#[derive(Debug, Default)]
pub struct RunReport {
    pub succeeded: Vec<WorkspaceRepo>,
    pub failed: Vec<(WorkspaceRepo, Error)>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
enum State {
    Uninitialized,
    Initializing,
    Initialized(Vec<WorkspaceRepo>),
}

pub struct Workspace {
    root: PathBuf,
    connection: HostingConnection,
    local_limiter: RateLimiter,
    installer: Box<dyn PackageInstaller>,
    state: State,
}

impl Workspace {
    /// Workspace at `root` talking to the public GitHub API with default limits.
    pub fn new(token: &str, root: impl Into<PathBuf>) -> Result<Self> {
        Self::from_config(token, root, &Config::default())
    }

    /// Workspace at `root` with the API, limits and installer from `config`.
    /// `config.root` is ignored; the caller decides the root.
    pub fn from_config(token: &str, root: impl Into<PathBuf>, config: &Config) -> Result<Self> {
        config.validate()?;
        let api = GitHubApi::new(token, &config.api.url)?;
        let connection =
            HostingConnection::with_limits(Box::new(api), config.api.concurrency, config.api.page_size);
        Ok(Self::with_components(
            root,
            connection,
            Box::new(CommandInstaller::from(&config.installer)),
            config.concurrency,
        ))
    }

    /// Workspace over an arbitrary hosting connection and installer.
    pub fn with_components(
        root: impl Into<PathBuf>,
        connection: HostingConnection,
        installer: Box<dyn PackageInstaller>,
        local_concurrency: usize,
    ) -> Self {
        Self {
            root: root.into(),
            connection,
            local_limiter: RateLimiter::new(local_concurrency),
            installer,
            state: State::Uninitialized,
        }
    }

    /// Shorthand for [`Workspace::with_components`] with a bare API.
    pub fn with_api(
        root: impl Into<PathBuf>,
        api: Box<dyn HostingApi>,
        installer: Box<dyn PackageInstaller>,
    ) -> Self {
        Self::with_components(
            root,
            HostingConnection::new(api),
            installer,
            crate::config::DEFAULT_CONCURRENCY,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn connection(&self) -> &HostingConnection {
        &self.connection
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, State::Initialized(_))
    }

    /// Build the workspace. See the module documentation for the phases.
    pub fn init(&mut self, patterns: &Patterns, options: &InitOptions) -> Result<InitReport> {
        if !matches!(self.state, State::Uninitialized) {
            return Err(Error::AlreadyInitialized);
        }

        tools::require("git")?;
        self.installer.preflight()?;

        self.state = State::Initializing;
        if options.fresh {
            self.connection.reset_cache()?;
        }

        let (resolved, unresolved) =
            repository::partition(resolve::execute(&self.connection, patterns));
        let mut failures: Vec<InitFailure> = unresolved
            .into_iter()
            .map(|(reference, error)| InitFailure {
                full_name: reference.full_name,
                stage: FailureStage::Resolve,
                error,
            })
            .collect();

        let (repos, conflicts) = resolve::assign_directories(&self.root, resolved);
        failures.extend(conflicts);

        let (repos, stale) = prepare::execute(&self.root, repos, options.fresh)?;
        failures.extend(stale);

        let (repos, unsynced) = sync::execute(repos, &self.local_limiter, options.verbose);
        failures.extend(unsynced);

        let (conflicts, unmerged) = dependencies::execute(&self.root, &repos)?;
        failures.extend(unmerged);

        self.installer.install(&self.root)?;

        for failure in &failures {
            warn!(
                "{} failed during {}: {}",
                failure.full_name, failure.stage, failure.error
            );
        }
        info!(
            "Workspace ready at {}: {} repositories, {} failed",
            self.root.display(),
            repos.len(),
            failures.len()
        );

        self.state = State::Initialized(repos.clone());
        Ok(InitReport {
            repos,
            failures,
            conflicts,
        })
    }

    /// The repositories of an initialized workspace, sorted by full name.
    pub fn repos(&self) -> Result<&[WorkspaceRepo]> {
        match &self.state {
            State::Initialized(repos) => Ok(repos),
            _ => Err(Error::NotInitialized),
        }
    }

    /// Apply `operation` to every repository in turn. A failing repository
    /// does not stop the rest.
    pub fn run<F>(&self, mut operation: F) -> Result<RunReport>
    where
        F: FnMut(&WorkspaceRepo) -> Result<()>,
    {
        let mut report = RunReport::default();
        for repo in self.repos()? {
            match operation(repo) {
                Ok(()) => report.succeeded.push(repo.clone()),
                Err(error) => {
                    warn!("{}: {}", repo.repository.full_name(), error);
                    report.failed.push((repo.clone(), error));
                }
            }
        }
        Ok(report)
    }
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("root", &self.root)
            .field("installer", &self.installer.program())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosting::{RemoteRepository, RepositoryLookup};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Hosting API with no repositories at all.
    struct EmptyHosting;

    impl HostingApi for EmptyHosting {
        fn get_repository(&self, owner: &str, name: &str) -> Result<RepositoryLookup> {
            Err(Error::RepositoryNotFound {
                full_name: format!("{}/{}", owner, name),
            })
        }

        fn list_organization_repositories(&self, _: &str, _: u32, _: u32) -> Result<Vec<RemoteRepository>> {
            Ok(Vec::new())
        }

        fn list_user_repositories(&self, _: &str, _: u32, _: u32) -> Result<Vec<RemoteRepository>> {
            Ok(Vec::new())
        }
    }

    #[derive(Clone, Default)]
    struct CountingInstaller {
        installs: Arc<AtomicUsize>,
    }

    impl PackageInstaller for CountingInstaller {
        fn program(&self) -> &str {
            "git"
        }

        fn install(&self, _directory: &Path) -> Result<()> {
            self.installs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct MissingInstaller;

    impl PackageInstaller for MissingInstaller {
        fn program(&self) -> &str {
            "polyrepo-no-such-installer"
        }

        fn install(&self, _directory: &Path) -> Result<()> {
            unreachable!("preflight must fail first")
        }
    }

    struct FailingInstaller;

    impl PackageInstaller for FailingInstaller {
        fn program(&self) -> &str {
            "git"
        }

        fn install(&self, _directory: &Path) -> Result<()> {
            Err(Error::CommandFailed {
                command: "pnpm install".to_string(),
                stderr: "ERR_PNPM_FETCH_404".to_string(),
            })
        }
    }

    fn workspace(root: &Path, installer: Box<dyn PackageInstaller>) -> Workspace {
        Workspace::with_api(root, Box::new(EmptyHosting), installer)
    }

    #[test]
    fn test_repos_before_init() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(temp.path(), Box::new(CountingInstaller::default()));
        assert!(!ws.is_initialized());
        assert!(matches!(ws.repos(), Err(Error::NotInitialized)));
        assert!(matches!(ws.run(|_| Ok(())), Err(Error::NotInitialized)));
    }

    #[test]
    fn test_init_with_unresolvable_patterns() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("ws");
        let installer = CountingInstaller::default();
        let mut ws = workspace(&root, Box::new(installer.clone()));

        let patterns = Patterns::new(["acme/missing", "not-a-pattern"], Vec::<String>::new());
        let report = ws.init(&patterns, &InitOptions::default()).unwrap();

        assert!(report.repos.is_empty());
        assert_eq!(report.failures.len(), 1);
        let failure = report.failure("acme/missing").unwrap();
        assert_eq!(failure.stage, FailureStage::Resolve);
        assert!(matches!(failure.error, Error::RepositoryNotFound { .. }));
        assert_eq!(installer.installs.load(Ordering::SeqCst), 1);
        assert!(root.join("package.json").exists());
        assert!(ws.is_initialized());
        assert!(ws.repos().unwrap().is_empty());
    }

    #[test]
    fn test_second_init_fails() {
        let temp = TempDir::new().unwrap();
        let mut ws = workspace(temp.path(), Box::new(CountingInstaller::default()));
        ws.init(&Patterns::default(), &InitOptions::default()).unwrap();

        assert!(matches!(
            ws.init(&Patterns::default(), &InitOptions::default()),
            Err(Error::AlreadyInitialized)
        ));
        assert!(ws.is_initialized());
    }

    #[test]
    fn test_preflight_failure_touches_nothing() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("ws");
        let mut ws = workspace(&root, Box::new(MissingInstaller));

        let err = ws
            .init(&Patterns::default(), &InitOptions { fresh: true, verbose: false })
            .unwrap_err();

        assert!(matches!(err, Error::MissingDependency { ref tool } if tool == "polyrepo-no-such-installer"));
        assert!(!root.exists());
        assert!(!ws.is_initialized());
        assert!(matches!(ws.repos(), Err(Error::NotInitialized)));
    }

    #[test]
    fn test_installer_failure_is_fatal_and_final() {
        let temp = TempDir::new().unwrap();
        let mut ws = workspace(temp.path(), Box::new(FailingInstaller));

        assert!(matches!(
            ws.init(&Patterns::default(), &InitOptions::default()),
            Err(Error::CommandFailed { .. })
        ));
        assert!(matches!(ws.repos(), Err(Error::NotInitialized)));
        assert!(matches!(
            ws.init(&Patterns::default(), &InitOptions::default()),
            Err(Error::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_debug_does_not_need_initialized_state() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(temp.path(), Box::new(CountingInstaller::default()));
        let debug = format!("{:?}", ws);
        assert!(debug.contains("Uninitialized"));
        assert!(debug.contains("git"));
    }

    #[test]
    fn test_failure_stage_display() {
        assert_eq!(FailureStage::Resolve.to_string(), "resolve");
        assert_eq!(FailureStage::Sync.to_string(), "sync");
        assert_eq!(FailureStage::Manifest.to_string(), "manifest");
    }
}
