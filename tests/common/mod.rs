//! Shared test utilities for integration and E2E tests.
//!
//! Integration tests never talk to a real hosting service. [`LocalHosting`]
//! answers API calls from memory and hands out clone URLs that point at
//! repositories created on disk by [`Upstreams`], so `git clone` and
//! `git fetch` run for real but offline.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! let upstreams = Upstreams::new();
//! let api = LocalHosting::new().with_repo(upstreams.create("org/a", &[]));
//! ```

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use assert_fs::prelude::*;

use polyrepo::error::{Error, Result};
use polyrepo::hosting::{HostingApi, RemoteOwner, RemoteRepository, RepositoryLookup};
use polyrepo::installer::PackageInstaller;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::{git, git_output, CountingInstaller, LocalHosting, TestFixture, Upstreams};
}

/// True if the `SKIP_NETWORK_TESTS` environment variable is set.
pub fn should_skip_network_tests() -> bool {
    std::env::var("SKIP_NETWORK_TESTS").is_ok()
}

/// Run `git args` in `dir`, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Trimmed stdout of `git args` in `dir`.
pub fn git_output(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    assert!(output.status.success(), "git {:?} failed", args);
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A directory of upstream repositories, one per full name.
pub struct Upstreams {
    temp_dir: assert_fs::TempDir,
}

impl Upstreams {
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Working tree of the upstream for `full_name`.
    pub fn work_tree(&self, full_name: &str) -> PathBuf {
        self.path().join(full_name)
    }

    /// Create an upstream with `files` committed on `main` and an extra
    /// `develop` branch adding `DEVELOP.md`. Returns the matching API record.
    pub fn create(&self, full_name: &str, files: &[(&str, &str)]) -> RemoteRepository {
        let dir = self.work_tree(full_name);
        fs::create_dir_all(&dir).expect("Failed to create upstream directory");
        git(&dir, &["init", "--quiet"]);
        git(&dir, &["checkout", "--quiet", "-b", "main"]);
        git(&dir, &["config", "user.email", "dev@example.com"]);
        git(&dir, &["config", "user.name", "Dev"]);
        // Allow pushes to the checked-out branch from workspace clones.
        git(&dir, &["config", "receive.denyCurrentBranch", "updateInstead"]);

        fs::write(dir.join("README.md"), format!("# {}\n", full_name)).unwrap();
        for (path, content) in files {
            let target = dir.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(target, content).unwrap();
        }
        git(&dir, &["add", "--all"]);
        git(&dir, &["commit", "--quiet", "-m", "initial"]);

        git(&dir, &["checkout", "--quiet", "-b", "develop"]);
        fs::write(dir.join("DEVELOP.md"), "develop\n").unwrap();
        git(&dir, &["add", "DEVELOP.md"]);
        git(&dir, &["commit", "--quiet", "-m", "develop"]);
        git(&dir, &["checkout", "--quiet", "main"]);

        remote_record(full_name, &dir.to_string_lossy(), false)
    }

    /// Commit `path` with `content` on the upstream's `main`.
    pub fn commit(&self, full_name: &str, path: &str, content: &str) -> String {
        let dir = self.work_tree(full_name);
        fs::write(dir.join(path), content).unwrap();
        git(&dir, &["add", "--all"]);
        git(&dir, &["commit", "--quiet", "-m", &format!("update {}", path)]);
        git_output(&dir, &["rev-parse", "HEAD"])
    }
}

impl Upstreams {
    /// Tag the upstream's `main` with an annotated `tag`, returning the
    /// tagged commit.
    pub fn tag(&self, full_name: &str, tag: &str) -> String {
        let dir = self.work_tree(full_name);
        git(&dir, &["tag", "-a", tag, "-m", tag, "main"]);
        git_output(&dir, &["rev-parse", &format!("{}^{{commit}}", tag)])
    }
}

/// An API record whose clone URL is `clone_url`.
pub fn remote_record(full_name: &str, clone_url: &str, private: bool) -> RemoteRepository {
    let (owner, name) = full_name.split_once('/').expect("full name needs a slash");
    RemoteRepository {
        owner: RemoteOwner {
            login: owner.to_string(),
        },
        name: name.to_string(),
        full_name: full_name.to_string(),
        clone_url: clone_url.to_string(),
        default_branch: Some("main".to_string()),
        private,
    }
}

/// In-memory hosting service. Every owner with at least one repository is an
/// organization.
#[derive(Default, Clone)]
pub struct LocalHosting {
    repos: Arc<Mutex<HashMap<String, RemoteRepository>>>,
    pub lookups: Arc<AtomicUsize>,
    pub listings: Arc<AtomicUsize>,
}

impl LocalHosting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repo(self, repo: RemoteRepository) -> Self {
        self.repos
            .lock()
            .unwrap()
            .insert(repo.full_name.to_lowercase(), repo);
        self
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl HostingApi for LocalHosting {
    fn get_repository(&self, owner: &str, name: &str) -> Result<RepositoryLookup> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let key = format!("{}/{}", owner, name).to_lowercase();
        self.repos
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .map(RepositoryLookup::Found)
            .ok_or(Error::RepositoryNotFound { full_name: key })
    }

    fn list_organization_repositories(
        &self,
        organization: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RemoteRepository>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        let mut owned: Vec<RemoteRepository> = self
            .repos
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.owner.login.eq_ignore_ascii_case(organization))
            .cloned()
            .collect();
        if owned.is_empty() {
            return Err(Error::Api {
                url: format!("orgs/{}/repos", organization),
                status: 404,
                message: "Not Found".to_string(),
            });
        }
        owned.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(owned
            .into_iter()
            .skip(((page - 1) * per_page) as usize)
            .take(per_page as usize)
            .collect())
    }

    fn list_user_repositories(&self, user: &str, _page: u32, _per_page: u32) -> Result<Vec<RemoteRepository>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        Err(Error::Api {
            url: format!("users/{}/repos", user),
            status: 404,
            message: "Not Found".to_string(),
        })
    }
}

/// Installer that records where it ran instead of installing anything.
#[derive(Default, Clone)]
pub struct CountingInstaller {
    pub runs: Arc<Mutex<Vec<PathBuf>>>,
}

impl CountingInstaller {
    pub fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }
}

impl PackageInstaller for CountingInstaller {
    fn program(&self) -> &str {
        "git"
    }

    fn install(&self, directory: &Path) -> Result<()> {
        self.runs.lock().unwrap().push(directory.to_path_buf());
        Ok(())
    }
}

/// A temporary directory with an optional `.polyrepo.yaml`, for CLI tests.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a `.polyrepo.yaml` configuration file with the given content.
    pub fn with_config(self, content: &str) -> Self {
        self.temp_dir
            .child(".polyrepo.yaml")
            .write_str(content)
            .expect("Failed to write config file");
        self
    }

    /// Add a file, creating parent directories as needed.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        let child = self.temp_dir.child(path);
        if let Some(parent) = child.path().parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        child.write_str(content).expect("Failed to write file");
        self
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
