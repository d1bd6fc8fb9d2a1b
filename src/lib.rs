//! # polyrepo
//!
//! Builds and maintains a local workspace made of many repositories from a
//! hosting service. A workspace is described by repository patterns
//! (`owner/name`, `owner/name#ref`, `owner/*`); `polyrepo` expands them,
//! clones or updates each repository at its requested ref, merges every
//! repository's `package.json` into one workspace manifest that pins the
//! workspace's own packages to their local checkouts, and installs once.
//!
//! ## Quick Example
//!
//! ```no_run
//! use polyrepo::workspace::{InitOptions, Patterns, Workspace};
//!
//! let mut workspace = Workspace::new("ghp_token", "./workspace")?;
//! let patterns = Patterns::new(["acme/api", "acme-tools/*"], ["acme-tools/archive"]);
//! let report = workspace.init(&patterns, &InitOptions::default())?;
//! for failure in &report.failures {
//!     eprintln!("{}: {}", failure.full_name, failure.error);
//! }
//!
//! let run = workspace.run(|repo| {
//!     polyrepo::tools::run_shell(&repo.directory, "git status --short")
//! })?;
//! assert!(run.is_success());
//! # Ok::<(), polyrepo::error::Error>(())
//! ```
//!
//! ## Core Concepts
//!
//! - **Patterns and references (`repository`)**: parsing of `owner/name#ref`
//!   and the resolved form carrying clone URL and default branch.
//! - **Hosting (`hosting`, `github`, `cache`)**: pattern expansion, owner
//!   listing with pagination and a metadata cache, over a swappable
//!   [`hosting::HostingApi`].
//! - **Throttling (`limiter`)**: FIFO counting gates bounding API calls and
//!   git operations independently.
//! - **Checkouts (`git`)**: a [`git::GitSession`] per repository directory.
//! - **Dependencies (`manifest`, `installer`)**: manifest merge and install.
//! - **Orchestration (`workspace`)**: the `init` phases and `run`.

pub mod cache;
pub mod config;
pub mod error;
pub mod git;
pub mod github;
pub mod hosting;
pub mod installer;
pub mod limiter;
pub mod manifest;
pub mod output;
pub mod repository;
pub mod tools;
pub mod workspace;
