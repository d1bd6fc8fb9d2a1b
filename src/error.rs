//! # Error Handling
//!
//! This module defines the centralized error type for `polyrepo`. It uses the
//! `thiserror` library to derive an `Error` enum covering every anticipated
//! failure mode of workspace synchronization, with enough context in each
//! variant to tell the user which repository, command, or tool was involved.
//!
//! ## Failure Classes
//!
//! - **Per-pattern**: `MalformedPattern` is recovered locally. The pattern is
//!   skipped and a warning is logged.
//! - **Per-repository**: `RepositoryNotFound`, `RepositoryMoved`, `Api`,
//!   `Network`, `DirectoryConflict`, `RefNotFound` and `CommandFailed` are
//!   attributed to one repository and collected into reports instead of aborting a batch.
//! - **Preconditions**: `MissingDependency`, `AlreadyInitialized` and
//!   `NotInitialized` abort the call before any repository-level work starts.
//!
//! `Result<T>` is the crate-wide alias for `std::result::Result<T, Error>`.

use thiserror::Error;

/// Main error type for polyrepo operations
#[derive(Error, Debug)]
pub enum Error {
    /// A repository pattern could not be parsed.
    #[error("Malformed pattern '{pattern}': {reason}")]
    MalformedPattern { pattern: String, reason: String },

    /// The hosting API has no repository with this name.
    #[error("Repository not found: {full_name}")]
    RepositoryNotFound { full_name: String },

    /// The hosting API answered with a permanent redirect, which means the
    /// repository was renamed or transferred.
    #[error("Repository moved permanently: {full_name}{}", location.as_ref().map(|l| format!(" (now at {})", l)).unwrap_or_default())]
    RepositoryMoved {
        full_name: String,
        /// Target of the redirect, when the API supplied one
        location: Option<String>,
    },

    /// The hosting API returned an unexpected status.
    #[error("Hosting API error for {url}: HTTP {status} - {message}")]
    Api {
        url: String,
        status: u16,
        message: String,
    },

    /// A request to the hosting API could not be completed.
    #[error("Network operation error: {url} - {message}")]
    Network { url: String, message: String },

    /// Two repositories would be cloned into the same local directory.
    #[error("Directory conflict for {full_name}: {directory} is already used by {existing}")]
    DirectoryConflict {
        full_name: String,
        directory: String,
        existing: String,
    },

    /// The target ref names no branch, tag or commit in the working copy.
    #[error("Ref not found: '{reference}' in {directory}")]
    RefNotFound { reference: String, directory: String },

    /// A required external tool is not installed or not runnable.
    #[error("Missing dependency: '{tool}' must be installed and on PATH")]
    MissingDependency { tool: String },

    /// `init` was called on a workspace that was already initialized.
    #[error("Workspace is already initialized")]
    AlreadyInitialized,

    /// An operation that needs an initialized workspace was called too early.
    #[error("Workspace is not initialized; call init first")]
    NotInitialized,

    /// An external command exited with a non-zero status.
    #[error("Command failed: {command}{}", if stderr.is_empty() { String::new() } else { format!("\n  {}", stderr.trim_end()) })]
    CommandFailed { command: String, stderr: String },

    /// An error occurred while parsing the `.polyrepo.yaml` configuration file.
    ///
    /// This error includes the specific parsing issue and optionally a hint
    /// about how to fix it.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A repository's dependency manifest could not be read or merged.
    #[error("Manifest error in {path}: {message}")]
    Manifest { path: String, message: String },

    /// An error indicating that a mutex or other lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
