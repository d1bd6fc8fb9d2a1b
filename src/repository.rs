//! # Repository Identities
//!
//! This module defines the three shapes a repository takes on its way from a
//! user-supplied pattern to a directory on disk:
//!
//! - **`RepositoryReference`**: an unresolved request parsed from
//!   `owner/name` or `owner/name#ref`. The ref may be missing.
//! - **`CachedRepositoryMetadata`**: facts the hosting API reported about a
//!   repository. This is what the metadata cache stores. It never carries a
//!   ref.
//! - **`ResolvedRepository`**: cached metadata plus a concrete ref, either the
//!   requested one or the repository's default branch.
//!
//! Resolving many references at once yields one `Resolution` per reference, so
//! that failures travel next to successes and are partitioned once at the end.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A request for one repository, optionally pinned to a ref.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryReference {
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub r#ref: Option<String>,
}

impl RepositoryReference {
    /// Build a reference from its parts. `full_name` is derived.
    pub fn new(owner: &str, name: &str, r#ref: Option<&str>) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            full_name: format!("{}/{}", owner, name),
            r#ref: r#ref.map(str::to_string),
        }
    }

    /// Parse `owner/name` or `owner/name#ref`.
    ///
    /// The pattern must contain exactly one `/`, at most one `#`, and a
    /// non-empty owner, name and (when present) ref.
    pub fn parse(pattern: &str) -> Result<Self> {
        let malformed = |reason: &str| Error::MalformedPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let (path, r#ref) = split_ref(pattern)?;
        if path.matches('/').count() != 1 {
            return Err(malformed("expected exactly one '/' between owner and name"));
        }

        let (owner, name) = path
            .split_once('/')
            .ok_or_else(|| malformed("expected exactly one '/' between owner and name"))?;
        if owner.is_empty() || name.is_empty() {
            return Err(malformed("owner and name must not be empty"));
        }

        Ok(Self::new(owner, name, r#ref))
    }

    /// The full name lower-cased, used for case-insensitive comparisons.
    pub fn key(&self) -> String {
        self.full_name.to_lowercase()
    }
}

impl fmt::Display for RepositoryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.r#ref {
            Some(r) => write!(f, "{}#{}", self.full_name, r),
            None => write!(f, "{}", self.full_name),
        }
    }
}

/// Split a pattern at its `#`, rejecting more than one separator, an empty
/// ref and a ref that git would read as an option.
pub(crate) fn split_ref(pattern: &str) -> Result<(&str, Option<&str>)> {
    let mut parts = pattern.split('#');
    let path = parts.next().unwrap_or_default();
    let r#ref = parts.next();
    if parts.next().is_some() {
        return Err(Error::MalformedPattern {
            pattern: pattern.to_string(),
            reason: "more than one '#'".to_string(),
        });
    }
    if r#ref == Some("") {
        return Err(Error::MalformedPattern {
            pattern: pattern.to_string(),
            reason: "empty ref after '#'".to_string(),
        });
    }
    if r#ref.is_some_and(|r| r.starts_with('-')) {
        return Err(Error::MalformedPattern {
            pattern: pattern.to_string(),
            reason: "ref must not start with '-'".to_string(),
        });
    }
    Ok((path, r#ref))
}

/// Hosting-sourced facts about a repository, as kept in the metadata cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRepositoryMetadata {
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub clone_url: String,
    pub default_branch: String,
}

impl CachedRepositoryMetadata {
    /// Cache key for this repository.
    pub fn key(&self) -> String {
        self.full_name.to_lowercase()
    }

    /// Combine with a requested ref, falling back to the default branch.
    pub fn resolve(&self, r#ref: Option<&str>) -> ResolvedRepository {
        ResolvedRepository {
            metadata: self.clone(),
            r#ref: r#ref.unwrap_or(&self.default_branch).to_string(),
        }
    }
}

/// A repository the workspace can act on: metadata plus a concrete ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRepository {
    pub metadata: CachedRepositoryMetadata,
    pub r#ref: String,
}

impl ResolvedRepository {
    pub fn full_name(&self) -> &str {
        &self.metadata.full_name
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn clone_url(&self) -> &str {
        &self.metadata.clone_url
    }

    /// The ref to check out; the default branch when no ref was resolved.
    pub fn target_ref(&self) -> &str {
        if self.r#ref.is_empty() {
            &self.metadata.default_branch
        } else {
            &self.r#ref
        }
    }
}

/// Outcome of resolving one reference.
#[derive(Debug)]
pub enum Resolution {
    Resolved(ResolvedRepository),
    Failed {
        reference: RepositoryReference,
        error: Error,
    },
}

/// Split resolutions into successes and `(reference, error)` failures,
/// preserving input order within each side.
pub fn partition(
    resolutions: Vec<Resolution>,
) -> (Vec<ResolvedRepository>, Vec<(RepositoryReference, Error)>) {
    let mut resolved = Vec::new();
    let mut failed = Vec::new();
    for resolution in resolutions {
        match resolution {
            Resolution::Resolved(repo) => resolved.push(repo),
            Resolution::Failed { reference, error } => failed.push((reference, error)),
        }
    }
    (resolved, failed)
}
