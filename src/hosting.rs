//! # Hosting Connection
//!
//! This module turns repository patterns into concrete repositories by asking
//! the hosting service. It owns the metadata cache and the rate limiter that
//! every API request passes through.
//!
//! ## Design
//!
//! The wire protocol sits behind the `HostingApi` trait, so the connection's
//! logic (caching, pagination, fallback from organization to user listings,
//! wildcard expansion) can be exercised against an in-memory fake. The real
//! implementation is [`crate::github::GitHubApi`].
//!
//! ## Pattern Expansion
//!
//! - `owner/name` and `owner/name#ref` become one reference each.
//! - Any pattern containing `*` is an owner lookup: the owner's full list of
//!   public repositories is expanded. A name filter such as `owner/lib-*` is
//!   accepted but not applied; a warning says so.
//! - Patterns without `/` are skipped with a warning.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Deserialize;

use crate::cache::MetadataCache;
use crate::error::{Error, Result};
use crate::limiter::RateLimiter;
use crate::repository::{split_ref, CachedRepositoryMetadata, RepositoryReference, ResolvedRepository};

/// Page size used when listing an owner's repositories.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Default number of hosting API requests in flight at once.
pub const DEFAULT_API_CONCURRENCY: usize = 8;

/// A repository as the hosting API reports it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteRepository {
    pub owner: RemoteOwner,
    pub name: String,
    pub full_name: String,
    pub clone_url: String,
    /// Empty repositories have no default branch.
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub private: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteOwner {
    pub login: String,
}

impl From<RemoteRepository> for CachedRepositoryMetadata {
    fn from(remote: RemoteRepository) -> Self {
        Self {
            owner: remote.owner.login,
            name: remote.name,
            full_name: remote.full_name,
            clone_url: remote.clone_url,
            default_branch: remote.default_branch.unwrap_or_else(|| "main".to_string()),
        }
    }
}

/// Answer to a single-repository lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryLookup {
    Found(RemoteRepository),
    /// The service answered with a permanent redirect.
    Moved { location: Option<String> },
}

/// The hosting API operations the connection consumes.
pub trait HostingApi: Send + Sync {
    /// Look up one repository. A missing repository is
    /// `Err(Error::RepositoryNotFound)`.
    fn get_repository(&self, owner: &str, name: &str) -> Result<RepositoryLookup>;

    /// One page of an organization's repositories. Pages start at 1.
    fn list_organization_repositories(
        &self,
        organization: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RemoteRepository>>;

    /// One page of a user's repositories. Pages start at 1.
    fn list_user_repositories(
        &self,
        user: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RemoteRepository>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OwnerKind {
    Organization,
    User,
}

/// A pattern after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// One repository.
    Direct(RepositoryReference),
    /// Every public repository of `owner`, optionally pinned to `r#ref`.
    Owner { owner: String, r#ref: Option<String> },
}

impl Pattern {
    /// Classify one pattern string.
    pub fn parse(pattern: &str) -> Result<Self> {
        let Some((owner, rest)) = pattern.split_once('/') else {
            return Err(Error::MalformedPattern {
                pattern: pattern.to_string(),
                reason: "expected 'owner/name', 'owner/name#ref' or 'owner/*'".to_string(),
            });
        };

        if !pattern.contains('*') {
            return RepositoryReference::parse(pattern).map(Pattern::Direct);
        }

        let (name_filter, r#ref) = split_ref(rest)?;
        if owner.is_empty() || owner.contains('*') {
            return Err(Error::MalformedPattern {
                pattern: pattern.to_string(),
                reason: "wildcards are only supported in the repository name".to_string(),
            });
        }
        if name_filter != "*" {
            warn!(
                "Pattern '{}': name filters are not applied, expanding every repository of '{}'",
                pattern, owner
            );
        }

        Ok(Pattern::Owner {
            owner: owner.to_lowercase(),
            r#ref: r#ref.map(str::to_string),
        })
    }
}

/// Connection to the hosting service with a metadata cache.
pub struct HostingConnection {
    api: Box<dyn HostingApi>,
    cache: MetadataCache,
    limiter: RateLimiter,
    page_size: u32,
}

impl HostingConnection {
    pub fn new(api: Box<dyn HostingApi>) -> Self {
        Self::with_limits(api, DEFAULT_API_CONCURRENCY, DEFAULT_PAGE_SIZE)
    }

    /// Create a connection admitting `max_concurrent` API calls at once and
    /// listing owners `page_size` repositories at a time.
    pub fn with_limits(api: Box<dyn HostingApi>, max_concurrent: usize, page_size: u32) -> Self {
        Self {
            api,
            cache: MetadataCache::new(),
            limiter: RateLimiter::new(max_concurrent),
            page_size: page_size.max(1),
        }
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// Forget every cached repository.
    pub fn reset_cache(&self) -> Result<()> {
        self.cache.clear()
    }

    /// Resolve a reference, hitting the API only on a cache miss.
    pub fn resolve(&self, reference: &RepositoryReference) -> Result<ResolvedRepository> {
        if let Some(metadata) = self.cache.get(&reference.full_name)? {
            debug!("cache hit for {}", reference.full_name);
            return Ok(metadata.resolve(reference.r#ref.as_deref()));
        }

        let lookup = self
            .limiter
            .schedule(|| self.api.get_repository(&reference.owner, &reference.name))?;

        match lookup {
            RepositoryLookup::Moved { location } => Err(Error::RepositoryMoved {
                full_name: reference.full_name.clone(),
                location,
            }),
            RepositoryLookup::Found(remote) => {
                let metadata = CachedRepositoryMetadata::from(remote);
                self.cache.insert(metadata.clone())?;
                Ok(metadata.resolve(reference.r#ref.as_deref()))
            }
        }
    }

    /// Every public repository of `owner`, trying the organization listing
    /// first and the user listing second. Both failing yields an empty list.
    pub fn list_owner_repositories(&self, owner: &str) -> Result<Vec<CachedRepositoryMetadata>> {
        let remote = match self.list_all(owner, OwnerKind::Organization) {
            Ok(repos) => repos,
            Err(org_error) => {
                debug!("'{}' is not an organization ({}), listing as user", owner, org_error);
                match self.list_all(owner, OwnerKind::User) {
                    Ok(repos) => repos,
                    Err(user_error) => {
                        warn!("Could not list repositories of '{}': {}", owner, user_error);
                        return Ok(Vec::new());
                    }
                }
            }
        };

        let mut listed = Vec::with_capacity(remote.len());
        for repo in remote.into_iter().filter(|r| !r.private) {
            let metadata = CachedRepositoryMetadata::from(repo);
            self.cache.insert(metadata.clone())?;
            listed.push(metadata);
        }
        info!("'{}' owns {} public repositories", owner, listed.len());
        Ok(listed)
    }

    /// Request pages until one comes back empty.
    fn list_all(&self, owner: &str, kind: OwnerKind) -> Result<Vec<RemoteRepository>> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.limiter.schedule(|| match kind {
                OwnerKind::Organization => {
                    self.api
                        .list_organization_repositories(owner, page, self.page_size)
                }
                OwnerKind::User => self.api.list_user_repositories(owner, page, self.page_size),
            })?;
            if batch.is_empty() {
                return Ok(all);
            }
            all.extend(batch);
            page += 1;
        }
    }

    /// Expand patterns into a de-duplicated list of references, sorted by
    /// lower-cased full name. Malformed patterns are skipped with a warning.
    pub fn expand_patterns<S: AsRef<str>>(&self, patterns: &[S]) -> Vec<RepositoryReference> {
        let mut references: BTreeMap<String, RepositoryReference> = BTreeMap::new();
        let mut owners: Vec<(String, Option<String>)> = Vec::new();

        for pattern in patterns {
            match Pattern::parse(pattern.as_ref()) {
                Ok(Pattern::Direct(reference)) => {
                    references.entry(reference.key()).or_insert(reference);
                }
                Ok(Pattern::Owner { owner, r#ref }) => owners.push((owner, r#ref)),
                Err(e) => warn!("Skipping pattern: {}", e),
            }
        }

        let expanded: Vec<Vec<RepositoryReference>> = owners
            .par_iter()
            .map(|(owner, r#ref)| {
                // list_owner_repositories only fails on a poisoned cache lock.
                let listed = self.list_owner_repositories(owner).unwrap_or_else(|e| {
                    warn!("Could not expand '{}/*': {}", owner, e);
                    Vec::new()
                });
                listed
                    .into_iter()
                    .map(|m| {
                        let r = r#ref.as_deref().unwrap_or(&m.default_branch);
                        RepositoryReference::new(&m.owner, &m.name, Some(r))
                    })
                    .collect()
            })
            .collect();

        for reference in expanded.into_iter().flatten() {
            references.entry(reference.key()).or_insert(reference);
        }

        references.into_values().collect()
    }
}
