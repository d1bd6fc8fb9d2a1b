//! In-process cache of repository metadata, keyed by lower-cased full name

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::repository::CachedRepositoryMetadata;

/// Metadata cache shared by every resolution a hosting connection performs.
///
/// Entries never carry a ref; callers merge the requested ref in at read time
/// through [`CachedRepositoryMetadata::resolve`].
#[derive(Debug, Clone, Default)]
pub struct MetadataCache {
    entries: Arc<Mutex<HashMap<String, CachedRepositoryMetadata>>>,
}

impl MetadataCache {
    /// Create a new empty metadata cache
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, CachedRepositoryMetadata>>> {
        self.entries.lock().map_err(|_| Error::LockPoisoned {
            context: "repository metadata cache".to_string(),
        })
    }

    /// Look up a repository by full name, ignoring case.
    pub fn get(&self, full_name: &str) -> Result<Option<CachedRepositoryMetadata>> {
        Ok(self.lock()?.get(&full_name.to_lowercase()).cloned())
    }

    /// Store metadata, replacing any previous entry for the same full name.
    pub fn insert(&self, metadata: CachedRepositoryMetadata) -> Result<()> {
        self.lock()?.insert(metadata.key(), metadata);
        Ok(())
    }

    /// Check if a full name is cached
    pub fn contains(&self, full_name: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(&full_name.to_lowercase()))
    }

    /// Clear all cached entries
    pub fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    /// Get the number of cached entries
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }
}
