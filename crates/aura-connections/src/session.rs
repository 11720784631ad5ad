//! Session scoping storage and cache access for connection operations

use crate::cache::CacheEffects;
use crate::config::ConnectionsConfig;
use crate::storage::RecordStorage;
use crate::ConnectionResult;
use std::sync::Arc;

/// Handles a connection operation runs against
#[derive(Clone)]
pub struct RecordSession {
    storage: Arc<dyn RecordStorage>,
    cache: Option<Arc<dyn CacheEffects>>,
    config: ConnectionsConfig,
}

impl RecordSession {
    /// Create a session over `storage` with no cache and default configuration
    pub fn new(storage: Arc<dyn RecordStorage>) -> Self {
        Self {
            storage,
            cache: None,
            config: ConnectionsConfig::default(),
        }
    }

    /// Attach a cache
    pub fn with_cache(mut self, cache: Arc<dyn CacheEffects>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: ConnectionsConfig) -> Self {
        self.config = config;
        self
    }

    /// Storage collaborator
    pub fn storage(&self) -> &dyn RecordStorage {
        self.storage.as_ref()
    }

    /// Cache collaborator, if one is configured
    pub fn cache(&self) -> Option<&dyn CacheEffects> {
        self.cache.as_deref()
    }

    /// Active configuration
    pub fn config(&self) -> &ConnectionsConfig {
        &self.config
    }

    /// Clear a cache key; a session without a cache has nothing to clear
    pub async fn clear_cached_key(&self, key: &str) -> ConnectionResult<()> {
        match self.cache() {
            Some(cache) => cache.clear(key).await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for RecordSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSession")
            .field("has_cache", &self.cache.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
