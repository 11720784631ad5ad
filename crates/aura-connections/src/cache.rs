//! Profile cache collaborator
//!
//! Connection records only ever clear cache entries; `get` and `set` exist so
//! the layers that populate the cache (connection target resolution) can share
//! one handle with the record.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::ConnectionResult;

/// Cache effects used by connection records
#[async_trait]
pub trait CacheEffects: Send + Sync {
    /// Read a cached value
    async fn get(&self, key: &str) -> ConnectionResult<Option<String>>;

    /// Store a cached value
    async fn set(&self, key: &str, value: String) -> ConnectionResult<()>;

    /// Drop a cached value; clearing an absent key is not an error
    async fn clear(&self, key: &str) -> ConnectionResult<()>;
}

/// In-memory cache
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheEffects for MemoryCache {
    async fn get(&self, key: &str) -> ConnectionResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> ConnectionResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn clear(&self, key: &str) -> ConnectionResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
