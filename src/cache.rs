//! In-memory cache of compiled grammars.
//!
//! A grammar compiles once per URL per process; every document validation
//! afterwards shares the same immutable `Arc<Grammar>`. `moka` handles
//! concurrent access and thundering-herd protection, so concurrent requests
//! for the same grammar wait on a single compilation instead of racing.

use std::sync::Arc;

use moka::future::Cache;

use crate::error::{Result, ValidationError};
use crate::pattern::Grammar;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of compiled grammars kept in memory.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_capacity: 16 }
    }
}

pub struct GrammarCache {
    cache: Cache<String, Arc<Grammar>>,
}

impl GrammarCache {
    pub fn new(config: CacheConfig) -> Self {
        let cache = Cache::builder().max_capacity(config.max_capacity).build();
        Self { cache }
    }

    /// Get a compiled grammar, or compile it with `loader` if missing. The
    /// loader runs at most once per key even under concurrent callers.
    pub async fn get_or_compile<F, Fut>(&self, key: String, loader: F) -> Result<Arc<Grammar>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<Grammar>>>,
    {
        self.cache
            .try_get_with(key, loader())
            .await
            .map_err(|e: Arc<ValidationError>| match Arc::try_unwrap(e) {
                // Sole caller gets the original error back; concurrent
                // waiters share it.
                Ok(inner) => inner,
                Err(shared) => ValidationError::Shared(shared),
            })
    }

    pub async fn get(&self, key: &str) -> Option<Arc<Grammar>> {
        self.cache.get(key).await
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}
