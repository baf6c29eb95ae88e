// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Typed entry caches for segments and bucket trees.
//!
//! ## Entry identity
//!
//! Values are shared handles (`Arc<LockedCell<_>>`). A handle returned by
//! `get_or_create` is the entry: callers mutate it in place under its lock
//! and every later `get_or_create`/`lookup` of the same key sees the change
//! while the entry is resident. `put` hands the same handle back after a
//! write. For the in-memory cache that only refreshes recency (and
//! re-inserts the entry if it was evicted in between). It never replaces
//! data with a different value.

use crate::segment::{Segment, SegmentConfig};
use cinder_core::{LockedCell, ProfileTree, SharedTree};
use moka::sync::Cache;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("Failed to create entry {key}: {reason}")]
    Create { key: String, reason: String },
}

pub type SharedSegment = Arc<LockedCell<Segment>>;

/// Get-or-create cache of shared entries.
pub trait EntryCache<V>: Send + Sync {
    fn get_or_create(&self, key: &str) -> Result<V, CacheError>;

    /// Resident entry for `key`, if any. Never creates.
    fn lookup(&self, key: &str) -> Option<V>;

    /// Hand an entry back after a write.
    fn put(&self, key: &str, value: V);
}

/// Builds the value for a missing key.
pub type EntryFactory<V> = Arc<dyn Fn(&str) -> Result<V, CacheError> + Send + Sync>;

/// Bounded in-memory cache on `moka`.
pub struct MemoryCache<V> {
    cache: Cache<String, V>,
    factory: EntryFactory<V>,
}

impl<V> MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new<F>(max_capacity: u64, factory: F) -> Self
    where
        F: Fn(&str) -> Result<V, CacheError> + Send + Sync + 'static,
    {
        Self::with_time_to_idle(max_capacity, None, factory)
    }

    /// Entries unused for `time_to_idle` become eligible for eviction.
    pub fn with_time_to_idle<F>(
        max_capacity: u64,
        time_to_idle: Option<Duration>,
        factory: F,
    ) -> Self
    where
        F: Fn(&str) -> Result<V, CacheError> + Send + Sync + 'static,
    {
        let mut builder = Cache::<String, V>::builder().max_capacity(max_capacity);
        if let Some(tti) = time_to_idle {
            builder = builder.time_to_idle(tti);
        }
        Self {
            cache: builder.build(),
            factory: Arc::new(factory),
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

impl<V> EntryCache<V> for MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn get_or_create(&self, key: &str) -> Result<V, CacheError> {
        self.cache
            .try_get_with(key.to_string(), || (self.factory)(key))
            .map_err(|e| (*e).clone())
    }

    fn lookup(&self, key: &str) -> Option<V> {
        self.cache.get(key)
    }

    fn put(&self, key: &str, value: V) {
        self.cache.insert(key.to_string(), value);
    }
}

impl<V> fmt::Debug for MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

/// Segment cache creating empty segments with `config`.
pub fn segment_cache(
    max_capacity: u64,
    time_to_idle: Option<Duration>,
    config: SegmentConfig,
) -> MemoryCache<SharedSegment> {
    MemoryCache::with_time_to_idle(max_capacity, time_to_idle, move |_| {
        Ok(LockedCell::shared(Segment::new(config.clone())))
    })
}

/// Tree cache creating empty trees.
pub fn tree_cache(max_capacity: u64, time_to_idle: Option<Duration>) -> MemoryCache<SharedTree> {
    MemoryCache::with_time_to_idle(max_capacity, time_to_idle, |_| {
        Ok(LockedCell::shared(ProfileTree::new()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_get_or_create_shares_entry() {
        let cache = tree_cache(100, None);
        let a = cache.get_or_create("svc{}:0:1700000000").unwrap();
        a.with_write(|t| t.insert(&["main"], 5));

        let b = cache.get_or_create("svc{}:0:1700000000").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.with_read(|t| t.samples()), 5);
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn test_lookup_never_creates() {
        let cache = tree_cache(100, None);
        assert!(cache.lookup("missing").is_none());
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn test_put_keeps_handle() {
        let cache = tree_cache(100, None);
        let a = cache.get_or_create("k").unwrap();
        cache.put("k", Arc::clone(&a));
        assert!(Arc::ptr_eq(&a, &cache.lookup("k").unwrap()));
    }

    #[test]
    fn test_factory_error_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache: MemoryCache<u64> = MemoryCache::new(10, move |key| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(CacheError::Create {
                key: key.to_string(),
                reason: "backend down".to_string(),
            })
        });

        for _ in 0..2 {
            let err = cache.get_or_create("k").unwrap_err();
            assert_eq!(
                err,
                CacheError::Create {
                    key: "k".to_string(),
                    reason: "backend down".to_string(),
                }
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.lookup("k").is_none());
    }

    #[test]
    fn test_segment_cache_uses_config() {
        let config = SegmentConfig::single_resolution(Duration::from_secs(20));
        let cache = segment_cache(10, None, config.clone());
        let segment = cache.get_or_create("svc{}").unwrap();
        assert_eq!(segment.with_read(|s| s.config().clone()), config);
    }
}
