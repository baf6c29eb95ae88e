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

//! Dimension index
//!
//! A dimension is the sorted set of segment keys that carry one label pair.
//! Dimensions are keyed by the token `name:value` and handed out as shared
//! cells so the caller can insert under the cell's write lock and then
//! call [`DimensionStore::put`] to publish.

use crate::error::IndexError;
use cinder_core::LockedCell;
use dashmap::DashMap;
use std::sync::Arc;

/// Sorted, duplicate-free set of segment keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dimension {
    keys: Vec<Box<str>>,
}

impl Dimension {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a segment key. Returns `false` if it was already present.
    pub fn insert(&mut self, segment_key: &str) -> bool {
        match self.keys.binary_search_by(|k| k.as_ref().cmp(segment_key)) {
            Ok(_) => false,
            Err(pos) => {
                self.keys.insert(pos, segment_key.into());
                true
            }
        }
    }

    pub fn contains(&self, segment_key: &str) -> bool {
        self.keys
            .binary_search_by(|k| k.as_ref().cmp(segment_key))
            .is_ok()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|k| k.as_ref())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

pub type SharedDimension = Arc<LockedCell<Dimension>>;

/// Token under which the dimension for `name=value` is stored.
pub fn dimension_token(name: &str, value: &str) -> String {
    format!("{}:{}", name, value)
}

/// Get-or-create store of dimensions.
///
/// Handles returned by `get_or_create` are shared: mutations through them
/// are visible to every holder. `put` marks the entry as recently written
/// and makes it durable for persistent backends.
pub trait DimensionStore: Send + Sync {
    fn get_or_create(&self, token: &str) -> Result<SharedDimension, IndexError>;

    fn put(&self, token: &str, dimension: &SharedDimension);

    fn lookup(&self, token: &str) -> Option<SharedDimension>;
}

/// In-memory dimension store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct DimensionIndex {
    dimensions: DashMap<String, SharedDimension>,
    limit: Option<usize>,
}

impl DimensionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of distinct dimensions. Creating past the cap fails.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            dimensions: DashMap::new(),
            limit: Some(limit),
        }
    }

    /// Segment keys recorded under `token`, sorted.
    pub fn segment_keys(&self, token: &str) -> Vec<String> {
        self.lookup(token)
            .map(|dim| dim.with_read(|d| d.keys().map(str::to_string).collect()))
            .unwrap_or_default()
    }

    /// Number of distinct dimensions.
    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }
}

impl DimensionStore for DimensionIndex {
    fn get_or_create(&self, token: &str) -> Result<SharedDimension, IndexError> {
        if let Some(existing) = self.dimensions.get(token) {
            return Ok(Arc::clone(existing.value()));
        }

        if let Some(limit) = self.limit {
            if self.dimensions.len() >= limit {
                tracing::warn!(token, limit, "Dimension limit reached");
                return Err(IndexError::DimensionLimit {
                    token: token.to_string(),
                    limit,
                });
            }
        }

        let entry = self
            .dimensions
            .entry(token.to_string())
            .or_insert_with(|| LockedCell::shared(Dimension::new()));
        Ok(Arc::clone(entry.value()))
    }

    fn put(&self, token: &str, dimension: &SharedDimension) {
        self.dimensions
            .insert(token.to_string(), Arc::clone(dimension));
    }

    fn lookup(&self, token: &str) -> Option<SharedDimension> {
        self.dimensions.get(token).map(|d| Arc::clone(d.value()))
    }
}
