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

//! Label index: label name -> observed values.

use crate::error::IndexError;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};

/// Write-side contract of the label index.
pub trait LabelStore: Send + Sync {
    /// Record that `name` was observed with `value`. Idempotent.
    fn put(&self, name: &str, value: &str) -> Result<(), IndexError>;
}

/// In-memory label index.
#[derive(Debug, Default)]
pub struct LabelIndex {
    labels: RwLock<BTreeMap<String, BTreeSet<String>>>,
}

impl LabelIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// All label names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.labels.read().keys().cloned().collect()
    }

    /// All values seen for `name`, sorted.
    pub fn values(&self, name: &str) -> Vec<String> {
        self.labels
            .read()
            .get(name)
            .map(|values| values.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &str, value: &str) -> bool {
        self.labels
            .read()
            .get(name)
            .is_some_and(|values| values.contains(value))
    }

    /// Number of distinct label names.
    pub fn len(&self) -> usize {
        self.labels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.read().is_empty()
    }
}

impl LabelStore for LabelIndex {
    fn put(&self, name: &str, value: &str) -> Result<(), IndexError> {
        if name.is_empty() {
            return Err(IndexError::InvalidLabel {
                name: name.to_string(),
                reason: "empty label name",
            });
        }

        // Hot path: the pair is almost always known already.
        if self.contains(name, value) {
            return Ok(());
        }

        self.labels
            .write()
            .entry(name.to_string())
            .or_default()
            .insert(value.to_string());
        Ok(())
    }
}
