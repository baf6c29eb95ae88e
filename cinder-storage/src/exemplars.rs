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

//! Exemplar store
//!
//! Samples tagged with a profile ID are kept individually, keyed by
//! `(app, profile_id)`, instead of being aggregated into segment buckets.

use chrono::{DateTime, Utc};
use cinder_core::{LockedCell, ProfileTree};
use moka::sync::Cache;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExemplarError {
    #[error("Empty profile id for {app_name}")]
    EmptyProfileId { app_name: String },

    #[error("Exemplar store unavailable: {0}")]
    Unavailable(String),
}

/// Destination of samples that carry a profile ID.
pub trait ExemplarStore: Send + Sync {
    fn insert(
        &self,
        app_name: &str,
        profile_id: &str,
        value: &ProfileTree,
        end_time: DateTime<Utc>,
    ) -> Result<(), ExemplarError>;
}

/// One stored exemplar. Repeated inserts for the same ID are merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exemplar {
    pub tree: ProfileTree,
    /// Latest end time seen.
    pub end_time: DateTime<Utc>,
    pub inserts: u64,
}

impl Exemplar {
    fn empty() -> Self {
        Self {
            tree: ProfileTree::new(),
            end_time: DateTime::<Utc>::MIN_UTC,
            inserts: 0,
        }
    }
}

type ExemplarKey = (String, String);

/// In-memory exemplar store.
pub struct ExemplarCache {
    entries: Cache<ExemplarKey, Arc<LockedCell<Exemplar>>>,
}

impl ExemplarCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(max_capacity).build(),
        }
    }

    pub fn get(&self, app_name: &str, profile_id: &str) -> Option<Exemplar> {
        self.entries
            .get(&(app_name.to_string(), profile_id.to_string()))
            .map(|entry| entry.snapshot())
    }

    pub fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }
}

impl ExemplarStore for ExemplarCache {
    fn insert(
        &self,
        app_name: &str,
        profile_id: &str,
        value: &ProfileTree,
        end_time: DateTime<Utc>,
    ) -> Result<(), ExemplarError> {
        if profile_id.is_empty() {
            return Err(ExemplarError::EmptyProfileId {
                app_name: app_name.to_string(),
            });
        }

        let entry = self
            .entries
            .get_with((app_name.to_string(), profile_id.to_string()), || {
                LockedCell::shared(Exemplar::empty())
            });
        entry.with_write(|exemplar| {
            exemplar.tree.merge(value);
            exemplar.end_time = exemplar.end_time.max(end_time);
            exemplar.inserts += 1;
        });

        tracing::trace!(app_name, profile_id, "Exemplar stored");
        Ok(())
    }
}
