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

//! Write path counters.

use crate::admission::AdmissionStats;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct StorageMetrics {
    pub put_total: AtomicU64,
    pub exemplar_total: AtomicU64,
    pub buckets_written: AtomicU64,
    pub bucket_failures: AtomicU64,
    pub dimension_failures: AtomicU64,
    puts_by_app: DashMap<String, u64>,
}

impl StorageMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an admitted put for `app_name`.
    pub fn record_put(&self, app_name: &str) {
        self.put_total.fetch_add(1, Ordering::Relaxed);
        if let Some(mut count) = self.puts_by_app.get_mut(app_name) {
            *count += 1;
            return;
        }
        *self.puts_by_app.entry(app_name.to_string()).or_insert(0) += 1;
    }

    pub fn puts_for_app(&self, app_name: &str) -> u64 {
        self.puts_by_app.get(app_name).map(|c| *c).unwrap_or(0)
    }

    pub fn snapshot(&self, admission: &AdmissionStats) -> MetricsSnapshot {
        MetricsSnapshot {
            put_total: self.put_total.load(Ordering::Relaxed),
            exemplar_total: self.exemplar_total.load(Ordering::Relaxed),
            rejected_out_of_space: admission.rejected_out_of_space(),
            rejected_retention: admission.rejected_retention(),
            buckets_written: self.buckets_written.load(Ordering::Relaxed),
            bucket_failures: self.bucket_failures.load(Ordering::Relaxed),
            dimension_failures: self.dimension_failures.load(Ordering::Relaxed),
            puts_by_app: self
                .puts_by_app
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub put_total: u64,
    pub exemplar_total: u64,
    pub rejected_out_of_space: u64,
    pub rejected_retention: u64,
    pub buckets_written: u64,
    pub bucket_failures: u64,
    pub dimension_failures: u64,
    pub puts_by_app: BTreeMap<String, u64>,
}
