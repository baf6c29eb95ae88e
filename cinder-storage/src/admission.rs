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

//! Admission Control for Profile Ingestion
//!
//! Every put is checked against two gates before anything is mutated:
//!
//! 1. **Disk pressure**: the health check reports the data volume as full.
//! 2. **Retention**: the sample starts before the retention lower boundary.
//!
//! Disk pressure is checked first. A start time exactly on the boundary is
//! admitted.

use crate::error::AdmissionRejection;
use crate::health::HealthCheck;
use crate::retention::RetentionPolicy;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Statistics for admission control
#[derive(Debug, Default)]
pub struct AdmissionStats {
    pub accepted: AtomicU64,
    pub rejected_out_of_space: AtomicU64,
    pub rejected_retention: AtomicU64,
}

impl AdmissionStats {
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn rejected_out_of_space(&self) -> u64 {
        self.rejected_out_of_space.load(Ordering::Relaxed)
    }

    pub fn rejected_retention(&self) -> u64 {
        self.rejected_retention.load(Ordering::Relaxed)
    }
}

/// Gatekeeper in front of the write path.
pub struct AdmissionControl {
    health: Arc<dyn HealthCheck>,
    retention: Arc<dyn RetentionPolicy>,
    stats: AdmissionStats,
}

impl AdmissionControl {
    pub fn new(health: Arc<dyn HealthCheck>, retention: Arc<dyn RetentionPolicy>) -> Self {
        Self {
            health,
            retention,
            stats: AdmissionStats::default(),
        }
    }

    /// Check if a sample starting at `start_time` should be admitted.
    pub fn admit(&self, start_time: DateTime<Utc>) -> Result<(), AdmissionRejection> {
        if self.health.is_out_of_disk_space() {
            self.stats
                .rejected_out_of_space
                .fetch_add(1, Ordering::Relaxed);
            return Err(AdmissionRejection::OutOfSpace);
        }

        let boundary = self.retention.lower_time_boundary();
        if start_time < boundary {
            self.stats.rejected_retention.fetch_add(1, Ordering::Relaxed);
            return Err(AdmissionRejection::RetentionExpired {
                start_time,
                boundary,
            });
        }

        self.stats.accepted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn stats(&self) -> &AdmissionStats {
        &self.stats
    }
}
