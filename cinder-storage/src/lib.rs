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

//! Cinder Storage Layer
//!
//! The profile write path:
//!
//! - **Admission control**: disk pressure and retention checks before any mutation
//! - **Exemplars**: samples carrying a profile ID bypass aggregation
//! - **Indexing**: label and dimension indexes from `cinder-index`
//! - **Segments**: per-identity resolution ladder deciding which buckets a sample lands in
//! - **Caches**: typed get-or-create caches for segments and bucket trees
//!
//! ## Example
//!
//! ```rust,no_run
//! use cinder_core::{ProfileTree, PutInput, SampleKey};
//! use cinder_storage::StorageBuilder;
//! use chrono::{TimeZone, Utc};
//!
//! let storage = StorageBuilder::new().build()?;
//! let key = SampleKey::new("checkout")?.with_label("env", "prod")?;
//! let value = ProfileTree::from_collapsed("main;handle;encode 42")?;
//! let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
//! let end = Utc.timestamp_opt(1_700_000_010, 0).unwrap();
//!
//! let report = storage.put(&PutInput::new(key, value, start, end))?;
//! report.into_result()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod admission;
pub mod cache;
pub mod config;
pub mod error;
pub mod exemplars;
pub mod health;
pub mod metrics;
pub mod retention;
pub mod segment;
pub mod storage;

pub use admission::{AdmissionControl, AdmissionStats};
pub use cache::{
    segment_cache, tree_cache, CacheError, EntryCache, EntryFactory, MemoryCache, SharedSegment,
};
pub use config::{ConfigError, StorageConfig};
pub use error::{AdmissionRejection, BucketFailure, DimensionFailure, PutError};
pub use exemplars::{Exemplar, ExemplarCache, ExemplarError, ExemplarStore};
pub use health::{AlwaysHealthy, DiskPressureMonitor, HealthCheck, RefresherHandle};
pub use metrics::{MetricsSnapshot, StorageMetrics};
pub use retention::{RetentionPolicy, RetentionWindow};
pub use segment::{Addon, BucketPlan, BucketTarget, Segment, SegmentConfig, SegmentError};
pub use storage::{PutReport, Storage, StorageBuilder};
