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

//! Put orchestrator
//!
//! `Storage::put` runs one sample through the write path:
//!
//! 1. Admission (disk pressure, then retention)
//! 2. Exemplar routing when the key carries a profile ID
//! 3. Label and dimension indexing
//! 4. Segment get-or-create and bucket planning
//! 5. Per bucket: tree get-or-create, scaled copy, addon fold, merge
//!
//! The whole call runs under one mutex so index, segment and tree updates of
//! concurrent writers never interleave.

use crate::admission::AdmissionControl;
use crate::cache::{segment_cache, tree_cache, EntryCache, SharedSegment};
use crate::config::{ConfigError, StorageConfig};
use crate::error::{BucketFailure, DimensionFailure, PutError};
use crate::exemplars::{ExemplarCache, ExemplarStore};
use crate::health::{AlwaysHealthy, DiskPressureMonitor, HealthCheck, RefresherHandle};
use crate::metrics::{MetricsSnapshot, StorageMetrics};
use crate::retention::{RetentionPolicy, RetentionWindow};
use crate::segment::{BucketTarget, SegmentConfig, SegmentError};
use cinder_core::{tree_key, ProfileTree, PutInput, SharedTree};
use cinder_index::{dimension_token, DimensionIndex, DimensionStore, LabelIndex, LabelStore};
use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Outcome of a put that was not aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutReport {
    /// Segment key of the sample.
    pub key: String,
    /// The sample went to the exemplar store.
    pub exemplar: bool,
    pub buckets_written: usize,
    pub bucket_failures: Vec<BucketFailure>,
    pub dimension_failures: Vec<DimensionFailure>,
}

impl PutReport {
    fn new(key: String) -> Self {
        Self {
            key,
            exemplar: false,
            buckets_written: 0,
            bucket_failures: Vec::new(),
            dimension_failures: Vec::new(),
        }
    }

    /// No bucket or dimension was skipped.
    pub fn is_complete(&self) -> bool {
        self.bucket_failures.is_empty() && self.dimension_failures.is_empty()
    }

    /// `PutError::PartialWrite` if any bucket failed.
    pub fn into_result(self) -> Result<PutReport, PutError> {
        if self.bucket_failures.is_empty() {
            return Ok(self);
        }
        Err(PutError::PartialWrite {
            key: self.key,
            failures: self.bucket_failures,
        })
    }
}

/// Profile storage write path.
pub struct Storage {
    put_lock: Mutex<()>,
    admission: AdmissionControl,
    exemplars: Arc<dyn ExemplarStore>,
    labels: Arc<dyn LabelStore>,
    dimensions: Arc<dyn DimensionStore>,
    segments: Arc<dyn EntryCache<SharedSegment>>,
    trees: Arc<dyn EntryCache<SharedTree>>,
    metrics: StorageMetrics,
    _disk_refresher: Option<RefresherHandle>,
}

impl Storage {
    pub fn builder() -> StorageBuilder {
        StorageBuilder::new()
    }

    /// Wire the in-memory collaborators described by `config`.
    pub fn from_config(config: &StorageConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut builder = StorageBuilder::new()
            .segment_config(config.segment_config())
            .segment_capacity(config.cache.segment_capacity)
            .tree_capacity(config.cache.tree_capacity)
            .exemplar_capacity(config.cache.exemplar_capacity)
            .time_to_idle(config.time_to_idle())
            .retention(Arc::new(RetentionWindow::new(config.retention_period())));

        if config.disk.enabled {
            let monitor = Arc::new(DiskPressureMonitor::new(
                &config.data_path,
                config.disk.min_available_bytes,
            ));
            let refresher =
                monitor.spawn_refresher(Duration::from_secs(config.disk.refresh_interval_secs));
            builder = builder.health(monitor).disk_refresher(refresher);
        }

        builder
            .build()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Write one sample.
    ///
    /// Returns `Ok` once the sample is stored, even if some buckets or
    /// dimensions had to be skipped; those are listed in the report. Use
    /// [`PutReport::into_result`] to treat skipped buckets as an error.
    pub fn put(&self, input: &PutInput) -> Result<PutReport, PutError> {
        let _guard = self.put_lock.lock();

        if let Err(rejection) = self.admission.admit(input.start_time) {
            warn!(
                key = %input.key,
                start_time = %input.start_time,
                reason = %rejection,
                "Put rejected"
            );
            return Err(rejection.into());
        }

        let key = &input.key;
        let segment_key = key.segment_key();
        self.metrics.record_put(key.app_name());

        if let Some(profile_id) = key.profile_id() {
            self.exemplars
                .insert(key.app_name(), profile_id, &input.value, input.end_time)
                .map_err(|source| PutError::Exemplar {
                    key: segment_key.clone(),
                    source,
                })?;
            self.metrics.exemplar_total.fetch_add(1, Ordering::Relaxed);
            let mut report = PutReport::new(segment_key);
            report.exemplar = true;
            return Ok(report);
        }

        let samples = input.samples();
        debug!(
            key = %segment_key,
            start_time = %input.start_time,
            end_time = %input.end_time,
            samples,
            spy_name = %input.spy_name,
            sample_rate = input.sample_rate,
            units = %input.units,
            aggregation_type = %input.aggregation_type,
            "Storage put"
        );

        // Every label lands before any dimension references the segment.
        for (name, value) in key.labels() {
            self.labels
                .put(name, value)
                .map_err(|source| PutError::IndexingFailed {
                    key: segment_key.clone(),
                    source,
                })?;
        }

        let mut report = PutReport::new(segment_key.clone());
        for (name, value) in key.labels() {
            let token = dimension_token(name, value);
            match self.dimensions.get_or_create(&token) {
                Ok(dimension) => {
                    dimension.with_write(|d| d.insert(&segment_key));
                    self.dimensions.put(&token, &dimension);
                }
                Err(source) => {
                    error!(token = %token, error = %source, "Dimensions cache");
                    self.metrics
                        .dimension_failures
                        .fetch_add(1, Ordering::Relaxed);
                    report.dimension_failures.push(DimensionFailure { token, source });
                }
            }
        }

        let segment = self
            .segments
            .get_or_create(&segment_key)
            .map_err(|source| PutError::SegmentUnavailable {
                key: segment_key.clone(),
                source,
            })?;

        let plan = segment
            .with_write(|s| {
                s.set_metadata(input.metadata());
                s.bucket(input.start_time, input.end_time, samples)
            })
            .map_err(|source| PutError::Bucketing {
                key: segment_key.clone(),
                source,
            })?;

        for target in plan {
            let tk = tree_key(&segment_key, target.depth, target.time);
            let tree = match self.trees.get_or_create(&tk) {
                Ok(tree) => tree,
                Err(source) => {
                    error!(
                        tree_key = %tk,
                        depth = target.depth,
                        time = %target.time,
                        error = %source,
                        "Trees cache"
                    );
                    self.metrics.bucket_failures.fetch_add(1, Ordering::Relaxed);
                    report.bucket_failures.push(BucketFailure {
                        depth: target.depth,
                        time: target.time,
                        tree_key: tk,
                        source,
                    });
                    continue;
                }
            };

            self.merge_bucket(&segment_key, &tree, &input.value, &target);
            self.trees.put(&tk, tree);
            report.buckets_written += 1;
            self.metrics.buckets_written.fetch_add(1, Ordering::Relaxed);
        }

        self.segments.put(&segment_key, segment);
        Ok(report)
    }

    /// Fold the sample's share and the target's addons into the target tree.
    fn merge_bucket(
        &self,
        segment_key: &str,
        tree: &SharedTree,
        value: &ProfileTree,
        target: &BucketTarget,
    ) {
        let mut contribution = value.scaled_copy(target.ratio);
        for addon in &target.addons {
            let addon_key = tree_key(segment_key, addon.depth, addon.time);
            match self.trees.lookup(&addon_key) {
                Some(addon_tree) => addon_tree.with_read(|a| contribution.merge(a)),
                None => debug!(tree_key = %addon_key, "Addon tree not resident, skipped"),
            }
        }
        tree.with_write(|t| t.merge(&contribution));
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.admission.stats())
    }

    /// Admitted puts for one application.
    pub fn puts_for_app(&self, app_name: &str) -> u64 {
        self.metrics.puts_for_app(app_name)
    }
}

/// Assembles a [`Storage`] from collaborators. Unset ones get in-memory
/// defaults.
pub struct StorageBuilder {
    segment_config: SegmentConfig,
    segment_capacity: u64,
    tree_capacity: u64,
    exemplar_capacity: u64,
    time_to_idle: Option<Duration>,
    health: Option<Arc<dyn HealthCheck>>,
    retention: Option<Arc<dyn RetentionPolicy>>,
    exemplars: Option<Arc<dyn ExemplarStore>>,
    labels: Option<Arc<dyn LabelStore>>,
    dimensions: Option<Arc<dyn DimensionStore>>,
    segments: Option<Arc<dyn EntryCache<SharedSegment>>>,
    trees: Option<Arc<dyn EntryCache<SharedTree>>>,
    disk_refresher: Option<RefresherHandle>,
}

impl Default for StorageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBuilder {
    pub fn new() -> Self {
        let cache = crate::config::CacheConfig::default();
        Self {
            segment_config: SegmentConfig::default(),
            segment_capacity: cache.segment_capacity,
            tree_capacity: cache.tree_capacity,
            exemplar_capacity: cache.exemplar_capacity,
            time_to_idle: None,
            health: None,
            retention: None,
            exemplars: None,
            labels: None,
            dimensions: None,
            segments: None,
            trees: None,
            disk_refresher: None,
        }
    }

    /// Ladder used by the default segment cache.
    pub fn segment_config(mut self, config: SegmentConfig) -> Self {
        self.segment_config = config;
        self
    }

    pub fn segment_capacity(mut self, capacity: u64) -> Self {
        self.segment_capacity = capacity;
        self
    }

    pub fn tree_capacity(mut self, capacity: u64) -> Self {
        self.tree_capacity = capacity;
        self
    }

    pub fn exemplar_capacity(mut self, capacity: u64) -> Self {
        self.exemplar_capacity = capacity;
        self
    }

    pub fn time_to_idle(mut self, time_to_idle: Option<Duration>) -> Self {
        self.time_to_idle = time_to_idle;
        self
    }

    pub fn health(mut self, health: Arc<dyn HealthCheck>) -> Self {
        self.health = Some(health);
        self
    }

    pub fn retention(mut self, retention: Arc<dyn RetentionPolicy>) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn exemplars(mut self, exemplars: Arc<dyn ExemplarStore>) -> Self {
        self.exemplars = Some(exemplars);
        self
    }

    pub fn labels(mut self, labels: Arc<dyn LabelStore>) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn dimensions(mut self, dimensions: Arc<dyn DimensionStore>) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn segments(mut self, segments: Arc<dyn EntryCache<SharedSegment>>) -> Self {
        self.segments = Some(segments);
        self
    }

    pub fn trees(mut self, trees: Arc<dyn EntryCache<SharedTree>>) -> Self {
        self.trees = Some(trees);
        self
    }

    /// Keep a disk monitor refresher alive as long as the storage.
    pub fn disk_refresher(mut self, handle: RefresherHandle) -> Self {
        self.disk_refresher = Some(handle);
        self
    }

    pub fn build(self) -> Result<Storage, SegmentError> {
        self.segment_config.validate()?;

        let health = self.health.unwrap_or_else(|| Arc::new(AlwaysHealthy));
        let retention = self
            .retention
            .unwrap_or_else(|| Arc::new(RetentionWindow::unbounded()));
        let exemplars = self
            .exemplars
            .unwrap_or_else(|| Arc::new(ExemplarCache::new(self.exemplar_capacity)));
        let labels = self
            .labels
            .unwrap_or_else(|| Arc::new(LabelIndex::new()));
        let dimensions = self
            .dimensions
            .unwrap_or_else(|| Arc::new(DimensionIndex::new()));

        let segment_config = self.segment_config;
        let segment_capacity = self.segment_capacity;
        let tree_capacity = self.tree_capacity;
        let time_to_idle = self.time_to_idle;
        let segments = self.segments.unwrap_or_else(|| {
            Arc::new(segment_cache(segment_capacity, time_to_idle, segment_config))
        });
        let trees = self
            .trees
            .unwrap_or_else(|| Arc::new(tree_cache(tree_capacity, time_to_idle)));

        Ok(Storage {
            put_lock: Mutex::new(()),
            admission: AdmissionControl::new(health, retention),
            exemplars,
            labels,
            dimensions,
            segments,
            trees,
            metrics: StorageMetrics::new(),
            _disk_refresher: self.disk_refresher,
        })
    }
}
