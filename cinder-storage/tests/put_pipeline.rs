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

use chrono::{DateTime, TimeZone, Utc};
use cinder_core::{tree_key, ProfileTree, PutInput, SampleKey, SharedTree};
use cinder_index::{DimensionIndex, IndexError, LabelIndex, LabelStore};
use cinder_storage::{
    segment_cache, tree_cache, AdmissionRejection, CacheError, EntryCache, ExemplarCache,
    MemoryCache, PutError, SegmentConfig, SharedSegment, Storage, StorageBuilder,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const T0: i64 = 1_700_000_000;
const SEGMENT_KEY: &str = "svc{env=prod}";

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn key() -> SampleKey {
    SampleKey::new("svc").unwrap().with_label("env", "prod").unwrap()
}

fn tree(text: &str) -> ProfileTree {
    ProfileTree::from_collapsed(text).unwrap()
}

fn sample(start: i64, end: i64, text: &str) -> PutInput {
    PutInput::new(key(), tree(text), at(start), at(end))
}

/// Storage plus handles to its in-memory collaborators for inspection.
struct Harness {
    storage: Storage,
    labels: Arc<LabelIndex>,
    dimensions: Arc<DimensionIndex>,
    segments: Arc<MemoryCache<SharedSegment>>,
    trees: Arc<MemoryCache<SharedTree>>,
    exemplars: Arc<ExemplarCache>,
}

impl Harness {
    fn new(config: SegmentConfig) -> Self {
        Self::with(config, StorageBuilder::new())
    }

    fn with(config: SegmentConfig, builder: StorageBuilder) -> Self {
        cinder_telemetry::init_test_tracing();

        let labels = Arc::new(LabelIndex::new());
        let dimensions = Arc::new(DimensionIndex::new());
        let segments = Arc::new(segment_cache(1_000, None, config.clone()));
        let trees = Arc::new(tree_cache(10_000, None));
        let exemplars = Arc::new(ExemplarCache::new(1_000));

        let storage = builder
            .segment_config(config)
            .labels(labels.clone())
            .dimensions(dimensions.clone())
            .segments(segments.clone())
            .trees(trees.clone())
            .exemplars(exemplars.clone())
            .build()
            .unwrap();

        Self {
            storage,
            labels,
            dimensions,
            segments,
            trees,
            exemplars,
        }
    }

    fn tree_at(&self, depth: u32, secs: i64) -> Option<ProfileTree> {
        self.trees
            .lookup(&tree_key(SEGMENT_KEY, depth, at(secs)))
            .map(|t| t.snapshot())
    }
}

fn single(resolution_secs: u64) -> SegmentConfig {
    SegmentConfig::single_resolution(Duration::from_secs(resolution_secs))
}

fn ladder(resolution_secs: u64, multiplier: u32, levels: u32) -> SegmentConfig {
    SegmentConfig {
        resolution: Duration::from_secs(resolution_secs),
        multiplier,
        levels,
    }
}

/// Tree cache that refuses to create one key.
struct FlakyTrees {
    inner: MemoryCache<SharedTree>,
    failing_key: String,
}

impl EntryCache<SharedTree> for FlakyTrees {
    fn get_or_create(&self, key: &str) -> Result<SharedTree, CacheError> {
        if key == self.failing_key {
            return Err(CacheError::Create {
                key: key.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.inner.get_or_create(key)
    }

    fn lookup(&self, key: &str) -> Option<SharedTree> {
        self.inner.lookup(key)
    }

    fn put(&self, key: &str, value: SharedTree) {
        self.inner.put(key, value)
    }
}

struct FailingLabels;

impl LabelStore for FailingLabels {
    fn put(&self, _name: &str, _value: &str) -> Result<(), IndexError> {
        Err(IndexError::Unavailable("label store offline".to_string()))
    }
}

/// Label store that goes offline after accepting `accept` labels.
struct FlakyLabels {
    inner: LabelIndex,
    accept: usize,
    calls: AtomicUsize,
}

impl LabelStore for FlakyLabels {
    fn put(&self, name: &str, value: &str) -> Result<(), IndexError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.accept {
            return Err(IndexError::Unavailable("label store offline".to_string()));
        }
        self.inner.put(name, value)
    }
}

/// Two puts into one 20s bucket merge into a single tree.
#[test]
fn test_end_to_end_doubling() {
    let h = Harness::new(single(20));
    let value = tree("main;work 10\nmain;idle 4");

    for (start, end) in [(T0, T0 + 10), (T0 + 10, T0 + 20)] {
        let input = PutInput::new(key(), value.clone(), at(start), at(end));
        let report = h.storage.put(&input).unwrap().into_result().unwrap();
        assert_eq!(report.buckets_written, 1);
    }

    let mut expected = value.clone();
    expected.merge(&value);
    assert_eq!(h.tree_at(0, T0).unwrap(), expected);
    assert_eq!(h.trees.entry_count(), 1);
}

/// A failing middle bucket does not stop its neighbours.
#[test]
fn test_partial_failure_forward_progress() {
    cinder_telemetry::init_test_tracing();
    let failing_key = tree_key(SEGMENT_KEY, 0, at(T0 + 10));
    let trees = Arc::new(FlakyTrees {
        inner: tree_cache(100, None),
        failing_key: failing_key.clone(),
    });
    let storage = StorageBuilder::new()
        .segment_config(single(10))
        .trees(trees.clone())
        .build()
        .unwrap();

    let report = storage.put(&sample(T0, T0 + 30, "a;b 30")).unwrap();
    assert_eq!(report.buckets_written, 2);
    assert_eq!(report.bucket_failures.len(), 1);
    assert_eq!(report.bucket_failures[0].time, at(T0 + 10));

    for secs in [T0, T0 + 20] {
        let written = trees
            .lookup(&tree_key(SEGMENT_KEY, 0, at(secs)))
            .unwrap()
            .snapshot();
        assert_eq!(written.self_value(&["a", "b"]), Some(10));
    }
    assert!(trees.lookup(&failing_key).is_none());

    match report.into_result() {
        Err(err @ PutError::PartialWrite { .. }) => {
            assert!(err.to_string().contains(&failing_key));
        }
        other => panic!("expected partial write, got {:?}", other),
    }
    assert_eq!(storage.metrics().bucket_failures, 1);
}

/// Each check rejects on its own; nothing is indexed for rejected puts.
#[test]
fn test_admission_precedence() {
    let full = Arc::new(AtomicBool::new(false));
    let flag = full.clone();
    let h = Harness::with(
        single(10),
        StorageBuilder::new()
            .health(Arc::new(move || flag.load(Ordering::SeqCst)))
            .retention(Arc::new(|| at(T0))),
    );

    let err = h.storage.put(&sample(T0 - 10, T0, "a 1")).unwrap_err();
    assert!(matches!(
        err,
        PutError::AdmissionRejected(AdmissionRejection::RetentionExpired { .. })
    ));

    full.store(true, Ordering::SeqCst);
    let err = h.storage.put(&sample(T0, T0 + 10, "a 1")).unwrap_err();
    assert!(matches!(
        err,
        PutError::AdmissionRejected(AdmissionRejection::OutOfSpace)
    ));

    assert!(h.labels.is_empty());
    assert!(h.dimensions.is_empty());
    assert_eq!(h.segments.entry_count(), 0);
    assert_eq!(h.trees.entry_count(), 0);

    full.store(false, Ordering::SeqCst);
    assert!(h.storage.put(&sample(T0, T0 + 10, "a 1")).is_ok());

    let metrics = h.storage.metrics();
    assert_eq!(metrics.rejected_retention, 1);
    assert_eq!(metrics.rejected_out_of_space, 1);
    assert_eq!(metrics.put_total, 1);
}

/// Samples with a profile ID only reach the exemplar store.
#[test]
fn test_exemplar_exclusivity() {
    let h = Harness::new(single(10));
    let key = key().with_profile_id("req-42").unwrap();
    let input = PutInput::new(key, tree("main 3"), at(T0), at(T0 + 10));

    let report = h.storage.put(&input).unwrap();
    assert!(report.exemplar);
    assert_eq!(report.buckets_written, 0);

    assert!(h.labels.is_empty());
    assert!(h.dimensions.is_empty());
    assert_eq!(h.segments.entry_count(), 0);
    assert_eq!(h.trees.entry_count(), 0);

    let exemplar = h.exemplars.get("svc", "req-42").unwrap();
    assert_eq!(exemplar.tree.samples(), 3);
    assert_eq!(exemplar.end_time, at(T0 + 10));
    assert_eq!(h.storage.metrics().exemplar_total, 1);
}

/// Repeated puts of one identity index it once.
#[test]
fn test_dimension_idempotence() {
    let h = Harness::new(single(10));
    h.storage.put(&sample(T0, T0 + 10, "a 1")).unwrap();
    h.storage.put(&sample(T0 + 10, T0 + 20, "a 1")).unwrap();

    assert_eq!(h.dimensions.segment_keys("env:prod"), vec![SEGMENT_KEY]);
    assert_eq!(h.dimensions.segment_keys("__name__:svc"), vec![SEGMENT_KEY]);
    assert_eq!(h.labels.values("__name__"), vec!["svc"]);
    assert_eq!(h.labels.values("env"), vec!["prod"]);
}

/// Shares of one sample across buckets add back up to the sample.
#[test]
fn test_ratio_conservation() {
    let h = Harness::new(single(10));
    let report = h.storage.put(&sample(T0 + 5, T0 + 35, "a 30")).unwrap();
    assert_eq!(report.buckets_written, 4);

    let shares: Vec<u64> = [T0, T0 + 10, T0 + 20, T0 + 30]
        .iter()
        .map(|&secs| h.tree_at(0, secs).unwrap().samples())
        .collect();
    assert_eq!(shares, vec![5, 10, 10, 5]);
    assert_eq!(shares.iter().sum::<u64>(), 30);
}

/// A coarse bucket materialized late still holds all earlier data once.
#[test]
fn test_addons_keep_coarse_buckets_complete() {
    let h = Harness::new(ladder(10, 10, 2));
    h.storage.put(&sample(T0, T0 + 10, "a 10")).unwrap();
    assert!(h.tree_at(1, T0).is_none());

    h.storage.put(&sample(T0 + 10, T0 + 20, "a 20")).unwrap();
    h.storage.put(&sample(T0 + 20, T0 + 30, "b 5")).unwrap();

    let coarse = h.tree_at(1, T0).unwrap();
    assert_eq!(coarse.self_value(&["a"]), Some(30));
    assert_eq!(coarse.self_value(&["b"]), Some(5));

    let fine_total: u64 = [T0, T0 + 10, T0 + 20]
        .iter()
        .map(|&secs| h.tree_at(0, secs).unwrap().samples())
        .sum();
    assert_eq!(coarse.samples(), fine_total);
}

/// Addons are found through buckets that never materialized.
#[test]
fn test_addons_across_levels() {
    // Bucket widths 10s, 20s, 40s.
    let h = Harness::new(ladder(10, 2, 3));
    h.storage.put(&sample(T0, T0 + 10, "a 1")).unwrap();
    h.storage.put(&sample(T0 + 20, T0 + 30, "a 2")).unwrap();
    assert_eq!(h.tree_at(2, T0).unwrap().samples(), 3);
    assert!(h.tree_at(1, T0).is_none());

    h.storage.put(&sample(T0 + 10, T0 + 20, "a 4")).unwrap();
    assert_eq!(h.tree_at(2, T0).unwrap().samples(), 7);
    assert_eq!(h.tree_at(1, T0).unwrap().samples(), 5);
    assert_eq!(h.tree_at(0, T0 + 10).unwrap().samples(), 4);
}

/// A sample spanning a whole coarse bucket is written at both depths.
#[test]
fn test_covering_sample() {
    let h = Harness::new(ladder(10, 10, 2));
    let report = h.storage.put(&sample(T0, T0 + 100, "a 100")).unwrap();
    assert_eq!(report.buckets_written, 11);
    assert_eq!(h.tree_at(1, T0).unwrap().samples(), 100);
    assert_eq!(h.tree_at(0, T0 + 50).unwrap().samples(), 10);
}

/// Dimension failures are reported but do not block the write.
#[test]
fn test_dimension_failure_is_skipped() {
    cinder_telemetry::init_test_tracing();
    let dimensions = Arc::new(DimensionIndex::with_limit(1));
    let trees = Arc::new(tree_cache(100, None));
    let storage = StorageBuilder::new()
        .segment_config(single(10))
        .dimensions(dimensions.clone())
        .trees(trees.clone())
        .build()
        .unwrap();

    let report = storage.put(&sample(T0, T0 + 10, "a 1")).unwrap();
    assert_eq!(report.dimension_failures.len(), 1);
    assert_eq!(report.dimension_failures[0].token, "env:prod");
    assert!(!report.is_complete());
    assert_eq!(report.buckets_written, 1);
    assert!(report.into_result().is_ok());
    assert_eq!(dimensions.segment_keys("__name__:svc"), vec![SEGMENT_KEY]);
    assert_eq!(storage.metrics().dimension_failures, 1);
}

/// A label index failure aborts before segments are touched.
#[test]
fn test_label_failure_aborts() {
    cinder_telemetry::init_test_tracing();
    let segments = Arc::new(segment_cache(100, None, single(10)));
    let storage = StorageBuilder::new()
        .segment_config(single(10))
        .labels(Arc::new(FailingLabels))
        .segments(segments.clone())
        .build()
        .unwrap();

    let err = storage.put(&sample(T0, T0 + 10, "a 1")).unwrap_err();
    assert!(matches!(err, PutError::IndexingFailed { .. }));
    assert_eq!(segments.entry_count(), 0);
}

/// A label failure after earlier labels were accepted leaves no dimension
/// pointing at the segment.
#[test]
fn test_label_failure_midway_leaves_dimensions_untouched() {
    cinder_telemetry::init_test_tracing();
    let labels = Arc::new(FlakyLabels {
        inner: LabelIndex::new(),
        accept: 1,
        calls: AtomicUsize::new(0),
    });
    let dimensions = Arc::new(DimensionIndex::new());
    let segments = Arc::new(segment_cache(100, None, single(10)));
    let trees = Arc::new(tree_cache(100, None));
    let storage = StorageBuilder::new()
        .segment_config(single(10))
        .labels(labels.clone())
        .dimensions(dimensions.clone())
        .segments(segments.clone())
        .trees(trees.clone())
        .build()
        .unwrap();

    let input = PutInput::new(
        SampleKey::from_labels("svc", [("env", "prod"), ("region", "eu")]).unwrap(),
        tree("a 1"),
        at(T0),
        at(T0 + 10),
    );
    let err = storage.put(&input).unwrap_err();
    assert!(matches!(err, PutError::IndexingFailed { .. }));
    assert_eq!(labels.calls.load(Ordering::SeqCst), 2);

    assert!(dimensions.is_empty());
    assert_eq!(segments.entry_count(), 0);
    assert_eq!(trees.entry_count(), 0);
}

/// Sub-second buckets each keep their own tree.
#[test]
fn test_sub_second_buckets_stay_separate() {
    let config = SegmentConfig {
        resolution: Duration::from_millis(500),
        multiplier: 2,
        levels: 2,
    };
    let h = Harness::new(config);
    let half = at(T0) + chrono::Duration::milliseconds(500);

    let first = PutInput::new(key(), tree("a 10"), at(T0), half);
    let second = PutInput::new(key(), tree("a 10"), half, at(T0 + 1));
    h.storage.put(&first).unwrap().into_result().unwrap();
    h.storage.put(&second).unwrap().into_result().unwrap();

    let lookup = |depth: u32, time| {
        h.trees
            .lookup(&tree_key(SEGMENT_KEY, depth, time))
            .map(|t| t.snapshot())
            .unwrap()
    };
    assert_eq!(lookup(0, at(T0)).self_value(&["a"]), Some(10));
    assert_eq!(lookup(0, half).self_value(&["a"]), Some(10));
    assert_eq!(lookup(1, at(T0)).self_value(&["a"]), Some(20));
}

/// A segment cache failure aborts the put.
#[test]
fn test_segment_unavailable() {
    cinder_telemetry::init_test_tracing();
    let segments: Arc<MemoryCache<SharedSegment>> = Arc::new(MemoryCache::new(10, |key| {
        Err(CacheError::Create {
            key: key.to_string(),
            reason: "no room".to_string(),
        })
    }));
    let trees = Arc::new(tree_cache(100, None));
    let storage = StorageBuilder::new()
        .segments(segments)
        .trees(trees.clone())
        .build()
        .unwrap();

    let err = storage.put(&sample(T0, T0 + 10, "a 1")).unwrap_err();
    match err {
        PutError::SegmentUnavailable { key, .. } => assert_eq!(key, SEGMENT_KEY),
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(trees.entry_count(), 0);
}

/// The latest put's collection metadata is kept on the segment.
#[test]
fn test_metadata_last_write_wins() {
    let h = Harness::new(single(10));
    h.storage
        .put(&sample(T0, T0 + 10, "a 1").sample_rate(99))
        .unwrap();
    h.storage
        .put(&sample(T0, T0 + 10, "a 1").sample_rate(250).spy_name("ebpfspy"))
        .unwrap();

    let segment = h.segments.lookup(SEGMENT_KEY).unwrap();
    segment.with_read(|s| {
        assert_eq!(s.metadata().sample_rate, 250);
        assert_eq!(s.metadata().spy_name, "ebpfspy");
        assert_eq!(s.samples(), 2);
    });
}

/// Concurrent writers to one bucket lose nothing.
#[test]
fn test_concurrent_writers() {
    let h = Arc::new(Harness::new(single(10)));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let h = Arc::clone(&h);
            thread::spawn(move || {
                for _ in 0..25 {
                    h.storage.put(&sample(T0, T0 + 10, "a;b 1")).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(h.tree_at(0, T0).unwrap().samples(), 200);
    assert_eq!(h.storage.metrics().put_total, 200);
    assert_eq!(h.storage.puts_for_app("svc"), 200);
}
