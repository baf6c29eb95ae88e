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

//! Segment: Multi-Resolution Bucket Ladder
//!
//! A segment owns the timeline of one identity (app + labels). Time is split
//! into epoch-aligned buckets at several depths:
//!
//! ```text
//! depth 2  |---------------------- 1000s ----------------------|
//! depth 1  |--- 100s ---|--- 100s ---|  ...
//! depth 0  |10s|10s|10s|  ...
//! ```
//!
//! Depth 0 buckets are always materialized (hold a tree). A coarser bucket is
//! materialized lazily, the first time a write covers it completely or when
//! more than one of its children holds data. At that moment the closest
//! materialized descendants written earlier become its addons, which the
//! caller folds in so the coarse tree is complete.
//!
//! `bucket` does not touch trees. It returns a [`BucketPlan`] of targets that
//! the write path consumes.

use chrono::{DateTime, Utc};
use cinder_core::{Ratio, SegmentMetadata};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    #[error("Time out of range: {0}")]
    TimeOutOfRange(String),

    #[error("Invalid segment config: {0}")]
    InvalidConfig(String),
}

/// Shape of the bucket ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentConfig {
    /// Width of a depth 0 bucket.
    pub resolution: Duration,
    /// Each depth is `multiplier` times wider than the one below.
    pub multiplier: u32,
    /// Number of depths.
    pub levels: u32,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            resolution: Duration::from_secs(10),
            multiplier: 10,
            levels: 6,
        }
    }
}

impl SegmentConfig {
    /// A ladder with a single depth of the given width.
    pub fn single_resolution(resolution: Duration) -> Self {
        Self {
            resolution,
            multiplier: 10,
            levels: 1,
        }
    }

    pub fn validate(&self) -> Result<(), SegmentError> {
        if self.resolution.as_micros() == 0 {
            return Err(SegmentError::InvalidConfig(
                "resolution must be at least 1µs".to_string(),
            ));
        }
        if self.levels == 0 {
            return Err(SegmentError::InvalidConfig(
                "levels must be at least 1".to_string(),
            ));
        }
        if self.levels > 1 && self.multiplier < 2 {
            return Err(SegmentError::InvalidConfig(
                "multiplier must be at least 2".to_string(),
            ));
        }
        let top = self.levels - 1;
        if self.width_micros(top) > i64::MAX as i128 {
            return Err(SegmentError::InvalidConfig(format!(
                "depth {} buckets are too wide",
                top
            )));
        }
        Ok(())
    }

    /// Bucket width at `depth`, in microseconds. Saturates on overflow.
    pub fn width_micros(&self, depth: u32) -> i128 {
        let base = self.resolution.as_micros().min(i128::MAX as u128) as i128;
        (0..depth).fold(base, |width, _| {
            width.saturating_mul(self.multiplier as i128)
        })
    }

    pub fn bucket_width(&self, depth: u32) -> Duration {
        let micros = self.width_micros(depth).clamp(0, u64::MAX as i128) as u64;
        Duration::from_micros(micros)
    }
}

/// A bucket already materialized by an earlier write that must be folded
/// into a bucket materializing now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addon {
    pub depth: u32,
    pub time: DateTime<Utc>,
}

/// One bucket a sample contributes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketTarget {
    pub depth: u32,
    /// Bucket start.
    pub time: DateTime<Utc>,
    /// Share of the sample that falls in this bucket.
    pub ratio: Ratio,
    pub addons: Vec<Addon>,
}

/// Targets of one write, coarse to fine. Consumed once.
#[derive(Debug)]
pub struct BucketPlan {
    targets: std::vec::IntoIter<BucketTarget>,
}

impl Iterator for BucketPlan {
    type Item = BucketTarget;

    fn next(&mut self) -> Option<BucketTarget> {
        self.targets.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.targets.size_hint()
    }
}

impl ExactSizeIterator for BucketPlan {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct NodeId {
    depth: u32,
    start: i128,
}

/// Per-identity timeline controller.
#[derive(Debug, Clone)]
pub struct Segment {
    config: SegmentConfig,
    metadata: SegmentMetadata,
    /// Buckets that received data, materialized or not.
    touched: BTreeSet<NodeId>,
    /// Buckets that hold a tree.
    present: BTreeSet<NodeId>,
    samples: u64,
}

impl Segment {
    pub fn new(config: SegmentConfig) -> Self {
        Self {
            config,
            metadata: SegmentMetadata::default(),
            touched: BTreeSet::new(),
            present: BTreeSet::new(),
            samples: 0,
        }
    }

    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }

    /// Last write wins.
    pub fn set_metadata(&mut self, metadata: SegmentMetadata) {
        self.metadata = metadata;
    }

    pub fn metadata(&self) -> &SegmentMetadata {
        &self.metadata
    }

    /// Total samples recorded through `bucket`.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Whether the bucket at (`depth`, `time`) holds a tree.
    pub fn is_materialized(&self, depth: u32, time: DateTime<Utc>) -> bool {
        self.present.contains(&NodeId {
            depth,
            start: time.timestamp_micros() as i128,
        })
    }

    /// Number of materialized buckets across all depths.
    pub fn materialized_count(&self) -> usize {
        self.present.len()
    }

    /// Plan the buckets for a sample over `[start, end)` and record them.
    ///
    /// An instantaneous sample (`end <= start`) lands whole in the bucket
    /// containing `start` at every depth.
    pub fn bucket(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        samples: u64,
    ) -> Result<BucketPlan, SegmentError> {
        let st = start.timestamp_micros() as i128;
        let mut et = end.timestamp_micros() as i128;
        if et <= st {
            et = st + 1;
        }
        let span = to_u64(et - st)?;

        let mut targets = Vec::new();
        for depth in (0..self.config.levels).rev() {
            let width = self.config.width_micros(depth);
            let mut bucket_start = st.div_euclid(width) * width;

            while bucket_start < et {
                let bucket_end = bucket_start + width;
                let node = NodeId {
                    depth,
                    start: bucket_start,
                };

                let covered = st <= bucket_start && bucket_end <= et;
                let materialize = depth == 0
                    || self.present.contains(&node)
                    || covered
                    || self.busy_children(node, st, et) > 1;
                self.touched.insert(node);

                if materialize {
                    let addons = if self.present.insert(node) {
                        let mut found = Vec::new();
                        self.collect_addons(node, &mut found);
                        found
                            .into_iter()
                            .map(|id| {
                                Ok(Addon {
                                    depth: id.depth,
                                    time: to_time(id.start)?,
                                })
                            })
                            .collect::<Result<Vec<_>, SegmentError>>()?
                    } else {
                        Vec::new()
                    };

                    let overlap = bucket_end.min(et) - bucket_start.max(st);
                    let ratio = Ratio::new(to_u64(overlap)?, span).ok_or_else(|| {
                        SegmentError::TimeOutOfRange(format!("empty span at {}", start))
                    })?;

                    targets.push(BucketTarget {
                        depth,
                        time: to_time(bucket_start)?,
                        ratio,
                        addons,
                    });
                }

                bucket_start = bucket_end;
            }
        }

        self.samples = self.samples.saturating_add(samples);
        Ok(BucketPlan {
            targets: targets.into_iter(),
        })
    }

    fn children(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        let depth = node.depth.saturating_sub(1);
        let width = self.config.width_micros(depth);
        let count = if node.depth == 0 {
            0
        } else {
            self.config.multiplier as i128
        };
        (0..count).map(move |i| NodeId {
            depth,
            start: node.start + i * width,
        })
    }

    /// Children that hold data once the sample over `[st, et)` is written.
    fn busy_children(&self, node: NodeId, st: i128, et: i128) -> usize {
        let width = self.config.width_micros(node.depth.saturating_sub(1));
        self.children(node)
            .filter(|child| {
                let overlaps = child.start < et && st < child.start + width;
                overlaps || self.touched.contains(child)
            })
            .count()
    }

    /// Closest materialized descendants of `node`. Only valid before this
    /// write updates the finer depths.
    fn collect_addons(&self, node: NodeId, out: &mut Vec<NodeId>) {
        for child in self.children(node) {
            if self.present.contains(&child) {
                out.push(child);
            } else if self.touched.contains(&child) {
                self.collect_addons(child, out);
            }
        }
    }
}

fn to_u64(micros: i128) -> Result<u64, SegmentError> {
    u64::try_from(micros)
        .map_err(|_| SegmentError::TimeOutOfRange(format!("{}µs does not fit", micros)))
}

fn to_time(micros: i128) -> Result<DateTime<Utc>, SegmentError> {
    i64::try_from(micros)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_micros)
        .ok_or_else(|| SegmentError::TimeOutOfRange(format!("{}µs", micros)))
}
