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

//! Put path errors.

use crate::cache::CacheError;
use crate::exemplars::ExemplarError;
use crate::segment::SegmentError;
use chrono::{DateTime, Utc};
use cinder_index::IndexError;
use std::fmt;
use thiserror::Error;

/// Why a sample was refused before any state was touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionRejection {
    #[error("out of disk space")]
    OutOfSpace,

    #[error("start time {start_time} is before the retention boundary {boundary}")]
    RetentionExpired {
        start_time: DateTime<Utc>,
        boundary: DateTime<Utc>,
    },
}

/// Errors returned by `Storage::put`.
#[derive(Debug, Error)]
pub enum PutError {
    #[error("Put rejected: {0}")]
    AdmissionRejected(#[from] AdmissionRejection),

    #[error("Indexing failed for {key}: {source}")]
    IndexingFailed { key: String, source: IndexError },

    #[error("Segments cache for {key}: {source}")]
    SegmentUnavailable { key: String, source: CacheError },

    #[error("Bucketing failed for {key}: {source}")]
    Bucketing { key: String, source: SegmentError },

    #[error("Exemplar insert failed for {key}: {source}")]
    Exemplar { key: String, source: ExemplarError },

    #[error("Partial write for {key}: {}", describe_failures(.failures))]
    PartialWrite {
        key: String,
        failures: Vec<BucketFailure>,
    },
}

impl PutError {
    /// True for admission rejections, which leave no trace in storage.
    pub fn is_rejection(&self) -> bool {
        matches!(self, PutError::AdmissionRejected(_))
    }
}

/// One bucket that could not be written. The rest of the put proceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketFailure {
    pub depth: u32,
    pub time: DateTime<Utc>,
    pub tree_key: String,
    pub source: CacheError,
}

impl fmt::Display for BucketFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bucket depth={} time={} ({}): {}",
            self.depth, self.time, self.tree_key, self.source
        )
    }
}

/// One dimension that could not be updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionFailure {
    pub token: String,
    pub source: IndexError,
}

fn describe_failures(failures: &[BucketFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
