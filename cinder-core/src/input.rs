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

use crate::key::SampleKey;
use crate::metadata::{AggregationType, SegmentMetadata, Units};
use crate::tree::ProfileTree;
use chrono::{DateTime, Utc};

/// One write request.
///
/// The value is attributed uniformly over `[start_time, end_time)`.
#[derive(Debug, Clone)]
pub struct PutInput {
    pub key: SampleKey,
    pub value: ProfileTree,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub spy_name: String,
    pub sample_rate: u32,
    pub units: Units,
    pub aggregation_type: AggregationType,
}

impl PutInput {
    /// Create an input with default collection metadata.
    pub fn new(
        key: SampleKey,
        value: ProfileTree,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let defaults = SegmentMetadata::default();
        Self {
            key,
            value,
            start_time,
            end_time,
            spy_name: defaults.spy_name,
            sample_rate: defaults.sample_rate,
            units: defaults.units,
            aggregation_type: defaults.aggregation_type,
        }
    }

    pub fn spy_name(mut self, spy_name: impl Into<String>) -> Self {
        self.spy_name = spy_name.into();
        self
    }

    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn units(mut self, units: Units) -> Self {
        self.units = units;
        self
    }

    pub fn aggregation_type(mut self, aggregation_type: AggregationType) -> Self {
        self.aggregation_type = aggregation_type;
        self
    }

    /// Sample count derived from the payload.
    pub fn samples(&self) -> u64 {
        self.value.samples()
    }

    pub fn metadata(&self) -> SegmentMetadata {
        SegmentMetadata {
            spy_name: self.spy_name.clone(),
            sample_rate: self.sample_rate,
            units: self.units,
            aggregation_type: self.aggregation_type,
        }
    }
}
