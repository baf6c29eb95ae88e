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

//! Collection metadata carried by every write and kept per segment.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unit of the values stored in a profile tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Units {
    #[default]
    Samples,
    Objects,
    Goroutines,
    Bytes,
    LockSamples,
    LockNanoseconds,
    TraceSamples,
    Exceptions,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Samples => "samples",
            Units::Objects => "objects",
            Units::Goroutines => "goroutines",
            Units::Bytes => "bytes",
            Units::LockSamples => "lock_samples",
            Units::LockNanoseconds => "lock_nanoseconds",
            Units::TraceSamples => "trace_samples",
            Units::Exceptions => "exceptions",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "samples" => Units::Samples,
            "objects" => Units::Objects,
            "goroutines" => Units::Goroutines,
            "bytes" => Units::Bytes,
            "lock_samples" => Units::LockSamples,
            "lock_nanoseconds" => Units::LockNanoseconds,
            "trace_samples" => Units::TraceSamples,
            "exceptions" => Units::Exceptions,
            other => {
                return Err(CoreError::Parse {
                    kind: "units",
                    value: other.to_string(),
                })
            }
        })
    }
}

/// How values of consecutive samples combine when read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationType {
    #[default]
    Sum,
    Average,
}

impl AggregationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationType::Sum => "sum",
            AggregationType::Average => "average",
        }
    }
}

impl fmt::Display for AggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sum" => Ok(AggregationType::Sum),
            "average" => Ok(AggregationType::Average),
            other => Err(CoreError::Parse {
                kind: "aggregation type",
                value: other.to_string(),
            }),
        }
    }
}

/// Per-segment metadata. Overwritten by every write (last write wins).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMetadata {
    /// Name of the collecting agent (spy)
    pub spy_name: String,
    /// Sampling frequency in Hz
    pub sample_rate: u32,
    pub units: Units,
    pub aggregation_type: AggregationType,
}

impl Default for SegmentMetadata {
    fn default() -> Self {
        Self {
            spy_name: "unknown".to_string(),
            sample_rate: 100,
            units: Units::Samples,
            aggregation_type: AggregationType::Sum,
        }
    }
}
