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

//! Cinder Core
//!
//! Fundamental data types for the profile ingestion path:
//!
//! - [`SampleKey`]: identity of a write (app name + label set + optional profile ID)
//! - [`PutInput`]: one write request with its collection metadata
//! - [`ProfileTree`]: the mergeable call-stack aggregate stored per bucket
//! - [`Ratio`]: exact time-overlap weight applied when a sample is split
//! - [`LockedCell`]: scoped read/write access to shared cache entries

pub mod error;
pub mod input;
pub mod key;
pub mod locked_cell;
pub mod metadata;
pub mod ratio;
pub mod tree;

pub use error::{CoreError, Result};
pub use input::PutInput;
pub use key::{tree_key, SampleKey, APP_NAME_LABEL, PROFILE_ID_LABEL};
pub use locked_cell::LockedCell;
pub use metadata::{AggregationType, SegmentMetadata, Units};
pub use ratio::Ratio;
pub use tree::{ProfileTree, SharedTree};
