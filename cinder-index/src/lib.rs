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

//! Cinder Index Layer
//!
//! Secondary indexes maintained by the write path:
//!
//! - **Label index** (`labels`): label name -> every value ever observed.
//! - **Dimension index** (`dimension`): `name:value` token -> sorted set of
//!   segment keys carrying that label, for later "all segments with label X"
//!   lookups.
//!
//! Both indexes only grow on the write path. Each is exposed through a trait
//! (`LabelStore`, `DimensionStore`) so the storage layer can swap in a
//! persistent backend.

pub mod dimension;
pub mod error;
pub mod labels;

pub use dimension::{dimension_token, Dimension, DimensionIndex, DimensionStore, SharedDimension};
pub use error::IndexError;
pub use labels::{LabelIndex, LabelStore};
