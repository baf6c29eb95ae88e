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

use thiserror::Error;

/// Errors for label and dimension index operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("Invalid label {name:?}: {reason}")]
    InvalidLabel { name: String, reason: &'static str },

    #[error("Dimension limit of {limit} reached, cannot create {token:?}")]
    DimensionLimit { token: String, limit: usize },

    #[error("Index unavailable: {0}")]
    Unavailable(String),
}
