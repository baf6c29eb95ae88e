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

//! Sample identity keys
//!
//! A [`SampleKey`] identifies one profiled series: an application name plus a
//! label set. Its normalized form `app{k1=v1,k2=v2}` sorts labels by name, so
//! two keys built from the same labels in any order normalize identically.
//!
//! The normalized form doubles as the segment key. Tree keys append the
//! resolution depth and bucket time: `app{k=v}:1:1700000000`, with a
//! microsecond fraction for buckets that do not start on a whole second.

use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Reserved label carrying the application name in label indexes.
pub const APP_NAME_LABEL: &str = "__name__";

/// Reserved label carrying the per-sample profile ID.
pub const PROFILE_ID_LABEL: &str = "profile_id";

/// Characters that would make the normalized form ambiguous.
const RESERVED_CHARS: [char; 4] = ['{', '}', '=', ','];

/// Identity of a write.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SampleKey {
    app_name: String,
    labels: BTreeMap<String, String>,
    profile_id: Option<String>,
}

impl SampleKey {
    /// Create a key with no labels.
    pub fn new(app_name: impl Into<String>) -> Result<Self> {
        let app_name = app_name.into();
        if app_name.trim().is_empty() {
            return Err(invalid(&app_name, "empty application name"));
        }
        if app_name.contains(RESERVED_CHARS) {
            return Err(invalid(&app_name, "reserved character in application name"));
        }
        Ok(Self {
            app_name,
            labels: BTreeMap::new(),
            profile_id: None,
        })
    }

    /// Create a key from an app name and a label iterator.
    pub fn from_labels<I, K, V>(app_name: impl Into<String>, labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        labels
            .into_iter()
            .try_fold(Self::new(app_name)?, |key, (name, value)| {
                key.with_label(name, value)
            })
    }

    /// Add a label. The `profile_id` label is lifted into the profile ID.
    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let value = value.into();
        if name == PROFILE_ID_LABEL {
            return self.with_profile_id(value);
        }
        if name.is_empty() {
            return Err(invalid(&name, "empty label name"));
        }
        if name == APP_NAME_LABEL {
            return Err(invalid(&name, "reserved label name"));
        }
        if name.contains(RESERVED_CHARS) || value.contains(RESERVED_CHARS) {
            return Err(invalid(
                &format!("{}={}", name, value),
                "reserved character in label",
            ));
        }
        self.labels.insert(name, value);
        Ok(self)
    }

    /// Attach a per-sample profile ID, which routes the sample to the exemplar store.
    pub fn with_profile_id(mut self, profile_id: impl Into<String>) -> Result<Self> {
        let profile_id = profile_id.into();
        if profile_id.is_empty() {
            return Err(invalid(&profile_id, "empty profile id"));
        }
        self.profile_id = Some(profile_id);
        Ok(self)
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn profile_id(&self) -> Option<&str> {
        self.profile_id.as_deref()
    }

    /// Every (name, value) pair of the identity, starting with the reserved
    /// app name label. The profile ID is not part of the identity.
    pub fn labels(&self) -> impl Iterator<Item = (&str, &str)> {
        std::iter::once((APP_NAME_LABEL, self.app_name.as_str())).chain(
            self.labels
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        )
    }

    /// Canonical `app{k1=v1,k2=v2}` form.
    pub fn normalized(&self) -> String {
        let labels_len: usize = self.labels.iter().map(|(k, v)| k.len() + v.len() + 2).sum();
        let mut out = String::with_capacity(self.app_name.len() + labels_len + 2);
        out.push_str(&self.app_name);
        out.push('{');
        for (i, (name, value)) in self.labels.iter().enumerate() {
            if i != 0 {
                out.push(',');
            }
            out.push_str(name);
            out.push('=');
            out.push_str(value);
        }
        out.push('}');
        out
    }

    /// Segment cache key. Pure function of app name and labels.
    pub fn segment_key(&self) -> String {
        self.normalized()
    }

    /// Tree cache key for one (depth, bucket time) slot of this identity.
    pub fn tree_key(&self, depth: u32, bucket_time: DateTime<Utc>) -> String {
        tree_key(&self.segment_key(), depth, bucket_time)
    }

    /// Parse a normalized key. Accepts `app`, `app{}` and `app{k=v,...}`.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let (app_name, body) = match input.find('{') {
            Some(open) => {
                let body = input[open + 1..]
                    .strip_suffix('}')
                    .ok_or_else(|| invalid(input, "missing closing brace"))?;
                (&input[..open], body)
            }
            None => (input, ""),
        };

        let mut key = Self::new(app_name.trim())?;
        for pair in body.split(',').filter(|pair| !pair.trim().is_empty()) {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| invalid(input, "label without '='"))?;
            key = key.with_label(name.trim(), value.trim())?;
        }
        Ok(key)
    }
}

/// Build a tree key from an already computed segment key.
///
/// Whole-second bucket times render as unix seconds. Sub-second bucket times
/// carry a six-digit microsecond fraction so narrow buckets never collide.
pub fn tree_key(segment_key: &str, depth: u32, bucket_time: DateTime<Utc>) -> String {
    let micros = bucket_time.timestamp_micros();
    let secs = micros.div_euclid(1_000_000);
    let frac = micros.rem_euclid(1_000_000);
    if frac == 0 {
        format!("{}:{}:{}", segment_key, depth, secs)
    } else {
        format!("{}:{}:{}.{:06}", segment_key, depth, secs, frac)
    }
}

impl fmt::Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

impl FromStr for SampleKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn invalid(key: &str, reason: &'static str) -> CoreError {
    CoreError::InvalidKey {
        key: key.to_string(),
        reason,
    }
}
