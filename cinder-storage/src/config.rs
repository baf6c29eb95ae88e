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

use crate::segment::SegmentConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Cinder Storage Configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Data directory; its volume is watched for disk pressure
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub segment: SegmentSettings,

    #[serde(default)]
    pub disk: DiskConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RetentionConfig {
    /// Keep samples newer than this many seconds (unset or 0 = keep everything)
    #[serde(default)]
    pub period_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_segment_capacity")]
    pub segment_capacity: u64,

    #[serde(default = "default_tree_capacity")]
    pub tree_capacity: u64,

    #[serde(default = "default_exemplar_capacity")]
    pub exemplar_capacity: u64,

    /// Evict entries idle for this many seconds (unset = size-bound only)
    #[serde(default)]
    pub time_to_idle_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SegmentSettings {
    /// Finest bucket width in seconds
    #[serde(default = "default_resolution_secs")]
    pub resolution_secs: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: u32,

    #[serde(default = "default_levels")]
    pub levels: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiskConfig {
    /// Watch free space on the data volume
    #[serde(default = "default_disk_enabled")]
    pub enabled: bool,

    /// Reject writes below this many free bytes
    #[serde(default = "default_min_available_bytes")]
    pub min_available_bytes: u64,

    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

fn default_data_path() -> PathBuf {
    PathBuf::from("./data")
}

fn default_segment_capacity() -> u64 {
    100_000
}

fn default_tree_capacity() -> u64 {
    1_000_000
}

fn default_exemplar_capacity() -> u64 {
    100_000
}

fn default_resolution_secs() -> u64 {
    10
}

fn default_multiplier() -> u32 {
    10
}

fn default_levels() -> u32 {
    6
}

fn default_disk_enabled() -> bool {
    true
}

fn default_min_available_bytes() -> u64 {
    1024 * 1024 * 1024 // 1 GiB
}

fn default_refresh_interval_secs() -> u64 {
    30
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            retention: RetentionConfig::default(),
            cache: CacheConfig::default(),
            segment: SegmentSettings::default(),
            disk: DiskConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            segment_capacity: default_segment_capacity(),
            tree_capacity: default_tree_capacity(),
            exemplar_capacity: default_exemplar_capacity(),
            time_to_idle_secs: None,
        }
    }
}

impl Default for SegmentSettings {
    fn default() -> Self {
        Self {
            resolution_secs: default_resolution_secs(),
            multiplier: default_multiplier(),
            levels: default_levels(),
        }
    }
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            enabled: default_disk_enabled(),
            min_available_bytes: default_min_available_bytes(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

impl StorageConfig {
    /// Load and validate configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: StorageConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.disk.enabled && self.disk.refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "disk.refresh_interval_secs must be positive".to_string(),
            ));
        }
        self.segment_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn segment_config(&self) -> SegmentConfig {
        SegmentConfig {
            resolution: Duration::from_secs(self.segment.resolution_secs),
            multiplier: self.segment.multiplier,
            levels: self.segment.levels,
        }
    }

    pub fn retention_period(&self) -> Option<Duration> {
        self.retention.period_secs.map(Duration::from_secs)
    }

    pub fn time_to_idle(&self) -> Option<Duration> {
        self.cache.time_to_idle_secs.map(Duration::from_secs)
    }
}
