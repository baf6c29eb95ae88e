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

//! Disk health
//!
//! The write path only needs a cheap boolean. `DiskPressureMonitor` computes
//! it from `sysinfo` and caches the verdict; a background thread can keep it
//! fresh.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use sysinfo::Disks;

/// Reports whether the data volume is out of space.
pub trait HealthCheck: Send + Sync {
    fn is_out_of_disk_space(&self) -> bool;
}

impl<F> HealthCheck for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_out_of_disk_space(&self) -> bool {
        self()
    }
}

/// Never reports disk pressure.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysHealthy;

impl HealthCheck for AlwaysHealthy {
    fn is_out_of_disk_space(&self) -> bool {
        false
    }
}

/// Tracks free space on the volume holding `path`.
#[derive(Debug)]
pub struct DiskPressureMonitor {
    path: PathBuf,
    min_available_bytes: u64,
    out_of_space: AtomicBool,
}

impl DiskPressureMonitor {
    /// Create a monitor and take a first measurement.
    pub fn new(path: impl Into<PathBuf>, min_available_bytes: u64) -> Self {
        let monitor = Self {
            path: path.into(),
            min_available_bytes,
            out_of_space: AtomicBool::new(false),
        };
        monitor.refresh();
        monitor
    }

    /// Re-measure free space. Returns the new verdict.
    ///
    /// A path that maps to no known volume is treated as healthy.
    pub fn refresh(&self) -> bool {
        let available = available_space(&self.path);
        let out_of_space = matches!(available, Some(bytes) if bytes < self.min_available_bytes);

        let previous = self.out_of_space.swap(out_of_space, Ordering::Relaxed);
        if previous != out_of_space {
            if out_of_space {
                tracing::warn!(
                    path = %self.path.display(),
                    available_bytes = available.unwrap_or_default(),
                    min_available_bytes = self.min_available_bytes,
                    "Disk pressure detected, rejecting writes"
                );
            } else {
                tracing::info!(path = %self.path.display(), "Disk pressure cleared");
            }
        }
        out_of_space
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start a thread that calls `refresh` every `interval`.
    pub fn spawn_refresher(self: &Arc<Self>, interval: Duration) -> RefresherHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let monitor = Arc::clone(self);
        let flag = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name("cinder-disk-monitor".to_string())
            .spawn(move || {
                while !flag.load(Ordering::Acquire) {
                    thread::park_timeout(interval);
                    if flag.load(Ordering::Acquire) {
                        break;
                    }
                    monitor.refresh();
                }
            });

        match thread {
            Ok(thread) => RefresherHandle {
                stop,
                thread: Some(thread),
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to spawn disk monitor thread");
                RefresherHandle { stop, thread: None }
            }
        }
    }
}

impl HealthCheck for DiskPressureMonitor {
    fn is_out_of_disk_space(&self) -> bool {
        self.out_of_space.load(Ordering::Relaxed)
    }
}

/// Stops the refresher thread when dropped.
#[derive(Debug)]
pub struct RefresherHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl RefresherHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            let _ = thread.join();
        }
    }
}

impl Drop for RefresherHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Free bytes on the disk with the longest mount point that prefixes `path`.
fn available_space(path: &Path) -> Option<u64> {
    let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
}
