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

//! Scoped-access wrapper for shared, mutable cache entries.
//!
//! Cache values (trees, segments, dimensions) are shared across writer threads
//! and mutated in place. `LockedCell` only hands out references inside a
//! closure, so no caller can hold a reference after the lock is released.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// A value guarded by its own reader/writer lock.
pub struct LockedCell<T> {
    inner: RwLock<T>,
}

impl<T> LockedCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(value),
        }
    }

    /// Convenience constructor for the common `Arc<LockedCell<T>>` handle.
    pub fn shared(value: T) -> Arc<Self> {
        Arc::new(Self::new(value))
    }

    /// Run `f` under the shared (read) lock.
    #[inline]
    pub fn with_read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.inner.read();
        f(&guard)
    }

    /// Run `f` under the exclusive (write) lock.
    #[inline]
    pub fn with_write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.write();
        f(&mut guard)
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: Clone> LockedCell<T> {
    /// Copy of the current value, taken under the read lock.
    pub fn snapshot(&self) -> T {
        self.with_read(T::clone)
    }
}

impl<T: Default> Default for LockedCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for LockedCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_read() {
            Some(guard) => f.debug_struct("LockedCell").field("value", &*guard).finish(),
            None => f.debug_struct("LockedCell").field("value", &"<locked>").finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_scoped_access() {
        let cell = LockedCell::new(1u64);
        cell.with_write(|v| *v += 41);
        assert_eq!(cell.with_read(|v| *v), 42);
        assert_eq!(cell.into_inner(), 42);
    }

    #[test]
    fn test_concurrent_writers() {
        let cell = LockedCell::shared(0u64);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cell = Arc::clone(&cell);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        cell.with_write(|v| *v += 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cell.snapshot(), 4000);
    }
}
