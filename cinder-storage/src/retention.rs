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

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Source of the oldest start time still accepted.
pub trait RetentionPolicy: Send + Sync {
    fn lower_time_boundary(&self) -> DateTime<Utc>;
}

impl<F> RetentionPolicy for F
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    fn lower_time_boundary(&self) -> DateTime<Utc> {
        self()
    }
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Sliding window: samples older than `now - period` are rejected.
#[derive(Clone)]
pub struct RetentionWindow {
    period: Option<chrono::Duration>,
    clock: Clock,
}

impl RetentionWindow {
    /// `None` or a zero period keeps everything.
    pub fn new(period: Option<Duration>) -> Self {
        let period = period
            .filter(|p| !p.is_zero())
            .and_then(|p| chrono::Duration::from_std(p).ok());
        Self {
            period,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Replace the wall clock, mainly for tests.
    pub fn with_clock<C>(mut self, clock: C) -> Self
    where
        C: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }
}

impl RetentionPolicy for RetentionWindow {
    fn lower_time_boundary(&self) -> DateTime<Utc> {
        match self.period {
            Some(period) => (self.clock)()
                .checked_sub_signed(period)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            None => DateTime::<Utc>::MIN_UTC,
        }
    }
}

impl fmt::Debug for RetentionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetentionWindow")
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}
