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

//! Exact time-overlap weights.
//!
//! A sample covering `[start, end)` contributes `overlap / (end - start)` of
//! its value to each bucket it touches. Ratios are kept as reduced fractions
//! so the weights of one resolution level sum to exactly one.

use std::fmt;

/// Reduced fraction `numer / denom` with `denom > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ratio {
    numer: u64,
    denom: u64,
}

impl Ratio {
    pub const ZERO: Ratio = Ratio { numer: 0, denom: 1 };
    pub const ONE: Ratio = Ratio { numer: 1, denom: 1 };

    /// Build a reduced ratio. Returns `None` for a zero denominator.
    pub fn new(numer: u64, denom: u64) -> Option<Self> {
        if denom == 0 {
            return None;
        }
        let g = gcd(numer as u128, denom as u128) as u64;
        Some(Self {
            numer: numer / g,
            denom: denom / g,
        })
    }

    pub fn numer(&self) -> u64 {
        self.numer
    }

    pub fn denom(&self) -> u64 {
        self.denom
    }

    pub fn is_one(&self) -> bool {
        self.numer == self.denom
    }

    pub fn is_zero(&self) -> bool {
        self.numer == 0
    }

    /// Exact sum. `None` if the reduced result does not fit in `u64`.
    pub fn checked_add(self, other: Ratio) -> Option<Ratio> {
        let numer = self.numer as u128 * other.denom as u128 + other.numer as u128 * self.denom as u128;
        let denom = self.denom as u128 * other.denom as u128;
        let g = gcd(numer, denom);
        Some(Ratio {
            numer: u64::try_from(numer / g).ok()?,
            denom: u64::try_from(denom / g).ok()?,
        })
    }

    /// `value * self`, rounded down. Saturates at `u64::MAX`.
    #[inline]
    pub fn scale(&self, value: u64) -> u64 {
        let scaled = value as u128 * self.numer as u128 / self.denom as u128;
        u64::try_from(scaled).unwrap_or(u64::MAX)
    }

    pub fn to_f64(&self) -> f64 {
        self.numer as f64 / self.denom as f64
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numer, self.denom)
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}
