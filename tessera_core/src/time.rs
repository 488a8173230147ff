// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame timestamps and intervals.
//!
//! Tile priorities depend on how far the visible rect moved since the last
//! frame, so every tree carries the begin-frame time as a [`HostTime`]: raw
//! monotonic ticks from whatever clock drives the compositor. [`Timebase`]
//! converts those ticks to nanoseconds (`nanos = ticks * numer / denom`), and
//! [`Duration`] is a span in the same tick units.
//!
//! Conversions go through `u128` so that large tick counts cannot overflow.

use core::fmt;
use core::ops::{Add, Sub};

/// A begin-frame timestamp in monotonic host ticks.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HostTime(pub u64);

impl HostTime {
    /// Raw tick value.
    #[inline]
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Converts to nanoseconds using `timebase`.
    #[inline]
    #[must_use]
    pub const fn to_nanos(self, timebase: Timebase) -> u64 {
        timebase.ticks_to_nanos(self.0)
    }

    /// Builds a timestamp from nanoseconds using `timebase`.
    #[inline]
    #[must_use]
    pub const fn from_nanos(nanos: u64, timebase: Timebase) -> Self {
        Self(timebase.nanos_to_ticks(nanos))
    }

    /// Time elapsed since `earlier`, or zero if `earlier` is later.
    #[inline]
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for HostTime {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for HostTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Self) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl fmt::Debug for HostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostTime({})", self.0)
    }
}

/// Rational conversion factor from ticks to nanoseconds.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timebase {
    /// Numerator of the ticks-to-nanoseconds ratio.
    pub numer: u32,
    /// Denominator of the ticks-to-nanoseconds ratio.
    pub denom: u32,
}

impl Timebase {
    /// Ticks are nanoseconds.
    pub const NANOS: Self = Self { numer: 1, denom: 1 };

    /// Creates a timebase.
    ///
    /// # Panics
    ///
    /// Panics if either term is zero.
    #[inline]
    #[must_use]
    pub const fn new(numer: u32, denom: u32) -> Self {
        assert!(
            numer != 0 && denom != 0,
            "timebase terms must not be zero"
        );
        Self { numer, denom }
    }

    /// Converts ticks to nanoseconds.
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "u128 intermediate avoids overflow; result fits the u64 tick range"
    )]
    pub const fn ticks_to_nanos(self, ticks: u64) -> u64 {
        (ticks as u128 * self.numer as u128 / self.denom as u128) as u64
    }

    /// Converts nanoseconds to ticks.
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "u128 intermediate avoids overflow; result fits the u64 tick range"
    )]
    pub const fn nanos_to_ticks(self, nanos: u64) -> u64 {
        (nanos as u128 * self.denom as u128 / self.numer as u128) as u64
    }
}

impl Default for Timebase {
    fn default() -> Self {
        Self::NANOS
    }
}

impl fmt::Debug for Timebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timebase({}/{})", self.numer, self.denom)
    }
}

/// A span of time in host ticks.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(pub u64);

impl Duration {
    /// Zero-length span.
    pub const ZERO: Self = Self(0);

    /// Raw tick count.
    #[inline]
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Builds a span from nanoseconds using `timebase`.
    #[inline]
    #[must_use]
    pub const fn from_nanos(nanos: u64, timebase: Timebase) -> Self {
        Self(timebase.nanos_to_ticks(nanos))
    }

    /// Length of the span in seconds.
    #[inline]
    #[must_use]
    pub const fn as_secs_f64(self, timebase: Timebase) -> f64 {
        timebase.ticks_to_nanos(self.0) as f64 / 1e9
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duration({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nanos_timebase_is_identity() {
        let t = HostTime(16_666_667);
        assert_eq!(t.to_nanos(Timebase::NANOS), 16_666_667);
        assert_eq!(HostTime::from_nanos(500, Timebase::NANOS), HostTime(500));
    }

    #[test]
    fn mach_style_timebase_scales() {
        // 125/3: one tick is 41.67 ns.
        let tb = Timebase::new(125, 3);
        assert_eq!(HostTime(3).to_nanos(tb), 125);
        assert_eq!(HostTime::from_nanos(125, tb), HostTime(3));
    }

    #[test]
    fn large_tick_counts_do_not_overflow() {
        let tb = Timebase::new(1_000, 1);
        let ticks = u64::MAX / 1_000;
        assert_eq!(HostTime(ticks).to_nanos(tb), ticks * 1_000);
    }

    #[test]
    fn frame_interval_in_seconds() {
        let start = HostTime::from_nanos(1_000_000_000, Timebase::NANOS);
        let next = start + Duration::from_nanos(16_000_000, Timebase::NANOS);
        let dt = next - start;
        assert!((dt.as_secs_f64(Timebase::NANOS) - 0.016).abs() < 1e-12);
    }

    #[test]
    fn duration_since_saturates() {
        assert_eq!(
            HostTime(5).saturating_duration_since(HostTime(10)),
            Duration::ZERO
        );
        assert_eq!(HostTime(10).saturating_duration_since(HostTime(4)), Duration(6));
    }

    #[test]
    #[should_panic(expected = "timebase terms must not be zero")]
    fn zero_denominator_panics() {
        let _ = Timebase::new(1, 0);
    }
}
