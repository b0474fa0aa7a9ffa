// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic host time used by the allocation deadline.
//!
//! [`HostTime`] is a point on the kernel seam's monotonic clock, expressed in
//! that clock's native ticks. [`Timebase`] converts ticks to nanoseconds
//! (`nanoseconds = ticks * numer / denom`). Linux `CLOCK_MONOTONIC` readings
//! are already nanoseconds, so real backends report [`Timebase::NANOS`]; test
//! clocks may pick coarser ticks.
//!
//! Conversions go through `u128` intermediates to avoid overflow.

use core::fmt;

/// A point in time expressed as monotonic clock ticks.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HostTime(pub u64);

impl HostTime {
    /// Returns the raw tick value.
    #[inline]
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Returns the duration between `self` and an earlier time, or zero if
    /// `earlier` is after `self`.
    #[inline]
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Debug for HostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostTime({})", self.0)
    }
}

/// Rational conversion factor from clock ticks to nanoseconds.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timebase {
    /// Numerator of the ticks-to-nanoseconds ratio.
    pub numer: u32,
    /// Denominator of the ticks-to-nanoseconds ratio.
    pub denom: u32,
}

impl Timebase {
    /// A timebase where ticks are already nanoseconds (1:1).
    pub const NANOS: Self = Self { numer: 1, denom: 1 };

    /// Creates a new timebase with the given numerator and denominator.
    ///
    /// # Panics
    ///
    /// Panics if either part is zero.
    #[inline]
    #[must_use]
    pub const fn new(numer: u32, denom: u32) -> Self {
        assert!(
            numer != 0 && denom != 0,
            "timebase ratio parts must not be zero"
        );
        Self { numer, denom }
    }

    /// Converts a tick count to nanoseconds.
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "u128 intermediate avoids overflow; truncation back to u64 is intentional"
    )]
    pub const fn ticks_to_nanos(self, ticks: u64) -> u64 {
        let wide = ticks as u128 * self.numer as u128 / self.denom as u128;
        wide as u64
    }

    /// Converts nanoseconds to a tick count.
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "u128 intermediate avoids overflow; truncation back to u64 is intentional"
    )]
    pub const fn nanos_to_ticks(self, nanos: u64) -> u64 {
        let wide = nanos as u128 * self.denom as u128 / self.numer as u128;
        wide as u64
    }
}

impl fmt::Debug for Timebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timebase({}/{})", self.numer, self.denom)
    }
}

/// A duration in the same tick units as [`HostTime`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(pub u64);

impl Duration {
    /// A zero-length duration.
    pub const ZERO: Self = Self(0);

    /// Returns the raw tick value.
    #[inline]
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Creates a duration from a nanosecond value and timebase.
    #[inline]
    #[must_use]
    pub const fn from_nanos(nanos: u64, timebase: Timebase) -> Self {
        Self(timebase.nanos_to_ticks(nanos))
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
    fn microsecond_ticks_convert_both_ways() {
        let tb = Timebase::new(1000, 1);
        assert_eq!(tb.ticks_to_nanos(3), 3_000, "3µs in nanoseconds");
        assert_eq!(Duration::from_nanos(1_000_000, tb), Duration(1000));
        assert_eq!(tb.ticks_to_nanos(Duration(1000).ticks()), 1_000_000);
    }

    #[test]
    fn identity_timebase_is_passthrough() {
        let d = Duration::from_nanos(1_000_000, Timebase::NANOS);
        assert_eq!(d.ticks(), 1_000_000, "nanosecond clock keeps values");
    }

    #[test]
    fn elapsed_time_saturates() {
        assert_eq!(
            HostTime(100).saturating_duration_since(HostTime(400)),
            Duration::ZERO
        );
        assert_eq!(
            HostTime(400).saturating_duration_since(HostTime(100)),
            Duration(300)
        );
    }

    #[test]
    #[should_panic(expected = "timebase ratio parts must not be zero")]
    fn zero_denominator_is_rejected() {
        let _ = Timebase::new(1, 0);
    }
}
