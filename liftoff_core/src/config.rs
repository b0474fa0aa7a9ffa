// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Allocator tuning.

/// Device-wide allocator settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Search budget, in nanoseconds, for applies that do not pass their own.
    pub default_timeout_ns: u64,
    /// Number of applies between layer priority promotions.
    pub priority_period: u32,
}

impl AllocatorConfig {
    /// 1 ms search budget, priorities promoted every 60 frames.
    pub const DEFAULT: Self = Self {
        default_timeout_ns: 1_000_000,
        priority_period: 60,
    };

    /// Returns a copy with a different default search budget.
    #[must_use]
    pub const fn with_default_timeout_ns(mut self, timeout_ns: u64) -> Self {
        self.default_timeout_ns = timeout_ns;
        self
    }

    /// Returns a copy with a different priority period.
    ///
    /// # Panics
    ///
    /// Panics if `frames` is zero.
    #[must_use]
    pub const fn with_priority_period(mut self, frames: u32) -> Self {
        assert!(frames > 0, "priority period must be at least one frame");
        self.priority_period = frames;
        self
    }
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Per-call options for [`Device::apply`](crate::device::Device::apply).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Search budget in nanoseconds. `None` and `Some(0)` both use
    /// [`AllocatorConfig::default_timeout_ns`].
    pub timeout_ns: Option<u64>,
}

impl ApplyOptions {
    /// Options with an explicit search budget.
    #[must_use]
    pub const fn with_timeout_ns(timeout_ns: u64) -> Self {
        Self {
            timeout_ns: Some(timeout_ns),
        }
    }

    pub(crate) const fn resolve_timeout_ns(&self, config: &AllocatorConfig) -> u64 {
        match self.timeout_ns {
            Some(0) | None => config.default_timeout_ns,
            Some(ns) => ns,
        }
    }
}
