// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! DRM/KMS backend for the liftoff plane allocator.
//!
//! [`DrmKms`] implements [`Kms`](liftoff_core::kms::Kms) on top of a DRM
//! device node using the atomic modesetting API:
//!
//! ```no_run
//! use liftoff_core::device::Device;
//! use liftoff_drm::DrmKms;
//!
//! let kms = DrmKms::open("/dev/dri/card0")?;
//! let mut device = Device::new(kms)?;
//! device.register_all_planes()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Kernel failures reach the allocator as
//! [`Errno`](liftoff_core::error::Errno) values; only opening the device can
//! fail with a [`DrmError`]. Search deadlines are measured on
//! `CLOCK_MONOTONIC` (see [`time`]).

mod device;
mod error;
mod property;
pub mod time;

pub use device::{Card, DrmKms};
pub use error::DrmError;
