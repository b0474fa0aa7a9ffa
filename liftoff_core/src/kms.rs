// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The kernel seam.
//!
//! [`Kms`] is the only way the allocator talks to a display driver: it
//! enumerates CRTCs and planes, resolves framebuffer metadata and blobs, and
//! issues atomic commits built from a [`Request`]. `liftoff_drm` implements it
//! on top of a DRM device node; `liftoff_harness` provides an in-memory mock.

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::Errno;
use crate::request::Request;
use crate::time::{HostTime, Timebase};

bitflags::bitflags! {
    /// Atomic commit flags, using the kernel's `DRM_MODE_*` bit values.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct CommitFlags: u32 {
        /// Request a page-flip completion event.
        const PAGE_FLIP_EVENT = 0x0001;
        /// Flip without waiting for vblank.
        const PAGE_FLIP_ASYNC = 0x0002;
        /// Validate the request without applying it.
        const TEST_ONLY = 0x0100;
        /// Do not block until the commit is applied.
        const NONBLOCK = 0x0200;
        /// Allow full modesets.
        const ALLOW_MODESET = 0x0400;
    }
}

/// Declared type of a KMS property, as far as local validation cares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyKind {
    /// Unsigned inclusive range.
    Range {
        /// Smallest accepted value.
        min: u64,
        /// Largest accepted value.
        max: u64,
    },
    /// Signed inclusive range (values are reinterpreted as `i64`).
    SignedRange {
        /// Smallest accepted value.
        min: i64,
        /// Largest accepted value.
        max: i64,
    },
    /// One of a fixed list of values.
    Enum(Vec<u64>),
    /// Any combination of the listed bit positions.
    Bitmask(Vec<u64>),
    /// Blob id.
    Blob,
    /// Object id.
    Object,
    /// Anything the allocator does not validate locally.
    Other,
}

/// Describes one property exposed by a KMS object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyInfo {
    /// Property id.
    pub id: u32,
    /// Property name, e.g. `"FB_ID"` or `"zpos"`.
    pub name: String,
    /// Declared value type.
    pub kind: PropertyKind,
    /// The kernel refuses writes to this property.
    pub immutable: bool,
}

impl PropertyInfo {
    /// Whether `value` fits the declared type.
    #[must_use]
    pub fn accepts(&self, value: u64) -> bool {
        if self.immutable {
            return false;
        }
        match &self.kind {
            PropertyKind::Range { min, max } => (*min..=*max).contains(&value),
            PropertyKind::SignedRange { min, max } => {
                (*min..=*max).contains(&value.cast_signed())
            }
            PropertyKind::Enum(values) => values.contains(&value),
            PropertyKind::Bitmask(bits) => {
                let mask = bits
                    .iter()
                    .filter(|bit| **bit < 64)
                    .fold(0_u64, |mask, bit| mask | (1 << bit));
                value & !mask == 0
            }
            PropertyKind::Blob | PropertyKind::Object | PropertyKind::Other => true,
        }
    }
}

/// A plane as reported by the kernel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaneInfo {
    /// Plane object id.
    pub id: u32,
    /// Bit `i` is set if the plane can be used with the `i`-th CRTC.
    pub possible_crtcs: u32,
    /// Every property with its current value.
    pub properties: Vec<(PropertyInfo, u64)>,
}

/// Framebuffer metadata resolved from an `FB_ID`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct FbInfo {
    /// Framebuffer object id.
    pub fb_id: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// DRM fourcc pixel format.
    pub pixel_format: u32,
    /// Format modifier, meaningful only when `has_modifiers` is set.
    pub modifier: u64,
    /// The framebuffer was created with explicit modifiers.
    pub has_modifiers: bool,
}

impl FbInfo {
    /// Whether scanning out `other` instead of `self` can change which planes
    /// are able to display the buffer.
    #[must_use]
    pub fn layout_differs(&self, other: &Self) -> bool {
        self.width != other.width
            || self.height != other.height
            || self.pixel_format != other.pixel_format
            || self.modifier != other.modifier
    }
}

/// Access to a display driver's atomic modesetting interface.
pub trait Kms {
    /// CRTC object ids, in kernel order (index `i` is bit `i` of
    /// [`PlaneInfo::possible_crtcs`]).
    fn crtcs(&self) -> Result<Vec<u32>, Errno>;

    /// Plane object ids, in discovery order.
    fn plane_ids(&self) -> Result<Vec<u32>, Errno>;

    /// Capabilities and properties of one plane.
    fn plane(&self, plane_id: u32) -> Result<PlaneInfo, Errno>;

    /// Contents of a property blob.
    fn property_blob(&self, blob_id: u64) -> Result<Vec<u8>, Errno>;

    /// Metadata of a framebuffer, or `None` when the kernel cannot describe
    /// it.
    fn framebuffer(&self, fb_id: u32) -> Result<Option<FbInfo>, Errno>;

    /// Issues an atomic commit.
    fn commit(&mut self, request: &Request, flags: CommitFlags) -> Result<(), Errno>;

    /// Current monotonic time.
    fn now(&self) -> HostTime;

    /// Tick rate of [`now`](Self::now).
    fn timebase(&self) -> Timebase {
        Timebase::NANOS
    }
}
