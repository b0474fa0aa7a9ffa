// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Kernel error codes and the crate error type.

use core::fmt;

/// A positive Linux `errno` value reported through the [`Kms`](crate::kms::Kms)
/// seam.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Errno(pub i32);

impl Errno {
    /// No such file or directory.
    pub const ENOENT: Self = Self(2);
    /// Interrupted system call.
    pub const EINTR: Self = Self(4);
    /// Resource temporarily unavailable.
    pub const EAGAIN: Self = Self(11);
    /// Out of memory.
    pub const ENOMEM: Self = Self(12);
    /// Device or resource busy.
    pub const EBUSY: Self = Self(16);
    /// File exists.
    pub const EEXIST: Self = Self(17);
    /// Invalid argument.
    pub const EINVAL: Self = Self(22);
    /// No space left on device.
    pub const ENOSPC: Self = Self(28);
    /// Numerical result out of range.
    pub const ERANGE: Self = Self(34);

    /// Returns the raw error number.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Whether a test commit failing with this code only means "this
    /// combination of planes and layers is not supported".
    #[inline]
    #[must_use]
    pub const fn is_incompatibility(self) -> bool {
        self.0 == Self::EINVAL.0 || self.0 == Self::ERANGE.0 || self.0 == Self::ENOSPC.0
    }

    /// Whether the call was interrupted and may simply be issued again.
    #[inline]
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 == Self::EINTR.0 || self.0 == Self::EAGAIN.0
    }

    const fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            2 => "ENOENT",
            4 => "EINTR",
            11 => "EAGAIN",
            12 => "ENOMEM",
            16 => "EBUSY",
            17 => "EEXIST",
            22 => "EINVAL",
            28 => "ENOSPC",
            34 => "ERANGE",
            _ => return None,
        })
    }
}

impl fmt::Debug for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "Errno({name})"),
            None => write!(f, "Errno({})", self.0),
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({})", self.0),
            None => write!(f, "errno {}", self.0),
        }
    }
}

/// Errors reported by [`Device`](crate::device::Device) operations.
///
/// Plane/layer incompatibilities discovered during allocation are never
/// reported here; they only prune the search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The kernel failed in a way that is not a plain incompatibility.
    Kernel(Errno),
    /// The property is managed by the device and cannot be set on a layer.
    ReservedProperty(&'static str),
    /// The device has no CRTC with this object id.
    UnknownCrtc(u32),
    /// The plane was already registered.
    DuplicatePlane(u32),
    /// The plane does not expose a `type` property.
    MissingPlaneType(u32),
    /// The plane lacks a property that is required to drive it.
    MissingPlaneProperty {
        /// Plane object id.
        plane: u32,
        /// Name of the missing property.
        property: &'static str,
    },
    /// The layer belongs to a different output.
    ForeignLayer,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kernel(errno) => write!(f, "kernel request failed: {errno}"),
            Self::ReservedProperty(name) => {
                write!(f, "property {name:?} is managed by the device")
            }
            Self::UnknownCrtc(id) => write!(f, "no CRTC with object id {id}"),
            Self::DuplicatePlane(id) => write!(f, "plane {id} is already registered"),
            Self::MissingPlaneType(id) => write!(f, "plane {id} has no type property"),
            Self::MissingPlaneProperty { plane, property } => {
                write!(f, "plane {plane} has no {property:?} property")
            }
            Self::ForeignLayer => write!(f, "layer belongs to another output"),
        }
    }
}

impl core::error::Error for Error {}

impl From<Errno> for Error {
    fn from(errno: Errno) -> Self {
        Self::Kernel(errno)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn soft_and_transient_sets() {
        for soft in [Errno::EINVAL, Errno::ERANGE, Errno::ENOSPC] {
            assert!(soft.is_incompatibility(), "{soft:?} should be soft");
        }
        assert!(!Errno::EBUSY.is_incompatibility(), "EBUSY is a hard error");
        assert!(Errno::EINTR.is_transient(), "EINTR is retried");
        assert!(Errno::EAGAIN.is_transient(), "EAGAIN is retried");
        assert!(!Errno::EINVAL.is_transient(), "EINVAL is not retried");
    }

    #[test]
    fn errno_formatting() {
        assert_eq!(Errno::ENOSPC.to_string(), "ENOSPC (28)");
        assert_eq!(Errno(95).to_string(), "errno 95");
        assert_eq!(
            Error::from(Errno::EBUSY).to_string(),
            "kernel request failed: EBUSY (16)"
        );
    }
}
