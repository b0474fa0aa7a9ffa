// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Translating `drm` property descriptions into allocator terms.

use drm::control::property::{self, ValueType};
use liftoff_core::kms::{PropertyInfo, PropertyKind};

/// Maps a kernel property type onto the subset the allocator validates.
///
/// `drm` does not expose the bit list of bitmask properties, so those are
/// left to the kernel to check.
pub(crate) fn kind_of(value_type: &ValueType) -> PropertyKind {
    match value_type {
        ValueType::Boolean => PropertyKind::Range { min: 0, max: 1 },
        ValueType::UnsignedRange(min, max) => PropertyKind::Range {
            min: *min,
            max: *max,
        },
        ValueType::SignedRange(min, max) => PropertyKind::SignedRange {
            min: *min,
            max: *max,
        },
        ValueType::Enum(values) => PropertyKind::Enum(values.values().0.to_vec()),
        ValueType::Blob => PropertyKind::Blob,
        ValueType::Object
        | ValueType::CRTC
        | ValueType::Connector
        | ValueType::Encoder
        | ValueType::Framebuffer
        | ValueType::Plane
        | ValueType::Property => PropertyKind::Object,
        ValueType::Bitmask | ValueType::Unknown => PropertyKind::Other,
    }
}

/// Builds the allocator's view of a property.
pub(crate) fn info_of(handle: property::Handle, info: &property::Info) -> PropertyInfo {
    PropertyInfo {
        id: handle.into(),
        name: info.name().to_string_lossy().into_owned(),
        kind: kind_of(&info.value_type()),
        immutable: !info.mutable(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_keep_their_bounds() {
        assert_eq!(
            kind_of(&ValueType::UnsignedRange(0, 0xFFFF)),
            PropertyKind::Range { min: 0, max: 0xFFFF }
        );
        assert_eq!(
            kind_of(&ValueType::SignedRange(-1, i64::MAX)),
            PropertyKind::SignedRange {
                min: -1,
                max: i64::MAX
            }
        );
    }

    #[test]
    fn booleans_are_zero_or_one() {
        let kind = kind_of(&ValueType::Boolean);
        let info = PropertyInfo {
            id: 1,
            name: "ACTIVE".into(),
            kind,
            immutable: false,
        };
        assert!(info.accepts(0));
        assert!(info.accepts(1));
        assert!(!info.accepts(2));
    }

    #[test]
    fn object_references_are_objects() {
        for value_type in [
            ValueType::CRTC,
            ValueType::Framebuffer,
            ValueType::Object,
            ValueType::Plane,
        ] {
            assert_eq!(kind_of(&value_type), PropertyKind::Object);
        }
        assert_eq!(kind_of(&ValueType::Blob), PropertyKind::Blob);
    }

    #[test]
    fn bitmasks_are_not_validated_locally() {
        assert_eq!(kind_of(&ValueType::Bitmask), PropertyKind::Other);
        assert_eq!(kind_of(&ValueType::Unknown), PropertyKind::Other);
    }
}
