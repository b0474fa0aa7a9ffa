// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! How layer properties are matched against plane properties.

use alloc::vec;

use liftoff_core::format::{ARGB8888, MOD_LINEAR};
use liftoff_core::kms::{FbInfo, PropertyKind};
use liftoff_core::plane::{PlaneKind, ROTATE_0};

use super::{commit, device, layer, output};
use crate::MockKms;

const ROTATE_90: u64 = 1 << 1;
const ROTATE_180: u64 = 1 << 2;
const REFLECT_X: u64 = 1 << 4;
const I915_X_TILED: u64 = 0x0100_0000_0000_0001;

/// A plane lacking `name` takes the layer only while the layer holds the
/// value that is equivalent to the property being absent.
fn check_default_value(name: &str, required: u64, default: u64) {
    let mut kms = MockKms::new();
    let without = kms.create_plane(PlaneKind::Overlay);
    let with = kms.create_plane(PlaneKind::Overlay);
    kms.add_property(with, name, PropertyKind::Other, 0);

    let mut device = device(kms);
    let output = output(&mut device);
    let id = layer(&mut device, output, 0, 0, 1920, 1080);
    device.kms_mut().add_compatible_layer(without, id);

    device.layer_mut(id).set_property(name, required).unwrap();
    commit(&mut device, output);
    assert_eq!(device.layer(id).plane(), None);

    device.layer_mut(id).set_property(name, default).unwrap();
    commit(&mut device, output);
    assert_eq!(device.layer(id).plane(), Some(without));

    device.kms_mut().add_compatible_layer(with, id);
    device.layer_mut(id).set_property(name, required).unwrap();
    commit(&mut device, output);
    assert_eq!(device.layer(id).plane(), Some(with));
}

#[test]
fn default_alpha() {
    check_default_value("alpha", 0x7FFF, 0xFFFF);
}

#[test]
fn default_rotation() {
    check_default_value("rotation", ROTATE_180, ROTATE_0);
}

#[test]
fn ignore_alpha() {
    let mut kms = MockKms::new();
    let primary = kms.create_plane(PlaneKind::Primary);
    kms.add_property(primary, "alpha", PropertyKind::Other, 0);

    let mut device = device(kms);
    let output = output(&mut device);
    let id = layer(&mut device, output, 0, 0, 1920, 1080);
    device.layer_mut(id).set_property("alpha", 0).unwrap();
    device.kms_mut().add_compatible_layer(primary, id);

    commit(&mut device, output);
    assert_eq!(device.kms().plane_layer(primary), None);
    assert!(!device.layer(id).needs_composition());
}

#[test]
fn immutable_zpos() {
    let mut kms = MockKms::new();
    let bottom = kms.create_plane(PlaneKind::Overlay);
    let top = kms.create_plane(PlaneKind::Overlay);
    kms.add_immutable_property(bottom, "zpos", 1);
    kms.add_immutable_property(top, "zpos", 2);

    let mut device = device(kms);
    let output = output(&mut device);
    let first = layer(&mut device, output, 0, 0, 256, 256);
    let second = layer(&mut device, output, 128, 128, 256, 256);
    for plane in [bottom, top] {
        for id in [first, second] {
            device.kms_mut().add_compatible_layer(plane, id);
        }
    }

    device.layer_mut(first).set_property("zpos", 42).unwrap();
    device.layer_mut(second).set_property("zpos", 43).unwrap();
    commit(&mut device, output);
    assert_eq!(device.kms().plane_layer(bottom), Some(first));
    assert_eq!(device.kms().plane_layer(top), Some(second));

    device.layer_mut(first).set_property("zpos", 43).unwrap();
    device.layer_mut(second).set_property("zpos", 42).unwrap();
    commit(&mut device, output);
    assert_eq!(device.kms().plane_layer(bottom), Some(second));
    assert_eq!(device.kms().plane_layer(top), Some(first));
    assert_eq!(
        device.kms().plane_property(top, "zpos"),
        Some(2),
        "zpos is never written"
    );
}

#[test]
fn unmatched() {
    let mut kms = MockKms::new();
    let primary = kms.create_plane(PlaneKind::Primary);
    let mut device = device(kms);
    let output = output(&mut device);
    let id = layer(&mut device, output, 0, 0, 1920, 1080);
    device.layer_mut(id).set_property("asdf", 0).unwrap();
    device.kms_mut().add_compatible_layer(primary, id);

    commit(&mut device, output);
    assert_eq!(device.kms().plane_layer(primary), None);
    assert!(device.layer(id).needs_composition());
}

#[test]
fn unset() {
    let mut kms = MockKms::new();
    let primary = kms.create_plane(PlaneKind::Primary);
    let mut device = device(kms);
    let output = output(&mut device);
    let id = layer(&mut device, output, 0, 0, 1920, 1080);
    device.layer_mut(id).set_property("asdf", 0).unwrap();
    device.layer_mut(id).set_property("alpha", 0xFFFF).unwrap();
    device.kms_mut().add_compatible_layer(primary, id);

    commit(&mut device, output);
    assert_eq!(device.kms().plane_layer(primary), None);

    device.layer_mut(id).unset_property("asdf");
    assert_eq!(device.layer(id).property("asdf"), None);
    commit(&mut device, output);
    assert_eq!(device.kms().plane_layer(primary), Some(id));
}

#[test]
fn fb_damage_clips_is_optional() {
    let mut kms = MockKms::new();
    let primary = kms.create_plane(PlaneKind::Primary);
    let mut device = device(kms);
    let output = output(&mut device);
    let id = layer(&mut device, output, 0, 0, 1920, 1080);
    device.layer_mut(id).set_property("FB_DAMAGE_CLIPS", 0).unwrap();
    device.kms_mut().add_compatible_layer(primary, id);

    commit(&mut device, output);
    assert_eq!(device.kms().plane_layer(primary), Some(id));
}

#[test]
fn crtc_id_is_reserved() {
    let mut kms = MockKms::new();
    kms.create_plane(PlaneKind::Primary);
    let mut device = device(kms);
    let output = output(&mut device);
    let id = device.create_layer(output);
    assert!(device.layer_mut(id).set_property("CRTC_ID", 1).is_err());
    assert_eq!(device.layer(id).property("CRTC_ID"), None);
}

#[test]
fn in_formats() {
    let mut kms = MockKms::new();
    let primary = kms.create_plane(PlaneKind::Primary);
    kms.add_in_formats(primary, &[(ARGB8888, MOD_LINEAR)]);

    let mut device = device(kms);
    assert!(
        device
            .plane(primary)
            .and_then(|p| p.in_formats())
            .is_some_and(|t| t.supports(ARGB8888, MOD_LINEAR))
    );
    let output = output(&mut device);
    let id = layer(&mut device, output, 0, 0, 1920, 1080);
    let fb = FbInfo {
        fb_id: device.kms_mut().create_fb(id),
        width: 1920,
        height: 1080,
        pixel_format: ARGB8888,
        modifier: I915_X_TILED,
        has_modifiers: true,
    };
    device.kms_mut().set_fb_info(fb);
    device
        .layer_mut(id)
        .set_property("FB_ID", u64::from(fb.fb_id))
        .unwrap();
    device.kms_mut().add_compatible_layer(primary, id);

    // The kernel would take it, but the modifier is not advertised.
    commit(&mut device, output);
    assert_eq!(device.kms().plane_layer(primary), None);
    assert!(
        device.layer(id).is_candidate_plane(primary),
        "the properties fit, only the buffer does not"
    );

    let linear = FbInfo {
        fb_id: device.kms_mut().create_fb(id),
        modifier: MOD_LINEAR,
        ..fb
    };
    device.kms_mut().set_fb_info(linear);
    device
        .layer_mut(id)
        .set_property("FB_ID", u64::from(linear.fb_id))
        .unwrap();
    commit(&mut device, output);
    assert_eq!(device.kms().plane_layer(primary), Some(id));
}

/// The allocator validates values against the declared type before any
/// test commit.
fn check_type(name: &str, kind: PropertyKind, valid: u64, invalid: u64) {
    let mut kms = MockKms::new();
    let primary = kms.create_plane(PlaneKind::Primary);
    kms.add_property(primary, name, kind, 0);

    let mut device = device(kms);
    let output = output(&mut device);
    let id = layer(&mut device, output, 0, 0, 1920, 1080);
    device.kms_mut().add_compatible_layer(primary, id);

    device.layer_mut(id).set_property(name, valid).unwrap();
    commit(&mut device, output);
    assert_eq!(device.kms().plane_layer(primary), Some(id));

    device.layer_mut(id).set_property(name, invalid).unwrap();
    commit(&mut device, output);
    assert_eq!(device.kms().plane_layer(primary), None);
    assert!(device.layer(id).needs_composition());
}

#[test]
fn range() {
    check_type(
        "alpha",
        PropertyKind::Range { min: 0, max: 0xFFFF },
        42,
        0xFFFF + 42,
    );
}

#[test]
fn signed_range() {
    check_type(
        "IN_FENCE_FD",
        PropertyKind::SignedRange {
            min: -1,
            max: i64::MAX,
        },
        (-1_i64).cast_unsigned(),
        (-2_i64).cast_unsigned(),
    );
}

#[test]
fn bitmask() {
    check_type(
        "rotation",
        PropertyKind::Bitmask(vec![0, 1, 2]),
        ROTATE_90,
        REFLECT_X,
    );
}

#[test]
fn enumeration() {
    check_type("COLOR_RANGE", PropertyKind::Enum(vec![0, 1]), 1, 2);
}
