// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Two outputs sharing one pool of planes.

use liftoff_core::plane::PlaneKind;

use super::{commit, device, layer};
use crate::{CRTC_ID, MockKms};

#[test]
fn second_output_leaves_the_first_ones_plane_alone() {
    let mut kms = MockKms::new();
    let crtc_b = kms.create_crtc();
    let primary_a = kms.create_plane(PlaneKind::Primary);
    let primary_b = kms.create_plane(PlaneKind::Primary);
    let overlay = kms.create_plane(PlaneKind::Overlay);
    kms.set_possible_crtcs(primary_a, 0b01);
    kms.set_possible_crtcs(primary_b, 0b10);
    let mut device = device(kms);
    let a = device.create_output(CRTC_ID).unwrap();
    let b = device.create_output(crtc_b).unwrap();

    let on_a = layer(&mut device, a, 0, 0, 1920, 1080);
    device.kms_mut().add_compatible_layer(overlay, on_a);
    commit(&mut device, a);
    assert_eq!(device.layer(on_a).plane(), Some(overlay));

    // The B layer would fit every plane, but the overlay is taken and the
    // A primary cannot drive B.
    let on_b = layer(&mut device, b, 0, 0, 1920, 1080);
    for plane in [primary_a, primary_b, overlay] {
        device.kms_mut().add_compatible_layer(plane, on_b);
    }
    commit(&mut device, b);
    assert_eq!(device.layer(on_b).plane(), Some(primary_b));
    assert_eq!(device.kms().plane_layer(primary_b), Some(on_b));
    assert_eq!(device.kms().plane_layer(primary_a), None);

    // A keeps scanning out through the overlay.
    assert_eq!(device.layer(on_a).plane(), Some(overlay));
    assert_eq!(device.kms().plane_layer(overlay), Some(on_a));
    assert_eq!(
        device.kms().plane_property(overlay, "CRTC_ID"),
        Some(u64::from(CRTC_ID))
    );
    assert!(!device.output_needs_composition(a));
    assert!(!device.output_needs_composition(b));
}

#[test]
fn planes_reject_crtcs_outside_their_mask() {
    let mut kms = MockKms::new();
    let crtc_b = kms.create_crtc();
    let primary_a = kms.create_plane(PlaneKind::Primary);
    kms.set_possible_crtcs(primary_a, 0b01);
    let mut device = device(kms);
    let b = device.create_output(crtc_b).unwrap();
    let id = layer(&mut device, b, 0, 0, 1920, 1080);
    device.kms_mut().add_compatible_layer(primary_a, id);

    commit(&mut device, b);
    assert_eq!(device.layer(id).plane(), None);
    assert!(device.layer(id).needs_composition());
}
