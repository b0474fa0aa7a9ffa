// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The search stops trying new pairings once its time budget is spent.
//!
//! The mock clock only moves on commits, so the budget is counted in test
//! commits here.

use liftoff_core::config::{AllocatorConfig, ApplyOptions};
use liftoff_core::plane::PlaneKind;

use super::{layer, output, traced_device};
use crate::{MockKms, apply_and_commit};

struct Setup {
    kms: MockKms,
    primary: u32,
    overlay: u32,
}

fn setup(commit_cost: u64) -> Setup {
    let mut kms = MockKms::new();
    let primary = kms.create_plane(PlaneKind::Primary);
    let overlay = kms.create_plane(PlaneKind::Overlay);
    kms.set_commit_cost(commit_cost);
    Setup {
        kms,
        primary,
        overlay,
    }
}

#[test]
fn budget_cuts_the_search_short() {
    let Setup {
        kms,
        primary,
        overlay,
    } = setup(600_000);
    let mut device = traced_device(kms);
    let output = output(&mut device);
    let full = layer(&mut device, output, 0, 0, 1920, 1080);
    let small = layer(&mut device, output, 0, 0, 100, 100);
    device.kms_mut().add_compatible_layer(primary, full);
    device.kms_mut().add_compatible_layer(overlay, small);

    // Two test commits fit in the default 1 ms budget; the first complete
    // allocation is kept.
    apply_and_commit(&mut device, output, &ApplyOptions::default()).unwrap();
    assert_eq!(device.layer(full).plane(), Some(primary));
    assert_eq!(device.layer(small).plane(), Some(overlay));
    assert_eq!(device.test_commit_count(), 2);
    assert_eq!(device.sink().deadlines.len(), 1);
    assert_eq!(device.sink().deadlines[0].plane_id, primary);
}

#[test]
fn zero_budget_falls_back_to_the_default() {
    let Setup {
        kms,
        primary,
        overlay,
    } = setup(600_000);
    let mut device = traced_device(kms);
    let output = output(&mut device);
    let full = layer(&mut device, output, 0, 0, 1920, 1080);
    let small = layer(&mut device, output, 0, 0, 100, 100);
    device.kms_mut().add_compatible_layer(primary, full);
    device.kms_mut().add_compatible_layer(overlay, small);

    // Same outcome as the 1 ms default: two test commits, both layers placed.
    apply_and_commit(&mut device, output, &ApplyOptions::with_timeout_ns(0)).unwrap();
    assert_eq!(device.test_commit_count(), 2);
    assert_eq!(device.layer(full).plane(), Some(primary));
    assert_eq!(device.layer(small).plane(), Some(overlay));
    assert!(!device.output_needs_composition(output));
}

#[test]
fn device_default_budget_is_configurable() {
    let Setup {
        kms,
        primary,
        overlay,
    } = setup(600_000);
    let config = AllocatorConfig::DEFAULT.with_default_timeout_ns(500_000);
    let mut device = traced_device(kms).with_config(config);
    let output = output(&mut device);
    let full = layer(&mut device, output, 0, 0, 1920, 1080);
    let small = layer(&mut device, output, 0, 0, 100, 100);
    device.kms_mut().add_compatible_layer(primary, full);
    device.kms_mut().add_compatible_layer(overlay, small);

    // The first test commit already spends the budget.
    apply_and_commit(&mut device, output, &ApplyOptions::default()).unwrap();
    assert_eq!(device.test_commit_count(), 1);
    assert_eq!(device.layer(full).plane(), Some(primary));
    assert_eq!(device.layer(small).plane(), None);
    assert_eq!(device.sink().deadlines[0].plane_id, overlay);
}
