// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Which frame-to-frame changes keep the previous allocation.
//!
//! A primary plane takes only `layer`; a cursor plane takes nothing. With
//! three layers the full search needs several test commits, so a reused
//! allocation is recognizable by its single one.

use liftoff_core::config::ApplyOptions;
use liftoff_core::device::Device;
use liftoff_core::error::Errno;
use liftoff_core::format::{ARGB8888, MOD_LINEAR};
use liftoff_core::kms::{CommitFlags, FbInfo, PropertyKind};
use liftoff_core::layer::LayerId;
use liftoff_core::output::OutputId;
use liftoff_core::plane::PlaneKind;
use liftoff_core::request::Request;
use liftoff_core::trace::{ReallocCause, ReuseBlocker, ReuseOutcome};

use super::{Events, commit, layer, output, traced_device};
use crate::MockKms;

const I915_X_TILED: u64 = 0x0100_0000_0000_0001;
const I915_Y_TILED: u64 = 0x0100_0000_0000_0002;

struct Context {
    device: Device<MockKms, Events>,
    output: OutputId,
    primary: u32,
    layer: LayerId,
    other: LayerId,
    commit_count: usize,
}

impl Context {
    fn new() -> Self {
        let mut kms = MockKms::new();
        let primary = kms.create_plane(PlaneKind::Primary);
        kms.create_plane(PlaneKind::Cursor);
        kms.add_property(primary, "alpha", PropertyKind::Other, 0);
        kms.add_property(primary, "IN_FENCE_FD", PropertyKind::Other, u64::MAX);
        kms.add_property(primary, "FB_DAMAGE_CLIPS", PropertyKind::Other, 0);

        let mut device = traced_device(kms);
        let output = output(&mut device);
        let main = layer(&mut device, output, 0, 0, 1920, 1080);
        let other = layer(&mut device, output, 0, 0, 256, 256);
        layer(&mut device, output, 0, 0, 256, 256);
        device.kms_mut().add_compatible_layer(primary, main);

        Self {
            device,
            output,
            primary,
            layer: main,
            other,
            commit_count: 0,
        }
    }

    fn set(&mut self, layer: LayerId, name: &str, value: u64) {
        self.device.layer_mut(layer).set_property(name, value).unwrap();
    }

    fn scanned_out(&self) -> Option<LayerId> {
        self.device.kms().plane_layer(self.primary)
    }

    fn first_commit(&mut self) {
        assert_eq!(self.device.kms().commit_count(), 0);
        commit(&mut self.device, self.output);
        self.commit_count = self.device.kms().commit_count();
        // With a single commit a reuse would be indistinguishable.
        assert!(self.commit_count > 1, "setup too small");
    }

    fn second_commit(&mut self, want_reuse: bool) {
        let tests_before = self.device.test_commit_count();
        let mut req = Request::new();
        self.device
            .apply(
                self.output,
                &mut req,
                CommitFlags::empty(),
                &ApplyOptions::default(),
            )
            .unwrap();
        let during_apply = self.device.kms().commit_count() - self.commit_count;
        let outcome = *self.device.sink().reuse.last().unwrap();
        if want_reuse {
            assert_eq!(during_apply, 1, "reuse takes one test commit");
            assert_eq!(outcome, ReuseOutcome::Accepted);
            assert_eq!(self.device.test_commit_count(), tests_before + 1);
        } else {
            assert!(during_apply > 1, "expected a full search");
            assert_ne!(outcome, ReuseOutcome::Accepted);
        }
        self.device.commit(&req, CommitFlags::empty()).unwrap();
    }

    fn new_fb(&mut self, modifier: u64) -> u32 {
        let fb_id = self.device.kms_mut().create_fb(self.layer);
        self.device.kms_mut().set_fb_info(FbInfo {
            fb_id,
            width: 1920,
            height: 1080,
            pixel_format: ARGB8888,
            modifier,
            has_modifiers: true,
        });
        fb_id
    }
}

#[test]
fn same() {
    let mut ctx = Context::new();
    ctx.first_commit();
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));
    assert_eq!(
        ctx.device.sink().reuse.first(),
        Some(&ReuseOutcome::Skipped(ReuseBlocker::LayersChanged)),
    );

    ctx.second_commit(true);
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));
    assert_eq!(ctx.device.output(ctx.output).reused_count(), 1);
}

#[test]
fn change_fb() {
    let mut ctx = Context::new();
    let fb_id = ctx.new_fb(MOD_LINEAR);
    ctx.set(ctx.layer, "FB_ID", u64::from(fb_id));
    ctx.first_commit();
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));

    // A new buffer with the exact same layout.
    let fb_id = ctx.new_fb(MOD_LINEAR);
    ctx.set(ctx.layer, "FB_ID", u64::from(fb_id));
    ctx.second_commit(true);
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));
    assert_eq!(
        ctx.device.kms().plane_property(ctx.primary, "FB_ID"),
        Some(u64::from(fb_id)),
    );
}

#[test]
fn change_fb_modifier() {
    let mut ctx = Context::new();
    let fb_id = ctx.new_fb(I915_Y_TILED);
    ctx.set(ctx.layer, "FB_ID", u64::from(fb_id));
    ctx.first_commit();
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));

    // The buffer was recreated under the same id with another modifier.
    ctx.device.kms_mut().set_fb_info(FbInfo {
        fb_id,
        width: 1920,
        height: 1080,
        pixel_format: ARGB8888,
        modifier: I915_X_TILED,
        has_modifiers: true,
    });
    ctx.set(ctx.layer, "FB_ID", u64::from(fb_id));
    ctx.second_commit(false);
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));
    assert_eq!(
        ctx.device.sink().reuse.last(),
        Some(&ReuseOutcome::Skipped(ReuseBlocker::LayerNeedsRealloc {
            layer: ctx.layer,
            cause: ReallocCause::FbLayout,
        })),
    );
}

#[test]
fn unset_fb() {
    let mut ctx = Context::new();
    ctx.first_commit();
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));

    ctx.set(ctx.layer, "FB_ID", 0);
    ctx.second_commit(false);
    assert_eq!(ctx.scanned_out(), None);
}

#[test]
fn set_fb() {
    let mut ctx = Context::new();
    ctx.set(ctx.layer, "FB_ID", 0);
    ctx.first_commit();
    assert_eq!(ctx.scanned_out(), None);

    let fb_id = ctx.device.kms_mut().create_fb(ctx.layer);
    ctx.set(ctx.layer, "FB_ID", u64::from(fb_id));
    ctx.second_commit(false);
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));
}

#[test]
fn add_layer() {
    let mut ctx = Context::new();
    ctx.first_commit();
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));

    layer(&mut ctx.device, ctx.output, 0, 0, 256, 256);
    ctx.second_commit(false);
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));
}

#[test]
fn remove_layer() {
    let mut ctx = Context::new();
    ctx.first_commit();
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));

    ctx.device.destroy_layer(ctx.other);
    ctx.second_commit(false);
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));
}

#[test]
fn change_composition_layer() {
    let mut ctx = Context::new();
    ctx.first_commit();
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));

    ctx.device
        .set_composition_layer(ctx.output, ctx.layer)
        .unwrap();
    ctx.second_commit(false);
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));
}

#[test]
fn change_alpha() {
    let mut ctx = Context::new();
    ctx.set(ctx.layer, "alpha", 42);
    ctx.first_commit();
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));

    ctx.set(ctx.layer, "alpha", 43);
    ctx.second_commit(true);
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));
    assert_eq!(
        ctx.device.kms().plane_property(ctx.primary, "alpha"),
        Some(43)
    );
}

#[test]
fn set_alpha_from_opaque() {
    let mut ctx = Context::new();
    ctx.set(ctx.layer, "alpha", 0xFFFF);
    ctx.first_commit();
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));

    ctx.set(ctx.layer, "alpha", 42);
    ctx.second_commit(false);
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));
}

#[test]
fn set_alpha_from_transparent() {
    let mut ctx = Context::new();
    ctx.set(ctx.layer, "alpha", 0);
    ctx.first_commit();
    assert_eq!(ctx.scanned_out(), None);

    ctx.set(ctx.layer, "alpha", 42);
    ctx.second_commit(false);
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));
}

#[test]
fn unset_alpha_to_opaque() {
    let mut ctx = Context::new();
    ctx.set(ctx.layer, "alpha", 42);
    ctx.first_commit();
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));

    ctx.set(ctx.layer, "alpha", 0xFFFF);
    ctx.second_commit(false);
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));
}

#[test]
fn unset_alpha_to_transparent() {
    let mut ctx = Context::new();
    ctx.set(ctx.layer, "alpha", 42);
    ctx.first_commit();
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));

    ctx.set(ctx.layer, "alpha", 0);
    ctx.second_commit(false);
    assert_eq!(ctx.scanned_out(), None);
}

#[test]
fn change_position_same_intersection() {
    let mut ctx = Context::new();
    ctx.first_commit();
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));

    ctx.set(ctx.other, "CRTC_X", 1);
    ctx.second_commit(true);
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));
}

#[test]
fn change_position_different_intersection() {
    let mut ctx = Context::new();
    ctx.first_commit();
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));

    ctx.set(ctx.other, "CRTC_X", 2000);
    ctx.set(ctx.other, "CRTC_Y", 2000);
    ctx.second_commit(false);
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));
}

#[test]
fn change_in_fence_fd() {
    let mut ctx = Context::new();
    ctx.set(ctx.layer, "IN_FENCE_FD", 42);
    ctx.first_commit();
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));

    ctx.set(ctx.layer, "IN_FENCE_FD", 43);
    ctx.second_commit(true);
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));
}

#[test]
fn change_fb_damage_clips() {
    let mut ctx = Context::new();
    ctx.set(ctx.layer, "FB_DAMAGE_CLIPS", 42);
    ctx.first_commit();
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));

    ctx.set(ctx.layer, "FB_DAMAGE_CLIPS", 43);
    ctx.second_commit(true);
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));
}

#[test]
fn rejected_reuse_falls_back_to_a_full_search() {
    let mut ctx = Context::new();
    ctx.first_commit();
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));

    // The previous allocation no longer passes its test commit.
    ctx.device.kms_mut().fail_next_commit(Errno::EINVAL);
    ctx.second_commit(false);
    assert_eq!(
        ctx.device.sink().reuse.last(),
        Some(&ReuseOutcome::Rejected(Errno::EINVAL)),
    );
    assert_eq!(ctx.scanned_out(), Some(ctx.layer));
    assert_eq!(ctx.device.output(ctx.output).reused_count(), 0);
}
