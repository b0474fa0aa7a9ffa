// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compositor layers.
//!
//! A [`Layer`] is something the compositor wants on screen: a framebuffer
//! plus the KMS properties describing where and how to show it. Layers are
//! owned by an [`Output`](crate::output::Output) and addressed through
//! generational [`LayerId`] handles issued by the
//! [`Device`](crate::device::Device).

use alloc::vec::Vec;
use core::fmt;

use kurbo::Rect;

use crate::error::Error;
use crate::kms::FbInfo;
use crate::output::OutputId;
use crate::prop::{CoreProperty, Property, PropertyBag};

/// A handle to a layer owned by a [`Device`](crate::device::Device).
///
/// Contains both a slot index and a generation counter so that stale handles
/// can be detected after a layer is destroyed and the slot is reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl LayerId {
    /// Returns the raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LayerId({}@gen{})", self.idx, self.generation)
    }
}

/// A compositor-level renderable surface.
#[derive(Clone, Debug)]
pub struct Layer {
    output: OutputId,
    props: PropertyBag,
    pub(crate) plane: Option<u32>,
    current_priority: u32,
    pending_priority: u32,
    pub(crate) candidate_planes: Vec<u32>,
    force_composition: bool,
    pub(crate) changed: bool,
    fb_info: Option<FbInfo>,
    prev_fb_info: Option<FbInfo>,
}

impl Layer {
    pub(crate) fn new(output: OutputId) -> Self {
        Self {
            output,
            props: PropertyBag::new(),
            plane: None,
            current_priority: 0,
            pending_priority: 0,
            candidate_planes: Vec::new(),
            force_composition: false,
            changed: false,
            fb_info: None,
            prev_fb_info: None,
        }
    }

    /// The output this layer belongs to.
    #[must_use]
    pub fn output(&self) -> OutputId {
        self.output
    }

    /// Sets a KMS property on the layer.
    ///
    /// `CRTC_ID` is filled in by the allocator and cannot be set here. Setting
    /// a non-zero `FB_ID` lifts a previous
    /// [`set_fb_composited`](Self::set_fb_composited).
    pub fn set_property(&mut self, name: &str, value: u64) -> Result<(), Error> {
        if name == CoreProperty::CrtcId.name() {
            return Err(Error::ReservedProperty(CoreProperty::CrtcId.name()));
        }
        if self.props.set(name, value) {
            self.changed = true;
        }
        if self.force_composition && value != 0 && name == CoreProperty::FbId.name() {
            self.force_composition = false;
            self.changed = true;
        }
        Ok(())
    }

    /// Removes a property; unknown names are ignored.
    pub fn unset_property(&mut self, name: &str) {
        if self.props.remove(name) {
            self.changed = true;
        }
    }

    /// Current value of a property.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<u64> {
        self.props.get(name).map(|p| p.value())
    }

    /// All properties of the layer.
    #[must_use]
    pub fn properties(&self) -> &PropertyBag {
        &self.props
    }

    /// Forces the layer to be composited.
    ///
    /// Clears `FB_ID`; the layer stays visible but never receives a plane
    /// until a non-zero `FB_ID` is set again.
    pub fn set_fb_composited(&mut self) {
        if self.force_composition {
            return;
        }
        if self.props.set(CoreProperty::FbId.name(), 0) {
            self.changed = true;
        }
        self.force_composition = true;
        self.changed = true;
    }

    /// Whether [`set_fb_composited`](Self::set_fb_composited) is in effect.
    #[must_use]
    pub fn is_fb_composited(&self) -> bool {
        self.force_composition
    }

    /// Object id of the plane this layer was assigned to by the last apply.
    #[must_use]
    pub fn plane(&self) -> Option<u32> {
        self.plane
    }

    /// Whether the layer shows up on screen.
    ///
    /// A layer with `alpha == 0` is never visible. Otherwise it is visible
    /// if it has a framebuffer or is forced into composition.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        if self.props.core_value(CoreProperty::Alpha) == Some(0) {
            return false;
        }
        self.force_composition || self.has_fb()
    }

    /// Whether the compositor has to draw this layer itself.
    #[must_use]
    pub fn needs_composition(&self) -> bool {
        self.is_visible() && self.plane.is_none()
    }

    /// Whether the last full search found `plane_id` able to take this layer's
    /// properties.
    ///
    /// A candidate plane that did not end up hosting the layer usually means
    /// the buffer itself was the problem (format, modifier, size), so the
    /// compositor may want to reallocate it.
    #[must_use]
    pub fn is_candidate_plane(&self, plane_id: u32) -> bool {
        self.candidate_planes.contains(&plane_id)
    }

    /// Planes recorded by [`is_candidate_plane`](Self::is_candidate_plane).
    #[must_use]
    pub fn candidate_planes(&self) -> &[u32] {
        &self.candidate_planes
    }

    /// Priority used to break ties when ordering layers.
    ///
    /// Roughly the number of framebuffer updates during the previous priority
    /// period.
    #[must_use]
    pub fn priority(&self) -> u32 {
        self.current_priority
    }

    /// Metadata of the current framebuffer, as resolved by the last apply.
    #[must_use]
    pub fn fb_info(&self) -> Option<&FbInfo> {
        self.fb_info.as_ref()
    }

    /// Layer `zpos`, if set.
    #[must_use]
    pub fn zpos(&self) -> Option<i64> {
        self.props
            .core_value(CoreProperty::Zpos)
            .map(u64::cast_signed)
    }

    /// On-screen rectangle from `CRTC_X/Y/W/H`; missing values count as 0.
    #[must_use]
    pub fn screen_rect(&self) -> Rect {
        self.rect_with(|p| p.value())
    }

    pub(crate) fn prev_screen_rect(&self) -> Rect {
        self.rect_with(|p| p.prev_value())
    }

    fn rect_with(&self, value: impl Fn(&Property) -> u64) -> Rect {
        let coord = |prop| crtc_coord(self.props.core(prop).map(&value));
        let x = coord(CoreProperty::CrtcX);
        let y = coord(CoreProperty::CrtcY);
        Rect::new(
            x,
            y,
            x + coord(CoreProperty::CrtcW),
            y + coord(CoreProperty::CrtcH),
        )
    }

    pub(crate) fn has_fb(&self) -> bool {
        self.props.core_value(CoreProperty::FbId).unwrap_or(0) != 0
    }

    /// Whether both layers are visible and overlap on screen.
    pub(crate) fn intersects(&self, other: &Self) -> bool {
        self.is_visible()
            && other.is_visible()
            && rects_intersect(&self.screen_rect(), &other.screen_rect())
    }

    pub(crate) fn prev_fb_info(&self) -> Option<&FbInfo> {
        self.prev_fb_info.as_ref()
    }

    pub(crate) fn set_fb_info(&mut self, info: Option<FbInfo>) {
        self.fb_info = info;
    }

    /// Counts a framebuffer change and, at the end of a priority period,
    /// promotes the pending count.
    ///
    /// Returns `(old, new)` when the current priority moved.
    pub(crate) fn update_priority(&mut self, make_current: bool) -> Option<(u32, u32)> {
        if self.props.core(CoreProperty::FbId).is_some_and(|p| p.is_dirty()) {
            self.pending_priority += 1;
        }
        if !make_current {
            return None;
        }
        let old = self.current_priority;
        self.current_priority = self.pending_priority;
        self.pending_priority = 0;
        (old != self.current_priority).then_some((old, self.current_priority))
    }

    pub(crate) fn mark_clean(&mut self) {
        self.changed = false;
        self.prev_fb_info = self.fb_info;
        self.props.mark_clean();
    }

    pub(crate) fn add_candidate_plane(&mut self, plane_id: u32) {
        if !self.candidate_planes.contains(&plane_id) {
            self.candidate_planes.push(plane_id);
        }
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "CRTC_X/Y/W/H are 32-bit signed values in the kernel ABI"
)]
fn crtc_coord(value: Option<u64>) -> f64 {
    f64::from(value.unwrap_or(0) as i32)
}

/// Strict overlap test: rectangles sharing only an edge do not intersect.
pub(crate) fn rects_intersect(a: &Rect, b: &Rect) -> bool {
    a.x0 < b.x1 && a.y0 < b.y1 && a.x1 > b.x0 && a.y1 > b.y0
}
