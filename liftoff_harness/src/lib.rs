// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory KMS device for exercising the plane allocator.
//!
//! [`MockKms`] implements [`Kms`] with one CRTC ([`CRTC_ID`]) and any number
//! of planes; more CRTCs come from [`MockKms::create_crtc`].
//! Every plane exposes the basic atomic properties (`type`, `FB_ID`,
//! `CRTC_ID`, `CRTC_X/Y/W/H`, `SRC_X/Y/W/H`); more can be added per plane
//! before the [`Device`] is created.
//!
//! Framebuffers are owned by layers: [`MockKms::create_fb`] mints an `FB_ID`
//! for a [`LayerId`], and a plane accepts a framebuffer only if its layer was
//! declared compatible with [`MockKms::add_compatible_layer`]. That is the
//! whole hardware model; everything else the allocator decides on its own.
//!
//! A commit fails with `EINVAL` when, for any plane, after applying the
//! request on top of the current state:
//!
//! - exactly one of `FB_ID` and `CRTC_ID` is zero,
//! - `CRTC_ID` names a CRTC the plane cannot drive or `FB_ID` an unknown
//!   framebuffer,
//! - the framebuffer's layer is not compatible with the plane,
//! - or [`require_primary_plane`](MockKms::require_primary_plane) is set and
//!   planes are lit without the primary one.
//!
//! Only non-test commits change plane state. The mock clock advances by a
//! configurable cost on every commit, which makes search deadlines
//! deterministic.

#![no_std]

extern crate alloc;

use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;

use liftoff_core::config::ApplyOptions;
use liftoff_core::device::Device;
use liftoff_core::error::{Errno, Error};
use liftoff_core::format::FormatModifierTable;
use liftoff_core::kms::{CommitFlags, FbInfo, Kms, PlaneInfo, PropertyInfo, PropertyKind};
use liftoff_core::layer::LayerId;
use liftoff_core::output::OutputId;
use liftoff_core::plane::PlaneKind;
use liftoff_core::request::Request;
use liftoff_core::time::HostTime;
use liftoff_core::trace::TraceSink;

#[cfg(test)]
mod tests;

const INDEX_MASK: u32 = 0x00FF_FFFF;
const TAG_CRTC: u32 = 0xCC00_0000;
const TAG_PLANE: u32 = 0xEE00_0000;
const TAG_PROPERTY: u32 = 0xB000_0000;
const TAG_FB: u32 = 0xFB00_0000;
const TAG_BLOB: u32 = 0xBB00_0000;

const BASIC_PROPERTIES: [&str; 11] = [
    "type", "FB_ID", "CRTC_ID", "CRTC_X", "CRTC_Y", "CRTC_W", "CRTC_H", "SRC_X", "SRC_Y", "SRC_W",
    "SRC_H",
];
const PROP_TYPE: usize = 0;
const PROP_FB_ID: usize = 1;
const PROP_CRTC_ID: usize = 2;

/// Object id of the mock's first CRTC.
pub const CRTC_ID: u32 = TAG_CRTC;

fn object_id(index: usize, tag: u32) -> u32 {
    u32::try_from(index).map_or(INDEX_MASK, |i| i & INDEX_MASK) | tag
}

fn object_index(id: u64, tag: u32) -> Option<usize> {
    let id = u32::try_from(id).ok()?;
    (id & !INDEX_MASK == tag).then_some((id & INDEX_MASK) as usize)
}

/// Value of the `type` property for a plane kind.
#[must_use]
pub const fn plane_type_value(kind: PlaneKind) -> u64 {
    match kind {
        PlaneKind::Overlay => 0,
        PlaneKind::Primary => 1,
        PlaneKind::Cursor => 2,
    }
}

#[derive(Clone, Debug)]
struct MockPlane {
    id: u32,
    /// `(property index, current value)`, in registration order.
    values: Vec<(usize, u64)>,
    compatible: Vec<LayerId>,
    possible_crtcs: u32,
}

impl MockPlane {
    fn value(&self, prop: usize) -> Option<u64> {
        self.values.iter().find(|(p, _)| *p == prop).map(|(_, v)| *v)
    }

    fn set_value(&mut self, prop: usize, value: u64) {
        if let Some(slot) = self.values.iter_mut().find(|(p, _)| *p == prop) {
            slot.1 = value;
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct MockFb {
    layer: LayerId,
    info: Option<FbInfo>,
}

/// An in-memory KMS device. See the [crate docs](crate).
#[derive(Clone, Debug)]
pub struct MockKms {
    crtcs: usize,
    properties: Vec<PropertyInfo>,
    planes: Vec<MockPlane>,
    fbs: Vec<MockFb>,
    blobs: Vec<Vec<u8>>,
    require_primary_plane: bool,
    commit_flags: Vec<CommitFlags>,
    commit_cost: u64,
    clock: u64,
    injected: VecDeque<Errno>,
}

impl MockKms {
    /// Creates a device without planes.
    #[must_use]
    pub fn new() -> Self {
        let mut kms = Self {
            crtcs: 1,
            properties: Vec::new(),
            planes: Vec::new(),
            fbs: Vec::new(),
            blobs: Vec::new(),
            require_primary_plane: false,
            commit_flags: Vec::new(),
            commit_cost: 0,
            clock: 0,
            injected: VecDeque::new(),
        };
        for name in BASIC_PROPERTIES {
            kms.register_property(name, PropertyKind::Other, false);
        }
        kms
    }

    fn register_property(&mut self, name: &str, kind: PropertyKind, immutable: bool) -> usize {
        let index = self.properties.len();
        self.properties.push(PropertyInfo {
            id: object_id(index, TAG_PROPERTY),
            name: String::from(name),
            kind,
            immutable,
        });
        index
    }

    fn plane_mut(&mut self, plane_id: u32) -> &mut MockPlane {
        self.planes
            .iter_mut()
            .find(|p| p.id == plane_id)
            .unwrap_or_else(|| panic!("unknown mock plane {plane_id:#x}"))
    }

    fn find_plane(&self, plane_id: u32) -> Option<&MockPlane> {
        self.planes.iter().find(|p| p.id == plane_id)
    }

    fn crtc_index(&self, crtc_id: u64) -> Option<usize> {
        object_index(crtc_id, TAG_CRTC).filter(|&i| i < self.crtcs)
    }

    // -- Setup --

    /// Adds a CRTC and returns its object id.
    ///
    /// The first CRTC, [`CRTC_ID`], always exists. The device reads the CRTC
    /// list once, so call this before creating it.
    pub fn create_crtc(&mut self) -> u32 {
        let id = object_id(self.crtcs, TAG_CRTC);
        self.crtcs += 1;
        id
    }

    /// Adds a plane with the basic properties and returns its object id.
    ///
    /// Plane ids increase in creation order.
    pub fn create_plane(&mut self, kind: PlaneKind) -> u32 {
        let id = object_id(self.planes.len(), TAG_PLANE);
        let mut values: Vec<(usize, u64)> = (0..BASIC_PROPERTIES.len()).map(|p| (p, 0)).collect();
        values[PROP_TYPE].1 = plane_type_value(kind);
        self.planes.push(MockPlane {
            id,
            values,
            compatible: Vec::new(),
            possible_crtcs: u32::MAX,
        });
        id
    }

    /// Restricts a plane to the CRTCs whose creation index bits are set in
    /// `mask`. Planes can drive every CRTC by default.
    ///
    /// # Panics
    ///
    /// Panics if the plane does not exist.
    pub fn set_possible_crtcs(&mut self, plane_id: u32, mask: u32) {
        self.plane_mut(plane_id).possible_crtcs = mask;
    }

    /// Adds a property to a plane and returns the property id.
    ///
    /// # Panics
    ///
    /// Panics if the plane does not exist.
    pub fn add_property(
        &mut self,
        plane_id: u32,
        name: &str,
        kind: PropertyKind,
        value: u64,
    ) -> u32 {
        self.add_property_with(plane_id, name, kind, false, value)
    }

    /// Adds a property the kernel refuses to write, such as a fixed `zpos`.
    ///
    /// # Panics
    ///
    /// Panics if the plane does not exist.
    pub fn add_immutable_property(&mut self, plane_id: u32, name: &str, value: u64) -> u32 {
        self.add_property_with(plane_id, name, PropertyKind::Other, true, value)
    }

    fn add_property_with(
        &mut self,
        plane_id: u32,
        name: &str,
        kind: PropertyKind,
        immutable: bool,
        value: u64,
    ) -> u32 {
        let index = self.register_property(name, kind, immutable);
        self.plane_mut(plane_id).values.push((index, value));
        self.properties[index].id
    }

    /// Stores a property blob and returns its id.
    pub fn create_blob(&mut self, data: Vec<u8>) -> u64 {
        let id = object_id(self.blobs.len(), TAG_BLOB);
        self.blobs.push(data);
        u64::from(id)
    }

    /// Publishes an `IN_FORMATS` table listing `pairs` on a plane.
    ///
    /// # Panics
    ///
    /// Panics if the plane does not exist.
    pub fn add_in_formats(&mut self, plane_id: u32, pairs: &[(u32, u64)]) {
        let table = FormatModifierTable::from_pairs(pairs.iter().copied());
        let blob = self.create_blob(encode_in_formats(&table));
        self.add_property(plane_id, "IN_FORMATS", PropertyKind::Blob, blob);
    }

    /// Mints a framebuffer id owned by `layer`.
    ///
    /// The framebuffer has no metadata until [`set_fb_info`](Self::set_fb_info).
    pub fn create_fb(&mut self, layer: LayerId) -> u32 {
        let id = object_id(self.fbs.len(), TAG_FB);
        self.fbs.push(MockFb { layer, info: None });
        id
    }

    /// Sets the metadata reported for `info.fb_id`.
    ///
    /// # Panics
    ///
    /// Panics if the framebuffer does not exist.
    pub fn set_fb_info(&mut self, info: FbInfo) {
        let fb = object_index(u64::from(info.fb_id), TAG_FB)
            .and_then(|i| self.fbs.get_mut(i))
            .unwrap_or_else(|| panic!("unknown mock framebuffer {:#x}", info.fb_id));
        fb.info = Some(info);
    }

    /// Lets `plane_id` scan out framebuffers owned by `layer`.
    ///
    /// # Panics
    ///
    /// Panics if the plane does not exist.
    pub fn add_compatible_layer(&mut self, plane_id: u32, layer: LayerId) {
        let plane = self.plane_mut(plane_id);
        if !plane.compatible.contains(&layer) {
            plane.compatible.push(layer);
        }
    }

    /// Refuses commits that light up planes without the primary plane.
    pub fn require_primary_plane(&mut self, require: bool) {
        self.require_primary_plane = require;
    }

    /// Advances the clock by `ticks` nanoseconds on every commit.
    pub fn set_commit_cost(&mut self, ticks: u64) {
        self.commit_cost = ticks;
    }

    /// Advances the clock.
    pub fn advance(&mut self, ticks: u64) {
        self.clock = self.clock.saturating_add(ticks);
    }

    /// Makes the next commit fail with `errno` before any validation.
    ///
    /// Queued failures are consumed one per commit, in order.
    pub fn fail_next_commit(&mut self, errno: Errno) {
        self.injected.push_back(errno);
    }

    // -- Inspection --

    /// Commits issued so far, test-only ones included.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commit_flags.len()
    }

    /// Flags of every commit issued so far, in order.
    #[must_use]
    pub fn commit_flags(&self) -> &[CommitFlags] {
        &self.commit_flags
    }

    /// The layer whose framebuffer the plane currently scans out.
    #[must_use]
    pub fn plane_layer(&self, plane_id: u32) -> Option<LayerId> {
        let fb_id = self.find_plane(plane_id)?.value(PROP_FB_ID)?;
        self.fb_layer(fb_id)
    }

    /// Current value of a plane property.
    #[must_use]
    pub fn plane_property(&self, plane_id: u32, name: &str) -> Option<u64> {
        self.find_plane(plane_id)?
            .values
            .iter()
            .find(|&&(prop, _)| self.properties[prop].name == name)
            .map(|&(_, value)| value)
    }

    fn fb_layer(&self, fb_id: u64) -> Option<LayerId> {
        if fb_id == 0 {
            return None;
        }
        let index = object_index(fb_id, TAG_FB)?;
        self.fbs.get(index).map(|fb| fb.layer)
    }

    fn property_index(&self, prop_id: u32) -> Option<usize> {
        object_index(u64::from(prop_id), TAG_PROPERTY).filter(|&i| i < self.properties.len())
    }

    fn validate(&self, request: &Request) -> Result<(), Errno> {
        for write in request.writes() {
            let plane = self.find_plane(write.object_id).ok_or(Errno::ENOENT)?;
            let prop = self.property_index(write.property_id).ok_or(Errno::ENOENT)?;
            if plane.value(prop).is_none() || self.properties[prop].immutable {
                return Err(Errno::EINVAL);
            }
        }

        let fb_prop = self.properties[PROP_FB_ID].id;
        let crtc_prop = self.properties[PROP_CRTC_ID].id;
        let mut any_enabled = false;
        let mut primary_enabled = false;
        for plane in &self.planes {
            let fb_id = request
                .value(plane.id, fb_prop)
                .or_else(|| plane.value(PROP_FB_ID))
                .unwrap_or(0);
            let crtc_id = request
                .value(plane.id, crtc_prop)
                .or_else(|| plane.value(PROP_CRTC_ID))
                .unwrap_or(0);
            if (fb_id != 0) != (crtc_id != 0) {
                return Err(Errno::EINVAL);
            }
            if fb_id == 0 {
                continue;
            }
            let crtc_index = self.crtc_index(crtc_id).ok_or(Errno::EINVAL)?;
            let drivable = u32::try_from(crtc_index)
                .ok()
                .and_then(|i| 1_u32.checked_shl(i))
                .is_some_and(|bit| plane.possible_crtcs & bit != 0);
            if !drivable {
                return Err(Errno::EINVAL);
            }
            let layer = self.fb_layer(fb_id).ok_or(Errno::EINVAL)?;
            if !plane.compatible.contains(&layer) {
                return Err(Errno::EINVAL);
            }
            any_enabled = true;
            if plane.value(PROP_TYPE) == Some(plane_type_value(PlaneKind::Primary)) {
                primary_enabled = true;
            }
        }

        if self.require_primary_plane && any_enabled && !primary_enabled {
            return Err(Errno::EINVAL);
        }
        Ok(())
    }
}

impl Default for MockKms {
    fn default() -> Self {
        Self::new()
    }
}

impl Kms for MockKms {
    fn crtcs(&self) -> Result<Vec<u32>, Errno> {
        Ok((0..self.crtcs).map(|i| object_id(i, TAG_CRTC)).collect())
    }

    fn plane_ids(&self) -> Result<Vec<u32>, Errno> {
        Ok(self.planes.iter().map(|p| p.id).collect())
    }

    fn plane(&self, plane_id: u32) -> Result<PlaneInfo, Errno> {
        let plane = self.find_plane(plane_id).ok_or(Errno::ENOENT)?;
        Ok(PlaneInfo {
            id: plane.id,
            possible_crtcs: plane.possible_crtcs,
            properties: plane
                .values
                .iter()
                .map(|&(prop, value)| (self.properties[prop].clone(), value))
                .collect(),
        })
    }

    fn property_blob(&self, blob_id: u64) -> Result<Vec<u8>, Errno> {
        object_index(blob_id, TAG_BLOB)
            .and_then(|i| self.blobs.get(i))
            .cloned()
            .ok_or(Errno::EINVAL)
    }

    fn framebuffer(&self, fb_id: u32) -> Result<Option<FbInfo>, Errno> {
        object_index(u64::from(fb_id), TAG_FB)
            .and_then(|i| self.fbs.get(i))
            .map(|fb| fb.info)
            .ok_or(Errno::ENOENT)
    }

    fn commit(&mut self, request: &Request, flags: CommitFlags) -> Result<(), Errno> {
        self.commit_flags.push(flags);
        self.clock = self.clock.saturating_add(self.commit_cost);
        if let Some(errno) = self.injected.pop_front() {
            return Err(errno);
        }
        self.validate(request)?;
        if flags.contains(CommitFlags::TEST_ONLY) {
            return Ok(());
        }
        for write in request.writes() {
            let Some(prop) = self.property_index(write.property_id) else {
                continue;
            };
            if let Some(plane) = self.planes.iter_mut().find(|p| p.id == write.object_id) {
                plane.set_value(prop, write.value);
            }
        }
        Ok(())
    }

    fn now(&self) -> HostTime {
        HostTime(self.clock)
    }
}

/// Lays a table out as a kernel `drm_format_modifier_blob`.
#[must_use]
pub fn encode_in_formats(table: &FormatModifierTable) -> Vec<u8> {
    const HEADER_LEN: usize = 24;
    let formats = table.formats();
    let modifiers = table.modifiers();
    let modifiers_offset = (HEADER_LEN + formats.len() * 4).next_multiple_of(8);
    let len_u32 = |n: usize| u32::try_from(n).unwrap_or(u32::MAX);

    let mut blob = Vec::with_capacity(modifiers_offset + modifiers.len() * 24);
    for word in [
        1,
        0,
        len_u32(formats.len()),
        len_u32(HEADER_LEN),
        len_u32(modifiers.len()),
        len_u32(modifiers_offset),
    ] {
        blob.extend_from_slice(&word.to_ne_bytes());
    }
    for format in formats {
        blob.extend_from_slice(&format.to_ne_bytes());
    }
    blob.resize(modifiers_offset, 0);
    for entry in modifiers {
        blob.extend_from_slice(&entry.formats.to_ne_bytes());
        blob.extend_from_slice(&entry.offset.to_ne_bytes());
        blob.extend_from_slice(&0_u32.to_ne_bytes());
        blob.extend_from_slice(&entry.modifier.to_ne_bytes());
    }
    blob
}

// ---------------------------------------------------------------------------
// Device helpers
// ---------------------------------------------------------------------------

/// Creates a layer with a fresh framebuffer covering `width × height` pixels
/// at `(x, y)`, with a matching full-buffer source rectangle.
pub fn add_layer<S: TraceSink>(
    device: &mut Device<MockKms, S>,
    output: OutputId,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
) -> Result<LayerId, Error> {
    let id = device.create_layer(output);
    let fb_id = device.kms_mut().create_fb(id);
    let layer = device.layer_mut(id);
    layer.set_property("FB_ID", u64::from(fb_id))?;
    layer.set_property("CRTC_X", i64::from(x).cast_unsigned())?;
    layer.set_property("CRTC_Y", i64::from(y).cast_unsigned())?;
    layer.set_property("CRTC_W", u64::from(width))?;
    layer.set_property("CRTC_H", u64::from(height))?;
    layer.set_property("SRC_X", 0)?;
    layer.set_property("SRC_Y", 0)?;
    layer.set_property("SRC_W", u64::from(width) << 16)?;
    layer.set_property("SRC_H", u64::from(height) << 16)?;
    Ok(id)
}

/// Allocates planes for `output` and issues the real commit, the way a
/// compositor does once per frame.
pub fn apply_and_commit<S: TraceSink>(
    device: &mut Device<MockKms, S>,
    output: OutputId,
    options: &ApplyOptions,
) -> Result<(), Error> {
    let mut req = Request::new();
    device.apply(output, &mut req, CommitFlags::empty(), options)?;
    device.commit(&req, CommitFlags::empty())
}
