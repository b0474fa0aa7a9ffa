// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hardware planes.
//!
//! A [`Plane`] snapshots what the kernel told us about a scanout plane at
//! registration time (type, `zpos`, CRTC mask, property descriptors and the
//! optional `IN_FORMATS` table) and stages layer properties onto a
//! [`Request`], validating each write locally first.

use alloc::vec::Vec;

use crate::error::{Errno, Error};
use crate::format::FormatModifierTable;
use crate::kms::{PlaneInfo, PropertyInfo};
use crate::layer::{Layer, LayerId};
use crate::prop::{CoreProperty, Property};
use crate::request::Request;

/// `DRM_MODE_ROTATE_0`.
pub const ROTATE_0: u64 = 1 << 0;

/// Kernel plane type (`type` property).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlaneKind {
    /// `DRM_PLANE_TYPE_OVERLAY`
    Overlay,
    /// `DRM_PLANE_TYPE_PRIMARY`
    Primary,
    /// `DRM_PLANE_TYPE_CURSOR`
    Cursor,
}

impl PlaneKind {
    /// Decodes the value of the `type` property.
    ///
    /// Unknown values are treated as overlays.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        match value {
            1 => Self::Primary,
            2 => Self::Cursor,
            _ => Self::Overlay,
        }
    }

    /// `zpos` assumed for planes that do not expose one.
    ///
    /// Overlays are placed under the primary plane when their id is lower
    /// than the primary's, and over it otherwise.
    #[must_use]
    pub fn guessed_zpos(self, plane_id: u32, primary_id: Option<u32>) -> i64 {
        match self {
            Self::Primary => 0,
            Self::Cursor => 2,
            Self::Overlay => match primary_id {
                Some(primary) if plane_id < primary => -1,
                Some(_) => 1,
                None => 0,
            },
        }
    }
}

/// Why a layer could not be shown on a plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Incompatibility {
    /// The layer sets a non-default value for a property the plane lacks.
    MissingProperty,
    /// A value is outside the plane property's declared range or set.
    InvalidValue,
    /// The plane's `IN_FORMATS` table lacks the framebuffer's format and
    /// modifier.
    FbFormat,
    /// The layer is forced into composition.
    ForcedComposition,
    /// The kernel rejected the test commit.
    Kernel(Errno),
}

/// A hardware scanout plane.
#[derive(Clone, Debug)]
pub struct Plane {
    id: u32,
    kind: PlaneKind,
    zpos: i64,
    possible_crtcs: u32,
    props: Vec<PropertyInfo>,
    core: [Option<usize>; CoreProperty::COUNT],
    in_formats: Option<FormatModifierTable>,
    pub(crate) layer: Option<LayerId>,
}

impl Plane {
    /// Builds a plane from kernel data.
    ///
    /// `zpos` is used when the plane has no `zpos` property.
    pub(crate) fn from_info(
        info: PlaneInfo,
        kind: PlaneKind,
        zpos: i64,
        in_formats: Option<FormatModifierTable>,
    ) -> Self {
        let mut core = [None; CoreProperty::COUNT];
        let mut props = Vec::with_capacity(info.properties.len());
        for (prop, _) in info.properties {
            if let Some(c) = CoreProperty::from_name(&prop.name) {
                core[c.index()] = Some(props.len());
            }
            props.push(prop);
        }
        Self {
            id: info.id,
            kind,
            zpos,
            possible_crtcs: info.possible_crtcs,
            props,
            core,
            in_formats,
            layer: None,
        }
    }

    /// Plane object id.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Plane type.
    #[must_use]
    pub fn kind(&self) -> PlaneKind {
        self.kind
    }

    /// Stacking position, either reported by the kernel or guessed.
    #[must_use]
    pub fn zpos(&self) -> i64 {
        self.zpos
    }

    /// Bit `i` is set if the plane can be used with the device's `i`-th CRTC.
    #[must_use]
    pub fn possible_crtcs(&self) -> u32 {
        self.possible_crtcs
    }

    /// Layer currently assigned to this plane, on any output.
    #[must_use]
    pub fn layer(&self) -> Option<LayerId> {
        self.layer
    }

    /// Decoded `IN_FORMATS` table, if the plane publishes one.
    #[must_use]
    pub fn in_formats(&self) -> Option<&FormatModifierTable> {
        self.in_formats.as_ref()
    }

    /// Looks a property descriptor up by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyInfo> {
        match CoreProperty::from_name(name) {
            Some(core) => self.core_property(core),
            None => self.props.iter().find(|p| p.name == name),
        }
    }

    /// All property descriptors.
    #[must_use]
    pub fn properties(&self) -> &[PropertyInfo] {
        &self.props
    }

    fn core_property(&self, prop: CoreProperty) -> Option<&PropertyInfo> {
        self.core[prop.index()].map(|slot| &self.props[slot])
    }

    fn descriptor_for(&self, prop: &Property) -> Option<&PropertyInfo> {
        match prop.core() {
            Some(core) => self.core_property(core),
            None => self.props.iter().find(|p| p.name == prop.name()),
        }
    }

    pub(crate) fn is_compatible_with_crtc(&self, crtc_index: usize) -> bool {
        crtc_index < 32 && self.possible_crtcs & (1 << crtc_index) != 0
    }

    /// Stages `FB_ID = 0, CRTC_ID = 0`.
    pub(crate) fn stage_disable(&self, req: &mut Request) -> Result<(), Error> {
        for prop in [CoreProperty::FbId, CoreProperty::CrtcId] {
            let Some(info) = self.core_property(prop) else {
                return Err(Error::MissingPlaneProperty {
                    plane: self.id,
                    property: prop.name(),
                });
            };
            req.add(self.id, info.id, 0);
        }
        Ok(())
    }

    /// Stages every property of `layer` onto this plane, bound to `crtc_id`.
    ///
    /// `zpos` is never written: plane order is fixed by the hardware. Nothing
    /// stays staged on failure.
    pub(crate) fn stage_layer(
        &self,
        layer: &Layer,
        crtc_id: u32,
        req: &mut Request,
    ) -> Result<(), Incompatibility> {
        let cursor = req.cursor();
        let result = self.try_stage_layer(layer, crtc_id, req);
        if result.is_err() {
            req.set_cursor(cursor);
        }
        result
    }

    fn try_stage_layer(
        &self,
        layer: &Layer,
        crtc_id: u32,
        req: &mut Request,
    ) -> Result<(), Incompatibility> {
        let crtc = self
            .core_property(CoreProperty::CrtcId)
            .ok_or(Incompatibility::MissingProperty)?;
        req.add(self.id, crtc.id, u64::from(crtc_id));

        for prop in layer.properties().iter() {
            if prop.core() == Some(CoreProperty::Zpos) {
                continue;
            }
            let Some(info) = self.descriptor_for(prop) else {
                if is_default_value(prop.name(), prop.value()) {
                    continue;
                }
                return Err(Incompatibility::MissingProperty);
            };
            if !info.accepts(prop.value()) {
                return Err(Incompatibility::InvalidValue);
            }
            req.add(self.id, info.id, prop.value());
        }
        Ok(())
    }

    /// Whether the plane's `IN_FORMATS` table allows the layer's framebuffer.
    ///
    /// Passes when there is not enough information to decide.
    pub(crate) fn check_layer_fb(&self, layer: &Layer) -> bool {
        let (Some(fb), Some(table)) = (layer.fb_info(), &self.in_formats) else {
            return true;
        };
        if fb.fb_id == 0 || !fb.has_modifiers {
            return true;
        }
        table.supports(fb.pixel_format, fb.modifier)
    }
}

/// Values that leave a plane in the same state as not having the property.
fn is_default_value(name: &str, value: u64) -> bool {
    match name {
        "alpha" => value == 0xFFFF,
        "rotation" => value == ROTATE_0,
        "SCALING_FILTER" | "pixel blend mode" => value == 0,
        "FB_DAMAGE_CLIPS" => true,
        _ => false,
    }
}
