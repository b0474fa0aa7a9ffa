// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`Kms`] over a DRM device node.

use std::fs::{File, OpenOptions};
use std::num::NonZeroU32;
use std::os::unix::io::{AsFd, BorrowedFd};
use std::path::Path;

use drm::{ClientCapability, Device as BasicDevice};
use drm::control::atomic::AtomicModeReq;
use drm::control::{self, AtomicCommitFlags, Device as ControlDevice, framebuffer, plane, property};
use liftoff_core::error::Errno;
use liftoff_core::format::MOD_INVALID;
use liftoff_core::kms::{CommitFlags, FbInfo, Kms, PlaneInfo};
use liftoff_core::request::Request;
use liftoff_core::time::{HostTime, Timebase};

use crate::error::{DrmError, errno_of, planar_fb_error};
use crate::property::info_of;

/// An opened DRM device node, e.g. `/dev/dri/card0`.
#[derive(Debug)]
pub struct Card(File);

impl Card {
    /// Opens the node read-write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DrmError> {
        let path = path.as_ref();
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map(Self)
            .map_err(|source| DrmError::Open {
                path: path.to_path_buf(),
                source,
            })
    }
}

impl AsFd for Card {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}

impl BasicDevice for Card {}
impl ControlDevice for Card {}

/// A [`Kms`] implementation driving a DRM device through the atomic API.
///
/// Creating one enables the universal-planes and atomic client capabilities,
/// without which the kernel hides primary and cursor planes.
#[derive(Debug)]
pub struct DrmKms<D> {
    device: D,
}

impl DrmKms<Card> {
    /// Opens the device node at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DrmError> {
        Self::new(Card::open(path)?)
    }
}

impl<D: ControlDevice> DrmKms<D> {
    /// Wraps an already opened device.
    pub fn new(device: D) -> Result<Self, DrmError> {
        for (capability, name) in [
            (ClientCapability::UniversalPlanes, "UNIVERSAL_PLANES"),
            (ClientCapability::Atomic, "ATOMIC"),
        ] {
            device
                .set_client_capability(capability, true)
                .map_err(|source| DrmError::Capability {
                    capability: name,
                    source,
                })?;
        }
        Ok(Self { device })
    }

    /// Returns the underlying device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Consumes the backend and returns the underlying device.
    pub fn into_inner(self) -> D {
        self.device
    }
}

impl<D: ControlDevice> Kms for DrmKms<D> {
    fn crtcs(&self) -> Result<Vec<u32>, Errno> {
        let resources = self.device.resource_handles().map_err(|e| errno_of(&e))?;
        Ok(resources.crtcs().iter().copied().map(u32::from).collect())
    }

    fn plane_ids(&self) -> Result<Vec<u32>, Errno> {
        let planes = self.device.plane_handles().map_err(|e| errno_of(&e))?;
        Ok(planes.into_iter().map(u32::from).collect())
    }

    fn plane(&self, plane_id: u32) -> Result<PlaneInfo, Errno> {
        let handle: plane::Handle = control::from_u32(plane_id).ok_or(Errno::ENOENT)?;
        let info = self.device.get_plane(handle).map_err(|e| errno_of(&e))?;

        // The kernel's mask indexes CRTCs in resource order, which is also
        // the order `crtcs` reports.
        let resources = self.device.resource_handles().map_err(|e| errno_of(&e))?;
        let usable = resources.filter_crtcs(info.possible_crtcs());
        let possible_crtcs = resources
            .crtcs()
            .iter()
            .enumerate()
            .filter(|(_, crtc)| usable.contains(*crtc))
            .filter_map(|(i, _)| 1_u32.checked_shl(u32::try_from(i).ok()?))
            .fold(0, |mask, bit| mask | bit);

        let values = self
            .device
            .get_properties(handle)
            .map_err(|e| errno_of(&e))?;
        let (handles, raw_values) = values.as_props_and_values();
        let mut properties = Vec::with_capacity(handles.len());
        for (&prop, &value) in handles.iter().zip(raw_values) {
            let prop_info = self.device.get_property(prop).map_err(|e| errno_of(&e))?;
            properties.push((info_of(prop, &prop_info), value));
        }

        Ok(PlaneInfo {
            id: plane_id,
            possible_crtcs,
            properties,
        })
    }

    fn property_blob(&self, blob_id: u64) -> Result<Vec<u8>, Errno> {
        self.device
            .get_property_blob(blob_id)
            .map_err(|e| errno_of(&e))
    }

    fn framebuffer(&self, fb_id: u32) -> Result<Option<FbInfo>, Errno> {
        let handle: framebuffer::Handle = control::from_u32(fb_id).ok_or(Errno::ENOENT)?;
        match self.device.get_planar_framebuffer(handle) {
            Ok(info) => {
                let (width, height) = info.size();
                let modifier = info.modifier().map(u64::from);
                Ok(Some(FbInfo {
                    fb_id,
                    width,
                    height,
                    pixel_format: info.pixel_format() as u32,
                    modifier: modifier.unwrap_or(MOD_INVALID),
                    has_modifiers: modifier.is_some(),
                }))
            }
            Err(err) => planar_fb_error(&err).map_or(Ok(None), Err),
        }
    }

    fn commit(&mut self, request: &Request, flags: CommitFlags) -> Result<(), Errno> {
        let mut req = AtomicModeReq::new();
        for write in request.writes() {
            let object = NonZeroU32::new(write.object_id).ok_or(Errno::EINVAL)?;
            let prop: property::Handle =
                control::from_u32(write.property_id).ok_or(Errno::EINVAL)?;
            req.add_raw_property(object, prop, write.value);
        }
        self.device
            .atomic_commit(AtomicCommitFlags::from_bits_truncate(flags.bits()), req)
            .map_err(|e| errno_of(&e))
    }

    fn now(&self) -> HostTime {
        crate::time::now()
    }

    fn timebase(&self) -> Timebase {
        crate::time::timebase()
    }
}
