// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The device arena.
//!
//! A [`Device`] owns the kernel handle (through [`Kms`]), the registered
//! planes, and every output and layer. Outputs and layers are addressed by
//! generational handles; using a handle after its object was destroyed is a
//! caller bug and panics.
//!
//! Plane↔layer links are stored on both sides and only ever changed through
//! one internal method, which keeps the relation a partial injection.

use alloc::vec::Vec;
use core::fmt;

use crate::arena::Arena;
use crate::config::AllocatorConfig;
use crate::error::Error;
use crate::format::FormatModifierTable;
use crate::kms::{CommitFlags, Kms};
use crate::layer::{Layer, LayerId};
use crate::output::{Output, OutputId};
use crate::plane::{Plane, PlaneKind};
use crate::request::Request;
use crate::trace::{NoopSink, Severity, TraceSink, Tracer};

/// Plane allocator state for one DRM device.
pub struct Device<K, S = NoopSink> {
    pub(crate) kms: K,
    pub(crate) sink: S,
    pub(crate) config: AllocatorConfig,
    crtcs: Vec<u32>,
    pub(crate) planes: Vec<Plane>,
    pub(crate) outputs: Arena<Output>,
    pub(crate) layers: Arena<Layer>,
    pub(crate) page_flip_counter: u32,
    pub(crate) test_commits: u32,
}

impl<K, S> fmt::Debug for Device<K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("config", &self.config)
            .field("crtcs", &self.crtcs)
            .field("planes", &self.planes.len())
            .field("test_commits", &self.test_commits)
            .finish_non_exhaustive()
    }
}

impl<K: Kms> Device<K> {
    /// Creates a device without tracing.
    ///
    /// Planes are not registered yet; call
    /// [`register_all_planes`](Self::register_all_planes) or
    /// [`register_plane`](Self::register_plane).
    pub fn new(kms: K) -> Result<Self, Error> {
        Self::with_sink(kms, NoopSink)
    }
}

impl<K: Kms, S: TraceSink> Device<K, S> {
    /// Creates a device reporting to `sink`.
    pub fn with_sink(kms: K, sink: S) -> Result<Self, Error> {
        let crtcs = kms.crtcs()?;
        Ok(Self {
            kms,
            sink,
            config: AllocatorConfig::DEFAULT,
            crtcs,
            planes: Vec::new(),
            outputs: Arena::default(),
            layers: Arena::default(),
            page_flip_counter: 0,
            test_commits: 0,
        })
    }

    /// Replaces the allocator settings.
    #[must_use]
    pub fn with_config(mut self, config: AllocatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Current allocator settings.
    #[must_use]
    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// CRTC object ids, in kernel order.
    #[must_use]
    pub fn crtcs(&self) -> &[u32] {
        &self.crtcs
    }

    // -- Planes --

    /// Registers every plane the kernel exposes.
    pub fn register_all_planes(&mut self) -> Result<(), Error> {
        for plane_id in self.kms.plane_ids()? {
            self.register_plane(plane_id)?;
        }
        Ok(())
    }

    /// Registers one plane, making it available to the allocator.
    ///
    /// The plane is inserted into the traversal order: primary planes first,
    /// then the others by descending `zpos`. Among planes with equal `zpos`
    /// the one registered last is visited first.
    pub fn register_plane(&mut self, plane_id: u32) -> Result<(), Error> {
        if self.planes.iter().any(|p| p.id() == plane_id) {
            self.log(
                Severity::Error,
                format_args!("tried to register plane {plane_id} twice"),
            );
            return Err(Error::DuplicatePlane(plane_id));
        }

        let info = self.kms.plane(plane_id)?;
        let mut kind = None;
        let mut zpos = None;
        let mut in_formats_blob = None;
        for (prop, value) in &info.properties {
            match prop.name.as_str() {
                "type" => kind = Some(PlaneKind::from_raw(*value)),
                "zpos" => zpos = Some(value.cast_signed()),
                "IN_FORMATS" => in_formats_blob = Some(*value),
                _ => {}
            }
        }

        let Some(kind) = kind else {
            self.log(
                Severity::Error,
                format_args!("plane {plane_id} is missing the 'type' property"),
            );
            return Err(Error::MissingPlaneType(plane_id));
        };

        let in_formats = match in_formats_blob {
            Some(blob_id) => {
                let blob = self.kms.property_blob(blob_id)?;
                let table = FormatModifierTable::from_blob(&blob);
                if table.is_none() {
                    self.log(
                        Severity::Error,
                        format_args!("plane {plane_id}: malformed IN_FORMATS blob {blob_id}"),
                    );
                }
                table
            }
            None => None,
        };

        let zpos = zpos.unwrap_or_else(|| {
            kind.guessed_zpos(plane_id, self.planes.first().map(Plane::id))
        });
        let plane = Plane::from_info(info, kind, zpos, in_formats);
        let at = traversal_position(&self.planes, &plane);
        self.log(
            Severity::Debug,
            format_args!("plane {plane_id}: {kind:?}, zpos {zpos}, position {at}"),
        );
        self.planes.insert(at, plane);
        Ok(())
    }

    /// Forgets a plane. Returns `false` if it was not registered.
    ///
    /// A layer shown on the plane loses its assignment.
    pub fn unregister_plane(&mut self, plane_id: u32) -> bool {
        let Some(idx) = self.plane_index(plane_id) else {
            return false;
        };
        self.set_link(idx, None);
        self.planes.remove(idx);
        true
    }

    /// Registered planes in traversal order.
    #[must_use]
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// Looks a registered plane up by object id.
    #[must_use]
    pub fn plane(&self, plane_id: u32) -> Option<&Plane> {
        self.planes.iter().find(|p| p.id() == plane_id)
    }

    pub(crate) fn plane_index(&self, plane_id: u32) -> Option<usize> {
        self.planes.iter().position(|p| p.id() == plane_id)
    }

    // -- Outputs --

    /// Creates an output driving `crtc_id`.
    pub fn create_output(&mut self, crtc_id: u32) -> Result<OutputId, Error> {
        let crtc_index = self
            .crtcs
            .iter()
            .position(|&c| c == crtc_id)
            .ok_or(Error::UnknownCrtc(crtc_id))?;
        let (idx, generation) = self.outputs.insert(Output::new(crtc_id, crtc_index));
        Ok(OutputId { idx, generation })
    }

    /// Destroys an output together with all of its layers.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn destroy_output(&mut self, id: OutputId) {
        let layers = self.output(id).layers.clone();
        for layer in layers {
            self.destroy_layer(layer);
        }
        self.outputs.remove(id.idx, id.generation);
    }

    /// Borrows an output.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn output(&self, id: OutputId) -> &Output {
        self.outputs
            .get(id.idx, id.generation)
            .unwrap_or_else(|| stale_output(id))
    }

    pub(crate) fn output_mut(&mut self, id: OutputId) -> &mut Output {
        self.outputs
            .get_mut(id.idx, id.generation)
            .unwrap_or_else(|| stale_output(id))
    }

    /// Designates the layer that receives GPU-composited content.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale.
    pub fn set_composition_layer(&mut self, output: OutputId, layer: LayerId) -> Result<(), Error> {
        if self.layer(layer).output() != output {
            return Err(Error::ForeignLayer);
        }
        let out = self.output_mut(output);
        if out.composition_layer != Some(layer) {
            out.layers_changed = true;
        }
        out.composition_layer = Some(layer);
        Ok(())
    }

    /// Whether any visible layer of the output is left without a plane.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn output_needs_composition(&self, output: OutputId) -> bool {
        self.output(output)
            .layers
            .iter()
            .any(|&id| self.layer(id).needs_composition())
    }

    // -- Layers --

    /// Creates a layer on `output`.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn create_layer(&mut self, output: OutputId) -> LayerId {
        // Validate before allocating the slot.
        let _ = self.output(output);
        let (idx, generation) = self.layers.insert(Layer::new(output));
        let id = LayerId { idx, generation };
        let out = self.output_mut(output);
        out.layers.push(id);
        out.layers_changed = true;
        id
    }

    /// Destroys a layer, releasing its plane.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn destroy_layer(&mut self, id: LayerId) {
        if let Some(plane_idx) = self.layer(id).plane.and_then(|p| self.plane_index(p)) {
            self.set_link(plane_idx, None);
        }
        let Some(layer) = self.layers.remove(id.idx, id.generation) else {
            stale_layer(id)
        };
        let out = self.output_mut(layer.output());
        if out.composition_layer == Some(id) {
            out.composition_layer = None;
        }
        out.layers.retain(|&l| l != id);
        out.layers_changed = true;
    }

    /// Borrows a layer.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn layer(&self, id: LayerId) -> &Layer {
        self.layers
            .get(id.idx, id.generation)
            .unwrap_or_else(|| stale_layer(id))
    }

    /// Mutably borrows a layer, to update its properties.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn layer_mut(&mut self, id: LayerId) -> &mut Layer {
        self.layers
            .get_mut(id.idx, id.generation)
            .unwrap_or_else(|| stale_layer(id))
    }

    // -- Kernel access --

    /// Submits the caller's real commit.
    pub fn commit(&mut self, request: &Request, flags: CommitFlags) -> Result<(), Error> {
        self.kms.commit(request, flags).map_err(|errno| {
            self.log(Severity::Error, format_args!("atomic commit failed: {errno}"));
            Error::Kernel(errno)
        })
    }

    /// Test commits issued since the last full search started, including the
    /// ones of any reuse attempt since then.
    #[must_use]
    pub fn test_commit_count(&self) -> u32 {
        self.test_commits
    }

    /// The kernel backend.
    #[must_use]
    pub fn kms(&self) -> &K {
        &self.kms
    }

    /// The kernel backend, mutably.
    pub fn kms_mut(&mut self) -> &mut K {
        &mut self.kms
    }

    /// The trace sink.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// The trace sink, mutably.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    // -- Links --

    /// Points `planes[plane_idx]` at `layer` (or at nothing) and updates the
    /// back-references of everything involved.
    ///
    /// This is the only place links change.
    pub(crate) fn set_link(&mut self, plane_idx: usize, layer: Option<LayerId>) {
        let plane_id = self.planes[plane_idx].id();
        if let Some(old) = self.planes[plane_idx].layer.take() {
            if let Some(old_layer) = self.layers.get_mut(old.idx, old.generation) {
                old_layer.plane = None;
            }
        }
        if let Some(id) = layer {
            let Some(new_layer) = self.layers.get_mut(id.idx, id.generation) else {
                stale_layer(id)
            };
            if let Some(prev_plane) = new_layer.plane.replace(plane_id) {
                if let Some(prev) = self.planes.iter_mut().find(|p| p.id() == prev_plane) {
                    prev.layer = None;
                }
            }
            self.planes[plane_idx].layer = Some(id);
        }
        debug_assert!(self.links_consistent(), "plane/layer links diverged");
    }

    /// Whether every link is mirrored on the other side.
    pub(crate) fn links_consistent(&self) -> bool {
        let planes_ok = self.planes.iter().all(|plane| match plane.layer {
            Some(id) => self
                .layers
                .get(id.idx, id.generation)
                .is_some_and(|l| l.plane == Some(plane.id())),
            None => true,
        });
        let layers_ok = self.layers.iter().all(|(idx, generation, layer)| {
            layer.plane.is_none_or(|plane_id| {
                self.plane(plane_id)
                    .is_some_and(|p| p.layer == Some(LayerId { idx, generation }))
            })
        });
        planes_ok && layers_ok
    }

    pub(crate) fn log(&mut self, severity: Severity, message: fmt::Arguments<'_>) {
        Tracer::new(&mut self.sink).log(severity, message);
    }
}

/// Index at which `plane` joins the traversal order.
fn traversal_position(planes: &[Plane], plane: &Plane) -> usize {
    if plane.kind() == PlaneKind::Primary {
        return 0;
    }
    planes
        .iter()
        .position(|cur| cur.kind() != PlaneKind::Primary && plane.zpos() >= cur.zpos())
        .unwrap_or(planes.len())
}

#[cold]
fn stale_layer(id: LayerId) -> ! {
    panic!("stale LayerId: {id:?}")
}

#[cold]
fn stale_output(id: OutputId) -> ! {
    panic!("stale OutputId: {id:?}")
}
