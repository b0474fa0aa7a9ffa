// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Display outputs.
//!
//! An [`Output`] drives one CRTC and owns the layers shown on it. Its layer
//! list is kept in priority order: the allocator reorders it at the start of
//! every apply.

use alloc::vec::Vec;
use core::fmt;

use crate::layer::LayerId;

/// A handle to an output owned by a [`Device`](crate::device::Device).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl OutputId {
    /// Returns the raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }
}

impl fmt::Debug for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutputId({}@gen{})", self.idx, self.generation)
    }
}

/// One display pipeline.
#[derive(Clone, Debug)]
pub struct Output {
    crtc_id: u32,
    crtc_index: usize,
    pub(crate) layers: Vec<LayerId>,
    pub(crate) composition_layer: Option<LayerId>,
    pub(crate) layers_changed: bool,
    pub(crate) reused_count: u32,
}

impl Output {
    pub(crate) fn new(crtc_id: u32, crtc_index: usize) -> Self {
        Self {
            crtc_id,
            crtc_index,
            layers: Vec::new(),
            composition_layer: None,
            layers_changed: false,
            reused_count: 0,
        }
    }

    /// CRTC object id.
    #[must_use]
    pub fn crtc_id(&self) -> u32 {
        self.crtc_id
    }

    /// Position of the CRTC in the device's CRTC list.
    #[must_use]
    pub fn crtc_index(&self) -> usize {
        self.crtc_index
    }

    /// Layers, highest priority first.
    #[must_use]
    pub fn layers(&self) -> &[LayerId] {
        &self.layers
    }

    /// The layer receiving GPU-composited content, if any.
    #[must_use]
    pub fn composition_layer(&self) -> Option<LayerId> {
        self.composition_layer
    }

    /// How many consecutive applies reused the previous allocation.
    #[must_use]
    pub fn reused_count(&self) -> u32 {
        self.reused_count
    }
}
