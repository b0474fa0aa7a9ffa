// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for plane allocation.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! allocator calls as it works through an apply. All method bodies default to
//! no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! # Crate features
//!
//! - `trace` — enables the `Tracer` method bodies (one branch per call).

use core::fmt;

use crate::error::Errno;
use crate::layer::LayerId;
use crate::output::OutputId;
use crate::plane::Incompatibility;
use crate::time::{Duration, HostTime};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Importance of a free-form log message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Something failed that the caller will likely see as an error.
    Error,
    /// Allocation details.
    Debug,
}

/// Why a layer needs a new plane allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReallocCause {
    /// A property was added or removed, or forced composition toggled.
    Structural,
    /// `FB_ID` switched between zero and non-zero.
    FbToggled,
    /// The new framebuffer has a different size, format or modifier.
    FbLayout,
    /// `alpha` moved to or from fully opaque or fully transparent.
    Alpha,
    /// The layer started or stopped overlapping another layer.
    Intersection,
    /// Another property changed value.
    Property,
}

/// What prevented reusing the previous allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReuseBlocker {
    /// A layer was created or destroyed since the last apply.
    LayersChanged,
    /// A layer changed in a way that can affect plane compatibility.
    LayerNeedsRealloc {
        /// The layer.
        layer: LayerId,
        /// What changed.
        cause: ReallocCause,
    },
    /// Layer priorities changed order.
    OrderChanged,
}

/// Result of the reuse fast path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReuseOutcome {
    /// Reuse was not attempted.
    Skipped(ReuseBlocker),
    /// The previous allocation passed its test commit.
    Accepted,
    /// The previous allocation failed its test commit.
    Rejected(Errno),
}

/// Stacking rule that ruled a layer out of a plane before any staging.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// An already placed, intersecting layer with lower `zpos` sits on a
    /// plane above this one.
    LayerZposAbove,
    /// This plane is not below the planes already holding intersecting
    /// layers.
    PlaneZposBelow,
    /// The layer belongs over the primary plane's layer but this plane is
    /// stacked under the primary plane.
    UnderPrimary,
    /// An unplaced, intersecting layer with higher `zpos` will be composited
    /// on top.
    CompositedLayerOver,
    /// The composition layer may only use the primary plane.
    CompositionOnOverlay,
}

/// Outcome of trying one layer on one plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CandidateVerdict {
    /// The test commit succeeded; the search goes one plane deeper.
    Accepted,
    /// A stacking rule excluded the pairing.
    Rejected(Rejection),
    /// The plane cannot show the layer.
    Incompatible(Incompatibility),
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when an apply starts.
#[derive(Clone, Copy, Debug)]
pub struct ApplyBeginEvent {
    /// Output being allocated.
    pub output: OutputId,
    /// Its CRTC.
    pub crtc_id: u32,
    /// Number of layers on the output.
    pub layers: usize,
    /// Host time at the start of the apply.
    pub timestamp: HostTime,
}

/// Emitted once the reuse fast path has been decided.
#[derive(Clone, Copy, Debug)]
pub struct ReuseEvent {
    /// Output being allocated.
    pub output: OutputId,
    /// What happened.
    pub outcome: ReuseOutcome,
}

/// Emitted for every layer considered for a plane during the search.
#[derive(Clone, Copy, Debug)]
pub struct CandidateEvent {
    /// Index of the plane in device order (search depth).
    pub depth: usize,
    /// Plane object id.
    pub plane_id: u32,
    /// Candidate layer.
    pub layer: LayerId,
    /// Outcome.
    pub verdict: CandidateVerdict,
}

/// Emitted when the search finds a better allocation.
#[derive(Clone, Copy, Debug)]
pub struct BestAllocationEvent {
    /// Planes visited on this path.
    pub depth: usize,
    /// Number of non-composition layers placed.
    pub score: usize,
}

/// Emitted when the search budget runs out on a plane.
#[derive(Clone, Copy, Debug)]
pub struct DeadlineEvent {
    /// Plane whose remaining candidates were skipped.
    pub plane_id: u32,
    /// Time spent searching so far.
    pub elapsed: Duration,
}

/// Emitted when a layer's priority is promoted at the end of a period.
#[derive(Clone, Copy, Debug)]
pub struct PriorityChangeEvent {
    /// The layer.
    pub layer: LayerId,
    /// Previous priority.
    pub old: u32,
    /// New priority.
    pub new: u32,
}

/// Emitted for each plane↔layer link established by a full search.
#[derive(Clone, Copy, Debug)]
pub struct AssignmentEvent {
    /// Output being allocated.
    pub output: OutputId,
    /// Plane object id.
    pub plane_id: u32,
    /// Layer placed on it.
    pub layer: LayerId,
}

/// Emitted when an apply finishes successfully.
#[derive(Clone, Copy, Debug)]
pub struct ApplyEndEvent {
    /// Output being allocated.
    pub output: OutputId,
    /// The previous allocation was reused.
    pub reused: bool,
    /// Score of the chosen allocation, `None` if the search found no valid
    /// allocation (or was not run).
    pub score: Option<usize>,
    /// Test commits issued by this apply.
    pub test_commits: u32,
    /// Time spent in the apply.
    pub elapsed: Duration,
    /// Host time at the end of the apply.
    pub timestamp: HostTime,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the allocator.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when an apply starts.
    fn on_apply_begin(&mut self, e: &ApplyBeginEvent) {
        _ = e;
    }

    /// Called once the reuse fast path has been decided.
    fn on_reuse(&mut self, e: &ReuseEvent) {
        _ = e;
    }

    /// Called for every layer considered for a plane.
    fn on_candidate(&mut self, e: &CandidateEvent) {
        _ = e;
    }

    /// Called when the search improves on its best allocation.
    fn on_best_allocation(&mut self, e: &BestAllocationEvent) {
        _ = e;
    }

    /// Called when the search budget runs out.
    fn on_deadline(&mut self, e: &DeadlineEvent) {
        _ = e;
    }

    /// Called when a layer's priority changes.
    fn on_priority_change(&mut self, e: &PriorityChangeEvent) {
        _ = e;
    }

    /// Called for each link established by a full search.
    fn on_assignment(&mut self, e: &AssignmentEvent) {
        _ = e;
    }

    /// Called when an apply finishes successfully.
    fn on_apply_end(&mut self, e: &ApplyEndEvent) {
        _ = e;
    }

    /// Called with free-form diagnostics.
    fn on_log(&mut self, severity: Severity, message: fmt::Arguments<'_>) {
        _ = (severity, message);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

macro_rules! dispatch {
    ($self:ident, $method:ident, $e:ident) => {{
        #[cfg(feature = "trace")]
        if let Some(s) = &mut $self.sink {
            s.$method($e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = $e;
        }
    }};
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits an [`ApplyBeginEvent`].
    #[inline]
    pub fn apply_begin(&mut self, e: &ApplyBeginEvent) {
        dispatch!(self, on_apply_begin, e);
    }

    /// Emits a [`ReuseEvent`].
    #[inline]
    pub fn reuse(&mut self, e: &ReuseEvent) {
        dispatch!(self, on_reuse, e);
    }

    /// Emits a [`CandidateEvent`].
    #[inline]
    pub fn candidate(&mut self, e: &CandidateEvent) {
        dispatch!(self, on_candidate, e);
    }

    /// Emits a [`BestAllocationEvent`].
    #[inline]
    pub fn best_allocation(&mut self, e: &BestAllocationEvent) {
        dispatch!(self, on_best_allocation, e);
    }

    /// Emits a [`DeadlineEvent`].
    #[inline]
    pub fn deadline(&mut self, e: &DeadlineEvent) {
        dispatch!(self, on_deadline, e);
    }

    /// Emits a [`PriorityChangeEvent`].
    #[inline]
    pub fn priority_change(&mut self, e: &PriorityChangeEvent) {
        dispatch!(self, on_priority_change, e);
    }

    /// Emits an [`AssignmentEvent`].
    #[inline]
    pub fn assignment(&mut self, e: &AssignmentEvent) {
        dispatch!(self, on_assignment, e);
    }

    /// Emits an [`ApplyEndEvent`].
    #[inline]
    pub fn apply_end(&mut self, e: &ApplyEndEvent) {
        dispatch!(self, on_apply_end, e);
    }

    /// Emits a free-form message.
    #[inline]
    pub fn log(&mut self, severity: Severity, message: fmt::Arguments<'_>) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_log(severity, message);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = (severity, message);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
