// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Plane allocation.
//!
//! [`Device::apply`] runs once per frame and output:
//!
//! 1. Layer priorities are counted (and promoted at the end of a priority
//!    period) and framebuffer metadata is refetched.
//! 2. The output's layer list is reordered by priority.
//! 3. If nothing relevant changed since the last apply, the previous
//!    plane↔layer mapping is staged again and checked with a single test
//!    commit.
//! 4. Otherwise the output's links are dropped and a depth-first search
//!    walks the planes in traversal order, trying every compatible layer on
//!    each plane plus the "leave empty" branch. Each pairing is validated with
//!    a test commit. The search prunes branches that cannot beat the best
//!    score found so far and stops trying new candidates once its time budget
//!    is spent.
//!
//! The chosen mapping is linked and every plane's state is staged onto the
//! caller's request, ready for the real commit.

use alloc::vec;
use alloc::vec::Vec;

use crate::arena::Arena;
use crate::config::ApplyOptions;
use crate::device::Device;
use crate::error::{Errno, Error};
use crate::kms::{CommitFlags, Kms};
use crate::layer::{Layer, LayerId, rects_intersect};
use crate::output::{Output, OutputId};
use crate::plane::{Incompatibility, Plane, PlaneKind};
use crate::prop::CoreProperty;
use crate::request::Request;
use crate::time::{Duration, HostTime};
use crate::trace::{
    ApplyBeginEvent, ApplyEndEvent, AssignmentEvent, BestAllocationEvent, CandidateEvent,
    CandidateVerdict, DeadlineEvent, PriorityChangeEvent, ReallocCause, Rejection, ReuseBlocker,
    ReuseEvent, ReuseOutcome, Severity, TraceSink, Tracer,
};

impl<K: Kms, S: TraceSink> Device<K, S> {
    /// Allocates planes for `output` and stages the result onto `req`.
    ///
    /// `flags` are the flags of the commit the caller is going to issue; test
    /// commits use them without `PAGE_FLIP_EVENT`.
    ///
    /// On success every layer of the output either has a plane
    /// ([`Layer::plane`]) or needs composition
    /// ([`Layer::needs_composition`]). Kernel rejections of individual
    /// pairings never surface here; only unexpected kernel errors do.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn apply(
        &mut self,
        output: OutputId,
        req: &mut Request,
        flags: CommitFlags,
        options: &ApplyOptions,
    ) -> Result<(), Error> {
        let started = self.kms.now();
        let (crtc_id, layer_count) = {
            let out = self.output(output);
            (out.crtc_id(), out.layers.len())
        };
        Tracer::new(&mut self.sink).apply_begin(&ApplyBeginEvent {
            output,
            crtc_id,
            layers: layer_count,
            timestamp: started,
        });

        self.update_priorities();
        self.refresh_fb_info(output);
        let order_changed = self.update_layer_order(output);

        let outcome = match self.reuse_blocker(output, order_changed) {
            Some(blocker) => ReuseOutcome::Skipped(blocker),
            None => match self.try_reuse(req, flags)? {
                None => ReuseOutcome::Accepted,
                Some(errno) => ReuseOutcome::Rejected(errno),
            },
        };
        let reuse_commits = u32::from(!matches!(outcome, ReuseOutcome::Skipped(_)));
        Tracer::new(&mut self.sink).reuse(&ReuseEvent { output, outcome });

        let score = if outcome == ReuseOutcome::Accepted {
            let out = self.output_mut(output);
            out.reused_count = out.reused_count.saturating_add(1);
            if out.reused_count == 1 {
                self.log(
                    Severity::Debug,
                    format_args!("reusing previous plane allocation on CRTC {crtc_id}"),
                );
            }
            None
        } else {
            let reused = core::mem::take(&mut self.output_mut(output).reused_count);
            if reused != 0 {
                self.log(
                    Severity::Debug,
                    format_args!(
                        "stopped reusing previous plane allocation on CRTC {crtc_id} \
                         (had reused it {reused} times)"
                    ),
                );
            }
            self.allocate(output, req, flags, options, started)?
        };

        self.mark_clean(output);

        let ended = self.kms.now();
        let test_commits = if outcome == ReuseOutcome::Accepted {
            reuse_commits
        } else {
            reuse_commits.saturating_add(self.test_commits)
        };
        Tracer::new(&mut self.sink).apply_end(&ApplyEndEvent {
            output,
            reused: outcome == ReuseOutcome::Accepted,
            score,
            test_commits,
            elapsed: ended.saturating_duration_since(started),
            timestamp: ended,
        });
        Ok(())
    }

    /// Counts framebuffer updates on every layer of the device and promotes
    /// the counts at the end of each priority period.
    fn update_priorities(&mut self) {
        self.page_flip_counter += 1;
        let period_elapsed = self.page_flip_counter >= self.config.priority_period;
        if period_elapsed {
            self.page_flip_counter = 0;
        }

        let mut tracer = Tracer::new(&mut self.sink);
        for (idx, generation, layer) in self.layers.iter_mut() {
            if let Some((old, new)) = layer.update_priority(period_elapsed) {
                tracer.priority_change(&PriorityChangeEvent {
                    layer: LayerId { idx, generation },
                    old,
                    new,
                });
            }
        }
    }

    /// Refetches framebuffer metadata: the caller may have replaced a buffer
    /// with a different one that reuses the same id.
    fn refresh_fb_info(&mut self, output: OutputId) {
        let Some(out) = self.outputs.get(output.idx, output.generation) else {
            return;
        };
        let mut tracer = Tracer::new(&mut self.sink);
        for &id in &out.layers {
            let Some(layer) = self.layers.get_mut(id.idx, id.generation) else {
                continue;
            };
            let fb_id = layer
                .property(CoreProperty::FbId.name())
                .and_then(|v| u32::try_from(v).ok())
                .filter(|&fb| fb != 0);
            let info = match fb_id {
                Some(fb_id) => match self.kms.framebuffer(fb_id) {
                    Ok(info) => info,
                    Err(errno) => {
                        tracer.log(
                            Severity::Error,
                            format_args!("failed to query framebuffer {fb_id}: {errno}"),
                        );
                        None
                    }
                },
                None => None,
            };
            layer.set_fb_info(info);
        }
    }

    /// Selection-sorts the output's layers by priority.
    ///
    /// Returns whether the order changed.
    fn update_layer_order(&mut self, output: OutputId) -> bool {
        let layers = &self.layers;
        let Some(out) = self.outputs.get_mut(output.idx, output.generation) else {
            return false;
        };
        let composition = out.composition_layer;
        let order = &mut out.layers;

        // The comparison is not a total order, so `sort_by` is off the table.
        let mut changed = false;
        for i in 0..order.len() {
            let mut max = i;
            for j in i + 1..order.len() {
                if is_higher_priority(layers, composition, order[j], order[max]) {
                    max = j;
                }
            }
            if max != i {
                order.swap(i, max);
                changed = true;
            }
        }
        changed
    }

    fn reuse_blocker(&self, output: OutputId, order_changed: bool) -> Option<ReuseBlocker> {
        let out = self.output(output);
        if out.layers_changed {
            return Some(ReuseBlocker::LayersChanged);
        }
        for &layer in &out.layers {
            if let Some(cause) = needs_realloc(&self.layers, out, layer) {
                return Some(ReuseBlocker::LayerNeedsRealloc { layer, cause });
            }
        }
        order_changed.then_some(ReuseBlocker::OrderChanged)
    }

    /// Stages the current mapping and test-commits it.
    ///
    /// Returns the kernel's objection, if any; nothing stays staged then.
    fn try_reuse(&mut self, req: &mut Request, flags: CommitFlags) -> Result<Option<Errno>, Error> {
        let cursor = req.cursor();
        match self.stage_current(req) {
            Ok(()) => {}
            Err(Error::Kernel(errno)) => return Ok(Some(errno)),
            Err(err) => return Err(err),
        }
        let mut tracer = Tracer::new(&mut self.sink);
        let outcome = test_commit(
            &mut self.kms,
            &mut self.test_commits,
            &mut tracer,
            req,
            flags,
        );
        match outcome {
            Ok(TestOutcome::Passed) => Ok(None),
            Ok(TestOutcome::Incompatible(errno)) => {
                req.set_cursor(cursor);
                Ok(Some(errno))
            }
            Err(err) => {
                req.set_cursor(cursor);
                Err(err)
            }
        }
    }

    /// Runs the full search and links its result.
    ///
    /// Returns the best score, or `None` if no allocation was valid.
    fn allocate(
        &mut self,
        output: OutputId,
        req: &mut Request,
        flags: CommitFlags,
        options: &ApplyOptions,
        started: HostTime,
    ) -> Result<Option<usize>, Error> {
        for id in self.output(output).layers.clone() {
            self.layer_mut(id).candidate_planes.clear();
        }
        self.test_commits = 0;
        self.log_layers(output);

        for idx in 0..self.planes.len() {
            let linked_here = self.planes[idx]
                .layer
                .is_some_and(|id| self.layer(id).output() == output);
            if linked_here {
                self.set_link(idx, None);
            }
        }

        // Disable everything we might use up front so enabling one plane
        // never fails on bandwidth held by a stale one.
        let mut free_planes = 0_usize;
        for plane in &self.planes {
            if plane.layer.is_none() {
                free_planes += 1;
                plane.stage_disable(req)?;
            }
        }

        let timebase = self.kms.timebase();
        let timeout = Duration::from_nanos(options.resolve_timeout_ns(&self.config), timebase);
        let Some(out) = self.outputs.get(output.idx, output.generation) else {
            return Ok(None);
        };
        let (best, best_score, hints) = {
            let mut search = Search {
                kms: &mut self.kms,
                tracer: Tracer::new(&mut self.sink),
                test_commits: &mut self.test_commits,
                flags,
                planes: &self.planes,
                layers: &self.layers,
                output: out,
                non_composition_len: out
                    .layers
                    .iter()
                    .filter(|&&id| Some(id) != out.composition_layer)
                    .filter_map(|&id| self.layers.get(id.idx, id.generation))
                    .filter(|layer| layer.is_visible())
                    .count(),
                alloc: vec![None; self.planes.len()],
                best: vec![None; self.planes.len()],
                best_score: None,
                hints: Vec::new(),
                started,
                timeout,
            };
            search.choose(Step::root(), req)?;
            (search.best, search.best_score, search.hints)
        };

        for (layer, plane_id) in hints {
            self.layer_mut(layer).add_candidate_plane(plane_id);
        }

        let tests = self.test_commits;
        self.log(
            Severity::Debug,
            format_args!(
                "found plane allocation for output {output:?} (score: {best_score:?}, \
                 candidate planes: {free_planes}, tests: {tests})"
            ),
        );
        let mut linked = false;
        for (idx, slot) in best.into_iter().enumerate() {
            let Some(layer) = slot else {
                continue;
            };
            debug_assert!(self.planes[idx].layer.is_none(), "winning plane is taken");
            self.set_link(idx, Some(layer));
            let plane_id = self.planes[idx].id();
            Tracer::new(&mut self.sink).assignment(&AssignmentEvent {
                output,
                plane_id,
                layer,
            });
            linked = true;
        }
        if !linked {
            self.log(Severity::Debug, format_args!("no layer has a plane"));
        }

        self.stage_current(req)?;
        Ok(best_score)
    }

    /// Stages every registered plane: its layer if linked, disabled
    /// otherwise. Nothing stays staged on failure.
    fn stage_current(&self, req: &mut Request) -> Result<(), Error> {
        let cursor = req.cursor();
        for plane in &self.planes {
            let staged = match plane.layer {
                Some(id) => {
                    let layer = self.layer(id);
                    let crtc_id = self.output(layer.output()).crtc_id();
                    plane
                        .stage_layer(layer, crtc_id, req)
                        .map_err(|_| Error::Kernel(Errno::EINVAL))
                }
                None => plane.stage_disable(req),
            };
            if let Err(err) = staged {
                req.set_cursor(cursor);
                return Err(err);
            }
        }
        Ok(())
    }

    fn mark_clean(&mut self, output: OutputId) {
        let Some(out) = self.outputs.get_mut(output.idx, output.generation) else {
            return;
        };
        out.layers_changed = false;
        for &id in &out.layers {
            if let Some(layer) = self.layers.get_mut(id.idx, id.generation) {
                layer.mark_clean();
            }
        }
    }

    fn log_layers(&mut self, output: OutputId) {
        let Some(out) = self.outputs.get(output.idx, output.generation) else {
            return;
        };
        let mut tracer = Tracer::new(&mut self.sink);
        tracer.log(
            Severity::Debug,
            format_args!(
                "layers on CRTC {} ({} total):",
                out.crtc_id(),
                out.layers.len()
            ),
        );
        for &id in &out.layers {
            let Some(layer) = self.layers.get(id.idx, id.generation) else {
                continue;
            };
            if !layer.is_fb_composited() && !layer.has_fb() {
                continue;
            }
            let role = if layer.is_fb_composited() {
                " (forced composition)"
            } else if out.composition_layer == Some(id) {
                " (composition layer)"
            } else {
                ""
            };
            tracer.log(
                Severity::Debug,
                format_args!("  layer {id:?}{role}, priority {}", layer.priority()),
            );
            for prop in layer.properties().iter() {
                match prop.core() {
                    Some(CoreProperty::CrtcX | CoreProperty::CrtcY) => tracer.log(
                        Severity::Debug,
                        format_args!("    {} = {:+}", prop.name(), signed_coord(prop.value())),
                    ),
                    Some(
                        CoreProperty::SrcX
                        | CoreProperty::SrcY
                        | CoreProperty::SrcW
                        | CoreProperty::SrcH,
                    ) => tracer.log(
                        Severity::Debug,
                        format_args!("    {} = {}", prop.name(), fixed_16_16(prop.value())),
                    ),
                    _ => tracer.log(
                        Severity::Debug,
                        format_args!("    {} = {}", prop.name(), prop.value()),
                    ),
                }
            }
        }
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "CRTC_X/Y are 32-bit signed values in the kernel ABI"
)]
fn signed_coord(value: u64) -> i32 {
    value as i32
}

fn fixed_16_16(value: u64) -> f64 {
    (value >> 16) as f64 + (value & 0xFFFF) as f64 / 65535.0
}

// ---------------------------------------------------------------------------
// Test commits
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TestOutcome {
    Passed,
    Incompatible(Errno),
}

/// Issues a test-only commit, retrying on interruption.
///
/// `EINVAL` (invalid configuration), `ERANGE` (CRTC coordinates overflow) and
/// `ENOSPC` (invalid source coordinates) are incompatibilities; any other
/// failure is a hard error.
fn test_commit<K: Kms>(
    kms: &mut K,
    counter: &mut u32,
    tracer: &mut Tracer<'_>,
    req: &Request,
    flags: CommitFlags,
) -> Result<TestOutcome, Error> {
    *counter = counter.saturating_add(1);
    let flags = flags.difference(CommitFlags::PAGE_FLIP_EVENT) | CommitFlags::TEST_ONLY;
    loop {
        match kms.commit(req, flags) {
            Ok(()) => return Ok(TestOutcome::Passed),
            Err(errno) if errno.is_transient() => {}
            Err(errno) if errno.is_incompatibility() => {
                return Ok(TestOutcome::Incompatible(errno));
            }
            Err(errno) => {
                tracer.log(Severity::Error, format_args!("test commit failed: {errno}"));
                return Err(Error::Kernel(errno));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Reuse and ordering rules
// ---------------------------------------------------------------------------

fn get(layers: &Arena<Layer>, id: LayerId) -> Option<&Layer> {
    layers.get(id.idx, id.generation)
}

/// Why the previous allocation may no longer be the best one for `id`.
fn needs_realloc(layers: &Arena<Layer>, output: &Output, id: LayerId) -> Option<ReallocCause> {
    let layer = get(layers, id)?;
    if layer.changed {
        return Some(ReallocCause::Structural);
    }

    let mut check_intersection = false;
    for prop in layer.properties().iter() {
        if prop.core() == Some(CoreProperty::FbId) {
            let (now, before) = (prop.value(), prop.prev_value());
            if now == 0 && before == 0 {
                continue;
            }
            // A buffer appearing may find a plane; one disappearing frees its
            // plane for someone else.
            if now == 0 || before == 0 {
                return Some(ReallocCause::FbToggled);
            }
            let fb = layer.fb_info().copied().unwrap_or_default();
            let prev = layer.prev_fb_info().copied().unwrap_or_default();
            if fb.layout_differs(&prev) {
                return Some(ReallocCause::FbLayout);
            }
            continue;
        }

        if !prop.is_dirty() {
            continue;
        }

        match prop.core() {
            Some(CoreProperty::Alpha) => {
                let extreme = |v: u64| v == 0 || v == 0xFFFF;
                if extreme(prop.value()) || extreme(prop.prev_value()) {
                    return Some(ReallocCause::Alpha);
                }
            }
            Some(
                CoreProperty::CrtcX | CoreProperty::CrtcY | CoreProperty::CrtcW | CoreProperty::CrtcH,
            ) => check_intersection = true,
            _ if matches!(prop.name(), "IN_FENCE_FD" | "FB_DAMAGE_CLIPS") => {}
            _ => return Some(ReallocCause::Property),
        }
    }

    if check_intersection && intersection_changed(layers, output, id, layer) {
        return Some(ReallocCause::Intersection);
    }
    None
}

/// Whether `layer` started or stopped overlapping any other layer of the
/// output, comparing raw rectangles.
fn intersection_changed(layers: &Arena<Layer>, output: &Output, id: LayerId, layer: &Layer) -> bool {
    let (now, before) = (layer.screen_rect(), layer.prev_screen_rect());
    output
        .layers
        .iter()
        .filter(|&&other| other != id)
        .filter_map(|&other| get(layers, other))
        .any(|other| {
            rects_intersect(&now, &other.screen_rect())
                != rects_intersect(&before, &other.prev_screen_rect())
        })
}

/// Ordering used to decide which layers the search tries first.
fn is_higher_priority(
    layers: &Arena<Layer>,
    composition: Option<LayerId>,
    this_id: LayerId,
    other_id: LayerId,
) -> bool {
    if composition == Some(this_id) {
        return true;
    }
    if composition == Some(other_id) {
        return false;
    }
    let (Some(this), Some(other)) = (get(layers, this_id), get(layers, other_id)) else {
        return false;
    };

    if this.is_visible() != other.is_visible() {
        return this.is_visible();
    }

    // Overlapping layers go by zpos: the top one has to be offloaded before
    // the one under it can be.
    match (this.zpos(), other.zpos()) {
        (Some(a), Some(b)) => {
            if this.intersects(other) {
                if a == b {
                    this.priority() > other.priority()
                } else {
                    a > b
                }
            } else if this.priority() == other.priority() {
                a > b
            } else {
                this.priority() > other.priority()
            }
        }
        (None, None) => this.priority() > other.priority(),
        (this_zpos, _) => this_zpos.is_some(),
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Per-depth search state. The partial assignment itself lives in
/// [`Search::alloc`]; entries at and after `plane_idx` are scratch.
#[derive(Clone, Copy, Debug)]
struct Step {
    plane_idx: usize,
    score: usize,
    /// `zpos` of the layer placed on the most recent non-primary plane.
    last_layer_zpos: i64,
    primary_layer_zpos: i64,
    primary_plane_zpos: i64,
    composited: bool,
}

impl Step {
    const fn root() -> Self {
        Self {
            plane_idx: 0,
            score: 0,
            last_layer_zpos: i64::MAX,
            primary_layer_zpos: i64::MIN,
            primary_plane_zpos: i64::MAX,
            composited: false,
        }
    }
}

struct Search<'a, K> {
    kms: &'a mut K,
    tracer: Tracer<'a>,
    test_commits: &'a mut u32,
    flags: CommitFlags,
    planes: &'a [Plane],
    layers: &'a Arena<Layer>,
    output: &'a Output,
    non_composition_len: usize,
    alloc: Vec<Option<LayerId>>,
    best: Vec<Option<LayerId>>,
    best_score: Option<usize>,
    hints: Vec<(LayerId, u32)>,
    started: HostTime,
    timeout: Duration,
}

impl<K: Kms> Search<'_, K> {
    fn choose(&mut self, step: Step, req: &mut Request) -> Result<(), Error> {
        let planes = self.planes;
        if step.plane_idx == planes.len() {
            self.finish(&step);
            return Ok(());
        }
        let plane = &planes[step.plane_idx];
        let crtc_index = self.output.crtc_index();

        let remaining = planes[step.plane_idx..]
            .iter()
            .filter(|p| p.layer.is_none() && p.is_compatible_with_crtc(crtc_index))
            .count();
        if self
            .best_score
            .is_some_and(|best| best >= step.score + remaining)
        {
            return Ok(());
        }

        let cursor = req.cursor();
        if plane.layer.is_none() && plane.is_compatible_with_crtc(crtc_index) {
            self.try_layers(&step, plane, req, cursor)?;
        }

        let next = self.next(&step, None);
        self.choose(next, req)?;
        req.set_cursor(cursor);
        Ok(())
    }

    fn try_layers(
        &mut self,
        step: &Step,
        plane: &Plane,
        req: &mut Request,
        cursor: usize,
    ) -> Result<(), Error> {
        let output = self.output;
        let layers = self.layers;
        for &id in &output.layers {
            let Some(layer) = get(layers, id) else {
                continue;
            };
            if layer.plane.is_some() || !layer.is_visible() || self.is_allocated(step, id) {
                continue;
            }
            if let Some(rejection) = self.rejection(step, plane, id, layer) {
                self.candidate(step, plane, id, CandidateVerdict::Rejected(rejection));
                continue;
            }

            let elapsed = self.kms.now().saturating_duration_since(self.started);
            if elapsed >= self.timeout {
                self.tracer.deadline(&DeadlineEvent {
                    plane_id: plane.id(),
                    elapsed,
                });
                break;
            }

            if let Err(why) = plane.stage_layer(layer, output.crtc_id(), req) {
                self.candidate(step, plane, id, CandidateVerdict::Incompatible(why));
                continue;
            }
            self.hints.push((id, plane.id()));

            // Rejected only after recording the hint, so the caller learns
            // which planes a scanout-capable buffer could use.
            let early = if layer.is_fb_composited() {
                Some(Incompatibility::ForcedComposition)
            } else if !plane.check_layer_fb(layer) {
                Some(Incompatibility::FbFormat)
            } else {
                None
            };
            if let Some(why) = early {
                req.set_cursor(cursor);
                self.candidate(step, plane, id, CandidateVerdict::Incompatible(why));
                continue;
            }

            let outcome = test_commit(
                &mut *self.kms,
                &mut *self.test_commits,
                &mut self.tracer,
                req,
                self.flags,
            )?;
            match outcome {
                TestOutcome::Passed => {
                    self.candidate(step, plane, id, CandidateVerdict::Accepted);
                    let next = self.next(step, Some(id));
                    self.choose(next, req)?;
                }
                TestOutcome::Incompatible(errno) => {
                    let why = Incompatibility::Kernel(errno);
                    self.candidate(step, plane, id, CandidateVerdict::Incompatible(why));
                }
            }
            req.set_cursor(cursor);
        }
        Ok(())
    }

    /// Terminal node: keep the allocation if it beats the best one.
    fn finish(&mut self, step: &Step) {
        if self.best_score.is_some_and(|best| step.score <= best) || !self.is_valid(step) {
            return;
        }
        self.best_score = Some(step.score);
        self.best.copy_from_slice(&self.alloc);
        self.tracer.best_allocation(&BestAllocationEvent {
            depth: step.plane_idx,
            score: step.score,
        });
    }

    /// With a composition layer, either every visible layer has a plane and
    /// composition is unused, or composition is used and some layer is left
    /// to it.
    fn is_valid(&self, step: &Step) -> bool {
        if self.output.composition_layer.is_some()
            && !step.composited
            && step.score != self.non_composition_len
        {
            return false;
        }
        !(step.composited && step.score == self.non_composition_len)
    }

    fn next(&mut self, step: &Step, layer: Option<LayerId>) -> Step {
        let planes = self.planes;
        let plane = &planes[step.plane_idx];
        self.alloc[step.plane_idx] = layer;
        let mut next = Step {
            plane_idx: step.plane_idx + 1,
            ..*step
        };
        let Some(id) = layer else {
            return next;
        };
        if self.output.composition_layer == Some(id) {
            debug_assert!(!step.composited, "composition layer placed twice");
            next.composited = true;
        } else {
            next.score += 1;
        }
        if let Some(zpos) = get(self.layers, id).and_then(Layer::zpos) {
            if plane.kind() == PlaneKind::Primary {
                next.primary_layer_zpos = zpos;
                next.primary_plane_zpos = plane.zpos();
            } else {
                next.last_layer_zpos = zpos;
            }
        }
        next
    }

    fn is_allocated(&self, step: &Step, id: LayerId) -> bool {
        self.alloc[..step.plane_idx].contains(&Some(id))
    }

    /// Planes before the current one that are not primary, with their layer.
    fn placed(&self, step: &Step) -> impl Iterator<Item = (&Plane, &Layer)> + '_ {
        self.planes[..step.plane_idx]
            .iter()
            .zip(&self.alloc)
            .filter(|(plane, _)| plane.kind() != PlaneKind::Primary)
            .filter_map(|(plane, slot)| Some((plane, get(self.layers, (*slot)?)?)))
    }

    fn rejection(&self, step: &Step, plane: &Plane, id: LayerId, layer: &Layer) -> Option<Rejection> {
        let overlay = plane.kind() != PlaneKind::Primary;
        if let Some(zpos) = layer.zpos() {
            // Planes are visited by descending zpos, so an intersecting layer
            // placed earlier is above this one.
            if zpos > step.last_layer_zpos
                && self.placed(step).any(|(_, other)| {
                    other.zpos().is_some_and(|o| zpos > o) && layer.intersects(other)
                })
            {
                return Some(Rejection::LayerZposAbove);
            }
            if zpos < step.last_layer_zpos
                && self.placed(step).any(|(other_plane, other)| {
                    plane.zpos() >= other_plane.zpos() && layer.intersects(other)
                })
            {
                return Some(Rejection::PlaneZposBelow);
            }
            if overlay && zpos < step.primary_layer_zpos && plane.zpos() > step.primary_plane_zpos {
                return Some(Rejection::UnderPrimary);
            }
        }
        if overlay && self.has_composited_layer_over(step, layer) {
            return Some(Rejection::CompositedLayerOver);
        }
        if overlay && self.output.composition_layer == Some(id) {
            return Some(Rejection::CompositionOnOverlay);
        }
        None
    }

    /// Whether a layer without a plane so far intersects `layer` from above.
    fn has_composited_layer_over(&self, step: &Step, layer: &Layer) -> bool {
        let Some(zpos) = layer.zpos() else {
            return false;
        };
        self.output.layers.iter().any(|&other_id| {
            !self.is_allocated(step, other_id)
                && get(self.layers, other_id).is_some_and(|other| {
                    other.zpos().is_some_and(|o| o > zpos) && layer.intersects(other)
                })
        })
    }

    fn candidate(&mut self, step: &Step, plane: &Plane, layer: LayerId, verdict: CandidateVerdict) {
        self.tracer.candidate(&CandidateEvent {
            depth: step.plane_idx,
            plane_id: plane.id(),
            layer,
            verdict,
        });
    }
}
