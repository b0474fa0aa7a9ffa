// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scenario tests driving the allocator through [`MockKms`].

use alloc::vec::Vec;
use core::fmt;

use liftoff_core::config::ApplyOptions;
use liftoff_core::device::Device;
use liftoff_core::layer::LayerId;
use liftoff_core::output::OutputId;
use liftoff_core::trace::{
    AssignmentEvent, CandidateEvent, DeadlineEvent, PriorityChangeEvent, ReuseEvent, ReuseOutcome,
    Severity, TraceSink,
};

use crate::{CRTC_ID, MockKms, add_layer, apply_and_commit};

mod deadline;
mod dynamic;
mod outputs;
mod prop;

/// Records the allocator events the scenarios assert on.
#[derive(Default)]
struct Events {
    reuse: Vec<ReuseOutcome>,
    candidates: Vec<CandidateEvent>,
    deadlines: Vec<DeadlineEvent>,
    priority_changes: Vec<PriorityChangeEvent>,
    assignments: Vec<AssignmentEvent>,
    errors: usize,
}

impl TraceSink for Events {
    fn on_reuse(&mut self, e: &ReuseEvent) {
        self.reuse.push(e.outcome);
    }

    fn on_candidate(&mut self, e: &CandidateEvent) {
        self.candidates.push(*e);
    }

    fn on_deadline(&mut self, e: &DeadlineEvent) {
        self.deadlines.push(*e);
    }

    fn on_priority_change(&mut self, e: &PriorityChangeEvent) {
        self.priority_changes.push(*e);
    }

    fn on_assignment(&mut self, e: &AssignmentEvent) {
        self.assignments.push(*e);
    }

    fn on_log(&mut self, severity: Severity, _message: fmt::Arguments<'_>) {
        if severity == Severity::Error {
            self.errors += 1;
        }
    }
}

fn device(kms: MockKms) -> Device<MockKms> {
    let mut device = Device::new(kms).unwrap();
    device.register_all_planes().unwrap();
    device
}

fn traced_device(kms: MockKms) -> Device<MockKms, Events> {
    let mut device = Device::with_sink(kms, Events::default()).unwrap();
    device.register_all_planes().unwrap();
    device
}

fn output<S: TraceSink>(device: &mut Device<MockKms, S>) -> OutputId {
    device.create_output(CRTC_ID).unwrap()
}

fn layer<S: TraceSink>(
    device: &mut Device<MockKms, S>,
    output: OutputId,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
) -> LayerId {
    add_layer(device, output, x, y, width, height).unwrap()
}

fn commit<S: TraceSink>(device: &mut Device<MockKms, S>, output: OutputId) {
    apply_and_commit(device, output, &ApplyOptions::default()).unwrap();
}
