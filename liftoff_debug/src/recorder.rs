// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory event recording.
//!
//! [`RecorderSink`] implements [`TraceSink`] and keeps every event it
//! receives, in order, as a [`RecordedEvent`]. Log messages are formatted
//! eagerly since their arguments borrow from the allocator.

use std::fmt;

use liftoff_core::trace::{
    ApplyBeginEvent, ApplyEndEvent, AssignmentEvent, BestAllocationEvent, CandidateEvent,
    DeadlineEvent, PriorityChangeEvent, ReuseEvent, Severity, TraceSink,
};

/// A recorded allocator event.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// An [`ApplyBeginEvent`].
    ApplyBegin(ApplyBeginEvent),
    /// A [`ReuseEvent`].
    Reuse(ReuseEvent),
    /// A [`CandidateEvent`].
    Candidate(CandidateEvent),
    /// A [`BestAllocationEvent`].
    BestAllocation(BestAllocationEvent),
    /// A [`DeadlineEvent`].
    Deadline(DeadlineEvent),
    /// A [`PriorityChangeEvent`].
    PriorityChange(PriorityChangeEvent),
    /// An [`AssignmentEvent`].
    Assignment(AssignmentEvent),
    /// An [`ApplyEndEvent`].
    ApplyEnd(ApplyEndEvent),
    /// A free-form message.
    Log {
        /// Importance.
        severity: Severity,
        /// The formatted message.
        message: String,
    },
}

/// A [`TraceSink`] that stores every event in memory.
#[derive(Debug, Default)]
pub struct RecorderSink {
    events: Vec<RecordedEvent>,
    skip_debug_logs: bool,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops [`Severity::Debug`] messages instead of recording them.
    ///
    /// The search logs a line per staged property, which dominates long
    /// recordings.
    #[must_use]
    pub fn without_debug_logs(mut self) -> Self {
        self.skip_debug_logs = true;
        self
    }

    /// Returns the recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    /// Consumes the recorder and returns the recorded events.
    #[must_use]
    pub fn into_events(self) -> Vec<RecordedEvent> {
        self.events
    }

    /// Forgets everything recorded so far.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl TraceSink for RecorderSink {
    fn on_apply_begin(&mut self, e: &ApplyBeginEvent) {
        self.events.push(RecordedEvent::ApplyBegin(*e));
    }

    fn on_reuse(&mut self, e: &ReuseEvent) {
        self.events.push(RecordedEvent::Reuse(*e));
    }

    fn on_candidate(&mut self, e: &CandidateEvent) {
        self.events.push(RecordedEvent::Candidate(*e));
    }

    fn on_best_allocation(&mut self, e: &BestAllocationEvent) {
        self.events.push(RecordedEvent::BestAllocation(*e));
    }

    fn on_deadline(&mut self, e: &DeadlineEvent) {
        self.events.push(RecordedEvent::Deadline(*e));
    }

    fn on_priority_change(&mut self, e: &PriorityChangeEvent) {
        self.events.push(RecordedEvent::PriorityChange(*e));
    }

    fn on_assignment(&mut self, e: &AssignmentEvent) {
        self.events.push(RecordedEvent::Assignment(*e));
    }

    fn on_apply_end(&mut self, e: &ApplyEndEvent) {
        self.events.push(RecordedEvent::ApplyEnd(*e));
    }

    fn on_log(&mut self, severity: Severity, message: fmt::Arguments<'_>) {
        if severity == Severity::Debug && self.skip_debug_logs {
            return;
        }
        self.events.push(RecordedEvent::Log {
            severity,
            message: message.to_string(),
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
