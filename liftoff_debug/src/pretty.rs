// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable event output.
//!
//! [`PrettyPrintSink`] writes one line per event, prefixed with the event
//! kind, e.g.:
//!
//! ```text
//! [apply]     OutputId(0@gen0) crtc=204 layers=3 t=1042.0µs
//! [candidate] depth=0 plane=31 LayerId(1@gen0) Accepted
//! [assign]    plane=31 -> LayerId(1@gen0)
//! [done]      OutputId(0@gen0) score=2 test_commits=4 elapsed=87.5µs
//! ```
//!
//! Write errors are ignored: diagnostics never fail an apply.

use std::fmt;
use std::io::{self, Write};

use liftoff_core::time::{Duration, Timebase};
use liftoff_core::trace::{
    ApplyBeginEvent, ApplyEndEvent, AssignmentEvent, BestAllocationEvent, CandidateEvent,
    DeadlineEvent, PriorityChangeEvent, ReuseEvent, Severity, TraceSink,
};

/// A [`TraceSink`] that writes one line per event to a [`Write`]r.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    timebase: Timebase,
    candidates: bool,
    debug_logs: bool,
}

impl<W: Write> fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("timebase", &self.timebase)
            .field("candidates", &self.candidates)
            .field("debug_logs", &self.debug_logs)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink writing to stderr.
    #[must_use]
    pub fn stderr(timebase: Timebase) -> Self {
        Self::new(Box::new(io::stderr()), timebase)
    }

    /// Creates a sink writing to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>, timebase: Timebase) -> Self {
        Self::with_writer(writer, timebase)
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink writing to `writer`, converting ticks with `timebase`.
    ///
    /// Candidate events and debug messages are printed; see
    /// [`quiet`](Self::quiet).
    #[must_use]
    pub fn with_writer(writer: W, timebase: Timebase) -> Self {
        Self {
            writer,
            timebase,
            candidates: true,
            debug_logs: true,
        }
    }

    /// Stops printing candidate events and debug messages.
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.candidates = false;
        self.debug_logs = false;
        self
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn micros(&self, ticks: u64) -> f64 {
        self.timebase.ticks_to_nanos(ticks) as f64 / 1000.0
    }

    fn duration(&self, d: Duration) -> f64 {
        self.micros(d.ticks())
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_apply_begin(&mut self, e: &ApplyBeginEvent) {
        let t = self.micros(e.timestamp.ticks());
        let _ = writeln!(
            self.writer,
            "[apply]     {:?} crtc={} layers={} t={t:.1}µs",
            e.output, e.crtc_id, e.layers,
        );
    }

    fn on_reuse(&mut self, e: &ReuseEvent) {
        let _ = writeln!(self.writer, "[reuse]     {:?} {:?}", e.output, e.outcome);
    }

    fn on_candidate(&mut self, e: &CandidateEvent) {
        if !self.candidates {
            return;
        }
        let _ = writeln!(
            self.writer,
            "[candidate] depth={} plane={} {:?} {:?}",
            e.depth, e.plane_id, e.layer, e.verdict,
        );
    }

    fn on_best_allocation(&mut self, e: &BestAllocationEvent) {
        let _ = writeln!(
            self.writer,
            "[best]      depth={} score={}",
            e.depth, e.score
        );
    }

    fn on_deadline(&mut self, e: &DeadlineEvent) {
        let elapsed = self.duration(e.elapsed);
        let _ = writeln!(
            self.writer,
            "[deadline]  plane={} elapsed={elapsed:.1}µs",
            e.plane_id,
        );
    }

    fn on_priority_change(&mut self, e: &PriorityChangeEvent) {
        let _ = writeln!(
            self.writer,
            "[priority]  {:?} {} -> {}",
            e.layer, e.old, e.new
        );
    }

    fn on_assignment(&mut self, e: &AssignmentEvent) {
        let _ = writeln!(
            self.writer,
            "[assign]    plane={} -> {:?}",
            e.plane_id, e.layer
        );
    }

    fn on_apply_end(&mut self, e: &ApplyEndEvent) {
        let elapsed = self.duration(e.elapsed);
        let score = match (e.reused, e.score) {
            (true, _) => "reused".to_string(),
            (false, Some(score)) => format!("score={score}"),
            (false, None) => "no allocation".to_string(),
        };
        let _ = writeln!(
            self.writer,
            "[done]      {:?} {score} test_commits={} elapsed={elapsed:.1}µs",
            e.output, e.test_commits,
        );
    }

    fn on_log(&mut self, severity: Severity, message: fmt::Arguments<'_>) {
        match severity {
            Severity::Error => {
                let _ = writeln!(self.writer, "[error]     {message}");
            }
            Severity::Debug if self.debug_logs => {
                let _ = writeln!(self.writer, "[debug]     {message}");
            }
            Severity::Debug => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use liftoff_core::config::ApplyOptions;
    use liftoff_core::device::Device;
    use liftoff_core::plane::PlaneKind;
    use liftoff_harness::{CRTC_ID, MockKms, add_layer, apply_and_commit};

    fn run(sink: PrettyPrintSink<Vec<u8>>) -> String {
        let mut kms = MockKms::new();
        let primary = kms.create_plane(PlaneKind::Primary);
        kms.create_plane(PlaneKind::Overlay);
        let setup = PrettyPrintSink::with_writer(Vec::new(), Timebase::NANOS);
        let mut device = Device::with_sink(kms, setup).unwrap();
        device.register_all_planes().unwrap();
        let output = device.create_output(CRTC_ID).unwrap();
        let id = add_layer(&mut device, output, 0, 0, 1920, 1080).unwrap();
        device.kms_mut().add_compatible_layer(primary, id);

        // Only the applies are of interest, not plane registration.
        *device.sink_mut() = sink;
        apply_and_commit(&mut device, output, &ApplyOptions::default()).unwrap();
        apply_and_commit(&mut device, output, &ApplyOptions::default()).unwrap();

        // Swap the sink out to get at its buffer.
        let sink = std::mem::replace(
            device.sink_mut(),
            PrettyPrintSink::with_writer(Vec::new(), Timebase::NANOS),
        );
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn one_line_per_event() {
        let text = run(PrettyPrintSink::with_writer(Vec::new(), Timebase::NANOS));
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].starts_with("[apply]"), "{text}");
        assert!(lines.iter().any(|l| l.starts_with("[candidate]")), "{text}");
        assert!(lines.iter().any(|l| l.starts_with("[assign]")), "{text}");
        assert!(lines.iter().any(|l| l.starts_with("[done]") && l.contains("score=1")), "{text}");
        assert!(lines.last().unwrap().starts_with("[done]"), "{text}");
        assert!(lines.last().unwrap().contains("reused"), "{text}");
    }

    #[test]
    fn quiet_skips_candidates_and_debug_messages() {
        let text = run(PrettyPrintSink::with_writer(Vec::new(), Timebase::NANOS).quiet());
        assert!(!text.contains("[candidate]"), "{text}");
        assert!(!text.contains("[debug]"), "{text}");
        assert!(text.contains("[assign]"), "{text}");
    }

    #[test]
    fn durations_use_the_timebase() {
        // One tick is one microsecond.
        let mut sink = PrettyPrintSink::with_writer(Vec::new(), Timebase::new(1000, 1));
        sink.on_deadline(&DeadlineEvent {
            plane_id: 31,
            elapsed: Duration(1500),
        });
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "[deadline]  plane=31 elapsed=1500.0µs\n");
    }
}
