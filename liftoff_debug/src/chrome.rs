// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads events from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Each apply becomes a duration slice on a thread named after its CRTC.
//! Everything else is an instant event inside that slice. Only the apply
//! boundaries carry a host timestamp; deadlines are placed at the apply's
//! start plus their elapsed time, and the remaining events at the start of
//! the apply they belong to.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use liftoff_core::time::Timebase;
use liftoff_core::trace::Severity;

use crate::recorder::RecordedEvent;

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Timestamps are converted to microseconds using the provided [`Timebase`].
pub fn export(
    events: &[RecordedEvent],
    timebase: Timebase,
    writer: &mut dyn Write,
) -> io::Result<()> {
    let mut out: Vec<Value> = Vec::new();
    // Start of the apply in progress, and its CRTC.
    let mut start = 0_u64;
    let mut tid = 0_u32;

    for recorded in events {
        match recorded {
            RecordedEvent::ApplyBegin(e) => {
                start = e.timestamp.ticks();
                tid = e.crtc_id;
                out.push(json!({
                    "ph": "B",
                    "name": "apply",
                    "cat": "Apply",
                    "ts": ticks_to_us(start, timebase),
                    "pid": 0,
                    "tid": tid,
                    "args": {
                        "output": e.output.index(),
                        "layers": e.layers,
                    }
                }));
            }
            RecordedEvent::Reuse(e) => {
                out.push(json!({
                    "ph": "i",
                    "name": "Reuse",
                    "cat": "Apply",
                    "ts": ticks_to_us(start, timebase),
                    "pid": 0,
                    "tid": tid,
                    "s": "t",
                    "args": {
                        "outcome": format!("{:?}", e.outcome),
                    }
                }));
            }
            RecordedEvent::Candidate(e) => {
                out.push(json!({
                    "ph": "i",
                    "name": "Candidate",
                    "cat": "Search",
                    "ts": ticks_to_us(start, timebase),
                    "pid": 0,
                    "tid": tid,
                    "s": "t",
                    "args": {
                        "depth": e.depth,
                        "plane": e.plane_id,
                        "layer": e.layer.index(),
                        "verdict": format!("{:?}", e.verdict),
                    }
                }));
            }
            RecordedEvent::BestAllocation(e) => {
                out.push(json!({
                    "ph": "i",
                    "name": "BestAllocation",
                    "cat": "Search",
                    "ts": ticks_to_us(start, timebase),
                    "pid": 0,
                    "tid": tid,
                    "s": "t",
                    "args": {
                        "depth": e.depth,
                        "score": e.score,
                    }
                }));
            }
            RecordedEvent::Deadline(e) => {
                out.push(json!({
                    "ph": "i",
                    "name": "Deadline",
                    "cat": "Search",
                    "ts": ticks_to_us(start.saturating_add(e.elapsed.ticks()), timebase),
                    "pid": 0,
                    "tid": tid,
                    "s": "t",
                    "args": {
                        "plane": e.plane_id,
                        "elapsed_us": ticks_to_us(e.elapsed.ticks(), timebase),
                    }
                }));
            }
            RecordedEvent::PriorityChange(e) => {
                out.push(json!({
                    "ph": "i",
                    "name": "PriorityChange",
                    "cat": "Priority",
                    "ts": ticks_to_us(start, timebase),
                    "pid": 0,
                    "tid": tid,
                    "s": "p",
                    "args": {
                        "layer": e.layer.index(),
                        "old": e.old,
                        "new": e.new,
                    }
                }));
            }
            RecordedEvent::Assignment(e) => {
                out.push(json!({
                    "ph": "i",
                    "name": "Assignment",
                    "cat": "Apply",
                    "ts": ticks_to_us(start, timebase),
                    "pid": 0,
                    "tid": tid,
                    "s": "t",
                    "args": {
                        "plane": e.plane_id,
                        "layer": e.layer.index(),
                    }
                }));
            }
            RecordedEvent::ApplyEnd(e) => {
                out.push(json!({
                    "ph": "E",
                    "name": "apply",
                    "cat": "Apply",
                    "ts": ticks_to_us(e.timestamp.ticks(), timebase),
                    "pid": 0,
                    "tid": tid,
                    "args": {
                        "reused": e.reused,
                        "score": e.score,
                        "test_commits": e.test_commits,
                    }
                }));
            }
            RecordedEvent::Log { severity, message } => {
                // Debug messages would drown the timeline.
                if *severity == Severity::Error {
                    out.push(json!({
                        "ph": "i",
                        "name": "Error",
                        "cat": "Log",
                        "ts": ticks_to_us(start, timebase),
                        "pid": 0,
                        "tid": tid,
                        "s": "t",
                        "args": {
                            "message": message,
                        }
                    }));
                }
            }
        }
    }

    serde_json::to_writer_pretty(writer, &out)?;
    Ok(())
}

fn ticks_to_us(ticks: u64, timebase: Timebase) -> f64 {
    timebase.ticks_to_nanos(ticks) as f64 / 1000.0
}
