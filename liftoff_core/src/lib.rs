// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hardware display-plane allocation for atomic KMS compositors.
//!
//! `liftoff_core` decides which compositor layers can be scanned out directly
//! by hardware planes and which ones must be composited by the GPU. It is
//! `no_std` compatible (with `alloc`) and reaches the kernel only through the
//! [`Kms`](kms::Kms) trait, so the same allocator drives a real DRM device and
//! the in-memory mock used by the test harness.
//!
//! # Architecture
//!
//! ```text
//!   Kms (kernel seam)
//!       │  enumeration
//!       ▼
//!   Device ──► Plane list (fixed traversal order)
//!       │
//!       ├──► Output (one per CRTC) ──► Layer list (priority order)
//!       │
//!       ▼
//!   Device::apply() ──► reuse fast path ──► backtracking search
//!                              │                    │
//!                              └───► Request ◄──────┘
//!                                       │
//!                                       ▼
//!                              caller's real commit
//! ```
//!
//! **[`device`]** — The [`Device`](device::Device) arena owning planes,
//! outputs and layers. Plane↔layer links are generational handles kept
//! mutually consistent at a single mutation site.
//!
//! **[`allocator`]** — `Device::apply()`: priority bookkeeping, the reuse
//! fast path and the zpos-aware backtracking search with pruning and a
//! deadline.
//!
//! **[`layer`]**, **[`plane`]**, **[`output`]** — the three entity types.
//!
//! **[`prop`]** — The per-layer property bag with previous-value tracking
//! and an O(1) index for well-known property names.
//!
//! **[`kms`]** — The [`Kms`](kms::Kms) trait and the kernel-facing data
//! types; **[`request`]** is the staged atomic request builder.
//!
//! **[`format`]** — Decoding of the kernel `IN_FORMATS` blob.
//!
//! **[`trace`]** — [`TraceSink`](trace::TraceSink) trait and allocation
//! events, with the zero-overhead [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

mod arena;

pub mod allocator;
pub mod config;
pub mod device;
pub mod error;
pub mod format;
pub mod kms;
pub mod layer;
pub mod output;
pub mod plane;
pub mod prop;
pub mod request;
pub mod time;
pub mod trace;
