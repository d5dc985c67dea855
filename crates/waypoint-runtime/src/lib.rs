#![forbid(unsafe_code)]

//! Host-driven runtime for Waypoint guided tours.
//!
//! Design goals:
//! - **Host-driven I/O**: the embedding environment pushes [`HostEvent`]s
//!   (animation frames, keys, scroll, control activation, transition end).
//! - **Deterministic time**: frames carry the host's monotonic clock; the
//!   runtime never reads a clock itself.
//! - **Explicit suspension**: every wait is a named sequencer state, so
//!   cancellation is a plain transition rather than a side effect.
//!
//! [`Tour`] is the entry point. [`StepSequencer`] and [`ScrollSettler`] are
//! exposed for hosts that want to drive the pieces themselves.
//!
//! [`HostEvent`]: waypoint_core::HostEvent

pub mod geometry;
pub mod sequencer;
pub mod settle;
pub mod tour;

pub use geometry::rectangle_of;
pub use sequencer::{SequencerPhase, StepFlow, StepSequencer};
pub use settle::{ScrollSettler, SettleProgress};
pub use tour::Tour;
