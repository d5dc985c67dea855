#![forbid(unsafe_code)]

//! Core data model for Waypoint guided tours.
//!
//! Everything in this crate is host-agnostic: document geometry, tooltip
//! placement math, the step model, tour options, error types, host events,
//! and the single-resolution signals that connect the sequencer to callers.
//! No DOM or windowing types appear here; see `waypoint-backend` for the
//! host capability traits.

pub mod error;
pub mod event;
pub mod geometry;
pub mod options;
pub mod placement;
pub mod signal;
pub mod step;

pub use error::TourError;
pub use event::{ArtifactId, EventDisposition, HostEvent, KeyInput, ListenerKind};
pub use geometry::{BoxSize, ClientRect, DocRect, ScrollOffset};
pub use options::{OptionsError, TourOptions};
pub use placement::{Side, SideParseError, TipAnchor};
pub use signal::{AdvancePayload, AdvanceSignal, Completion, TourEnd, TourOutcome};
pub use step::{OnCreate, OnNext, Step, StepDef, StepSequence};
