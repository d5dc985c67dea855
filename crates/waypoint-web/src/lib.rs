#![forbid(unsafe_code)]

//! Hosts for Waypoint guided tours.
//!
//! - [`HeadlessDocument`]: an in-memory document implementing
//!   [`TourHost`](waypoint_backend::TourHost), deterministic down to the
//!   scroll animation.
//! - [`HeadlessSession`]: drives a tour over a headless document frame by
//!   frame, playing the browser's event loop.
//! - On `wasm32`, `Tutorial`: a `wasm-bindgen` class backed by the real DOM
//!   whose `start()` returns a `Promise`.

pub mod headless;
pub mod session;

#[cfg(target_arch = "wasm32")]
mod dom;

#[cfg(target_arch = "wasm32")]
pub use dom::Tutorial;

pub use headless::{Artifact, ArtifactKind, HeadlessDocument, NodeId};
pub use session::{DeterministicClock, FRAME_INTERVAL, HeadlessSession, walk};
