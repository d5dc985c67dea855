#![forbid(unsafe_code)]

//! Host-driven execution of a tour over a [`HeadlessDocument`].
//!
//! [`HeadlessSession`] plays the browser's part: it owns the clock, runs
//! the document's scroll animation once per frame, and forwards the events
//! the document queued (scroll deliveries, transition ends) before each
//! frame, the way an event loop runs tasks before animation callbacks.

use core::time::Duration;

use waypoint_core::{
    Completion, EventDisposition, HostEvent, KeyInput, Step, TourError,
    TourOptions, TourOutcome,
};
use waypoint_runtime::{SequencerPhase, StepSequencer, Tour};

use crate::headless::HeadlessDocument;

/// Frame interval of a 60 Hz display, rounded down to whole milliseconds.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Deterministic monotonic clock advanced by the session.
#[derive(Debug, Default, Clone)]
pub struct DeterministicClock {
    now: Duration,
}

impl DeterministicClock {
    /// A clock at `0`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: Duration::ZERO,
        }
    }

    /// Jump to `now`. Moving backwards is ignored.
    pub fn set(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    /// Advance by `dt`.
    pub fn advance(&mut self, dt: Duration) {
        self.now = self.now.saturating_add(dt);
    }

    #[must_use]
    pub fn now(&self) -> Duration {
        self.now
    }
}

/// A tour over a [`HeadlessDocument`], driven frame by frame.
#[derive(Debug)]
pub struct HeadlessSession {
    tour: Tour<HeadlessDocument>,
    clock: DeterministicClock,
    interval: Duration,
}

impl HeadlessSession {
    /// Wrap a new tour. Nothing runs until [`start`](Self::start).
    pub fn new(document: HeadlessDocument, steps: Vec<Step>, options: TourOptions) -> Self {
        Self {
            tour: Tour::new(document, steps, options),
            clock: DeterministicClock::new(),
            interval: FRAME_INTERVAL,
        }
    }

    /// Use a frame interval other than [`FRAME_INTERVAL`].
    #[must_use]
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Start the tour and deliver anything the start queued.
    pub fn start(&mut self) -> Result<Completion, TourError> {
        let completion = self.tour.start();
        self.flush()?;
        Ok(completion)
    }

    /// Run one animation frame.
    pub fn frame(&mut self) -> Result<(), TourError> {
        self.clock.advance(self.interval);
        self.tour.host_mut().tick();
        self.flush()?;
        self.tour.handle(HostEvent::Frame {
            now: self.clock.now(),
        })?;
        Ok(())
    }

    /// Run `count` frames, stopping at the first error.
    pub fn run_frames(&mut self, count: usize) -> Result<(), TourError> {
        for _ in 0..count {
            self.frame()?;
        }
        Ok(())
    }

    /// Run frames until the active step is displayed or the tour ends.
    ///
    /// Returns the number of frames run, or `None` if `max_frames` ran out
    /// first.
    pub fn settle(&mut self, max_frames: usize) -> Result<Option<usize>, TourError> {
        for frames in 0..=max_frames {
            if self.is_displayed() || !self.tour.is_running() {
                return Ok(Some(frames));
            }
            if frames < max_frames {
                self.frame()?;
            }
        }
        Ok(None)
    }

    /// Press a key.
    pub fn press_key(&mut self, key: KeyInput) -> Result<EventDisposition, TourError> {
        self.tour.handle(HostEvent::KeyDown(key))
    }

    /// Press Escape.
    pub fn press_escape(&mut self) -> Result<EventDisposition, TourError> {
        self.press_key(KeyInput::escape())
    }

    /// Activate the displayed tip's control. Returns `false` when no tip
    /// is displayed.
    pub fn click_advance(&mut self) -> Result<bool, TourError> {
        let Some(tip) = self.tour.sequencer().and_then(StepSequencer::active_tip) else {
            return Ok(false);
        };
        self.tour.handle(HostEvent::AdvanceActivated { tip })?;
        Ok(true)
    }

    /// End all running transitions and deliver their transition-end events.
    pub fn finish_transitions(&mut self) -> Result<usize, TourError> {
        let ended = self.tour.host_mut().end_transitions();
        self.flush()?;
        Ok(ended)
    }

    /// Click the control, then let the tip's hide transition finish.
    pub fn advance(&mut self) -> Result<bool, TourError> {
        if !self.click_advance()? {
            return Ok(false);
        }
        self.finish_transitions()?;
        Ok(true)
    }

    /// Scroll the page as the user would and deliver the scroll events.
    pub fn scroll_to(&mut self, x: f64, y: f64) -> Result<(), TourError> {
        self.tour.host_mut().scroll_to(x, y);
        self.flush()
    }

    /// Observe advance signals fired outside of any dispatch.
    pub fn pump(&mut self) -> Result<(), TourError> {
        self.tour.pump()
    }

    fn flush(&mut self) -> Result<(), TourError> {
        for event in self.tour.host_mut().drain_events() {
            self.tour.handle(event)?;
        }
        Ok(())
    }

    /// Whether the active step's tip is displayed and waiting for advance.
    #[must_use]
    pub fn is_displayed(&self) -> bool {
        matches!(self.tour.phase(), SequencerPhase::AwaitingAdvance(_))
    }

    #[must_use]
    pub fn phase(&self) -> SequencerPhase {
        self.tour.phase()
    }

    #[must_use]
    pub fn outcome(&self) -> Option<TourOutcome> {
        self.tour.completion().outcome()
    }

    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    #[must_use]
    pub fn document(&self) -> &HeadlessDocument {
        self.tour.host()
    }

    pub fn document_mut(&mut self) -> &mut HeadlessDocument {
        self.tour.host_mut()
    }

    #[must_use]
    pub fn tour(&self) -> &Tour<HeadlessDocument> {
        &self.tour
    }

    pub fn tour_mut(&mut self) -> &mut Tour<HeadlessDocument> {
        &mut self.tour
    }
}

/// Walk a whole tour: settle and advance each step in turn.
///
/// Stops at the first error or after `max_frames_per_step` without a
/// displayed step.
pub fn walk(session: &mut HeadlessSession, max_frames_per_step: usize) -> Result<(), TourError> {
    while session.tour().is_running() {
        if session.settle(max_frames_per_step)?.is_none() {
            break;
        }
        if !session.advance()? {
            break;
        }
    }
    Ok(())
}
