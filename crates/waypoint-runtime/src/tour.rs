#![forbid(unsafe_code)]

//! The tour controller.
//!
//! [`Tour`] owns the host, the overlay container, and the three listener
//! registrations for the lifetime of one run. It dispatches host events to
//! the [`StepSequencer`] and resolves the run's [`Completion`] exactly once.
//!
//! # Lifecycle
//!
//! ```text
//! new ─► start ─► (handle/pump)* ─► Finished | Cancelled | Err(TargetNotFound)
//!  │
//!  └─ empty steps ─► inert: start resolves Ok(Inert), host untouched
//! ```
//!
//! Every terminal path detaches all listeners and removes the container.

use core::fmt;

use waypoint_backend::TourHost;
use waypoint_core::{
    Completion, EventDisposition, HostEvent, ListenerKind, Step, StepDef, StepSequence, TourEnd,
    TourError, TourOptions, TourOutcome,
};

use crate::sequencer::{SequencerPhase, StepFlow, StepSequencer};

/// A guided tour over a host document.
pub struct Tour<H: TourHost> {
    host: H,
    options: TourOptions,
    /// `None` when the tour was created with no steps.
    sequencer: Option<StepSequencer<H>>,
    listeners: Vec<ListenerKind>,
    completion: Completion,
    started: bool,
}

impl<H: TourHost> Tour<H> {
    /// Create a tour. Nothing touches the host until [`start`](Self::start).
    ///
    /// An empty `steps` logs an error and yields an inert tour.
    pub fn new(host: H, steps: Vec<Step>, options: TourOptions) -> Self {
        for problem in options.validate() {
            tracing::warn!(message = "tour.options.invalid", problem = %problem);
        }
        let sequencer = match StepSequence::new(steps) {
            Ok(steps) => {
                tracing::debug!(message = "tour.create", steps = steps.len());
                Some(StepSequencer::new(steps, options.clone()))
            }
            Err(err) => {
                tracing::error!(message = "tour.create.rejected", error = %err);
                None
            }
        };
        Self {
            host,
            options,
            sequencer,
            listeners: Vec::new(),
            completion: Completion::new(),
            started: false,
        }
    }

    /// Create a tour from serialized step definitions.
    pub fn from_defs(host: H, defs: Vec<StepDef>, options: TourOptions) -> Self {
        let side = options.default_position;
        let steps = defs
            .into_iter()
            .map(|def| Step::from_def(def, side))
            .collect();
        Self::new(host, steps, options)
    }

    /// Start the tour and return its completion.
    ///
    /// Creates the overlay container, attaches the keydown and reflow
    /// listeners, and begins step 0. Calling `start` again returns the same
    /// completion without restarting.
    pub fn start(&mut self) -> Completion {
        if self.started {
            tracing::warn!(message = "tour.start.repeated");
            return self.completion.clone();
        }
        self.started = true;

        let Some(sequencer) = self.sequencer.as_mut() else {
            tracing::debug!(message = "tour.start.inert");
            self.completion.resolve(Ok(TourEnd::Inert));
            return self.completion.clone();
        };

        tracing::info!(message = "tour.start", steps = sequencer.steps().len());
        self.host.create_container();
        for listener in ListenerKind::ALL {
            self.host.attach(listener);
            self.listeners.push(listener);
        }
        let flow = sequencer.begin(&mut self.host);
        // The completion carries the failure to the caller.
        if let Err(err) = self.conclude(flow) {
            tracing::warn!(message = "tour.start.failed", error = %err);
        }
        self.completion.clone()
    }

    /// Deliver one host event.
    ///
    /// Returns whether the native event was consumed. An `Err` means the
    /// tour just failed; the completion resolves with the same error.
    pub fn handle(&mut self, event: HostEvent) -> Result<EventDisposition, TourError> {
        if !self.is_running() {
            return Ok(EventDisposition::Pass);
        }
        let Some(sequencer) = self.sequencer.as_mut() else {
            return Ok(EventDisposition::Pass);
        };

        let flow = match event {
            HostEvent::KeyDown(key) => {
                if self.listeners.contains(&ListenerKind::KeyDown)
                    && self.options.is_cancel_key(&key)
                {
                    tracing::info!(message = "tour.cancel", key_code = key.code);
                    self.finish(Ok(TourEnd::Cancelled));
                    return Ok(EventDisposition::Consumed);
                }
                return Ok(EventDisposition::Pass);
            }
            HostEvent::Frame { now } => sequencer.on_frame(&mut self.host, now),
            HostEvent::Scroll { listener } => {
                if listener.is_reflow() && self.listeners.contains(&listener) {
                    sequencer.reflow(&mut self.host, listener);
                }
                Ok(StepFlow::Running)
            }
            HostEvent::AdvanceActivated { tip } => {
                sequencer.activate(tip);
                Ok(StepFlow::Running)
            }
            HostEvent::TransitionEnd { artifact } => {
                sequencer.transition_end(&mut self.host, artifact)
            }
        };
        self.conclude(flow)?;
        self.pump()?;
        Ok(EventDisposition::Pass)
    }

    /// Observe advance signals fired outside of event dispatch, e.g. by an
    /// `on_next` callback that kept its signal for later.
    pub fn pump(&mut self) -> Result<(), TourError> {
        if !self.is_running() {
            return Ok(());
        }
        if let Some(sequencer) = self.sequencer.as_mut() {
            sequencer.poll_advance(&mut self.host);
        }
        Ok(())
    }

    /// Cancel a running tour. Same as pressing the cancel key.
    pub fn cancel(&mut self) {
        if self.is_running() {
            tracing::info!(message = "tour.cancel", key_code = 0_u32);
            self.finish(Ok(TourEnd::Cancelled));
        }
    }

    fn conclude(&mut self, flow: Result<StepFlow, TourError>) -> Result<(), TourError> {
        match flow {
            Ok(StepFlow::Running) => Ok(()),
            Ok(StepFlow::Exhausted) => {
                tracing::info!(message = "tour.finish");
                self.finish(Ok(TourEnd::Finished));
                Ok(())
            }
            Err(err) => {
                self.finish(Err(err.clone()));
                Err(err)
            }
        }
    }

    fn finish(&mut self, outcome: TourOutcome) {
        if !self.completion.resolve(outcome) {
            return;
        }
        for listener in self.listeners.drain(..) {
            self.host.detach(listener);
        }
        self.host.remove_container();
        if let Some(sequencer) = self.sequencer.as_mut() {
            sequencer.abandon();
        }
    }

    /// Whether `start` has run and the completion is still pending.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.started && !self.completion.is_settled()
    }

    /// Whether the tour was created with no steps.
    #[must_use]
    pub fn is_inert(&self) -> bool {
        self.sequencer.is_none()
    }

    /// Current sequencer phase. An inert tour reports `Idle` until started.
    #[must_use]
    pub fn phase(&self) -> SequencerPhase {
        match &self.sequencer {
            Some(sequencer) => sequencer.phase(),
            None if self.started => SequencerPhase::Complete,
            None => SequencerPhase::Idle,
        }
    }

    /// Index of the active step.
    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.phase().index()
    }

    /// The run's completion. Pending until `start` and a terminal event.
    #[must_use]
    pub fn completion(&self) -> Completion {
        self.completion.clone()
    }

    /// Listeners currently attached, in attach order.
    #[must_use]
    pub fn attached_listeners(&self) -> &[ListenerKind] {
        &self.listeners
    }

    /// Active options.
    #[must_use]
    pub fn options(&self) -> &TourOptions {
        &self.options
    }

    /// The sequencer, when the tour has steps.
    #[must_use]
    pub fn sequencer(&self) -> Option<&StepSequencer<H>> {
        self.sequencer.as_ref()
    }

    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Consume the tour and return the host.
    #[must_use]
    pub fn into_host(self) -> H {
        self.host
    }
}

impl<H: TourHost> fmt::Debug for Tour<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tour")
            .field("phase", &self.phase())
            .field("started", &self.started)
            .field("listeners", &self.listeners)
            .field("completion", &self.completion)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;
    use waypoint_backend::{DocumentGeometry, ListenerRegistry, OverlayRenderer, TooltipRequest};
    use waypoint_core::{
        ArtifactId, BoxSize, ClientRect, DocRect, KeyInput, ScrollOffset, Side, TipAnchor,
    };

    /// Tracks the container, listeners, and live artifacts.
    #[derive(Debug, Default)]
    struct LedgerHost {
        missing: Vec<String>,
        container: bool,
        containers_created: u32,
        listeners: Vec<ListenerKind>,
        artifacts: Vec<ArtifactId>,
        hidden: Vec<ArtifactId>,
    }

    impl DocumentGeometry for LedgerHost {
        type Element = String;

        fn query_selector(&self, selector: &str) -> Option<String> {
            (!self.missing.iter().any(|m| m == selector)).then(|| selector.to_owned())
        }

        fn client_rect(&self, _element: &String) -> ClientRect {
            ClientRect::new(10.0, 10.0, 10.0, 10.0)
        }

        fn border_box(&self, _element: &String) -> BoxSize {
            BoxSize::new(10.0, 10.0)
        }

        fn scroll_offset(&self) -> ScrollOffset {
            ScrollOffset::default()
        }

        fn scroll_into_view_centered(&mut self, _element: &String) {}
    }

    impl OverlayRenderer for LedgerHost {
        fn create_container(&mut self) {
            self.container = true;
            self.containers_created += 1;
        }

        fn remove_container(&mut self) {
            self.container = false;
            self.artifacts.clear();
        }

        fn create_highlight(&mut self, id: ArtifactId, _rect: DocRect, _target: &String) {
            self.artifacts.push(id);
        }

        fn create_tooltip(&mut self, id: ArtifactId, _request: &TooltipRequest<'_>) {
            self.artifacts.push(id);
        }

        fn measure(&self, _id: ArtifactId) -> BoxSize {
            BoxSize::new(50.0, 20.0)
        }

        fn move_highlight(&mut self, _id: ArtifactId, _rect: DocRect) {}

        fn move_tooltip(&mut self, _id: ArtifactId, _side: Side, _anchor: TipAnchor) {}

        fn set_visible(&mut self, id: ArtifactId, visible: bool) {
            if !visible {
                self.hidden.push(id);
            }
        }

        fn destroy(&mut self, id: ArtifactId) {
            self.artifacts.retain(|a| *a != id);
        }
    }

    impl ListenerRegistry for LedgerHost {
        fn attach(&mut self, listener: ListenerKind) {
            self.listeners.push(listener);
        }

        fn detach(&mut self, listener: ListenerKind) {
            self.listeners.retain(|l| *l != listener);
        }
    }

    fn quick() -> TourOptions {
        TourOptions {
            settle_samples: 1,
            settle_delay_ms: 0,
            ..TourOptions::default()
        }
    }

    fn frames(tour: &mut Tour<LedgerHost>, count: u32) {
        for n in 0..count {
            let now = Duration::from_millis(16) * n;
            tour.handle(HostEvent::Frame { now }).expect("frame");
        }
    }

    fn advance(tour: &mut Tour<LedgerHost>) -> Result<EventDisposition, TourError> {
        let tip = tour
            .sequencer()
            .and_then(StepSequencer::active_tip)
            .expect("tip displayed");
        tour.handle(HostEvent::AdvanceActivated { tip })?;
        tour.handle(HostEvent::TransitionEnd { artifact: tip })
    }

    fn assert_clean(host: &LedgerHost) {
        assert!(!host.container);
        assert!(host.listeners.is_empty());
        assert!(host.artifacts.is_empty());
    }

    #[test]
    fn two_step_tour_finishes_and_cleans_up() {
        let mut tour = Tour::new(
            LedgerHost::default(),
            vec![Step::new("#a"), Step::new("#b")],
            quick(),
        );
        let completion = tour.start();
        assert_eq!(tour.host().listeners, ListenerKind::ALL.to_vec());
        assert_eq!(tour.phase(), SequencerPhase::Settling(0));

        frames(&mut tour, 3);
        assert_eq!(tour.phase(), SequencerPhase::AwaitingAdvance(0));
        assert_eq!(tour.host().artifacts.len(), 2);

        advance(&mut tour).expect("advance 0");
        assert_eq!(tour.phase(), SequencerPhase::Settling(1));
        assert!(tour.host().artifacts.is_empty());

        frames(&mut tour, 3);
        advance(&mut tour).expect("advance 1");

        assert_eq!(completion.outcome(), Some(Ok(TourEnd::Finished)));
        assert_eq!(tour.phase(), SequencerPhase::Complete);
        assert_clean(tour.host());
    }

    #[test]
    fn escape_cancels_mid_step_and_is_consumed() {
        let mut tour = Tour::new(LedgerHost::default(), vec![Step::new("#a")], quick());
        let completion = tour.start();
        frames(&mut tour, 3);

        let disposition = tour.handle(HostEvent::KeyDown(KeyInput::escape()));
        assert_eq!(disposition, Ok(EventDisposition::Consumed));
        assert_eq!(completion.outcome(), Some(Ok(TourEnd::Cancelled)));
        assert_clean(tour.host());

        // Anything after the end is passed through untouched.
        let late = tour.handle(HostEvent::KeyDown(KeyInput::escape()));
        assert_eq!(late, Ok(EventDisposition::Pass));
    }

    #[test]
    fn other_keys_pass_through() {
        let mut tour = Tour::new(LedgerHost::default(), vec![Step::new("#a")], quick());
        tour.start();
        let disposition = tour.handle(HostEvent::KeyDown(KeyInput::new(13, "Enter")));
        assert_eq!(disposition, Ok(EventDisposition::Pass));
        assert!(tour.is_running());
    }

    #[test]
    fn missing_first_target_fails_start() {
        let host = LedgerHost {
            missing: vec!["#gone".into()],
            ..LedgerHost::default()
        };
        let mut tour = Tour::new(host, vec![Step::new("#gone")], quick());
        let completion = tour.start();

        let outcome = completion.outcome().expect("settled");
        assert_eq!(outcome.unwrap_err().step_index(), Some(0));
        assert_clean(tour.host());
    }

    #[test]
    fn empty_tour_is_inert() {
        let mut tour = Tour::new(LedgerHost::default(), Vec::new(), quick());
        assert!(tour.is_inert());
        assert_eq!(tour.phase(), SequencerPhase::Idle);

        let completion = tour.start();
        assert_eq!(completion.outcome(), Some(Ok(TourEnd::Inert)));
        assert_eq!(tour.host().containers_created, 0);
        assert!(tour.host().listeners.is_empty());
        assert_eq!(tour.phase(), SequencerPhase::Complete);
    }

    #[test]
    fn second_start_returns_the_same_run() {
        let mut tour = Tour::new(LedgerHost::default(), vec![Step::new("#a")], quick());
        let first = tour.start();
        let second = tour.start();
        assert_eq!(tour.host().containers_created, 1);
        assert_eq!(tour.host().listeners.len(), 3);

        tour.cancel();
        assert_eq!(first.outcome(), second.outcome());
    }

    #[test]
    fn events_before_start_are_ignored() {
        let mut tour = Tour::new(LedgerHost::default(), vec![Step::new("#a")], quick());
        let disposition = tour.handle(HostEvent::KeyDown(KeyInput::escape()));
        assert_eq!(disposition, Ok(EventDisposition::Pass));
        assert!(!tour.completion().is_settled());
    }

    #[test]
    fn pump_observes_a_deferred_signal() {
        let kept = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&kept);
        let step = Step::new("#a").on_next(move |_, _, signal| {
            *slot.borrow_mut() = Some(signal);
        });
        let mut tour = Tour::new(LedgerHost::default(), vec![step], quick());
        tour.start();
        frames(&mut tour, 3);
        let tip = tour.sequencer().and_then(StepSequencer::active_tip).expect("tip");
        tour.handle(HostEvent::AdvanceActivated { tip }).expect("activate");
        assert_eq!(tour.phase(), SequencerPhase::AwaitingAdvance(0));

        let signal = kept.borrow_mut().take().expect("signal kept");
        signal.advance();
        tour.pump().expect("pump");
        assert_eq!(tour.phase(), SequencerPhase::TearingDown(0));
        assert_eq!(tour.host().hidden, vec![tip]);
    }

    #[test]
    fn from_defs_applies_default_position() {
        let defs = vec![StepDef {
            target: "#a".into(),
            content: "<b>hi</b>".into(),
            position: None,
        }];
        let options = TourOptions {
            default_position: Side::Left,
            ..quick()
        };
        let tour = Tour::from_defs(LedgerHost::default(), defs, options);
        let step = tour
            .sequencer()
            .and_then(|s| s.steps().get(0))
            .expect("one step");
        assert_eq!(step.side(), Some(Side::Left));
        assert_eq!(step.content_str(), "<b>hi</b>");
    }
}
