#![forbid(unsafe_code)]

//! The step sequencer.
//!
//! Drives one step at a time through
//! `Settling(i) -> Rendering(i) -> AwaitingAdvance(i) -> TearingDown(i)`
//! and on to `i + 1`, ending in `Complete`. Each state is a suspension point
//! that only a specific host event can move past:
//!
//! | State             | Resumed by                                  |
//! |-------------------|---------------------------------------------|
//! | `Settling`        | animation frames (scroll sampling + delay)  |
//! | `AwaitingAdvance` | the step's advance signal firing            |
//! | `TearingDown`     | the tip's transition-end event              |
//!
//! `Rendering` is synchronous: it starts and finishes inside the frame that
//! observed the scroll settling.
//!
//! The sequencer owns the pulse/tip pair of the active step. It never
//! removes the overlay container; when the tour is abandoned mid-step the
//! container removal done by [`Tour`](crate::Tour) reclaims the artifacts.

use core::fmt;
use core::time::Duration;

use waypoint_backend::{TooltipRequest, TourHost};
use waypoint_core::{
    AdvancePayload, AdvanceSignal, ArtifactId, ListenerKind, Step, StepSequence, TourError,
    TourOptions,
};

use crate::geometry::rectangle_of;
use crate::settle::{ScrollSettler, SettleProgress};

/// Observable sequencer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerPhase {
    /// Not started.
    Idle,
    /// Waiting for the scroll to settle on step `i`.
    Settling(usize),
    /// Creating step `i`'s artifacts.
    Rendering(usize),
    /// Step `i` is displayed; waiting for its advance signal.
    AwaitingAdvance(usize),
    /// Step `i`'s tip is hiding; waiting for its transition to end.
    TearingDown(usize),
    /// Exhausted, cancelled, or failed.
    Complete,
}

impl SequencerPhase {
    /// Step index of the phase, if a step is active.
    #[must_use]
    pub const fn index(self) -> Option<usize> {
        match self {
            Self::Settling(i)
            | Self::Rendering(i)
            | Self::AwaitingAdvance(i)
            | Self::TearingDown(i) => Some(i),
            Self::Idle | Self::Complete => None,
        }
    }
}

/// Whether the sequence still has work after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepFlow {
    /// A step is active (or the call was a no-op).
    Running,
    /// The last step was torn down; the sequence is exhausted.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Overlay {
    pulse: ArtifactId,
    tip: ArtifactId,
}

#[derive(Debug)]
enum Stage {
    Settling(ScrollSettler),
    Awaiting {
        overlay: Overlay,
        signal: AdvanceSignal,
    },
    TearingDown {
        overlay: Overlay,
        payload: Option<AdvancePayload>,
    },
}

struct ActiveStep<E> {
    index: usize,
    /// Target resolved at step start; reflow re-measures this handle.
    target: E,
    stage: Stage,
}

enum State<E> {
    Idle,
    Active(ActiveStep<E>),
    Complete,
}

/// Step-by-step state machine over a [`TourHost`].
pub struct StepSequencer<H: TourHost> {
    steps: StepSequence,
    options: TourOptions,
    state: State<H::Element>,
    next_artifact: u64,
}

impl<H: TourHost> StepSequencer<H> {
    /// Create an idle sequencer.
    #[must_use]
    pub fn new(steps: StepSequence, options: TourOptions) -> Self {
        Self {
            steps,
            options,
            state: State::Idle,
            next_artifact: 1,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> SequencerPhase {
        match &self.state {
            State::Idle => SequencerPhase::Idle,
            State::Complete => SequencerPhase::Complete,
            State::Active(active) => match active.stage {
                Stage::Settling(_) => SequencerPhase::Settling(active.index),
                Stage::Awaiting { .. } => SequencerPhase::AwaitingAdvance(active.index),
                Stage::TearingDown { .. } => SequencerPhase::TearingDown(active.index),
            },
        }
    }

    /// The steps being sequenced.
    #[must_use]
    pub fn steps(&self) -> &StepSequence {
        &self.steps
    }

    /// The active step's tip, while it exists.
    #[must_use]
    pub fn active_tip(&self) -> Option<ArtifactId> {
        self.active_overlay().map(|overlay| overlay.tip)
    }

    /// The active step's pulse, while it exists.
    #[must_use]
    pub fn active_pulse(&self) -> Option<ArtifactId> {
        self.active_overlay().map(|overlay| overlay.pulse)
    }

    fn active_overlay(&self) -> Option<Overlay> {
        let State::Active(active) = &self.state else {
            return None;
        };
        match &active.stage {
            Stage::Awaiting { overlay, .. } | Stage::TearingDown { overlay, .. } => Some(*overlay),
            Stage::Settling(_) => None,
        }
    }

    /// Begin step 0. No-op unless idle.
    pub fn begin(&mut self, host: &mut H) -> Result<StepFlow, TourError> {
        if !matches!(self.state, State::Idle) {
            tracing::warn!(message = "tour.sequence.already_started");
            return Ok(StepFlow::Running);
        }
        self.begin_step(host, 0, None)
    }

    fn begin_step(
        &mut self,
        host: &mut H,
        index: usize,
        previous: Option<AdvancePayload>,
    ) -> Result<StepFlow, TourError> {
        let steps = self.steps.clone();
        let Some(step) = steps.get(index) else {
            tracing::debug!(message = "tour.sequence.exhausted", steps = steps.len());
            self.state = State::Complete;
            return Ok(StepFlow::Exhausted);
        };

        tracing::debug!(
            message = "tour.step.begin",
            index,
            selector = step.target()
        );
        if let Some(on_create) = step.create_callback() {
            on_create(index, step, previous.as_ref());
        }

        let Some(target) = host.query_selector(step.target()) else {
            tracing::error!(
                message = "tour.step.target_missing",
                index,
                selector = step.target()
            );
            self.state = State::Complete;
            return Err(TourError::TargetNotFound {
                index,
                selector: step.target().to_owned(),
            });
        };

        let settler = ScrollSettler::start(host, &target, &self.options);
        self.state = State::Active(ActiveStep {
            index,
            target,
            stage: Stage::Settling(settler),
        });
        Ok(StepFlow::Running)
    }

    /// Feed an animation frame. Samples the scroll while settling and
    /// renders the step once settled.
    pub fn on_frame(&mut self, host: &mut H, now: Duration) -> Result<StepFlow, TourError> {
        let State::Active(active) = &mut self.state else {
            return Ok(StepFlow::Running);
        };
        let Stage::Settling(settler) = &mut active.stage else {
            return Ok(StepFlow::Running);
        };
        if settler.sample(host.scroll_offset(), now) == SettleProgress::Settled {
            self.render(host);
        }
        Ok(StepFlow::Running)
    }

    fn allocate(&mut self) -> ArtifactId {
        let id = ArtifactId::new(self.next_artifact);
        self.next_artifact += 1;
        id
    }

    fn render(&mut self, host: &mut H) {
        let pulse = self.allocate();
        let tip = self.allocate();
        let steps = self.steps.clone();
        let State::Active(active) = &mut self.state else {
            return;
        };
        let Some(step) = steps.get(active.index) else {
            return;
        };

        tracing::debug!(
            message = "tour.step.render",
            index = active.index,
            %pulse,
            %tip
        );
        let rect = rectangle_of(&*host, &active.target);
        host.create_highlight(pulse, rect, &active.target);
        host.create_tooltip(
            tip,
            &TooltipRequest {
                content: step.content_str(),
                side: step.side(),
                index: active.index,
                total: steps.len(),
                target: rect,
            },
        );
        if let Some(side) = step.side() {
            let size = host.measure(tip);
            host.move_tooltip(tip, side, side.anchor(rect, size));
        }
        host.set_visible(tip, true);

        active.stage = Stage::Awaiting {
            overlay: Overlay { pulse, tip },
            signal: AdvanceSignal::new(active.index),
        };
    }

    /// The advance control of `tip` was activated.
    ///
    /// Invokes the step's `on_next` (or the default, which fires the signal
    /// immediately). Ignored for stale tips and once the signal has fired.
    pub fn activate(&mut self, tip: ArtifactId) {
        let State::Active(active) = &self.state else {
            tracing::trace!(message = "tour.advance.ignored", %tip, reason = "inactive");
            return;
        };
        let Stage::Awaiting { overlay, signal } = &active.stage else {
            tracing::trace!(message = "tour.advance.ignored", %tip, reason = "not_awaiting");
            return;
        };
        if overlay.tip != tip || signal.has_fired() {
            tracing::trace!(message = "tour.advance.ignored", %tip, reason = "stale_or_fired");
            return;
        }

        let index = active.index;
        let signal = signal.clone();
        let steps = self.steps.clone();
        let next_index = index + 1;
        match steps.get(index).and_then(Step::next_callback) {
            Some(on_next) => on_next(next_index, steps.get(next_index), signal),
            None => {
                signal.advance();
            }
        }
    }

    /// Check the active step's advance signal; on fire, hide the tip and
    /// start tearing down.
    pub fn poll_advance(&mut self, host: &mut H) {
        let State::Active(active) = &mut self.state else {
            return;
        };
        let Stage::Awaiting { overlay, signal } = &active.stage else {
            return;
        };
        let Some(payload) = signal.take() else {
            return;
        };
        let overlay = *overlay;

        tracing::debug!(
            message = "tour.step.advance",
            index = active.index,
            has_payload = payload.is_some()
        );
        host.set_visible(overlay.tip, false);
        active.stage = Stage::TearingDown { overlay, payload };
    }

    /// A transition ended on `artifact`. When it is the hiding tip, destroy
    /// both artifacts and begin the next step.
    pub fn transition_end(
        &mut self,
        host: &mut H,
        artifact: ArtifactId,
    ) -> Result<StepFlow, TourError> {
        let State::Active(active) = &mut self.state else {
            return Ok(StepFlow::Running);
        };
        let Stage::TearingDown { overlay, payload } = &mut active.stage else {
            return Ok(StepFlow::Running);
        };
        if overlay.tip != artifact {
            return Ok(StepFlow::Running);
        }

        let overlay = *overlay;
        let payload = payload.take();
        let index = active.index;
        host.destroy(overlay.pulse);
        host.destroy(overlay.tip);
        tracing::debug!(message = "tour.step.end", index);
        self.begin_step(host, index + 1, payload)
    }

    /// The document scrolled. Re-measure the active target and move the
    /// artifact the given reflow listener is responsible for.
    pub fn reflow(&self, host: &mut H, listener: ListenerKind) {
        let State::Active(active) = &self.state else {
            return;
        };
        let Some(overlay) = self.active_overlay() else {
            return;
        };
        let rect = rectangle_of(&*host, &active.target);
        match listener {
            ListenerKind::HighlightReflow => host.move_highlight(overlay.pulse, rect),
            ListenerKind::TipReflow => {
                let side = self.steps.get(active.index).and_then(Step::side);
                if let Some(side) = side {
                    let size = host.measure(overlay.tip);
                    host.move_tooltip(overlay.tip, side, side.anchor(rect, size));
                }
            }
            ListenerKind::KeyDown => {}
        }
    }

    /// Drop the active step without touching its artifacts.
    pub fn abandon(&mut self) {
        if let State::Active(active) = &self.state {
            tracing::debug!(message = "tour.step.abandoned", index = active.index);
        }
        self.state = State::Complete;
    }
}

impl<H: TourHost> fmt::Debug for StepSequencer<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepSequencer")
            .field("steps", &self.steps.len())
            .field("phase", &self.phase())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;
    use waypoint_backend::{DocumentGeometry, ListenerRegistry, OverlayRenderer};
    use waypoint_core::{
        BoxSize, ClientRect, DocRect, ScrollOffset, Side, TipAnchor, TourOptions,
    };

    /// Records renderer calls; every element sits at a fixed rectangle.
    #[derive(Default)]
    struct RecordingHost {
        missing: Vec<&'static str>,
        scroll_y: f64,
        ops: Vec<String>,
    }

    impl DocumentGeometry for RecordingHost {
        type Element = String;

        fn query_selector(&self, selector: &str) -> Option<String> {
            (!self.missing.contains(&selector)).then(|| selector.to_owned())
        }

        fn client_rect(&self, _element: &String) -> ClientRect {
            ClientRect::new(100.0 - self.scroll_y, 50.0, 40.0, 20.0)
        }

        fn border_box(&self, _element: &String) -> BoxSize {
            BoxSize::new(40.0, 20.0)
        }

        fn scroll_offset(&self) -> ScrollOffset {
            ScrollOffset::new(0.0, self.scroll_y)
        }

        fn scroll_into_view_centered(&mut self, element: &String) {
            self.ops.push(format!("scroll {element}"));
        }
    }

    impl OverlayRenderer for RecordingHost {
        fn create_container(&mut self) {}
        fn remove_container(&mut self) {}

        fn create_highlight(&mut self, id: ArtifactId, rect: DocRect, target: &String) {
            self.ops
                .push(format!("pulse {} {target} @{}", id.get(), rect.top));
        }

        fn create_tooltip(&mut self, id: ArtifactId, request: &TooltipRequest<'_>) {
            self.ops.push(format!(
                "tip {} {} {}",
                id.get(),
                request.counter_label(),
                request.content
            ));
        }

        fn measure(&self, _id: ArtifactId) -> BoxSize {
            BoxSize::new(100.0, 60.0)
        }

        fn move_highlight(&mut self, id: ArtifactId, rect: DocRect) {
            self.ops.push(format!("move-pulse {} @{}", id.get(), rect.top));
        }

        fn move_tooltip(&mut self, id: ArtifactId, side: Side, anchor: TipAnchor) {
            self.ops.push(format!(
                "move-tip {} {side} {},{}",
                id.get(),
                anchor.top,
                anchor.left
            ));
        }

        fn set_visible(&mut self, id: ArtifactId, visible: bool) {
            self.ops.push(format!("visible {} {visible}", id.get()));
        }

        fn destroy(&mut self, id: ArtifactId) {
            self.ops.push(format!("destroy {}", id.get()));
        }
    }

    impl ListenerRegistry for RecordingHost {
        fn attach(&mut self, _listener: ListenerKind) {}
        fn detach(&mut self, _listener: ListenerKind) {}
    }

    fn fast_options() -> TourOptions {
        TourOptions {
            settle_samples: 0,
            settle_delay_ms: 0,
            ..TourOptions::default()
        }
    }

    fn sequencer(steps: Vec<Step>) -> StepSequencer<RecordingHost> {
        StepSequencer::new(
            StepSequence::new(steps).expect("non-empty steps"),
            fast_options(),
        )
    }

    /// With zero threshold and delay, two frames settle a still page.
    fn settle(seq: &mut StepSequencer<RecordingHost>, host: &mut RecordingHost) {
        seq.on_frame(host, Duration::ZERO).expect("frame");
        seq.on_frame(host, Duration::from_millis(16)).expect("frame");
    }

    #[test]
    fn single_step_walks_every_phase() {
        let mut host = RecordingHost::default();
        let mut seq = sequencer(vec![Step::new("#a").content("Hello")]);
        assert_eq!(seq.phase(), SequencerPhase::Idle);

        assert_eq!(seq.begin(&mut host), Ok(StepFlow::Running));
        assert_eq!(seq.phase(), SequencerPhase::Settling(0));

        settle(&mut seq, &mut host);
        assert_eq!(seq.phase(), SequencerPhase::AwaitingAdvance(0));
        let tip = seq.active_tip().expect("tip rendered");

        seq.activate(tip);
        seq.poll_advance(&mut host);
        assert_eq!(seq.phase(), SequencerPhase::TearingDown(0));

        assert_eq!(seq.transition_end(&mut host, tip), Ok(StepFlow::Exhausted));
        assert_eq!(seq.phase(), SequencerPhase::Complete);

        assert_eq!(
            host.ops,
            vec![
                "scroll #a",
                "pulse 1 #a @100",
                "tip 2 1 / 1 Hello",
                "move-tip 2 right 110,90",
                "visible 2 true",
                "visible 2 false",
                "destroy 1",
                "destroy 2",
            ]
        );
    }

    #[test]
    fn missing_target_fails_with_index() {
        let mut host = RecordingHost {
            missing: vec!["#b"],
            ..RecordingHost::default()
        };
        let mut seq = sequencer(vec![Step::new("#a"), Step::new("#b")]);
        seq.begin(&mut host).expect("step 0 resolves");
        settle(&mut seq, &mut host);
        let tip = seq.active_tip().expect("tip");
        seq.activate(tip);
        seq.poll_advance(&mut host);

        let err = seq.transition_end(&mut host, tip).unwrap_err();
        assert_eq!(
            err,
            TourError::TargetNotFound {
                index: 1,
                selector: "#b".into()
            }
        );
        assert_eq!(seq.phase(), SequencerPhase::Complete);
    }

    #[test]
    fn unrelated_transition_end_is_ignored() {
        let mut host = RecordingHost::default();
        let mut seq = sequencer(vec![Step::new("#a")]);
        seq.begin(&mut host).expect("begin");
        settle(&mut seq, &mut host);
        let pulse = seq.active_pulse().expect("pulse");
        let tip = seq.active_tip().expect("tip");
        seq.activate(tip);
        seq.poll_advance(&mut host);

        assert_eq!(seq.transition_end(&mut host, pulse), Ok(StepFlow::Running));
        assert_eq!(seq.phase(), SequencerPhase::TearingDown(0));
    }

    #[test]
    fn on_next_can_defer_the_advance() {
        let kept: Rc<RefCell<Option<AdvanceSignal>>> = Rc::default();
        let slot = Rc::clone(&kept);
        let mut host = RecordingHost::default();
        let mut seq = sequencer(vec![
            Step::new("#a").on_next(move |next, step, signal| {
                assert_eq!(next, 1);
                assert_eq!(step.map(Step::target), Some("#b"));
                *slot.borrow_mut() = Some(signal);
            }),
            Step::new("#b"),
        ]);
        seq.begin(&mut host).expect("begin");
        settle(&mut seq, &mut host);
        let tip = seq.active_tip().expect("tip");

        seq.activate(tip);
        seq.poll_advance(&mut host);
        assert_eq!(seq.phase(), SequencerPhase::AwaitingAdvance(0));

        let signal = kept.borrow_mut().take().expect("signal kept");
        assert!(signal.fire(Some(serde_json::json!(42))));
        seq.poll_advance(&mut host);
        assert_eq!(seq.phase(), SequencerPhase::TearingDown(0));
    }

    #[test]
    fn reflow_moves_both_artifacts_without_changing_phase() {
        let mut host = RecordingHost::default();
        let mut seq = sequencer(vec![Step::new("#a").position(Side::Bottom)]);
        seq.begin(&mut host).expect("begin");
        settle(&mut seq, &mut host);
        host.ops.clear();

        host.scroll_y = 30.0;
        seq.reflow(&mut host, ListenerKind::HighlightReflow);
        seq.reflow(&mut host, ListenerKind::TipReflow);
        assert_eq!(seq.phase(), SequencerPhase::AwaitingAdvance(0));
        assert_eq!(host.ops, vec!["move-pulse 1 @100", "move-tip 2 bottom 120,70"]);
    }

    #[test]
    fn unpositioned_tip_is_never_moved() {
        let mut host = RecordingHost::default();
        let mut seq = sequencer(vec![Step::new("#a").unpositioned()]);
        seq.begin(&mut host).expect("begin");
        settle(&mut seq, &mut host);
        seq.reflow(&mut host, ListenerKind::TipReflow);
        assert!(host.ops.iter().all(|op| !op.starts_with("move-tip")));
    }

    #[test]
    fn phase_index_accessor() {
        assert_eq!(SequencerPhase::Settling(3).index(), Some(3));
        assert_eq!(SequencerPhase::Complete.index(), None);
        assert_eq!(SequencerPhase::Idle.index(), None);
    }
}
