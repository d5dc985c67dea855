#![forbid(unsafe_code)]

//! Single-resolution signals.
//!
//! - [`AdvanceSignal`]: created fresh for each step; fires at most once and
//!   optionally carries a payload forwarded to the next step's `on_create`.
//! - [`Completion`]: settles once when the whole tour ends, whatever the
//!   cause. It implements [`Future`] so embedders can `.await` it.
//!
//! Both are `Rc`-based: a tour is single-threaded and host-driven, so no
//! handle ever crosses a thread boundary.

use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::TourError;

/// Opaque value carried by an advance signal into the next step.
pub type AdvancePayload = serde_json::Value;

#[derive(Debug)]
enum AdvanceSlot {
    Pending,
    Fired(Option<AdvancePayload>),
    Taken,
}

/// At-most-once "move to the next step" signal.
///
/// Clones share the same slot. Only the first [`fire`](Self::fire) has an
/// effect; later calls (double clicks, stale handles kept by callbacks after
/// their step ended) return `false` and change nothing.
#[derive(Clone)]
pub struct AdvanceSignal {
    step: usize,
    slot: Rc<RefCell<AdvanceSlot>>,
}

impl AdvanceSignal {
    /// Create a pending signal for the step at `step`.
    #[must_use]
    pub fn new(step: usize) -> Self {
        Self {
            step,
            slot: Rc::new(RefCell::new(AdvanceSlot::Pending)),
        }
    }

    /// Index of the step this signal advances from.
    #[must_use]
    pub fn step(&self) -> usize {
        self.step
    }

    /// Fire the signal with an optional payload.
    ///
    /// Returns `true` if this call fired it.
    pub fn fire(&self, payload: Option<AdvancePayload>) -> bool {
        let mut slot = self.slot.borrow_mut();
        if !matches!(*slot, AdvanceSlot::Pending) {
            tracing::trace!(
                message = "tour.advance.duplicate",
                step = self.step
            );
            return false;
        }
        *slot = AdvanceSlot::Fired(payload);
        true
    }

    /// Fire the signal without a payload.
    pub fn advance(&self) -> bool {
        self.fire(None)
    }

    /// Whether the signal has fired (consumed or not).
    #[must_use]
    pub fn has_fired(&self) -> bool {
        !matches!(*self.slot.borrow(), AdvanceSlot::Pending)
    }

    /// Consume a fired payload.
    ///
    /// Returns `Some(payload)` exactly once after the signal fired, `None`
    /// before it fires and after it was consumed.
    pub fn take(&self) -> Option<Option<AdvancePayload>> {
        let mut slot = self.slot.borrow_mut();
        match std::mem::replace(&mut *slot, AdvanceSlot::Taken) {
            AdvanceSlot::Fired(payload) => Some(payload),
            AdvanceSlot::Pending => {
                *slot = AdvanceSlot::Pending;
                None
            }
            AdvanceSlot::Taken => None,
        }
    }
}

impl fmt::Debug for AdvanceSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvanceSignal")
            .field("step", &self.step)
            .field("fired", &self.has_fired())
            .finish()
    }
}

/// Why a tour ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TourEnd {
    /// Every step was visited and advanced.
    Finished,
    /// The tour was cancelled (Escape).
    Cancelled,
    /// The tour was constructed from an invalid sequence and never ran.
    Inert,
}

impl TourEnd {
    /// Lowercase name, as reported to script hosts.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
            Self::Inert => "inert",
        }
    }
}

/// Settled value of a [`Completion`].
pub type TourOutcome = Result<TourEnd, TourError>;

#[derive(Default)]
struct CompletionInner {
    outcome: Option<TourOutcome>,
    wakers: Vec<Waker>,
}

/// Single-resolution completion signal of a tour.
///
/// Clones observe the same state. Awaiting a clone after the tour ended
/// yields the stored outcome immediately.
#[derive(Clone, Default)]
pub struct Completion {
    inner: Rc<RefCell<CompletionInner>>,
}

impl Completion {
    /// Create an unsettled completion.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Settle the completion. Returns `true` if this call settled it.
    pub fn resolve(&self, outcome: TourOutcome) -> bool {
        let wakers = {
            let mut inner = self.inner.borrow_mut();
            if inner.outcome.is_some() {
                return false;
            }
            inner.outcome = Some(outcome);
            std::mem::take(&mut inner.wakers)
        };
        for waker in wakers {
            waker.wake();
        }
        true
    }

    /// Whether the completion has settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.inner.borrow().outcome.is_some()
    }

    /// The settled outcome, if any.
    #[must_use]
    pub fn outcome(&self) -> Option<TourOutcome> {
        self.inner.borrow().outcome.clone()
    }
}

impl Future for Completion {
    type Output = TourOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.inner.borrow_mut();
        if let Some(outcome) = &inner.outcome {
            return Poll::Ready(outcome.clone());
        }
        if !inner.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            inner.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("outcome", &self.inner.borrow().outcome)
            .finish()
    }
}
