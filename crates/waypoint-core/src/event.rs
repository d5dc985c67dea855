#![forbid(unsafe_code)]

//! Host events pushed into a running tour.
//!
//! The tour never reads the environment's event streams itself. The host
//! (a DOM binding, or the headless document in tests) translates its own
//! events into [`HostEvent`] values and hands them to the tour one at a time.

use core::time::Duration;

/// Key code the tour treats as "cancel" by default (Escape).
pub const ESCAPE_KEY_CODE: u32 = 27;

/// Identity of one overlay artifact (pulse or tip).
///
/// Allocated by the sequencer and handed to the renderer at creation time,
/// so events coming back from the host can name the artifact they concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactId(u64);

impl ArtifactId {
    /// Wrap a raw identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw identifier value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "artifact#{}", self.0)
    }
}

/// Global listeners a started tour keeps attached until it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListenerKind {
    /// Document keydown, used for Escape cancellation.
    KeyDown,
    /// Document scroll, keeps the pulse on its target.
    HighlightReflow,
    /// Document scroll, keeps the tip anchored to its target.
    TipReflow,
}

impl ListenerKind {
    /// Every listener a tour attaches, in attach order.
    pub const ALL: [Self; 3] = [Self::KeyDown, Self::HighlightReflow, Self::TipReflow];

    /// Whether this listener reacts to document scroll.
    #[must_use]
    pub const fn is_reflow(self) -> bool {
        matches!(self, Self::HighlightReflow | Self::TipReflow)
    }
}

/// A key press as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInput {
    /// Legacy numeric key code (`which` / `keyCode`).
    pub code: u32,
    /// Key name (`KeyboardEvent.key`), empty when unknown.
    pub key: String,
}

impl KeyInput {
    /// Build a key input from a numeric code only.
    #[must_use]
    pub fn from_code(code: u32) -> Self {
        Self {
            code,
            key: String::new(),
        }
    }

    /// Build a key input carrying both code and name.
    #[must_use]
    pub fn new(code: u32, key: impl Into<String>) -> Self {
        Self {
            code,
            key: key.into(),
        }
    }

    /// The Escape key.
    #[must_use]
    pub fn escape() -> Self {
        Self::new(ESCAPE_KEY_CODE, "Escape")
    }
}

/// One event delivered by the host to a running tour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// An animation frame, stamped with the host's monotonic clock.
    Frame {
        /// Monotonic time of the frame.
        now: Duration,
    },
    /// A key was pressed while the keydown listener was attached.
    KeyDown(KeyInput),
    /// The document scrolled; `listener` names which reflow listener fired.
    Scroll {
        /// The reflow listener this delivery belongs to.
        listener: ListenerKind,
    },
    /// The advance control of a tip was activated.
    AdvanceActivated {
        /// The tip whose control fired.
        tip: ArtifactId,
    },
    /// A CSS transition on an artifact finished.
    TransitionEnd {
        /// The artifact whose transition ended.
        artifact: ArtifactId,
    },
}

/// What the host should do with the native event after the tour saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    /// Let the environment handle the event normally.
    Pass,
    /// The tour consumed the event; suppress default handling.
    Consumed,
}

impl EventDisposition {
    /// Whether the host should call `preventDefault` (or equivalent).
    #[must_use]
    pub const fn prevents_default(self) -> bool {
        matches!(self, Self::Consumed)
    }
}
