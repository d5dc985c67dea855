#![forbid(unsafe_code)]
#![doc = "Host capability traits for Waypoint."]
#![doc = ""]
#![doc = "This crate defines the boundary between the tour runtime and the environment"]
#![doc = "that owns the page (a browser DOM via `waypoint-web`, or the headless document"]
#![doc = "used for deterministic tests). The runtime never touches globals: everything it"]
#![doc = "needs from the page flows through these traits."]

use waypoint_core::{
    ArtifactId, BoxSize, ClientRect, DocRect, ListenerKind, ScrollOffset, Side, TipAnchor,
};

/// Read access to the live document plus the one scroll operation a tour needs.
pub trait DocumentGeometry {
    /// Handle to a live element.
    type Element: Clone + core::fmt::Debug;

    /// Resolve a selector against the live document.
    fn query_selector(&self, selector: &str) -> Option<Self::Element>;

    /// Viewport-relative bounding rectangle (`getBoundingClientRect`).
    fn client_rect(&self, element: &Self::Element) -> ClientRect;

    /// Rendered border-box size (`offsetWidth` / `offsetHeight`).
    fn border_box(&self, element: &Self::Element) -> BoxSize;

    /// Current document scroll offset.
    fn scroll_offset(&self) -> ScrollOffset;

    /// Start scrolling so `element` ends up vertically centered.
    ///
    /// May animate; the runtime samples [`Self::scroll_offset`] per frame to
    /// detect when the scroll has stopped.
    fn scroll_into_view_centered(&mut self, element: &Self::Element);
}

/// Everything the renderer needs to build a tooltip.
#[derive(Debug, Clone, PartialEq)]
pub struct TooltipRequest<'a> {
    /// Content, passed through untouched.
    pub content: &'a str,
    /// Declared side, `None` when unpositioned.
    pub side: Option<Side>,
    /// Zero-based index of the step.
    pub index: usize,
    /// Number of steps in the tour.
    pub total: usize,
    /// Target rectangle at creation time.
    pub target: DocRect,
}

impl TooltipRequest<'_> {
    /// Whether this tip belongs to the final step (its control finishes the tour).
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.total
    }

    /// Footer counter text, e.g. `"2 / 5"`.
    #[must_use]
    pub fn counter_label(&self) -> String {
        format!("{} / {}", self.index + 1, self.total)
    }
}

/// Overlay rendering collaborator.
///
/// Artifacts live inside a single container owned by the tour. Removing the
/// container must remove every artifact still inside it.
pub trait OverlayRenderer: DocumentGeometry {
    /// Create and insert the overlay container.
    fn create_container(&mut self);

    /// Remove the container and everything inside it.
    fn remove_container(&mut self);

    /// Create the pulse artifact covering `rect`, bound to `target`.
    fn create_highlight(&mut self, id: ArtifactId, rect: DocRect, target: &Self::Element);

    /// Create the tip artifact, hidden, with its advance control wired to
    /// report [`HostEvent::AdvanceActivated`](waypoint_core::HostEvent::AdvanceActivated).
    fn create_tooltip(&mut self, id: ArtifactId, request: &TooltipRequest<'_>);

    /// Current rendered size of an artifact.
    fn measure(&self, id: ArtifactId) -> BoxSize;

    /// Move and resize a pulse.
    fn move_highlight(&mut self, id: ArtifactId, rect: DocRect);

    /// Move a tip (applies the side's modifier on first placement).
    fn move_tooltip(&mut self, id: ArtifactId, side: Side, anchor: TipAnchor);

    /// Show or hide a tip. Hiding starts a transition whose end is reported
    /// as [`HostEvent::TransitionEnd`](waypoint_core::HostEvent::TransitionEnd).
    fn set_visible(&mut self, id: ArtifactId, visible: bool);

    /// Remove an artifact.
    fn destroy(&mut self, id: ArtifactId);
}

/// Global (document-level) listener registration.
pub trait ListenerRegistry {
    /// Start delivering events for `listener` to the tour.
    fn attach(&mut self, listener: ListenerKind);

    /// Stop delivering events for `listener`.
    fn detach(&mut self, listener: ListenerKind);
}

/// A complete tour host.
///
/// Blanket-implemented for anything that renders overlays and registers
/// listeners.
pub trait TourHost: OverlayRenderer + ListenerRegistry {}

impl<T: OverlayRenderer + ListenerRegistry> TourHost for T {}
