#![forbid(unsafe_code)]

//! Deterministic in-memory document.
//!
//! [`HeadlessDocument`] implements [`TourHost`] without a browser. Elements
//! are registered with document-relative rectangles; the viewport scrolls
//! either instantly or by a fixed number of pixels per frame. Nothing
//! happens on its own: the scroll animation advances on [`tick`], and host
//! events (scroll deliveries, transition ends) are queued until the caller
//! drains them.
//!
//! [`tick`]: HeadlessDocument::tick

use std::collections::{BTreeMap, VecDeque};

use waypoint_backend::{DocumentGeometry, ListenerRegistry, OverlayRenderer, TooltipRequest};
use waypoint_core::{
    ArtifactId, BoxSize, ClientRect, DocRect, HostEvent, ListenerKind, ScrollOffset, Side,
    TipAnchor,
};

/// Default tooltip size reported by [`HeadlessDocument::measure`].
pub const DEFAULT_TIP_SIZE: BoxSize = BoxSize::new(240.0, 96.0);

/// Handle to an element of a [`HeadlessDocument`].
///
/// Stays valid after the element is removed; a removed element measures as
/// an empty rectangle at the origin, like a detached DOM node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

#[derive(Debug, Clone)]
struct Node {
    selector: String,
    rect: DocRect,
    attached: bool,
}

/// What an overlay artifact is.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactKind {
    /// Pulse highlight over a target.
    Highlight {
        /// Element the highlight was created for.
        target: NodeId,
    },
    /// Tooltip with content and an advance control.
    Tooltip {
        /// Content, untouched.
        content: String,
        /// Declared side; `None` leaves it where it was inserted.
        side: Option<Side>,
        /// Footer counter, e.g. `"1 / 3"`.
        counter: String,
        /// Whether the control finishes the tour.
        finishes: bool,
        /// Position set by the last move, if any.
        anchor: Option<TipAnchor>,
    },
}

/// An overlay artifact inside the container.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    /// Rectangle of the target when last created or moved.
    pub rect: DocRect,
    pub visible: bool,
}

/// In-memory [`TourHost`](waypoint_backend::TourHost).
#[derive(Debug, Clone)]
pub struct HeadlessDocument {
    nodes: Vec<Node>,
    viewport: BoxSize,
    extent: BoxSize,
    scroll: ScrollOffset,
    scroll_target: Option<ScrollOffset>,
    /// Pixels per frame; `None` scrolls instantly.
    scroll_speed: Option<f64>,
    tip_size: BoxSize,
    container: bool,
    containers_created: u32,
    artifacts: BTreeMap<ArtifactId, Artifact>,
    listeners: Vec<ListenerKind>,
    transitions: Vec<ArtifactId>,
    pending: VecDeque<HostEvent>,
    scroll_requests: Vec<NodeId>,
}

impl HeadlessDocument {
    /// A document of `extent` seen through a `viewport`, scrolled to the top.
    #[must_use]
    pub fn new(viewport: BoxSize, extent: BoxSize) -> Self {
        Self {
            nodes: Vec::new(),
            viewport,
            extent,
            scroll: ScrollOffset::default(),
            scroll_target: None,
            scroll_speed: None,
            tip_size: DEFAULT_TIP_SIZE,
            container: false,
            containers_created: 0,
            artifacts: BTreeMap::new(),
            listeners: Vec::new(),
            transitions: Vec::new(),
            pending: VecDeque::new(),
            scroll_requests: Vec::new(),
        }
    }

    /// Animate scrolls at `px_per_frame` instead of jumping.
    #[must_use]
    pub fn with_scroll_speed(mut self, px_per_frame: f64) -> Self {
        self.scroll_speed = Some(px_per_frame.abs().max(1.0));
        self
    }

    /// Report `size` for every tooltip.
    #[must_use]
    pub fn with_tip_size(mut self, size: BoxSize) -> Self {
        self.tip_size = size;
        self
    }

    /// Register an element matched by `selector` at a document rectangle.
    pub fn insert(&mut self, selector: impl Into<String>, rect: DocRect) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            selector: selector.into(),
            rect,
            attached: true,
        });
        id
    }

    /// Detach every element matched by `selector`. Returns how many.
    pub fn remove(&mut self, selector: &str) -> usize {
        let mut removed = 0;
        for node in self.nodes.iter_mut().filter(|n| n.attached && n.selector == selector) {
            node.attached = false;
            removed += 1;
        }
        removed
    }

    /// Move an element to a new document rectangle.
    pub fn relayout(&mut self, node: NodeId, rect: DocRect) {
        if let Some(node) = self.nodes.get_mut(node.0 as usize) {
            node.rect = rect;
        }
    }

    /// Scroll to an offset immediately, as the user would.
    pub fn scroll_to(&mut self, x: f64, y: f64) {
        self.scroll_target = None;
        self.set_scroll(self.clamp(ScrollOffset::new(x, y)));
    }

    /// Advance the scroll animation by one frame.
    pub fn tick(&mut self) {
        let (Some(target), Some(speed)) = (self.scroll_target, self.scroll_speed) else {
            return;
        };
        let step = |from: f64, to: f64| {
            if (to - from).abs() <= speed {
                to
            } else {
                from + speed.copysign(to - from)
            }
        };
        let next = ScrollOffset::new(
            step(self.scroll.x, target.x),
            step(self.scroll.y, target.y),
        );
        if next == target {
            self.scroll_target = None;
        }
        self.set_scroll(next);
    }

    fn set_scroll(&mut self, offset: ScrollOffset) {
        if offset == self.scroll {
            return;
        }
        self.scroll = offset;
        for listener in self.listeners.iter().copied().filter(|l| l.is_reflow()) {
            self.pending.push_back(HostEvent::Scroll { listener });
        }
    }

    fn clamp(&self, offset: ScrollOffset) -> ScrollOffset {
        let max_x = (self.extent.width - self.viewport.width).max(0.0);
        let max_y = (self.extent.height - self.viewport.height).max(0.0);
        ScrollOffset::new(offset.x.clamp(0.0, max_x), offset.y.clamp(0.0, max_y))
    }

    /// Take queued host events in delivery order.
    pub fn drain_events(&mut self) -> Vec<HostEvent> {
        self.pending.drain(..).collect()
    }

    /// End every running transition, queueing their transition-end events.
    /// Returns how many ended.
    pub fn end_transitions(&mut self) -> usize {
        let ended = self.transitions.len();
        for artifact in self.transitions.drain(..) {
            self.pending.push_back(HostEvent::TransitionEnd { artifact });
        }
        ended
    }

    /// Whether the scroll animation is still moving.
    #[must_use]
    pub fn is_scrolling(&self) -> bool {
        self.scroll_target.is_some()
    }

    #[must_use]
    pub fn scroll(&self) -> ScrollOffset {
        self.scroll
    }

    /// Whether the overlay container is present.
    #[must_use]
    pub fn has_container(&self) -> bool {
        self.container
    }

    /// How many containers have ever been created.
    #[must_use]
    pub fn containers_created(&self) -> u32 {
        self.containers_created
    }

    /// Artifacts currently inside the container.
    #[must_use]
    pub fn artifacts(&self) -> &BTreeMap<ArtifactId, Artifact> {
        &self.artifacts
    }

    #[must_use]
    pub fn artifact(&self, id: ArtifactId) -> Option<&Artifact> {
        self.artifacts.get(&id)
    }

    /// The live tooltip, if exactly one step is displayed.
    #[must_use]
    pub fn tooltip(&self) -> Option<(ArtifactId, &Artifact)> {
        self.artifacts
            .iter()
            .find(|(_, a)| matches!(a.kind, ArtifactKind::Tooltip { .. }))
            .map(|(id, a)| (*id, a))
    }

    /// The live highlight, if any.
    #[must_use]
    pub fn highlight(&self) -> Option<(ArtifactId, &Artifact)> {
        self.artifacts
            .iter()
            .find(|(_, a)| matches!(a.kind, ArtifactKind::Highlight { .. }))
            .map(|(id, a)| (*id, a))
    }

    /// Attached listeners, in attach order.
    #[must_use]
    pub fn listeners(&self) -> &[ListenerKind] {
        &self.listeners
    }

    /// Elements the tour asked to center, in request order.
    #[must_use]
    pub fn scroll_requests(&self) -> &[NodeId] {
        &self.scroll_requests
    }

    /// Selector an element was registered with.
    #[must_use]
    pub fn selector_of(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.0 as usize).map(|n| n.selector.as_str())
    }
}

impl Default for HeadlessDocument {
    /// A 1024x768 viewport over a 1024x4000 page.
    fn default() -> Self {
        Self::new(BoxSize::new(1024.0, 768.0), BoxSize::new(1024.0, 4000.0))
    }
}

impl DocumentGeometry for HeadlessDocument {
    type Element = NodeId;

    fn query_selector(&self, selector: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.attached && n.selector == selector)
            .map(|index| NodeId(index as u32))
    }

    fn client_rect(&self, element: &NodeId) -> ClientRect {
        match self.nodes.get(element.0 as usize) {
            Some(node) if node.attached => node.rect.to_client(self.scroll),
            _ => ClientRect::default(),
        }
    }

    fn border_box(&self, element: &NodeId) -> BoxSize {
        match self.nodes.get(element.0 as usize) {
            Some(node) if node.attached => BoxSize::new(node.rect.width, node.rect.height),
            _ => BoxSize::default(),
        }
    }

    fn scroll_offset(&self) -> ScrollOffset {
        self.scroll
    }

    fn scroll_into_view_centered(&mut self, element: &NodeId) {
        self.scroll_requests.push(*element);
        let Some(node) = self.nodes.get(element.0 as usize).filter(|n| n.attached) else {
            return;
        };
        let target = self.clamp(ScrollOffset::new(
            node.rect.center_x() - self.viewport.width / 2.0,
            node.rect.center_y() - self.viewport.height / 2.0,
        ));
        if self.scroll_speed.is_some() && target != self.scroll {
            self.scroll_target = Some(target);
        } else {
            self.set_scroll(target);
        }
    }
}

impl OverlayRenderer for HeadlessDocument {
    fn create_container(&mut self) {
        self.container = true;
        self.containers_created += 1;
    }

    fn remove_container(&mut self) {
        self.container = false;
        self.artifacts.clear();
        self.transitions.clear();
    }

    fn create_highlight(&mut self, id: ArtifactId, rect: DocRect, target: &NodeId) {
        self.artifacts.insert(
            id,
            Artifact {
                kind: ArtifactKind::Highlight { target: *target },
                rect,
                visible: true,
            },
        );
    }

    fn create_tooltip(&mut self, id: ArtifactId, request: &TooltipRequest<'_>) {
        self.artifacts.insert(
            id,
            Artifact {
                kind: ArtifactKind::Tooltip {
                    content: request.content.to_owned(),
                    side: request.side,
                    counter: request.counter_label(),
                    finishes: request.is_last(),
                    anchor: None,
                },
                rect: request.target,
                visible: false,
            },
        );
    }

    fn measure(&self, _id: ArtifactId) -> BoxSize {
        self.tip_size
    }

    fn move_highlight(&mut self, id: ArtifactId, rect: DocRect) {
        if let Some(artifact) = self.artifacts.get_mut(&id) {
            artifact.rect = rect;
        }
    }

    fn move_tooltip(&mut self, id: ArtifactId, side: Side, anchor: TipAnchor) {
        let Some(artifact) = self.artifacts.get_mut(&id) else {
            return;
        };
        if let ArtifactKind::Tooltip {
            side: current,
            anchor: slot,
            ..
        } = &mut artifact.kind
        {
            *current = Some(side);
            *slot = Some(anchor);
        }
    }

    fn set_visible(&mut self, id: ArtifactId, visible: bool) {
        let Some(artifact) = self.artifacts.get_mut(&id) else {
            return;
        };
        if artifact.visible != visible {
            artifact.visible = visible;
            self.transitions.push(id);
        }
    }

    fn destroy(&mut self, id: ArtifactId) {
        self.artifacts.remove(&id);
        self.transitions.retain(|t| *t != id);
    }
}

impl ListenerRegistry for HeadlessDocument {
    fn attach(&mut self, listener: ListenerKind) {
        if !self.listeners.contains(&listener) {
            self.listeners.push(listener);
        }
    }

    fn detach(&mut self, listener: ListenerKind) {
        self.listeners.retain(|l| *l != listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn page() -> HeadlessDocument {
        HeadlessDocument::new(BoxSize::new(800.0, 600.0), BoxSize::new(800.0, 3000.0))
    }

    #[test]
    fn centering_clamps_to_the_document() {
        let mut doc = page();
        let top = doc.insert("#top", DocRect::new(10.0, 10.0, 100.0, 20.0));
        let deep = doc.insert("#deep", DocRect::new(2000.0, 100.0, 200.0, 100.0));
        let bottom = doc.insert("#bottom", DocRect::new(2950.0, 0.0, 100.0, 40.0));

        doc.scroll_into_view_centered(&deep);
        assert_eq!(doc.scroll(), ScrollOffset::new(0.0, 1750.0));

        doc.scroll_into_view_centered(&top);
        assert_eq!(doc.scroll(), ScrollOffset::new(0.0, 0.0));

        doc.scroll_into_view_centered(&bottom);
        assert_eq!(doc.scroll(), ScrollOffset::new(0.0, 2400.0));
        assert_eq!(doc.scroll_requests(), &[deep, top, bottom]);
    }

    #[test]
    fn animated_scroll_moves_per_tick() {
        let mut doc = page().with_scroll_speed(500.0);
        let deep = doc.insert("#deep", DocRect::new(2000.0, 100.0, 200.0, 100.0));
        doc.scroll_into_view_centered(&deep);
        assert!(doc.is_scrolling());

        let mut ys = Vec::new();
        while doc.is_scrolling() {
            doc.tick();
            ys.push(doc.scroll().y);
        }
        assert_eq!(ys, vec![500.0, 1000.0, 1500.0, 1750.0]);
    }

    #[test]
    fn scroll_events_only_reach_attached_reflow_listeners() {
        let mut doc = page();
        doc.scroll_to(0.0, 100.0);
        assert!(doc.drain_events().is_empty());

        doc.attach(ListenerKind::KeyDown);
        doc.attach(ListenerKind::TipReflow);
        doc.scroll_to(0.0, 200.0);
        assert_eq!(
            doc.drain_events(),
            vec![HostEvent::Scroll {
                listener: ListenerKind::TipReflow
            }]
        );

        // No movement, no event.
        doc.scroll_to(0.0, 200.0);
        assert!(doc.drain_events().is_empty());
    }

    #[test]
    fn removed_element_is_not_found_and_measures_empty() {
        let mut doc = page();
        let node = doc.insert("#gone", DocRect::new(50.0, 50.0, 10.0, 10.0));
        assert_eq!(doc.query_selector("#gone"), Some(node));
        assert_eq!(doc.remove("#gone"), 1);
        assert_eq!(doc.query_selector("#gone"), None);
        assert_eq!(doc.client_rect(&node), ClientRect::default());
    }

    #[test]
    fn hiding_a_tip_runs_a_transition_and_container_removal_clears_all() {
        let mut doc = page();
        let node = doc.insert("#a", DocRect::new(0.0, 0.0, 10.0, 10.0));
        let rect = DocRect::new(0.0, 0.0, 10.0, 10.0);
        doc.create_container();
        doc.create_highlight(ArtifactId::new(1), rect, &node);
        doc.create_tooltip(
            ArtifactId::new(2),
            &TooltipRequest {
                content: "hi",
                side: None,
                index: 0,
                total: 1,
                target: rect,
            },
        );
        doc.set_visible(ArtifactId::new(2), true);
        doc.set_visible(ArtifactId::new(2), false);
        assert_eq!(doc.end_transitions(), 2);
        assert_eq!(
            doc.drain_events(),
            vec![
                HostEvent::TransitionEnd {
                    artifact: ArtifactId::new(2)
                },
                HostEvent::TransitionEnd {
                    artifact: ArtifactId::new(2)
                },
            ]
        );

        doc.remove_container();
        assert!(!doc.has_container());
        assert!(doc.artifacts().is_empty());
    }
}
