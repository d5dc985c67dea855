#![forbid(unsafe_code)]

//! Geometry tracking for the active target.

use waypoint_backend::DocumentGeometry;
use waypoint_core::DocRect;

/// Current document rectangle of `element`.
///
/// Reads layout at call time; nothing is cached. The element must be
/// attached to the document.
pub fn rectangle_of<H>(host: &H, element: &H::Element) -> DocRect
where
    H: DocumentGeometry + ?Sized,
{
    DocRect::from_layout(
        host.client_rect(element),
        host.scroll_offset(),
        host.border_box(element),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use waypoint_core::{BoxSize, ClientRect, ScrollOffset};

    struct ScrollingPage {
        element_top: f64,
        scroll_y: Cell<f64>,
    }

    impl DocumentGeometry for ScrollingPage {
        type Element = ();

        fn query_selector(&self, _selector: &str) -> Option<()> {
            Some(())
        }

        fn client_rect(&self, _element: &()) -> ClientRect {
            ClientRect::new(self.element_top - self.scroll_y.get(), 16.0, 120.5, 30.0)
        }

        fn border_box(&self, _element: &()) -> BoxSize {
            BoxSize::new(122.0, 32.0)
        }

        fn scroll_offset(&self) -> ScrollOffset {
            ScrollOffset::new(0.0, self.scroll_y.get())
        }

        fn scroll_into_view_centered(&mut self, _element: &()) {}
    }

    #[test]
    fn rectangle_is_document_relative_and_uses_border_box() {
        let page = ScrollingPage {
            element_top: 900.0,
            scroll_y: Cell::new(0.0),
        };
        assert_eq!(rectangle_of(&page, &()), DocRect::new(900.0, 16.0, 122.0, 32.0));

        page.scroll_y.set(640.0);
        assert_eq!(rectangle_of(&page, &()), DocRect::new(900.0, 16.0, 122.0, 32.0));
    }
}
