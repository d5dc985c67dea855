#![forbid(unsafe_code)]

//! Geometric primitives in CSS pixels.
//!
//! Two coordinate spaces matter to a tour:
//! - **client** coordinates, relative to the viewport (what
//!   `getBoundingClientRect` reports), and
//! - **document** coordinates, client coordinates plus the current scroll
//!   offset. Overlay artifacts are absolutely positioned in document space.

/// A rectangle relative to the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClientRect {
    /// Top edge relative to the viewport.
    pub top: f64,
    /// Left edge relative to the viewport.
    pub left: f64,
    /// Width of the bounding box.
    pub width: f64,
    /// Height of the bounding box.
    pub height: f64,
}

impl ClientRect {
    /// Create a new client rectangle.
    #[inline]
    pub const fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }
}

/// Current scroll position of the document.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollOffset {
    /// Horizontal scroll (`scrollLeft`).
    pub x: f64,
    /// Vertical scroll (`scrollTop`).
    pub y: f64,
}

impl ScrollOffset {
    /// Create a new scroll offset.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A rendered box size (border box: content + padding + borders).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoxSize {
    /// Width in CSS pixels.
    pub width: f64,
    /// Height in CSS pixels.
    pub height: f64,
}

impl BoxSize {
    /// Create a new box size.
    #[inline]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// A rectangle in document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DocRect {
    /// Top edge in document coordinates.
    pub top: f64,
    /// Left edge in document coordinates.
    pub left: f64,
    /// Border-box width.
    pub width: f64,
    /// Border-box height.
    pub height: f64,
}

impl DocRect {
    /// Create a new document rectangle.
    #[inline]
    pub const fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    /// Combine a viewport-relative position, the scroll offset, and the
    /// element's border-box size into a document rectangle.
    ///
    /// Width and height come from the border box, not the client rect.
    #[inline]
    pub fn from_layout(client: ClientRect, scroll: ScrollOffset, size: BoxSize) -> Self {
        Self {
            top: client.top + scroll.y,
            left: client.left + scroll.x,
            width: size.width,
            height: size.height,
        }
    }

    /// Right edge (exclusive).
    #[inline]
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Horizontal center.
    #[inline]
    pub fn center_x(&self) -> f64 {
        self.left + self.width / 2.0
    }

    /// Vertical center.
    #[inline]
    pub fn center_y(&self) -> f64 {
        self.top + self.height / 2.0
    }

    /// Translate back into viewport coordinates for the given scroll offset.
    #[inline]
    pub fn to_client(&self, scroll: ScrollOffset) -> ClientRect {
        ClientRect {
            top: self.top - scroll.y,
            left: self.left - scroll.x,
            width: self.width,
            height: self.height,
        }
    }
}
