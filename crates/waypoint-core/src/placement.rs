#![forbid(unsafe_code)]

//! Tooltip placement relative to a target rectangle.
//!
//! The tip is anchored at a point on the target's edge; the renderer's CSS
//! (one modifier class per side) shifts the tip body so its arrow lands on
//! that point. Only `top` and `left` placements subtract the tip's own size.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{BoxSize, DocRect};

/// Side of the target the tooltip is placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Above the target, horizontally centered.
    Top,
    /// Right of the target, vertically centered.
    #[default]
    Right,
    /// Below the target, horizontally centered.
    Bottom,
    /// Left of the target, vertically centered.
    Left,
}

impl Side {
    /// All sides in declaration order.
    pub const ALL: [Self; 4] = [Self::Top, Self::Right, Self::Bottom, Self::Left];

    /// Lowercase name, as used in step definitions and CSS modifiers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Right => "right",
            Self::Bottom => "bottom",
            Self::Left => "left",
        }
    }

    /// Compute where the tip goes for a target rectangle and the tip's size.
    #[must_use]
    pub fn anchor(self, target: DocRect, tip: BoxSize) -> TipAnchor {
        match self {
            Self::Top => TipAnchor::new(target.top - tip.height, target.center_x()),
            Self::Right => TipAnchor::new(target.center_y(), target.right()),
            Self::Bottom => TipAnchor::new(target.bottom(), target.center_x()),
            Self::Left => TipAnchor::new(target.center_y(), target.left - tip.width),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a side name is not one of `top|right|bottom|left`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown tooltip position '{0}'")]
pub struct SideParseError(pub String);

impl FromStr for Side {
    type Err = SideParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(Self::Top),
            "right" => Ok(Self::Right),
            "bottom" => Ok(Self::Bottom),
            "left" => Ok(Self::Left),
            other => Err(SideParseError(other.to_owned())),
        }
    }
}

/// Document-space point a tip is positioned at (its `top`/`left` style).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TipAnchor {
    /// Value for the tip's `top` style.
    pub top: f64,
    /// Value for the tip's `left` style.
    pub left: f64,
}

impl TipAnchor {
    /// Create a new anchor point.
    #[inline]
    pub const fn new(top: f64, left: f64) -> Self {
        Self { top, left }
    }
}
