#![forbid(unsafe_code)]

//! Scroll settling.
//!
//! After asking the host to center a target, the settler samples the
//! document scroll offset once per animation frame. Once the offset has
//! stayed the same for more than `threshold` consecutive samples, a short
//! delay runs so layout and paint catch up, then the settler reports
//! [`SettleProgress::Settled`] exactly once.
//!
//! There is no timeout. A scroll that never stops never settles.

use core::time::Duration;

use waypoint_backend::DocumentGeometry;
use waypoint_core::{ScrollOffset, TourOptions};

/// Result of one settle sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleProgress {
    /// Scroll still moving, or not yet stable long enough.
    Sampling,
    /// Scroll stopped; waiting out the post-settle delay.
    Delaying,
    /// Settled. Reported once.
    Settled,
    /// Already reported settled; further samples are ignored.
    Spent,
}

/// Frame-sampled scroll settle detector.
#[derive(Debug, Clone)]
pub struct ScrollSettler {
    threshold: u32,
    delay: Duration,
    last: Option<ScrollOffset>,
    unchanged: u32,
    deadline: Option<Duration>,
    reported: bool,
}

impl ScrollSettler {
    /// Create a settler that needs more than `threshold` unchanged samples,
    /// then waits `delay`.
    #[must_use]
    pub fn new(threshold: u32, delay: Duration) -> Self {
        Self {
            threshold,
            delay,
            last: None,
            unchanged: 0,
            deadline: None,
            reported: false,
        }
    }

    /// Create a settler from tour options.
    #[must_use]
    pub fn from_options(options: &TourOptions) -> Self {
        Self::new(options.settle_samples, options.settle_delay())
    }

    /// Ask the host to center `element` and return a fresh settler for it.
    pub fn start<H>(host: &mut H, element: &H::Element, options: &TourOptions) -> Self
    where
        H: DocumentGeometry + ?Sized,
    {
        host.scroll_into_view_centered(element);
        Self::from_options(options)
    }

    /// Feed one animation-frame sample.
    pub fn sample(&mut self, offset: ScrollOffset, now: Duration) -> SettleProgress {
        if self.reported {
            return SettleProgress::Spent;
        }

        if self.deadline.is_none() {
            match self.last {
                Some(last) if last == offset => self.unchanged += 1,
                _ => {
                    self.last = Some(offset);
                    self.unchanged = 0;
                }
            }
            if self.unchanged <= self.threshold {
                return SettleProgress::Sampling;
            }
            tracing::trace!(
                message = "tour.settle.stopped",
                samples = self.unchanged,
                scroll_y = offset.y
            );
            self.deadline = Some(now.saturating_add(self.delay));
        }

        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.reported = true;
                SettleProgress::Settled
            }
            _ => SettleProgress::Delaying,
        }
    }

    /// Consecutive unchanged samples observed so far.
    #[must_use]
    pub fn unchanged_samples(&self) -> u32 {
        self.unchanged
    }

    /// Whether settling has been reported.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.reported
    }
}
