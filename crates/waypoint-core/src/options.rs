#![forbid(unsafe_code)]

//! Tour options.
//!
//! Every field defaults to the fixed behavior of a plain tour, so
//! `TourOptions::default()` is what an empty options object means. Unknown
//! keys are ignored when loading, which keeps option objects written for
//! newer versions loadable.
//!
//! ```toml
//! settle_samples = 7
//! settle_delay_ms = 100
//! cancel_key_code = 27
//! default_position = "right"
//! ```

use core::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{ESCAPE_KEY_CODE, KeyInput};
use crate::placement::Side;

/// Consecutive unchanged scroll samples that must be exceeded before a
/// scroll counts as settled.
pub const DEFAULT_SETTLE_SAMPLES: u32 = 7;

/// Delay between scroll settling and rendering, in milliseconds.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 100;

/// Errors from loading [`TourOptions`].
#[derive(Debug, Error)]
pub enum OptionsError {
    /// JSON parse failure.
    #[error("invalid tour options JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// TOML parse failure.
    #[error("invalid tour options TOML: {0}")]
    Toml(#[from] toml::de::Error),
    /// Parsed, but out of range.
    #[error("invalid tour options: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Tunable tour behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TourOptions {
    /// Unchanged scroll samples to exceed before the settle delay starts.
    pub settle_samples: u32,
    /// Delay after the scroll stopped, before rendering (ms).
    pub settle_delay_ms: u64,
    /// Key code that cancels the tour.
    pub cancel_key_code: u32,
    /// Side used by step definitions that omit `position`.
    pub default_position: Side,
}

impl Default for TourOptions {
    fn default() -> Self {
        Self {
            settle_samples: DEFAULT_SETTLE_SAMPLES,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            cancel_key_code: ESCAPE_KEY_CODE,
            default_position: Side::Right,
        }
    }
}

impl TourOptions {
    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, OptionsError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, OptionsError> {
        Ok(toml::from_str(s)?)
    }

    /// Settle delay as a [`Duration`].
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Whether `key` cancels the tour.
    ///
    /// Matches the configured key code, and also the `"Escape"` key name
    /// while the code is left at its default.
    #[must_use]
    pub fn is_cancel_key(&self, key: &KeyInput) -> bool {
        if key.code == self.cancel_key_code {
            return true;
        }
        self.cancel_key_code == ESCAPE_KEY_CODE && key.key == "Escape"
    }

    /// Return `self` if [`validate`](Self::validate) finds no problems.
    pub fn validated(self) -> Result<Self, OptionsError> {
        let problems = self.validate();
        if problems.is_empty() {
            Ok(self)
        } else {
            Err(OptionsError::Invalid(problems))
        }
    }

    /// Validate ranges. An empty list means the options are usable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.settle_samples == 0 {
            errors.push("settle_samples must be > 0".into());
        }
        if self.settle_delay_ms > 10_000 {
            errors.push(format!(
                "settle_delay_ms must be <= 10000, got {}",
                self.settle_delay_ms
            ));
        }
        if self.cancel_key_code == 0 {
            errors.push("cancel_key_code must be a non-zero key code".into());
        }
        errors
    }
}
