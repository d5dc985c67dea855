#![forbid(unsafe_code)]

//! Tour error taxonomy.

use thiserror::Error;

/// Errors surfaced by tour construction and sequencing.
///
/// `Clone` so the same failure can be returned from the dispatch call that
/// hit it and stored in the tour's [`Completion`](crate::Completion).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TourError {
    /// The step sequence was empty.
    #[error("unable to create an empty tour")]
    EmptySequence,
    /// A step's target selector matched no element when the step began.
    #[error("target '{selector}' for step {index} was not found")]
    TargetNotFound {
        /// Index of the step whose target was missing.
        index: usize,
        /// The selector that failed to resolve.
        selector: String,
    },
}

impl TourError {
    /// Step index carried by the error, if any.
    #[must_use]
    pub fn step_index(&self) -> Option<usize> {
        match self {
            Self::EmptySequence => None,
            Self::TargetNotFound { index, .. } => Some(*index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_not_found_message_names_step_and_selector() {
        let err = TourError::TargetNotFound {
            index: 3,
            selector: "#missing".into(),
        };
        assert_eq!(err.to_string(), "target '#missing' for step 3 was not found");
        assert_eq!(err.step_index(), Some(3));
    }

    #[test]
    fn empty_sequence_has_no_index() {
        assert_eq!(TourError::EmptySequence.step_index(), None);
    }
}
