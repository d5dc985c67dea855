#![forbid(unsafe_code)]

//! Tour steps and the validated step sequence.

use core::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::TourError;
use crate::placement::Side;
use crate::signal::{AdvancePayload, AdvanceSignal};

/// Called when a step begins: `(index, step, previous_result)`.
///
/// `previous_result` is the payload the previous step's advance signal fired
/// with (`None` for step 0 or when no payload was given).
pub type OnCreate = Rc<dyn Fn(usize, &Step, Option<&AdvancePayload>)>;

/// Called when a step's advance control is activated:
/// `(next_index, next_step, signal)`.
///
/// `next_step` is `None` on the last step. The callback decides when (and
/// whether) to fire `signal`; it may keep the signal and fire it later.
pub type OnNext = Rc<dyn Fn(usize, Option<&Step>, AdvanceSignal)>;

/// One unit of a guided tour.
#[derive(Clone)]
pub struct Step {
    target: String,
    content: String,
    position: Option<Side>,
    on_create: Option<OnCreate>,
    on_next: Option<OnNext>,
}

impl Step {
    /// A step targeting `selector`, tooltip on the right, no content.
    #[must_use]
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            target: selector.into(),
            content: String::new(),
            position: Some(Side::default()),
            on_create: None,
            on_next: None,
        }
    }

    /// Set the tooltip content. Passed to the renderer untouched.
    #[must_use]
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Place the tooltip on `side` of the target.
    #[must_use]
    pub fn position(mut self, side: Side) -> Self {
        self.position = Some(side);
        self
    }

    /// Leave the tooltip at the renderer's default insertion position.
    #[must_use]
    pub fn unpositioned(mut self) -> Self {
        self.position = None;
        self
    }

    /// Set the step-begin callback.
    #[must_use]
    pub fn on_create<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, &Step, Option<&AdvancePayload>) + 'static,
    {
        self.on_create = Some(Rc::new(f));
        self
    }

    /// Set the advance-control callback.
    #[must_use]
    pub fn on_next<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Option<&Step>, AdvanceSignal) + 'static,
    {
        self.on_next = Some(Rc::new(f));
        self
    }

    /// Build a step from a serialized definition.
    ///
    /// A missing position falls back to `default_side`; an unrecognized one
    /// leaves the tooltip unpositioned.
    #[must_use]
    pub fn from_def(def: StepDef, default_side: Side) -> Self {
        let position = match def.position.as_deref() {
            None => Some(default_side),
            Some(name) => match name.parse::<Side>() {
                Ok(side) => Some(side),
                Err(err) => {
                    tracing::warn!(
                        message = "tour.step.position_unrecognized",
                        selector = %def.target,
                        error = %err
                    );
                    None
                }
            },
        };
        Self {
            target: def.target,
            content: def.content,
            position,
            on_create: None,
            on_next: None,
        }
    }

    /// Target selector, resolved against the live document when the step begins.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Tooltip content.
    #[must_use]
    pub fn content_str(&self) -> &str {
        &self.content
    }

    /// Tooltip side, or `None` when unpositioned.
    #[must_use]
    pub fn side(&self) -> Option<Side> {
        self.position
    }

    /// The step-begin callback, if any.
    #[must_use]
    pub fn create_callback(&self) -> Option<&OnCreate> {
        self.on_create.as_ref()
    }

    /// The advance-control callback, if any.
    #[must_use]
    pub fn next_callback(&self) -> Option<&OnNext> {
        self.on_next.as_ref()
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("target", &self.target)
            .field("content", &self.content)
            .field("position", &self.position)
            .field("on_create", &self.on_create.is_some())
            .field("on_next", &self.on_next.is_some())
            .finish()
    }
}

/// Serializable step definition (no callbacks).
///
/// `html` is accepted as an alias of `content`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StepDef {
    /// Target selector.
    pub target: String,
    /// Tooltip content.
    #[serde(alias = "html")]
    pub content: String,
    /// Side name; `None` means "use the default side".
    pub position: Option<String>,
}

/// Ordered, non-empty list of steps.
///
/// Cheap to clone; steps are shared and immutable once the sequence exists.
#[derive(Clone, Debug)]
pub struct StepSequence {
    steps: Rc<[Step]>,
}

impl StepSequence {
    /// Validate and wrap a list of steps.
    pub fn new(steps: Vec<Step>) -> Result<Self, TourError> {
        if steps.is_empty() {
            return Err(TourError::EmptySequence);
        }
        Ok(Self {
            steps: steps.into(),
        })
    }

    /// Number of steps (always at least 1).
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always `false`; present for API symmetry with slices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// Iterate over the steps in order.
    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }
}
