//! State classification
//!
//! [`classify`] is a pure exact-match lookup against the label sets of a [`WaitSpec`].
//! [`TargetStreak`] layers the consecutive-target requirement on top of it so
//! a resource that flaps in and out of the target state does not end the wait
//! early.

use crate::StateLabel;
use crate::spec::WaitSpec;

/// Where a single observed label falls in a wait's label vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Not there yet, keep polling
    Pending,
    /// Desired terminal state
    Target,
    /// Explicitly tolerated, keep polling without counting toward success
    Ignored,
    /// Outside the declared vocabulary
    Unexpected,
}

/// Classify `label` against `spec`.
pub fn classify<S: StateLabel>(label: &S, spec: &WaitSpec<S>) -> Classification {
    if spec.target().contains(label) {
        Classification::Target
    } else if spec.pending().contains(label) {
        Classification::Pending
    } else if spec.ignored().contains(label) {
        Classification::Ignored
    } else {
        Classification::Unexpected
    }
}

/// What the polling loop should do after an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Succeed,
    Fail,
}

/// Counts consecutive target observations.
#[derive(Debug, Clone)]
pub struct TargetStreak {
    count: u32,
    required: u32,
}

impl TargetStreak {
    /// `required` of 0 behaves like 1.
    pub fn new(required: u32) -> Self {
        Self {
            count: 0,
            required: required.max(1),
        }
    }

    /// Feed one classification and decide what happens next.
    pub fn observe(&mut self, classification: Classification) -> Verdict {
        match classification {
            Classification::Target => {
                self.count += 1;
                if self.count >= self.required {
                    Verdict::Succeed
                } else {
                    Verdict::Continue
                }
            }
            Classification::Pending | Classification::Ignored => {
                self.reset();
                Verdict::Continue
            }
            Classification::Unexpected => {
                self.reset();
                Verdict::Fail
            }
        }
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn required(&self) -> u32 {
        self.required
    }
}
