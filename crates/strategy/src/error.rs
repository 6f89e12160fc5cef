use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulingError {
    /// The program's decisions no longer match what was recorded for this
    /// position. The scheduler does not control all nondeterminism.
    #[error("nondeterminism detected at step {step}: {reason}")]
    Divergence { step: usize, reason: String },

    #[error("nondeterministic choice over an empty range")]
    EmptyChoiceRange,
}

impl SchedulingError {
    pub fn divergence(step: usize, reason: impl Into<String>) -> Self {
        SchedulingError::Divergence {
            step,
            reason: reason.into(),
        }
    }
}
