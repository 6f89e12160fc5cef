use thiserror::Error;

use crate::id::ActorId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MailboxError {
    #[error("there are more than {bound} instances of '{event}' in the input queue of {owner}")]
    AssertBoundExceeded {
        owner: ActorId,
        event: String,
        bound: usize,
    },

    #[error("assumed at most {bound} instances of '{event}' in the input queue of {owner}")]
    AssumeBoundExceeded {
        owner: ActorId,
        event: String,
        bound: usize,
    },

    #[error("{owner} halted before dequeueing must-handle event '{event}'")]
    MustHandleDropped { owner: ActorId, event: String },

    #[error("must-handle event '{event}' was sent to halted {owner}")]
    MustHandleSentToHalted { owner: ActorId, event: String },
}

impl MailboxError {
    /// True for errors that are reportable bugs; false for pruned executions.
    pub fn is_safety_violation(&self) -> bool {
        !matches!(self, MailboxError::AssumeBoundExceeded { .. })
    }
}
