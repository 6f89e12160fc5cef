use skein_mailbox::{ActorId, MailboxError};
use skein_strategy::SchedulingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("assertion failed: {0}")]
    AssertionFailed(String),

    /// Unsatisfied `Context::assume`. The iteration is discarded, not reported.
    #[error("assumption failed: {0}")]
    AssumptionFailed(String),

    #[error(transparent)]
    Mailbox(#[from] MailboxError),

    #[error(transparent)]
    Scheduling(#[from] SchedulingError),

    #[error("actor not found: {0}")]
    ActorNotFound(ActorId),

    #[error("{actor} received event '{event}' that cannot be handled")]
    UnhandledEvent { actor: ActorId, event: String },

    #[error("invalid trace: {0}")]
    InvalidTrace(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// What an error means for the iteration it happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// A reportable bug; exploration moves on to the next iteration.
    Bug,
    /// The execution violated an assumption and is discarded.
    Pruned,
    /// The run cannot continue.
    Fatal,
}

impl RuntimeError {
    pub fn unhandled(actor: &ActorId, event: &skein_mailbox::Event) -> Self {
        RuntimeError::UnhandledEvent {
            actor: actor.clone(),
            event: event.name().to_string(),
        }
    }

    pub fn classify(&self) -> ErrorClass {
        match self {
            RuntimeError::AssertionFailed(_)
            | RuntimeError::ActorNotFound(_)
            | RuntimeError::UnhandledEvent { .. } => ErrorClass::Bug,
            RuntimeError::Mailbox(e) if e.is_safety_violation() => ErrorClass::Bug,
            RuntimeError::Mailbox(_) | RuntimeError::AssumptionFailed(_) => ErrorClass::Pruned,
            RuntimeError::Scheduling(_)
            | RuntimeError::InvalidTrace(_)
            | RuntimeError::Config(_)
            | RuntimeError::Io(_) => ErrorClass::Fatal,
        }
    }
}
