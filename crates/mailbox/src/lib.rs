pub mod error;
pub mod event;
pub mod id;
pub mod queue;
pub mod shared;

pub use error::MailboxError;
pub use event::{Event, EventInfo, SendOptions, DEFAULT_EVENT, HALT_EVENT};
pub use id::ActorId;
pub use queue::{
    Dequeued, DequeueStatus, EnqueueStatus, EventQueue, Predicate, ReceiveFilter, ReceiveOutcome,
    StateHandlers,
};
pub use shared::SharedEventQueue;
