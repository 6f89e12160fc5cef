use skein_mailbox::{Event, StateHandlers};

use crate::error::RuntimeError;
use crate::runtime::Context;

/// An event-driven actor under test.
///
/// Handlers run to completion. To wait for a specific event a handler calls
/// `Context::receive` and returns; the matching event is then delivered to
/// `on_receive`. Every handler may fail with a `RuntimeError`, which ends the
/// iteration.
pub trait Actor {
    fn on_start(&mut self, cx: &mut Context<'_>) -> Result<(), RuntimeError> {
        let _ = cx;
        Ok(())
    }

    fn on_event(&mut self, cx: &mut Context<'_>, event: &Event) -> Result<(), RuntimeError>;

    /// Delivery of an event requested through `Context::receive`.
    fn on_receive(&mut self, cx: &mut Context<'_>, event: &Event) -> Result<(), RuntimeError> {
        self.on_event(cx, event)
    }

    /// Dropped on dequeue in the current state.
    fn is_event_ignored(&self, event: &Event) -> bool {
        let _ = event;
        false
    }

    /// Left in the mailbox in the current state.
    fn is_event_deferred(&self, event: &Event) -> bool {
        let _ = event;
        false
    }

    /// Runs with a synthetic `Default` event when nothing else is dequeuable.
    fn has_default_handler(&self) -> bool {
        false
    }

    fn state_name(&self) -> Option<String> {
        None
    }

    /// User-defined fingerprint of the actor's private state.
    fn hashed_state(&self) -> i64 {
        0
    }
}

/// Mailbox view of an actor's current state.
pub(crate) struct Handlers<'a>(pub &'a dyn Actor);

impl StateHandlers for Handlers<'_> {
    fn is_event_ignored(&self, event: &Event) -> bool {
        self.0.is_event_ignored(event)
    }

    fn is_event_deferred(&self, event: &Event) -> bool {
        self.0.is_event_deferred(event)
    }

    fn is_default_handler_installed(&self) -> bool {
        self.0.has_default_handler()
    }
}
