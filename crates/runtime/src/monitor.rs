use skein_mailbox::Event;

use crate::error::RuntimeError;

/// Synchronous observer of events announced with `Context::monitor`.
///
/// A monitor checks safety properties by failing from `on_event`, and
/// liveness properties by staying hot: a monitor still hot when the program
/// terminates has been waiting forever for progress.
pub trait Monitor {
    fn name(&self) -> &str;

    fn on_event(&mut self, event: &Event) -> Result<(), RuntimeError>;

    fn is_hot(&self) -> bool {
        false
    }

    fn state_name(&self) -> Option<String> {
        None
    }
}
