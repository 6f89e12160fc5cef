use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::MailboxError;
use crate::event::{Event, EventInfo};
use crate::queue::{Dequeued, EnqueueStatus, EventQueue, ReceiveFilter, ReceiveOutcome, StateHandlers};

/// Mutex-guarded mailbox for runtimes that run actors on real threads,
/// where `enqueue` is called from the sender's thread and `dequeue` from the
/// owner's.
#[derive(Clone)]
pub struct SharedEventQueue {
    inner: Arc<Mutex<EventQueue>>,
}

impl SharedEventQueue {
    pub fn new(queue: EventQueue) -> Self {
        SharedEventQueue {
            inner: Arc::new(Mutex::new(queue)),
        }
    }

    pub fn enqueue(&self, event: Event, info: EventInfo) -> Result<EnqueueStatus, MailboxError> {
        self.lock().enqueue(event, info)
    }

    pub fn dequeue(&self, handlers: &dyn StateHandlers) -> Dequeued {
        self.lock().dequeue(handlers)
    }

    pub fn raise(&self, event: Event, info: EventInfo) {
        self.lock().raise(event, info)
    }

    pub fn receive(&self, filter: ReceiveFilter) -> ReceiveOutcome {
        self.lock().receive(filter)
    }

    pub fn take_received(&self) -> Option<(Event, EventInfo)> {
        self.lock().take_received()
    }

    pub fn close(&self) -> Result<(), MailboxError> {
        self.lock().close()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, EventQueue> {
        // A panicking handler leaves the queue itself consistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
