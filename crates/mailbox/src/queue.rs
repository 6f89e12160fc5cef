use std::collections::VecDeque;
use std::fmt;

use tracing::debug;

use crate::error::MailboxError;
use crate::event::{Event, EventInfo};
use crate::id::ActorId;

/// Per-state handler declarations of the actor that owns a queue.
///
/// Implemented by the actor runtime; the queue only asks these three
/// questions and knows nothing else about state-machine shape.
pub trait StateHandlers {
    fn is_event_ignored(&self, event: &Event) -> bool;
    fn is_event_deferred(&self, event: &Event) -> bool;
    fn is_default_handler_installed(&self) -> bool;
}

pub type Predicate = Box<dyn Fn(&Event) -> bool + Send + Sync>;

/// Event types (with optional predicates) an actor is waiting to receive.
#[derive(Default)]
pub struct ReceiveFilter {
    entries: Vec<(String, Option<Predicate>)>,
}

impl ReceiveFilter {
    pub fn new() -> Self {
        ReceiveFilter::default()
    }

    /// Filter accepting any event with one of the given names.
    pub fn of(names: &[&str]) -> Self {
        names
            .iter()
            .fold(ReceiveFilter::new(), |filter, name| filter.event(*name))
    }

    pub fn event(mut self, name: impl Into<String>) -> Self {
        self.entries.push((name.into(), None));
        self
    }

    pub fn event_where<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.entries.push((name.into(), Some(Box::new(predicate))));
        self
    }

    pub fn matches(&self, event: &Event) -> bool {
        self.entries.iter().any(|(name, predicate)| {
            name == event.name() && predicate.as_ref().map_or(true, |p| p(event))
        })
    }

    pub fn event_names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ReceiveFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.event_names()).finish()
    }
}

/// Result of an enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueStatus {
    /// Delivered straight to a pending receive.
    Received,
    EventHandlerRunning,
    /// The owner was idle and is now marked running; it must be scheduled.
    EventHandlerNotRunning,
    /// The queue is closed; the event was discarded.
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DequeueStatus {
    Raised,
    Success,
    Default,
    NotAvailable,
}

/// Result of a dequeue.
#[derive(Debug, Clone, PartialEq)]
pub enum Dequeued {
    Raised(Event, EventInfo),
    Success(Event, EventInfo),
    /// Nothing dequeuable, but the current state installs a default handler.
    Default(Event),
    NotAvailable,
}

impl Dequeued {
    pub fn status(&self) -> DequeueStatus {
        match self {
            Dequeued::Raised(..) => DequeueStatus::Raised,
            Dequeued::Success(..) => DequeueStatus::Success,
            Dequeued::Default(_) => DequeueStatus::Default,
            Dequeued::NotAvailable => DequeueStatus::NotAvailable,
        }
    }

    pub fn event(&self) -> Option<&Event> {
        match self {
            Dequeued::Raised(e, _) | Dequeued::Success(e, _) | Dequeued::Default(e) => Some(e),
            Dequeued::NotAvailable => None,
        }
    }
}

/// Result of an explicit receive.
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiveOutcome {
    /// A queued event matched and was removed.
    Ready(Event, EventInfo),
    /// Nothing matched; the filter is installed and the owner must suspend.
    Waiting,
}

/// One actor's mailbox.
///
/// Queued events keep arrival order. A raised event sits in its own slot and
/// always wins over the queue. At most one receive filter is pending at a
/// time; an enqueue that matches it bypasses the queue and lands in the
/// received slot, where the runtime picks it up when it resumes the owner.
pub struct EventQueue {
    owner: ActorId,
    queue: VecDeque<(Event, EventInfo)>,
    raised: Option<(Event, EventInfo)>,
    waiting: Option<ReceiveFilter>,
    received: Option<(Event, EventInfo)>,
    handler_running: bool,
    closed: bool,
    user_state_hashing: bool,
}

impl EventQueue {
    pub fn new(owner: ActorId) -> Self {
        EventQueue {
            owner,
            queue: VecDeque::new(),
            raised: None,
            waiting: None,
            received: None,
            handler_running: false,
            closed: false,
            user_state_hashing: false,
        }
    }

    /// Fold user-defined event hashes into `cached_state`.
    pub fn with_user_state_hashing(mut self, enabled: bool) -> Self {
        self.user_state_hashing = enabled;
        self
    }

    pub fn owner(&self) -> &ActorId {
        &self.owner
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_event_raised(&self) -> bool {
        self.raised.is_some()
    }

    /// Advisory: tracks `EnqueueStatus` for the threaded variant. The
    /// controlled runtime computes the enabled set from the queue instead.
    pub fn is_handler_running(&self) -> bool {
        self.handler_running
    }

    pub fn is_waiting_to_receive(&self) -> bool {
        self.waiting.is_some()
    }

    pub fn has_received_event(&self) -> bool {
        self.received.is_some()
    }

    pub fn waiting_event_names(&self) -> Vec<String> {
        self.waiting
            .as_ref()
            .map(|f| f.event_names().into_iter().map(String::from).collect())
            .unwrap_or_default()
    }

    /// Queued events in arrival order.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.queue.iter().map(|(e, _)| e)
    }

    pub fn enqueue(&mut self, event: Event, info: EventInfo) -> Result<EnqueueStatus, MailboxError> {
        if self.closed {
            if info.must_handle {
                return Err(MailboxError::MustHandleSentToHalted {
                    owner: self.owner.clone(),
                    event: event.name().to_string(),
                });
            }
            debug!(owner = %self.owner, event = %event.name(), "dropping event sent to closed mailbox");
            return Ok(EnqueueStatus::Dropped);
        }

        if self.waiting.as_ref().is_some_and(|f| f.matches(&event)) {
            self.waiting = None;
            self.received = Some((event, info));
            return Ok(EnqueueStatus::Received);
        }

        let name = event.name().to_string();
        let (assert, assume) = (info.assert, info.assume);
        self.queue.push_back((event, info));

        if let Some(bound) = assert {
            if self.count_of(&name) > bound {
                return Err(MailboxError::AssertBoundExceeded {
                    owner: self.owner.clone(),
                    event: name,
                    bound,
                });
            }
        }

        if let Some(bound) = assume {
            if self.count_of(&name) > bound {
                return Err(MailboxError::AssumeBoundExceeded {
                    owner: self.owner.clone(),
                    event: name,
                    bound,
                });
            }
        }

        if self.handler_running {
            Ok(EnqueueStatus::EventHandlerRunning)
        } else {
            self.handler_running = true;
            Ok(EnqueueStatus::EventHandlerNotRunning)
        }
    }

    pub fn dequeue(&mut self, handlers: &dyn StateHandlers) -> Dequeued {
        if let Some((event, info)) = self.raised.take() {
            if !handlers.is_event_ignored(&event) {
                return Dequeued::Raised(event, info);
            }
            debug!(owner = %self.owner, event = %event.name(), "raised event is ignored in current state");
        }

        let mut idx = 0;
        while idx < self.queue.len() {
            let event = &self.queue[idx].0;
            if handlers.is_event_ignored(event) {
                self.queue.remove(idx);
                continue;
            }
            if handlers.is_event_deferred(event) {
                idx += 1;
                continue;
            }
            if let Some((event, info)) = self.queue.remove(idx) {
                return Dequeued::Success(event, info);
            }
        }

        if handlers.is_default_handler_installed() {
            return Dequeued::Default(Event::default_event());
        }

        self.handler_running = false;
        Dequeued::NotAvailable
    }

    /// Take the raised event unless the current state ignores it, in which
    /// case it is discarded. Never touches the queue.
    pub fn dequeue_raised(&mut self, handlers: &dyn StateHandlers) -> Option<(Event, EventInfo)> {
        let (event, info) = self.raised.take()?;
        if handlers.is_event_ignored(&event) {
            debug!(owner = %self.owner, event = %event.name(), "raised event is ignored in current state");
            return None;
        }
        Some((event, info))
    }

    /// Check-only variant of `dequeue`: would it return a raised or queued event?
    pub fn is_next_event_available(&self, handlers: &dyn StateHandlers) -> bool {
        let raised = self
            .raised
            .as_ref()
            .is_some_and(|(e, _)| !handlers.is_event_ignored(e));
        raised
            || self
                .queue
                .iter()
                .any(|(e, _)| !handlers.is_event_ignored(e) && !handlers.is_event_deferred(e))
    }

    /// Install the raised event, replacing any previous one.
    pub fn raise(&mut self, event: Event, info: EventInfo) {
        if let Some((previous, _)) = &self.raised {
            debug!(owner = %self.owner, event = %previous.name(), "overwriting raised event");
        }
        self.raised = Some((event, info));
    }

    /// Take the first queued event matching `filter`, or install the filter
    /// and report that the owner must wait.
    pub fn receive(&mut self, filter: ReceiveFilter) -> ReceiveOutcome {
        if let Some(idx) = self.queue.iter().position(|(e, _)| filter.matches(e)) {
            if let Some((event, info)) = self.queue.remove(idx) {
                return ReceiveOutcome::Ready(event, info);
            }
        }
        self.waiting = Some(filter);
        ReceiveOutcome::Waiting
    }

    /// Take the event delivered to a pending receive by `enqueue`.
    pub fn take_received(&mut self) -> Option<(Event, EventInfo)> {
        self.received.take()
    }

    /// Stop accepting events. Fails if a must-handle event is still queued.
    pub fn close(&mut self) -> Result<(), MailboxError> {
        self.closed = true;
        match self.queue.iter().find(|(_, info)| info.must_handle) {
            Some((event, _)) => Err(MailboxError::MustHandleDropped {
                owner: self.owner.clone(),
                event: event.name().to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Empty the queue, returning the undelivered events for drop reporting.
    pub fn dispose(&mut self) -> Vec<(Event, EventInfo)> {
        self.raised = None;
        self.waiting = None;
        self.received = None;
        self.queue.drain(..).collect()
    }

    /// Order-sensitive fingerprint of the queued events.
    pub fn cached_state(&self) -> i64 {
        self.queue.iter().fold(19i64, |hash, (_, info)| {
            let hash = hash.wrapping_mul(31).wrapping_add(name_hash(&info.event_name));
            match info.hashed_state {
                Some(state) if self.user_state_hashing => hash.wrapping_mul(31).wrapping_add(state),
                _ => hash,
            }
        })
    }

    fn count_of(&self, name: &str) -> usize {
        self.queue.iter().filter(|(e, _)| e.name() == name).count()
    }
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("owner", &self.owner)
            .field("queue", &self.events().map(Event::name).collect::<Vec<_>>())
            .field("raised", &self.raised.as_ref().map(|(e, _)| e.name()))
            .field("waiting", &self.waiting)
            .field("handler_running", &self.handler_running)
            .field("closed", &self.closed)
            .finish()
    }
}

fn name_hash(name: &str) -> i64 {
    name.bytes()
        .fold(0i64, |h, b| h.wrapping_mul(31).wrapping_add(i64::from(b)))
}
