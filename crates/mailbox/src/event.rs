use serde::{Deserialize, Serialize};
use std::fmt;

use crate::id::ActorId;

/// Name of the synthetic event returned when a default handler fires.
pub const DEFAULT_EVENT: &str = "Default";

/// Name of the event that halts the actor that dequeues it.
pub const HALT_EVENT: &str = "Halt";

/// An immutable typed message. The name is the event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    name: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    payload: serde_json::Value,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Event {
            name: name.into(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Event {
            name: name.into(),
            payload,
        }
    }

    pub fn default_event() -> Self {
        Event::new(DEFAULT_EVENT)
    }

    pub fn halt() -> Self {
        Event::new(HALT_EVENT)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_EVENT
    }

    pub fn is_halt(&self) -> bool {
        self.name == HALT_EVENT
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.payload.is_null() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}({})", self.name, self.payload)
        }
    }
}

/// Per-send options, attached by the sender.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendOptions {
    /// The receiver must dequeue this event before it halts.
    pub must_handle: bool,
    /// Max queued instances of this event type; exceeding it is a bug.
    pub assert: Option<usize>,
    /// Max queued instances of this event type; exceeding it prunes the execution.
    pub assume: Option<usize>,
    /// User-defined hash of the payload, folded into the mailbox fingerprint.
    pub hashed_state: Option<i64>,
}

/// Metadata that travels with an event through a mailbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInfo {
    pub event_name: String,
    /// Sender, or `None` for events injected by the test environment.
    pub origin: Option<ActorId>,
    pub must_handle: bool,
    pub assert: Option<usize>,
    pub assume: Option<usize>,
    pub hashed_state: Option<i64>,
    /// Sequence number of the send, used to match a dequeue to its send.
    pub send_seq: Option<u64>,
}

impl EventInfo {
    pub fn new(event: &Event, origin: Option<ActorId>) -> Self {
        EventInfo {
            event_name: event.name().to_string(),
            origin,
            must_handle: false,
            assert: None,
            assume: None,
            hashed_state: None,
            send_seq: None,
        }
    }

    pub fn with_options(event: &Event, origin: Option<ActorId>, options: &SendOptions) -> Self {
        EventInfo {
            must_handle: options.must_handle,
            assert: options.assert,
            assume: options.assume,
            hashed_state: options.hashed_state,
            ..EventInfo::new(event, origin)
        }
    }

    pub fn with_send_seq(mut self, seq: u64) -> Self {
        self.send_seq = Some(seq);
        self
    }
}
