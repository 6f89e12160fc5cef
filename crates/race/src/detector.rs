use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info};

use skein_mailbox::ActorId;

use crate::epoch::Epoch;
use crate::vclock::VectorClock;

/// A shared location touched outside the message-passing discipline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryLocation {
    pub object: String,
    pub offset: u64,
}

impl MemoryLocation {
    pub fn new(object: impl Into<String>, offset: u64) -> Self {
        MemoryLocation {
            object: object.into(),
            offset,
        }
    }
}

impl fmt::Display for MemoryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.object, self.offset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    Read,
    Write,
}

/// One access: who touched the location, and from where in the program.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Access {
    pub actor: ActorId,
    pub kind: AccessKind,
    pub source: String,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.kind {
            AccessKind::Read => "read",
            AccessKind::Write => "write",
        };
        write!(f, "{verb} by {} at {}", self.actor, self.source)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceKind {
    WriteWrite,
    WriteRead,
    ReadWrite,
    /// A write unordered with one of several concurrent readers.
    SharedReadWrite,
}

impl fmt::Display for RaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RaceKind::WriteWrite => "write-write",
            RaceKind::WriteRead => "write-read",
            RaceKind::ReadWrite => "read-write",
            RaceKind::SharedReadWrite => "shared-read-write",
        };
        f.write_str(name)
    }
}

/// Two accesses to one location with no happens-before edge between them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RaceReport {
    pub kind: RaceKind,
    pub location: MemoryLocation,
    pub earlier: Access,
    pub later: Access,
}

impl fmt::Display for RaceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} race on {}: {} and {}",
            self.kind, self.location, self.earlier, self.later
        )
    }
}

#[derive(Debug)]
struct VariableState {
    write: Epoch,
    last_write: Option<Access>,
    /// Exclusive read epoch, or `Epoch::READ_SHARED` when `read_clock` is in use.
    read: Epoch,
    read_clock: VectorClock,
    last_reads: HashMap<usize, Access>,
}

impl VariableState {
    fn new() -> Self {
        VariableState {
            write: Epoch::ZERO,
            last_write: None,
            read: Epoch::ZERO,
            read_clock: VectorClock::new(),
            last_reads: HashMap::new(),
        }
    }
}

/// FastTrack-style happens-before race detector.
///
/// Happens-before edges come from actor creation (creator to created) and
/// message delivery (send to the dequeue of the same send sequence number).
/// Reads stay on the single-epoch fast path until a second actor reads the
/// location concurrently.
#[derive(Debug, Default)]
pub struct RaceDetector {
    clocks: HashMap<usize, VectorClock>,
    sends: HashMap<u64, VectorClock>,
    variables: HashMap<MemoryLocation, VariableState>,
    races: Vec<RaceReport>,
}

fn index(actor: &ActorId) -> usize {
    actor.value() as usize
}

impl RaceDetector {
    pub fn new() -> Self {
        RaceDetector::default()
    }

    pub fn reset(&mut self) {
        self.clocks.clear();
        self.sends.clear();
        self.variables.clear();
        self.races.clear();
    }

    /// Current clock of `actor`, if it has been seen.
    pub fn clock(&self, actor: &ActorId) -> Option<&VectorClock> {
        self.clocks.get(&index(actor))
    }

    pub fn races(&self) -> &[RaceReport] {
        &self.races
    }

    pub fn take_races(&mut self) -> Vec<RaceReport> {
        std::mem::take(&mut self.races)
    }

    fn clock_mut(&mut self, actor: &ActorId) -> &mut VectorClock {
        let idx = index(actor);
        self.clocks
            .entry(idx)
            .or_insert_with(|| VectorClock::initial(idx))
    }

    /// `source` is `None` for actors created by the test environment.
    pub fn on_create(&mut self, source: Option<&ActorId>, target: &ActorId) {
        let creator = source.map(|s| self.clock_mut(s).clone());
        let clock = self.clock_mut(target);
        if let Some(creator) = creator {
            clock.join(&creator);
        }
        if let Some(source) = source {
            self.clock_mut(source).tick(index(source));
        }
    }

    /// Snapshot the sender's clock under the send sequence number.
    pub fn on_send(&mut self, sender: Option<&ActorId>, send_seq: u64) {
        if let Some(sender) = sender {
            let snapshot = self.clock_mut(sender).clone();
            self.sends.insert(send_seq, snapshot);
            self.clock_mut(sender).tick(index(sender));
        }
    }

    pub fn on_dequeue(&mut self, receiver: &ActorId, send_seq: Option<u64>) {
        let snapshot = send_seq.and_then(|seq| self.sends.remove(&seq));
        let clock = self.clock_mut(receiver);
        if let Some(snapshot) = snapshot {
            clock.join(&snapshot);
        }
        clock.tick(index(receiver));
    }

    pub fn on_read(&mut self, actor: &ActorId, location: &MemoryLocation, source: &str) {
        let t = index(actor);
        let clock = self.clock_mut(actor).clone();
        let now = clock.get_component(t);
        let access = Access {
            actor: actor.clone(),
            kind: AccessKind::Read,
            source: source.to_string(),
        };

        let var = self
            .variables
            .entry(location.clone())
            .or_insert_with(VariableState::new);
        if var.read == now {
            return;
        }

        let mut found = None;
        if !clock.covers(var.write) {
            if let Some(earlier) = &var.last_write {
                found = Some((RaceKind::WriteRead, earlier.clone()));
            }
        }

        if var.read.is_read_shared() {
            var.read_clock.set_component(t, now);
        } else if clock.covers(var.read) {
            var.read = now;
        } else {
            let previous = var.read;
            var.read_clock = VectorClock::new();
            var.read_clock.set_component(previous.actor(), previous);
            var.read_clock.set_component(t, now);
            var.read = Epoch::READ_SHARED;
            debug!(location = %location, "location escalated to shared reads");
        }
        var.last_reads.insert(t, access.clone());

        if let Some((kind, earlier)) = found {
            self.report(kind, location, earlier, access);
        }
    }

    pub fn on_write(&mut self, actor: &ActorId, location: &MemoryLocation, source: &str) {
        let t = index(actor);
        let clock = self.clock_mut(actor).clone();
        let now = clock.get_component(t);
        let access = Access {
            actor: actor.clone(),
            kind: AccessKind::Write,
            source: source.to_string(),
        };

        let var = self
            .variables
            .entry(location.clone())
            .or_insert_with(VariableState::new);
        if var.write == now {
            return;
        }

        let mut found = Vec::new();
        if !clock.covers(var.write) {
            if let Some(earlier) = &var.last_write {
                found.push((RaceKind::WriteWrite, earlier.clone()));
            }
        }

        if var.read.is_read_shared() {
            let mut start = 0;
            while let Some(reader) = var.read_clock.next_gt(&clock, start) {
                if let Some(earlier) = var.last_reads.get(&reader) {
                    found.push((RaceKind::SharedReadWrite, earlier.clone()));
                }
                start = reader + 1;
            }
            var.read = Epoch::ZERO;
            var.read_clock = VectorClock::new();
        } else if !clock.covers(var.read) {
            if let Some(earlier) = var.last_reads.get(&var.read.actor()) {
                found.push((RaceKind::ReadWrite, earlier.clone()));
            }
        }

        var.write = now;
        var.last_write = Some(access.clone());

        for (kind, earlier) in found {
            self.report(kind, location, earlier, access.clone());
        }
    }

    fn report(&mut self, kind: RaceKind, location: &MemoryLocation, earlier: Access, later: Access) {
        let race = RaceReport {
            kind,
            location: location.clone(),
            earlier,
            later,
        };
        if self.races.contains(&race) {
            return;
        }
        info!(%race, "data race detected");
        self.races.push(race);
    }
}
