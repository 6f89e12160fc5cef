use serde::{Deserialize, Serialize};
use std::fmt;

const CLOCK_BITS: u32 = 48;
const CLOCK_MASK: u64 = (1 << CLOCK_BITS) - 1;

/// An (actor, logical clock) pair packed into one word: the actor index in
/// the high 16 bits, the clock in the low 48.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Epoch(u64);

impl Epoch {
    pub const MAX_ACTOR: usize = (1 << (64 - CLOCK_BITS)) - 1;
    pub const MAX_CLOCK: u64 = CLOCK_MASK;

    /// Clock 0 of actor 0. Precedes everything.
    pub const ZERO: Epoch = Epoch(0);

    /// Marks a location whose reads are tracked by a full vector clock.
    pub const READ_SHARED: Epoch = Epoch(u64::MAX);

    pub fn new(actor: usize, clock: u64) -> Self {
        assert!(actor <= Self::MAX_ACTOR, "actor index {actor} does not fit in an epoch");
        assert!(clock <= Self::MAX_CLOCK, "epoch clock overflow for actor {actor}");
        Epoch(((actor as u64) << CLOCK_BITS) | clock)
    }

    /// The zero epoch of a given actor.
    pub fn zero(actor: usize) -> Self {
        Epoch::new(actor, 0)
    }

    pub fn actor(self) -> usize {
        (self.0 >> CLOCK_BITS) as usize
    }

    pub fn clock(self) -> u64 {
        self.0 & CLOCK_MASK
    }

    pub fn tick(self) -> Self {
        Epoch::new(self.actor(), self.clock() + 1)
    }

    pub fn is_read_shared(self) -> bool {
        self == Epoch::READ_SHARED
    }

    pub fn leq(self, other: Epoch) -> bool {
        self.clock() <= other.clock()
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_read_shared() {
            write!(f, "shared")
        } else {
            write!(f, "{}@{}", self.clock(), self.actor())
        }
    }
}
