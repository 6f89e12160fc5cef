use serde::{Deserialize, Serialize};
use std::fmt;

use crate::epoch::Epoch;

/// Per-owner summary of the latest action known from every actor.
///
/// Component `i` always holds an epoch of actor `i`. Storage grows on demand
/// and new slots are filled with that actor's zero epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorClock {
    values: Vec<Epoch>,
}

impl VectorClock {
    pub fn new() -> Self {
        VectorClock::default()
    }

    /// Clock of a newly started actor: its own component at 1.
    pub fn initial(owner: usize) -> Self {
        let mut vc = VectorClock::new();
        vc.set_component(owner, Epoch::new(owner, 1));
        vc
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get_component(&self, actor: usize) -> Epoch {
        self.values.get(actor).copied().unwrap_or_else(|| Epoch::zero(actor))
    }

    pub fn set_component(&mut self, actor: usize, epoch: Epoch) {
        assert_eq!(
            epoch.actor(),
            actor,
            "epoch {epoch} stored in component of actor {actor}"
        );
        self.grow(actor);
        self.values[actor] = epoch;
    }

    /// Advance the owner's component and return the new epoch.
    pub fn tick(&mut self, owner: usize) -> Epoch {
        let next = self.get_component(owner).tick();
        self.set_component(owner, next);
        next
    }

    /// Per-component maximum with `other`.
    pub fn join(&mut self, other: &VectorClock) {
        if other.len() > self.len() {
            self.grow(other.len() - 1);
        }
        for (mine, theirs) in self.values.iter_mut().zip(&other.values) {
            if mine.clock() < theirs.clock() {
                *mine = *theirs;
            }
        }
    }

    /// Every component of `self` is at most the matching one of `other`.
    pub fn leq(&self, other: &VectorClock) -> bool {
        self.values
            .iter()
            .enumerate()
            .all(|(i, e)| e.leq(other.get_component(i)))
    }

    /// Some component of `self` exceeds the matching one of `other`. Extra
    /// non-zero components of `self` count as greater.
    pub fn any_gt(&self, other: &VectorClock) -> bool {
        self.next_gt(other, 0).is_some()
    }

    /// First index at or after `start` where `self` exceeds `other`.
    pub fn next_gt(&self, other: &VectorClock, start: usize) -> Option<usize> {
        (start..self.len()).find(|&i| self.values[i].clock() > other.get_component(i).clock())
    }

    /// The action `epoch` is known to this clock.
    pub fn covers(&self, epoch: Epoch) -> bool {
        epoch.leq(self.get_component(epoch.actor()))
    }

    pub fn epochs(&self) -> &[Epoch] {
        &self.values
    }

    fn grow(&mut self, actor: usize) {
        while self.values.len() <= actor {
            let idx = self.values.len();
            self.values.push(Epoch::zero(idx));
        }
    }
}

impl fmt::Display for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clocks: Vec<String> = self.values.iter().map(|e| e.clock().to_string()).collect();
        write!(f, "[{}]", clocks.join(", "))
    }
}
