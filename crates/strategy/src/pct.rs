use std::collections::BTreeSet;

use tracing::debug;

use skein_mailbox::ActorId;

use crate::error::SchedulingError;
use crate::rng::SeededRng;
use crate::strategy::{depth_bound_reached, SchedulingStrategy};

/// Priority-based scheduling with a bounded number of priority changes.
///
/// Always runs the highest-priority enabled actor. Newly seen actors get a
/// random priority below the first. At each change point the highest-priority
/// enabled actor is demoted to the lowest priority.
#[derive(Debug)]
pub struct PctStrategy {
    rng: SeededRng,
    max_steps: usize,
    scheduled_steps: usize,
    schedule_length: usize,
    max_priority_switches: usize,
    priorities: Vec<ActorId>,
    change_points: BTreeSet<usize>,
}

impl PctStrategy {
    pub fn new(seed: u64, max_steps: usize, max_priority_switches: usize) -> Self {
        PctStrategy {
            rng: SeededRng::new(seed),
            max_steps,
            scheduled_steps: 0,
            schedule_length: 0,
            max_priority_switches,
            priorities: Vec::new(),
            change_points: BTreeSet::new(),
        }
    }

    /// Actors from highest to lowest priority.
    pub fn priorities(&self) -> &[ActorId] {
        &self.priorities
    }

    pub fn change_points(&self) -> impl Iterator<Item = &usize> {
        self.change_points.iter()
    }

    fn highest_enabled(&self, enabled: &[ActorId]) -> Option<ActorId> {
        self.priorities.iter().find(|p| enabled.contains(p)).cloned()
    }

    fn assign_priorities(&mut self, enabled: &[ActorId], current: Option<&ActorId>) {
        if self.priorities.is_empty() {
            if let Some(current) = current {
                self.priorities.push(current.clone());
            }
        }
        for id in enabled {
            if self.priorities.contains(id) {
                continue;
            }
            let idx = if self.priorities.is_empty() {
                0
            } else {
                self.rng.next_index(self.priorities.len()) + 1
            };
            debug!(actor = %id, priority = idx, "assigned priority");
            self.priorities.insert(idx, id.clone());
        }
    }

    /// With a single enabled actor a priority change is a no-op, so the
    /// change point moves to the next free step instead.
    fn move_change_point_forward(&mut self) {
        self.change_points.remove(&self.scheduled_steps);
        let mut next = self.scheduled_steps + 1;
        while self.change_points.contains(&next) {
            next += 1;
        }
        self.change_points.insert(next);
        debug!(from = self.scheduled_steps, to = next, "moved priority change point");
    }
}

impl SchedulingStrategy for PctStrategy {
    fn try_get_next(
        &mut self,
        enabled: &[ActorId],
        current: Option<&ActorId>,
    ) -> Result<Option<ActorId>, SchedulingError> {
        if enabled.is_empty() {
            return Ok(None);
        }
        self.assign_priorities(enabled, current);

        if self.change_points.contains(&self.scheduled_steps) {
            if enabled.len() == 1 {
                self.move_change_point_forward();
            } else if let Some(top) = self.highest_enabled(enabled) {
                self.priorities.retain(|p| p != &top);
                debug!(actor = %top, step = self.scheduled_steps, "demoted actor");
                self.priorities.push(top);
            }
        }

        let next = self.highest_enabled(enabled);
        self.scheduled_steps += 1;
        Ok(next)
    }

    fn get_next_bool_choice(&mut self, max_value: u64) -> Result<bool, SchedulingError> {
        if max_value == 0 {
            return Err(SchedulingError::EmptyChoiceRange);
        }
        self.scheduled_steps += 1;
        Ok(self.rng.next(max_value) == 0)
    }

    fn get_next_choice(&mut self, max_value: u64) -> Result<u64, SchedulingError> {
        if max_value == 0 {
            return Err(SchedulingError::EmptyChoiceRange);
        }
        self.scheduled_steps += 1;
        Ok(self.rng.next(max_value))
    }

    fn scheduled_steps(&self) -> usize {
        self.scheduled_steps
    }

    fn has_reached_depth_bound(&self) -> bool {
        depth_bound_reached(self.max_steps, self.scheduled_steps)
    }

    fn configure_next_iteration(&mut self) -> bool {
        self.schedule_length = self.schedule_length.max(self.scheduled_steps);
        self.scheduled_steps = 0;
        self.priorities.clear();

        let mut steps: Vec<usize> = (0..self.schedule_length).collect();
        self.rng.shuffle(&mut steps);
        self.change_points = steps.into_iter().take(self.max_priority_switches).collect();
        true
    }

    fn reset(&mut self) {
        self.scheduled_steps = 0;
        self.schedule_length = 0;
        self.priorities.clear();
        self.change_points.clear();
    }

    fn description(&self) -> String {
        format!(
            "pct[priority change points '{}', seed '{}']",
            self.max_priority_switches,
            self.rng.seed()
        )
    }
}
