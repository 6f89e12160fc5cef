use skein_mailbox::ActorId;

use crate::error::SchedulingError;
use crate::rng::SeededRng;
use crate::strategy::{depth_bound_reached, SchedulingStrategy};

/// Uniformly random scheduling. Fair.
#[derive(Debug)]
pub struct RandomStrategy {
    rng: SeededRng,
    max_steps: usize,
    scheduled_steps: usize,
}

impl RandomStrategy {
    pub fn new(seed: u64, max_steps: usize) -> Self {
        RandomStrategy {
            rng: SeededRng::new(seed),
            max_steps,
            scheduled_steps: 0,
        }
    }
}

impl SchedulingStrategy for RandomStrategy {
    fn try_get_next(
        &mut self,
        enabled: &[ActorId],
        _current: Option<&ActorId>,
    ) -> Result<Option<ActorId>, SchedulingError> {
        if enabled.is_empty() {
            return Ok(None);
        }
        let idx = self.rng.next_index(enabled.len());
        self.scheduled_steps += 1;
        Ok(Some(enabled[idx].clone()))
    }

    /// True with probability `1 / max_value`.
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
        self.scheduled_steps = 0;
        true
    }

    fn reset(&mut self) {
        self.scheduled_steps = 0;
    }

    fn is_fair(&self) -> bool {
        true
    }

    fn description(&self) -> String {
        format!("random[seed '{}']", self.rng.seed())
    }
}
