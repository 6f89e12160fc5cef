use std::collections::VecDeque;

use tracing::debug;

use skein_mailbox::ActorId;

use crate::error::SchedulingError;
use crate::rng::SeededRng;
use crate::strategy::{depth_bound_reached, SchedulingStrategy};

/// Chooses the steps at which the next iteration inserts a delay.
pub trait DelayPlanner {
    /// Delay positions for the next iteration, sorted ascending, or `None`
    /// once the planner has nothing left to try.
    fn plan(&mut self, schedule_length: usize, max_steps: usize, rng: &mut SeededRng) -> Option<Vec<usize>>;

    fn reset(&mut self);

    fn max_delays(&self) -> usize;

    fn name(&self) -> &'static str;
}

/// Draws `max_delays` positions uniformly from the longest schedule seen.
#[derive(Debug, Clone)]
pub struct RandomDelays {
    max_delays: usize,
}

impl RandomDelays {
    pub fn new(max_delays: usize) -> Self {
        RandomDelays { max_delays }
    }
}

impl DelayPlanner for RandomDelays {
    fn plan(&mut self, schedule_length: usize, _max_steps: usize, rng: &mut SeededRng) -> Option<Vec<usize>> {
        if schedule_length == 0 {
            return Some(Vec::new());
        }
        let mut delays: Vec<usize> = (0..self.max_delays)
            .map(|_| rng.next_index(schedule_length))
            .collect();
        delays.sort_unstable();
        Some(delays)
    }

    fn reset(&mut self) {}

    fn max_delays(&self) -> usize {
        self.max_delays
    }

    fn name(&self) -> &'static str {
        "random-delay"
    }
}

/// Enumerates delay placements as a counter with one digit per delay, each
/// digit ranging over `0..=min(max_steps, schedule_length)`.
///
/// The bound grows with the longest schedule seen so far. Placements that
/// only become reachable once the bound has grown past digits that already
/// carried are not revisited, so exhaustion means "every placement under the
/// bounds seen while counting", not every placement under the final bound.
#[derive(Debug, Clone)]
pub struct ExhaustiveDelays {
    digits: Vec<usize>,
}

impl ExhaustiveDelays {
    pub fn new(max_delays: usize) -> Self {
        ExhaustiveDelays {
            digits: vec![0; max_delays],
        }
    }
}

impl DelayPlanner for ExhaustiveDelays {
    fn plan(&mut self, schedule_length: usize, max_steps: usize, _rng: &mut SeededRng) -> Option<Vec<usize>> {
        let bound = if max_steps == 0 {
            schedule_length
        } else {
            max_steps.min(schedule_length)
        };

        for idx in 0..self.digits.len() {
            if self.digits[idx] < bound {
                self.digits[idx] += 1;
                let mut delays = self.digits.clone();
                delays.sort_unstable();
                return Some(delays);
            }
            self.digits[idx] = 0;
        }
        None
    }

    fn reset(&mut self) {
        self.digits.iter_mut().for_each(|d| *d = 0);
    }

    fn max_delays(&self) -> usize {
        self.digits.len()
    }

    fn name(&self) -> &'static str {
        "exhaustive-delay"
    }
}

/// Delay-bounded scheduling.
///
/// Without delays the strategy keeps running the current actor, moving on to
/// the next enabled id (wrapping) only when it is disabled. Each delay at a
/// step skips one actor in that rotation.
#[derive(Debug)]
pub struct DelayBoundingStrategy<P: DelayPlanner> {
    planner: P,
    rng: SeededRng,
    max_steps: usize,
    scheduled_steps: usize,
    schedule_length: usize,
    remaining_delays: VecDeque<usize>,
}

pub type RandomDelayBoundingStrategy = DelayBoundingStrategy<RandomDelays>;

pub type ExhaustiveDelayBoundingStrategy = DelayBoundingStrategy<ExhaustiveDelays>;

impl<P: DelayPlanner> DelayBoundingStrategy<P> {
    pub fn with_planner(planner: P, seed: u64, max_steps: usize) -> Self {
        DelayBoundingStrategy {
            planner,
            rng: SeededRng::new(seed),
            max_steps,
            scheduled_steps: 0,
            schedule_length: 0,
            remaining_delays: VecDeque::new(),
        }
    }

    /// Delays still to be inserted in the current iteration.
    pub fn remaining_delays(&self) -> impl Iterator<Item = &usize> {
        self.remaining_delays.iter()
    }

    pub fn schedule_length(&self) -> usize {
        self.schedule_length
    }

    fn take_delay_at_current_step(&mut self) -> bool {
        if self.remaining_delays.front() == Some(&self.scheduled_steps) {
            self.remaining_delays.pop_front();
            true
        } else {
            false
        }
    }
}

impl RandomDelayBoundingStrategy {
    pub fn random(seed: u64, max_steps: usize, max_delays: usize) -> Self {
        DelayBoundingStrategy::with_planner(RandomDelays::new(max_delays), seed, max_steps)
    }
}

impl ExhaustiveDelayBoundingStrategy {
    pub fn exhaustive(seed: u64, max_steps: usize, max_delays: usize) -> Self {
        DelayBoundingStrategy::with_planner(ExhaustiveDelays::new(max_delays), seed, max_steps)
    }
}

impl<P: DelayPlanner> SchedulingStrategy for DelayBoundingStrategy<P> {
    fn try_get_next(
        &mut self,
        enabled: &[ActorId],
        current: Option<&ActorId>,
    ) -> Result<Option<ActorId>, SchedulingError> {
        if enabled.is_empty() {
            return Ok(None);
        }

        let start = current
            .and_then(|c| enabled.iter().position(|id| id >= c))
            .unwrap_or(0);
        let ordered: Vec<&ActorId> = enabled[start..].iter().chain(&enabled[..start]).collect();

        let mut idx = 0;
        while self.take_delay_at_current_step() {
            idx = (idx + 1) % ordered.len();
            debug!(
                step = self.scheduled_steps,
                remaining = self.remaining_delays.len(),
                "inserted delay"
            );
        }

        self.scheduled_steps += 1;
        Ok(Some(ordered[idx].clone()))
    }

    fn get_next_bool_choice(&mut self, _max_value: u64) -> Result<bool, SchedulingError> {
        let delayed = self.take_delay_at_current_step();
        self.scheduled_steps += 1;
        Ok(delayed)
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
        match self
            .planner
            .plan(self.schedule_length, self.max_steps, &mut self.rng)
        {
            Some(delays) => {
                debug!(?delays, schedule_length = self.schedule_length, "planned delays");
                self.remaining_delays = delays.into();
                true
            }
            None => {
                self.remaining_delays.clear();
                false
            }
        }
    }

    fn reset(&mut self) {
        self.scheduled_steps = 0;
        self.schedule_length = 0;
        self.remaining_delays.clear();
        self.planner.reset();
    }

    fn description(&self) -> String {
        format!(
            "{}[max delays '{}', seed '{}']",
            self.planner.name(),
            self.planner.max_delays(),
            self.rng.seed()
        )
    }
}
