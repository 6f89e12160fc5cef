use tracing::debug;

use skein_mailbox::ActorId;

use crate::error::SchedulingError;
use crate::schedule::{Decision, ScheduleTrace};
use crate::strategy::SchedulingStrategy;

/// Re-feeds a recorded schedule into the runtime.
///
/// Any mismatch between the recording and the live program is a divergence.
/// With a suffix strategy attached, the first mismatch hands control to the
/// suffix instead, which then makes every remaining decision.
pub struct ReplayStrategy {
    trace: ScheduleTrace,
    position: usize,
    suffix: Option<Box<dyn SchedulingStrategy>>,
    replaying: bool,
}

impl ReplayStrategy {
    pub fn new(trace: ScheduleTrace) -> Self {
        ReplayStrategy {
            trace,
            position: 0,
            suffix: None,
            replaying: true,
        }
    }

    pub fn with_suffix(trace: ScheduleTrace, suffix: Box<dyn SchedulingStrategy>) -> Self {
        ReplayStrategy {
            suffix: Some(suffix),
            ..ReplayStrategy::new(trace)
        }
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    /// Decisions consumed from the recording.
    pub fn position(&self) -> usize {
        self.position
    }

    fn recorded(&self) -> Result<&Decision, String> {
        self.trace
            .get(self.position)
            .map(|step| &step.decision)
            .ok_or_else(|| "execution is longer than trace".to_string())
    }

    /// Switch to the suffix strategy, or fail with a divergence if there is none.
    fn diverge(&mut self, reason: String) -> Result<&mut Box<dyn SchedulingStrategy>, SchedulingError> {
        match self.suffix.as_mut() {
            Some(suffix) => {
                debug!(step = self.position, %reason, "replay handing over to suffix strategy");
                self.replaying = false;
                Ok(suffix)
            }
            None => Err(SchedulingError::divergence(self.position, reason)),
        }
    }

    fn live(&mut self) -> Option<&mut Box<dyn SchedulingStrategy>> {
        if self.replaying {
            None
        } else {
            self.suffix.as_mut()
        }
    }
}

impl SchedulingStrategy for ReplayStrategy {
    fn try_get_next(
        &mut self,
        enabled: &[ActorId],
        current: Option<&ActorId>,
    ) -> Result<Option<ActorId>, SchedulingError> {
        if let Some(suffix) = self.live() {
            return suffix.try_get_next(enabled, current);
        }
        if enabled.is_empty() {
            return Ok(None);
        }

        let outcome = match self.recorded() {
            Ok(Decision::Schedule { actor }) => enabled
                .iter()
                .find(|id| *id == actor)
                .cloned()
                .ok_or_else(|| format!("cannot detect enabled actor {actor}")),
            Ok(other) => Err(format!("expected a scheduling decision, trace has '{other}'")),
            Err(reason) => Err(reason),
        };

        match outcome {
            Ok(actor) => {
                self.position += 1;
                Ok(Some(actor))
            }
            Err(reason) => self.diverge(reason)?.try_get_next(enabled, current),
        }
    }

    fn get_next_bool_choice(&mut self, max_value: u64) -> Result<bool, SchedulingError> {
        if let Some(suffix) = self.live() {
            return suffix.get_next_bool_choice(max_value);
        }
        let outcome = match self.recorded() {
            Ok(Decision::Bool { value }) => Ok(*value),
            Ok(other) => Err(format!("expected a boolean choice, trace has '{other}'")),
            Err(reason) => Err(reason),
        };
        match outcome {
            Ok(value) => {
                self.position += 1;
                Ok(value)
            }
            Err(reason) => self.diverge(reason)?.get_next_bool_choice(max_value),
        }
    }

    fn get_next_choice(&mut self, max_value: u64) -> Result<u64, SchedulingError> {
        if let Some(suffix) = self.live() {
            return suffix.get_next_choice(max_value);
        }
        let outcome = match self.recorded() {
            Ok(Decision::Int { value }) if *value < max_value => Ok(*value),
            Ok(Decision::Int { value }) => Err(format!(
                "recorded integer choice {value} is out of range 0..{max_value}"
            )),
            Ok(other) => Err(format!("expected an integer choice, trace has '{other}'")),
            Err(reason) => Err(reason),
        };
        match outcome {
            Ok(value) => {
                self.position += 1;
                Ok(value)
            }
            Err(reason) => self.diverge(reason)?.get_next_choice(max_value),
        }
    }

    fn scheduled_steps(&self) -> usize {
        match (&self.suffix, self.replaying) {
            (Some(suffix), false) => self.position + suffix.scheduled_steps(),
            _ => self.position,
        }
    }

    /// A recording cut short by the depth bound ends the replay at the same
    /// point.
    fn has_reached_depth_bound(&self) -> bool {
        match (&self.suffix, self.replaying) {
            (Some(suffix), false) => suffix.has_reached_depth_bound(),
            _ => self.trace.truncated && self.position >= self.trace.len(),
        }
    }

    fn configure_next_iteration(&mut self) -> bool {
        false
    }

    /// Fails if the execution ended while recorded decisions were left.
    fn finish_iteration(&self) -> Result<(), SchedulingError> {
        if self.replaying && self.position < self.trace.len() {
            return Err(SchedulingError::divergence(
                self.position,
                format!(
                    "execution is shorter than trace ({} of {} decisions replayed)",
                    self.position,
                    self.trace.len()
                ),
            ));
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.position = 0;
        self.replaying = true;
        if let Some(suffix) = self.suffix.as_mut() {
            suffix.reset();
        }
    }

    /// Fair when the recording was made under a fair strategy.
    fn is_fair(&self) -> bool {
        match (&self.suffix, self.replaying) {
            (Some(suffix), false) => suffix.is_fair(),
            _ => self.trace.fair,
        }
    }

    fn description(&self) -> String {
        match &self.suffix {
            Some(suffix) => format!("replay[{} decisions, then {}]", self.trace.len(), suffix.description()),
            None => format!("replay[{} decisions]", self.trace.len()),
        }
    }
}
