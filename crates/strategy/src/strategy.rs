use skein_mailbox::ActorId;

use crate::error::SchedulingError;

/// Decides every nondeterministic choice of a test iteration.
///
/// The runtime calls `try_get_next` at each scheduling point with the enabled
/// actors sorted by id, and the choice methods whenever the program asks for
/// a random value. Between iterations it calls `configure_next_iteration`;
/// `false` means the strategy has nothing left to explore.
pub trait SchedulingStrategy {
    /// Pick the next actor to run. `current` is the actor that ran last.
    /// `Ok(None)` when `enabled` is empty.
    fn try_get_next(
        &mut self,
        enabled: &[ActorId],
        current: Option<&ActorId>,
    ) -> Result<Option<ActorId>, SchedulingError>;

    fn get_next_bool_choice(&mut self, max_value: u64) -> Result<bool, SchedulingError>;

    /// A value in `0..max_value`.
    fn get_next_choice(&mut self, max_value: u64) -> Result<u64, SchedulingError>;

    /// Decisions taken so far in this iteration.
    fn scheduled_steps(&self) -> usize;

    fn has_reached_depth_bound(&self) -> bool;

    fn configure_next_iteration(&mut self) -> bool;

    /// Called once the iteration has ended, before `configure_next_iteration`.
    fn finish_iteration(&self) -> Result<(), SchedulingError> {
        Ok(())
    }

    /// Forget everything learned, as if freshly constructed.
    fn reset(&mut self);

    /// Whether every enabled actor eventually gets scheduled. Liveness checks
    /// at the depth bound are only meaningful under a fair strategy.
    fn is_fair(&self) -> bool {
        false
    }

    fn description(&self) -> String;
}

/// `max_steps == 0` means unbounded.
pub(crate) fn depth_bound_reached(max_steps: usize, scheduled_steps: usize) -> bool {
    max_steps != 0 && scheduled_steps >= max_steps
}
