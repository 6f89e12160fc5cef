use tracing::{info, info_span};

use skein_strategy::{ReplayStrategy, ScheduleTrace, SchedulingError};

use crate::config::Configuration;
use crate::error::RuntimeError;
use crate::report::{BugArtifact, BugReport, TestReport, TraceFile};
use crate::runtime::{EntryPoint, Runtime, RuntimeOptions, Termination};
use crate::trace::BugTrace;

/// Result of replaying one recorded schedule.
#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    pub termination: Termination,
    pub bug_trace: BugTrace,
    pub schedule: ScheduleTrace,
}

impl ReplayOutcome {
    pub fn bug(&self) -> Option<&BugReport> {
        match &self.termination {
            Termination::Bug(bug) => Some(bug),
            _ => None,
        }
    }
}

/// Runs a program under test for many iterations under one strategy.
pub struct TestingEngine {
    config: Configuration,
    seed: u64,
    entry: Box<EntryPoint>,
}

impl TestingEngine {
    pub fn new<F>(config: Configuration, entry: F) -> Self
    where
        F: Fn(&mut Runtime) -> Result<(), RuntimeError> + 'static,
    {
        let seed = config.resolve_seed();
        TestingEngine {
            config,
            seed,
            entry: Box::new(entry),
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Explore until the iteration budget is spent, the strategy is
    /// exhausted, or (with `stop_at_first_bug`) a bug is found.
    pub fn run(&self) -> Result<TestReport, RuntimeError> {
        let strategy = self.config.build_strategy(self.seed);
        let mut runtime = Runtime::new(strategy, self.config.runtime_options());
        let description = runtime.strategy().description();
        let mut report = TestReport::new(description.clone(), self.seed);

        loop {
            let iteration = report.iterations;
            if self.config.iterations != 0 && iteration >= self.config.iterations {
                break;
            }

            let span = info_span!("iteration", iteration, strategy = %description);
            let _enter = span.enter();

            let outcome = runtime.run_iteration(self.entry.as_ref())?;
            report.record_depth(outcome.steps);
            if runtime.schedule().truncated {
                report.depth_bound_hits += 1;
            }
            match &outcome.termination {
                Termination::Bug(bug) => {
                    report.record_bug(bug);
                    if report.first_bug.is_none() {
                        report.first_bug = Some(BugArtifact {
                            iteration,
                            bug: bug.clone(),
                            bug_trace: runtime.bug_trace().clone(),
                            schedule: runtime.schedule().clone(),
                            options: runtime.options().clone(),
                        });
                    }
                }
                Termination::Pruned(_) => report.pruned_iterations += 1,
                Termination::Completed | Termination::DepthBound => {}
            }
            report.record_races(runtime.take_races());
            report.iterations += 1;

            if outcome.bug().is_some() && self.config.stop_at_first_bug {
                break;
            }
            if !runtime.configure_next_iteration() {
                report.exhausted = true;
                break;
            }
        }

        report.distinct_states = runtime.distinct_states();
        info!(
            iterations = report.iterations,
            bugs = report.buggy_iterations,
            exhausted = report.exhausted,
            "testing finished"
        );
        Ok(report)
    }

    /// Re-execute `schedule`. Any divergence from it is an error.
    pub fn replay(&self, schedule: &ScheduleTrace) -> Result<ReplayOutcome, RuntimeError> {
        self.replay_with(schedule, self.config.runtime_options())
    }

    fn replay_with(
        &self,
        schedule: &ScheduleTrace,
        options: RuntimeOptions,
    ) -> Result<ReplayOutcome, RuntimeError> {
        let strategy = Box::new(ReplayStrategy::new(schedule.clone()));
        let mut runtime = Runtime::new(strategy, options);
        let span = info_span!("replay", decisions = schedule.len());
        let _enter = span.enter();

        let outcome = runtime.run_iteration(self.entry.as_ref())?;
        Ok(ReplayOutcome {
            termination: outcome.termination,
            bug_trace: runtime.bug_trace().clone(),
            schedule: runtime.schedule().clone(),
        })
    }

    /// Replay a trace file under the runtime options it was recorded with
    /// and check that it reproduces the recorded bug with the recorded steps.
    pub fn replay_file(&self, file: &TraceFile) -> Result<ReplayOutcome, RuntimeError> {
        let outcome = self.replay_with(&file.schedule, file.options.clone())?;
        let step = outcome.schedule.len();
        if outcome.bug() != Some(&file.bug) {
            let found = outcome
                .bug()
                .map_or_else(|| "no bug".to_string(), ToString::to_string);
            return Err(SchedulingError::divergence(
                step,
                format!("expected bug '{}', replay found {found}", file.bug),
            )
            .into());
        }
        if !outcome.bug_trace.same_steps(&file.bug_trace) {
            return Err(SchedulingError::divergence(
                step,
                "replayed bug trace differs from the recorded one",
            )
            .into());
        }
        Ok(outcome)
    }
}
