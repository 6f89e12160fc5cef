pub mod actor;
pub mod config;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod report;
pub mod runtime;
pub mod trace;
#[cfg(test)]
mod tests;

pub use actor::Actor;
pub use config::{Configuration, StrategyKind};
pub use engine::{ReplayOutcome, TestingEngine};
pub use error::{ErrorClass, RuntimeError};
pub use monitor::Monitor;
pub use report::{BugArtifact, BugKind, BugReport, TestReport, TraceFile};
pub use runtime::{Context, EntryPoint, IterationOutcome, Runtime, RuntimeOptions, Termination};
pub use trace::{BugStep, BugTrace, Choice, StepKind};

pub use skein_mailbox::{ActorId, Event, ReceiveFilter, SendOptions};
pub use skein_race::{MemoryLocation, RaceReport};
pub use skein_strategy::ScheduleTrace;
