pub mod delay;
pub mod dfs;
pub mod error;
pub mod pct;
pub mod random;
pub mod replay;
pub mod rng;
pub mod schedule;
pub mod strategy;

pub use delay::{
    DelayBoundingStrategy, DelayPlanner, ExhaustiveDelayBoundingStrategy, ExhaustiveDelays,
    RandomDelayBoundingStrategy, RandomDelays,
};
pub use dfs::DfsStrategy;
pub use error::SchedulingError;
pub use pct::PctStrategy;
pub use random::RandomStrategy;
pub use replay::ReplayStrategy;
pub use rng::SeededRng;
pub use schedule::{Decision, ScheduleStep, ScheduleTrace};
pub use strategy::SchedulingStrategy;
