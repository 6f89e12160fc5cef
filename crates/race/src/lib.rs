pub mod detector;
pub mod epoch;
pub mod vclock;
#[cfg(test)]
mod tests;

pub use detector::{Access, AccessKind, MemoryLocation, RaceDetector, RaceKind, RaceReport};
pub use epoch::Epoch;
pub use vclock::VectorClock;
