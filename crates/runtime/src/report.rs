use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

use skein_race::RaceReport;
use skein_strategy::ScheduleTrace;

use crate::error::RuntimeError;
use crate::runtime::RuntimeOptions;
use crate::trace::BugTrace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BugKind {
    Safety,
    Liveness,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugReport {
    pub kind: BugKind,
    pub description: String,
}

impl BugReport {
    pub fn safety(description: impl Into<String>) -> Self {
        BugReport {
            kind: BugKind::Safety,
            description: description.into(),
        }
    }

    pub fn liveness(description: impl Into<String>) -> Self {
        BugReport {
            kind: BugKind::Liveness,
            description: description.into(),
        }
    }
}

impl fmt::Display for BugReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            BugKind::Safety => "safety",
            BugKind::Liveness => "liveness",
        };
        write!(f, "[{kind}] {}", self.description)
    }
}

/// Everything needed to inspect and replay one buggy iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BugArtifact {
    pub iteration: usize,
    pub bug: BugReport,
    pub bug_trace: BugTrace,
    pub schedule: ScheduleTrace,
    /// Runtime options the iteration ran under.
    #[serde(default)]
    pub options: RuntimeOptions,
}

/// Summary of a testing run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestReport {
    pub strategy: String,
    pub seed: u64,
    pub iterations: usize,
    pub buggy_iterations: usize,
    pub pruned_iterations: usize,
    pub depth_bound_hits: usize,
    pub min_explored_depth: usize,
    pub max_explored_depth: usize,
    pub distinct_states: usize,
    /// The strategy ran out of schedules before the iteration budget.
    pub exhausted: bool,
    /// Distinct bug descriptions, in order of discovery.
    pub bugs: Vec<BugReport>,
    pub races: Vec<RaceReport>,
    pub first_bug: Option<BugArtifact>,
}

impl TestReport {
    pub fn new(strategy: impl Into<String>, seed: u64) -> Self {
        TestReport {
            strategy: strategy.into(),
            seed,
            ..TestReport::default()
        }
    }

    pub fn found_bug(&self) -> bool {
        self.buggy_iterations > 0
    }

    pub(crate) fn record_depth(&mut self, depth: usize) {
        if self.iterations == 0 || depth < self.min_explored_depth {
            self.min_explored_depth = depth;
        }
        self.max_explored_depth = self.max_explored_depth.max(depth);
    }

    pub(crate) fn record_bug(&mut self, bug: &BugReport) {
        self.buggy_iterations += 1;
        if !self.bugs.contains(bug) {
            self.bugs.push(bug.clone());
        }
    }

    pub(crate) fn record_races(&mut self, races: Vec<RaceReport>) {
        for race in races {
            if !self.races.contains(&race) {
                self.races.push(race);
            }
        }
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| e.to_string())
    }
}

impl fmt::Display for TestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "strategy: {} (seed {})", self.strategy, self.seed)?;
        writeln!(
            f,
            "iterations: {} ({} buggy, {} pruned, {} hit the depth bound)",
            self.iterations, self.buggy_iterations, self.pruned_iterations, self.depth_bound_hits
        )?;
        writeln!(
            f,
            "explored depth: {}..{}",
            self.min_explored_depth, self.max_explored_depth
        )?;
        writeln!(f, "distinct states: {}", self.distinct_states)?;
        if self.exhausted {
            writeln!(f, "exploration exhausted")?;
        }
        if self.bugs.is_empty() {
            writeln!(f, "no bugs found")?;
        } else {
            writeln!(f, "bugs:")?;
            for bug in &self.bugs {
                writeln!(f, "  - {bug}")?;
            }
        }
        if !self.races.is_empty() {
            writeln!(f, "races:")?;
            for race in &self.races {
                writeln!(f, "  - {race}")?;
            }
        }
        if let Some(first) = &self.first_bug {
            writeln!(f, "first bug in iteration {}:", first.iteration)?;
            write!(f, "{}", first.bug_trace)?;
        }
        Ok(())
    }
}

/// Current version of the trace file format.
pub const TRACE_FILE_VERSION: u32 = 1;

const MAX_SUPPORTED_VERSION: u32 = 1;

fn default_version() -> u32 {
    TRACE_FILE_VERSION
}

/// Persisted bug reproduction: the schedule to replay plus what it showed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceFile {
    #[serde(default = "default_version")]
    pub version: u32,
    /// SHA-256 of the schedule and runtime options, checked on load.
    pub digest: String,
    pub strategy: String,
    pub bug: BugReport,
    pub schedule: ScheduleTrace,
    pub bug_trace: BugTrace,
    #[serde(default)]
    pub options: RuntimeOptions,
}

impl TraceFile {
    pub fn new(strategy: impl Into<String>, artifact: &BugArtifact) -> Result<Self, RuntimeError> {
        Ok(TraceFile {
            version: TRACE_FILE_VERSION,
            digest: replay_digest(&artifact.schedule, &artifact.options)?,
            strategy: strategy.into(),
            bug: artifact.bug.clone(),
            schedule: artifact.schedule.clone(),
            bug_trace: artifact.bug_trace.clone(),
            options: artifact.options.clone(),
        })
    }

    pub fn to_json(&self) -> Result<String, RuntimeError> {
        serde_json::to_string_pretty(self).map_err(|e| RuntimeError::InvalidTrace(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, RuntimeError> {
        let file: TraceFile =
            serde_json::from_str(json).map_err(|e| RuntimeError::InvalidTrace(e.to_string()))?;
        if file.version > MAX_SUPPORTED_VERSION {
            return Err(RuntimeError::InvalidTrace(format!(
                "unsupported trace file version {} (max supported: {MAX_SUPPORTED_VERSION})",
                file.version
            )));
        }
        let digest = replay_digest(&file.schedule, &file.options)?;
        if digest != file.digest {
            return Err(RuntimeError::InvalidTrace(format!(
                "replay digest mismatch: file says {}, schedule and options hash to {digest}",
                file.digest
            )));
        }
        Ok(file)
    }

    pub fn save(&self, path: &Path) -> Result<(), RuntimeError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, RuntimeError> {
        let json = std::fs::read_to_string(path)?;
        TraceFile::from_json(&json)
    }
}

fn replay_digest(schedule: &ScheduleTrace, options: &RuntimeOptions) -> Result<String, RuntimeError> {
    let encode = |e: serde_json::Error| RuntimeError::InvalidTrace(e.to_string());
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_string(schedule).map_err(encode)?.as_bytes());
    hasher.update(serde_json::to_string(options).map_err(encode)?.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}
