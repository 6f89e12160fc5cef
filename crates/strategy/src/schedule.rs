use serde::{Deserialize, Serialize};
use std::fmt;

use skein_mailbox::ActorId;

pub const SCHEDULE_TRACE_VERSION: u32 = 1;

fn default_version() -> u32 {
    SCHEDULE_TRACE_VERSION
}

/// One nondeterministic decision taken by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    Schedule { actor: ActorId },
    Bool { value: bool },
    Int { value: u64 },
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Schedule { actor } => write!(f, "schedule {actor}"),
            Decision::Bool { value } => write!(f, "bool {value}"),
            Decision::Int { value } => write!(f, "int {value}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleStep {
    pub index: usize,
    pub decision: Decision,
}

/// Sequence of decisions of one iteration. Enough to replay it exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTrace {
    #[serde(default = "default_version")]
    pub version: u32,
    steps: Vec<ScheduleStep>,
    /// The iteration was cut short by the depth bound after the last step.
    #[serde(default)]
    pub truncated: bool,
    /// Recorded under a fair strategy.
    #[serde(default)]
    pub fair: bool,
}

impl ScheduleTrace {
    pub fn new() -> Self {
        ScheduleTrace {
            version: SCHEDULE_TRACE_VERSION,
            steps: Vec::new(),
            truncated: false,
            fair: false,
        }
    }

    pub fn push(&mut self, decision: Decision) {
        let index = self.steps.len();
        self.steps.push(ScheduleStep { index, decision });
    }

    pub fn push_schedule(&mut self, actor: ActorId) {
        self.push(Decision::Schedule { actor });
    }

    pub fn push_bool(&mut self, value: bool) {
        self.push(Decision::Bool { value });
    }

    pub fn push_int(&mut self, value: u64) {
        self.push(Decision::Int { value });
    }

    pub fn get(&self, index: usize) -> Option<&ScheduleStep> {
        self.steps.get(index)
    }

    pub fn steps(&self) -> &[ScheduleStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn clear(&mut self) {
        self.steps.clear();
        self.truncated = false;
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| e.to_string())
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        let trace: ScheduleTrace = serde_json::from_str(json).map_err(|e| e.to_string())?;
        if trace.version != SCHEDULE_TRACE_VERSION {
            return Err(format!(
                "unsupported schedule trace version {} (expected {SCHEDULE_TRACE_VERSION})",
                trace.version
            ));
        }
        Ok(trace)
    }
}

impl Default for ScheduleTrace {
    fn default() -> Self {
        ScheduleTrace::new()
    }
}
