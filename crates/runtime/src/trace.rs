use serde::{Deserialize, Serialize};
use std::fmt;

use skein_mailbox::ActorId;

pub const BUG_TRACE_VERSION: u32 = 1;

fn default_version() -> u32 {
    BUG_TRACE_VERSION
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    CreateActor,
    CreateMonitor,
    SendEvent,
    DequeueEvent,
    RaiseEvent,
    GotoState,
    InvokeAction,
    WaitToReceive,
    ReceiveEvent,
    RandomChoice,
    Halt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    Bool(bool),
    Int(u64),
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choice::Bool(v) => write!(f, "{v}"),
            Choice::Int(v) => write!(f, "{v}"),
        }
    }
}

/// One high-level step of an execution.
///
/// Steps compare equal when they sit at the same index of a trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BugStep {
    pub index: usize,
    pub kind: StepKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_actor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_actor_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    /// State entered (goto) or action name (invoke action).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice: Option<Choice>,
}

impl PartialEq for BugStep {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for BugStep {}

impl BugStep {
    fn new(index: usize, kind: StepKind) -> Self {
        BugStep {
            index,
            kind,
            actor: None,
            actor_id: None,
            target_actor: None,
            target_actor_id: None,
            event_name: None,
            detail: None,
            choice: None,
        }
    }

    fn actor_label(&self) -> String {
        label(&self.actor, self.actor_id)
    }

    fn target_label(&self) -> String {
        label(&self.target_actor, self.target_actor_id)
    }
}

fn label(name: &Option<String>, id: Option<u64>) -> String {
    match (name, id) {
        (Some(name), Some(id)) => format!("{name}({id})"),
        (Some(name), None) => name.clone(),
        (None, _) => "the environment".to_string(),
    }
}

impl fmt::Display for BugStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actor = self.actor_label();
        let event = self.event_name.as_deref().unwrap_or("?");
        match self.kind {
            StepKind::CreateActor => {
                write!(f, "<CreateLog> {} was created by {actor}.", self.target_label())
            }
            StepKind::CreateMonitor => write!(f, "<CreateLog> Monitor '{actor}' was created."),
            StepKind::SendEvent => {
                write!(f, "<SendLog> {actor} sent event '{event}' to {}.", self.target_label())
            }
            StepKind::DequeueEvent => write!(f, "<DequeueLog> {actor} dequeued event '{event}'."),
            StepKind::RaiseEvent => write!(f, "<RaiseLog> {actor} raised event '{event}'."),
            StepKind::GotoState => write!(
                f,
                "<GotoLog> {actor} entered state '{}'.",
                self.detail.as_deref().unwrap_or("?")
            ),
            StepKind::InvokeAction => write!(
                f,
                "<ActionLog> {actor} invoked action '{}'.",
                self.detail.as_deref().unwrap_or("?")
            ),
            StepKind::WaitToReceive => {
                write!(f, "<ReceiveLog> {actor} is waiting to receive {event}.")
            }
            StepKind::ReceiveEvent => write!(f, "<ReceiveLog> {actor} received event '{event}'."),
            StepKind::RandomChoice => match self.choice {
                Some(choice) => write!(f, "<RandomLog> {actor} nondeterministically chose '{choice}'."),
                None => write!(f, "<RandomLog> {actor} made a nondeterministic choice."),
            },
            StepKind::Halt => write!(f, "<HaltLog> {actor} halted."),
        }
    }
}

/// The high-level steps of one execution, in order.
///
/// Append-only; the neighbours of a step are found by index and `pop`
/// truncates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BugTrace {
    #[serde(default = "default_version")]
    pub version: u32,
    steps: Vec<BugStep>,
}

impl BugTrace {
    pub fn new() -> Self {
        BugTrace {
            version: BUG_TRACE_VERSION,
            steps: Vec::new(),
        }
    }

    pub fn add_step(
        &mut self,
        kind: StepKind,
        actor: Option<&ActorId>,
        target: Option<&ActorId>,
        event_name: Option<&str>,
        choice: Option<Choice>,
    ) -> &BugStep {
        let mut step = BugStep::new(self.steps.len(), kind);
        step.actor = actor.map(|a| a.name().to_string());
        step.actor_id = actor.map(ActorId::value);
        step.target_actor = target.map(|a| a.name().to_string());
        step.target_actor_id = target.map(ActorId::value);
        step.event_name = event_name.map(String::from);
        step.choice = choice;
        self.push(step)
    }

    /// `source` is `None` when the environment created the actor.
    pub fn add_create_actor(&mut self, source: Option<&ActorId>, target: &ActorId) -> &BugStep {
        self.add_step(StepKind::CreateActor, source, Some(target), None, None)
    }

    pub fn add_create_monitor(&mut self, name: &str) -> &BugStep {
        let mut step = BugStep::new(self.steps.len(), StepKind::CreateMonitor);
        step.actor = Some(name.to_string());
        self.push(step)
    }

    pub fn add_send(&mut self, source: Option<&ActorId>, target: &ActorId, event: &str) -> &BugStep {
        self.add_step(StepKind::SendEvent, source, Some(target), Some(event), None)
    }

    pub fn add_dequeue(&mut self, actor: &ActorId, event: &str) -> &BugStep {
        self.add_step(StepKind::DequeueEvent, Some(actor), None, Some(event), None)
    }

    pub fn add_raise(&mut self, actor: &ActorId, event: &str) -> &BugStep {
        self.add_step(StepKind::RaiseEvent, Some(actor), None, Some(event), None)
    }

    pub fn add_goto_state(&mut self, actor: &ActorId, state: &str) -> &BugStep {
        self.add_with_detail(StepKind::GotoState, actor, state)
    }

    pub fn add_invoke_action(&mut self, actor: &ActorId, action: &str) -> &BugStep {
        self.add_with_detail(StepKind::InvokeAction, actor, action)
    }

    pub fn add_wait_to_receive(&mut self, actor: &ActorId, events: &[String]) -> &BugStep {
        let names = events.join(", ");
        self.add_step(StepKind::WaitToReceive, Some(actor), None, Some(&names), None)
    }

    pub fn add_receive(&mut self, actor: &ActorId, event: &str) -> &BugStep {
        self.add_step(StepKind::ReceiveEvent, Some(actor), None, Some(event), None)
    }

    /// `actor` is `None` for choices made by the environment.
    pub fn add_random_choice(&mut self, actor: Option<&ActorId>, choice: Choice) -> &BugStep {
        self.add_step(StepKind::RandomChoice, actor, None, None, Some(choice))
    }

    pub fn add_halt(&mut self, actor: &ActorId) -> &BugStep {
        self.add_step(StepKind::Halt, Some(actor), None, None, None)
    }

    fn add_with_detail(&mut self, kind: StepKind, actor: &ActorId, detail: &str) -> &BugStep {
        let mut step = BugStep::new(self.steps.len(), kind);
        step.actor = Some(actor.name().to_string());
        step.actor_id = Some(actor.value());
        step.detail = Some(detail.to_string());
        self.push(step)
    }

    fn push(&mut self, step: BugStep) -> &BugStep {
        self.steps.push(step);
        &self.steps[self.steps.len() - 1]
    }

    /// Remove and return the latest step.
    pub fn pop(&mut self) -> Option<BugStep> {
        self.steps.pop()
    }

    pub fn peek(&self) -> Option<&BugStep> {
        self.steps.last()
    }

    pub fn get(&self, index: usize) -> Option<&BugStep> {
        self.steps.get(index)
    }

    pub fn previous(&self, index: usize) -> Option<&BugStep> {
        index.checked_sub(1).and_then(|i| self.steps.get(i))
    }

    pub fn next(&self, index: usize) -> Option<&BugStep> {
        self.steps.get(index + 1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BugStep> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }

    /// Same steps in the same order, field for field.
    pub fn same_steps(&self, other: &BugTrace) -> bool {
        self.steps.len() == other.steps.len()
            && self.steps.iter().zip(&other.steps).all(|(a, b)| {
                a.index == b.index
                    && a.kind == b.kind
                    && a.actor == b.actor
                    && a.actor_id == b.actor_id
                    && a.target_actor == b.target_actor
                    && a.target_actor_id == b.target_actor_id
                    && a.event_name == b.event_name
                    && a.detail == b.detail
                    && a.choice == b.choice
            })
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| e.to_string())
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        let trace: BugTrace = serde_json::from_str(json).map_err(|e| e.to_string())?;
        if trace.version != BUG_TRACE_VERSION {
            return Err(format!(
                "unsupported bug trace version {} (expected {BUG_TRACE_VERSION})",
                trace.version
            ));
        }
        Ok(trace)
    }
}

impl Default for BugTrace {
    fn default() -> Self {
        BugTrace::new()
    }
}

impl fmt::Display for BugTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            writeln!(f, "{:>4}  {step}", step.index)?;
        }
        Ok(())
    }
}
