use std::fmt;

use tracing::debug;

use skein_mailbox::ActorId;

use crate::error::SchedulingError;
use crate::strategy::{depth_bound_reached, SchedulingStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Schedule,
    Bool,
    Int,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ChoiceId {
    Actor(ActorId),
    Value(u64),
}

impl fmt::Display for ChoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChoiceId::Actor(id) => write!(f, "{id}"),
            ChoiceId::Value(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone)]
struct Choice {
    id: ChoiceId,
    done: bool,
}

/// Alternatives at one depth of the search tree. The first choice not yet
/// done is the one the current iteration follows.
#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    choices: Vec<Choice>,
}

impl Node {
    fn new(kind: NodeKind, ids: Vec<ChoiceId>) -> Self {
        Node {
            kind,
            choices: ids.into_iter().map(|id| Choice { id, done: false }).collect(),
        }
    }

    fn current(&self) -> Option<&Choice> {
        self.choices.iter().find(|c| !c.done)
    }

    fn mark_current_done(&mut self) {
        if let Some(choice) = self.choices.iter_mut().find(|c| !c.done) {
            choice.done = true;
        }
    }

    fn is_exhausted(&self) -> bool {
        self.choices.iter().all(|c| c.done)
    }

    fn matches(&self, ids: &[ChoiceId]) -> bool {
        self.choices.len() == ids.len() && self.choices.iter().zip(ids).all(|(c, id)| &c.id == id)
    }
}

fn render(ids: impl Iterator<Item = String>) -> String {
    format!("[{}]", ids.collect::<Vec<_>>().join(", "))
}

/// Systematic depth-first exploration of every schedule and choice sequence
/// up to the depth bound. Each iteration replays the stack prefix and takes
/// the first unexplored alternative below it.
#[derive(Debug)]
pub struct DfsStrategy {
    max_steps: usize,
    scheduled_steps: usize,
    depth: usize,
    stack: Vec<Node>,
    exhausted: bool,
}

impl DfsStrategy {
    pub fn new(max_steps: usize) -> Self {
        DfsStrategy {
            max_steps,
            scheduled_steps: 0,
            depth: 0,
            stack: Vec::new(),
            exhausted: false,
        }
    }

    /// True once every branch up to the depth bound has been explored.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    fn visit(&mut self, kind: NodeKind, ids: Vec<ChoiceId>) -> Result<ChoiceId, SchedulingError> {
        let depth = self.depth;
        match self.stack.get(depth) {
            Some(node) if node.kind != kind => {
                return Err(SchedulingError::divergence(
                    depth,
                    format!("expected a {:?} decision, found a {:?} decision", node.kind, kind),
                ));
            }
            Some(node) if !node.matches(&ids) => {
                return Err(SchedulingError::divergence(
                    depth,
                    format!(
                        "expected choices {}, found {}",
                        render(node.choices.iter().map(|c| c.id.to_string())),
                        render(ids.iter().map(ChoiceId::to_string)),
                    ),
                ));
            }
            Some(_) => {}
            None => self.stack.push(Node::new(kind, ids)),
        }

        let choice = self.stack[depth]
            .current()
            .map(|c| c.id.clone())
            .ok_or_else(|| SchedulingError::divergence(depth, "no unexplored choice left at this depth"))?;
        self.depth += 1;
        self.scheduled_steps += 1;
        Ok(choice)
    }
}

impl SchedulingStrategy for DfsStrategy {
    fn try_get_next(
        &mut self,
        enabled: &[ActorId],
        _current: Option<&ActorId>,
    ) -> Result<Option<ActorId>, SchedulingError> {
        if enabled.is_empty() {
            return Ok(None);
        }
        let mut sorted = enabled.to_vec();
        sorted.sort();
        let ids = sorted.into_iter().map(ChoiceId::Actor).collect();
        match self.visit(NodeKind::Schedule, ids)? {
            ChoiceId::Actor(id) => Ok(Some(id)),
            ChoiceId::Value(_) => Err(SchedulingError::divergence(
                self.depth - 1,
                "recorded a value where an actor was expected",
            )),
        }
    }

    fn get_next_bool_choice(&mut self, _max_value: u64) -> Result<bool, SchedulingError> {
        let ids = vec![ChoiceId::Value(0), ChoiceId::Value(1)];
        Ok(self.visit(NodeKind::Bool, ids)? == ChoiceId::Value(1))
    }

    fn get_next_choice(&mut self, max_value: u64) -> Result<u64, SchedulingError> {
        if max_value == 0 {
            return Err(SchedulingError::EmptyChoiceRange);
        }
        let ids = (0..max_value).map(ChoiceId::Value).collect();
        match self.visit(NodeKind::Int, ids)? {
            ChoiceId::Value(v) => Ok(v),
            ChoiceId::Actor(_) => Err(SchedulingError::divergence(
                self.depth - 1,
                "recorded an actor where a value was expected",
            )),
        }
    }

    fn scheduled_steps(&self) -> usize {
        self.scheduled_steps
    }

    fn has_reached_depth_bound(&self) -> bool {
        depth_bound_reached(self.max_steps, self.scheduled_steps)
    }

    fn configure_next_iteration(&mut self) -> bool {
        self.stack.truncate(self.depth);
        while let Some(top) = self.stack.last_mut() {
            top.mark_current_done();
            if top.is_exhausted() {
                self.stack.pop();
            } else {
                break;
            }
        }

        self.depth = 0;
        self.scheduled_steps = 0;
        self.exhausted = self.stack.is_empty();
        debug!(depth = self.stack.len(), exhausted = self.exhausted, "dfs backtracked");
        !self.exhausted
    }

    fn reset(&mut self) {
        self.stack.clear();
        self.depth = 0;
        self.scheduled_steps = 0;
        self.exhausted = false;
    }

    fn description(&self) -> String {
        "dfs".to_string()
    }
}
