use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use skein_mailbox::{
    ActorId, Dequeued, Event, EventInfo, EventQueue, MailboxError, ReceiveFilter, ReceiveOutcome,
    SendOptions,
};
use skein_race::{MemoryLocation, RaceDetector, RaceReport, VectorClock};
use skein_strategy::{ScheduleTrace, SchedulingStrategy};

use crate::actor::{Actor, Handlers};
use crate::error::{ErrorClass, RuntimeError};
use crate::monitor::Monitor;
use crate::report::BugReport;
use crate::trace::{BugTrace, Choice};

/// Entry point of a program under test: creates the initial actors and
/// monitors and sends the first events.
pub type EntryPoint = dyn Fn(&mut Runtime) -> Result<(), RuntimeError>;

pub type DropHook = Box<dyn FnMut(&ActorId, &Event)>;

/// Options that change what an iteration reports. Persisted with trace
/// files so a replay judges the run the same way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    pub race_detection: bool,
    pub user_state_hashing: bool,
    pub depth_bound_is_bug: bool,
}

/// How an iteration ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    /// No actor enabled and none waiting.
    Completed,
    DepthBound,
    Bug(BugReport),
    /// The execution violated an assumption and was discarded.
    Pruned(String),
}

#[derive(Debug, Clone)]
pub struct IterationOutcome {
    pub termination: Termination,
    /// Decisions taken by the strategy.
    pub steps: usize,
}

impl IterationOutcome {
    pub fn bug(&self) -> Option<&BugReport> {
        match &self.termination {
            Termination::Bug(bug) => Some(bug),
            _ => None,
        }
    }
}

enum Work {
    Start,
    Event(Event),
    Received(Event),
    Halt,
}

struct ActorSlot {
    id: ActorId,
    /// Taken out while one of the actor's handlers runs.
    actor: Option<Box<dyn Actor>>,
    queue: EventQueue,
    started: bool,
    halted: bool,
    state: Option<String>,
}

impl ActorSlot {
    fn is_enabled(&self) -> bool {
        if self.halted {
            return false;
        }
        let Some(actor) = self.actor.as_deref() else {
            return false;
        };
        if !self.started || self.queue.has_received_event() {
            return true;
        }
        if self.queue.is_waiting_to_receive() {
            return false;
        }
        self.queue.is_next_event_available(&Handlers(actor)) || actor.has_default_handler()
    }
}

fn work_for(event: Event) -> Work {
    if event.is_halt() {
        Work::Halt
    } else {
        Work::Event(event)
    }
}

fn index(id: &ActorId) -> usize {
    id.value() as usize
}

/// Controlled, single-threaded actor runtime.
///
/// Only one handler runs at a time. Between turns the runtime asks the
/// scheduling strategy which enabled actor goes next, records that decision
/// in the schedule trace and the observable steps in the bug trace.
pub struct Runtime {
    strategy: Box<dyn SchedulingStrategy>,
    options: RuntimeOptions,
    actors: Vec<ActorSlot>,
    monitors: Vec<Box<dyn Monitor>>,
    schedule: ScheduleTrace,
    bug_trace: BugTrace,
    race: Option<RaceDetector>,
    next_send_seq: u64,
    current: Option<ActorId>,
    visited: HashSet<u64>,
    dropped: Vec<(ActorId, Event)>,
    drop_hook: Option<DropHook>,
}

impl Runtime {
    pub fn new(strategy: Box<dyn SchedulingStrategy>, options: RuntimeOptions) -> Self {
        let race = options.race_detection.then(RaceDetector::new);
        Runtime {
            strategy,
            options,
            actors: Vec::new(),
            monitors: Vec::new(),
            schedule: ScheduleTrace::new(),
            bug_trace: BugTrace::new(),
            race,
            next_send_seq: 0,
            current: None,
            visited: HashSet::new(),
            dropped: Vec::new(),
            drop_hook: None,
        }
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    pub fn strategy(&self) -> &dyn SchedulingStrategy {
        self.strategy.as_ref()
    }

    /// Called for every event sent to a halted actor or left in its mailbox.
    pub fn set_drop_hook(&mut self, hook: impl FnMut(&ActorId, &Event) + 'static) {
        self.drop_hook = Some(Box::new(hook));
    }

    pub fn schedule(&self) -> &ScheduleTrace {
        &self.schedule
    }

    pub fn bug_trace(&self) -> &BugTrace {
        &self.bug_trace
    }

    pub fn dropped_events(&self) -> &[(ActorId, Event)] {
        &self.dropped
    }

    /// Vector clock of `id` in the current iteration, when race detection is on.
    pub fn vector_clock(&self, id: &ActorId) -> Option<&VectorClock> {
        self.race.as_ref().and_then(|race| race.clock(id))
    }

    pub fn take_races(&mut self) -> Vec<RaceReport> {
        self.race.as_mut().map(RaceDetector::take_races).unwrap_or_default()
    }

    /// Distinct program states seen across all iterations so far.
    pub fn distinct_states(&self) -> usize {
        self.visited.len()
    }

    pub fn actor_ids(&self) -> Vec<ActorId> {
        self.actors.iter().map(|s| s.id.clone()).collect()
    }

    pub fn is_halted(&self, id: &ActorId) -> bool {
        self.actors.get(index(id)).is_some_and(|s| s.halted)
    }

    pub fn create_actor(&mut self, name: &str, actor: impl Actor + 'static) -> ActorId {
        self.create(None, name, Box::new(actor))
    }

    pub fn register_monitor(&mut self, monitor: impl Monitor + 'static) {
        self.bug_trace.add_create_monitor(monitor.name());
        self.monitors.push(Box::new(monitor));
    }

    /// Send from the test environment.
    pub fn send(&mut self, target: &ActorId, event: Event) -> Result<(), RuntimeError> {
        self.deliver(None, target, event, &SendOptions::default())
    }

    pub fn send_with(
        &mut self,
        target: &ActorId,
        event: Event,
        options: SendOptions,
    ) -> Result<(), RuntimeError> {
        self.deliver(None, target, event, &options)
    }

    pub fn random_bool(&mut self) -> Result<bool, RuntimeError> {
        self.random_bool_for(None)
    }

    pub fn random_int(&mut self, max_value: u64) -> Result<u64, RuntimeError> {
        self.random_int_for(None, max_value)
    }

    /// Run one complete execution of the program. Bugs and pruned executions
    /// end the iteration normally; only fatal errors are returned as `Err`.
    pub fn run_iteration(&mut self, entry: &EntryPoint) -> Result<IterationOutcome, RuntimeError> {
        self.begin_iteration();
        let result = entry(self).and_then(|()| {
            self.record_state();
            self.explore()
        });

        let termination = match result {
            Ok(termination) => termination,
            Err(e) => match e.classify() {
                ErrorClass::Bug => {
                    info!(bug = %e, "found bug");
                    Termination::Bug(BugReport::safety(e.to_string()))
                }
                ErrorClass::Pruned => {
                    debug!(reason = %e, "iteration pruned");
                    Termination::Pruned(e.to_string())
                }
                ErrorClass::Fatal => return Err(e),
            },
        };

        self.strategy.finish_iteration()?;
        Ok(IterationOutcome {
            termination,
            steps: self.strategy.scheduled_steps(),
        })
    }

    pub fn configure_next_iteration(&mut self) -> bool {
        self.strategy.configure_next_iteration()
    }

    fn begin_iteration(&mut self) {
        self.actors.clear();
        self.monitors.clear();
        self.schedule.clear();
        self.schedule.fair = self.strategy.is_fair();
        self.bug_trace.clear();
        if let Some(race) = &mut self.race {
            race.reset();
        }
        self.next_send_seq = 0;
        self.current = None;
        self.dropped.clear();
    }

    fn explore(&mut self) -> Result<Termination, RuntimeError> {
        loop {
            let enabled: Vec<ActorId> = self
                .actors
                .iter()
                .filter(|s| s.is_enabled())
                .map(|s| s.id.clone())
                .collect();
            if enabled.is_empty() {
                return Ok(self.at_quiescence());
            }
            if self.strategy.has_reached_depth_bound() {
                self.schedule.truncated = true;
                return Ok(self.at_depth_bound());
            }

            let Some(next) = self.strategy.try_get_next(&enabled, self.current.as_ref())? else {
                return Ok(self.at_quiescence());
            };
            self.schedule.push_schedule(next.clone());
            self.current = Some(next.clone());
            self.run_turn(&next)?;
            self.record_state();
        }
    }

    fn at_quiescence(&self) -> Termination {
        let waiting: Vec<String> = self
            .actors
            .iter()
            .filter(|s| !s.halted && s.queue.is_waiting_to_receive())
            .map(|s| s.id.to_string())
            .collect();
        if !waiting.is_empty() {
            return Termination::Bug(BugReport::safety(format!(
                "deadlock detected: {} waiting to receive an event, but no other actor is enabled",
                waiting.join(", ")
            )));
        }
        if let Some(monitor) = self.monitors.iter().find(|m| m.is_hot()) {
            return Termination::Bug(BugReport::liveness(format!(
                "monitor '{}' detected liveness bug in hot state '{}' at the end of program execution",
                monitor.name(),
                monitor.state_name().unwrap_or_default()
            )));
        }
        Termination::Completed
    }

    fn at_depth_bound(&self) -> Termination {
        let steps = self.strategy.scheduled_steps();
        if self.strategy.is_fair() {
            if let Some(monitor) = self.monitors.iter().find(|m| m.is_hot()) {
                return Termination::Bug(BugReport::liveness(format!(
                    "monitor '{}' detected potential liveness bug in hot state '{}' after {steps} steps",
                    monitor.name(),
                    monitor.state_name().unwrap_or_default()
                )));
            }
        }
        if self.options.depth_bound_is_bug {
            return Termination::Bug(BugReport::safety(format!(
                "scheduling steps bound of {steps} reached"
            )));
        }
        debug!(steps, "depth bound reached");
        Termination::DepthBound
    }

    fn run_turn(&mut self, id: &ActorId) -> Result<(), RuntimeError> {
        let idx = index(id);
        let mut actor = self
            .actors
            .get_mut(idx)
            .and_then(|s| s.actor.take())
            .ok_or_else(|| RuntimeError::ActorNotFound(id.clone()))?;
        let result = self.drive(idx, id, actor.as_mut());
        self.actors[idx].actor = Some(actor);
        result
    }

    /// One turn of an actor: a dequeue (or start, or received event), its
    /// handler, any receive the handler asked for that is already satisfiable,
    /// and any event it raised.
    fn drive(&mut self, idx: usize, id: &ActorId, actor: &mut dyn Actor) -> Result<(), RuntimeError> {
        let Some(mut work) = self.next_work(idx, actor) else {
            return Ok(());
        };

        loop {
            let mut cx = Context::new(self, id.clone());
            match &work {
                Work::Start => actor.on_start(&mut cx)?,
                Work::Event(event) => actor.on_event(&mut cx, event)?,
                Work::Received(event) => actor.on_receive(&mut cx, event)?,
                Work::Halt => {}
            }
            let Context { receive, halt, .. } = cx;
            self.note_state(idx, actor);

            if halt || matches!(work, Work::Halt) {
                return self.halt_actor(idx);
            }

            if let Some(filter) = receive {
                match self.actors[idx].queue.receive(filter) {
                    ReceiveOutcome::Ready(event, info) => {
                        self.on_delivered(id, info.send_seq);
                        self.bug_trace.add_receive(id, event.name());
                        work = Work::Received(event);
                        continue;
                    }
                    ReceiveOutcome::Waiting => {
                        let names = self.actors[idx].queue.waiting_event_names();
                        self.bug_trace.add_wait_to_receive(id, &names);
                        return Ok(());
                    }
                }
            }

            // Only a raised event continues the turn; queued events wait for
            // the next scheduling decision.
            match self.dequeue_raised(idx, actor) {
                Some(next) => work = next,
                None => return Ok(()),
            }
        }
    }

    fn next_work(&mut self, idx: usize, actor: &dyn Actor) -> Option<Work> {
        let slot = &mut self.actors[idx];
        if !slot.started {
            slot.started = true;
            return Some(Work::Start);
        }
        if let Some((event, info)) = slot.queue.take_received() {
            let id = slot.id.clone();
            self.on_delivered(&id, info.send_seq);
            self.bug_trace.add_receive(&id, event.name());
            return Some(Work::Received(event));
        }
        self.dequeue(idx, actor)
    }

    fn dequeue(&mut self, idx: usize, actor: &dyn Actor) -> Option<Work> {
        let slot = &mut self.actors[idx];
        let id = slot.id.clone();
        match slot.queue.dequeue(&Handlers(actor)) {
            Dequeued::Raised(event, _) => {
                self.on_delivered(&id, None);
                Some(work_for(event))
            }
            Dequeued::Success(event, info) => {
                self.on_delivered(&id, info.send_seq);
                self.bug_trace.add_dequeue(&id, event.name());
                Some(work_for(event))
            }
            Dequeued::Default(event) => {
                self.on_delivered(&id, None);
                self.bug_trace.add_dequeue(&id, event.name());
                Some(Work::Event(event))
            }
            Dequeued::NotAvailable => None,
        }
    }

    fn dequeue_raised(&mut self, idx: usize, actor: &dyn Actor) -> Option<Work> {
        let slot = &mut self.actors[idx];
        let (event, _) = slot.queue.dequeue_raised(&Handlers(actor))?;
        let id = slot.id.clone();
        self.on_delivered(&id, None);
        Some(work_for(event))
    }

    /// Every handled event ticks the receiver's clock; sent events also join
    /// the sender's clock at send time.
    fn on_delivered(&mut self, id: &ActorId, send_seq: Option<u64>) {
        if let Some(race) = &mut self.race {
            race.on_dequeue(id, send_seq);
        }
    }

    fn note_state(&mut self, idx: usize, actor: &dyn Actor) {
        let state = actor.state_name();
        let slot = &mut self.actors[idx];
        if state == slot.state {
            return;
        }
        if let Some(name) = &state {
            let id = slot.id.clone();
            self.bug_trace.add_goto_state(&id, name);
        }
        self.actors[idx].state = state;
    }

    /// Close the mailbox and report what was left in it. Fails if a
    /// must-handle event was still queued.
    fn halt_actor(&mut self, idx: usize) -> Result<(), RuntimeError> {
        let slot = &mut self.actors[idx];
        slot.halted = true;
        let closed = slot.queue.close();
        let leftovers = slot.queue.dispose();
        let id = slot.id.clone();

        self.bug_trace.add_halt(&id);
        debug!(actor = %id, "halted");
        for (event, _) in leftovers {
            self.report_dropped(&id, event);
        }
        closed.map_err(RuntimeError::from)
    }

    fn create(&mut self, source: Option<&ActorId>, name: &str, actor: Box<dyn Actor>) -> ActorId {
        let id = ActorId::new(self.actors.len() as u64, name);
        let queue = EventQueue::new(id.clone()).with_user_state_hashing(self.options.user_state_hashing);
        let state = actor.state_name();
        self.actors.push(ActorSlot {
            id: id.clone(),
            actor: Some(actor),
            queue,
            started: false,
            halted: false,
            state,
        });

        self.bug_trace.add_create_actor(source, &id);
        if let Some(race) = &mut self.race {
            race.on_create(source, &id);
        }
        debug!(actor = %id, "created actor");
        id
    }

    fn deliver(
        &mut self,
        source: Option<&ActorId>,
        target: &ActorId,
        event: Event,
        options: &SendOptions,
    ) -> Result<(), RuntimeError> {
        let idx = index(target);
        if idx >= self.actors.len() {
            return Err(RuntimeError::ActorNotFound(target.clone()));
        }

        let seq = self.next_send_seq;
        self.next_send_seq += 1;
        self.bug_trace.add_send(source, target, event.name());
        if let Some(race) = &mut self.race {
            race.on_send(source, seq);
        }

        let slot = &mut self.actors[idx];
        if slot.halted || slot.queue.is_closed() {
            let lost = options.must_handle.then(|| MailboxError::MustHandleSentToHalted {
                owner: target.clone(),
                event: event.name().to_string(),
            });
            self.report_dropped(target, event);
            return lost.map_or(Ok(()), |e| Err(e.into()));
        }
        let info = EventInfo::with_options(&event, source.cloned(), options).with_send_seq(seq);
        let status = slot.queue.enqueue(event, info)?;
        debug!(to = %target, ?status, "enqueued event");
        Ok(())
    }

    fn raise(&mut self, id: &ActorId, event: Event) -> Result<(), RuntimeError> {
        let idx = index(id);
        if idx >= self.actors.len() {
            return Err(RuntimeError::ActorNotFound(id.clone()));
        }
        self.bug_trace.add_raise(id, event.name());
        let info = EventInfo::new(&event, Some(id.clone()));
        self.actors[idx].queue.raise(event, info);
        Ok(())
    }

    fn report_dropped(&mut self, target: &ActorId, event: Event) {
        warn!(actor = %target, event = %event.name(), "event dropped");
        if let Some(hook) = &mut self.drop_hook {
            hook(target, &event);
        }
        self.dropped.push((target.clone(), event));
    }

    fn random_bool_for(&mut self, actor: Option<&ActorId>) -> Result<bool, RuntimeError> {
        let value = self.strategy.get_next_bool_choice(2)?;
        self.schedule.push_bool(value);
        self.bug_trace.add_random_choice(actor, Choice::Bool(value));
        Ok(value)
    }

    fn random_int_for(&mut self, actor: Option<&ActorId>, max_value: u64) -> Result<u64, RuntimeError> {
        let value = self.strategy.get_next_choice(max_value)?;
        self.schedule.push_int(value);
        self.bug_trace.add_random_choice(actor, Choice::Int(value));
        Ok(value)
    }

    fn notify_monitors(&mut self, event: &Event) -> Result<(), RuntimeError> {
        for monitor in &mut self.monitors {
            monitor.on_event(event)?;
        }
        Ok(())
    }

    fn record_state(&mut self) {
        let mut hasher = DefaultHasher::new();
        for slot in &self.actors {
            slot.id.value().hash(&mut hasher);
            slot.started.hash(&mut hasher);
            slot.halted.hash(&mut hasher);
            slot.state.hash(&mut hasher);
            slot.queue.cached_state().hash(&mut hasher);
            if self.options.user_state_hashing {
                if let Some(actor) = &slot.actor {
                    actor.hashed_state().hash(&mut hasher);
                }
            }
        }
        for monitor in &self.monitors {
            monitor.state_name().hash(&mut hasher);
            monitor.is_hot().hash(&mut hasher);
        }
        self.visited.insert(hasher.finish());
    }
}

/// What a handler can do to the rest of the program.
pub struct Context<'a> {
    rt: &'a mut Runtime,
    id: ActorId,
    receive: Option<ReceiveFilter>,
    halt: bool,
}

impl<'a> Context<'a> {
    fn new(rt: &'a mut Runtime, id: ActorId) -> Self {
        Context {
            rt,
            id,
            receive: None,
            halt: false,
        }
    }

    /// The actor running this handler.
    pub fn id(&self) -> &ActorId {
        &self.id
    }

    pub fn create_actor(&mut self, name: &str, actor: impl Actor + 'static) -> ActorId {
        self.rt.create(Some(&self.id), name, Box::new(actor))
    }

    pub fn send(&mut self, target: &ActorId, event: Event) -> Result<(), RuntimeError> {
        self.rt.deliver(Some(&self.id), target, event, &SendOptions::default())
    }

    pub fn send_with(
        &mut self,
        target: &ActorId,
        event: Event,
        options: SendOptions,
    ) -> Result<(), RuntimeError> {
        self.rt.deliver(Some(&self.id), target, event, &options)
    }

    /// Handle `event` next, ahead of everything queued, within this turn.
    pub fn raise(&mut self, event: Event) -> Result<(), RuntimeError> {
        self.rt.raise(&self.id, event)
    }

    /// Wait for an event matching `filter`. The handler should return right
    /// after; the event arrives through `Actor::on_receive`.
    pub fn receive(&mut self, filter: ReceiveFilter) {
        self.receive = Some(filter);
    }

    pub fn random_bool(&mut self) -> Result<bool, RuntimeError> {
        self.rt.random_bool_for(Some(&self.id))
    }

    /// A value in `0..max_value`.
    pub fn random_int(&mut self, max_value: u64) -> Result<u64, RuntimeError> {
        self.rt.random_int_for(Some(&self.id), max_value)
    }

    pub fn assert(&self, condition: bool, message: impl Into<String>) -> Result<(), RuntimeError> {
        if condition {
            Ok(())
        } else {
            Err(RuntimeError::AssertionFailed(message.into()))
        }
    }

    pub fn assume(&self, condition: bool, message: impl Into<String>) -> Result<(), RuntimeError> {
        if condition {
            Ok(())
        } else {
            Err(RuntimeError::AssumptionFailed(message.into()))
        }
    }

    /// Record a named action in the bug trace.
    pub fn invoke_action(&mut self, action: &str) {
        self.rt.bug_trace.add_invoke_action(&self.id, action);
    }

    /// Announce a read of state shared outside message passing.
    pub fn read(&mut self, location: &MemoryLocation, source: &str) {
        if let Some(race) = &mut self.rt.race {
            race.on_read(&self.id, location, source);
        }
    }

    pub fn write(&mut self, location: &MemoryLocation, source: &str) {
        if let Some(race) = &mut self.rt.race {
            race.on_write(&self.id, location, source);
        }
    }

    /// Deliver `event` synchronously to every registered monitor.
    pub fn monitor(&mut self, event: Event) -> Result<(), RuntimeError> {
        self.rt.notify_monitors(&event)
    }

    /// Halt this actor once the handler returns.
    pub fn halt(&mut self) {
        self.halt = true;
    }
}
