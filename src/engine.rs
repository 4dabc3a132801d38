//! The cooperative, steppable runtime: executes a compiled program as
//! resumable threads, one command per thread per tick, and emits a
//! debugger-style event stream.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::compiler::{CommandParams, SparkProgram};

pub mod blocks;
mod builder;
pub mod protocol;
pub mod runner;
pub mod runners;
pub mod scope;
pub mod thread;

pub use self::{
    blocks::BlockMap,
    builder::GameBuilder,
    protocol::{
        ExitReason, GameMessage, GameRequest, GameRequestParams, GameResponse, InteractionKind,
        RuntimeFault,
    },
    runner::{CommandRunner, Completion, ExpressionCache, Flow, LogEntry, RunContext},
    runners::AutoAdvance,
    scope::{ScopeChain, ThreadLookup},
    thread::{ChoiceOption, Cursor, ExecutionThread, SuspendState, ThreadState},
};

use self::builder::RunnerRegistry;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameState {
    NotStarted,
    Running,
    Exited(ExitReason),
}

/// One run of a compiled program.
///
/// The game holds a read-only reference to the program and never mutates
/// it; all mutable state (threads, scopes, queues) belongs to the run and
/// is destroyed on exit or restart. The host drives execution by calling
/// [`Game::tick`] with elapsed time and drains the message queue after
/// each call.
pub struct Game {
    program: Arc<SparkProgram>,
    blocks: BlockMap,
    /// Jump/choice targets resolved to block indices once, at load.
    targets: HashMap<(usize, usize), usize>,
    threads: Vec<ExecutionThread>,
    scopes: ScopeChain,
    messages: VecDeque<GameMessage>,
    logs: Vec<LogEntry>,
    expressions: ExpressionCache,
    breakpoints: HashSet<usize>,
    auto_advance: Option<AutoAdvance>,
    pending_simulate: IndexMap<u32, Vec<usize>>,
    runners: RunnerRegistry,
    entry: Option<String>,
    state: GameState,
    next_thread_id: u32,
    first_fault: Option<RuntimeFault>,
}

impl Game {
    pub fn new(program: Arc<SparkProgram>) -> Self {
        GameBuilder::new(program).build()
    }

    pub fn builder(program: Arc<SparkProgram>) -> GameBuilder {
        GameBuilder::new(program)
    }

    pub(crate) fn from_builder(
        program: Arc<SparkProgram>,
        entry: Option<String>,
        breakpoints: HashSet<usize>,
        auto_advance: Option<AutoAdvance>,
        pending_simulate: IndexMap<u32, Vec<usize>>,
        runners: RunnerRegistry,
    ) -> Self {
        let blocks = BlockMap::new(&program);
        let targets = resolve_targets(&program, &blocks);
        let scopes = ScopeChain::from_program(&program);
        Game {
            program,
            blocks,
            targets,
            threads: Vec::new(),
            scopes,
            messages: VecDeque::new(),
            logs: Vec::new(),
            expressions: HashMap::new(),
            breakpoints,
            auto_advance,
            pending_simulate,
            runners,
            entry,
            state: GameState::NotStarted,
            next_thread_id: 0,
            first_fault: None,
        }
    }

    pub fn program(&self) -> &Arc<SparkProgram> {
        &self.program
    }

    pub fn blocks(&self) -> &BlockMap {
        &self.blocks
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, GameState::Exited(_))
    }

    pub fn scopes(&self) -> &ScopeChain {
        &self.scopes
    }

    pub fn threads(&self) -> &[ExecutionThread] {
        &self.threads
    }

    pub fn drain_messages(&mut self) -> Vec<GameMessage> {
        self.messages.drain(..).collect()
    }

    pub fn drain_logs(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.logs)
    }

    /// Emits `game/started` and spawns the first thread at the entry block.
    pub fn start(&mut self) {
        self.messages.push_back(GameMessage::Started {});
        self.state = GameState::Running;
        let entry = self
            .entry
            .as_deref()
            .and_then(|key| self.blocks.index_of(key))
            .unwrap_or(0);
        self.spawn_at(entry);
    }

    /// Spawns an additional thread at the given block key.
    pub fn spawn_thread(&mut self, block: &str) -> Option<u32> {
        let index = self.blocks.index_of(block)?;
        Some(self.spawn_at(index))
    }

    fn spawn_at(&mut self, block: usize) -> u32 {
        let id = self.next_thread_id;
        self.next_thread_id += 1;
        let mut thread = ExecutionThread::new(id, Cursor { block, command: 0 });
        if let Some(choices) = self.pending_simulate.shift_remove(&id) {
            thread.simulate_choices = choices.into();
            thread.simulate = true;
        }
        self.threads.push(thread);
        id
    }

    /// Advances every live thread by at most one command (or one poll of a
    /// suspended command). `delta` is the seconds elapsed since the last
    /// tick; timers and auto-advance consume it.
    pub fn tick(&mut self, delta: f64) {
        if self.state != GameState::Running {
            return;
        }
        let mut threads = std::mem::take(&mut self.threads);
        for thread in &mut threads {
            self.step_thread(thread, delta);
        }
        self.threads = threads;
        self.check_all_finished();
    }

    fn step_thread(&mut self, thread: &mut ExecutionThread, delta: f64) {
        match thread.state {
            ThreadState::Finished | ThreadState::AtBreakpoint => {}
            ThreadState::Running => self.execute_current(thread, delta),
            ThreadState::Suspended(_) => self.poll_current(thread, delta),
        }
    }

    fn execute_current(&mut self, thread: &mut ExecutionThread, delta: f64) {
        let program = Arc::clone(&self.program);
        let commands = self.blocks.commands(&program, thread.cursor.block);
        let Some(command) = commands.get(thread.cursor.command) else {
            // Fell off the end of the block: an un-returned call resumes
            // its caller, otherwise the thread is done.
            match thread.call_stack.pop() {
                Some(cursor) => thread.cursor = cursor,
                None => self.finish_thread(thread, None),
            }
            return;
        };

        if self.breakpoints.contains(&command.source.line) && !thread.breakpoint_reported {
            thread.breakpoint_reported = true;
            thread.state = ThreadState::AtBreakpoint;
            self.messages.push_back(GameMessage::HitBreakpoint {
                thread: thread.id,
                location: command.source.clone(),
            });
            return;
        }

        let Some(runner) = self.runners.get(command.params.type_id()).cloned() else {
            thread.cursor.command += 1;
            return;
        };
        let mut ctx = RunContext {
            program: &program,
            blocks: &self.blocks,
            targets: &self.targets,
            thread: &mut *thread,
            scopes: &mut self.scopes,
            messages: &mut self.messages,
            logs: &mut self.logs,
            expressions: &mut self.expressions,
            delta,
            auto_advance: self.auto_advance,
        };
        let flow = runner.on_execute(command, &mut ctx);
        self.apply_flow(thread, flow);
    }

    fn poll_current(&mut self, thread: &mut ExecutionThread, delta: f64) {
        let program = Arc::clone(&self.program);
        let commands = self.blocks.commands(&program, thread.cursor.block);
        let Some(command) = commands.get(thread.cursor.command) else {
            self.finish_thread(thread, None);
            return;
        };
        let Some(runner) = self.runners.get(command.params.type_id()).cloned() else {
            thread.state = ThreadState::Running;
            thread.cursor.command += 1;
            return;
        };
        let mut ctx = RunContext {
            program: &program,
            blocks: &self.blocks,
            targets: &self.targets,
            thread: &mut *thread,
            scopes: &mut self.scopes,
            messages: &mut self.messages,
            logs: &mut self.logs,
            expressions: &mut self.expressions,
            delta,
            auto_advance: self.auto_advance,
        };
        match runner.poll(command, &mut ctx) {
            Completion::Pending => {}
            Completion::Done => {
                let flow = runner.on_finished(command, &mut ctx);
                thread.state = ThreadState::Running;
                self.apply_flow(thread, flow);
            }
        }
    }

    fn apply_flow(&mut self, thread: &mut ExecutionThread, flow: Flow) {
        match flow {
            Flow::Advance => {
                thread.cursor.command += 1;
                thread.breakpoint_reported = false;
            }
            Flow::Goto(index) => {
                thread.cursor.command = index;
                thread.breakpoint_reported = false;
            }
            Flow::Jump { block, push_return } => {
                if push_return {
                    thread.call_stack.push(Cursor {
                        block: thread.cursor.block,
                        command: thread.cursor.command + 1,
                    });
                }
                thread.cursor = Cursor { block, command: 0 };
                thread.breakpoint_reported = false;
            }
            Flow::Resume(cursor) => {
                thread.cursor = cursor;
                thread.breakpoint_reported = false;
            }
            Flow::Suspend => {}
            Flow::FinishThread => self.finish_thread(thread, None),
            Flow::Fault(fault) => self.finish_thread(thread, Some(fault)),
        }
    }

    fn finish_thread(&mut self, thread: &mut ExecutionThread, fault: Option<RuntimeFault>) {
        if let Some(fault) = fault {
            if self.first_fault.is_none() {
                self.first_fault = Some(fault.clone());
            }
            thread.fault = Some(fault);
        }
        thread.state = ThreadState::Finished;
        self.messages
            .push_back(GameMessage::ExitedThread { thread: thread.id });
    }

    fn check_all_finished(&mut self) {
        if self.state != GameState::Running
            || self.threads.is_empty()
            || !self.threads.iter().all(ExecutionThread::is_finished)
        {
            return;
        }
        match self.first_fault.clone() {
            Some(fault) => {
                self.messages.push_back(GameMessage::Exited {
                    reason: ExitReason::Error,
                    error: Some(fault),
                });
                self.state = GameState::Exited(ExitReason::Error);
            }
            None => {
                self.messages.push_back(GameMessage::Finished {});
                self.messages.push_back(GameMessage::Exited {
                    reason: ExitReason::Finished,
                    error: None,
                });
                self.state = GameState::Exited(ExitReason::Finished);
            }
        }
    }

    /// Host clicked through the pause of a display command.
    pub fn continue_thread(&mut self, id: u32) -> bool {
        for thread in &mut self.threads {
            if thread.id == id
                && let ThreadState::Suspended(SuspendState::Display {
                    continue_requested, ..
                }) = &mut thread.state
            {
                *continue_requested = true;
                return true;
            }
        }
        false
    }

    /// Host picked a choice option.
    pub fn choose(&mut self, id: u32, index: usize) -> bool {
        for thread in &mut self.threads {
            if thread.id == id
                && let ThreadState::Suspended(SuspendState::Choice { options, selected }) =
                    &mut thread.state
                && index < options.len()
            {
                *selected = Some(index);
                return true;
            }
        }
        false
    }

    /// Resumes every thread paused at a breakpoint.
    pub fn continue_execution(&mut self) {
        for thread in &mut self.threads {
            if thread.state == ThreadState::AtBreakpoint {
                thread.state = ThreadState::Running;
            }
        }
    }

    pub fn set_breakpoints(&mut self, lines: impl IntoIterator<Item = usize>) {
        self.breakpoints = lines.into_iter().collect();
    }

    /// Pre-seeds deterministic choice indices for a thread (spawned or
    /// not yet spawned), enabling reproducible fast-forward previews.
    pub fn will_simulate_choices(&mut self, id: u32, choices: Vec<usize>) {
        for thread in &mut self.threads {
            if thread.id == id {
                thread.simulate_choices = choices.into();
                thread.simulate = true;
                return;
            }
        }
        self.pending_simulate.insert(id, choices);
    }

    pub fn handle_request(&mut self, request: GameRequest) -> GameResponse {
        match request.params {
            GameRequestParams::WillSimulateChoices { choices } => {
                for (thread, indices) in choices {
                    self.will_simulate_choices(thread, indices);
                }
            }
        }
        GameResponse::ack(request.id)
    }

    /// Unwinds every thread and ends the run.
    pub fn quit(&mut self) {
        for thread in &mut self.threads {
            thread.unwind();
        }
        self.messages.push_back(GameMessage::Exited {
            reason: ExitReason::Quit,
            error: None,
        });
        self.state = GameState::Exited(ExitReason::Quit);
    }

    /// Discards run state and starts over with the same program.
    pub fn restart(&mut self) {
        self.messages.push_back(GameMessage::Exited {
            reason: ExitReason::Restart,
            error: None,
        });
        self.reset();
        self.start();
    }

    /// Atomically replaces the running program (e.g. after a recompile)
    /// and starts a fresh run.
    pub fn invalidate(&mut self, program: Arc<SparkProgram>) {
        self.messages.push_back(GameMessage::Exited {
            reason: ExitReason::Invalidated,
            error: None,
        });
        self.blocks = BlockMap::new(&program);
        self.targets = resolve_targets(&program, &self.blocks);
        self.program = program;
        self.expressions.clear();
        self.reset();
        self.start();
    }

    fn reset(&mut self) {
        self.threads.clear();
        self.scopes.reset(&self.program);
        self.first_fault = None;
        self.next_thread_id = 0;
    }
}

fn resolve_targets(program: &SparkProgram, blocks: &BlockMap) -> HashMap<(usize, usize), usize> {
    let mut targets = HashMap::new();
    for (block_index, block) in program.blocks.values().enumerate() {
        for (command_index, command) in block.commands.iter().enumerate() {
            let name = match &command.params {
                CommandParams::Jump { value, .. } => value,
                CommandParams::Choice { target, .. } => target,
                _ => continue,
            };
            if let Some(target) = blocks.resolve(block_index, name) {
                targets.insert((block_index, command_index), target);
            }
        }
    }
    targets
}
