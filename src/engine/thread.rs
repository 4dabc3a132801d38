use std::collections::VecDeque;

use super::protocol::RuntimeFault;

/// Position of a thread: block arena index plus command index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cursor {
    pub block: usize,
    pub command: usize,
}

/// Why a suspended command is still pending, and what resolves it.
#[derive(Clone, Debug, PartialEq)]
pub enum SuspendState {
    Wait {
        remaining: f64,
    },
    Display {
        elapsed: f64,
        auto_advance_after: Option<f64>,
        continue_requested: bool,
    },
    Choice {
        options: Vec<ChoiceOption>,
        selected: Option<usize>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChoiceOption {
    pub text: String,
    pub target: String,
    /// Index of the choice command that contributed this option.
    pub command: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ThreadState {
    Running,
    Suspended(SuspendState),
    AtBreakpoint,
    Finished,
}

/// One logical thread: an isolated cursor, call stack, and input queue.
/// Threads are scheduled round-robin; only one executes at any instant.
#[derive(Clone, Debug)]
pub struct ExecutionThread {
    pub id: u32,
    pub cursor: Cursor,
    pub call_stack: Vec<Cursor>,
    pub state: ThreadState,
    pub fault: Option<RuntimeFault>,
    /// Pre-seeded deterministic choice indices (`game/willSimulateChoices`).
    pub simulate_choices: VecDeque<usize>,
    /// When set, interaction points resolve without real input.
    pub simulate: bool,
    /// Guards against re-reporting a breakpoint for the same command.
    pub breakpoint_reported: bool,
}

impl ExecutionThread {
    pub fn new(id: u32, cursor: Cursor) -> Self {
        ExecutionThread {
            id,
            cursor,
            call_stack: Vec::new(),
            state: ThreadState::Running,
            fault: None,
            simulate_choices: VecDeque::new(),
            simulate: false,
            breakpoint_reported: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, ThreadState::Finished)
    }

    /// Unwinds the call stack and discards suspension state. Used by
    /// cancellation (`quit`/`restart`/`invalidated`).
    pub fn unwind(&mut self) {
        self.call_stack.clear();
        self.state = ThreadState::Finished;
    }
}
