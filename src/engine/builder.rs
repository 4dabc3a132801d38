use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::compiler::SparkProgram;

use super::{
    Game,
    runner::CommandRunner,
    runners::{
        AssignRunner, AutoAdvance, BranchRunner, ChoiceRunner, DisplayRunner, JumpRunner,
        LogRunner, ReturnRunner, WaitRunner,
    },
};

pub(crate) type RunnerRegistry = IndexMap<String, Arc<dyn CommandRunner + Send + Sync>>;

pub(crate) fn default_runners() -> RunnerRegistry {
    let mut runners: RunnerRegistry = IndexMap::new();
    runners.insert("BranchCommand".to_string(), Arc::new(BranchRunner));
    runners.insert("JumpCommand".to_string(), Arc::new(JumpRunner));
    runners.insert("ReturnCommand".to_string(), Arc::new(ReturnRunner));
    runners.insert("AssignCommand".to_string(), Arc::new(AssignRunner));
    runners.insert("WaitCommand".to_string(), Arc::new(WaitRunner));
    runners.insert("LogCommand".to_string(), Arc::new(LogRunner));
    runners.insert("DisplayCommand".to_string(), Arc::new(DisplayRunner));
    runners.insert("ChoiceCommand".to_string(), Arc::new(ChoiceRunner));
    runners
}

/// Configures and builds a [`Game`]. Every collaborator is passed in
/// explicitly; the engine holds no ambient globals.
pub struct GameBuilder {
    program: Arc<SparkProgram>,
    entry: Option<String>,
    breakpoints: HashSet<usize>,
    auto_advance: Option<AutoAdvance>,
    simulate_choices: IndexMap<u32, Vec<usize>>,
    runners: RunnerRegistry,
}

impl GameBuilder {
    pub fn new(program: Arc<SparkProgram>) -> Self {
        GameBuilder {
            program,
            entry: None,
            breakpoints: HashSet::new(),
            auto_advance: None,
            simulate_choices: IndexMap::new(),
            runners: default_runners(),
        }
    }

    /// Block key the first thread starts in. Defaults to the main block.
    pub fn entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = Some(entry.into());
        self
    }

    /// Flags source lines; entering a command on one pauses the thread and
    /// emits `game/hitBreakpoint`.
    pub fn breakpoints(mut self, lines: impl IntoIterator<Item = usize>) -> Self {
        self.breakpoints = lines.into_iter().collect();
        self
    }

    pub fn auto_advance(mut self, auto_advance: AutoAdvance) -> Self {
        self.auto_advance = Some(auto_advance);
        self
    }

    /// Pre-seeds deterministic choice indices for a thread, as
    /// `game/willSimulateChoices` would.
    pub fn simulate_choices(mut self, thread: u32, choices: impl IntoIterator<Item = usize>) -> Self {
        self.simulate_choices
            .insert(thread, choices.into_iter().collect());
        self
    }

    /// Registers (or overrides) the runner for a command type id.
    pub fn runner(
        mut self,
        type_id: impl Into<String>,
        runner: Arc<dyn CommandRunner + Send + Sync>,
    ) -> Self {
        self.runners.insert(type_id.into(), runner);
        self
    }

    pub fn build(self) -> Game {
        Game::from_builder(
            self.program,
            self.entry,
            self.breakpoints,
            self.auto_advance,
            self.simulate_choices,
            self.runners,
        )
    }
}
