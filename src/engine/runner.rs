use std::collections::{HashMap, VecDeque};

use crate::{
    compiler::{CommandData, ContentItem, LogSeverity, SourceLocation, SparkProgram},
    evaluate::{CompiledExpression, ExpressionCompiler, Value},
};

use super::{
    blocks::BlockMap,
    protocol::{GameMessage, RuntimeFault},
    runners::AutoAdvance,
    scope::{ScopeChain, ThreadLookup},
    thread::{Cursor, ExecutionThread},
};

/// Result of polling a suspended command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    Pending,
    Done,
}

/// What the cursor does after a runner hook returns.
#[derive(Clone, Debug, PartialEq)]
pub enum Flow {
    /// Advance to the next command.
    Advance,
    /// Move to another index within the current block.
    Goto(usize),
    /// Enter another block at its first command.
    Jump { block: usize, push_return: bool },
    /// Resume at an exact cursor (popped from the call stack).
    Resume(Cursor),
    /// The command suspended; the runner recorded why on the thread.
    Suspend,
    /// This thread is done.
    FinishThread,
    /// This thread failed; only it terminates.
    Fault(RuntimeFault),
}

/// A log line produced by a `log`/`warn`/`error` command.
#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    pub severity: LogSeverity,
    pub message: String,
    pub source: SourceLocation,
}

pub type ExpressionCache = HashMap<String, CompiledExpression>;

/// Everything a command runner may read or mutate during one tick. The
/// program and block map are read-only; thread state, scopes, and the
/// outgoing queues are exclusive to the running thread for the duration of
/// the call.
pub struct RunContext<'a> {
    pub program: &'a SparkProgram,
    pub blocks: &'a BlockMap,
    pub targets: &'a HashMap<(usize, usize), usize>,
    pub thread: &'a mut ExecutionThread,
    pub scopes: &'a mut ScopeChain,
    pub messages: &'a mut VecDeque<GameMessage>,
    pub logs: &'a mut Vec<LogEntry>,
    pub expressions: &'a mut ExpressionCache,
    /// Seconds elapsed since the previous tick.
    pub delta: f64,
    /// Display pacing; `None` means displays wait for the host.
    pub auto_advance: Option<AutoAdvance>,
}

impl<'a> RunContext<'a> {
    /// Commands of the thread's current block. Borrowed from the program,
    /// so the slice stays usable across later mutations of the context.
    pub fn commands(&self) -> &'a [CommandData] {
        self.blocks.commands(self.program, self.thread.cursor.block)
    }

    pub fn emit(&mut self, message: GameMessage) {
        self.messages.push_back(message);
    }

    /// Pre-resolved jump target of a command, if its name resolved.
    pub fn target_of(&self, command: &CommandData) -> Option<usize> {
        self.targets
            .get(&(self.thread.cursor.block, command.reference.index))
            .copied()
    }

    /// Compiles (with caching) and evaluates an inline expression in the
    /// thread's scope. Any diagnostic is a runtime fault carrying the
    /// command's source location.
    pub fn evaluate(&mut self, source: &str, at: &SourceLocation) -> Result<Value, RuntimeFault> {
        let compiled = self
            .expressions
            .entry(source.to_string())
            .or_insert_with(|| ExpressionCompiler.compile(source));
        let lookup = ThreadLookup {
            scopes: self.scopes,
            blocks: self.blocks,
            block: self.thread.cursor.block,
        };
        let evaluation = compiled.evaluate(&lookup);
        match evaluation
            .diagnostics
            .first()
            .or_else(|| compiled.diagnostics.first())
        {
            Some(diagnostic) => Err(RuntimeFault {
                message: diagnostic.message(),
                location: at.clone(),
            }),
            None => Ok(evaluation.value),
        }
    }

    /// Renders display/choice content, evaluating interpolations.
    pub fn render_content(
        &mut self,
        content: &[ContentItem],
        at: &SourceLocation,
    ) -> Result<String, RuntimeFault> {
        let mut out = String::new();
        for item in content {
            match item {
                ContentItem::Text { text } => out.push_str(text),
                ContentItem::Interpolation { expression } => {
                    let value = self.evaluate(expression, at)?;
                    out.push_str(&value.to_string());
                }
            }
        }
        Ok(out)
    }
}

/// Per-command-type lifecycle. `on_execute` runs the instantaneous part
/// and either completes or suspends; suspended commands are `poll`ed once
/// per tick until done, then `on_finished` advances the cursor.
pub trait CommandRunner {
    fn on_execute(&self, command: &CommandData, ctx: &mut RunContext<'_>) -> Flow;

    fn poll(&self, _command: &CommandData, _ctx: &mut RunContext<'_>) -> Completion {
        Completion::Done
    }

    fn on_finished(&self, _command: &CommandData, _ctx: &mut RunContext<'_>) -> Flow {
        Flow::Advance
    }
}
