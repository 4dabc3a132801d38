//! The per-command-type lifecycle runners.

use unicode_segmentation::UnicodeSegmentation;

use crate::compiler::{AssignOperator, BranchCheck, CommandData, CommandParams, ContentItem};
use crate::evaluate::Value;

use super::{
    protocol::{GameMessage, InteractionKind, RuntimeFault},
    runner::{CommandRunner, Completion, Flow, LogEntry, RunContext},
    thread::{ChoiceOption, SuspendState, ThreadState},
};

/// Auto-advance pacing for display commands: a base delay plus a
/// per-grapheme reading allowance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AutoAdvance {
    pub base_seconds: f64,
    pub seconds_per_grapheme: f64,
}

impl AutoAdvance {
    pub fn duration_for(&self, text: &str) -> f64 {
        self.base_seconds + self.seconds_per_grapheme * text.graphemes(true).count() as f64
    }
}

/// `if` / `elseif` / `else` / `end`.
///
/// An `if` evaluates its chain and enters exactly one body; an `elseif` or
/// `else` reached by falling out of an executed body skips past the
/// chain's `end`; `end` is a no-op marker.
pub struct BranchRunner;

impl CommandRunner for BranchRunner {
    fn on_execute(&self, command: &CommandData, ctx: &mut RunContext<'_>) -> Flow {
        let CommandParams::Branch { check, .. } = &command.params else {
            return Flow::Advance;
        };
        match check {
            BranchCheck::If => self.enter_chain(command, ctx),
            BranchCheck::Elseif | BranchCheck::Else => Flow::Goto(after_chain(
                ctx.commands(),
                command.reference.index,
                command.indent,
            )),
            BranchCheck::End => Flow::Advance,
        }
    }
}

impl BranchRunner {
    fn enter_chain(&self, command: &CommandData, ctx: &mut RunContext<'_>) -> Flow {
        let indent = command.indent;
        let mut at = command.reference.index;
        loop {
            let Some(current) = ctx.commands().get(at) else {
                return Flow::Goto(at);
            };
            let CommandParams::Branch { check, condition } = &current.params else {
                return Flow::Goto(at);
            };
            match check {
                BranchCheck::If | BranchCheck::Elseif => {
                    let condition = condition.clone();
                    let source = current.source.clone();
                    match ctx.evaluate(&condition, &source) {
                        Err(fault) => return Flow::Fault(fault),
                        Ok(value) if value.is_truthy() => return Flow::Goto(at + 1),
                        Ok(_) => match next_clause(ctx.commands(), at, indent) {
                            Some(next) => at = next,
                            None => {
                                return Flow::Goto(after_chain(ctx.commands(), at, indent));
                            }
                        },
                    }
                }
                BranchCheck::Else | BranchCheck::End => return Flow::Goto(at + 1),
            }
        }
    }
}

/// Next `elseif`/`else`/`end` of the chain at `indent`, or `None` when the
/// chain is unterminated. Deeper-indented commands (nested chains and
/// bodies) are stepped over.
fn next_clause(commands: &[CommandData], from: usize, indent: usize) -> Option<usize> {
    for (offset, command) in commands[from + 1..].iter().enumerate() {
        if command.indent < indent {
            return None;
        }
        if command.indent > indent {
            continue;
        }
        if let CommandParams::Branch { check, .. } = &command.params {
            return match check {
                BranchCheck::If => None,
                _ => Some(from + 1 + offset),
            };
        }
    }
    None
}

/// Index just past the chain's `end`, or wherever the chain stops making
/// sense (a shallower command, a new `if`, or the end of the block).
fn after_chain(commands: &[CommandData], from: usize, indent: usize) -> usize {
    for (offset, command) in commands[from + 1..].iter().enumerate() {
        let at = from + 1 + offset;
        if command.indent < indent {
            return at;
        }
        if command.indent > indent {
            continue;
        }
        if let CommandParams::Branch { check, .. } = &command.params {
            match check {
                BranchCheck::End => return at + 1,
                BranchCheck::If => return at,
                _ => {}
            }
        }
    }
    commands.len()
}

/// `> Target` and `>> Target`.
pub struct JumpRunner;

impl CommandRunner for JumpRunner {
    fn on_execute(&self, command: &CommandData, ctx: &mut RunContext<'_>) -> Flow {
        let CommandParams::Jump {
            value,
            return_when_finished,
        } = &command.params
        else {
            return Flow::Advance;
        };
        // A jump to nowhere ends the thread without being a fault.
        if value.is_empty() {
            return Flow::FinishThread;
        }
        match ctx.target_of(command) {
            Some(block) => Flow::Jump {
                block,
                push_return: *return_when_finished,
            },
            None => Flow::Fault(RuntimeFault {
                message: format!("Cannot jump to '{value}': no such section"),
                location: command.source.clone(),
            }),
        }
    }
}

/// `<`: pops the call stack and resumes after the originating jump.
pub struct ReturnRunner;

impl CommandRunner for ReturnRunner {
    fn on_execute(&self, _command: &CommandData, ctx: &mut RunContext<'_>) -> Flow {
        match ctx.thread.call_stack.pop() {
            Some(cursor) => Flow::Resume(cursor),
            None => Flow::FinishThread,
        }
    }
}

/// `~ name = value` and the compound forms.
pub struct AssignRunner;

impl CommandRunner for AssignRunner {
    fn on_execute(&self, command: &CommandData, ctx: &mut RunContext<'_>) -> Flow {
        let CommandParams::Assign {
            variable,
            operator,
            value,
        } = &command.params
        else {
            return Flow::Advance;
        };
        let rhs = match ctx.evaluate(value, &command.source) {
            Ok(value) => value,
            Err(fault) => return Flow::Fault(fault),
        };
        let new_value = if *operator == AssignOperator::Assign {
            rhs
        } else {
            let block = ctx.thread.cursor.block;
            let Some(old) = ctx.scopes.get(ctx.blocks, block, variable) else {
                return Flow::Fault(RuntimeFault {
                    message: format!("Variable '{variable}' was not found"),
                    location: command.source.clone(),
                });
            };
            match apply_operator(*operator, &old, &rhs) {
                Some(value) => value,
                None => {
                    return Flow::Fault(RuntimeFault {
                        message: format!(
                            "Operation '{}' is not supported between {} and {}",
                            operator_symbol(*operator),
                            old.type_name(),
                            rhs.type_name(),
                        ),
                        location: command.source.clone(),
                    });
                }
            }
        };
        let block = ctx.thread.cursor.block;
        ctx.scopes.set(ctx.blocks, block, variable, new_value);
        Flow::Advance
    }
}

fn operator_symbol(operator: AssignOperator) -> &'static str {
    match operator {
        AssignOperator::Assign => "=",
        AssignOperator::Add => "+=",
        AssignOperator::Subtract => "-=",
        AssignOperator::Multiply => "*=",
        AssignOperator::Divide => "/=",
    }
}

fn apply_operator(operator: AssignOperator, old: &Value, rhs: &Value) -> Option<Value> {
    match operator {
        AssignOperator::Assign => Some(rhs.clone()),
        AssignOperator::Add => match (old, rhs) {
            (Value::Num(l), Value::Num(r)) => Some(Value::Num(l + r)),
            (Value::Str(_), _) | (_, Value::Str(_)) => Some(Value::Str(format!("{old}{rhs}"))),
            _ => None,
        },
        AssignOperator::Subtract => numeric(old, rhs, |l, r| l - r),
        AssignOperator::Multiply => numeric(old, rhs, |l, r| l * r),
        AssignOperator::Divide => numeric(old, rhs, |l, r| l / r),
    }
}

fn numeric(old: &Value, rhs: &Value, apply: fn(f64, f64) -> f64) -> Option<Value> {
    match (old.as_num(), rhs.as_num()) {
        (Some(l), Some(r)) => Some(Value::Num(apply(l, r))),
        _ => None,
    }
}

/// `wait seconds`: suspends until the injected tick time drains it.
pub struct WaitRunner;

impl CommandRunner for WaitRunner {
    fn on_execute(&self, command: &CommandData, ctx: &mut RunContext<'_>) -> Flow {
        let CommandParams::Wait { seconds } = &command.params else {
            return Flow::Advance;
        };
        let value = match ctx.evaluate(seconds, &command.source) {
            Ok(value) => value,
            Err(fault) => return Flow::Fault(fault),
        };
        let Some(seconds) = value.as_num() else {
            return Flow::Fault(RuntimeFault {
                message: format!("wait expects a number, got {}", value.type_name()),
                location: command.source.clone(),
            });
        };
        if seconds <= 0.0 || ctx.thread.simulate {
            return Flow::Advance;
        }
        ctx.thread.state = ThreadState::Suspended(SuspendState::Wait { remaining: seconds });
        Flow::Suspend
    }

    fn poll(&self, _command: &CommandData, ctx: &mut RunContext<'_>) -> Completion {
        if let ThreadState::Suspended(SuspendState::Wait { remaining }) = &mut ctx.thread.state {
            *remaining -= ctx.delta;
            if *remaining > 0.0 {
                return Completion::Pending;
            }
        }
        Completion::Done
    }
}

/// `log` / `warn` / `error`.
pub struct LogRunner;

impl CommandRunner for LogRunner {
    fn on_execute(&self, command: &CommandData, ctx: &mut RunContext<'_>) -> Flow {
        let CommandParams::Log { severity, message } = &command.params else {
            return Flow::Advance;
        };
        ctx.logs.push(LogEntry {
            severity: *severity,
            message: message.clone(),
            source: command.source.clone(),
        });
        Flow::Advance
    }
}

/// A display line: renders its content, then pauses awaiting interaction.
/// The pause ends by host click, by auto-advance, or instantly when the
/// thread is simulating; each exit emits its own notification so replays
/// know *why* the pause ended.
pub struct DisplayRunner;

impl CommandRunner for DisplayRunner {
    fn on_execute(&self, command: &CommandData, ctx: &mut RunContext<'_>) -> Flow {
        let CommandParams::Display { character, content } = &command.params else {
            return Flow::Advance;
        };
        let text = match ctx.render_content(content, &command.source) {
            Ok(text) => text,
            Err(fault) => return Flow::Fault(fault),
        };
        let auto_advance_after = if ctx.thread.simulate {
            Some(0.0)
        } else {
            ctx.auto_advance.map(|auto| auto.duration_for(&text))
        };
        let thread = ctx.thread.id;
        ctx.emit(GameMessage::AwaitingInteraction {
            thread,
            kind: InteractionKind::Display,
            character: character.clone(),
            text: Some(text),
            choices: Vec::new(),
        });
        ctx.thread.state = ThreadState::Suspended(SuspendState::Display {
            elapsed: 0.0,
            auto_advance_after,
            continue_requested: false,
        });
        Flow::Suspend
    }

    fn poll(&self, _command: &CommandData, ctx: &mut RunContext<'_>) -> Completion {
        let thread = ctx.thread.id;
        let delta = ctx.delta;
        let resolution = match &mut ctx.thread.state {
            ThreadState::Suspended(SuspendState::Display {
                elapsed,
                auto_advance_after,
                continue_requested,
            }) => {
                if *continue_requested {
                    Some(GameMessage::ClickedToContinue { thread })
                } else if let Some(after) = auto_advance_after {
                    *elapsed += delta;
                    if *elapsed >= *after {
                        Some(GameMessage::AutoAdvancedToContinue { thread })
                    } else {
                        None
                    }
                } else {
                    None
                }
            }
            _ => return Completion::Done,
        };
        match resolution {
            Some(message) => {
                ctx.emit(message);
                Completion::Done
            }
            None => Completion::Pending,
        }
    }

    fn on_finished(&self, command: &CommandData, ctx: &mut RunContext<'_>) -> Flow {
        let thread = ctx.thread.id;
        ctx.emit(GameMessage::WillSaveCheckpoint {
            thread,
            checkpoint: command.reference.id.clone(),
            location: command.source.clone(),
        });
        Flow::Advance
    }
}

/// A run of consecutive `+ text > Target` commands forms one interaction
/// point; picking an option jumps to its target.
pub struct ChoiceRunner;

impl CommandRunner for ChoiceRunner {
    fn on_execute(&self, command: &CommandData, ctx: &mut RunContext<'_>) -> Flow {
        if !matches!(command.params, CommandParams::Choice { .. }) {
            return Flow::Advance;
        }
        let start = command.reference.index;
        let mut group: Vec<(Vec<ContentItem>, String, usize)> = Vec::new();
        for (offset, candidate) in ctx.commands().get(start..).unwrap_or(&[]).iter().enumerate() {
            if let CommandParams::Choice { content, target } = &candidate.params {
                group.push((content.clone(), target.clone(), start + offset));
            } else {
                break;
            }
        }

        let mut options = Vec::with_capacity(group.len());
        for (content, target, index) in group {
            let text = match ctx.render_content(&content, &command.source) {
                Ok(text) => text,
                Err(fault) => return Flow::Fault(fault),
            };
            options.push(ChoiceOption {
                text,
                target,
                command: index,
            });
        }
        let texts: Vec<String> = options.iter().map(|option| option.text.clone()).collect();
        let thread = ctx.thread.id;
        ctx.emit(GameMessage::AwaitingInteraction {
            thread,
            kind: InteractionKind::Choice,
            character: None,
            text: None,
            choices: texts,
        });

        if let Some(choice) = ctx.thread.simulate_choices.pop_front() {
            let Some(option) = options.get(choice).cloned() else {
                return Flow::Fault(RuntimeFault {
                    message: format!("simulated choice {choice} is out of range"),
                    location: command.source.clone(),
                });
            };
            ctx.emit(GameMessage::ChosePathToContinue {
                thread,
                index: choice,
                target: option.target.clone(),
            });
            ctx.emit(GameMessage::WillSaveCheckpoint {
                thread,
                checkpoint: command.reference.id.clone(),
                location: command.source.clone(),
            });
            return resolve_choice(command, ctx, &option, start + options.len());
        }

        ctx.thread.state = ThreadState::Suspended(SuspendState::Choice {
            options,
            selected: None,
        });
        Flow::Suspend
    }

    fn poll(&self, _command: &CommandData, ctx: &mut RunContext<'_>) -> Completion {
        match &ctx.thread.state {
            ThreadState::Suspended(SuspendState::Choice { selected, .. }) => {
                if selected.is_some() {
                    Completion::Done
                } else {
                    Completion::Pending
                }
            }
            _ => Completion::Done,
        }
    }

    fn on_finished(&self, command: &CommandData, ctx: &mut RunContext<'_>) -> Flow {
        let ThreadState::Suspended(SuspendState::Choice {
            options,
            selected: Some(selected),
        }) = &ctx.thread.state
        else {
            return Flow::Advance;
        };
        let selected = *selected;
        let after_group = command.reference.index + options.len();
        let Some(option) = options.get(selected).cloned() else {
            return Flow::Advance;
        };
        let thread = ctx.thread.id;
        ctx.emit(GameMessage::ChosePathToContinue {
            thread,
            index: selected,
            target: option.target.clone(),
        });
        ctx.emit(GameMessage::WillSaveCheckpoint {
            thread,
            checkpoint: command.reference.id.clone(),
            location: command.source.clone(),
        });
        resolve_choice(command, ctx, &option, after_group)
    }
}

fn resolve_choice(
    command: &CommandData,
    ctx: &mut RunContext<'_>,
    option: &ChoiceOption,
    after_group: usize,
) -> Flow {
    if option.target.is_empty() {
        return Flow::Goto(after_group);
    }
    match ctx
        .targets
        .get(&(ctx.thread.cursor.block, option.command))
        .copied()
    {
        Some(block) => Flow::Jump {
            block,
            push_return: false,
        },
        None => Flow::Fault(RuntimeFault {
            message: format!("Cannot jump to '{}': no such section", option.target),
            location: command.source.clone(),
        }),
    }
}
