mod testutils;

use std::sync::Arc;

use sparkdown::engine::{
    AutoAdvance, ExitReason, GameMessage, GameRequest, GameState, InteractionKind, ThreadState,
};
use sparkdown::program::{
    CommandData, CommandParams, CommandReference, SourceLocation, SparkBlock, SparkProgram,
};
use sparkdown::Game;
use testutils::*;

mod branch_semantics {
    use super::*;

    const CHAIN: &str = "\
var x = 1
var taken = 0

# Chain
if x > 1
~ taken = 10
elseif x == 1
~ taken = 20
else
~ taken = 30
end
~ x = 99
";

    #[test]
    fn exactly_the_matching_elseif_body_executes() {
        let mut game = game(CHAIN, "Chain");
        run_to_end(&mut game);
        assert_eq!(global_num(&game, "taken"), 20.0);
        assert_eq!(global_num(&game, "x"), 99.0, "execution resumes after end");
    }

    #[test]
    fn no_matching_clause_and_no_else_executes_nothing() {
        let script = "\
var x = 5
var taken = 0

# Chain
if x < 0
~ taken = 1
end
~ x = 99
";
        let mut game = game(script, "Chain");
        run_to_end(&mut game);
        assert_eq!(global_num(&game, "taken"), 0.0);
        assert_eq!(global_num(&game, "x"), 99.0, "cursor resumes after end");
    }

    #[test]
    fn else_body_runs_when_nothing_matches() {
        let script = "\
var x = 7
var taken = 0

# Chain
if x == 1
~ taken = 1
elseif x == 2
~ taken = 2
else
~ taken = 3
end
";
        let mut game = game(script, "Chain");
        run_to_end(&mut game);
        assert_eq!(global_num(&game, "taken"), 3.0);
    }

    #[test]
    fn nested_chains_are_stepped_over() {
        let script = "\
var x = 0
var taken = 0

# Chain
if x == 1
  if x == 1
  ~ taken = 1
  end
else
~ taken = 2
end
";
        let mut game = game(script, "Chain");
        run_to_end(&mut game);
        assert_eq!(global_num(&game, "taken"), 2.0);
    }
}

mod jump_and_return {
    use super::*;

    const SCRIPT: &str = "\
var x = 0

# A
>> B
~ x = x + 1

# B
~ x = x + 10
<
";

    #[test]
    fn call_pushes_one_frame_and_return_resumes_after_the_jump() {
        let mut game = game(SCRIPT, "A");
        game.start();
        game.tick(0.1);
        // The jump has executed: exactly one frame on the call stack.
        assert_eq!(game.threads()[0].call_stack.len(), 1);
        while !game.is_finished() {
            game.tick(0.1);
        }
        assert_eq!(global_num(&game, "x"), 11.0);
    }

    #[test]
    fn plain_jump_does_not_push_a_frame() {
        let script = "var x = 0\n\n# A\n> B\n~ x = 50\n\n# B\n~ x = x + 1\n";
        let mut game = game(script, "A");
        game.start();
        game.tick(0.1);
        assert_eq!(game.threads()[0].call_stack.len(), 0);
        while !game.is_finished() {
            game.tick(0.1);
        }
        // The command after the jump never runs.
        assert_eq!(global_num(&game, "x"), 1.0);
    }

    #[test]
    fn jump_to_a_missing_block_faults_only_that_thread() {
        let script = "# A\n> Nowhere\n";
        let mut game = game(script, "A");
        let messages = run_to_end(&mut game);
        let exited = messages
            .iter()
            .find_map(|message| match message {
                GameMessage::Exited { reason, error } => Some((*reason, error.clone())),
                _ => None,
            })
            .expect("game/exited");
        assert_eq!(exited.0, ExitReason::Error);
        let fault = exited.1.expect("fault payload");
        assert!(fault.message.contains("Nowhere"));
        assert_eq!(fault.location.line, 1);
    }
}

mod end_to_end {
    use super::*;

    fn command(parent: &str, index: usize, params: CommandParams) -> CommandData {
        CommandData {
            reference: CommandReference {
                type_id: params.type_id().to_string(),
                id: format!("{parent}.{index}"),
                parent_id: parent.to_string(),
                index,
            },
            source: SourceLocation::new(index, 0, 0),
            indent: 0,
            params,
        }
    }

    /// A program holding one thread with only `Jump{value:""}` then `end`
    /// yields started → finished, with no breakpoint hits in between.
    #[test]
    fn empty_jump_program_starts_and_finishes() {
        let mut program = SparkProgram::default();
        program.blocks.insert("main".to_string(), SparkBlock {
            name: "main".to_string(),
            commands: vec![
                command("main", 0, CommandParams::Jump {
                    value: String::new(),
                    return_when_finished: false,
                }),
                command("main", 1, CommandParams::Branch {
                    check: sparkdown::program::BranchCheck::End,
                    condition: String::new(),
                }),
            ],
            ..SparkBlock::default()
        });

        let mut game = Game::new(Arc::new(program));
        let messages = run_to_end(&mut game);
        let methods = methods(&messages);
        let started = methods.iter().position(|m| *m == "game/started").unwrap();
        let finished = methods.iter().position(|m| *m == "game/finished").unwrap();
        assert!(started < finished);
        assert!(!methods.contains(&"game/hitBreakpoint"));
    }

    #[test]
    fn compiled_script_emits_started_then_finished() {
        let mut game = game("# A\nwait 0\n", "A");
        let messages = run_to_end(&mut game);
        let methods = methods(&messages);
        assert_eq!(methods.first(), Some(&"game/started"));
        assert!(methods.contains(&"game/exitedThread"));
        assert!(methods.contains(&"game/finished"));
        assert_eq!(methods.last(), Some(&"game/exited"));
    }
}

mod suspension {
    use super::*;

    #[test]
    fn wait_consumes_tick_time_without_blocking() {
        let mut game = game("# A\nwait 1\n~ x = 1\n", "A");
        // `x` is undeclared on purpose: assignment creates a local, so the
        // global store stays clean; we only watch for thread completion.
        game.start();
        game.tick(0.1); // executes wait, suspends
        game.tick(0.5);
        assert!(!game.is_finished(), "0.6s elapsed of 1s");
        game.tick(0.6);
        for _ in 0..5 {
            game.tick(0.1);
        }
        assert!(game.is_finished());
    }

    #[test]
    fn display_waits_for_the_host_click() {
        let mut game = builder("var mood = \"calm\"\n# A\n@ Ada\nFeeling {mood}\n", "A").build();
        game.start();
        game.tick(0.1);
        let messages = game.drain_messages();
        let awaiting = messages
            .iter()
            .find_map(|message| match message {
                GameMessage::AwaitingInteraction {
                    kind,
                    character,
                    text,
                    ..
                } => Some((*kind, character.clone(), text.clone())),
                _ => None,
            })
            .expect("awaiting interaction");
        assert_eq!(awaiting.0, InteractionKind::Display);
        assert_eq!(awaiting.1.as_deref(), Some("Ada"));
        assert_eq!(awaiting.2.as_deref(), Some("Feeling calm"));

        // Unpaused until the host clicks.
        for _ in 0..10 {
            game.tick(1.0);
        }
        assert!(!game.is_finished());

        assert!(game.continue_thread(0));
        game.tick(0.1);
        let methods = methods(&game.drain_messages());
        assert!(methods.contains(&"game/clickedToContinue"));
        assert!(methods.contains(&"game/willSaveCheckpoint"));
    }

    #[test]
    fn auto_advance_resolves_the_pause_by_time() {
        let mut game = builder("# A\nHi\n", "A")
            .auto_advance(AutoAdvance {
                base_seconds: 1.0,
                seconds_per_grapheme: 0.0,
            })
            .build();
        game.start();
        game.tick(0.1);
        game.tick(0.5);
        assert!(!game.is_finished());
        game.tick(0.6);
        let methods = methods(&game.drain_messages());
        assert!(methods.contains(&"game/autoAdvancedToContinue"));
    }
}

mod choices {
    use super::*;

    const MENU: &str = "\
var x = 0

# Menu
+ Go left > Left
+ Go right > Right

# Left
~ x = 1

# Right
~ x = 2
";

    #[test]
    fn choosing_jumps_to_the_picked_target() {
        let mut game = game(MENU, "Menu");
        game.start();
        game.tick(0.1);
        let messages = game.drain_messages();
        let choices = messages
            .iter()
            .find_map(|message| match message {
                GameMessage::AwaitingInteraction { choices, kind, .. }
                    if *kind == InteractionKind::Choice =>
                {
                    Some(choices.clone())
                }
                _ => None,
            })
            .expect("choice interaction");
        assert_eq!(choices, ["Go left", "Go right"]);

        assert!(game.choose(0, 1));
        while !game.is_finished() {
            game.tick(0.1);
        }
        let messages = game.drain_messages();
        assert!(messages.iter().any(|message| matches!(
            message,
            GameMessage::ChosePathToContinue { index: 1, target, .. } if target == "Right"
        )));
        assert_eq!(global_num(&game, "x"), 2.0);
    }

    #[test]
    fn simulated_choices_fast_forward_deterministically() {
        let mut game = builder(MENU, "Menu").simulate_choices(0, [0]).build();
        let messages = run_to_end(&mut game);
        assert!(messages.iter().any(|message| matches!(
            message,
            GameMessage::ChosePathToContinue { index: 0, target, .. } if target == "Left"
        )));
        assert_eq!(global_num(&game, "x"), 1.0);
    }

    #[test]
    fn the_simulate_request_seeds_choices() {
        let mut game = game(MENU, "Menu");
        let request: GameRequest = serde_json::from_value(serde_json::json!({
            "id": 7,
            "method": "game/willSimulateChoices",
            "params": { "choices": { "0": [1] } }
        }))
        .expect("request parses");
        let response = game.handle_request(request);
        assert_eq!(response.id, 7);

        let messages = run_to_end(&mut game);
        assert!(messages.iter().any(|message| matches!(
            message,
            GameMessage::ChosePathToContinue { index: 1, .. }
        )));
        assert_eq!(global_num(&game, "x"), 2.0);
    }
}

mod breakpoints {
    use super::*;

    #[test]
    fn entering_a_flagged_line_pauses_and_reports() {
        let script = "var x = 0\n\n# A\n~ x = 1\n~ x = 2\n";
        let program = compile(script);
        // Break on `~ x = 2`.
        let line = program.blocks["A"].commands[1].source.line;
        let mut game = Game::builder(Arc::new(program))
            .entry("A")
            .breakpoints([line])
            .build();
        game.start();
        for _ in 0..5 {
            game.tick(0.1);
        }
        assert!(!game.is_finished());
        assert_eq!(game.threads()[0].state, ThreadState::AtBreakpoint);
        assert_eq!(global_num(&game, "x"), 1.0, "paused before executing");

        let methods = methods(&game.drain_messages());
        assert!(methods.contains(&"game/hitBreakpoint"));

        game.continue_execution();
        while !game.is_finished() {
            game.tick(0.1);
        }
        assert_eq!(global_num(&game, "x"), 2.0);
    }
}

mod lifecycle {
    use super::*;

    #[test]
    fn quit_unwinds_and_reports() {
        let mut game = game("# A\nwait 100\n", "A");
        game.start();
        game.tick(0.1);
        game.quit();
        assert_eq!(game.state(), GameState::Exited(ExitReason::Quit));
        let messages = game.drain_messages();
        assert!(messages.iter().any(|message| matches!(
            message,
            GameMessage::Exited { reason: ExitReason::Quit, .. }
        )));
        assert!(game.threads().iter().all(|thread| thread.call_stack.is_empty()));
    }

    #[test]
    fn restart_resets_variables_and_starts_over() {
        let script = "var x = 0\n\n# A\n~ x = 5\n";
        let mut game = game(script, "A");
        run_to_end(&mut game);
        assert_eq!(global_num(&game, "x"), 5.0);

        game.restart();
        assert_eq!(game.state(), GameState::Running);
        assert_eq!(global_num(&game, "x"), 0.0, "globals reset from the program");
        let methods = methods(&game.drain_messages());
        assert!(methods.contains(&"game/exited"));
        assert!(methods.contains(&"game/started"));
    }

    #[test]
    fn invalidate_swaps_the_program_atomically() {
        let mut game = game("var x = 0\n# A\n~ x = 1\n", "A");
        run_to_end(&mut game);

        let replacement = compile("var x = 0\n# A\n~ x = 42\n");
        game.invalidate(Arc::new(replacement));
        let methods = methods(&game.drain_messages());
        assert!(methods.contains(&"game/started"));
        while !game.is_finished() {
            game.tick(0.1);
        }
        assert_eq!(global_num(&game, "x"), 42.0);
    }

    #[test]
    fn sibling_threads_survive_a_faulted_thread() {
        let script = "var x = 0\n\n# A\n> Nowhere\n\n# B\n~ x = 1\n~ x = x + 1\n";
        let mut game = game(script, "A");
        game.start();
        game.spawn_thread("B").expect("spawn");
        while !game.is_finished() {
            game.tick(0.1);
        }
        // The faulted thread reported, the sibling ran to completion.
        assert_eq!(global_num(&game, "x"), 2.0);
        assert_eq!(game.state(), GameState::Exited(ExitReason::Error));
    }
}

mod protocol {
    use super::*;

    #[test]
    fn notifications_are_json_rpc_shaped() {
        let json = GameMessage::Exited {
            reason: ExitReason::Finished,
            error: None,
        }
        .into_json();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["method"], "game/exited");
        assert_eq!(json["params"]["reason"], "finished");
    }

    #[test]
    fn interaction_notification_carries_typed_params() {
        let json = GameMessage::AwaitingInteraction {
            thread: 3,
            kind: InteractionKind::Choice,
            character: None,
            text: None,
            choices: vec!["a".to_string()],
        }
        .into_json();
        assert_eq!(json["params"]["thread"], 3);
        assert_eq!(json["params"]["kind"], "choice");
        assert_eq!(json["params"]["choices"][0], "a");
    }

    #[test]
    fn messages_round_trip_through_serde() {
        let message = GameMessage::HitBreakpoint {
            thread: 1,
            location: SourceLocation::new(4, 10, 20),
        };
        let json = serde_json::to_string(&message).unwrap();
        let decoded: GameMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(message, decoded);
    }
}
