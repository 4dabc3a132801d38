mod testutils;

use paste::paste;
use sparkdown::SparkCompiler;
use sparkdown::program::{
    AssignOperator, BranchCheck, CommandParams, ContentItem, DiagnosticSeverity, LogSeverity,
    SparkProgram,
};
use sparkdown::values::Value;
use testutils::compile;

mod blocks {
    use super::*;

    const SCRIPT: &str = "\
var score = 0

# Act One
## Opening
Hello
## Closing
Goodbye
# Act Two
The end
";

    #[test]
    fn headings_build_a_nested_hierarchy() {
        let program = compile(SCRIPT);
        let keys: Vec<&String> = program.blocks.keys().collect();
        assert_eq!(
            keys,
            ["main", "Act One", "Act One.Opening", "Act One.Closing", "Act Two"]
        );

        let act_one = &program.blocks["Act One"];
        assert_eq!(act_one.level, 1);
        assert_eq!(act_one.parent.as_deref(), Some("main"));
        assert_eq!(act_one.children, ["Act One.Opening", "Act One.Closing"]);
        assert_eq!(act_one.path, ["Act One"]);

        let opening = &program.blocks["Act One.Opening"];
        assert_eq!(opening.level, 2);
        assert_eq!(opening.parent.as_deref(), Some("Act One"));
        assert_eq!(opening.path, ["Act One", "Opening"]);
        assert_eq!(opening.commands.len(), 1);
    }

    #[test]
    fn outline_lists_every_heading_in_order() {
        let program = compile(SCRIPT);
        let names: Vec<&String> = program.outline.iter().map(|item| &item.name).collect();
        assert_eq!(names, ["Act One", "Opening", "Closing", "Act Two"]);
        assert_eq!(program.outline[0].level, 1);
        assert_eq!(program.outline[1].level, 2);
    }

    #[test]
    fn duplicate_section_names_are_disambiguated_with_a_warning() {
        let program = compile("# Scene\n# Scene\n");
        assert_eq!(program.blocks.keys().count(), 3);
        assert!(program.blocks.contains_key("Scene"));
        assert!(program.blocks.contains_key("Scene (2)"));
        assert!(program
            .diagnostics
            .iter()
            .any(|d| d.severity == DiagnosticSeverity::Warning
                && d.message.contains("duplicate")));
    }
}

mod commands {
    use super::*;

    fn first_command(script: &str, block: &str) -> CommandParams {
        let program = compile(script);
        program.blocks[block].commands[0].params.clone()
    }

    #[test]
    fn jump_and_call() {
        assert_eq!(
            first_command("# A\n> Somewhere\n", "A"),
            CommandParams::Jump {
                value: "Somewhere".to_string(),
                return_when_finished: false,
            }
        );
        assert_eq!(
            first_command("# A\n>> Somewhere\n", "A"),
            CommandParams::Jump {
                value: "Somewhere".to_string(),
                return_when_finished: true,
            }
        );
    }

    #[test]
    fn return_command() {
        assert_eq!(first_command("# A\n<\n", "A"), CommandParams::Return);
    }

    #[test]
    fn assign_operators() {
        let program = compile("var x = 1\n# A\n~ x = 2\n~ x += 3\n~ x *= 4\n");
        let ops: Vec<AssignOperator> = program.blocks["A"]
            .commands
            .iter()
            .map(|command| match &command.params {
                CommandParams::Assign { operator, .. } => *operator,
                other => panic!("expected assign, got {other:?}"),
            })
            .collect();
        assert_eq!(
            ops,
            [
                AssignOperator::Assign,
                AssignOperator::Add,
                AssignOperator::Multiply
            ]
        );
    }

    #[test]
    fn wait_keeps_its_expression_source() {
        assert_eq!(
            first_command("# A\nwait 1.5 + 1\n", "A"),
            CommandParams::Wait {
                seconds: "1.5 + 1".to_string(),
            }
        );
    }

    #[test]
    fn log_severities_and_escapes() {
        let program = compile("# A\nlog \"info\"\nwarn \"careful\"\nerror \"boom \\\"quoted\\\"\"\n");
        let commands = &program.blocks["A"].commands;
        assert_eq!(
            commands[0].params,
            CommandParams::Log {
                severity: LogSeverity::Info,
                message: "info".to_string(),
            }
        );
        assert_eq!(
            commands[1].params,
            CommandParams::Log {
                severity: LogSeverity::Warning,
                message: "careful".to_string(),
            }
        );
        assert_eq!(
            commands[2].params,
            CommandParams::Log {
                severity: LogSeverity::Error,
                message: "boom \"quoted\"".to_string(),
            }
        );
    }

    #[test]
    fn branch_chain() {
        let program = compile("var x = 0\n# A\nif x > 1\nwait 1\nelseif x == 1\nwait 2\nelse\nwait 3\nend\n");
        let checks: Vec<Option<BranchCheck>> = program.blocks["A"]
            .commands
            .iter()
            .map(|command| match &command.params {
                CommandParams::Branch { check, .. } => Some(*check),
                _ => None,
            })
            .collect();
        assert_eq!(
            checks,
            [
                Some(BranchCheck::If),
                None,
                Some(BranchCheck::Elseif),
                None,
                Some(BranchCheck::Else),
                None,
                Some(BranchCheck::End),
            ]
        );
    }

    #[test]
    fn display_with_speaker_and_interpolation() {
        let program = compile("var mood = \"fine\"\n# A\n@ Ada\nI feel {mood} today\n");
        let command = &program.blocks["A"].commands[0];
        let CommandParams::Display { character, content } = &command.params else {
            panic!("expected display");
        };
        assert_eq!(character.as_deref(), Some("Ada"));
        assert_eq!(
            content.as_slice(),
            [
                ContentItem::Text {
                    text: "I feel ".to_string(),
                },
                ContentItem::Interpolation {
                    expression: "mood".to_string(),
                },
                ContentItem::Text {
                    text: " today".to_string(),
                },
            ]
        );
    }

    #[test]
    fn blank_line_ends_a_speaker_run() {
        let program = compile("# A\n@ Ada\nFirst\n\nSecond\n");
        let commands = &program.blocks["A"].commands;
        let CommandParams::Display { character, .. } = &commands[0].params else {
            panic!("expected display");
        };
        assert_eq!(character.as_deref(), Some("Ada"));
        let CommandParams::Display { character, .. } = &commands[1].params else {
            panic!("expected display");
        };
        assert_eq!(*character, None);
    }

    #[test]
    fn choices_carry_text_and_target() {
        let program = compile("# Menu\n+ Go north > North\n+ Stay put > Menu\n");
        let commands = &program.blocks["Menu"].commands;
        assert_eq!(
            commands[0].params,
            CommandParams::Choice {
                content: vec![ContentItem::Text {
                    text: "Go north".to_string(),
                }],
                target: "North".to_string(),
            }
        );
        assert_eq!(commands[0].reference.type_id, "ChoiceCommand");
        assert_eq!(commands[0].reference.id, "Menu.0");
        assert_eq!(commands[0].reference.parent_id, "Menu");
    }

    #[test]
    fn comments_compile_to_nothing() {
        let program = compile("# A\n// just a note\n/* multi\nline */\nwait 1\n");
        assert_eq!(program.blocks["A"].commands.len(), 1);
        assert!(matches!(
            program.blocks["A"].commands[0].params,
            CommandParams::Wait { .. }
        ));
    }

    #[test]
    fn source_spans_point_at_the_line() {
        let script = "# A\nwait 1\n";
        let program = compile(script);
        let source = &program.blocks["A"].commands[0].source;
        assert_eq!(source.line, 1);
        assert_eq!(&script[source.from..source.to], "wait 1");
    }
}

mod declarations {
    use super::*;

    #[test]
    fn variables_fold_their_initializers() {
        let program = compile("var base = 2\nvar doubled = base * 2\nvar name = \"Ada\"\nvar ok = true\n");
        assert_eq!(program.variables["base"].value, Value::Num(2.0));
        assert_eq!(program.variables["doubled"].value, Value::Num(4.0));
        assert_eq!(program.variables["doubled"].type_name, "num");
        assert_eq!(program.variables["name"].value, Value::str("Ada"));
        assert_eq!(program.variables["name"].type_name, "str");
        assert_eq!(program.variables["ok"].value, Value::Bool(true));
    }

    #[test]
    fn metadata_front_matter() {
        let program = compile("title: My Story\nauthor: Ada\n\n# One\ntitle: not metadata\n");
        assert_eq!(program.metadata["title"], "My Story");
        assert_eq!(program.metadata["author"], "Ada");
        assert_eq!(program.metadata.len(), 2);
        // After the first heading the same shape is dialogue.
        assert_eq!(program.blocks["One"].commands.len(), 1);
    }

    #[test]
    fn entities_with_base_and_fields() {
        let program = compile("entity npc\n  color: #aabbcc\n  voice: low\nentity ghost < npc\n  color: #ffffff\n");
        let npc = &program.entities["npc"];
        assert_eq!(npc.base, None);
        assert_eq!(npc.fields["color"], "#aabbcc");
        assert_eq!(npc.fields["voice"], "low");

        let ghost = &program.entities["ghost"];
        assert_eq!(ghost.base.as_deref(), Some("npc"));
        assert_eq!(
            ghost.field("voice", &program.entities),
            Some("low"),
            "fields resolve through the base chain"
        );
        assert_eq!(ghost.field("color", &program.entities), Some("#ffffff"));
    }

    #[test]
    fn color_ranges_are_collected() {
        let program = compile("entity npc\n  color: #aabbcc\n");
        assert_eq!(program.color_ranges.len(), 1);
        assert_eq!(program.color_ranges[0].color, "#aabbcc");
    }
}

mod diagnostics {
    use super::*;

    fn error_messages(script: &str) -> Vec<String> {
        compile(script)
            .diagnostics
            .into_iter()
            .filter(|d| d.severity == DiagnosticSeverity::Error)
            .map(|d| d.message)
            .collect()
    }

    #[test]
    fn undeclared_variable_in_condition() {
        let messages = error_messages("# A\nif ghost > 1\nend\n");
        assert!(messages.iter().any(|m| m.contains("'ghost'")), "{messages:?}");
    }

    #[test]
    fn assign_to_undeclared_variable() {
        let messages = error_messages("# A\n~ ghost = 1\n");
        assert!(messages.iter().any(|m| m.contains("'ghost'")));
    }

    #[test]
    fn unbalanced_branches() {
        assert!(error_messages("# A\nif 1 > 0\n").iter().any(|m| m.contains("'end'")));
        assert!(error_messages("# A\nend\n").iter().any(|m| m.contains("'if'")));
        assert!(error_messages("# A\nelseif 1 > 0\nend\n")
            .iter()
            .any(|m| m.contains("'if'")));
    }

    #[test]
    fn duplicate_variable_declaration() {
        let messages = error_messages("var x = 1\nvar x = 2\n");
        assert!(messages.iter().any(|m| m.contains("already declared")));
    }

    #[test]
    fn malformed_expression_never_aborts_the_rest() {
        let program = compile("var x = 1 +\nvar y = 2\n# A\nwait 1\n");
        assert!(program.has_errors());
        // The bad declaration still lands with a fallback, and everything
        // after it compiles normally.
        assert_eq!(program.variables["x"].value, Value::Null);
        assert_eq!(program.variables["y"].value, Value::Num(2.0));
        assert_eq!(program.blocks["A"].commands.len(), 1);
    }

    #[test]
    fn diagnostics_carry_spans() {
        let script = "# A\nif nope > 1\nend\n";
        let program = compile(script);
        let diagnostic = program
            .diagnostics
            .iter()
            .find(|d| d.message.contains("'nope'"))
            .expect("diagnostic");
        assert_eq!(diagnostic.source.line, 1);
    }
}

mod reserved_words {
    use super::*;

    macro_rules! reserved_word_must_be_rejected {
        ($($word:ident),*$(,)?) => {
            paste! {
                $(#[test]
                fn [<$word _cannot_be_declared>]() {
                    let program = compile(concat!("var ", stringify!($word), " = 1\n"));
                    assert!(
                        program.has_errors(),
                        "declaring '{}' must be an error",
                        stringify!($word)
                    );
                    assert!(!program.variables.contains_key(stringify!($word)));
                })*
            }
        };
    }

    reserved_word_must_be_rejected!(elseif, end, entity, wait, log, warn, error, and, or, not);

    #[test]
    fn reserved_word_with_a_suffix_is_allowed() {
        let program = compile("var endgame = 1\n");
        assert!(!program.has_errors());
        assert!(program.variables.contains_key("endgame"));
    }
}

mod serialization {
    use super::*;

    #[test]
    fn program_round_trips_through_json() {
        let script = "title: Demo\nvar x = 1\n\n# One\n@ Ada\nHello {x}\nif x > 0\n~ x -= 1\nend\n> One\n";
        let program = compile(script);
        let json = serde_json::to_string(&program).unwrap();
        let decoded: SparkProgram = serde_json::from_str(&json).unwrap();
        assert_eq!(program, decoded);
        // Block order survives, so arena indices stay stable.
        let before: Vec<&String> = program.blocks.keys().collect();
        let after: Vec<&String> = decoded.blocks.keys().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn command_params_are_tagged_by_type() {
        let program = compile("# A\n> B\n");
        let json = serde_json::to_value(&program.blocks["A"].commands[0]).unwrap();
        assert_eq!(json["params"]["type"], "jump");
        assert_eq!(json["reference"]["type_id"], "JumpCommand");
    }
}

mod language_server {
    use super::*;
    use sparkdown::grammar::TextEdit;

    #[test]
    fn compile_parsed_reuses_an_incremental_tree() {
        let compiler = SparkCompiler::new();
        let before = "# One\nHello\n";
        let old = compiler.parse(before);

        let after = "# One\nHello!\n";
        let edit = TextEdit {
            from: 11,
            to: 11,
            insert: "!".to_string(),
        };
        let parse = compiler.reparse(&old, &edit, after);
        let program = compiler.compile_parsed(after, &parse);
        let CommandParams::Display { content, .. } = &program.blocks["One"].commands[0].params
        else {
            panic!("expected display");
        };
        assert_eq!(
            content.as_slice(),
            [ContentItem::Text {
                text: "Hello!".to_string(),
            }]
        );
    }

    #[test]
    fn file_name_travels_into_sources() {
        let compiler = SparkCompiler::new().with_file("story.sd");
        let program = compiler.compile("# A\nwait 1\n");
        assert_eq!(program.file.as_deref(), Some("story.sd"));
        assert_eq!(
            program.blocks["A"].commands[0].source.file.as_deref(),
            Some("story.sd")
        );
    }
}
