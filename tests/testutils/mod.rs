use std::sync::Arc;

use sparkdown::{Game, GameBuilder, SparkCompiler};
use sparkdown::messages::GameMessage;
use sparkdown::program::SparkProgram;

#[allow(dead_code)]
pub fn compile(script: &str) -> SparkProgram {
    SparkCompiler::new().compile(script)
}

#[allow(dead_code)]
pub fn game(script: &str, entry: &str) -> Game {
    builder(script, entry).build()
}

#[allow(dead_code)]
pub fn builder(script: &str, entry: &str) -> GameBuilder {
    Game::builder(Arc::new(compile(script))).entry(entry)
}

/// Ticks until the game exits, bailing out if it never does.
#[allow(dead_code)]
pub fn run_to_end(game: &mut Game) -> Vec<GameMessage> {
    game.start();
    for _ in 0..10_000 {
        if game.is_finished() {
            break;
        }
        game.tick(0.1);
    }
    assert!(game.is_finished(), "game did not finish");
    game.drain_messages()
}

#[allow(dead_code)]
pub fn methods(messages: &[GameMessage]) -> Vec<&'static str> {
    messages.iter().map(|message| message.method()).collect()
}

#[allow(dead_code)]
pub fn global_num(game: &Game, name: &str) -> f64 {
    match game.scopes().globals().get(name) {
        Some(sparkdown::values::Value::Num(value)) => *value,
        other => panic!("expected num for '{name}', got {other:?}"),
    }
}
