use crate::display::Display;
use crate::session::{ChatSession, Outcome};

/// One line of user input, interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Continue,
    Rewrite,
    Help,
    Quit,
    Unknown(String),
}

/// Lines starting with `/` are commands; everything else is said to the bot.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(word) = line.strip_prefix('/') else {
        return Some(Command::Say(line.to_string()));
    };
    let command = match word.trim().to_ascii_lowercase().as_str() {
        "continue" | "c" => Command::Continue,
        "rewrite" | "r" => Command::Rewrite,
        "help" | "h" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    };
    Some(command)
}

/// Carry out a bot action and show the result.
/// Failures are logged and shown, never propagated: one bad turn must not end the chat.
pub async fn run_turn(session: &mut ChatSession, display: &Display, command: Command) {
    let spinner = display.start_spinning();
    let outcome = match command {
        Command::Say(text) => session.reply(&text).await,
        Command::Continue => session.continue_response().await,
        Command::Rewrite => session.rewrite_response().await,
        Command::Help | Command::Quit | Command::Unknown(_) => {
            spinner.stop().await;
            return;
        }
    };
    spinner.stop().await;

    match outcome {
        Ok(Outcome::Posted(text)) => display.show_reply(&text),
        Ok(Outcome::Edited(text)) => display.show_edited(&text),
        Ok(Outcome::Refused(reason)) => display.show_refusal(reason),
        Err(e) => {
            tracing::error!("turn: {e:#}");
            display.show_error(&e);
        }
    }
}
