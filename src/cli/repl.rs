use eyre::{Result, eyre};

use crate::display::Display;
use crate::session::ChatSession;

use super::turn::{Command, parse_command, run_turn};

pub async fn interact_forever(session: &mut ChatSession, display: &Display) -> Result<()> {
    use rustyline::error::ReadlineError::{Eof, Interrupted};

    let mut rl = rustyline::DefaultEditor::new().map_err(|e| eyre!(e))?;
    loop {
        let line = match rl.readline(">> ") {
            Ok(line) => line,
            Err(Eof) | Err(Interrupted) => break,
            Err(e) => return Err(eyre!(e)),
        };
        let Some(command) = parse_command(&line) else {
            continue;
        };
        rl.add_history_entry(line.trim()).ok();

        match command {
            Command::Quit => break,
            Command::Help => display.show_help(),
            Command::Unknown(what) => {
                display.show_refusal(&format!("unknown command: {what} (try /help)"))
            }
            other => run_turn(session, display, other).await,
        }
    }
    Ok(())
}
