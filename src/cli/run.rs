use eyre::{Result, eyre};
use std::io::Read;

use crate::cli::specials;
use crate::config::SessionConfig;
use crate::display;
use crate::inference;
use crate::session::ChatSession;

use super::repl::interact_forever;
use super::turn::{Command, run_turn};

/// If stdin is not a TTY, read it fully; `None` when it is a TTY or blank.
fn read_whole_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .map_err(|e| eyre!(e))?;
    Ok((!buf.trim().is_empty()).then_some(buf))
}

/// CLI entrypoint: decide between specials, the interactive chat, or a one-shot reply.
pub async fn run() -> Result<()> {
    crate::logging::setup_tracing();

    if specials::handle_specials_if_needed() {
        return Ok(());
    }

    let display = display::make_display();
    let config = SessionConfig::from_env()?;

    let loading = display.start_spinning();
    let backend = inference::make_backend(&config.backend).await;
    loading.stop().await;
    let backend = backend?;
    let mut session = ChatSession::new(config, backend);

    // Collect positional args into a single message. If none provided, drop into the chat.
    let prompt = std::env::args().skip(1).collect::<Vec<String>>().join(" ");

    let interactive = atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stdout);
    if prompt.trim().is_empty() && interactive {
        return interact_forever(&mut session, &display).await;
    }

    // One-shot: the arguments, or failing that the piped stdin, are the single user message.
    let message = if prompt.trim().is_empty() {
        read_whole_stdin()?.ok_or_else(|| eyre!("nothing to say: pass a message or pipe one in"))?
    } else {
        prompt
    };
    run_turn(&mut session, &display, Command::Say(message.trim().to_string())).await;
    Ok(())
}
