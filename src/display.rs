mod spinner;

pub use spinner::Spinner;

use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};

#[derive(Clone, Copy)]
struct Caps {
    /// We can emit ANSI color/UI sequences to stderr.
    colorful: bool,
}

/// Terminal output used by the CLI. Bot text goes to stdout, everything else to stderr.
pub struct Display {
    caps: Caps,
}

impl Display {
    /// Return a guard that shows the "typing" indicator until stopped.
    pub fn start_spinning(&self) -> Spinner {
        if self.caps.colorful {
            Spinner::start()
        } else {
            Spinner::start_empty()
        }
    }

    /// Print a newly posted bot message.
    pub fn show_reply(&self, text: &str) {
        // `stdout` should be free from control sequences so it can be piped.
        println!("{text}");
    }

    /// Print a bot message that replaces the previous one.
    pub fn show_edited(&self, text: &str) {
        if self.caps.colorful {
            let _ = crossterm::execute!(
                std::io::stderr(),
                SetForegroundColor(Color::DarkGrey),
                Print("(rewritten)"),
                ResetColor,
                Print("\n"),
            );
        } else {
            eprintln!("(rewritten)");
        }
        println!("{text}");
    }

    /// Explain why an action was not carried out.
    pub fn show_refusal(&self, reason: &str) {
        if self.caps.colorful {
            let _ = crossterm::execute!(
                std::io::stderr(),
                SetForegroundColor(Color::DarkYellow),
                Print(reason),
                ResetColor,
                Print("\n"),
            );
        } else {
            eprintln!("{reason}");
        }
    }

    /// Report a failed turn without ending the session.
    pub fn show_error(&self, error: &eyre::Report) {
        if self.caps.colorful {
            let _ = crossterm::execute!(
                std::io::stderr(),
                SetForegroundColor(Color::Red),
                SetAttribute(Attribute::Bold),
                Print("Error: "),
                SetAttribute(Attribute::Reset),
                SetForegroundColor(Color::Red),
                Print(error),
                ResetColor,
                Print("\n"),
            );
        } else {
            eprintln!("error: {error}");
        }
    }

    /// List the chat commands.
    pub fn show_help(&self) {
        eprintln!(
            "{}",
            concat!(
                "  /continue  continue the last response (once)\n",
                "  /rewrite   regenerate the last response in place\n",
                "  /help      show this list\n",
                "  /quit      leave the chat"
            )
        );
    }
}

/// Prefer colorful output when stderr is a TTY; fall back to plain printing.
pub fn make_display() -> Display {
    let caps = Caps {
        colorful: atty::is(atty::Stream::Stderr),
    };
    Display { caps }
}
