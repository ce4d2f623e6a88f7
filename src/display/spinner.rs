//! "typing…" indicator shown while the model works.

use crossterm::cursor;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};

async fn display_spinner() {
    use std::time::Duration;
    let frames = ["·  ", "·· ", "···", " ··", "  ·", "   "];
    let mut index: usize = 0;

    let _ = crossterm::execute!(std::io::stderr(), cursor::Hide);
    loop {
        let _ = crossterm::execute!(
            std::io::stderr(),
            Print("\r"),
            SetForegroundColor(Color::DarkGrey),
            Print("typing "),
            Print(frames[index]),
            ResetColor
        );
        index = (index + 1) % frames.len();

        tokio::time::sleep(Duration::from_millis(180)).await;
    }
}

/// Cancel the animation and wait until it has stopped drawing, then wipe its line.
/// Returns whether the task was still running when asked to stop.
async fn halt(task: tokio::task::JoinHandle<()>) -> bool {
    task.abort();
    let cancelled = task.await.is_err_and(|e| e.is_cancelled());
    let _ = crossterm::execute!(
        std::io::stderr(),
        Clear(ClearType::CurrentLine),
        Print("\r"),
        ResetColor,
        cursor::Show,
    );
    cancelled
}

/// Guard to keep the indicator active while in scope.
pub struct Spinner {
    task: Option<tokio::task::JoinHandle<()>>,
}

impl Spinner {
    /// A spinner that shows nothing, for non-terminal output.
    pub(super) fn start_empty() -> Self {
        Spinner { task: None }
    }

    /// Immediately start a task that will animate until stopped.
    pub(super) fn start() -> Self {
        Spinner {
            task: Some(tokio::spawn(display_spinner())),
        }
    }

    /// Stop animating; the line is clean once this returns.
    pub async fn stop(mut self) {
        if let Some(task) = self.task.take() {
            halt(task).await;
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            tokio::spawn(halt(task));
        }
    }
}
