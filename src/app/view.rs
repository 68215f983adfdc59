use crate::capture::{CaptureStatus, Poem};
use std::collections::VecDeque;
use std::io::Write;
use tracing::debug;

pub(super) const HISTORY_LIMIT: usize = 256;

/// Line-oriented terminal view of the app state.
///
/// Lines end in `\r\n` because the terminal is in raw mode while the
/// keyboard handler runs. Status lines are only printed when the label
/// changes.
pub struct StatusView {
    out: Box<dyn Write + Send>,
    last_label: Option<String>,
    history: VecDeque<String>,
}

impl StatusView {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out,
            last_label: None,
            history: VecDeque::with_capacity(HISTORY_LIMIT),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// View that keeps a history but prints nothing
    pub fn silent() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    pub fn show_status(&mut self, status: &CaptureStatus) {
        let label = status.label();
        if self.last_label.as_deref() == Some(label.as_str()) {
            return;
        }
        self.line(&format!("[status] {}", label));
        self.last_label = Some(label);
    }

    pub fn notice(&mut self, message: &str) {
        self.line(message);
    }

    pub fn show_poem(&mut self, poem: &Poem) {
        for line in poem.render().lines() {
            self.line(line);
        }
    }

    pub fn help(&mut self) {
        self.line(
            "Keys: c/space capture, n/p next/previous camera, 0-9 pick camera, s save poem, q quit",
        );
        self.line("Press m, type a model name and Enter to change the model (Esc cancels)");
    }

    /// Lines printed so far, oldest first
    pub fn history(&self) -> &VecDeque<String> {
        &self.history
    }

    fn line(&mut self, text: &str) {
        if self.history.len() >= HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(text.to_string());

        let written = write!(self.out, "{}\r\n", text).and_then(|_| self.out.flush());
        if let Err(e) = written {
            debug!("Status view write failed: {}", e);
        }
    }
}
