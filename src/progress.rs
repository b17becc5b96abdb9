//! Keeps the "generating" spinner pinned while tracing output scrolls above
//! it instead of tearing it apart.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

static MULTI_PROGRESS: OnceLock<MultiProgress> = OnceLock::new();

fn multi_progress() -> &'static MultiProgress {
    MULTI_PROGRESS.get_or_init(|| {
        let mp = MultiProgress::new();
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        mp
    })
}

/// Busy indicator shown from submission until the job reaches a terminal
/// state. The caller clears it on every outcome, success or not.
pub fn generating_spinner() -> ProgressBar {
    let spinner = multi_progress().add(ProgressBar::new_spinner());
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("generating embeddings...");
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Print a line above any active spinner instead of tearing through it.
/// Used for notices that arrive asynchronously, outside a command's own
/// output.
pub fn println(line: &str) {
    let _ = multi_progress().println(line);
}

/// `MakeWriter` that routes tracing lines through the `MultiProgress` so log
/// output and the spinner never fight over the terminal.
#[derive(Default, Clone)]
pub struct LogWriterFactory;

pub struct LogWriter {
    pending: String,
}

impl LogWriter {
    fn emit(line: &str) {
        let _ = multi_progress().println(line.to_string());
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.push_str(&String::from_utf8_lossy(buf));

        while let Some(newline) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=newline).collect();
            Self::emit(line.trim_end_matches(['\n', '\r']));
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            Self::emit(rest.trim_end_matches(['\n', '\r']));
        }
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            pending: String::new(),
        }
    }
}
