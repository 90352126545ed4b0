use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ";
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// "Thinking" indicator that is cleared from the terminal when dropped.
///
/// The ticker thread stops and the line is wiped on every exit path,
/// so nothing printed afterwards gets interleaved with the animation.
pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars(TICK_CHARS);
        pb.set_style(style);
        pb.set_message(message.to_string());
        pb.enable_steady_tick(TICK_INTERVAL);
        Self { pb }
    }

    pub fn is_finished(&self) -> bool {
        self.pb.is_finished()
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.pb.finish_and_clear();
    }
}

/// Await a future with the spinner running, clearing it before returning
pub async fn with_spinner<F: Future>(message: &str, fut: F) -> F::Output {
    let _spinner = Spinner::start(message);
    fut.await
}
