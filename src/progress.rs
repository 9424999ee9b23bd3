//! Progress reporting utilities

use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::{Duration, Instant};

/// Spinner shown on stderr while a command works through its steps
#[derive(Debug)]
pub struct ProgressReporter {
    spinner: Option<ProgressBar>,
    show_progress: bool,
    start_time: Instant,
}

impl ProgressReporter {
    /// Reporter that only draws when stderr is a terminal
    pub fn new() -> Self {
        Self::with_visibility(std::io::stderr().is_terminal())
    }

    fn with_visibility(show_progress: bool) -> Self {
        Self {
            spinner: None,
            show_progress,
            start_time: Instant::now(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.show_progress
    }

    /// Show `message` as the current step
    pub fn step(&mut self, message: &str) {
        log::debug!("{}", message);
        if !self.show_progress {
            return;
        }
        match &self.spinner {
            Some(pb) => pb.set_message(message.to_string()),
            None => self.spinner = Some(create_spinner(message)),
        }
    }

    /// Remove the spinner before other output is written
    pub fn clear(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Create a spinner progress bar
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Create a byte progress bar for file copies, hidden when `visible` is false
pub fn create_file_progress(total: u64, message: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes:>7}/{total_bytes:7} {msg}")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}
