use indicatif::{ProgressBar, ProgressStyle};
use log::warn;

use crate::entities::ProgressSink;

/// Terminal load-percentage display
#[derive(Debug)]
pub struct TerminalProgress {
    progress_bar: ProgressBar,
}

impl TerminalProgress {
    pub fn new() -> Self {
        let progress_bar = ProgressBar::new(100);
        match ProgressStyle::default_bar().template("[{bar:40.cyan/blue}] {pos}% {msg}") {
            Ok(style) => progress_bar.set_style(style.progress_chars("█▓░")),
            Err(e) => warn!("Progress template rejected: {}", e),
        }
        progress_bar.set_message("loading frames");
        Self { progress_bar }
    }

    /// Leave the bar on screen at its current value (load ended short of 100%)
    pub fn abandon(&self, msg: &str) {
        self.progress_bar.abandon_with_message(msg.to_string());
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TerminalProgress {
    fn set_percent(&self, percent: u8) {
        self.progress_bar.set_position(percent as u64);
    }

    fn hide(&self) {
        self.progress_bar.finish_and_clear();
    }
}
