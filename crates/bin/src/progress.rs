//! Terminal progress for pipeline runs.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tessera::PipelineObserver;

/// Shows pipeline milestones on a spinner.
#[derive(Debug)]
pub(crate) struct SpinnerObserver {
    bar: ProgressBar,
}

impl SpinnerObserver {
    pub(crate) fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    pub(crate) fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub(crate) fn abandon(&self) {
        self.bar.abandon();
    }
}

impl PipelineObserver for SpinnerObserver {
    fn info(&self, message: &str) {
        tracing::debug!("{message}");
        self.bar.set_message(message.to_string());
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
        self.bar.println(format!("warning: {message}"));
    }
}
