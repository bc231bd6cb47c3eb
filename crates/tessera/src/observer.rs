//! Progress reporting for the pipeline.

use tracing::{info, warn};

/// Receives pipeline progress messages.
pub trait PipelineObserver {
    /// A progress milestone.
    fn info(&self, message: &str);

    /// Something the caller should know about that does not stop the run.
    fn warn(&self, message: &str);
}

/// Forwards messages to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn info(&self, message: &str) {
        info!("{message}");
    }

    fn warn(&self, message: &str) {
        warn!("{message}");
    }
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentObserver;

impl PipelineObserver for SilentObserver {
    fn info(&self, _message: &str) {}

    fn warn(&self, _message: &str) {}
}

impl<T: PipelineObserver + ?Sized> PipelineObserver for &T {
    fn info(&self, message: &str) {
        (**self).info(message);
    }

    fn warn(&self, message: &str) {
        (**self).warn(message);
    }
}
