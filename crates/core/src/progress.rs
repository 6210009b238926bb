//! Progress reporting side channel.

use serde::Serialize;
use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Error type a progress sink may return.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// A progress update: completion ratio in `[0, 1]` plus a stage label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub ratio: f64,
    pub message: String,
}

/// Receiver of progress events.
pub trait ProgressSink {
    fn report(&self, event: &ProgressEvent) -> Result<(), SinkError>;
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) -> Result<(), SinkError>,
{
    fn report(&self, event: &ProgressEvent) -> Result<(), SinkError> {
        self(event)
    }
}

/// Emitting side of the progress channel.
///
/// Ratios are clamped to `[0, 1]` and never move backwards. Whatever the
/// sink does (returning an error or panicking) never reaches the pipeline.
pub struct Progress<'a> {
    sink: Option<&'a dyn ProgressSink>,
    last: Cell<f64>,
}

impl<'a> Progress<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink: Some(sink),
            last: Cell::new(0.0),
        }
    }

    /// A progress channel that discards every event.
    pub fn none() -> Self {
        Self {
            sink: None,
            last: Cell::new(0.0),
        }
    }

    /// Last ratio emitted.
    pub fn ratio(&self) -> f64 {
        self.last.get()
    }

    pub fn emit(&self, ratio: f64, message: impl Into<String>) {
        let ratio = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
        let ratio = ratio.max(self.last.get());
        self.last.set(ratio);

        let Some(sink) = self.sink else {
            return;
        };
        let event = ProgressEvent {
            ratio,
            message: message.into(),
        };
        match catch_unwind(AssertUnwindSafe(|| sink.report(&event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::debug!("Progress sink failed (ignored): {}", e),
            Err(_) => log::debug!("Progress sink panicked (ignored)"),
        }
    }
}

impl Default for Progress<'_> {
    fn default() -> Self {
        Self::none()
    }
}
