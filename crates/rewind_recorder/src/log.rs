//! Playback log collection.
//!
//! The engine never aborts playback for recoverable problems. Instead every
//! warning and error is collected here, tagged with the report step that was
//! running, and callers decide whether the run failed.

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Target used for entries the engine writes through `tracing`.
pub const PLAYBACK_TARGET: &str = "rewind_recorder::playback";

/// Severity of a log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Exception,
}

impl LogLevel {
    /// Errors and exceptions fail a test.
    pub fn is_failure(self) -> bool {
        matches!(self, LogLevel::Error | LogLevel::Exception)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Exception => "exception",
        };
        f.write_str(name)
    }
}

/// One collected log message.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Report step that was running, if any.
    pub step: Option<usize>,
}

#[derive(Debug, Default)]
struct LogState {
    entries: Vec<LogEntry>,
    step: Option<usize>,
}

/// Shared, cloneable log collector.
#[derive(Clone, Debug, Default)]
pub struct PlaybackLog {
    state: Arc<Mutex<LogState>>,
}

impl PlaybackLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute subsequent entries to a report step.
    pub fn set_step(&self, step: Option<usize>) {
        self.state.lock().step = step;
    }

    pub fn push(&self, level: LogLevel, message: impl Into<String>) {
        let mut state = self.state.lock();
        let step = state.step;
        state.entries.push(LogEntry {
            level,
            message: message.into(),
            step,
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(target: PLAYBACK_TARGET, "{}", message);
        self.push(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(target: PLAYBACK_TARGET, "{}", message);
        self.push(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(target: PLAYBACK_TARGET, "{}", message);
        self.push(LogLevel::Error, message);
    }

    pub fn exception(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(target: PLAYBACK_TARGET, exception = true, "{}", message);
        self.push(LogLevel::Exception, message);
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.state.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.state
            .lock()
            .entries
            .iter()
            .any(|e| e.level.is_failure())
    }

    pub fn last_error(&self) -> Option<LogEntry> {
        self.state
            .lock()
            .entries
            .iter()
            .rev()
            .find(|e| e.level.is_failure())
            .cloned()
    }

    /// Entries logged while `step` was running.
    pub fn entries_for_step(&self, step: usize) -> Vec<LogEntry> {
        self.state
            .lock()
            .entries
            .iter()
            .filter(|e| e.step == Some(step))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.step = None;
    }

    /// A `tracing` layer that feeds application warnings and errors into this log.
    pub fn capture_layer(&self) -> LogCaptureLayer {
        LogCaptureLayer { log: self.clone() }
    }
}

/// Collects warnings and errors emitted through `tracing` by the application.
///
/// Events from this crate are skipped since the engine logs them directly.
pub struct LogCaptureLayer {
    log: PlaybackLog,
}

impl<S: Subscriber> Layer<S> for LogCaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target().starts_with(env!("CARGO_CRATE_NAME")) {
            return;
        }
        let level = match *metadata.level() {
            Level::ERROR => LogLevel::Error,
            Level::WARN => LogLevel::Warning,
            _ => return,
        };
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.log.push(level, visitor.message);
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else if self.message.is_empty() {
            self.message = format!("{}={:?}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_step_attribution() {
        let log = PlaybackLog::new();
        log.info("starting");
        log.set_step(Some(2));
        log.warn("drift");
        log.error("off screen");

        assert_eq!(log.len(), 3);
        assert_eq!(log.entries()[0].step, None);
        assert_eq!(log.entries_for_step(2).len(), 2);
        assert!(log.has_errors());
        assert_eq!(log.last_error().unwrap().message, "off screen");
    }

    #[test]
    fn test_warnings_are_not_failures() {
        let log = PlaybackLog::new();
        log.warn("hierarchy changed");
        assert!(!log.has_errors());
        log.exception("boom");
        assert!(log.has_errors());
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_capture_layer() {
        let log = PlaybackLog::new();
        let subscriber = tracing_subscriber::registry().with(log.capture_layer());
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "my_app", "texture missing");
            tracing::info!(target: "my_app", "ignored");
            tracing::error!(target: "my_app::ui", "button {} broke", 3);
            tracing::error!(target: PLAYBACK_TARGET, "engine entry");
        });

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, LogLevel::Warning);
        assert_eq!(entries[0].message, "texture missing");
        assert_eq!(entries[1].message, "button 3 broke");
    }
}
