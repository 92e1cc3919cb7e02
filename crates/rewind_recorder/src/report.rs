//! Test report model.
//!
//! Every action played back becomes a [`StepRecord`]. A [`TestReport`]
//! combines the steps with the playback log and derives pass/warning/fail per
//! step and per test. Rendering the report is left to external tooling; it
//! serializes to JSON.

use crate::error::{RecordingError, Result};
use crate::log::{LogEntry, LogLevel};
use rewind_core::Point;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Outcome of a step or a whole test.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum StepStatus {
    Passed,
    Warning,
    Failed,
}

impl StepStatus {
    fn from_entries<'a>(entries: impl IntoIterator<Item = &'a LogEntry>) -> Self {
        entries
            .into_iter()
            .map(|e| match e.level {
                LogLevel::Info => StepStatus::Passed,
                LogLevel::Warning => StepStatus::Warning,
                LogLevel::Error | LogLevel::Exception => StepStatus::Failed,
            })
            .max()
            .unwrap_or(StepStatus::Passed)
    }
}

/// One performed action.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub action_type: String,
    /// Object name, or the position for positional events.
    pub name: String,
    pub hierarchy: String,
    pub scene: String,
    /// Resolved screen position, once known.
    pub position: Option<Point>,
    /// Logical time the step was performed at.
    pub time: f64,
    pub screenshots: Vec<PathBuf>,
}

/// Steps and log entries of one test run.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub test_name: String,
    pub recording: Option<String>,
    pub steps: Vec<StepRecord>,
    pub logs: Vec<LogEntry>,
    pub status: StepStatus,
}

impl TestReport {
    pub fn new(
        test_name: impl Into<String>,
        recording: Option<String>,
        steps: Vec<StepRecord>,
        logs: Vec<LogEntry>,
    ) -> Self {
        let status = StepStatus::from_entries(&logs);
        Self {
            test_name: test_name.into(),
            recording,
            steps,
            logs,
            status,
        }
    }

    /// Status of the step at `index` from the entries logged during it.
    pub fn step_status(&self, index: usize) -> StepStatus {
        StepStatus::from_entries(self.logs.iter().filter(|e| e.step == Some(index)))
    }

    pub fn passed(&self) -> bool {
        self.status != StepStatus::Failed
    }

    pub fn failed_steps(&self) -> Vec<usize> {
        (0..self.steps.len())
            .filter(|i| self.step_status(*i) == StepStatus::Failed)
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| RecordingError::io(dir, e))?;
        }
        std::fs::write(path, self.to_json()?).map_err(|e| RecordingError::io(path, e))
    }
}
