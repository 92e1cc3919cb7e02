//! Test runner harness for recorded and scripted UI tests.
//!
//! Drives a [`RecordingEngine`] against a [`HeadlessHost`] with a fixed frame
//! step: each frame the engine ticks, the host applies the synthetic events,
//! and the test task is polled.

use super::driver::DriverState;
use super::headless::{HeadlessConfig, HeadlessHost};
use super::task::{Task, TaskContext, TaskState};
use crate::config::RuntimeSettings;
use crate::error::Result;
use crate::replay::{FrameUpdate, RecordingEngine};
use crate::report::TestReport;
use std::path::Path;

/// Configuration for the test runner.
#[derive(Clone, Debug)]
pub struct TestConfig {
    /// Headless host configuration.
    pub headless: HeadlessConfig,
    /// Engine settings.
    pub settings: RuntimeSettings,
    /// Logical seconds per frame.
    pub frame_step: f64,
    /// Timeout for each test in seconds of logical time.
    pub timeout_secs: f64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            headless: HeadlessConfig::default(),
            settings: RuntimeSettings::default(),
            frame_step: 1.0 / 60.0,
            timeout_secs: 300.0,
        }
    }
}

impl TestConfig {
    /// Create a minimal config for fast tests.
    pub fn fast() -> Self {
        Self {
            headless: HeadlessConfig::new(400, 300),
            frame_step: 0.05,
            timeout_secs: 60.0,
            ..Default::default()
        }
    }

    /// Set custom dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.headless.width = width;
        self.headless.height = height;
        self
    }

    /// Keep recording data under `dir`.
    pub fn with_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.settings.data_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_settings(mut self, settings: RuntimeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_frame_step(mut self, seconds: f64) -> Self {
        self.frame_step = seconds;
        self
    }

    /// Set test timeout.
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_secs = seconds;
        self
    }
}

/// Test runner for executing recorded and scripted tests headlessly.
pub struct TestRunner {
    config: TestConfig,
    host: HeadlessHost,
    engine: RecordingEngine,
    driver: DriverState,
}

impl TestRunner {
    /// Create a new test runner with the given configuration.
    pub fn new(config: TestConfig) -> Self {
        Self {
            host: HeadlessHost::new(config.headless.clone()),
            engine: RecordingEngine::new(config.settings.clone()),
            driver: DriverState::default(),
            config,
        }
    }

    /// Create a fast test runner for quick tests.
    pub fn fast() -> Self {
        Self::new(TestConfig::fast())
    }

    /// Get the configuration.
    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    pub fn host(&self) -> &HeadlessHost {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut HeadlessHost {
        &mut self.host
    }

    pub fn engine(&self) -> &RecordingEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut RecordingEngine {
        &mut self.engine
    }

    pub fn driver(&self) -> &DriverState {
        &self.driver
    }

    /// Run one frame.
    pub fn step(&mut self) -> FrameUpdate {
        let update = self.engine.tick(&self.host, self.config.frame_step);
        self.host.dispatch(&update);
        self.host.next_frame();
        update
    }

    /// Run frames until `done` holds or the timeout passes.
    ///
    /// Returns whether `done` held.
    pub fn run_until(&mut self, mut done: impl FnMut(&RecordingEngine, &HeadlessHost) -> bool) -> bool {
        let mut elapsed = 0.0;
        while !done(&self.engine, &self.host) {
            if elapsed > self.config.timeout_secs {
                return false;
            }
            self.step();
            elapsed += self.config.frame_step;
        }
        true
    }

    /// Play a recording file to completion.
    pub fn play_recording(&mut self, path: impl AsRef<Path>) -> Result<bool> {
        self.engine.begin_playback(path, &self.host)?;
        Ok(self.finish_playback())
    }

    /// Play the recording stored as the working copy in the data directory.
    pub fn play_persisted(&mut self) -> Result<bool> {
        self.engine = RecordingEngine::from_persisted_config(self.config.settings.clone(), &self.host)?;
        Ok(self.finish_playback())
    }

    fn finish_playback(&mut self) -> bool {
        let completed = self.run_until(|engine, _| engine.is_playback_completed());
        if !completed {
            self.engine.log().error(format!(
                "Playback timed out after {:.1}s at event {} of {}",
                self.config.timeout_secs,
                self.engine.cursor(),
                self.engine.stream().len()
            ));
        }
        completed
    }

    /// Poll `task` once per frame until it finishes or the timeout passes.
    pub fn run_task(&mut self, task: &mut dyn Task) -> TaskState {
        let dt = self.config.frame_step;
        let mut elapsed = 0.0;
        loop {
            let mut cx = TaskContext {
                engine: &mut self.engine,
                scene: &self.host,
                driver: &mut self.driver,
                dt,
            };
            let state = task.poll(&mut cx);
            if state.is_finished() {
                return state;
            }
            if elapsed > self.config.timeout_secs {
                let message = format!("Test timed out after {:.1}s", self.config.timeout_secs);
                self.engine.log().error(message.clone());
                return TaskState::Failed(message);
            }
            self.step();
            elapsed += dt;
        }
    }

    /// Run scripted steps on an empty playback stream.
    pub fn run_scripted(&mut self, task: &mut dyn Task) -> TaskState {
        self.driver.reset();
        self.engine.begin_scripted(&self.host);
        let state = self.run_task(task);
        if let TaskState::Failed(message) = &state {
            tracing::warn!("Scripted test failed: {}", message);
        }
        state
    }

    /// Report of everything played so far.
    pub fn report(&self, test_name: impl Into<String>) -> TestReport {
        self.engine.report(test_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::task::WaitSeconds;

    #[test]
    fn test_config_builders() {
        let config = TestConfig::default()
            .with_size(1920, 1080)
            .with_timeout(60.0)
            .with_frame_step(0.1);

        assert_eq!(config.headless.width, 1920);
        assert_eq!(config.headless.height, 1080);
        assert_eq!(config.timeout_secs, 60.0);
        assert_eq!(config.frame_step, 0.1);
    }

    #[test]
    fn test_runner_basic() {
        let mut runner = TestRunner::fast();
        assert_eq!(runner.host().width(), 400.0);
        assert_eq!(runner.host().frame_count(), 0);

        runner.step();
        assert_eq!(runner.host().frame_count(), 1);
    }

    #[test]
    fn test_run_task_times_out() {
        let mut runner = TestRunner::new(TestConfig::fast().with_timeout(1.0));
        let mut wait = WaitSeconds::new(10.0);
        let state = runner.run_task(&mut wait);
        assert!(matches!(state, TaskState::Failed(_)));
        assert!(runner.engine().log().has_errors());
    }
}
