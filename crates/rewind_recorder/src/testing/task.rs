//! Cooperative test tasks.
//!
//! A [`Task`] is polled once per frame by the runner and reports whether it
//! is still waiting, finished, or failed. Waits are plain "not yet" returns;
//! nothing blocks the frame.

use super::driver::DriverState;
use crate::replay::RecordingEngine;
use rewind_core::SceneGraph;

/// Result of polling a task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Not finished; poll again next frame.
    Pending,
    Done,
    /// Finished unsuccessfully.
    Failed(String),
}

impl TaskState {
    pub fn is_finished(&self) -> bool {
        !matches!(self, TaskState::Pending)
    }
}

/// What a task can see and touch while it is polled.
pub struct TaskContext<'a> {
    pub engine: &'a mut RecordingEngine,
    pub scene: &'a dyn SceneGraph,
    pub driver: &'a mut DriverState,
    /// Seconds since the previous poll.
    pub dt: f64,
}

/// A unit of cooperative test work.
pub trait Task {
    fn poll(&mut self, cx: &mut TaskContext<'_>) -> TaskState;
}

impl<F> Task for F
where
    F: FnMut(&mut TaskContext<'_>) -> TaskState,
{
    fn poll(&mut self, cx: &mut TaskContext<'_>) -> TaskState {
        self(cx)
    }
}

/// Runs tasks one after another, stopping at the first failure.
#[derive(Default)]
pub struct Sequence {
    tasks: Vec<Box<dyn Task>>,
    current: usize,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, task: impl Task + 'static) -> Self {
        self.tasks.push(Box::new(task));
        self
    }

    pub fn push(&mut self, task: Box<dyn Task>) {
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Task for Sequence {
    fn poll(&mut self, cx: &mut TaskContext<'_>) -> TaskState {
        while let Some(task) = self.tasks.get_mut(self.current) {
            match task.poll(cx) {
                TaskState::Pending => return TaskState::Pending,
                TaskState::Done => self.current += 1,
                failed @ TaskState::Failed(_) => return failed,
            }
        }
        TaskState::Done
    }
}

/// Waits a fixed amount of logical time.
#[derive(Clone, Debug)]
pub struct WaitSeconds {
    remaining: f64,
    started: bool,
}

impl WaitSeconds {
    pub fn new(seconds: f64) -> Self {
        Self {
            remaining: seconds.max(0.0),
            started: false,
        }
    }
}

impl Task for WaitSeconds {
    fn poll(&mut self, cx: &mut TaskContext<'_>) -> TaskState {
        // The poll that starts the wait does not count the previous frame.
        if self.started {
            self.remaining -= cx.dt;
        }
        self.started = true;
        if self.remaining > 0.0 {
            TaskState::Pending
        } else {
            TaskState::Done
        }
    }
}

/// Waits until a predicate holds, logging an error if it never does.
pub struct WaitUntil<P> {
    predicate: P,
    description: String,
    timeout: f64,
    waited: f64,
}

impl<P> WaitUntil<P>
where
    P: FnMut(&TaskContext<'_>) -> bool,
{
    pub fn new(description: impl Into<String>, timeout: f64, predicate: P) -> Self {
        Self {
            predicate,
            description: description.into(),
            timeout,
            waited: 0.0,
        }
    }
}

impl<P> Task for WaitUntil<P>
where
    P: FnMut(&TaskContext<'_>) -> bool,
{
    fn poll(&mut self, cx: &mut TaskContext<'_>) -> TaskState {
        if (self.predicate)(&*cx) {
            return TaskState::Done;
        }
        self.waited += cx.dt;
        if self.waited > self.timeout {
            cx.engine.log().error(format!(
                "Timed out after {:.1}s waiting for {}",
                self.timeout, self.description
            ));
            return TaskState::Done;
        }
        TaskState::Pending
    }
}

/// Waits until playback has emitted a signal.
#[derive(Clone, Debug)]
pub struct WaitForSignal {
    signal: String,
    timeout: Option<f64>,
    waited: f64,
}

impl WaitForSignal {
    pub fn new(signal: impl Into<String>) -> Self {
        Self {
            signal: signal.into(),
            timeout: None,
            waited: 0.0,
        }
    }

    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout = Some(seconds);
        self
    }
}

impl Task for WaitForSignal {
    fn poll(&mut self, cx: &mut TaskContext<'_>) -> TaskState {
        if cx.engine.has_emitted(&self.signal) {
            return TaskState::Done;
        }
        self.waited += cx.dt;
        let timeout = self
            .timeout
            .unwrap_or(cx.engine.settings().dynamic_wait_timeout_secs);
        if self.waited > timeout {
            cx.engine.log().error(format!(
                "Timed out after {:.1}s waiting for signal {}",
                timeout, self.signal
            ));
            return TaskState::Done;
        }
        TaskState::Pending
    }
}
