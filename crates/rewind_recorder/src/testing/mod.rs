//! Testing utilities for recorded UI tests.
//!
//! This module provides:
//! - `Task` - Cooperative test steps polled once per frame
//! - Scripted actions (`click`, `drag`, `send_keys`) interleaved with playback
//! - `HeadlessHost` - A windowless host over an in-memory scene
//! - `TestRunner` - Drives engine, host and test steps with a fixed frame step
//! - `RecordedTestRegistry` - Test name to recording file

pub mod driver;
pub mod headless;
pub mod registry;
pub mod runner;
pub mod task;

pub use driver::{
    click, click_and_hold, drag, emit_complete_step, emit_test_complete, send_keys, ActionTask,
    DragDestination, DriverState, ScriptedAction, TYPING_RATE, WAIT_AFTER_SCRIPTED_ACTION,
};
pub use headless::{HeadlessConfig, HeadlessHost};
pub use registry::RecordedTestRegistry;
pub use runner::{TestConfig, TestRunner};
pub use task::{Sequence, Task, TaskContext, TaskState, WaitForSignal, WaitSeconds, WaitUntil};
