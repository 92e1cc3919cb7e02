//! Rewind Recorder
//!
//! Record UI interactions to JSON and replay them deterministically for
//! automated testing.
//!
//! # Features
//!
//! - **Recording**: real pointer, key and text input captured as resolution
//!   independent references to named UI elements
//! - **Composite recordings**: segments referenced by filename, flattened
//!   into one stream with cycle detection
//! - **Replay**: a tick-driven scheduler with signal pauses, drag smoothing
//!   and synthetic input
//! - **Scripted steps**: clicks, drags and typing composed in test code and
//!   interleaved with a running playback
//! - **Reporting**: per-step logs, screenshots and pass/fail status
//!
//! # Example
//!
//! ```ignore
//! use rewind_recorder::prelude::*;
//!
//! let mut runner = TestRunner::new(TestConfig::default().with_data_dir("automated_testing_data"));
//! // Build the scene on runner.host_mut().tree_mut() ...
//! runner.play_recording("recordings/login.json")?;
//!
//! let report = runner.report("login");
//! assert!(report.passed());
//! ```

pub mod capture;
pub mod config;
pub mod error;
pub mod log;
pub mod persist;
pub mod replay;
pub mod report;
pub mod resolve;
pub mod screenshot;
pub mod testing;

pub use capture::{
    flatten_file, EventType, RecordingData, RecordingType, SegmentLoader, SegmentRef, TouchData,
    ValidationIssue, MAX_SEGMENT_DEPTH, PLAYBACK_COMPLETE_SIGNAL, SEGMENT_COMPLETE_SIGNAL,
};
pub use config::{PlaybackConfig, RecordingMode, RuntimeSettings, UnresolvedPolicy};
pub use error::{RecordingError, Result, ScheduleError};
pub use log::{LogCaptureLayer, LogEntry, LogLevel, PlaybackLog};
pub use persist::PersistentData;
pub use replay::{
    EventId, EventOrigin, EventStream, FrameUpdate, InputFacade, PlatformInput, PointerSample,
    RecordingEngine, SignalHandle, SyntheticEvent, VirtualClock,
};
pub use report::{StepRecord, StepStatus, TestReport};
pub use resolve::{ObjectResolver, Resolution, ResolveError, ResolveWarning};
pub use screenshot::{CapturedFrame, ScreenCapture, ScreenshotExporter};

// Re-export the scene surface
pub use rewind_core::{ElementId, Point, SceneGraph, Viewport};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::capture::{EventType, RecordingData, TouchData};
    pub use crate::config::{RecordingMode, RuntimeSettings};
    pub use crate::replay::{FrameUpdate, RecordingEngine, SyntheticEvent};
    pub use crate::report::TestReport;
    pub use crate::testing::{
        click, drag, emit_test_complete, send_keys, DragDestination, HeadlessHost, Sequence, Task,
        TaskState, TestConfig, TestRunner, WaitForSignal,
    };
    pub use rewind_core::{ElementSpec, Point, Rect, SceneGraph, SceneTree, Viewport};
}
