//! Replay engine for recorded sessions.
//!
//! This module provides:
//! - `VirtualClock` - Deterministic time control for replay
//! - `EventStream` - The ordered events with a consumption cursor
//! - `DragInterpolator` - Intermediate samples between a drag and its release
//! - `InputFacade` - Synthetic touches and mouse buttons merged with real input
//! - `RecordingEngine` - The record/replay scheduler
//!
//! # Example
//!
//! ```ignore
//! use rewind_recorder::replay::RecordingEngine;
//! use rewind_recorder::RuntimeSettings;
//!
//! let mut engine = RecordingEngine::new(RuntimeSettings::default());
//! engine.begin_playback("automated_testing_data/login.json", &scene)?;
//!
//! while !engine.is_playback_completed() {
//!     let update = engine.tick(&scene, 1.0 / 60.0);
//!     for event in update.events {
//!         // Dispatch to the UI...
//!     }
//! }
//! ```

mod clock;
mod engine;
mod input;
mod interpolate;
mod signals;
mod stream;

pub use clock::VirtualClock;
pub use engine::{FrameUpdate, PointerSample, RecordingEngine, SyntheticEvent};
pub use input::{mouse_button_for_pointer, InputFacade, NullInput, PlatformInput, Touch, TouchPhase};
pub use interpolate::{DragInterpolator, DRAG_SAMPLE_INTERVAL, MAX_DRAG_SAMPLES};
pub use signals::{SignalHandle, SignalRequest};
pub use stream::{EventId, EventOrigin, EventStream, StreamEvent};
