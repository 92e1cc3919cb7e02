//! Recorded event model.
//!
//! A recording is a JSON document holding an ordered list of [`TouchData`]
//! events plus metadata. Composite recordings additionally reference child
//! segment files that are flattened into one stream before playback.
//!
//! Positions are stored normalized to the viewport so a recording replays at
//! any resolution. Field names are camelCase and every field is written even
//! when it holds its default value.

mod loader;

pub use loader::{flatten_file, SegmentLoader, MAX_SEGMENT_DEPTH};

use crate::error::{RecordingError, Result};
use rewind_core::{Point, Viewport, UNTAGGED};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Signal emitted by the final event of a finished recording.
pub const PLAYBACK_COMPLETE_SIGNAL: &str = "playbackComplete";

/// Signal emitted by the final event of a recording segment.
pub const SEGMENT_COMPLETE_SIGNAL: &str = "segmentComplete";

/// Kind of a recorded event.
///
/// Written as lowercase strings. The integer forms used by older recordings
/// are accepted when reading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "EventTypeRepr")]
pub enum EventType {
    #[default]
    None,
    Press,
    Release,
    Move,
    Drag,
    Input,
    KeyDown,
    KeyUp,
}

impl EventType {
    /// Whether the event is a pointer event that targets a screen position.
    pub fn is_pointer(self) -> bool {
        matches!(
            self,
            EventType::Press | EventType::Release | EventType::Move | EventType::Drag
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::None => "none",
            EventType::Press => "press",
            EventType::Release => "release",
            EventType::Move => "move",
            EventType::Drag => "drag",
            EventType::Input => "input",
            EventType::KeyDown => "keydown",
            EventType::KeyUp => "keyup",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EventTypeRepr {
    Index(u64),
    Name(String),
}

impl TryFrom<EventTypeRepr> for EventType {
    type Error = String;

    fn try_from(repr: EventTypeRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            EventTypeRepr::Index(index) => match index {
                0 => Ok(EventType::None),
                1 => Ok(EventType::Press),
                2 => Ok(EventType::Release),
                3 => Ok(EventType::Move),
                4 => Ok(EventType::Drag),
                5 => Ok(EventType::Input),
                6 => Ok(EventType::KeyDown),
                7 => Ok(EventType::KeyUp),
                other => Err(format!("unknown event type index {other}")),
            },
            EventTypeRepr::Name(name) => match name.to_ascii_lowercase().as_str() {
                "none" => Ok(EventType::None),
                "press" => Ok(EventType::Press),
                "release" => Ok(EventType::Release),
                "move" => Ok(EventType::Move),
                "drag" => Ok(EventType::Drag),
                "input" => Ok(EventType::Input),
                "keydown" => Ok(EventType::KeyDown),
                "keyup" => Ok(EventType::KeyUp),
                _ => Err(format!("unknown event type {name:?}")),
            },
        }
    }
}

/// One discrete recorded input event.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TouchData {
    /// Finger id, or a negative mouse pointer id (-1 left, -2 right, -3 middle).
    pub pointer_id: i32,
    pub event_type: EventType,
    /// Seconds since the previous event in the same stream.
    pub time_delta: f64,
    /// Normalized screen position.
    pub position: Point,
    /// Targets the raw position rather than a named object.
    pub positional: bool,
    pub scene: String,
    pub wait_signal: String,
    pub emit_signal: String,
    pub object_name: String,
    pub object_tag: String,
    /// `/`-joined ancestor names from the root to the parent.
    pub object_hierarchy: String,
    /// Click point relative to the target's rect center, in rect sizes.
    pub object_offset: Point,
    pub input_text: String,
    pub input_duration: f64,
    pub key_code: String,
}

impl TouchData {
    /// A `none` event that only paces the stream and carries signals.
    pub fn marker(time_delta: f64, scene: impl Into<String>) -> Self {
        Self {
            pointer_id: -1,
            event_type: EventType::None,
            time_delta,
            scene: scene.into(),
            ..Default::default()
        }
    }

    /// A positional pointer event.
    pub fn pointer(event_type: EventType, pointer_id: i32, position: Point, time_delta: f64) -> Self {
        Self {
            pointer_id,
            event_type,
            time_delta,
            position,
            positional: true,
            ..Default::default()
        }
    }

    pub fn with_emit_signal(mut self, signal: impl Into<String>) -> Self {
        self.emit_signal = signal.into();
        self
    }

    pub fn with_wait_signal(mut self, signal: impl Into<String>) -> Self {
        self.wait_signal = signal.into();
        self
    }

    /// Target a named object instead of a raw position.
    pub fn with_object(
        mut self,
        name: impl Into<String>,
        tag: impl Into<String>,
        hierarchy: impl Into<String>,
    ) -> Self {
        self.object_name = name.into();
        self.object_tag = tag.into();
        self.object_hierarchy = hierarchy.into();
        self.positional = false;
        self
    }

    /// Whether the event references a live object.
    pub fn has_object(&self) -> bool {
        !self.object_name.is_empty() || self.has_tag()
    }

    /// Whether a non-default tag was recorded.
    pub fn has_tag(&self) -> bool {
        !self.object_tag.is_empty() && self.object_tag != UNTAGGED
    }

    /// Recorded position in pixels of the given viewport.
    pub fn screen_position(&self, viewport: Viewport) -> Point {
        viewport.to_pixels(self.position)
    }

    pub fn emits(&self, signal: &str) -> bool {
        self.emit_signal == signal
    }

    /// Short human-readable description for logs and reports.
    pub fn describe(&self) -> String {
        if self.has_object() && !self.positional {
            if self.object_hierarchy.is_empty() {
                format!("{} {}", self.event_type, self.object_name)
            } else {
                format!(
                    "{} {}/{}",
                    self.event_type, self.object_hierarchy, self.object_name
                )
            }
        } else {
            format!(
                "{} at ({:.3}, {:.3})",
                self.event_type, self.position.x, self.position.y
            )
        }
    }
}

/// Whether a recording is self-contained or composed of segments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "RecordingTypeRepr")]
pub enum RecordingType {
    #[default]
    Single,
    Composite,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordingTypeRepr {
    Index(u64),
    Name(String),
}

impl TryFrom<RecordingTypeRepr> for RecordingType {
    type Error = String;

    fn try_from(repr: RecordingTypeRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            RecordingTypeRepr::Index(0) => Ok(RecordingType::Single),
            RecordingTypeRepr::Index(1) => Ok(RecordingType::Composite),
            RecordingTypeRepr::Index(other) => Err(format!("unknown recording type index {other}")),
            RecordingTypeRepr::Name(name) => match name.to_ascii_lowercase().as_str() {
                "single" => Ok(RecordingType::Single),
                "composite" => Ok(RecordingType::Composite),
                _ => Err(format!("unknown recording type {name:?}")),
            },
        }
    }
}

/// Reference to a child segment, relative to the referencing file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentRef {
    pub filename: String,
}

impl SegmentRef {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
        }
    }
}

/// A recording file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordingData {
    pub entry_scene: String,
    pub recording_type: RecordingType,
    pub recorded_aspect_ratio: Point,
    pub recorded_resolution: Point,
    pub recordings: Vec<SegmentRef>,
    pub touch_data: Vec<TouchData>,
}

impl RecordingData {
    pub fn new(entry_scene: impl Into<String>) -> Self {
        Self {
            entry_scene: entry_scene.into(),
            ..Default::default()
        }
    }

    pub fn from_events(entry_scene: impl Into<String>, touch_data: Vec<TouchData>) -> Self {
        Self {
            entry_scene: entry_scene.into(),
            touch_data,
            ..Default::default()
        }
    }

    pub fn is_composite(&self) -> bool {
        self.recording_type == RecordingType::Composite || !self.recordings.is_empty()
    }

    /// Reference a child segment and mark the recording composite.
    pub fn add_segment(&mut self, filename: impl Into<String>) {
        self.recordings.push(SegmentRef::new(filename));
        self.recording_type = RecordingType::Composite;
    }

    /// Append the closing marker that ends playback.
    pub fn add_playback_complete(&mut self, time_delta: f64, scene: impl Into<String>) {
        self.touch_data
            .push(TouchData::marker(time_delta, scene).with_emit_signal(PLAYBACK_COMPLETE_SIGNAL));
    }

    /// Stamp the capture-time display metrics.
    pub fn stamp_display(&mut self, viewport: Viewport, resolution: rewind_core::Size) {
        self.recorded_aspect_ratio = Point::new(viewport.width, viewport.height);
        self.recorded_resolution = resolution.to_point();
    }

    /// Whether the last event closes playback.
    pub fn ends_with_playback_complete(&self) -> bool {
        self.touch_data
            .last()
            .map(|td| td.emits(PLAYBACK_COMPLETE_SIGNAL))
            .unwrap_or(false)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Read a recording file, without resolving segments.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RecordingError::MissingRecordingFile(path.to_path_buf())
            } else {
                RecordingError::io(path, e)
            }
        })?;
        let data = Self::from_json(&json).map_err(|source| RecordingError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        for issue in data.validate() {
            tracing::warn!("{}: {}", path.display(), issue);
        }
        Ok(data)
    }

    /// Write the recording as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| RecordingError::io(dir, e))?;
        }
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| RecordingError::io(path, e))?;
        tracing::debug!("Saved recording with {} events to {}", self.touch_data.len(), path.display());
        Ok(())
    }

    /// Structural problems that do not prevent playback.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for (index, td) in self.touch_data.iter().enumerate() {
            if !td.positional
                && td.event_type.is_pointer()
                && td.object_name.is_empty()
                && td.object_tag.is_empty()
            {
                issues.push(ValidationIssue::MissingObject { index });
            }
            if !td.time_delta.is_finite() || td.time_delta < 0.0 {
                issues.push(ValidationIssue::InvalidTimeDelta {
                    index,
                    time_delta: td.time_delta,
                });
            }
            let p = td.position;
            if td.event_type.is_pointer()
                && (!p.is_finite() || !(0.0..=1.0).contains(&p.x) || !(0.0..=1.0).contains(&p.y))
            {
                issues.push(ValidationIssue::PositionOutOfRange { index, position: p });
            }
        }
        if self.recording_type == RecordingType::Single && !self.recordings.is_empty() {
            issues.push(ValidationIssue::SegmentsInSingleRecording);
        }
        issues
    }
}

/// A structural problem found by [`RecordingData::validate`].
#[derive(Clone, Debug, PartialEq)]
pub enum ValidationIssue {
    MissingObject { index: usize },
    InvalidTimeDelta { index: usize, time_delta: f64 },
    PositionOutOfRange { index: usize, position: Point },
    SegmentsInSingleRecording,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingObject { index } => {
                write!(f, "event {index} is not positional but names no object")
            }
            ValidationIssue::InvalidTimeDelta { index, time_delta } => {
                write!(f, "event {index} has invalid timeDelta {time_delta}")
            }
            ValidationIssue::PositionOutOfRange { index, position } => write!(
                f,
                "event {index} position ({}, {}) is outside the screen",
                position.x, position.y
            ),
            ValidationIssue::SegmentsInSingleRecording => {
                write!(f, "single recording lists child segments")
            }
        }
    }
}
