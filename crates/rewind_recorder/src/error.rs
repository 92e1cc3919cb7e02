//! Error types for recording storage and scheduling

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, flattening or persisting recordings
///
/// All of these surface at mode transitions, never from inside the tick loop.
#[derive(Error, Debug)]
pub enum RecordingError {
    /// Filesystem failure
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Recording file is not well-formed JSON of the expected shape
    #[error("Failed to parse recording {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A composite recording references a segment that does not exist
    #[error("Segment {filename} referenced by [{}] does not exist", .chain.join(" > "))]
    MissingSegment { filename: String, chain: Vec<String> },

    /// A segment reappears in its own ancestor chain
    #[error("Circular segment reference: {}", .chain.join(" > "))]
    CircularReference { chain: Vec<String> },

    /// Segment nesting deeper than the loader allows
    #[error("Segment nesting exceeds {limit} levels: {}", .chain.join(" > "))]
    RecursionLimit { limit: usize, chain: Vec<String> },

    /// The recording named by the playback config is missing
    #[error("Recording file not found: {0}")]
    MissingRecordingFile(PathBuf),

    /// Settings file is not valid TOML
    #[error("Invalid settings in {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Serializing a recording or report failed
    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl RecordingError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RecordingError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether retrying the same load can never succeed
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RecordingError::CircularReference { .. }
                | RecordingError::RecursionLimit { .. }
                | RecordingError::MissingRecordingFile(_)
                | RecordingError::MissingSegment { .. }
        )
    }
}

/// Result type for recording operations
pub type Result<T> = std::result::Result<T, RecordingError>;

/// Errors raised while editing the live event stream
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// Attempted to insert at or before an event that already played
    #[error("Cannot insert at index {index}: events up to {cursor} have already played")]
    InsertBeforeCursor { index: usize, cursor: usize },

    /// Insertion index past the end of the stream
    #[error("Insertion index {index} out of range for stream of {len} events")]
    OutOfRange { index: usize, len: usize },

    /// The event id is not part of the stream
    #[error("Unknown event id {0}")]
    UnknownEvent(u64),
}
