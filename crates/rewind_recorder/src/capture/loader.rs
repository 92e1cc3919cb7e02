//! Composite recording loader.
//!
//! Expands a recording's segment tree depth-first into a single ordered event
//! stream. Segments come first, in the order they are listed, followed by the
//! recording's own events. A segment's closing `playbackComplete` marker is
//! rewritten to `segmentComplete` so only the outermost stream completes
//! playback.

use super::{RecordingData, TouchData, PLAYBACK_COMPLETE_SIGNAL, SEGMENT_COMPLETE_SIGNAL};
use crate::error::{RecordingError, Result};
use std::path::{Path, PathBuf};

/// Default maximum segment nesting depth.
pub const MAX_SEGMENT_DEPTH: usize = 10;

/// Resolves and flattens segment references.
#[derive(Clone, Debug)]
pub struct SegmentLoader {
    max_depth: usize,
}

impl Default for SegmentLoader {
    fn default() -> Self {
        Self {
            max_depth: MAX_SEGMENT_DEPTH,
        }
    }
}

impl SegmentLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Load `path` and flatten it together with every segment it references.
    pub fn load_flattened(&self, path: impl AsRef<Path>) -> Result<(RecordingData, Vec<TouchData>)> {
        let path = path.as_ref();
        let root = RecordingData::load(path)?;
        let mut chain = vec![file_name(path)];
        let mut out = Vec::new();
        self.flatten_into(&root, base_dir(path), &mut chain, &mut out)?;
        Ok((root, out))
    }

    /// Flatten an already-loaded recording whose segments live in `base_dir`.
    pub fn flatten(&self, root: &RecordingData, base_dir: impl AsRef<Path>) -> Result<Vec<TouchData>> {
        let mut chain = Vec::new();
        let mut out = Vec::new();
        self.flatten_into(root, base_dir.as_ref().to_path_buf(), &mut chain, &mut out)?;
        Ok(out)
    }

    fn flatten_into(
        &self,
        data: &RecordingData,
        base_dir: PathBuf,
        chain: &mut Vec<String>,
        out: &mut Vec<TouchData>,
    ) -> Result<()> {
        for segment in &data.recordings {
            if chain.iter().any(|name| *name == segment.filename) {
                let mut cycle = chain.clone();
                cycle.push(segment.filename.clone());
                return Err(RecordingError::CircularReference { chain: cycle });
            }
            if chain.len() >= self.max_depth {
                let mut deep = chain.clone();
                deep.push(segment.filename.clone());
                return Err(RecordingError::RecursionLimit {
                    limit: self.max_depth,
                    chain: deep,
                });
            }

            let path = base_dir.join(&segment.filename);
            if !path.is_file() {
                return Err(RecordingError::MissingSegment {
                    filename: segment.filename.clone(),
                    chain: chain.clone(),
                });
            }
            let child = RecordingData::load(&path)?;

            chain.push(segment.filename.clone());
            let start = out.len();
            self.flatten_into(&child, base_dir_of(&path, &base_dir), chain, out)?;
            chain.pop();

            if out.len() > start {
                if let Some(last) = out.last_mut() {
                    if last.emit_signal == PLAYBACK_COMPLETE_SIGNAL {
                        last.emit_signal = SEGMENT_COMPLETE_SIGNAL.to_string();
                    }
                }
            }
            tracing::debug!(
                "Flattened segment {} ({} events)",
                segment.filename,
                out.len() - start
            );
        }
        out.extend(data.touch_data.iter().cloned());
        Ok(())
    }
}

/// Load and flatten a recording with the default depth limit.
pub fn flatten_file(path: impl AsRef<Path>) -> Result<(RecordingData, Vec<TouchData>)> {
    SegmentLoader::default().load_flattened(path)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn base_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

fn base_dir_of(path: &Path, fallback: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| fallback.to_path_buf())
}
