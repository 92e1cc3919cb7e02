//! Persistent playback data.
//!
//! Everything the engine keeps between sessions lives in one data directory:
//! the playback-mode record, the working copy of the recording being played
//! or recorded, and any segment files saved while recording.

use crate::capture::RecordingData;
use crate::config::{PlaybackConfig, RecordingMode};
use crate::error::{RecordingError, Result};
use std::path::{Path, PathBuf};

/// File name of the persisted playback-mode record.
pub const CONFIG_FILE_NAME: &str = "config_recording.json";

/// File name of the working recording copy.
pub const RECORDING_FILE_NAME: &str = "playback_recording.json";

/// Prefix of segment files saved while recording.
pub const SEGMENT_FILE_PREFIX: &str = "recording_segment_";

/// Marker in the names of screenshot folders.
pub const SCREENSHOTS_FOLDER_MARKER: &str = "screenshots";

/// Handle to the playback data directory.
#[derive(Clone, Debug)]
pub struct PersistentData {
    dir: PathBuf,
}

impl PersistentData {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE_NAME)
    }

    pub fn recording_path(&self) -> PathBuf {
        self.dir.join(RECORDING_FILE_NAME)
    }

    fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| RecordingError::io(&self.dir, e))
    }

    /// Read the playback-mode record, recreating it as `None` when absent.
    pub fn playback_config(&self) -> Result<PlaybackConfig> {
        let path = self.config_path();
        if !path.is_file() {
            tracing::debug!("No playback config at {}, defaulting to None", path.display());
            let config = PlaybackConfig::default();
            self.set_playback_config(&config)?;
            return Ok(config);
        }
        let json = std::fs::read_to_string(&path).map_err(|e| RecordingError::io(&path, e))?;
        serde_json::from_str(&json).map_err(|source| RecordingError::Parse { path, source })
    }

    pub fn set_playback_config(&self, config: &PlaybackConfig) -> Result<()> {
        self.ensure_dir()?;
        let path = self.config_path();
        let json = serde_json::to_string_pretty(config)?;
        std::fs::write(&path, json).map_err(|e| RecordingError::io(&path, e))
    }

    pub fn set_recording_mode(&self, mode: RecordingMode, recording_file_name: impl Into<String>) -> Result<()> {
        self.set_playback_config(&PlaybackConfig {
            mode,
            recording_file_name: recording_file_name.into(),
        })
    }

    /// Read the working recording.
    pub fn recording_data(&self) -> Result<RecordingData> {
        RecordingData::load(self.recording_path())
    }

    /// Overwrite the working recording.
    pub fn set_recording_data(&self, data: &RecordingData) -> Result<PathBuf> {
        let path = self.recording_path();
        data.save(&path)?;
        Ok(path)
    }

    /// Replace the working data with `source` and every segment it references.
    pub fn set_recording_data_from_file(&self, source: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        self.clean_recording_data(false)?;
        let source = source.as_ref();
        let copied = copy_recording_file(source, &self.dir)?;
        let copied_root = self.dir.join(file_name(source));
        if copied_root != self.recording_path() {
            std::fs::rename(&copied_root, self.recording_path())
                .map_err(|e| RecordingError::io(&copied_root, e))?;
        }
        Ok(copied
            .into_iter()
            .map(|p| if p == copied_root { self.recording_path() } else { p })
            .collect())
    }

    /// Remove the working recording, saved segments and optionally screenshots.
    pub fn clean_recording_data(&self, screenshots: bool) -> Result<()> {
        if !self.dir.is_dir() {
            return Ok(());
        }
        let entries = std::fs::read_dir(&self.dir).map_err(|e| RecordingError::io(&self.dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| RecordingError::io(&self.dir, e))?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if path.is_file()
                && (name == RECORDING_FILE_NAME
                    || (name.starts_with(SEGMENT_FILE_PREFIX) && name.ends_with(".json")))
            {
                std::fs::remove_file(&path).map_err(|e| RecordingError::io(&path, e))?;
            } else if screenshots && path.is_dir() && name.contains(SCREENSHOTS_FOLDER_MARKER) {
                std::fs::remove_dir_all(&path).map_err(|e| RecordingError::io(&path, e))?;
            }
        }
        tracing::debug!("Cleaned recording data in {}", self.dir.display());
        Ok(())
    }
}

/// Segment file names referenced by the recording at `path`.
///
/// Unreadable recordings yield an empty list and a warning.
pub fn segment_files(path: impl AsRef<Path>) -> Vec<String> {
    let path = path.as_ref();
    match RecordingData::load(path) {
        Ok(data) => data.recordings.into_iter().map(|s| s.filename).collect(),
        Err(e) => {
            tracing::warn!("Cannot list segments of {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Copy a recording and, recursively, its segments into `dest_dir`.
///
/// Returns the paths written. Each file is copied at most once.
pub fn copy_recording_file(source: impl AsRef<Path>, dest_dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let source = source.as_ref();
    let dest_dir = dest_dir.as_ref();
    if !source.is_file() {
        return Err(RecordingError::MissingRecordingFile(source.to_path_buf()));
    }
    std::fs::create_dir_all(dest_dir).map_err(|e| RecordingError::io(dest_dir, e))?;

    let mut written = Vec::new();
    let mut pending = vec![source.to_path_buf()];
    while let Some(file) = pending.pop() {
        let target = dest_dir.join(file_name(&file));
        if written.contains(&target) {
            continue;
        }
        if file != target {
            std::fs::copy(&file, &target).map_err(|e| RecordingError::io(&file, e))?;
        }
        written.push(target);

        let base = file.parent().map(Path::to_path_buf).unwrap_or_default();
        for segment in segment_files(&file) {
            let segment_path = base.join(&segment);
            if segment_path.is_file() {
                pending.push(segment_path);
            } else {
                tracing::warn!("Segment {} of {} not found", segment, file.display());
            }
        }
    }
    Ok(written)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::TouchData;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_defaults_to_none() {
        let dir = TempDir::new().unwrap();
        let data = PersistentData::new(dir.path().join("data"));
        let config = data.playback_config().unwrap();
        assert_eq!(config.mode, RecordingMode::None);
        assert!(data.config_path().is_file());
    }

    #[test]
    fn test_set_mode() {
        let dir = TempDir::new().unwrap();
        let data = PersistentData::new(dir.path());
        data.set_recording_mode(RecordingMode::Playback, "login.json").unwrap();
        let config = data.playback_config().unwrap();
        assert_eq!(config.mode, RecordingMode::Playback);
        assert_eq!(config.recording_file_name, "login.json");
    }

    #[test]
    fn test_copy_with_segments() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let mut child = RecordingData::new("Main");
        child.touch_data.push(TouchData::marker(0.1, "Main"));
        child.save(source.path().join("child.json")).unwrap();
        let mut root = RecordingData::new("Main");
        root.add_segment("child.json");
        root.save(source.path().join("root.json")).unwrap();

        let data = PersistentData::new(dest.path());
        let copied = data
            .set_recording_data_from_file(source.path().join("root.json"))
            .unwrap();
        assert_eq!(copied.len(), 2);
        assert!(data.recording_path().is_file());
        assert!(dest.path().join("child.json").is_file());
        assert_eq!(data.recording_data().unwrap().recordings.len(), 1);
    }

    #[test]
    fn test_clean_recording_data() {
        let dir = TempDir::new().unwrap();
        let data = PersistentData::new(dir.path());
        data.set_recording_data(&RecordingData::new("Main")).unwrap();
        RecordingData::new("Main")
            .save(dir.path().join("recording_segment_1_100.json"))
            .unwrap();
        std::fs::create_dir_all(dir.path().join("Playback screenshots 1")).unwrap();
        std::fs::write(dir.path().join("keep.json"), "{}").unwrap();

        data.clean_recording_data(false).unwrap();
        assert!(!data.recording_path().exists());
        assert!(!dir.path().join("recording_segment_1_100.json").exists());
        assert!(dir.path().join("Playback screenshots 1").exists());

        data.clean_recording_data(true).unwrap();
        assert!(!dir.path().join("Playback screenshots 1").exists());
        assert!(dir.path().join("keep.json").exists());
    }

    #[test]
    fn test_missing_working_recording() {
        let dir = TempDir::new().unwrap();
        let data = PersistentData::new(dir.path());
        assert!(matches!(
            data.recording_data(),
            Err(RecordingError::MissingRecordingFile(_))
        ));
    }
}
