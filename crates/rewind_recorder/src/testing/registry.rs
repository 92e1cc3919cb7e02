//! Registry of recorded tests.
//!
//! Maps test identifiers to recording files. Entries are added with
//! [`RecordedTestRegistry::register`] or read from a TOML manifest:
//!
//! ```toml
//! [tests]
//! "login.valid_credentials" = "recordings/login.json"
//! ```

use crate::config::RecordingMode;
use crate::error::{RecordingError, Result};
use crate::persist::PersistentData;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    #[serde(default)]
    tests: BTreeMap<String, PathBuf>,
}

/// Test identifier to recording path.
#[derive(Clone, Debug, Default)]
pub struct RecordedTestRegistry {
    tests: BTreeMap<String, PathBuf>,
}

impl RecordedTestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a manifest; relative recording paths resolve against its directory.
    pub fn from_manifest(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| RecordingError::io(path, e))?;
        let manifest: Manifest = toml::from_str(&content).map_err(|source| RecordingError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let mut registry = Self::new();
        for (name, recording) in manifest.tests {
            registry.register(name, base.join(recording));
        }
        tracing::debug!("Loaded {} recorded tests from {}", registry.len(), path.display());
        Ok(registry)
    }

    pub fn register(&mut self, test_name: impl Into<String>, recording: impl Into<PathBuf>) {
        let test_name = test_name.into();
        if let Some(previous) = self.tests.insert(test_name.clone(), recording.into()) {
            tracing::warn!("Test {} was registered before with {}", test_name, previous.display());
        }
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Registered tests in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.tests.iter().map(|(name, path)| (name.as_str(), path.as_path()))
    }

    pub fn recording_for(&self, test_name: &str) -> Option<&Path> {
        let recording = self.tests.get(test_name).map(PathBuf::as_path);
        if recording.is_none() {
            tracing::error!("Recording file not found for test {}", test_name);
        }
        recording
    }

    /// Copy the test's recording into the data directory and select playback.
    ///
    /// Returns the working recording path.
    pub fn setup_recorded_test(&self, test_name: &str, data: &PersistentData) -> Result<PathBuf> {
        let source = self
            .recording_for(test_name)
            .ok_or_else(|| RecordingError::MissingRecordingFile(PathBuf::from(test_name)))?;
        if !source.is_file() {
            return Err(RecordingError::MissingRecordingFile(source.to_path_buf()));
        }
        data.set_recording_data_from_file(source)?;
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        data.set_recording_mode(RecordingMode::Playback, file_name)?;
        Ok(data.recording_path())
    }
}
