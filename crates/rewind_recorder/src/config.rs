//! Runtime settings and the persisted playback mode.

use crate::error::{RecordingError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What the engine does with input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RecordingModeRepr")]
pub enum RecordingMode {
    /// Inert: no capture and no injection.
    #[default]
    None,
    Record,
    Playback,
    /// Play back, then continue recording after the replayed prefix.
    Extend,
}

impl RecordingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordingMode::None => "None",
            RecordingMode::Record => "Record",
            RecordingMode::Playback => "Playback",
            RecordingMode::Extend => "Extend",
        }
    }

    /// Whether recorded events are being injected.
    pub fn is_replaying(self) -> bool {
        matches!(self, RecordingMode::Playback | RecordingMode::Extend)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordingModeRepr {
    Index(u64),
    Name(String),
}

impl TryFrom<RecordingModeRepr> for RecordingMode {
    type Error = String;

    fn try_from(repr: RecordingModeRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            RecordingModeRepr::Index(0) => Ok(RecordingMode::None),
            RecordingModeRepr::Index(1) => Ok(RecordingMode::Record),
            RecordingModeRepr::Index(2) => Ok(RecordingMode::Playback),
            RecordingModeRepr::Index(3) => Ok(RecordingMode::Extend),
            RecordingModeRepr::Index(other) => Err(format!("unknown recording mode {other}")),
            RecordingModeRepr::Name(name) => match name.as_str() {
                "None" => Ok(RecordingMode::None),
                "Record" => Ok(RecordingMode::Record),
                "Playback" => Ok(RecordingMode::Playback),
                "Extend" => Ok(RecordingMode::Extend),
                _ => Err(format!("unknown recording mode {name:?}")),
            },
        }
    }
}

/// Persisted `{mode, recordingFileName}` record read at startup.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackConfig {
    pub mode: RecordingMode,
    pub recording_file_name: String,
}

/// What to do with an event whose target cannot be found.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedPolicy {
    /// Log an error and inject at the recorded coordinates.
    #[default]
    ReplayAtRecordedPosition,
    /// Log an error and drop the event's input.
    SkipEvent,
}

/// Engine settings, usually read from a TOML file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Directory holding the playback config, working recording and segments.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub enable_screenshots: bool,

    /// Delay of the second screenshot taken around each action.
    #[serde(default = "default_screenshot_delay")]
    pub screenshot_delay_secs: f64,

    /// How long scripted steps wait for their targets and for consumption.
    #[serde(default = "default_dynamic_wait_timeout")]
    pub dynamic_wait_timeout_secs: f64,

    #[serde(default = "default_dynamic_load_scene_timeout")]
    pub dynamic_load_scene_timeout_secs: f64,

    /// How long playback waits for the recording's entry scene.
    #[serde(default = "default_entry_scene_timeout")]
    pub entry_scene_timeout_secs: f64,

    #[serde(default = "default_drag_sample_interval")]
    pub drag_sample_interval_secs: f64,

    /// Grid resolution of the fallback raycast sweep, per axis.
    #[serde(default = "default_raycast_grid_steps")]
    pub raycast_grid_steps: u32,

    #[serde(default)]
    pub unresolved_policy: UnresolvedPolicy,

    /// Delete working data when a playback session ends.
    #[serde(default = "default_true")]
    pub clean_after_playback: bool,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("automated_testing_data")
}

fn default_screenshot_delay() -> f64 {
    0.25
}

fn default_dynamic_wait_timeout() -> f64 {
    10.0
}

fn default_dynamic_load_scene_timeout() -> f64 {
    30.0
}

fn default_entry_scene_timeout() -> f64 {
    60.0
}

fn default_drag_sample_interval() -> f64 {
    crate::replay::DRAG_SAMPLE_INTERVAL
}

fn default_raycast_grid_steps() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            enable_screenshots: false,
            screenshot_delay_secs: default_screenshot_delay(),
            dynamic_wait_timeout_secs: default_dynamic_wait_timeout(),
            dynamic_load_scene_timeout_secs: default_dynamic_load_scene_timeout(),
            entry_scene_timeout_secs: default_entry_scene_timeout(),
            drag_sample_interval_secs: default_drag_sample_interval(),
            raycast_grid_steps: default_raycast_grid_steps(),
            unresolved_policy: UnresolvedPolicy::default(),
            clean_after_playback: true,
        }
    }
}

impl RuntimeSettings {
    /// Settings rooted at `data_dir`, everything else default.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Load settings from a TOML file, or defaults if it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| RecordingError::io(path, e))?;
        let settings: Self = toml::from_str(&content).map_err(|source| RecordingError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(settings.normalized())
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str::<Self>(content).map(Self::normalized)
    }

    /// Clamp values the engine cannot work with.
    pub fn normalized(mut self) -> Self {
        self.dynamic_wait_timeout_secs = non_negative(self.dynamic_wait_timeout_secs);
        self.dynamic_load_scene_timeout_secs = non_negative(self.dynamic_load_scene_timeout_secs);
        self.entry_scene_timeout_secs = non_negative(self.entry_scene_timeout_secs);
        self.screenshot_delay_secs = non_negative(self.screenshot_delay_secs);
        if !(self.drag_sample_interval_secs.is_finite() && self.drag_sample_interval_secs > 0.0) {
            self.drag_sample_interval_secs = default_drag_sample_interval();
        }
        self.raycast_grid_steps = self.raycast_grid_steps.max(1);
        self
    }

    /// Path of the persisted playback-mode record.
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(crate::persist::CONFIG_FILE_NAME)
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = RuntimeSettings::default();
        assert_eq!(settings.dynamic_wait_timeout_secs, 10.0);
        assert_eq!(settings.dynamic_load_scene_timeout_secs, 30.0);
        assert_eq!(settings.screenshot_delay_secs, 0.25);
        assert_eq!(settings.drag_sample_interval_secs, 0.05);
        assert_eq!(settings.raycast_grid_steps, 100);
        assert!(!settings.enable_screenshots);
    }

    #[test]
    fn test_partial_toml() {
        let settings = RuntimeSettings::from_toml_str(
            r#"
            data_dir = "/tmp/rewind"
            dynamic_wait_timeout_secs = -3.0
            raycast_grid_steps = 0
            unresolved_policy = "skip_event"
            "#,
        )
        .unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("/tmp/rewind"));
        assert_eq!(settings.dynamic_wait_timeout_secs, 0.0);
        assert_eq!(settings.raycast_grid_steps, 1);
        assert_eq!(settings.unresolved_policy, UnresolvedPolicy::SkipEvent);
        assert_eq!(settings.entry_scene_timeout_secs, 60.0);
    }

    #[test]
    fn test_load_missing_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = RuntimeSettings::load(dir.path().join("rewind.toml")).unwrap();
        assert_eq!(settings.raycast_grid_steps, 100);
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rewind.toml");
        std::fs::write(&path, "raycast_grid_steps = \"many\"").unwrap();
        assert!(matches!(
            RuntimeSettings::load(&path),
            Err(RecordingError::Config { .. })
        ));
    }

    #[test]
    fn test_playback_config_forms() {
        let named: PlaybackConfig =
            serde_json::from_str(r#"{"mode":"Extend","recordingFileName":"a.json"}"#).unwrap();
        assert_eq!(named.mode, RecordingMode::Extend);
        assert_eq!(named.recording_file_name, "a.json");

        let indexed: PlaybackConfig = serde_json::from_str(r#"{"mode":2}"#).unwrap();
        assert_eq!(indexed.mode, RecordingMode::Playback);

        let json = serde_json::to_string(&PlaybackConfig::default()).unwrap();
        assert_eq!(json, r#"{"mode":"None","recordingFileName":""}"#);
    }
}
