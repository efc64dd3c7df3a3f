use crate::{exercise::DEFAULT_CATALOG_URL, store};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

const MIN_SPEECH_RATE: f32 = 0.5;
const MAX_SPEECH_RATE: f32 = 2.0;
const MIN_SPEECH_PITCH: f32 = 0.5;
const MAX_SPEECH_PITCH: f32 = 2.0;
const MAX_RESTART_DELAY_MS: u64 = 5_000;
const MIN_COMMAND_ECHO_MS: u64 = 500;
const MAX_COMMAND_ECHO_MS: u64 = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkoutSettings {
    pub speech_enabled: bool,
    pub voice_language: String,
    pub speech_rate: f32,
    pub speech_pitch: f32,
    pub speech_volume: f32,
    pub recognition_restart_delay_ms: u64,
    pub command_echo_ms: u64,
    pub catalog_url: String,
}

impl Default for WorkoutSettings {
    fn default() -> Self {
        Self {
            speech_enabled: true,
            voice_language: "en-US".to_string(),
            speech_rate: 1.0,
            speech_pitch: 1.0,
            speech_volume: 1.0,
            recognition_restart_delay_ms: 100,
            command_echo_ms: 2_000,
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
        }
    }
}

impl WorkoutSettings {
    /// Returns true when any field had to be pulled back into range.
    pub fn clamp(&mut self) -> bool {
        let before = self.clone();
        self.speech_rate = clamp_or(self.speech_rate, MIN_SPEECH_RATE, MAX_SPEECH_RATE, 1.0);
        self.speech_pitch = clamp_or(self.speech_pitch, MIN_SPEECH_PITCH, MAX_SPEECH_PITCH, 1.0);
        self.speech_volume = clamp_or(self.speech_volume, 0.0, 1.0, 1.0);
        self.recognition_restart_delay_ms = self.recognition_restart_delay_ms.min(MAX_RESTART_DELAY_MS);
        self.command_echo_ms = self
            .command_echo_ms
            .clamp(MIN_COMMAND_ECHO_MS, MAX_COMMAND_ECHO_MS);
        if self.voice_language.trim().is_empty() {
            self.voice_language = "en-US".to_string();
        }
        *self != before
    }
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if !value.is_finite() {
        return fallback;
    }
    value.clamp(min, max)
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Read(std::io::Error),
    #[error("failed to write settings file: {0}")]
    Write(std::io::Error),
    #[error("failed to parse settings JSON: {0}")]
    Parse(serde_json::Error),
    #[error("cannot resolve app data directory")]
    AppData,
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new() -> Result<Self, SettingsError> {
        let dir = store::data_dir().map_err(|_| SettingsError::AppData)?;
        Ok(Self {
            path: dir.join("settings.json"),
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Loads settings, writing them back if any value was out of range.
    pub fn load(&self) -> Result<WorkoutSettings, SettingsError> {
        if !self.path.exists() {
            return Ok(WorkoutSettings::default());
        }
        let raw = fs::read_to_string(&self.path).map_err(SettingsError::Read)?;
        let mut settings: WorkoutSettings =
            serde_json::from_str(&raw).map_err(SettingsError::Parse)?;
        if settings.clamp() {
            self.save(&settings)?;
        }
        Ok(settings)
    }

    pub fn save(&self, settings: &WorkoutSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(SettingsError::Write)?;
        }
        let raw = serde_json::to_string_pretty(settings).map_err(SettingsError::Parse)?;
        fs::write(&self.path, raw).map_err(SettingsError::Write)?;
        Ok(())
    }
}
