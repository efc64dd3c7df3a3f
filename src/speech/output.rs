use crate::settings::WorkoutSettings;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

const MOTIVATION_RATE: f32 = 1.1;
const MOTIVATION_PITCH: f32 = 1.1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Prosody {
    #[default]
    Normal,
    /// Slightly faster and higher; the words are unchanged.
    Motivation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Utterance {
    pub text: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoiceProfile {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub language: String,
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self::from_settings(&WorkoutSettings::default())
    }
}

impl VoiceProfile {
    pub fn from_settings(settings: &WorkoutSettings) -> Self {
        Self {
            rate: settings.speech_rate,
            pitch: settings.speech_pitch,
            volume: settings.speech_volume,
            language: settings.voice_language.clone(),
        }
    }

    pub fn utterance(&self, text: &str, prosody: Prosody) -> Utterance {
        let (rate, pitch) = match prosody {
            Prosody::Normal => (self.rate, self.pitch),
            Prosody::Motivation => (MOTIVATION_RATE, MOTIVATION_PITCH),
        };
        Utterance {
            text: text.to_string(),
            rate,
            pitch,
            volume: self.volume,
            language: self.language.clone(),
        }
    }
}

/// Host text-to-speech engine.
pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&self, utterance: &Utterance);
    fn cancel(&self);
    fn is_speaking(&self) -> bool;
}

/// Single-voice narration channel: a new utterance replaces the current one.
pub struct SpeechOutput {
    backend: Option<Arc<dyn SpeechSynthesizer>>,
    enabled: bool,
    voice: VoiceProfile,
}

impl SpeechOutput {
    pub fn new(backend: Option<Arc<dyn SpeechSynthesizer>>, settings: &WorkoutSettings) -> Self {
        Self {
            backend,
            enabled: settings.speech_enabled,
            voice: VoiceProfile::from_settings(settings),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_supported(&self) -> bool {
        self.backend.is_some()
    }

    pub fn configure(&mut self, settings: &WorkoutSettings) {
        self.voice = VoiceProfile::from_settings(settings);
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.cancel();
        }
    }

    /// Returns whether the utterance reached the synthesizer.
    pub fn speak(&self, text: &str, prosody: Prosody) -> bool {
        if !self.enabled {
            debug!(text, "speech disabled; narration skipped");
            return false;
        }
        let Some(backend) = &self.backend else {
            debug!(text, "no synthesizer; narration skipped");
            return false;
        };
        if backend.is_speaking() {
            backend.cancel();
        }
        backend.speak(&self.voice.utterance(text, prosody));
        true
    }

    pub fn cancel(&self) {
        if let Some(backend) = &self.backend {
            if backend.is_speaking() {
                backend.cancel();
            }
        }
    }
}
