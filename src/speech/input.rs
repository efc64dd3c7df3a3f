use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RecognitionErrorKind {
    NoSpeech,
    NotAllowed,
    Other(String),
}

impl RecognitionErrorKind {
    pub fn status_text(&self) -> &'static str {
        match self {
            Self::NoSpeech => "No speech detected",
            Self::NotAllowed => "Microphone access denied",
            Self::Other(_) => "Voice error",
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecognitionError {
    #[error("speech recognition is not available")]
    Unavailable,
    #[error("speech recognition failed to start: {0}")]
    Backend(String),
}

/// Host continuous speech recognizer. Results and end-of-stream arrive
/// asynchronously through the controller's recognition callbacks.
pub trait SpeechRecognizer: Send + Sync {
    fn start(&self) -> Result<(), RecognitionError>;
    fn stop(&self);
}

/// Lowercased, trimmed, single-spaced command text.
pub fn normalize_transcript(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct SpeechInput {
    backend: Option<Arc<dyn SpeechRecognizer>>,
    permitted: bool,
    requested: bool,
    listening: bool,
}

impl SpeechInput {
    pub fn new(backend: Option<Arc<dyn SpeechRecognizer>>) -> Self {
        Self {
            backend,
            permitted: false,
            requested: false,
            listening: false,
        }
    }

    pub fn set_permitted(&mut self, permitted: bool) {
        self.permitted = permitted;
    }

    pub fn available(&self) -> bool {
        self.permitted && self.backend.is_some()
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// True between a successful `start` and the next `stop` or end-of-stream.
    pub fn is_active(&self) -> bool {
        self.requested || self.listening
    }

    pub fn start(&mut self) -> Result<(), RecognitionError> {
        if !self.available() {
            return Err(RecognitionError::Unavailable);
        }
        if self.is_active() {
            debug!("recognition already started");
            return Ok(());
        }
        let Some(backend) = &self.backend else {
            return Err(RecognitionError::Unavailable);
        };
        backend.start()?;
        self.requested = true;
        Ok(())
    }

    pub fn stop(&mut self) {
        if !self.is_active() {
            return;
        }
        if let Some(backend) = &self.backend {
            backend.stop();
        }
        self.requested = false;
        self.listening = false;
    }

    pub fn on_started(&mut self) {
        self.listening = true;
    }

    pub fn on_ended(&mut self) {
        self.listening = false;
        self.requested = false;
    }

    /// Normalizes a final result; blank results are dropped.
    pub fn on_result(&self, raw: &str) -> Option<String> {
        let command = normalize_transcript(raw);
        if command.is_empty() {
            return None;
        }
        debug!(command = %command, "voice command recognized");
        Some(command)
    }

    pub fn on_error(&self, kind: &RecognitionErrorKind) -> &'static str {
        warn!(error = ?kind, "speech recognition error");
        kind.status_text()
    }
}
