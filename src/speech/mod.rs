//! Speech channels: synthesized narration out, continuous recognition in.
//!
//! Both channels wrap a host backend behind a trait so the session controller
//! never touches a platform API directly. A missing backend means the
//! capability is unavailable and the channel degrades to logging.

pub mod input;
pub mod output;

pub use input::{
    normalize_transcript, RecognitionError, RecognitionErrorKind, SpeechInput, SpeechRecognizer,
};
pub use output::{Prosody, SpeechOutput, SpeechSynthesizer, Utterance, VoiceProfile};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VoiceChannelState {
    pub listening: bool,
    pub speech_enabled: bool,
}
