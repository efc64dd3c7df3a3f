//! Terminal stand-ins for the host capabilities: narration is printed, typed
//! lines play the role of recognized speech, and display events are rendered
//! as text or JSON lines.

use crate::{
    display::{EventSink, ToastLevel, VoiceIndicator, WorkoutEvent},
    permissions::{MicrophoneAccess, MicrophonePermission},
    queue::ConfirmPrompt,
    speech::{RecognitionError, SpeechRecognizer, SpeechSynthesizer, Utterance},
};
use std::{
    io::{self, BufRead, Write},
    sync::atomic::{AtomicBool, Ordering},
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

pub struct ConsoleSynthesizer;

impl SpeechSynthesizer for ConsoleSynthesizer {
    fn speak(&self, utterance: &Utterance) {
        println!("  [voice] {}", utterance.text);
    }

    fn cancel(&self) {}

    fn is_speaking(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognizerSignal {
    Started,
    Ended,
}

/// Typed input stands in for the microphone. Lifecycle changes are reported
/// back to the host loop, which forwards them to the controller.
pub struct ConsoleRecognizer {
    active: AtomicBool,
    signals: UnboundedSender<RecognizerSignal>,
}

impl ConsoleRecognizer {
    pub fn new(signals: UnboundedSender<RecognizerSignal>) -> Self {
        Self {
            active: AtomicBool::new(false),
            signals,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn signal(&self, signal: RecognizerSignal) -> Result<(), RecognitionError> {
        self.signals
            .send(signal)
            .map_err(|_| RecognitionError::Backend("input loop closed".to_string()))
    }
}

impl SpeechRecognizer for ConsoleRecognizer {
    fn start(&self) -> Result<(), RecognitionError> {
        self.signal(RecognizerSignal::Started)?;
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            if let Err(err) = self.signal(RecognizerSignal::Ended) {
                debug!(error = %err, "recognizer stop not delivered");
            }
        }
    }
}

/// A terminal always has "microphone" access unless voice is switched off.
pub struct ConsoleMicrophone {
    pub available: bool,
}

impl MicrophoneAccess for ConsoleMicrophone {
    fn query(&self) -> MicrophonePermission {
        if self.available {
            MicrophonePermission::Granted
        } else {
            MicrophonePermission::Unsupported
        }
    }

    fn request(&self) -> bool {
        self.available
    }
}

/// Asks on stdin. Only safe where nothing else is reading stdin.
pub struct StdinConfirm;

impl ConfirmPrompt for StdinConfirm {
    fn confirm(&self, question: &str) -> bool {
        print!("{question} [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        is_affirmative(&answer)
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Confirmation collected by the caller before the action runs, for modes
/// whose line reader owns stdin. Each answer is used at most once.
#[derive(Default)]
pub struct PreparedAnswer {
    answer: AtomicBool,
}

impl PreparedAnswer {
    pub fn set(&self, yes: bool) {
        self.answer.store(yes, Ordering::SeqCst);
    }
}

impl ConfirmPrompt for PreparedAnswer {
    fn confirm(&self, question: &str) -> bool {
        let answer = self.answer.swap(false, Ordering::SeqCst);
        debug!(question, answer, "confirmation taken from prepared answer");
        answer
    }
}

/// Fixed answer, for `--yes` and for modes that own stdin.
pub struct FixedConfirm(pub bool);

impl ConfirmPrompt for FixedConfirm {
    fn confirm(&self, question: &str) -> bool {
        debug!(question, answer = self.0, "confirmation answered without prompting");
        self.0
    }
}

pub struct ConsoleSink {
    json: bool,
}

impl ConsoleSink {
    pub fn new(json: bool) -> Self {
        Self { json }
    }
}

impl EventSink for ConsoleSink {
    fn emit(&self, event: WorkoutEvent) {
        if self.json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(err) => debug!(error = %err, "event not serializable"),
            }
            return;
        }
        if let Some(line) = render(&event) {
            println!("{line}");
        }
    }
}

/// One human-readable line per event; chatty per-second events are dropped.
pub fn render(event: &WorkoutEvent) -> Option<String> {
    match event {
        WorkoutEvent::Exercise(view) => Some(format!("== {}: {}", view.label, view.name)),
        WorkoutEvent::Countdown(view) => {
            (view.remaining_secs % 10 == 0).then(|| format!("   {}", view.display))
        }
        WorkoutEvent::Progress(_) | WorkoutEvent::Stats(_) | WorkoutEvent::Controls(_) => None,
        WorkoutEvent::Queue(items) => {
            if items.is_empty() {
                return Some("   queue: (empty)".to_string());
            }
            let names: Vec<String> = items
                .iter()
                .map(|item| format!("{}. {}", item.number, item.name))
                .collect();
            Some(format!("   queue: {}", names.join(", ")))
        }
        WorkoutEvent::Toast(toast) => Some(match toast.level {
            ToastLevel::Success => format!("   ok: {}", toast.message),
            ToastLevel::Error => format!("   error: {}", toast.message),
        }),
        WorkoutEvent::VoiceStatus(status) => {
            let marker = match status.indicator {
                VoiceIndicator::Ready => "ready",
                VoiceIndicator::Listening => "listening",
                VoiceIndicator::Error => "error",
                VoiceIndicator::Off => "off",
            };
            Some(format!("   mic [{marker}] {}", status.text))
        }
        WorkoutEvent::CommandEcho(echo) => echo.visible.then(|| format!("   heard: \"{}\"", echo.phrase)),
        WorkoutEvent::Help(entries) => Some(
            entries
                .iter()
                .map(|entry| format!("   {:<22} {}", entry.command, entry.description))
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        WorkoutEvent::Summary(summary) => Some(format!(
            "** Workout complete: {} exercises in {}, about {} calories",
            summary.completed_count, summary.elapsed_display, summary.calories
        )),
    }
}
