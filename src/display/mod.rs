use crate::exercise::Exercise;
use serde::{Deserialize, Serialize};

const CALORIES_PER_MINUTE: f64 = 5.0;

/// Receives every display, toast and status update produced by the runtime.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: WorkoutEvent);
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum WorkoutEvent {
    Exercise(ExerciseView),
    Countdown(CountdownView),
    Progress(ProgressView),
    Stats(SessionStats),
    Queue(Vec<QueueItemView>),
    Toast(Toast),
    VoiceStatus(VoiceStatus),
    CommandEcho(CommandEcho),
    Help(Vec<HelpEntry>),
    Summary(WorkoutSummary),
    Controls(ControlsView),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseView {
    pub position: usize,
    pub total: usize,
    pub label: String,
    pub name: String,
    pub instructions: Vec<String>,
    pub image_urls: Vec<String>,
}

impl ExerciseView {
    pub fn new(exercise: &Exercise, index: usize, total: usize) -> Self {
        Self {
            position: index + 1,
            total,
            label: format!("Exercise {} of {}", index + 1, total),
            name: exercise.name.clone(),
            instructions: exercise.instructions.clone(),
            image_urls: exercise.image_urls(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CountdownView {
    pub remaining_secs: u32,
    pub display: String,
}

impl CountdownView {
    pub fn new(remaining_secs: u32) -> Self {
        Self {
            remaining_secs,
            display: format_countdown(remaining_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    pub percent: f32,
    pub label: String,
}

impl ProgressView {
    pub fn new(index: usize, len: usize, paused: bool) -> Self {
        let percent = progress_percent(index, len, paused);
        Self {
            percent,
            label: format!("{}% Complete", percent.round() as u32),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub elapsed_secs: u64,
    pub elapsed_display: String,
    pub completed_count: u32,
    pub calories: u32,
}

impl SessionStats {
    pub fn new(elapsed_secs: u64, completed_count: u32) -> Self {
        Self {
            elapsed_secs,
            elapsed_display: format_elapsed(elapsed_secs),
            completed_count,
            calories: calorie_estimate(elapsed_secs),
        }
    }
}

/// End-of-workout numbers shown with the completion message.
pub type WorkoutSummary = SessionStats;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueueItemView {
    pub index: usize,
    pub number: usize,
    pub name: String,
    pub category: String,
    pub primary_muscles: Vec<String>,
    pub image_url: Option<String>,
}

pub fn queue_view(items: &[Exercise]) -> Vec<QueueItemView> {
    items
        .iter()
        .enumerate()
        .map(|(index, exercise)| QueueItemView {
            index,
            number: index + 1,
            name: exercise.name.clone(),
            category: exercise
                .category
                .clone()
                .unwrap_or_else(|| "Exercise".to_string()),
            primary_muscles: exercise.primary_muscles.clone(),
            image_url: exercise.image_urls().into_iter().next(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ToastLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum VoiceIndicator {
    Ready,
    Listening,
    Error,
    Off,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VoiceStatus {
    pub indicator: VoiceIndicator,
    pub text: String,
}

impl VoiceStatus {
    pub fn new(indicator: VoiceIndicator, text: impl Into<String>) -> Self {
        Self {
            indicator,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommandEcho {
    pub phrase: String,
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HelpEntry {
    pub command: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ControlsView {
    pub start_visible: bool,
    pub pause_visible: bool,
    pub pause_label: String,
    pub next_visible: bool,
}

impl ControlsView {
    pub fn idle() -> Self {
        Self {
            start_visible: true,
            pause_visible: false,
            pause_label: "Pause".to_string(),
            next_visible: false,
        }
    }

    pub fn active(paused: bool) -> Self {
        Self {
            start_visible: false,
            pause_visible: true,
            pause_label: if paused { "Resume" } else { "Pause" }.to_string(),
            next_visible: true,
        }
    }
}

/// `MM:SS`, zero padded.
pub fn format_countdown(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// `M:SS` for total workout time.
pub fn format_elapsed(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

pub fn progress_percent(index: usize, len: usize, paused: bool) -> f32 {
    if len == 0 {
        return 0.0;
    }
    let done = index + usize::from(!paused);
    (done as f32 / len as f32) * 100.0
}

pub fn calorie_estimate(elapsed_secs: u64) -> u32 {
    ((elapsed_secs as f64 / 60.0) * CALORIES_PER_MINUTE).round() as u32
}

pub fn time_remaining_phrase(secs: u32) -> String {
    let minutes = secs / 60;
    let seconds = secs % 60;
    if minutes > 0 {
        format!("{minutes} minutes and {seconds} seconds remaining")
    } else {
        format!("{seconds} seconds remaining")
    }
}
