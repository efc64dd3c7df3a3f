//! Workout session state machine.
//!
//! The session is synchronous and clock-free. Every transition mutates the
//! session and returns the [`SessionEffect`]s the runtime must apply: speech,
//! display events, recognition control and timer (dis)arming. Timer callbacks
//! come back in as [`TimerTicket`]s; a ticket that no longer matches the armed
//! one is ignored, which makes late or duplicate callbacks harmless.
//!
//! Pausing cancels the exercise and total timers and resuming re-arms them
//! with the remaining time, so no tick is ever delivered while paused.

use crate::{
    display::{
        time_remaining_phrase, ControlsView, CountdownView, ExerciseView, ProgressView,
        SessionStats, Toast, WorkoutEvent,
    },
    exercise::Exercise,
    speech::Prosody,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

pub const EXERCISE_DURATION_SECS: u32 = 30;
pub const ENCOURAGEMENT_AT_SECS: u32 = 10;
pub const TICK_PERIOD: Duration = Duration::from_secs(1);
pub const ADVANCE_DELAY: Duration = Duration::from_secs(2);

pub const ENCOURAGEMENT_PHRASE: &str = "10 seconds remaining. Keep going!";
pub const EXERCISE_COMPLETE_PHRASE: &str = "Exercise complete! Great work!";
pub const WORKOUT_COMPLETE_PHRASE: &str = "Workout complete! Excellent job! You crushed it!";
pub const PAUSED_PHRASE: &str = "Workout paused. Say resume when ready.";
pub const RESUMED_PHRASE: &str = "Resuming workout. Let's continue!";
pub const NO_INSTRUCTIONS_PHRASE: &str = "No instructions available for this exercise";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
}

/// Identifies one armed timer or scheduled continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerTicket {
    pub session_id: u64,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    Narrate { text: String, prosody: Prosody },
    CancelNarration,
    Emit(WorkoutEvent),
    StartRecognition,
    StopRecognition,
    ArmExerciseTimer(TimerTicket),
    DisarmExerciseTimer,
    ArmTotalTimer(TimerTicket),
    DisarmTotalTimer,
    ScheduleAdvance(TimerTicket),
    CancelAdvance,
}

impl SessionEffect {
    fn narrate(text: impl Into<String>, prosody: Prosody) -> Self {
        Self::Narrate {
            text: text.into(),
            prosody,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("add exercises to start workout")]
    EmptyQueue,
    #[error("a workout is already in progress")]
    AlreadyActive,
    #[error("no workout is running")]
    NotRunning,
    #[error("workout is not paused")]
    NotPaused,
    #[error("workout is already paused")]
    AlreadyPaused,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSnapshot {
    pub status: SessionStatus,
    pub current_index: usize,
    pub total: usize,
    pub current_exercise: Option<String>,
    pub time_remaining_secs: u32,
    pub elapsed_total_secs: u64,
    pub completed_count: u32,
}

#[derive(Debug, Clone)]
pub struct WorkoutSession {
    queue: Vec<Exercise>,
    status: SessionStatus,
    current_index: usize,
    time_remaining: u32,
    elapsed_total: u64,
    completed_count: u32,
    session_id: u64,
    generation: u64,
    encouraged: bool,
    exercise_timer: Option<TimerTicket>,
    total_timer: Option<TimerTicket>,
    pending_advance: Option<TimerTicket>,
    advance_suspended: bool,
}

impl Default for WorkoutSession {
    fn default() -> Self {
        Self {
            queue: Vec::new(),
            status: SessionStatus::Idle,
            current_index: 0,
            time_remaining: EXERCISE_DURATION_SECS,
            elapsed_total: 0,
            completed_count: 0,
            session_id: 0,
            generation: 0,
            encouraged: false,
            exercise_timer: None,
            total_timer: None,
            pending_advance: None,
            advance_suspended: false,
        }
    }
}

impl WorkoutSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, SessionStatus::Running | SessionStatus::Paused)
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    pub fn elapsed_total(&self) -> u64 {
        self.elapsed_total
    }

    pub fn completed_count(&self) -> u32 {
        self.completed_count
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn exercises(&self) -> &[Exercise] {
        &self.queue
    }

    pub fn current_exercise(&self) -> Option<&Exercise> {
        self.queue.get(self.current_index)
    }

    pub fn armed_exercise_timer(&self) -> Option<TimerTicket> {
        self.exercise_timer
    }

    pub fn armed_total_timer(&self) -> Option<TimerTicket> {
        self.total_timer
    }

    pub fn pending_advance(&self) -> Option<TimerTicket> {
        self.pending_advance
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats::new(self.elapsed_total, self.completed_count)
    }

    pub fn snapshot(&self) -> WorkoutSnapshot {
        WorkoutSnapshot {
            status: self.status,
            current_index: self.current_index,
            total: self.queue.len(),
            current_exercise: self.current_exercise().map(|e| e.name.clone()),
            time_remaining_secs: self.time_remaining,
            elapsed_total_secs: self.elapsed_total,
            completed_count: self.completed_count,
        }
    }

    pub fn start(&mut self, queue: Vec<Exercise>) -> Result<Vec<SessionEffect>, SessionError> {
        if self.is_active() {
            return Err(SessionError::AlreadyActive);
        }
        if queue.is_empty() {
            return Err(SessionError::EmptyQueue);
        }

        let mut effects = Vec::new();
        self.disarm_all(&mut effects);
        self.session_id += 1;
        self.queue = queue;
        self.status = SessionStatus::Running;
        self.current_index = 0;
        self.elapsed_total = 0;
        self.completed_count = 0;
        info!(
            session_id = self.session_id,
            exercises = self.queue.len(),
            "workout started"
        );

        effects.push(SessionEffect::StartRecognition);
        effects.push(SessionEffect::Emit(WorkoutEvent::Controls(ControlsView::active(false))));
        self.begin_exercise(&mut effects);
        self.arm_total_timer(&mut effects);
        effects.push(SessionEffect::Emit(WorkoutEvent::Stats(self.stats())));
        Ok(effects)
    }

    pub fn pause(&mut self) -> Result<Vec<SessionEffect>, SessionError> {
        match self.status {
            SessionStatus::Running => {}
            SessionStatus::Paused => return Err(SessionError::AlreadyPaused),
            SessionStatus::Idle | SessionStatus::Completed => {
                return Err(SessionError::NotRunning)
            }
        }
        let mut effects = Vec::new();
        self.status = SessionStatus::Paused;
        self.disarm_exercise_timer(&mut effects);
        self.disarm_total_timer(&mut effects);
        if self.pending_advance.take().is_some() {
            self.advance_suspended = true;
            effects.push(SessionEffect::CancelAdvance);
        }
        debug!(
            session_id = self.session_id,
            remaining = self.time_remaining,
            "workout paused"
        );

        effects.push(SessionEffect::Emit(WorkoutEvent::Controls(ControlsView::active(true))));
        effects.push(self.progress_effect());
        effects.push(SessionEffect::narrate(PAUSED_PHRASE, Prosody::Normal));
        effects.push(SessionEffect::Emit(WorkoutEvent::Toast(Toast::success(
            "Workout paused",
        ))));
        Ok(effects)
    }

    pub fn resume(&mut self) -> Result<Vec<SessionEffect>, SessionError> {
        if self.status != SessionStatus::Paused {
            return Err(SessionError::NotPaused);
        }
        let mut effects = Vec::new();
        self.status = SessionStatus::Running;
        if self.advance_suspended {
            self.advance_suspended = false;
            self.schedule_advance(&mut effects);
        } else {
            self.arm_exercise_timer(&mut effects);
        }
        self.arm_total_timer(&mut effects);
        debug!(
            session_id = self.session_id,
            remaining = self.time_remaining,
            "workout resumed"
        );

        effects.push(SessionEffect::Emit(WorkoutEvent::Controls(ControlsView::active(false))));
        effects.push(self.progress_effect());
        effects.push(SessionEffect::narrate(RESUMED_PHRASE, Prosody::Motivation));
        effects.push(SessionEffect::Emit(WorkoutEvent::Toast(Toast::success(
            "Workout resumed",
        ))));
        Ok(effects)
    }

    /// Marks the current exercise done and moves on immediately.
    ///
    /// When the exercise already finished on its own and is waiting out the
    /// completion delay, the skip only cuts the delay short.
    pub fn skip(&mut self) -> Result<Vec<SessionEffect>, SessionError> {
        if !self.is_active() {
            return Err(SessionError::NotRunning);
        }
        let mut effects = Vec::new();
        let was_paused = self.status == SessionStatus::Paused;
        self.disarm_exercise_timer(&mut effects);
        let already_done = self.pending_advance.take().is_some() || self.advance_suspended;
        if already_done {
            effects.push(SessionEffect::CancelAdvance);
        }
        self.advance_suspended = false;
        if !already_done {
            self.completed_count += 1;
        }
        self.status = SessionStatus::Running;
        debug!(
            session_id = self.session_id,
            index = self.current_index,
            "exercise skipped"
        );

        if self.has_next_exercise() {
            if was_paused {
                self.arm_total_timer(&mut effects);
                effects.push(SessionEffect::Emit(WorkoutEvent::Controls(ControlsView::active(
                    false,
                ))));
            }
            self.current_index += 1;
            self.begin_exercise(&mut effects);
            effects.push(SessionEffect::Emit(WorkoutEvent::Stats(self.stats())));
        } else {
            self.complete_workout(&mut effects);
        }
        Ok(effects)
    }

    pub fn on_exercise_tick(&mut self, ticket: TimerTicket) -> Vec<SessionEffect> {
        if self.exercise_timer != Some(ticket) || self.status != SessionStatus::Running {
            return Vec::new();
        }
        let mut effects = Vec::new();
        self.time_remaining = self.time_remaining.saturating_sub(1);
        effects.push(SessionEffect::Emit(WorkoutEvent::Countdown(CountdownView::new(
            self.time_remaining,
        ))));

        if self.time_remaining == ENCOURAGEMENT_AT_SECS && !self.encouraged {
            self.encouraged = true;
            effects.push(SessionEffect::narrate(ENCOURAGEMENT_PHRASE, Prosody::Normal));
        } else if self.time_remaining == 0 {
            self.complete_exercise(&mut effects);
        }
        effects
    }

    pub fn on_total_tick(&mut self, ticket: TimerTicket) -> Vec<SessionEffect> {
        if self.total_timer != Some(ticket) || self.status != SessionStatus::Running {
            return Vec::new();
        }
        self.elapsed_total += 1;
        vec![SessionEffect::Emit(WorkoutEvent::Stats(self.stats()))]
    }

    pub fn on_advance(&mut self, ticket: TimerTicket) -> Vec<SessionEffect> {
        if self.pending_advance != Some(ticket) || self.status != SessionStatus::Running {
            return Vec::new();
        }
        self.pending_advance = None;
        let mut effects = Vec::new();
        if self.has_next_exercise() {
            self.current_index += 1;
            self.begin_exercise(&mut effects);
        } else {
            self.complete_workout(&mut effects);
        }
        effects
    }

    /// Leaves any state for `Idle`. Safe to call repeatedly.
    pub fn exit(&mut self) -> Vec<SessionEffect> {
        let mut effects = Vec::new();
        let was = self.status;
        self.disarm_all(&mut effects);
        effects.push(SessionEffect::StopRecognition);
        effects.push(SessionEffect::CancelNarration);

        self.queue.clear();
        self.status = SessionStatus::Idle;
        self.current_index = 0;
        self.time_remaining = EXERCISE_DURATION_SECS;
        self.elapsed_total = 0;
        self.completed_count = 0;
        self.encouraged = false;
        if was != SessionStatus::Idle {
            info!(session_id = self.session_id, from = ?was, "workout exited");
        }

        effects.push(SessionEffect::Emit(WorkoutEvent::Controls(ControlsView::idle())));
        effects.push(SessionEffect::Emit(WorkoutEvent::Stats(self.stats())));
        effects.push(SessionEffect::Emit(WorkoutEvent::Progress(ProgressView::new(0, 0, false))));
        effects
    }

    pub fn repeat_instructions(&self) -> Vec<SessionEffect> {
        vec![SessionEffect::narrate(
            instructions_narration(self.current_exercise()),
            Prosody::Normal,
        )]
    }

    pub fn report_time_remaining(&self) -> Vec<SessionEffect> {
        vec![SessionEffect::narrate(
            time_remaining_phrase(self.time_remaining),
            Prosody::Normal,
        )]
    }

    /// Keeps the preview index inside a queue that just shrank. A running
    /// session indexes its own snapshot and is left alone.
    pub fn clamp_index(&mut self, queue_len: usize) {
        if self.is_active() {
            return;
        }
        self.current_index = self.current_index.min(queue_len.saturating_sub(1));
    }

    fn has_next_exercise(&self) -> bool {
        self.current_index + 1 < self.queue.len()
    }

    fn begin_exercise(&mut self, effects: &mut Vec<SessionEffect>) {
        self.time_remaining = EXERCISE_DURATION_SECS;
        self.encouraged = false;
        let total = self.queue.len();
        let Some(exercise) = self.queue.get(self.current_index).cloned() else {
            return;
        };

        effects.push(SessionEffect::Emit(WorkoutEvent::Exercise(ExerciseView::new(
            &exercise,
            self.current_index,
            total,
        ))));
        effects.push(SessionEffect::Emit(WorkoutEvent::Countdown(CountdownView::new(
            self.time_remaining,
        ))));
        effects.push(self.progress_effect());
        effects.push(SessionEffect::narrate(
            format!(
                "Exercise {}: {}. {}",
                self.current_index + 1,
                exercise.name,
                exercise.first_instruction().unwrap_or("Begin exercise")
            ),
            Prosody::Motivation,
        ));
        self.arm_exercise_timer(effects);
    }

    fn complete_exercise(&mut self, effects: &mut Vec<SessionEffect>) {
        self.disarm_exercise_timer(effects);
        self.completed_count += 1;
        debug!(
            session_id = self.session_id,
            index = self.current_index,
            completed = self.completed_count,
            "exercise completed"
        );
        effects.push(SessionEffect::Emit(WorkoutEvent::Stats(self.stats())));
        effects.push(SessionEffect::narrate(
            EXERCISE_COMPLETE_PHRASE,
            Prosody::Motivation,
        ));
        self.schedule_advance(effects);
    }

    fn complete_workout(&mut self, effects: &mut Vec<SessionEffect>) {
        self.status = SessionStatus::Completed;
        self.disarm_all(effects);
        effects.push(SessionEffect::StopRecognition);
        effects.push(SessionEffect::narrate(
            WORKOUT_COMPLETE_PHRASE,
            Prosody::Motivation,
        ));
        let summary = self.stats();
        info!(
            session_id = self.session_id,
            elapsed_secs = summary.elapsed_secs,
            completed = summary.completed_count,
            calories = summary.calories,
            "workout completed"
        );
        effects.push(SessionEffect::Emit(WorkoutEvent::Summary(summary)));
        effects.push(SessionEffect::Emit(WorkoutEvent::Controls(ControlsView::idle())));
    }

    fn progress_effect(&self) -> SessionEffect {
        SessionEffect::Emit(WorkoutEvent::Progress(ProgressView::new(
            self.current_index,
            self.queue.len(),
            self.status == SessionStatus::Paused,
        )))
    }

    fn next_ticket(&mut self) -> TimerTicket {
        self.generation += 1;
        TimerTicket {
            session_id: self.session_id,
            generation: self.generation,
        }
    }

    fn arm_exercise_timer(&mut self, effects: &mut Vec<SessionEffect>) {
        let ticket = self.next_ticket();
        self.exercise_timer = Some(ticket);
        effects.push(SessionEffect::ArmExerciseTimer(ticket));
    }

    fn disarm_exercise_timer(&mut self, effects: &mut Vec<SessionEffect>) {
        if self.exercise_timer.take().is_some() {
            effects.push(SessionEffect::DisarmExerciseTimer);
        }
    }

    fn arm_total_timer(&mut self, effects: &mut Vec<SessionEffect>) {
        let ticket = self.next_ticket();
        self.total_timer = Some(ticket);
        effects.push(SessionEffect::ArmTotalTimer(ticket));
    }

    fn disarm_total_timer(&mut self, effects: &mut Vec<SessionEffect>) {
        if self.total_timer.take().is_some() {
            effects.push(SessionEffect::DisarmTotalTimer);
        }
    }

    fn schedule_advance(&mut self, effects: &mut Vec<SessionEffect>) {
        let ticket = self.next_ticket();
        self.pending_advance = Some(ticket);
        effects.push(SessionEffect::ScheduleAdvance(ticket));
    }

    fn disarm_all(&mut self, effects: &mut Vec<SessionEffect>) {
        self.disarm_exercise_timer(effects);
        self.disarm_total_timer(effects);
        self.advance_suspended = false;
        if self.pending_advance.take().is_some() {
            effects.push(SessionEffect::CancelAdvance);
        }
    }
}

/// All steps of an exercise as one continuous narration.
pub fn instructions_narration(exercise: Option<&Exercise>) -> String {
    match exercise {
        Some(exercise) if !exercise.instructions.is_empty() => exercise.instructions.join(". "),
        _ => NO_INSTRUCTIONS_PHRASE.to_string(),
    }
}
