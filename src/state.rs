use crate::{
    commands::{help_entries, interpret, WorkoutCommand, HELP_PHRASE, UNRECOGNIZED_PHRASE},
    display::{
        queue_view, CommandEcho, ControlsView, EventSink, ExerciseView, HelpEntry, Toast,
        VoiceIndicator, VoiceStatus, WorkoutEvent,
    },
    exercise::Exercise,
    permissions::{MicrophoneAccess, MicrophonePermission, PermissionManager, PermissionSnapshot},
    queue::{AddOutcome, ClearOutcome, ConfirmPrompt, QueueError, SavedExercises, WorkoutQueue},
    session::{
        instructions_narration, SessionEffect, SessionError, SessionStatus, TimerTicket,
        WorkoutSession, WorkoutSnapshot, ADVANCE_DELAY, TICK_PERIOD,
    },
    settings::{SettingsError, SettingsStore, WorkoutSettings},
    speech::{
        Prosody, RecognitionError, RecognitionErrorKind, SpeechInput, SpeechOutput,
        SpeechRecognizer, SpeechSynthesizer, VoiceChannelState,
    },
    store::{LocalStore, StoreError},
};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::Mutex,
    time::{interval_at, sleep, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const WELCOME_PHRASE: &str =
    "Welcome to your workout session. Add exercises and say start workout when ready.";
const EMPTY_QUEUE_PHRASE: &str = "Please add exercises to your workout first";

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Host capabilities the controller drives.
#[derive(Clone)]
pub struct Backends {
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    pub recognizer: Option<Arc<dyn SpeechRecognizer>>,
    pub microphone: Arc<dyn MicrophoneAccess>,
    pub confirm: Arc<dyn ConfirmPrompt>,
    pub sink: Arc<dyn EventSink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickKind {
    Exercise,
    Total,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArmedTimers {
    pub exercise: bool,
    pub total: bool,
    pub advance: bool,
    pub recognition_restart: bool,
}

#[derive(Default)]
struct TimerSlots {
    exercise: Option<CancellationToken>,
    total: Option<CancellationToken>,
    advance: Option<CancellationToken>,
    restart: Option<CancellationToken>,
}

fn rearm(slot: &mut Option<CancellationToken>) -> CancellationToken {
    disarm(slot);
    let token = CancellationToken::new();
    *slot = Some(token.clone());
    token
}

fn disarm(slot: &mut Option<CancellationToken>) {
    if let Some(token) = slot.take() {
        token.cancel();
    }
}

/// Decrements the live ticker count when an exercise ticker task ends.
struct LiveTicker(Arc<AtomicUsize>);

impl LiveTicker {
    fn enter(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(count.clone())
    }
}

impl Drop for LiveTicker {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Runtime {
    session: WorkoutSession,
    timers: TimerSlots,
    speech_out: SpeechOutput,
    speech_in: SpeechInput,
    capability_reported: bool,
}

pub struct WorkoutController {
    settings_store: Option<SettingsStore>,
    settings: Mutex<WorkoutSettings>,
    runtime: Mutex<Runtime>,
    queue: Mutex<WorkoutQueue>,
    saved: Mutex<SavedExercises>,
    permission_manager: Mutex<PermissionManager>,
    microphone: Arc<dyn MicrophoneAccess>,
    confirm: Arc<dyn ConfirmPrompt>,
    sink: Arc<dyn EventSink>,
    live_exercise_tickers: Arc<AtomicUsize>,
}

impl WorkoutController {
    pub fn new(
        settings: WorkoutSettings,
        settings_store: Option<SettingsStore>,
        queue: WorkoutQueue,
        saved: SavedExercises,
        backends: Backends,
    ) -> Arc<Self> {
        let speech_out = SpeechOutput::new(backends.synthesizer, &settings);
        let speech_in = SpeechInput::new(backends.recognizer);
        Arc::new(Self {
            settings_store,
            settings: Mutex::new(settings),
            runtime: Mutex::new(Runtime {
                session: WorkoutSession::new(),
                timers: TimerSlots::default(),
                speech_out,
                speech_in,
                capability_reported: false,
            }),
            queue: Mutex::new(queue),
            saved: Mutex::new(saved),
            permission_manager: Mutex::new(PermissionManager::default()),
            microphone: backends.microphone,
            confirm: backends.confirm,
            sink: backends.sink,
            live_exercise_tickers: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Settings and queue from the platform data directory.
    pub fn from_environment(backends: Backends) -> Result<Arc<Self>, ControllerError> {
        let settings_store = SettingsStore::new()?;
        let settings = settings_store.load()?;
        let store = LocalStore::new()?;
        Ok(Self::new(
            settings,
            Some(settings_store),
            WorkoutQueue::load(store.clone()),
            SavedExercises::load(store),
            backends,
        ))
    }

    pub async fn snapshot(&self) -> WorkoutSnapshot {
        self.runtime.lock().await.session.snapshot()
    }

    pub async fn voice_state(&self) -> VoiceChannelState {
        let runtime = self.runtime.lock().await;
        VoiceChannelState {
            listening: runtime.speech_in.is_listening(),
            speech_enabled: runtime.speech_out.is_enabled(),
        }
    }

    pub async fn armed_timers(&self) -> ArmedTimers {
        let runtime = self.runtime.lock().await;
        ArmedTimers {
            exercise: runtime.timers.exercise.is_some(),
            total: runtime.timers.total.is_some(),
            advance: runtime.timers.advance.is_some(),
            recognition_restart: runtime.timers.restart.is_some(),
        }
    }

    /// Exercise ticker tasks that have not yet wound down.
    pub fn live_exercise_tickers(&self) -> usize {
        self.live_exercise_tickers.load(Ordering::SeqCst)
    }

    pub async fn permission_snapshot(&self) -> PermissionSnapshot {
        self.permission_manager.lock().await.snapshot()
    }

    pub async fn load_settings(&self) -> WorkoutSettings {
        self.settings.lock().await.clone()
    }

    pub async fn update_settings(
        &self,
        mut settings: WorkoutSettings,
    ) -> Result<WorkoutSettings, ControllerError> {
        settings.clamp();
        if let Some(store) = &self.settings_store {
            store.save(&settings)?;
        }
        *self.settings.lock().await = settings.clone();
        let mut runtime = self.runtime.lock().await;
        runtime.speech_out.configure(&settings);
        runtime.speech_out.set_enabled(settings.speech_enabled);
        Ok(settings)
    }

    /// Opens the workout screen: resolves microphone access once, greets the
    /// user and shows the current queue.
    pub async fn enter_workout_mode(self: &Arc<Self>) -> PermissionSnapshot {
        let permission = self
            .permission_manager
            .lock()
            .await
            .acquire(self.microphone.as_ref());
        let queued = self.queue.lock().await.snapshot();

        let mut runtime = self.runtime.lock().await;
        runtime
            .speech_in
            .set_permitted(permission.microphone == MicrophonePermission::Granted);
        if runtime.speech_in.available() {
            self.emit(WorkoutEvent::VoiceStatus(VoiceStatus::new(
                VoiceIndicator::Ready,
                "Voice Ready",
            )));
            runtime.speech_out.speak(WELCOME_PHRASE, Prosody::Motivation);
        } else {
            self.emit(WorkoutEvent::VoiceStatus(VoiceStatus::new(
                VoiceIndicator::Error,
                "Voice not available",
            )));
            if !runtime.capability_reported {
                runtime.capability_reported = true;
                let message = permission.message.clone().unwrap_or_else(|| {
                    "Voice commands are not available. You can still use button controls."
                        .to_string()
                });
                self.emit(WorkoutEvent::Toast(Toast::error(message)));
            }
        }

        self.emit(WorkoutEvent::Queue(queue_view(&queued)));
        if !runtime.session.is_active() {
            if let Some(first) = queued.first() {
                self.emit(WorkoutEvent::Exercise(ExerciseView::new(first, 0, queued.len())));
            }
            self.emit(WorkoutEvent::Controls(ControlsView::idle()));
        }
        permission
    }

    pub async fn start_workout(self: &Arc<Self>) -> Result<(), ControllerError> {
        let queue = self.queue.lock().await.snapshot();
        let mut runtime = self.runtime.lock().await;
        if !runtime.session.is_active() {
            // A new session owns the speech channels from a clean slate.
            disarm(&mut runtime.timers.restart);
            runtime.speech_in.stop();
            runtime.speech_out.cancel();
        }
        let result = runtime.session.start(queue);
        self.finish_transition(&mut runtime, result)
    }

    pub async fn pause_workout(self: &Arc<Self>) -> Result<(), ControllerError> {
        let mut runtime = self.runtime.lock().await;
        let result = runtime.session.pause();
        self.finish_transition(&mut runtime, result)
    }

    pub async fn resume_workout(self: &Arc<Self>) -> Result<(), ControllerError> {
        let mut runtime = self.runtime.lock().await;
        let result = runtime.session.resume();
        self.finish_transition(&mut runtime, result)
    }

    /// The pause button: pauses a running workout, resumes a paused one.
    pub async fn toggle_pause(self: &Arc<Self>) -> Result<(), ControllerError> {
        let mut runtime = self.runtime.lock().await;
        let result = if runtime.session.status() == SessionStatus::Paused {
            runtime.session.resume()
        } else {
            runtime.session.pause()
        };
        self.finish_transition(&mut runtime, result)
    }

    pub async fn next_exercise(self: &Arc<Self>) -> Result<(), ControllerError> {
        let mut runtime = self.runtime.lock().await;
        let result = runtime.session.skip();
        self.finish_transition(&mut runtime, result)
    }

    pub async fn repeat_instructions(&self) {
        let preview = self.queue.lock().await.list().first().cloned();
        let runtime = self.runtime.lock().await;
        let text = match runtime.session.current_exercise() {
            Some(current) => instructions_narration(Some(current)),
            None => instructions_narration(preview.as_ref()),
        };
        runtime.speech_out.speak(&text, Prosody::Normal);
    }

    pub async fn report_time_remaining(self: &Arc<Self>) {
        let mut runtime = self.runtime.lock().await;
        let effects = runtime.session.report_time_remaining();
        self.apply_effects(&mut runtime, effects);
    }

    pub async fn show_help(&self) {
        let entries = help_entries()
            .into_iter()
            .map(|(command, description)| HelpEntry {
                command: command.to_string(),
                description: description.to_string(),
            })
            .collect();
        self.emit(WorkoutEvent::Help(entries));
        self.runtime
            .lock()
            .await
            .speech_out
            .speak(HELP_PHRASE, Prosody::Normal);
    }

    /// Abandons the session from any state. Idempotent.
    pub async fn exit_workout(self: &Arc<Self>) {
        let mut runtime = self.runtime.lock().await;
        let effects = runtime.session.exit();
        self.apply_effects(&mut runtime, effects);
        disarm(&mut runtime.timers.restart);
    }

    pub async fn start_new_workout(self: &Arc<Self>) -> PermissionSnapshot {
        self.exit_workout().await;
        self.enter_workout_mode().await
    }

    pub async fn handle_voice_command(self: &Arc<Self>, phrase: &str) -> WorkoutCommand {
        let command = interpret(phrase);
        let echo_ms = self.settings.lock().await.command_echo_ms;
        self.echo_command(phrase, Duration::from_millis(echo_ms));
        info!(phrase, command = ?command, "voice command");

        let result = match command {
            WorkoutCommand::Start => self.start_workout().await,
            WorkoutCommand::Pause => self.pause_workout().await,
            WorkoutCommand::Skip => self.next_exercise().await,
            WorkoutCommand::Resume => self.resume_workout().await,
            WorkoutCommand::RepeatInstructions => {
                self.repeat_instructions().await;
                Ok(())
            }
            WorkoutCommand::TimeRemaining => {
                self.report_time_remaining().await;
                Ok(())
            }
            WorkoutCommand::Help => {
                self.show_help().await;
                Ok(())
            }
            WorkoutCommand::Unrecognized => {
                self.narrate(UNRECOGNIZED_PHRASE, Prosody::Normal).await;
                Ok(())
            }
        };
        if let Err(err) = result {
            debug!(error = %err, "voice command rejected");
        }
        command
    }

    /// Flips narration on or off; turning it off also stops listening.
    pub async fn toggle_speech(self: &Arc<Self>) -> bool {
        let settings = {
            let mut settings = self.settings.lock().await;
            settings.speech_enabled = !settings.speech_enabled;
            settings.clone()
        };
        if let Some(store) = &self.settings_store {
            if let Err(err) = store.save(&settings) {
                warn!(error = %err, "failed to persist speech toggle");
            }
        }

        let enabled = settings.speech_enabled;
        let mut runtime = self.runtime.lock().await;
        runtime.speech_out.set_enabled(enabled);
        if enabled {
            self.emit(WorkoutEvent::VoiceStatus(VoiceStatus::new(
                VoiceIndicator::Ready,
                "Voice Ready",
            )));
            self.emit(WorkoutEvent::Toast(Toast::success("Speech features enabled")));
            runtime
                .speech_out
                .speak("Speech features enabled", Prosody::Normal);
            if Self::recognition_eligible(&runtime) {
                self.start_recognition(&mut runtime);
            }
        } else {
            disarm(&mut runtime.timers.restart);
            runtime.speech_in.stop();
            self.emit(WorkoutEvent::VoiceStatus(VoiceStatus::new(
                VoiceIndicator::Off,
                "Speech disabled",
            )));
            self.emit(WorkoutEvent::Toast(Toast::success("Speech features disabled")));
        }
        info!(enabled, "speech toggled");
        enabled
    }

    /// Manual microphone button. Returns whether recognition is now running.
    pub async fn toggle_microphone(&self) -> bool {
        let mut runtime = self.runtime.lock().await;
        if !runtime.speech_out.is_enabled() {
            self.emit(WorkoutEvent::Toast(Toast::error(
                "Please enable speech features first",
            )));
            return false;
        }
        if !runtime.speech_in.available() {
            self.emit(WorkoutEvent::Toast(Toast::error(
                "Speech recognition not available",
            )));
            return false;
        }
        if runtime.speech_in.is_active() {
            disarm(&mut runtime.timers.restart);
            runtime.speech_in.stop();
            return false;
        }
        match runtime.speech_in.start() {
            Ok(()) => {
                runtime
                    .speech_out
                    .speak("Voice recognition activated", Prosody::Normal);
                true
            }
            Err(err) => {
                warn!(error = %err, "manual recognition start failed");
                self.emit(WorkoutEvent::Toast(Toast::error(
                    "Failed to start voice recognition",
                )));
                false
            }
        }
    }

    pub async fn on_recognition_started(&self) {
        self.runtime.lock().await.speech_in.on_started();
        self.emit(WorkoutEvent::VoiceStatus(VoiceStatus::new(
            VoiceIndicator::Listening,
            "Listening...",
        )));
    }

    pub async fn on_recognition_result(self: &Arc<Self>, raw: &str) -> Option<WorkoutCommand> {
        let phrase = self.runtime.lock().await.speech_in.on_result(raw)?;
        Some(self.handle_voice_command(&phrase).await)
    }

    /// End-of-stream from the recognizer. Restarts once, after a short delay,
    /// if the workout is still running when the delay elapses.
    pub async fn on_recognition_ended(self: &Arc<Self>) {
        let delay = Duration::from_millis(self.settings.lock().await.recognition_restart_delay_ms);
        let mut runtime = self.runtime.lock().await;
        runtime.speech_in.on_ended();
        if Self::recognition_eligible(&runtime) {
            debug!(delay_ms = delay.as_millis() as u64, "recognition ended mid-workout; restarting");
            self.schedule_recognition_restart(&mut runtime, delay);
        } else if runtime.speech_out.is_enabled() {
            self.emit(WorkoutEvent::VoiceStatus(VoiceStatus::new(
                VoiceIndicator::Ready,
                "Voice Ready",
            )));
        }
    }

    pub async fn on_recognition_error(&self, kind: RecognitionErrorKind) {
        let text = self.runtime.lock().await.speech_in.on_error(&kind);
        self.emit(WorkoutEvent::VoiceStatus(VoiceStatus::new(
            VoiceIndicator::Error,
            text,
        )));
        if kind == RecognitionErrorKind::NotAllowed {
            self.emit(WorkoutEvent::Toast(Toast::error(
                "Please allow microphone access for voice commands",
            )));
        }
    }

    pub async fn queue(&self) -> Vec<Exercise> {
        self.queue.lock().await.snapshot()
    }

    pub async fn add_to_queue(&self, exercise: Exercise) -> AddOutcome {
        let name = exercise.name.clone();
        let (outcome, items) = {
            let mut queue = self.queue.lock().await;
            let outcome = queue.add(exercise);
            (outcome, queue_view(queue.list()))
        };

        let runtime = self.runtime.lock().await;
        match outcome {
            AddOutcome::Added => {
                self.emit(WorkoutEvent::Queue(items));
                self.emit(WorkoutEvent::Toast(Toast::success(format!(
                    "{name} added to workout!"
                ))));
                runtime
                    .speech_out
                    .speak(&format!("{name} added to your workout"), Prosody::Normal);
            }
            AddOutcome::AlreadyQueued => {
                self.emit(WorkoutEvent::Toast(Toast::error("Exercise already in workout")));
                runtime
                    .speech_out
                    .speak("This exercise is already in your workout", Prosody::Normal);
            }
        }
        outcome
    }

    pub async fn remove_from_queue(&self, index: usize) -> Result<Exercise, ControllerError> {
        let removed = {
            let mut queue = self.queue.lock().await;
            queue
                .remove(index)
                .map(|removed| (removed, queue.len(), queue_view(queue.list())))
        };
        let (removed, remaining, items) = match removed {
            Ok(row) => row,
            Err(err) => {
                self.emit(WorkoutEvent::Toast(Toast::error(err.to_string())));
                return Err(err.into());
            }
        };

        let mut runtime = self.runtime.lock().await;
        runtime.session.clamp_index(remaining);
        self.emit(WorkoutEvent::Queue(items));
        self.emit(WorkoutEvent::Toast(Toast::success(format!(
            "{} removed from workout",
            removed.name
        ))));
        runtime.speech_out.speak(
            &format!("Removed {} from workout", removed.name),
            Prosody::Normal,
        );
        Ok(removed)
    }

    pub async fn clear_queue(&self) -> ClearOutcome {
        let outcome = self.queue.lock().await.clear(self.confirm.as_ref());
        let mut runtime = self.runtime.lock().await;
        match outcome {
            ClearOutcome::Cleared => {
                runtime.session.clamp_index(0);
                self.emit(WorkoutEvent::Queue(Vec::new()));
                self.emit(WorkoutEvent::Toast(Toast::success("Workout queue cleared")));
                runtime
                    .speech_out
                    .speak("All exercises removed from workout", Prosody::Normal);
            }
            ClearOutcome::AlreadyEmpty => {
                self.emit(WorkoutEvent::Toast(Toast::error(
                    "Workout queue is already empty",
                )));
            }
            ClearOutcome::Declined => debug!("queue clear declined"),
        }
        outcome
    }

    pub async fn save_exercise(&self, exercise: &Exercise) -> bool {
        let saved = self.saved.lock().await.save(exercise);
        if saved {
            self.emit(WorkoutEvent::Toast(Toast::success(format!(
                "{} saved!",
                exercise.name
            ))));
        }
        saved
    }

    pub async fn unsave_exercise(&self, exercise: &Exercise) -> bool {
        let removed = self.saved.lock().await.unsave(exercise);
        if removed {
            self.emit(WorkoutEvent::Toast(Toast::success(format!(
                "{} removed from saved",
                exercise.name
            ))));
        }
        removed
    }

    pub async fn saved_exercises(&self) -> Vec<String> {
        self.saved.lock().await.list().to_vec()
    }

    async fn narrate(&self, text: &str, prosody: Prosody) {
        self.runtime.lock().await.speech_out.speak(text, prosody);
    }

    fn emit(&self, event: WorkoutEvent) {
        self.sink.emit(event);
    }

    fn echo_command(&self, phrase: &str, visible_for: Duration) {
        self.emit(WorkoutEvent::CommandEcho(CommandEcho {
            phrase: phrase.to_string(),
            visible: true,
        }));
        let sink = self.sink.clone();
        let phrase = phrase.to_string();
        tokio::spawn(async move {
            sleep(visible_for).await;
            sink.emit(WorkoutEvent::CommandEcho(CommandEcho {
                phrase,
                visible: false,
            }));
        });
    }

    fn finish_transition(
        self: &Arc<Self>,
        runtime: &mut Runtime,
        result: Result<Vec<SessionEffect>, SessionError>,
    ) -> Result<(), ControllerError> {
        match result {
            Ok(effects) => {
                self.apply_effects(runtime, effects);
                Ok(())
            }
            Err(err) => {
                self.report_rejection(runtime, &err);
                Err(err.into())
            }
        }
    }

    fn report_rejection(&self, runtime: &Runtime, err: &SessionError) {
        debug!(error = %err, status = ?runtime.session.status(), "transition rejected");
        let (narration, toast) = match err {
            SessionError::EmptyQueue => (EMPTY_QUEUE_PHRASE, "Add exercises to start workout"),
            SessionError::AlreadyActive => {
                ("Your workout is already running", "Workout already in progress")
            }
            SessionError::NotRunning => ("No workout is running", "No workout in progress"),
            SessionError::NotPaused => ("The workout is not paused", "Workout is not paused"),
            SessionError::AlreadyPaused => (
                "The workout is already paused. Say resume when ready.",
                "Workout already paused",
            ),
        };
        runtime.speech_out.speak(narration, Prosody::Normal);
        self.emit(WorkoutEvent::Toast(Toast::error(toast)));
    }

    fn apply_effects(self: &Arc<Self>, runtime: &mut Runtime, effects: Vec<SessionEffect>) {
        for effect in effects {
            match effect {
                SessionEffect::Narrate { text, prosody } => {
                    runtime.speech_out.speak(&text, prosody);
                }
                SessionEffect::CancelNarration => runtime.speech_out.cancel(),
                SessionEffect::Emit(event) => self.emit(event),
                SessionEffect::StartRecognition => {
                    if runtime.speech_out.is_enabled() {
                        self.start_recognition(runtime);
                    }
                }
                SessionEffect::StopRecognition => {
                    disarm(&mut runtime.timers.restart);
                    runtime.speech_in.stop();
                }
                SessionEffect::ArmExerciseTimer(ticket) => {
                    let token = rearm(&mut runtime.timers.exercise);
                    self.spawn_ticker(TickKind::Exercise, ticket, token);
                }
                SessionEffect::DisarmExerciseTimer => disarm(&mut runtime.timers.exercise),
                SessionEffect::ArmTotalTimer(ticket) => {
                    let token = rearm(&mut runtime.timers.total);
                    self.spawn_ticker(TickKind::Total, ticket, token);
                }
                SessionEffect::DisarmTotalTimer => disarm(&mut runtime.timers.total),
                SessionEffect::ScheduleAdvance(ticket) => {
                    let token = rearm(&mut runtime.timers.advance);
                    self.spawn_advance(ticket, token);
                }
                SessionEffect::CancelAdvance => disarm(&mut runtime.timers.advance),
            }
        }
    }

    fn recognition_eligible(runtime: &Runtime) -> bool {
        runtime.session.is_running()
            && runtime.speech_out.is_enabled()
            && runtime.speech_in.available()
    }

    /// Best effort: a failure leaves the workout on button control.
    fn start_recognition(&self, runtime: &mut Runtime) {
        match runtime.speech_in.start() {
            Ok(()) => {}
            Err(RecognitionError::Unavailable) => {
                debug!("recognition unavailable; continuing with button control");
            }
            Err(err) => {
                warn!(error = %err, "recognition failed to start");
                self.emit(WorkoutEvent::VoiceStatus(VoiceStatus::new(
                    VoiceIndicator::Error,
                    "Voice error",
                )));
            }
        }
    }

    fn schedule_recognition_restart(self: &Arc<Self>, runtime: &mut Runtime, delay: Duration) {
        let token = rearm(&mut runtime.timers.restart);
        let controller = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = sleep(delay) => {
                    let mut runtime = controller.runtime.lock().await;
                    if token.is_cancelled() {
                        return;
                    }
                    runtime.timers.restart = None;
                    if Self::recognition_eligible(&runtime) && !runtime.speech_in.is_active() {
                        controller.start_recognition(&mut runtime);
                    }
                }
            }
        });
    }

    fn spawn_ticker(self: &Arc<Self>, kind: TickKind, ticket: TimerTicket, token: CancellationToken) {
        let controller = self.clone();
        let live = (kind == TickKind::Exercise)
            .then(|| LiveTicker::enter(&self.live_exercise_tickers));
        tokio::spawn(async move {
            let _live = live;
            let mut ticks = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticks.tick() => controller.deliver_tick(kind, ticket, &token).await,
                }
            }
        });
    }

    async fn deliver_tick(self: &Arc<Self>, kind: TickKind, ticket: TimerTicket, token: &CancellationToken) {
        let mut runtime = self.runtime.lock().await;
        if token.is_cancelled() {
            return;
        }
        let effects = match kind {
            TickKind::Exercise => runtime.session.on_exercise_tick(ticket),
            TickKind::Total => runtime.session.on_total_tick(ticket),
        };
        self.apply_effects(&mut runtime, effects);
    }

    fn spawn_advance(self: &Arc<Self>, ticket: TimerTicket, token: CancellationToken) {
        let controller = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = sleep(ADVANCE_DELAY) => {
                    let mut runtime = controller.runtime.lock().await;
                    if token.is_cancelled() {
                        return;
                    }
                    runtime.timers.advance = None;
                    let effects = runtime.session.on_advance(ticket);
                    controller.apply_effects(&mut runtime, effects);
                }
            }
        });
    }
}
