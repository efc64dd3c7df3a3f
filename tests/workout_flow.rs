use repvoice_core_lib::{
    display::{EventSink, ToastLevel, VoiceIndicator, WorkoutEvent},
    exercise::Exercise,
    permissions::{MicrophoneAccess, MicrophonePermission},
    queue::{AddOutcome, ClearOutcome, ConfirmPrompt, SavedExercises, WorkoutQueue},
    session::{SessionError, SessionStatus},
    settings::WorkoutSettings,
    speech::{RecognitionError, SpeechRecognizer, SpeechSynthesizer, Utterance},
    state::{ArmedTimers, Backends, ControllerError, WorkoutController},
    WorkoutCommand,
};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::time::sleep;

struct RecordingHost {
    microphone: MicrophonePermission,
    confirm_answer: bool,
    events: Mutex<Vec<WorkoutEvent>>,
    spoken: Mutex<Vec<String>>,
    recognizer_starts: AtomicUsize,
    recognizer_stops: AtomicUsize,
}

impl RecordingHost {
    fn new(microphone: MicrophonePermission) -> Arc<Self> {
        Arc::new(Self {
            microphone,
            confirm_answer: true,
            events: Mutex::new(Vec::new()),
            spoken: Mutex::new(Vec::new()),
            recognizer_starts: AtomicUsize::new(0),
            recognizer_stops: AtomicUsize::new(0),
        })
    }

    fn spoken(&self) -> Vec<String> {
        self.spoken.lock().expect("spoken lock").clone()
    }

    fn said(&self, text: &str) -> bool {
        self.spoken().iter().any(|line| line == text)
    }

    fn last_spoken(&self) -> Option<String> {
        self.spoken().last().cloned()
    }

    fn events(&self) -> Vec<WorkoutEvent> {
        self.events.lock().expect("events lock").clone()
    }

    fn toasts(&self, level: ToastLevel) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                WorkoutEvent::Toast(toast) if toast.level == level => Some(toast.message),
                _ => None,
            })
            .collect()
    }

    fn starts(&self) -> usize {
        self.recognizer_starts.load(Ordering::SeqCst)
    }

    fn stops(&self) -> usize {
        self.recognizer_stops.load(Ordering::SeqCst)
    }
}

impl EventSink for RecordingHost {
    fn emit(&self, event: WorkoutEvent) {
        self.events.lock().expect("events lock").push(event);
    }
}

impl SpeechSynthesizer for RecordingHost {
    fn speak(&self, utterance: &Utterance) {
        self.spoken
            .lock()
            .expect("spoken lock")
            .push(utterance.text.clone());
    }

    fn cancel(&self) {}

    fn is_speaking(&self) -> bool {
        false
    }
}

impl SpeechRecognizer for RecordingHost {
    fn start(&self) -> Result<(), RecognitionError> {
        self.recognizer_starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.recognizer_stops.fetch_add(1, Ordering::SeqCst);
    }
}

impl MicrophoneAccess for RecordingHost {
    fn query(&self) -> MicrophonePermission {
        self.microphone
    }

    fn request(&self) -> bool {
        self.microphone == MicrophonePermission::Granted
    }
}

impl ConfirmPrompt for RecordingHost {
    fn confirm(&self, _question: &str) -> bool {
        self.confirm_answer
    }
}

fn exercise(name: &str) -> Exercise {
    let mut exercise = Exercise::named(name);
    exercise.instructions = vec![format!("Set up for {name}"), "Move with control".to_string()];
    exercise
}

fn controller(host: &Arc<RecordingHost>, names: &[&str]) -> Arc<WorkoutController> {
    let mut queue = WorkoutQueue::in_memory();
    for name in names {
        queue.add(exercise(name));
    }
    WorkoutController::new(
        WorkoutSettings::default(),
        None,
        queue,
        SavedExercises::in_memory(),
        Backends {
            synthesizer: Some(host.clone() as Arc<dyn SpeechSynthesizer>),
            recognizer: Some(host.clone() as Arc<dyn SpeechRecognizer>),
            microphone: host.clone(),
            confirm: host.clone(),
            sink: host.clone(),
        },
    )
}

async fn ready(names: &[&str]) -> (Arc<RecordingHost>, Arc<WorkoutController>) {
    let host = RecordingHost::new(MicrophonePermission::Granted);
    let controller = controller(&host, names);
    controller.enter_workout_mode().await;
    (host, controller)
}

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

#[tokio::test(start_paused = true)]
async fn two_exercise_workout_runs_to_summary() {
    let (host, controller) = ready(&["A", "B"]).await;
    controller.start_workout().await.expect("start should succeed");
    assert_eq!(host.starts(), 1);
    assert_eq!(host.last_spoken().as_deref(), Some("Exercise 1: A. Set up for A"));

    sleep(millis(30_500)).await;
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.completed_count, 1);
    assert_eq!(snapshot.current_index, 0);
    assert_eq!(snapshot.time_remaining_secs, 0);
    assert!(host.said("10 seconds remaining. Keep going!"));
    assert!(host.said("Exercise complete! Great work!"));
    assert!(controller.armed_timers().await.advance);

    sleep(millis(2_000)).await;
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.current_index, 1);
    assert_eq!(snapshot.time_remaining_secs, 30);
    assert_eq!(snapshot.current_exercise.as_deref(), Some("B"));

    sleep(millis(32_000)).await;
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.status, SessionStatus::Completed);
    assert_eq!(snapshot.completed_count, 2);
    assert!((63..=64).contains(&snapshot.elapsed_total_secs));
    assert!(host.said("Workout complete! Excellent job! You crushed it!"));
    assert!(host
        .events()
        .iter()
        .any(|event| matches!(event, WorkoutEvent::Summary(summary) if summary.completed_count == 2)));
    assert!(host.stops() >= 1);
    assert_eq!(controller.armed_timers().await, ArmedTimers::default());
}

#[tokio::test(start_paused = true)]
async fn pause_freezes_both_clocks() {
    let (_host, controller) = ready(&["A"]).await;
    controller.start_workout().await.expect("start should succeed");
    sleep(millis(5_500)).await;
    controller.pause_workout().await.expect("pause should succeed");

    sleep(millis(60_000)).await;
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.status, SessionStatus::Paused);
    assert_eq!(snapshot.time_remaining_secs, 25);
    assert_eq!(snapshot.elapsed_total_secs, 5);
    assert_eq!(controller.live_exercise_tickers(), 0);

    controller.toggle_pause().await.expect("resume should succeed");
    sleep(millis(1_500)).await;
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.status, SessionStatus::Running);
    assert_eq!(snapshot.time_remaining_secs, 24);
    assert_eq!(snapshot.elapsed_total_secs, 6);
}

#[tokio::test(start_paused = true)]
async fn rapid_skips_keep_a_single_ticker() {
    let (_host, controller) = ready(&["A", "B", "C", "D", "E"]).await;
    controller.start_workout().await.expect("start should succeed");
    for _ in 0..3 {
        controller.next_exercise().await.expect("skip should succeed");
    }
    sleep(millis(100)).await;
    assert_eq!(controller.live_exercise_tickers(), 1);
    assert_eq!(controller.snapshot().await.current_index, 3);

    sleep(millis(1_000)).await;
    assert_eq!(controller.snapshot().await.time_remaining_secs, 29);
}

#[tokio::test(start_paused = true)]
async fn exit_during_completion_delay_cancels_the_advance() {
    let (host, controller) = ready(&["A", "B"]).await;
    controller.start_workout().await.expect("start should succeed");
    sleep(millis(30_500)).await;
    controller.exit_workout().await;
    controller.exit_workout().await;

    sleep(millis(5_000)).await;
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.status, SessionStatus::Idle);
    assert_eq!(snapshot.current_index, 0);
    assert_eq!(snapshot.completed_count, 0);
    assert_eq!(controller.armed_timers().await, ArmedTimers::default());
    assert!(!host.spoken().iter().any(|line| line.starts_with("Exercise 2")));
}

#[tokio::test(start_paused = true)]
async fn voice_phrases_drive_the_session() {
    let (host, controller) = ready(&["A", "B"]).await;

    let command = controller.on_recognition_result("Let's GO").await;
    assert_eq!(command, Some(WorkoutCommand::Start));
    assert_eq!(controller.snapshot().await.status, SessionStatus::Running);

    controller.on_recognition_result("  pause please ").await;
    assert_eq!(controller.snapshot().await.status, SessionStatus::Paused);

    controller.on_recognition_result("continue").await;
    assert_eq!(controller.snapshot().await.status, SessionStatus::Running);

    controller.on_recognition_result("please skip this now").await;
    assert_eq!(controller.snapshot().await.current_index, 1);

    let command = controller.on_recognition_result("banana").await;
    assert_eq!(command, Some(WorkoutCommand::Unrecognized));
    assert_eq!(
        host.last_spoken().as_deref(),
        Some("Command not recognized. Say help for available commands.")
    );
    assert_eq!(controller.on_recognition_result("   ").await, None);

    let echo_count = |visible: bool| {
        host.events()
            .iter()
            .filter(|event| matches!(event, WorkoutEvent::CommandEcho(echo) if echo.visible == visible))
            .count()
    };
    assert_eq!(echo_count(true), 5);
    sleep(millis(2_100)).await;
    assert_eq!(echo_count(false), 5);
}

#[tokio::test(start_paused = true)]
async fn invalid_voice_transitions_are_reported_not_applied() {
    let (host, controller) = ready(&["A"]).await;
    controller.handle_voice_command("resume").await;
    controller.handle_voice_command("next").await;
    assert_eq!(controller.snapshot().await.status, SessionStatus::Idle);
    let errors = host.toasts(ToastLevel::Error);
    assert!(errors.contains(&"Workout is not paused".to_string()));
    assert!(errors.contains(&"No workout in progress".to_string()));
}

#[tokio::test(start_paused = true)]
async fn recognition_restarts_only_while_running() {
    let (host, controller) = ready(&["A"]).await;
    controller.start_workout().await.expect("start should succeed");
    controller.on_recognition_started().await;
    assert!(controller.voice_state().await.listening);

    controller.on_recognition_ended().await;
    assert!(controller.armed_timers().await.recognition_restart);
    sleep(millis(150)).await;
    assert_eq!(host.starts(), 2);

    controller.pause_workout().await.expect("pause should succeed");
    controller.on_recognition_ended().await;
    sleep(millis(500)).await;
    assert_eq!(host.starts(), 2);
    assert!(matches!(
        host.events().last(),
        Some(WorkoutEvent::VoiceStatus(status)) if status.indicator == VoiceIndicator::Ready
    ));

    controller.resume_workout().await.expect("resume should succeed");
    controller.on_recognition_ended().await;
    controller.exit_workout().await;
    sleep(millis(500)).await;
    assert_eq!(host.starts(), 2);
}

#[tokio::test(start_paused = true)]
async fn empty_queue_start_is_reported() {
    let (host, controller) = ready(&[]).await;
    let err = controller.start_workout().await.expect_err("empty queue should fail");
    assert!(matches!(err, ControllerError::Session(SessionError::EmptyQueue)));
    assert!(host.said("Please add exercises to your workout first"));
    assert!(host
        .toasts(ToastLevel::Error)
        .contains(&"Add exercises to start workout".to_string()));
    assert_eq!(controller.snapshot().await.status, SessionStatus::Idle);
    assert_eq!(host.starts(), 0);
}

#[tokio::test]
async fn duplicate_add_keeps_one_entry() {
    let (host, controller) = ready(&[]).await;
    assert_eq!(controller.add_to_queue(exercise("Squat")).await, AddOutcome::Added);
    assert_eq!(controller.add_to_queue(exercise("Squat")).await, AddOutcome::AlreadyQueued);
    assert_eq!(controller.queue().await.len(), 1);
    assert!(host.said("Squat added to your workout"));
    assert_eq!(
        host.last_spoken().as_deref(),
        Some("This exercise is already in your workout")
    );
}

#[tokio::test(start_paused = true)]
async fn removing_queued_exercise_does_not_disturb_running_session() {
    let (host, controller) = ready(&["A"]).await;
    controller.start_workout().await.expect("start should succeed");
    let removed = controller.remove_from_queue(0).await.expect("remove should succeed");
    assert_eq!(removed.name, "A");
    assert!(controller.queue().await.is_empty());
    assert!(host.said("Removed A from workout"));

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.status, SessionStatus::Running);
    assert_eq!(snapshot.current_exercise.as_deref(), Some("A"));

    sleep(millis(32_500)).await;
    assert_eq!(controller.snapshot().await.status, SessionStatus::Completed);
    assert!(controller.remove_from_queue(0).await.is_err());
}

#[tokio::test]
async fn clear_queue_follows_confirmation() {
    let (host, controller) = ready(&["A", "B"]).await;
    assert_eq!(controller.clear_queue().await, ClearOutcome::Cleared);
    assert!(host.said("All exercises removed from workout"));
    assert_eq!(controller.clear_queue().await, ClearOutcome::AlreadyEmpty);
}

#[tokio::test(start_paused = true)]
async fn denied_microphone_falls_back_to_buttons() {
    let host = RecordingHost::new(MicrophonePermission::Denied);
    let controller = controller(&host, &["A"]);
    controller.enter_workout_mode().await;
    controller.start_new_workout().await;
    assert_eq!(host.toasts(ToastLevel::Error).len(), 1);

    controller.start_workout().await.expect("buttons still work");
    sleep(millis(1_500)).await;
    assert_eq!(controller.snapshot().await.time_remaining_secs, 29);
    assert_eq!(host.starts(), 0);
    assert!(!controller.voice_state().await.listening);
}

#[tokio::test(start_paused = true)]
async fn disabling_speech_stops_listening_and_narration() {
    let (host, controller) = ready(&["A", "B"]).await;
    controller.start_workout().await.expect("start should succeed");
    assert!(!controller.toggle_speech().await);
    assert!(host.stops() >= 1);
    assert!(!controller.voice_state().await.speech_enabled);

    let spoken_before = host.spoken().len();
    controller.next_exercise().await.expect("skip should succeed");
    assert_eq!(host.spoken().len(), spoken_before);

    controller.on_recognition_ended().await;
    sleep(millis(500)).await;
    assert_eq!(host.starts(), 1);
}

#[tokio::test(start_paused = true)]
async fn repeat_instructions_reads_every_step() {
    let (host, controller) = ready(&["A"]).await;
    controller.repeat_instructions().await;
    assert_eq!(
        host.last_spoken().as_deref(),
        Some("Set up for A. Move with control")
    );

    controller.start_workout().await.expect("start should succeed");
    sleep(millis(4_500)).await;
    controller.report_time_remaining().await;
    assert_eq!(host.last_spoken().as_deref(), Some("26 seconds remaining"));
}

#[tokio::test(start_paused = true)]
async fn stop_while_paused_reports_the_pause_not_a_missing_workout() {
    let (host, controller) = ready(&["A"]).await;
    controller.start_workout().await.expect("start should succeed");
    controller.handle_voice_command("wait").await;
    assert_eq!(controller.snapshot().await.status, SessionStatus::Paused);

    let err = controller.pause_workout().await.expect_err("second pause should fail");
    assert!(matches!(err, ControllerError::Session(SessionError::AlreadyPaused)));
    controller.handle_voice_command("stop").await;

    assert_eq!(controller.snapshot().await.status, SessionStatus::Paused);
    assert_eq!(
        host.last_spoken().as_deref(),
        Some("The workout is already paused. Say resume when ready.")
    );
    let errors = host.toasts(ToastLevel::Error);
    assert_eq!(errors, vec!["Workout already paused", "Workout already paused"]);
    assert!(!host.said("No workout is running"));
}

#[tokio::test(start_paused = true)]
async fn exit_while_paused_leaves_nothing_armed() {
    let (host, controller) = ready(&["A", "B"]).await;
    controller.start_workout().await.expect("start should succeed");
    sleep(millis(3_500)).await;
    controller.pause_workout().await.expect("pause should succeed");
    controller.exit_workout().await;

    sleep(millis(40_000)).await;
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.status, SessionStatus::Idle);
    assert_eq!(snapshot.current_index, 0);
    assert_eq!(snapshot.completed_count, 0);
    assert_eq!(snapshot.elapsed_total_secs, 0);
    assert_eq!(snapshot.time_remaining_secs, 30);
    assert_eq!(controller.armed_timers().await, ArmedTimers::default());
    assert_eq!(controller.live_exercise_tickers(), 0);
    assert!(!host.said("Exercise complete! Great work!"));
    assert!(host.stops() >= 1);
}
