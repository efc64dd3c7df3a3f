use clap::{Parser, Subcommand};
use repvoice_core_lib::{
    console::{
        is_affirmative, ConsoleMicrophone, ConsoleRecognizer, ConsoleSink, ConsoleSynthesizer,
        FixedConfirm, PreparedAnswer, RecognizerSignal, StdinConfirm,
    },
    exercise::{Catalog, CatalogFilter, SortOrder},
    queue::{ClearOutcome, ConfirmPrompt, CLEAR_QUESTION},
    speech::SpeechRecognizer,
    Backends, WorkoutController,
};
use std::sync::Arc;
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::mpsc::{unbounded_channel, UnboundedReceiver},
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Voice-guided workout runner for the terminal.
#[derive(Parser)]
#[command(name = "repvoice", version, about)]
struct Cli {
    /// Print display events as JSON lines instead of text.
    #[arg(long, global = true)]
    json: bool,

    /// Run with button control only.
    #[arg(long, global = true)]
    no_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Search the exercise catalog.
    Catalog {
        #[arg(short, long)]
        search: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long)]
        muscle: Option<String>,
        /// Sort Z to A.
        #[arg(long)]
        desc: bool,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Print the primary muscle groups instead of exercises.
        #[arg(long)]
        list_muscles: bool,
    },
    /// Inspect or edit the saved workout queue.
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Interactive workout. Typed phrases are voice commands; `:` lines are buttons.
    Workout,
}

#[derive(Subcommand)]
enum QueueAction {
    List,
    Add { exercise: String },
    /// Remove by 1-based position.
    Remove { number: usize },
    Clear {
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("repvoice_core_lib=warn,repvoice_core=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Cli::parse()).await {
        eprintln!("repvoice failed: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let answers = Arc::new(PreparedAnswer::default());
    let confirm: Arc<dyn ConfirmPrompt> = match &cli.command {
        Some(Command::Queue {
            action: QueueAction::Clear { yes: true },
        }) => Arc::new(FixedConfirm(true)),
        Some(Command::Queue { .. }) => Arc::new(StdinConfirm),
        Some(Command::Workout) | None => answers.clone(),
        Some(Command::Catalog { .. }) => Arc::new(FixedConfirm(false)),
    };
    let (signal_tx, signals) = unbounded_channel();
    let recognizer = Arc::new(ConsoleRecognizer::new(signal_tx));
    let backends = Backends {
        synthesizer: Some(Arc::new(ConsoleSynthesizer)),
        recognizer: (!cli.no_voice).then(|| recognizer.clone() as Arc<dyn SpeechRecognizer>),
        microphone: Arc::new(ConsoleMicrophone {
            available: !cli.no_voice,
        }),
        confirm,
        sink: Arc::new(ConsoleSink::new(cli.json)),
    };
    let controller = WorkoutController::from_environment(backends).map_err(|err| err.to_string())?;

    match cli.command.unwrap_or(Command::Workout) {
        Command::Catalog {
            search,
            category,
            muscle,
            desc,
            limit,
            list_muscles,
        } => {
            let catalog = load_catalog(&controller).await?;
            if list_muscles {
                for muscle in catalog.muscles() {
                    println!("{muscle}");
                }
                return Ok(());
            }
            let filter = CatalogFilter {
                search,
                category,
                muscle,
                sort: if desc { SortOrder::Desc } else { SortOrder::Asc },
            };
            let rows = catalog.filter(&filter);
            for exercise in rows.iter().take(limit) {
                println!(
                    "{:<40} {:<14} {}",
                    exercise.identifier(),
                    exercise.category.as_deref().unwrap_or("-"),
                    exercise.primary_muscles.join(", ")
                );
            }
            println!("{} of {} exercises", rows.len().min(limit), rows.len());
        }
        Command::Queue { action } => match action {
            QueueAction::List => {
                for (index, exercise) in controller.queue().await.iter().enumerate() {
                    println!("{}. {}", index + 1, exercise.name);
                }
            }
            QueueAction::Add { exercise } => {
                let catalog = load_catalog(&controller).await?;
                let found = catalog
                    .find_by_identifier(&exercise)
                    .cloned()
                    .ok_or_else(|| format!("no exercise named {exercise}"))?;
                controller.add_to_queue(found).await;
            }
            QueueAction::Remove { number } => {
                controller
                    .remove_from_queue(queue_index(number)?)
                    .await
                    .map_err(|err| err.to_string())?;
            }
            QueueAction::Clear { .. } => {
                if controller.clear_queue().await == ClearOutcome::Declined {
                    println!("queue left unchanged");
                }
            }
        },
        Command::Workout => run_workout(controller, recognizer, answers, signals).await?,
    }
    Ok(())
}

/// Converts a 1-based queue position from the command line.
fn queue_index(number: usize) -> Result<usize, String> {
    number
        .checked_sub(1)
        .ok_or_else(|| "queue positions start at 1".to_string())
}

async fn load_catalog(controller: &WorkoutController) -> Result<Catalog, String> {
    let url = controller.load_settings().await.catalog_url;
    tokio::task::spawn_blocking(move || Catalog::fetch(&url))
        .await
        .map_err(|err| format!("catalog task failed: {err}"))?
        .map_err(|err| err.to_string())
}

const KEYBOARD_HELP: &str = "buttons: :start :pause :next :repeat :time :help :speech :mic :exit :new \
:add <exercise> :remove <n> :clear :queue :quit\nanything else is heard as a voice command";

async fn run_workout(
    controller: Arc<WorkoutController>,
    recognizer: Arc<ConsoleRecognizer>,
    answers: Arc<PreparedAnswer>,
    mut signals: UnboundedReceiver<RecognizerSignal>,
) -> Result<(), String> {
    let mut catalog = None;
    controller.enter_workout_mode().await;
    println!("{KEYBOARD_HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(signal) = signals.recv() => match signal {
                RecognizerSignal::Started => controller.on_recognition_started().await,
                RecognizerSignal::Ended => controller.on_recognition_ended().await,
            },
            line = lines.next_line() => {
                let Some(line) = line.map_err(|err| format!("failed to read input: {err}"))? else {
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == ":clear" {
                    clear_with_confirmation(&controller, &answers, &mut lines).await?;
                } else if let Some(button) = line.strip_prefix(':') {
                    if !press(&controller, &mut catalog, button).await {
                        break;
                    }
                } else if recognizer.is_active() {
                    controller.on_recognition_result(line).await;
                } else {
                    println!("   (microphone is off; use :mic or :start)");
                }
            }
        }
    }
    controller.exit_workout().await;
    Ok(())
}

/// Asks on the shared line reader, then clears with that answer.
async fn clear_with_confirmation(
    controller: &WorkoutController,
    answers: &PreparedAnswer,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<(), String> {
    if !controller.queue().await.is_empty() {
        println!("   {CLEAR_QUESTION} [y/N]");
        let reply = lines
            .next_line()
            .await
            .map_err(|err| format!("failed to read input: {err}"))?
            .unwrap_or_default();
        answers.set(is_affirmative(&reply));
    }
    if controller.clear_queue().await == ClearOutcome::Declined {
        println!("   queue left unchanged");
    }
    Ok(())
}

/// Returns false when the user quits.
async fn press(
    controller: &Arc<WorkoutController>,
    catalog: &mut Option<Catalog>,
    button: &str,
) -> bool {
    let (name, argument) = button
        .split_once(' ')
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((button, ""));
    // Rejected transitions are already reported through toasts.
    let _ = match name {
        "start" => controller.start_workout().await,
        "pause" => controller.toggle_pause().await,
        "next" => controller.next_exercise().await,
        "repeat" => {
            controller.repeat_instructions().await;
            Ok(())
        }
        "time" => {
            controller.report_time_remaining().await;
            Ok(())
        }
        "help" => {
            controller.show_help().await;
            Ok(())
        }
        "speech" => {
            controller.toggle_speech().await;
            Ok(())
        }
        "mic" => {
            controller.toggle_microphone().await;
            Ok(())
        }
        "exit" => {
            controller.exit_workout().await;
            Ok(())
        }
        "new" => {
            controller.start_new_workout().await;
            Ok(())
        }
        "queue" => {
            for (index, exercise) in controller.queue().await.iter().enumerate() {
                println!("   {}. {}", index + 1, exercise.name);
            }
            Ok(())
        }
        "add" => {
            if catalog.is_none() {
                match load_catalog(controller).await {
                    Ok(loaded) => *catalog = Some(loaded),
                    Err(err) => warn!(error = %err, "catalog unavailable"),
                }
            }
            match catalog.as_ref().and_then(|c| c.find_by_identifier(argument)) {
                Some(exercise) => {
                    controller.add_to_queue(exercise.clone()).await;
                }
                None => println!("   no exercise named \"{argument}\""),
            }
            Ok(())
        }
        "remove" => match argument
            .parse::<usize>()
            .map_err(|err| err.to_string())
            .and_then(queue_index)
        {
            Ok(index) => controller.remove_from_queue(index).await.map(|_| ()),
            Err(_) => {
                println!("   usage: :remove <position>");
                Ok(())
            }
        },
        "quit" => return false,
        _ => {
            println!("{KEYBOARD_HELP}");
            Ok(())
        }
    };
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_positions_are_one_based() {
        assert_eq!(queue_index(1), Ok(0));
        assert_eq!(queue_index(3), Ok(2));
        assert!(queue_index(0).is_err());
    }

    #[test]
    fn remove_zero_parses_but_maps_to_no_index() {
        let cli = Cli::try_parse_from(["repvoice", "queue", "remove", "0"]).expect("cli should parse");
        let Some(Command::Queue {
            action: QueueAction::Remove { number },
        }) = cli.command
        else {
            panic!("expected queue remove");
        };
        assert!(queue_index(number).is_err());
    }

    #[test]
    fn catalog_accepts_muscle_listing() {
        let cli = Cli::try_parse_from(["repvoice", "catalog", "--list-muscles"]).expect("cli should parse");
        assert!(matches!(
            cli.command,
            Some(Command::Catalog {
                list_muscles: true,
                ..
            })
        ));
    }
}
