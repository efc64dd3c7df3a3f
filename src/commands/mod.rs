//! Maps a recognized phrase to a workout action.
//!
//! Matching is ordered substring search: the first row whose trigger occurs
//! anywhere in the phrase wins, so "please skip this now" is a skip and
//! "stop" pauses rather than exits.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum WorkoutCommand {
    Start,
    Pause,
    Skip,
    RepeatInstructions,
    TimeRemaining,
    Help,
    Resume,
    Unrecognized,
}

pub const COMMAND_TABLE: &[(&[&str], WorkoutCommand)] = &[
    (&["start workout", "begin", "go"], WorkoutCommand::Start),
    (&["pause", "stop", "wait"], WorkoutCommand::Pause),
    (&["next", "skip"], WorkoutCommand::Skip),
    (&["repeat", "again", "instructions"], WorkoutCommand::RepeatInstructions),
    (&["time", "remaining", "left"], WorkoutCommand::TimeRemaining),
    (&["help", "commands"], WorkoutCommand::Help),
    (&["resume", "continue"], WorkoutCommand::Resume),
];

pub const HELP_PHRASE: &str =
    "Available commands: Start workout, Pause, Next exercise, Repeat instructions, Time remaining, Help";
pub const UNRECOGNIZED_PHRASE: &str = "Command not recognized. Say help for available commands.";

/// Expects an already-normalized (lowercase) phrase.
pub fn interpret(phrase: &str) -> WorkoutCommand {
    COMMAND_TABLE
        .iter()
        .find(|(triggers, _)| triggers.iter().any(|trigger| phrase.contains(trigger)))
        .map(|(_, command)| *command)
        .unwrap_or(WorkoutCommand::Unrecognized)
}

/// Help entries shown alongside the narrated command list.
pub fn help_entries() -> Vec<(&'static str, &'static str)> {
    vec![
        ("Start workout", "Begin the queued workout"),
        ("Pause", "Pause the current exercise"),
        ("Resume", "Continue after a pause"),
        ("Next exercise", "Skip to the next exercise"),
        ("Repeat instructions", "Hear all steps again"),
        ("Time remaining", "Hear the countdown"),
        ("Help", "List available commands"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_matches_inside_longer_phrases() {
        assert_eq!(interpret("please skip this now"), WorkoutCommand::Skip);
        assert_eq!(interpret("let's pause for a sec"), WorkoutCommand::Pause);
        assert_eq!(interpret("how much time is left"), WorkoutCommand::TimeRemaining);
        assert_eq!(interpret("say the instructions"), WorkoutCommand::RepeatInstructions);
    }

    #[test]
    fn unknown_phrase_is_unrecognized() {
        assert_eq!(interpret("banana"), WorkoutCommand::Unrecognized);
        assert_eq!(interpret(""), WorkoutCommand::Unrecognized);
    }

    #[test]
    fn table_order_decides_overlaps() {
        assert_eq!(interpret("stop"), WorkoutCommand::Pause);
        // "go" is a start trigger and is checked before "continue".
        assert_eq!(interpret("go on and continue"), WorkoutCommand::Start);
        assert_eq!(interpret("continue"), WorkoutCommand::Resume);
        // "next" outranks "time" because skip precedes time remaining.
        assert_eq!(interpret("next time"), WorkoutCommand::Skip);
        assert_eq!(interpret("show commands"), WorkoutCommand::Help);
    }
}
