use crate::{exercise::Exercise, store::LocalStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const QUEUE_KEY: &str = "workoutQueue";
pub const SAVED_KEY: &str = "savedExercises";
pub const CLEAR_QUESTION: &str = "Are you sure you want to clear all exercises from your workout?";

/// Asks the user to confirm a destructive action.
pub trait ConfirmPrompt: Send + Sync {
    fn confirm(&self, message: &str) -> bool;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AddOutcome {
    Added,
    AlreadyQueued,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ClearOutcome {
    Cleared,
    AlreadyEmpty,
    Declined,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue index {index} is out of range for {len} queued exercises")]
    IndexOutOfRange { index: usize, len: usize },
}

/// The user's ordered exercise selection. Lives independently of any session.
#[derive(Debug, Clone, Default)]
pub struct WorkoutQueue {
    store: Option<LocalStore>,
    items: Vec<Exercise>,
}

impl WorkoutQueue {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn load(store: LocalStore) -> Self {
        let items = match store.get::<Vec<Exercise>>(QUEUE_KEY) {
            Ok(Some(items)) => items,
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(error = %err, "persisted workout queue unreadable; starting empty");
                Vec::new()
            }
        };
        debug!(count = items.len(), "workout queue loaded");
        Self {
            store: Some(store),
            items,
        }
    }

    pub fn add(&mut self, exercise: Exercise) -> AddOutcome {
        let identifier = exercise.identifier().to_string();
        if self.contains(&identifier) {
            return AddOutcome::AlreadyQueued;
        }
        self.items.push(exercise);
        self.persist();
        AddOutcome::Added
    }

    pub fn remove(&mut self, index: usize) -> Result<Exercise, QueueError> {
        if index >= self.items.len() {
            return Err(QueueError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        let removed = self.items.remove(index);
        self.persist();
        Ok(removed)
    }

    pub fn clear(&mut self, prompt: &dyn ConfirmPrompt) -> ClearOutcome {
        if self.items.is_empty() {
            return ClearOutcome::AlreadyEmpty;
        }
        if !prompt.confirm(CLEAR_QUESTION) {
            return ClearOutcome::Declined;
        }
        self.items.clear();
        self.persist();
        ClearOutcome::Cleared
    }

    pub fn list(&self) -> &[Exercise] {
        &self.items
    }

    pub fn snapshot(&self) -> Vec<Exercise> {
        self.items.clone()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.items
            .iter()
            .any(|queued| queued.identifier() == identifier)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(err) = store.set(QUEUE_KEY, &self.items) {
            warn!(error = %err, "failed to persist workout queue; keeping in-memory copy");
        }
    }
}

/// Favourite exercise identifiers from the browsing view.
#[derive(Debug, Clone, Default)]
pub struct SavedExercises {
    store: Option<LocalStore>,
    ids: Vec<String>,
}

impl SavedExercises {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn load(store: LocalStore) -> Self {
        let ids = store
            .get::<Vec<String>>(SAVED_KEY)
            .unwrap_or_else(|err| {
                warn!(error = %err, "saved exercises unreadable; starting empty");
                None
            })
            .unwrap_or_default();
        Self {
            store: Some(store),
            ids,
        }
    }

    /// Returns false when the exercise was already saved.
    pub fn save(&mut self, exercise: &Exercise) -> bool {
        let id = exercise.identifier();
        if self.is_saved(id) {
            return false;
        }
        self.ids.push(id.to_string());
        self.persist();
        true
    }

    pub fn unsave(&mut self, exercise: &Exercise) -> bool {
        let id = exercise.identifier();
        let before = self.ids.len();
        self.ids.retain(|saved| saved != id);
        let changed = self.ids.len() != before;
        if changed {
            self.persist();
        }
        changed
    }

    pub fn is_saved(&self, identifier: &str) -> bool {
        self.ids.iter().any(|saved| saved == identifier)
    }

    pub fn list(&self) -> &[String] {
        &self.ids
    }

    fn persist(&self) {
        if let Some(store) = &self.store {
            if let Err(err) = store.set(SAVED_KEY, &self.ids) {
                warn!(error = %err, "failed to persist saved exercises");
            }
        }
    }
}
