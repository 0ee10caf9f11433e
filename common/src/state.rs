use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use tracing::info;

/// Outcome of [`AppliedStateStore::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// First value seen for the topic; recorded, nothing to send.
    Initialized,
    Unchanged,
    Changed { previous: i32, current: i32 },
}

impl Evaluation {
    pub fn should_publish(self) -> bool {
        matches!(self, Self::Changed { .. })
    }

    pub fn value_to_publish(self) -> Option<i32> {
        match self {
            Self::Changed { current, .. } => Some(current),
            _ => None,
        }
    }
}

/// Last value applied per target topic.
///
/// Each engine owns its own store; the lock is held only for the map lookup
/// and update.
#[derive(Debug, Default)]
pub struct AppliedStateStore {
    applied: Mutex<HashMap<String, i32>>,
}

impl AppliedStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evaluate(&self, topic: &str, candidate: i32) -> Evaluation {
        let mut applied = self.lock();
        match applied.get(topic).copied() {
            Some(last) if last == candidate => Evaluation::Unchanged,
            Some(previous) => {
                info!("update needed for {topic}, last: {previous}, current: {candidate}");
                applied.insert(topic.to_string(), candidate);
                Evaluation::Changed {
                    previous,
                    current: candidate,
                }
            }
            None => {
                info!("creating state for topic {topic}, value: {candidate}");
                applied.insert(topic.to_string(), candidate);
                Evaluation::Initialized
            }
        }
    }

    /// Records `value` as applied without deciding anything, e.g. after a
    /// value was sent outside of the normal tick.
    pub fn record(&self, topic: &str, value: i32) {
        self.lock().insert(topic.to_string(), value);
    }

    pub fn last_applied(&self, topic: &str) -> Option<i32> {
        self.lock().get(topic).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, i32>> {
        // Entries are plain integers, a panicking holder cannot leave them torn.
        self.applied.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
