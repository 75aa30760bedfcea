use std::sync::Arc;

use crate::core::SecurityEvent;

/// The event collection a view is showing. Updates swap in a whole new
/// collection, so a snapshot taken earlier never changes under its reader.
#[derive(Debug, Clone)]
pub struct EventBoard {
    events: Arc<[SecurityEvent]>,
}

impl EventBoard {
    pub fn new(events: Vec<SecurityEvent>) -> Self {
        Self {
            events: events.into(),
        }
    }

    pub fn events(&self) -> &[SecurityEvent] {
        &self.events
    }

    pub fn snapshot(&self) -> Arc<[SecurityEvent]> {
        Arc::clone(&self.events)
    }

    pub fn get(&self, id: &str) -> Option<&SecurityEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn replace_all(&mut self, events: Vec<SecurityEvent>) {
        self.events = events.into();
    }

    /// Replaces the event with the same id. Returns `false` when the board
    /// does not hold it, in which case nothing changes.
    pub fn apply(&mut self, updated: SecurityEvent) -> bool {
        if self.get(&updated.id).is_none() {
            return false;
        }
        let next: Vec<SecurityEvent> = self
            .events
            .iter()
            .map(|e| {
                if e.id == updated.id {
                    updated.clone()
                } else {
                    e.clone()
                }
            })
            .collect();
        self.events = next.into();
        true
    }
}
