use serde::{Deserialize, Serialize};

use super::{clock::VectorClock, message::Event};

/// Received events whose delivery precondition did not hold at last check.
/// Unbounded: an event whose predecessor never arrives stays forever.
#[derive(Debug, Default)]
pub struct HoldbackBuffer {
    events: Vec<Event>,
}

impl HoldbackBuffer {
    pub fn new() -> Self {
        HoldbackBuffer { events: Vec::new() }
    }

    pub fn insert(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.events.iter().any(|e| e.event_id == event_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Removes and returns the first buffered event the clock admits.
    pub fn take_deliverable(&mut self, clock: &VectorClock) -> Option<Event> {
        let index = self
            .events
            .iter()
            .position(|e| clock.admits(e.process_id, &e.timestamp))?;
        Some(self.events.remove(index))
    }
}

/// What to do with a remote event that was already delivered or is already
/// held back.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// No deduplication: a duplicate fails the precondition and is buffered.
    #[default]
    Keep,
    /// Discard events already covered by the clock or already buffered.
    Drop,
}

impl DuplicatePolicy {
    pub fn is_duplicate(&self, event: &Event, clock: &VectorClock, buffer: &HoldbackBuffer) -> bool {
        match self {
            DuplicatePolicy::Keep => false,
            DuplicatePolicy::Drop => {
                clock.has_seen(event.process_id, &event.timestamp)
                    || buffer.contains(&event.event_id)
            }
        }
    }
}
