use std::fmt;

use serde::{Deserialize, Serialize};

use crate::broadcast::ReplicaId;

/// One counter per replica. Slot `i` counts the events originated by
/// replica `i` that the owner has delivered.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorClock(Vec<u64>);

impl VectorClock {
    pub fn new(n: usize) -> Self {
        VectorClock(vec![0; n])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, slot: ReplicaId) -> u64 {
        self.0.get(slot).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, slot: ReplicaId) {
        if let Some(count) = self.0.get_mut(slot) {
            *count += 1;
        }
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    /// Causal delivery precondition for an event from `sender` stamped
    /// with `stamp`: it is the next event from the sender, and the sender
    /// had seen nothing from any other replica that we have not.
    pub fn admits(&self, sender: ReplicaId, stamp: &VectorClock) -> bool {
        if stamp.len() != self.len() || sender >= self.len() {
            return false;
        }

        if stamp.get(sender) != self.get(sender) + 1 {
            return false;
        }

        self.0
            .iter()
            .zip(stamp.0.iter())
            .enumerate()
            .all(|(i, (local, theirs))| i == sender || theirs <= local)
    }

    /// Whether the event `stamp[sender]` from `sender` is already delivered.
    pub fn has_seen(&self, sender: ReplicaId, stamp: &VectorClock) -> bool {
        stamp.get(sender) <= self.get(sender)
    }
}

impl From<Vec<u64>> for VectorClock {
    fn from(slots: Vec<u64>) -> Self {
        VectorClock(slots)
    }
}

impl fmt::Display for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, count) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{count}")?;
        }
        write!(f, "]")
    }
}
