use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::message::ToMessage;
use crate::broadcast::ReplicaId;

/*
    Acknowledgment bookkeeping. A message may be delivered once its count
    reaches the full replica count. Counts only grow.

    How a count grows is a policy. `CountEvery` counts every message
    receipt and every ack, duplicates included, so a replica that hears
    the same ack twice counts it twice. `DistinctAckers` counts each
    replica at most once per message.
*/

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckPolicy {
    #[default]
    CountEvery,
    DistinctAckers,
}

#[derive(Debug, Default)]
pub struct AckTable {
    policy: AckPolicy,
    counts: HashMap<String, u64>,
    ackers: HashMap<String, HashSet<ReplicaId>>,
}

impl AckTable {
    pub fn new(policy: AckPolicy) -> Self {
        AckTable {
            policy,
            counts: HashMap::new(),
            ackers: HashMap::new(),
        }
    }

    pub fn policy(&self) -> AckPolicy {
        self.policy
    }

    /// The originator acknowledges its own message.
    pub fn seed(&mut self, msg: &ToMessage) {
        self.record(&msg.msg_id, msg.process_id);
    }

    /// A copy of `msg` was received by `me`.
    pub fn on_message(&mut self, msg: &ToMessage, me: ReplicaId) -> u64 {
        match self.policy {
            AckPolicy::CountEvery => self.bump(&msg.msg_id),
            AckPolicy::DistinctAckers => {
                // the copy itself vouches for the originator; our own ack follows
                self.record(&msg.msg_id, msg.process_id);
                self.record(&msg.msg_id, me)
            }
        }
    }

    /// An ack for `msg` arrived from `from`.
    pub fn on_ack(&mut self, msg: &ToMessage, from: ReplicaId) -> u64 {
        match self.policy {
            AckPolicy::CountEvery => self.bump(&msg.msg_id),
            AckPolicy::DistinctAckers => self.record(&msg.msg_id, from),
        }
    }

    pub fn count(&self, msg_id: &str) -> u64 {
        self.counts.get(msg_id).copied().unwrap_or(0)
    }

    pub fn is_complete(&self, msg_id: &str, n: usize) -> bool {
        self.count(msg_id) >= n as u64
    }

    fn bump(&mut self, msg_id: &str) -> u64 {
        let count = self.counts.entry(msg_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    fn record(&mut self, msg_id: &str, acker: ReplicaId) -> u64 {
        match self.policy {
            AckPolicy::CountEvery => self.bump(msg_id),
            AckPolicy::DistinctAckers => {
                let fresh = self
                    .ackers
                    .entry(msg_id.to_string())
                    .or_default()
                    .insert(acker);
                if fresh {
                    self.bump(msg_id)
                } else {
                    self.count(msg_id)
                }
            }
        }
    }
}

/// Ids already delivered. An id is added at most once and never removed.
#[derive(Debug, Default)]
pub struct ProcessedSet {
    ids: HashSet<String>,
}

impl ProcessedSet {
    pub fn new() -> Self {
        ProcessedSet { ids: HashSet::new() }
    }

    /// Returns false if the id was already processed.
    pub fn mark(&mut self, msg_id: &str) -> bool {
        self.ids.insert(msg_id.to_string())
    }

    pub fn contains(&self, msg_id: &str) -> bool {
        self.ids.contains(msg_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg() -> ToMessage {
        ToMessage::new("a1", 0, "hello", 4)
    }

    #[test]
    fn test_count_every_counts_duplicates() {
        let mut acks = AckTable::new(AckPolicy::CountEvery);
        acks.on_message(&msg(), 1);
        acks.on_ack(&msg(), 2);
        acks.on_ack(&msg(), 2);

        assert_eq!(acks.count("a1"), 3);
        assert!(acks.is_complete("a1", 3));
    }

    #[test]
    fn test_distinct_ackers_ignores_repeats() {
        let mut acks = AckTable::new(AckPolicy::DistinctAckers);
        acks.on_ack(&msg(), 2);
        acks.on_ack(&msg(), 2);
        assert_eq!(acks.count("a1"), 1);

        // receipt counts the originator and ourselves
        acks.on_message(&msg(), 1);
        acks.on_message(&msg(), 1);
        assert_eq!(acks.count("a1"), 3);
        assert!(acks.is_complete("a1", 3));
        assert!(!acks.is_complete("a1", 4));
    }

    #[test]
    fn test_seed_counts_originator_once() {
        let mut acks = AckTable::new(AckPolicy::DistinctAckers);
        acks.seed(&msg());
        acks.on_message(&msg(), 0);
        assert_eq!(acks.count("a1"), 1);
    }

    #[test]
    fn test_unknown_id_has_zero_count() {
        let acks = AckTable::new(AckPolicy::default());
        assert_eq!(acks.count("zz"), 0);
        assert!(!acks.is_complete("zz", 1));
    }

    #[test]
    fn test_processed_set_marks_once() {
        let mut processed = ProcessedSet::new();
        assert!(processed.mark("a1"));
        assert!(!processed.mark("a1"));
        assert!(processed.contains("a1"));
        assert_eq!(processed.len(), 1);
    }
}
