use super::{
    clock::VectorClock,
    holdback::{DuplicatePolicy, HoldbackBuffer},
    message::{Event, SubmitRequest},
};
use crate::broadcast::{DeliveryLog, Feed, ReplicaId, ReplicaSet};
use crate::common::{Error, Result};

/*
    Causal broadcast delivery. An event from sender s stamped T is
    delivered when T[s] == C[s] + 1 and T[i] <= C[i] for every other i.
    Anything else waits in the holdback buffer, which is drained to a
    fixpoint after every delivery since one delivery can unlock others.

    The processor does no I/O; the caller holds the replica lock around
    each call and performs the fan-out afterwards.
*/

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Receipt {
    /// Delivered, along with `released` events drained from the buffer.
    Delivered { released: usize },
    Buffered,
    /// Discarded as a duplicate by the configured policy.
    Dropped,
}

pub struct CausalProcessor {
    pub id: ReplicaId,
    pub peers: ReplicaSet,
    pub clock: VectorClock,
    pub buffer: HoldbackBuffer,
    pub log: DeliveryLog<Event>,
    pub duplicates: DuplicatePolicy,
}

impl CausalProcessor {
    pub fn new(id: ReplicaId, peers: ReplicaSet, duplicates: DuplicatePolicy) -> Self {
        CausalProcessor {
            id,
            clock: VectorClock::new(peers.len()),
            peers,
            buffer: HoldbackBuffer::new(),
            log: DeliveryLog::new(),
            duplicates,
        }
    }

    /// Stamps a locally originated event and delivers it immediately.
    /// Returns the stamped event for fan-out.
    pub fn submit_local(&mut self, request: SubmitRequest) -> Result<Event> {
        request.validate()?;
        if request.process_id != self.id {
            return Err(Error::NotOrigin {
                origin: request.process_id,
                local: self.id,
            });
        }

        self.clock.increment(self.id);
        let event = request.stamp(self.clock.clone());
        tracing::info!(
            replica = self.id,
            event = %event.event_id,
            clock = %self.clock,
            "delivered local event"
        );
        self.log.append(event.clone());
        Ok(event)
    }

    pub fn can_deliver(&self, event: &Event) -> bool {
        self.clock.admits(event.process_id, &event.timestamp)
    }

    pub fn receive_remote(&mut self, event: Event) -> Result<Receipt> {
        event.validate()?;
        if !self.peers.contains(event.process_id) {
            return Err(Error::UnknownReplica(event.process_id));
        }
        if event.timestamp.len() != self.clock.len() {
            return Err(Error::ClockWidth {
                expected: self.clock.len(),
                got: event.timestamp.len(),
            });
        }

        if self.duplicates.is_duplicate(&event, &self.clock, &self.buffer) {
            tracing::debug!(replica = self.id, event = %event.event_id, "dropped duplicate event");
            return Ok(Receipt::Dropped);
        }

        if !self.can_deliver(&event) {
            tracing::debug!(
                replica = self.id,
                event = %event.event_id,
                stamp = %event.timestamp,
                clock = %self.clock,
                "buffered event"
            );
            self.buffer.insert(event);
            return Ok(Receipt::Buffered);
        }

        self.deliver(event);
        let released = self.drain_buffer();
        Ok(Receipt::Delivered { released })
    }

    /// Delivers buffered events until a full pass makes no progress.
    /// Returns how many were delivered.
    pub fn drain_buffer(&mut self) -> usize {
        let mut released = 0;
        while let Some(event) = self.buffer.take_deliverable(&self.clock) {
            self.deliver(event);
            released += 1;
        }
        released
    }

    pub fn feed(&self) -> Feed {
        self.log.feed()
    }

    fn deliver(&mut self, event: Event) {
        self.clock.increment(event.process_id);
        tracing::info!(
            replica = self.id,
            event = %event.event_id,
            from = event.process_id,
            clock = %self.clock,
            "delivered event"
        );
        self.log.append(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor(id: ReplicaId) -> CausalProcessor {
        CausalProcessor::new(id, ReplicaSet::local(3), DuplicatePolicy::Keep)
    }

    fn event(id: &str, sender: ReplicaId, stamp: &[u64]) -> Event {
        SubmitRequest::post(id, sender, "alice", "hello").stamp(VectorClock::from(stamp.to_vec()))
    }

    fn reply(id: &str, parent: &str, sender: ReplicaId, stamp: &[u64]) -> Event {
        SubmitRequest::reply(id, sender, parent, "bob", "re").stamp(VectorClock::from(stamp.to_vec()))
    }

    #[test]
    fn test_submit_local_stamps_and_delivers() {
        let mut p = processor(0);
        let e1 = p.submit_local(SubmitRequest::post("e1", 0, "alice", "first")).unwrap();

        assert_eq!(e1.timestamp.as_slice(), &[1, 0, 0]);
        assert_eq!(p.clock.as_slice(), &[1, 0, 0]);
        assert_eq!(p.log.posts.len(), 1);
    }

    #[test]
    fn test_local_slot_counts_originated_events() {
        let mut p = processor(2);
        for i in 0..5 {
            let request = if i % 2 == 0 {
                SubmitRequest::post(&format!("e{i}"), 2, "carol", "post")
            } else {
                SubmitRequest::reply(&format!("e{i}"), 2, "e0", "carol", "reply")
            };
            p.submit_local(request).unwrap();
        }
        assert_eq!(p.clock.as_slice(), &[0, 0, 5]);
        assert_eq!(p.log.posts.len(), 3);
        assert_eq!(p.log.replies.len(), 2);
    }

    #[test]
    fn test_submit_local_rejects_foreign_origin_and_bad_input() {
        let mut p = processor(1);
        let err = p.submit_local(SubmitRequest::post("e1", 0, "alice", "x")).unwrap_err();
        assert!(matches!(err, Error::NotOrigin { origin: 0, local: 1 }));

        let err = p.submit_local(SubmitRequest::post("e1", 1, "", "x")).unwrap_err();
        assert!(matches!(err, Error::MalformedEvent(_)));
        assert_eq!(p.clock.as_slice(), &[0, 0, 0]);
    }

    #[test]
    fn test_receive_next_event_delivers() {
        let mut p = processor(1);
        let e1 = event("e1", 0, &[1, 0, 0]);
        assert!(p.can_deliver(&e1));

        let receipt = p.receive_remote(e1).unwrap();
        assert_eq!(receipt, Receipt::Delivered { released: 0 });
        assert_eq!(p.clock.as_slice(), &[1, 0, 0]);
    }

    #[test]
    fn test_delivery_bumps_only_sender_slot() {
        let mut p = processor(2);
        p.receive_remote(event("a1", 0, &[1, 0, 0])).unwrap();
        p.receive_remote(event("b1", 1, &[1, 1, 0])).unwrap();
        let before = p.clock.clone();

        p.receive_remote(event("a2", 0, &[2, 1, 0])).unwrap();
        assert_eq!(p.clock.get(0), before.get(0) + 1);
        assert_eq!(p.clock.get(1), before.get(1));
        assert_eq!(p.clock.get(2), before.get(2));
    }

    #[test]
    fn test_gap_is_buffered_then_drained() {
        let mut p = processor(1);
        let receipt = p.receive_remote(event("e2", 0, &[2, 0, 0])).unwrap();
        assert_eq!(receipt, Receipt::Buffered);
        assert_eq!(p.clock.as_slice(), &[0, 0, 0]);
        assert!(p.log.is_empty());

        let receipt = p.receive_remote(event("e1", 0, &[1, 0, 0])).unwrap();
        assert_eq!(receipt, Receipt::Delivered { released: 1 });
        assert_eq!(p.clock.as_slice(), &[2, 0, 0]);
        assert!(p.buffer.is_empty());

        let ids: Vec<_> = p.log.posts.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e2"]);
    }

    #[test]
    fn test_drain_reaches_fixpoint_across_senders() {
        // Replica 2 receives, in reverse: a reply from 1 that depends on
        // two posts from 0, then the second post, then the first.
        let mut p = processor(2);
        assert_eq!(p.receive_remote(reply("r1", "a2", 1, &[2, 1, 0])).unwrap(), Receipt::Buffered);
        assert_eq!(p.receive_remote(event("a2", 0, &[2, 0, 0])).unwrap(), Receipt::Buffered);

        let receipt = p.receive_remote(event("a1", 0, &[1, 0, 0])).unwrap();
        assert_eq!(receipt, Receipt::Delivered { released: 2 });
        assert_eq!(p.clock.as_slice(), &[2, 1, 0]);

        let posts: Vec<_> = p.log.posts.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(posts, vec!["a1", "a2"]);
        assert_eq!(p.log.replies[0].event_id, "r1");
    }

    #[test]
    fn test_missing_predecessor_stays_buffered() {
        let mut p = processor(2);
        // b1 depends on a1 which never arrives
        p.receive_remote(event("b1", 1, &[1, 1, 0])).unwrap();
        assert_eq!(p.drain_buffer(), 0);
        assert_eq!(p.buffer.len(), 1);
        assert!(p.log.is_empty());
    }

    #[test]
    fn test_duplicate_kept_by_default() {
        let mut p = processor(1);
        p.receive_remote(event("e1", 0, &[1, 0, 0])).unwrap();
        let receipt = p.receive_remote(event("e1", 0, &[1, 0, 0])).unwrap();
        assert_eq!(receipt, Receipt::Buffered);
        assert_eq!(p.log.len(), 1);
        assert_eq!(p.buffer.len(), 1);
    }

    #[test]
    fn test_duplicate_dropped_by_strict_policy() {
        let mut p = CausalProcessor::new(1, ReplicaSet::local(3), DuplicatePolicy::Drop);
        p.receive_remote(event("e1", 0, &[1, 0, 0])).unwrap();
        let receipt = p.receive_remote(event("e1", 0, &[1, 0, 0])).unwrap();
        assert_eq!(receipt, Receipt::Dropped);
        assert!(p.buffer.is_empty());
    }

    #[test]
    fn test_receive_rejects_malformed_events() {
        let mut p = processor(1);
        assert!(matches!(
            p.receive_remote(event("e1", 0, &[1, 0])),
            Err(Error::ClockWidth { expected: 3, got: 2 })
        ));
        assert!(matches!(
            p.receive_remote(event("e1", 5, &[1, 0, 0])),
            Err(Error::UnknownReplica(5))
        ));
        assert!(p.buffer.is_empty());
    }

    #[test]
    fn test_orphan_reply_is_tolerated() {
        let mut p = processor(0);
        // reply from 1 to a post we never saw; its stamp claims nothing from 0
        let receipt = p.receive_remote(reply("r1", "ghost", 1, &[0, 1, 0])).unwrap();
        assert_eq!(receipt, Receipt::Delivered { released: 0 });
        assert_eq!(p.feed().orphans().len(), 1);
    }
}
