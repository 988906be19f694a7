use rand::Rng;

use super::{
    acks::{AckPolicy, AckTable, ProcessedSet},
    message::ToMessage,
    queue::PriorityQueue,
};
use crate::broadcast::{DeliveryLog, Feed, ReplicaId, ReplicaSet};

/*
    Total-order delivery gated on a full acknowledgment quorum.

    Every message carries a timestamp fixed by its origin (the origin's
    random start offset plus one; it never advances). Received messages
    wait in a priority queue. On each tick only the head of the queue is
    looked at: once every replica has acknowledged it, it is delivered and
    popped. A later message is never delivered ahead of the head, even if
    it is fully acknowledged, so a head that never reaches quorum stalls
    the queue for good.
*/

pub struct TotalOrderProcessor {
    pub id: ReplicaId,
    pub peers: ReplicaSet,
    pub initial_offset: u64,
    pub queue: PriorityQueue,
    pub acks: AckTable,
    pub processed: ProcessedSet,
    pub log: DeliveryLog<ToMessage>,
    msg_count: u64,
}

impl TotalOrderProcessor {
    pub fn new(id: ReplicaId, peers: ReplicaSet, initial_offset: u64, policy: AckPolicy) -> Self {
        TotalOrderProcessor {
            id,
            peers,
            initial_offset,
            queue: PriorityQueue::new(),
            acks: AckTable::new(policy),
            processed: ProcessedSet::new(),
            log: DeliveryLog::new(),
            msg_count: 0,
        }
    }

    pub fn random_offset(max: u64) -> u64 {
        rand::thread_rng().gen_range(1..=max.max(1))
    }

    pub fn timestamp(&self) -> u64 {
        self.initial_offset + 1
    }

    /// Creates a message from this replica, acknowledges and enqueues it.
    /// The caller broadcasts the returned message to every peer.
    pub fn originate(&mut self, payload: Option<String>) -> ToMessage {
        self.msg_count += 1;
        let msg_id = format!("{}{}", ReplicaSet::code(self.id), self.msg_count);
        let msg = payload.unwrap_or_else(|| format!("Hello from server {}, message {}", self.id, msg_id));
        let message = ToMessage {
            msg_id,
            process_id: self.id,
            msg,
            timestamp: self.timestamp(),
        };

        self.acks.seed(&message);
        self.queue.push(message.clone());
        tracing::info!(
            replica = self.id,
            msg = %message.msg_id,
            timestamp = message.timestamp,
            "originated message"
        );
        message
    }

    /// Enqueues `msg` unless it is already queued or delivered, and counts
    /// the receipt. The caller then acknowledges `msg` to every peer.
    /// Returns whether the message was newly enqueued.
    pub fn on_receive_message(&mut self, msg: &ToMessage) -> bool {
        let known = self.queue.contains(msg) || self.processed.contains(&msg.msg_id);
        if !known {
            self.queue.push(msg.clone());
        }
        let count = self.acks.on_message(msg, self.id);
        tracing::debug!(
            replica = self.id,
            msg = %msg.msg_id,
            timestamp = msg.timestamp,
            acks = count,
            enqueued = !known,
            "received message"
        );
        !known
    }

    pub fn on_receive_ack(&mut self, msg: &ToMessage, from: ReplicaId) -> u64 {
        let count = self.acks.on_ack(msg, from);
        tracing::debug!(replica = self.id, msg = %msg.msg_id, from, acks = count, "received ack");
        count
    }

    /// One delivery tick. Delivers the head if it has a full quorum.
    pub fn deliver_head(&mut self) -> Option<ToMessage> {
        let head = self.queue.head()?;
        if !self.acks.is_complete(&head.msg_id, self.peers.len()) || self.processed.contains(&head.msg_id) {
            return None;
        }

        let msg = self.queue.pop()?;
        self.processed.mark(&msg.msg_id);
        tracing::info!(
            replica = self.id,
            msg = %msg.msg_id,
            timestamp = msg.timestamp,
            "message {} fully acknowledged: {}",
            msg.msg_id,
            msg.msg
        );
        self.log.append(msg.clone());
        Some(msg)
    }

    pub fn feed(&self) -> Feed {
        self.log.feed()
    }
}
