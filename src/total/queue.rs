use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::message::ToMessage;

/// Min-heap of received but undelivered messages, smallest timestamp on top.
#[derive(Debug, Default)]
pub struct PriorityQueue {
    heap: BinaryHeap<Reverse<ToMessage>>,
}

impl PriorityQueue {
    pub fn new() -> Self {
        PriorityQueue {
            heap: BinaryHeap::new(),
        }
    }

    pub fn push(&mut self, msg: ToMessage) {
        self.heap.push(Reverse(msg));
    }

    pub fn head(&self) -> Option<&ToMessage> {
        self.heap.peek().map(|Reverse(msg)| msg)
    }

    pub fn pop(&mut self) -> Option<ToMessage> {
        self.heap.pop().map(|Reverse(msg)| msg)
    }

    /// Whether a message with the same `(MsgId, ProcessId)` is queued.
    pub fn contains(&self, msg: &ToMessage) -> bool {
        self.heap.iter().any(|Reverse(queued)| queued.same_message(msg))
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
