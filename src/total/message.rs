use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::broadcast::{FeedItem, ReplicaId, Threaded};

/*
    A message is stamped once by its origin with a scalar timestamp and
    never re-stamped by recipients. Recipients order messages by that
    timestamp alone, so ties need a tiebreak every replica agrees on:
    origin, then id, then payload.
*/

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ToMessage {
    #[serde(rename = "MsgId")]
    pub msg_id: String,
    #[serde(rename = "ProcessId")]
    pub process_id: ReplicaId,
    #[serde(rename = "Msg")]
    pub msg: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: u64,
}

impl ToMessage {
    pub fn new(msg_id: &str, process_id: ReplicaId, msg: &str, timestamp: u64) -> Self {
        ToMessage {
            msg_id: msg_id.to_string(),
            process_id,
            msg: msg.to_string(),
            timestamp,
        }
    }

    pub fn same_message(&self, other: &ToMessage) -> bool {
        self.msg_id == other.msg_id && self.process_id == other.process_id
    }
}

impl Ord for ToMessage {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then(self.process_id.cmp(&other.process_id))
            // shorter ids first so that a2 sorts before a10
            .then(self.msg_id.len().cmp(&other.msg_id.len()))
            .then(self.msg_id.cmp(&other.msg_id))
            .then(self.msg.cmp(&other.msg))
    }
}

impl PartialOrd for ToMessage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Threaded for ToMessage {
    fn id(&self) -> &str {
        &self.msg_id
    }

    fn parent(&self) -> Option<&str> {
        None
    }

    fn to_item(&self) -> FeedItem {
        FeedItem {
            id: self.msg_id.clone(),
            author: format!("process-{}", self.process_id),
            content: self.msg.clone(),
            parent_id: None,
            stamp: self.timestamp.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let msg = ToMessage::new("a1", 0, "hello", 4);
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"MsgId":"a1","ProcessId":0,"Msg":"hello","Timestamp":4}"#);
    }

    #[test]
    fn test_orders_by_timestamp_first() {
        let early = ToMessage::new("c1", 2, "z", 3);
        let late = ToMessage::new("a1", 0, "a", 5);
        assert!(early < late);
    }

    #[test]
    fn test_tiebreak_is_deterministic() {
        let a = ToMessage::new("a1", 0, "x", 4);
        let b = ToMessage::new("b1", 1, "x", 4);
        assert!(a < b);

        let a2 = ToMessage::new("a2", 0, "x", 4);
        let a10 = ToMessage::new("a10", 0, "x", 4);
        assert!(a2 < a10);
    }
}
