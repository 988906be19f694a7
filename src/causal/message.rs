use serde::{Deserialize, Serialize};

use super::clock::VectorClock;
use crate::broadcast::{FeedItem, ReplicaId, Threaded};
use crate::common::{Error, Result};

/*
    An event is stamped once by its origin with a snapshot of the origin's
    vector clock and is never modified afterwards. Whether it is a post or
    a reply is fixed by `parent_id` at creation.
*/

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_id: String,
    pub process_id: ReplicaId,
    #[serde(rename = "timeStamp")]
    pub timestamp: VectorClock,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub author: String,
    pub content: String,
}

/// An application post as submitted to its origin replica, before stamping.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub event_id: String,
    pub process_id: ReplicaId,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub author: String,
    pub content: String,
}

impl SubmitRequest {
    pub fn post(event_id: &str, process_id: ReplicaId, author: &str, content: &str) -> Self {
        SubmitRequest {
            event_id: event_id.to_string(),
            process_id,
            parent_id: None,
            author: author.to_string(),
            content: content.to_string(),
        }
    }

    pub fn reply(
        event_id: &str,
        process_id: ReplicaId,
        parent_id: &str,
        author: &str,
        content: &str,
    ) -> Self {
        SubmitRequest {
            parent_id: Some(parent_id.to_string()),
            ..Self::post(event_id, process_id, author, content)
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_fields(&self.event_id, &self.author, &self.content)
    }

    pub fn stamp(self, timestamp: VectorClock) -> Event {
        Event {
            event_id: self.event_id,
            process_id: self.process_id,
            timestamp,
            parent_id: self.parent_id,
            author: self.author,
            content: self.content,
        }
    }
}

impl Event {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        check_fields(&self.event_id, &self.author, &self.content)
    }
}

fn check_fields(event_id: &str, author: &str, content: &str) -> Result<()> {
    if event_id.trim().is_empty() {
        return Err(Error::MalformedEvent("missing eventId".to_string()));
    }
    if author.trim().is_empty() {
        return Err(Error::MalformedEvent("missing author".to_string()));
    }
    if content.is_empty() {
        return Err(Error::MalformedEvent("missing content".to_string()));
    }
    Ok(())
}

impl Threaded for Event {
    fn id(&self) -> &str {
        &self.event_id
    }

    fn parent(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    fn to_item(&self) -> FeedItem {
        FeedItem {
            id: self.event_id.clone(),
            author: self.author.clone(),
            content: self.content.clone(),
            parent_id: self.parent_id.clone(),
            stamp: self.timestamp.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let event = SubmitRequest::reply("e2", 1, "e1", "bob", "hi").stamp(VectorClock::from(vec![1, 1, 0]));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventId"], "e2");
        assert_eq!(json["processId"], 1);
        assert_eq!(json["timeStamp"], serde_json::json!([1, 1, 0]));
        assert_eq!(json["parentId"], "e1");

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
        assert!(back.is_reply());
    }

    #[test]
    fn test_missing_parent_is_a_post() {
        let json = r#"{"eventId":"e1","processId":0,"timeStamp":[1,0,0],"author":"a","content":"c"}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert!(!event.is_reply());
    }

    #[test]
    fn test_validate_rejects_missing_author() {
        let request = SubmitRequest::post("e1", 0, " ", "hello");
        assert!(matches!(request.validate(), Err(Error::MalformedEvent(_))));
    }
}
