pub mod channel;
pub mod node;
pub mod outbox;
pub mod tcp;

pub use channel::*;
pub use node::*;
pub use outbox::*;
pub use tcp::*;

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::broadcast::{Feed, ReplicaId};
use crate::causal::{Event, SubmitRequest};
use crate::common::{Error, Result};
use crate::total::ToMessage;

/*
    Communication is point-to-point request/response and best effort: a
    send may fail, time out, or arrive after later sends. Nothing here
    retries. Remote envelopes name the replica that sent them.
*/

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Envelope {
    /// Application post submitted to its origin replica.
    Submit { request: SubmitRequest },
    /// A stamped causal event fanned out by its origin.
    Share { from: ReplicaId, event: Event },
    /// A total-order message from its origin.
    Message { from: ReplicaId, message: ToMessage },
    /// Acknowledgment of a total-order message, gossiped to every peer.
    Ack { from: ReplicaId, message: ToMessage },
    /// Ask a total-order replica to originate a message.
    Originate { payload: Option<String> },
    Feed,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply {
    Submitted { event: Event },
    Delivered { released: usize },
    Buffered,
    Dropped,
    Stored { enqueued: bool },
    AckCounted { count: u64 },
    Originated { message: ToMessage },
    Feed { feed: Feed },
    Rejected { reason: String },
}

impl Reply {
    pub fn rejected(err: impl std::fmt::Display) -> Self {
        Reply::Rejected {
            reason: err.to_string(),
        }
    }
}

/// An inbound envelope together with the slot for its reply.
#[derive(Debug)]
pub struct Request {
    pub envelope: Envelope,
    pub reply: oneshot::Sender<Reply>,
}

pub type Inbound = mpsc::Receiver<Request>;

pub trait Transport: Send + Sync + 'static {
    fn send(&self, to: ReplicaId, envelope: Envelope) -> impl Future<Output = Result<Reply>> + Send;
}

/// A single send bounded by `timeout`.
pub async fn request<T: Transport>(
    transport: &T,
    to: ReplicaId,
    envelope: Envelope,
    timeout: Duration,
) -> Result<Reply> {
    match tokio::time::timeout(timeout, transport.send(to, envelope)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(to)),
    }
}
