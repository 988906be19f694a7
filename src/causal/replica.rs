use tokio::sync::Mutex;

use super::{
    clock::VectorClock,
    message::{Event, SubmitRequest},
    processor::{CausalProcessor, Receipt},
};
use crate::broadcast::{Feed, ReplicaId, ReplicaSet};
use crate::common::Result;
use crate::network::{Envelope, Handler, Outbox, Reply, Transport};

/// A causal-broadcast replica: the processor behind one lock, plus the
/// outbox its fan-out goes through once the lock is released.
pub struct CausalNode<T> {
    pub peers: ReplicaSet,
    state: Mutex<CausalProcessor>,
    outbox: Outbox<T>,
}

impl<T: Transport> CausalNode<T> {
    pub fn new(processor: CausalProcessor, outbox: Outbox<T>) -> Self {
        CausalNode {
            peers: processor.peers.clone(),
            state: Mutex::new(processor),
            outbox,
        }
    }

    pub fn id(&self) -> ReplicaId {
        self.outbox.me
    }

    pub async fn submit_local(&self, request: SubmitRequest) -> Result<Event> {
        let event = self.state.lock().await.submit_local(request)?;

        let share = Envelope::Share {
            from: self.id(),
            event: event.clone(),
        };
        self.outbox.broadcast(self.peers.others(self.id()), &share);
        Ok(event)
    }

    pub async fn receive_remote(&self, event: Event) -> Result<Receipt> {
        self.state.lock().await.receive_remote(event)
    }

    pub async fn feed(&self) -> Feed {
        self.state.lock().await.feed()
    }

    pub async fn clock(&self) -> VectorClock {
        self.state.lock().await.clock.clone()
    }

    pub async fn buffered(&self) -> usize {
        self.state.lock().await.buffer.len()
    }
}

impl<T: Transport> Handler for CausalNode<T> {
    async fn handle(&self, envelope: Envelope) -> Reply {
        match envelope {
            Envelope::Submit { request } => match self.submit_local(request).await {
                Ok(event) => Reply::Submitted { event },
                Err(err) => Reply::rejected(err),
            },
            Envelope::Share { from, event } => {
                tracing::debug!(replica = self.id(), from, event = %event.event_id, "share received");
                match self.receive_remote(event).await {
                    Ok(Receipt::Delivered { released }) => Reply::Delivered { released },
                    Ok(Receipt::Buffered) => Reply::Buffered,
                    Ok(Receipt::Dropped) => Reply::Dropped,
                    Err(err) => Reply::rejected(err),
                }
            }
            Envelope::Feed => Reply::Feed {
                feed: self.feed().await,
            },
            other => Reply::rejected(format!("causal replica cannot handle {other:?}")),
        }
    }
}
