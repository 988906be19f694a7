use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{message::ToMessage, processor::TotalOrderProcessor};
use crate::broadcast::{Feed, ReplicaId, ReplicaSet};
use crate::network::{Envelope, Handler, Outbox, Reply, Shutdown, Transport};

/// A total-order replica: the processor behind one lock, the outbox for
/// message and ack gossip, and the periodic delivery loop.
pub struct TotalOrderNode<T> {
    pub peers: ReplicaSet,
    /// Copies of each originated message sent to every peer.
    pub rounds: u32,
    state: Mutex<TotalOrderProcessor>,
    outbox: Outbox<T>,
}

/// Handle to a running delivery loop.
pub struct DeliveryLoop {
    shutdown: Shutdown,
    handle: JoinHandle<()>,
}

impl DeliveryLoop {
    /// Stops the loop and waits for it to finish its current tick.
    pub async fn stop(self) {
        self.shutdown.trigger();
        if let Err(err) = self.handle.await {
            tracing::warn!("delivery loop ended abnormally: {err}");
        }
    }
}

impl<T: Transport> TotalOrderNode<T> {
    pub fn new(processor: TotalOrderProcessor, outbox: Outbox<T>, rounds: u32) -> Self {
        TotalOrderNode {
            peers: processor.peers.clone(),
            rounds: rounds.max(1),
            state: Mutex::new(processor),
            outbox,
        }
    }

    pub fn id(&self) -> ReplicaId {
        self.outbox.me
    }

    pub async fn originate(&self, payload: Option<String>) -> ToMessage {
        let message = self.state.lock().await.originate(payload);

        let envelope = Envelope::Message {
            from: self.id(),
            message: message.clone(),
        };
        for _ in 0..self.rounds {
            self.outbox.broadcast(self.peers.others(self.id()), &envelope);
        }
        message
    }

    pub async fn on_receive_message(&self, message: ToMessage) -> bool {
        let enqueued = self.state.lock().await.on_receive_message(&message);

        let ack = Envelope::Ack {
            from: self.id(),
            message,
        };
        self.outbox.broadcast(self.peers.others(self.id()), &ack);
        enqueued
    }

    pub async fn on_receive_ack(&self, message: &ToMessage, from: ReplicaId) -> u64 {
        self.state.lock().await.on_receive_ack(message, from)
    }

    /// One tick of the delivery loop.
    pub async fn deliver_head(&self) -> Option<ToMessage> {
        self.state.lock().await.deliver_head()
    }

    pub async fn feed(&self) -> Feed {
        self.state.lock().await.feed()
    }

    pub async fn pending(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    pub async fn ack_count(&self, msg_id: &str) -> u64 {
        self.state.lock().await.acks.count(msg_id)
    }

    /// Starts the periodic delivery loop. It looks at the queue head once
    /// per `period` until stopped.
    pub fn spawn_delivery_loop(self: &Arc<Self>, period: Duration) -> DeliveryLoop {
        let shutdown = Shutdown::new();
        let stopped = shutdown.wait();
        let node = self.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tokio::pin!(stopped);
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {
                        node.deliver_head().await;
                    }
                }
            }
            tracing::debug!(replica = node.id(), "delivery loop stopped");
        });

        DeliveryLoop { shutdown, handle }
    }

    /// Originates one greeting after `delay` unless `shutdown` fires first.
    pub fn spawn_announcement(self: &Arc<Self>, delay: Duration, shutdown: Shutdown) -> JoinHandle<()> {
        let node = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.wait() => {}
                _ = tokio::time::sleep(delay) => {
                    node.originate(None).await;
                }
            }
        })
    }
}

impl<T: Transport> Handler for TotalOrderNode<T> {
    async fn handle(&self, envelope: Envelope) -> Reply {
        match envelope {
            Envelope::Message { message, .. } => Reply::Stored {
                enqueued: self.on_receive_message(message).await,
            },
            Envelope::Ack { from, message } => Reply::AckCounted {
                count: self.on_receive_ack(&message, from).await,
            },
            Envelope::Originate { payload } => Reply::Originated {
                message: self.originate(payload).await,
            },
            Envelope::Feed => Reply::Feed {
                feed: self.feed().await,
            },
            other => Reply::rejected(format!("total-order replica cannot handle {other:?}")),
        }
    }
}
