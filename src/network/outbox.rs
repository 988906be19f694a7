use std::sync::Arc;
use std::time::Duration;

use super::{request, Envelope, Transport};
use crate::broadcast::ReplicaId;

/// Fire-and-forget sender. Every send runs on its own task: no ordering
/// between sends, no retry. Failures are logged and dropped.
pub struct Outbox<T> {
    pub me: ReplicaId,
    transport: Arc<T>,
    timeout: Duration,
    delay: Duration,
}

impl<T: Transport> Outbox<T> {
    pub fn new(me: ReplicaId, transport: Arc<T>, timeout: Duration) -> Self {
        Outbox {
            me,
            transport,
            timeout,
            delay: Duration::ZERO,
        }
    }

    /// Holds every send back by `delay` before it goes out.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn broadcast(&self, targets: impl IntoIterator<Item = ReplicaId>, envelope: &Envelope) {
        for to in targets {
            self.send(to, envelope.clone());
        }
    }

    pub fn send(&self, to: ReplicaId, envelope: Envelope) {
        let transport = self.transport.clone();
        let (me, timeout, delay) = (self.me, self.timeout, self.delay);
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match request(transport.as_ref(), to, envelope, timeout).await {
                Ok(reply) => tracing::debug!(replica = me, to, ?reply, "sent"),
                Err(err) => tracing::warn!(replica = me, to, "send failed: {err}"),
            }
        });
    }
}
