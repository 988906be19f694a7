use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::{Envelope, Inbound, Reply, Request, Transport};
use crate::broadcast::ReplicaId;
use crate::common::{Error, Result};

const CHANNEL_CAPACITY: usize = 100;

/// In-process transport: one mpsc queue per replica.
#[derive(Clone, Debug)]
pub struct ChannelTransport {
    routes: Arc<Vec<mpsc::Sender<Request>>>,
}

impl ChannelTransport {
    /// Wires `n` replicas to each other. Inbound queue `i` belongs to replica `i`.
    pub fn mesh(n: usize) -> (ChannelTransport, Vec<Inbound>) {
        let (routes, inbounds): (Vec<_>, Vec<_>) =
            (0..n).map(|_| mpsc::channel(CHANNEL_CAPACITY)).unzip();
        (
            ChannelTransport {
                routes: Arc::new(routes),
            },
            inbounds,
        )
    }
}

impl Transport for ChannelTransport {
    async fn send(&self, to: ReplicaId, envelope: Envelope) -> Result<Reply> {
        let route = self.routes.get(to).ok_or(Error::UnknownReplica(to))?;
        let (reply_tx, reply_rx) = oneshot::channel();
        route
            .send(Request {
                envelope,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::Closed(to))?;
        reply_rx.await.map_err(|_| Error::Closed(to))
    }
}
