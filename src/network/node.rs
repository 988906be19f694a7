use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use super::{Envelope, Inbound, Reply};

/// A replica that answers envelopes. Implementations take their own lock
/// for the duration of each check-then-update and never hold it across a send.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, envelope: Envelope) -> impl Future<Output = Reply> + Send;
}

/// Stop signal shared by a replica's background tasks.
#[derive(Clone, Debug)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Shutdown { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `trigger` has been called.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            loop {
                if *rx.borrow_and_update() {
                    return;
                }
                if rx.changed().await.is_err() {
                    return;
                }
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Answers inbound requests until the queue closes or `shutdown` fires.
/// Each request runs on its own task, so receives are handled concurrently.
pub async fn serve<H: Handler>(node: Arc<H>, mut inbound: Inbound, shutdown: Shutdown) {
    let stopped = shutdown.wait();
    tokio::pin!(stopped);
    loop {
        tokio::select! {
            _ = &mut stopped => break,
            request = inbound.recv() => {
                let Some(request) = request else { break };
                let node = node.clone();
                tokio::spawn(async move {
                    let reply = node.handle(request.envelope).await;
                    // the requester may have timed out and gone away
                    let _ = request.reply.send(reply);
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::network::{ChannelTransport, Transport};

    struct Echo;

    impl Handler for Echo {
        async fn handle(&self, envelope: Envelope) -> Reply {
            match envelope {
                Envelope::Feed => Reply::Buffered,
                _ => Reply::rejected("unsupported"),
            }
        }
    }

    #[tokio::test]
    async fn test_serve_answers_until_shutdown() {
        let (transport, mut inbounds) = ChannelTransport::mesh(1);
        let shutdown = Shutdown::new();
        let server = tokio::spawn(serve(Arc::new(Echo), inbounds.remove(0), shutdown.clone()));

        assert_eq!(transport.send(0, Envelope::Feed).await.unwrap(), Reply::Buffered);

        shutdown.trigger();
        assert!(shutdown.is_triggered());
        tokio::time::timeout(Duration::from_secs(1), server)
            .await
            .unwrap()
            .unwrap();
    }
}
