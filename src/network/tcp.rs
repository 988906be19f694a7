use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};

use super::{Envelope, Reply, Request, Transport};
use crate::broadcast::{ReplicaId, ReplicaSet};
use crate::common::{Error, Result};

/*
    Line-delimited JSON over TCP: the client writes one envelope per line,
    the server answers each with one reply line.
*/

#[derive(Clone, Debug)]
pub struct TcpTransport {
    pub peers: ReplicaSet,
}

impl TcpTransport {
    pub fn new(peers: ReplicaSet) -> Self {
        TcpTransport { peers }
    }
}

impl Transport for TcpTransport {
    async fn send(&self, to: ReplicaId, envelope: Envelope) -> Result<Reply> {
        let address = self.peers.address(to).ok_or(Error::UnknownReplica(to))?;
        let stream = TcpStream::connect(address).await?;
        let (reader, mut writer) = stream.into_split();

        let mut line = serde_json::to_string(&envelope)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;

        let mut lines = BufReader::new(reader).lines();
        match lines.next_line().await? {
            Some(reply) => Ok(serde_json::from_str(&reply)?),
            None => Err(Error::Closed(to)),
        }
    }
}

/// Accepts connections until the inbound queue closes, forwarding each
/// decoded envelope to `inbound`.
pub async fn serve_tcp(listener: TcpListener, inbound: mpsc::Sender<Request>) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        if inbound.is_closed() {
            return Ok(());
        }
        let inbound = inbound.clone();
        tokio::spawn(async move {
            if let Err(err) = serve_connection(stream, inbound).await {
                tracing::warn!(%peer, "connection failed: {err}");
            }
        });
    }
}

async fn serve_connection(stream: TcpStream, inbound: mpsc::Sender<Request>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<Envelope>(&line) {
            Ok(envelope) => dispatch(&inbound, envelope).await,
            Err(err) => Reply::rejected(format!("malformed request: {err}")),
        };

        let mut out = serde_json::to_string(&reply)?;
        out.push('\n');
        writer.write_all(out.as_bytes()).await?;
    }
    Ok(())
}

async fn dispatch(inbound: &mpsc::Sender<Request>, envelope: Envelope) -> Reply {
    let (reply_tx, reply_rx) = oneshot::channel();
    let request = Request {
        envelope,
        reply: reply_tx,
    };
    if inbound.send(request).await.is_err() {
        return Reply::rejected("replica is shutting down");
    }
    reply_rx
        .await
        .unwrap_or_else(|_| Reply::rejected("replica dropped the request"))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn listener() -> (TcpListener, ReplicaSet) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        (listener, ReplicaSet::new(vec![address]))
    }

    #[tokio::test]
    async fn test_round_trip_over_tcp() {
        let (listener, peers) = listener().await;
        let (inbound_tx, mut inbound_rx) = mpsc::channel(8);
        tokio::spawn(serve_tcp(listener, inbound_tx));

        tokio::spawn(async move {
            while let Some(request) = inbound_rx.recv().await {
                let _ = request.reply.send(Reply::AckCounted { count: 2 });
            }
        });

        let transport = TcpTransport::new(peers);
        let reply = transport.send(0, Envelope::Feed).await.unwrap();
        assert_eq!(reply, Reply::AckCounted { count: 2 });
    }

    #[tokio::test]
    async fn test_malformed_line_is_rejected() {
        let (listener, peers) = listener().await;
        let (inbound_tx, _inbound_rx) = mpsc::channel(8);
        tokio::spawn(serve_tcp(listener, inbound_tx));

        let stream = TcpStream::connect(peers.address(0).unwrap()).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        writer.write_all(b"{\"kind\":\"share\"}\n").await.unwrap();

        let mut lines = BufReader::new(reader).lines();
        let reply: Reply = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert!(matches!(reply, Reply::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_unknown_replica() {
        let transport = TcpTransport::new(ReplicaSet::new(vec![]));
        assert!(matches!(
            transport.send(0, Envelope::Feed).await,
            Err(Error::UnknownReplica(0))
        ));
    }
}
