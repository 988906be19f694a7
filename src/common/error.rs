use thiserror::Error;

use crate::broadcast::ReplicaId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("event from replica {origin} submitted on replica {local}")]
    NotOrigin { origin: ReplicaId, local: ReplicaId },

    #[error("unknown replica {0}")]
    UnknownReplica(ReplicaId),

    #[error("timestamp has {got} slots, cluster has {expected} replicas")]
    ClockWidth { expected: usize, got: usize },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("send to replica {0} timed out")]
    Timeout(ReplicaId),

    #[error("replica {0} is not reachable")]
    Closed(ReplicaId),

    #[error("rejected by replica: {0}")]
    Rejected(String),
}
