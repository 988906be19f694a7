use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{Error, Result};
use crate::broadcast::{ReplicaId, ReplicaSet};
use crate::causal::DuplicatePolicy;
use crate::total::AckPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cluster: ClusterConfig,
    pub transport: TransportConfig,
    pub causal: CausalConfig,
    pub total_order: TotalOrderConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub replicas: Vec<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            replicas: vec![
                "127.0.0.1:8080".to_string(),
                "127.0.0.1:8081".to_string(),
                "127.0.0.1:8082".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub send_timeout_ms: u64,
    /// Delay applied before every outbound send of `delayed_replica`.
    pub outbound_delay_ms: u64,
    pub delayed_replica: Option<ReplicaId>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            send_timeout_ms: 2_000,
            outbound_delay_ms: 0,
            delayed_replica: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CausalConfig {
    pub duplicates: DuplicatePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TotalOrderConfig {
    pub tick_ms: u64,
    /// Originate one greeting message this long after startup.
    pub announce: bool,
    pub announce_delay_ms: u64,
    /// How many copies of each originated message go to every peer.
    pub broadcast_rounds: u32,
    pub initial_offset_max: u64,
    pub ack_policy: AckPolicy,
}

impl Default for TotalOrderConfig {
    fn default() -> Self {
        TotalOrderConfig {
            tick_ms: 500,
            announce: true,
            announce_delay_ms: 15_000,
            broadcast_rounds: 3,
            initial_offset_max: 10,
            ack_policy: AckPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn replica_set(&self) -> ReplicaSet {
        ReplicaSet::new(self.cluster.replicas.clone())
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.transport.send_timeout_ms)
    }

    pub fn outbound_delay_for(&self, id: ReplicaId) -> Duration {
        match self.transport.delayed_replica {
            Some(delayed) if delayed == id => Duration::from_millis(self.transport.outbound_delay_ms),
            _ => Duration::ZERO,
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.total_order.tick_ms)
    }

    pub fn announce_delay(&self) -> Duration {
        Duration::from_millis(self.total_order.announce_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cluster.replicas.is_empty() {
            return Err(Error::Config("cluster.replicas must not be empty".to_string()));
        }
        if self.total_order.tick_ms == 0 {
            return Err(Error::Config("total_order.tick_ms must be positive".to_string()));
        }
        if self.total_order.broadcast_rounds == 0 {
            return Err(Error::Config(
                "total_order.broadcast_rounds must be positive".to_string(),
            ));
        }
        if self.total_order.initial_offset_max == 0 {
            return Err(Error::Config(
                "total_order.initial_offset_max must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn load(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => load_file(path)?,
        None => Config::default(),
    };
    apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

pub fn load_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
    toml::from_str(&contents)
        .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
}

pub fn apply_env_overrides(config: &mut Config) {
    if let Ok(raw) = std::env::var("OBCAST_REPLICAS") {
        let replicas: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(str::to_string)
            .collect();
        if replicas.is_empty() {
            tracing::warn!("empty OBCAST_REPLICAS, ignoring");
        } else {
            config.cluster.replicas = replicas;
        }
    }

    if let Ok(raw) = std::env::var("OBCAST_TICK_MS") {
        match raw.trim().parse::<u64>() {
            Ok(value) if value > 0 => config.total_order.tick_ms = value,
            Ok(_) => tracing::warn!("OBCAST_TICK_MS must be positive, ignoring"),
            Err(err) => tracing::warn!("invalid OBCAST_TICK_MS, ignoring: {err}"),
        }
    }
}

/// Resolves this process's replica index: explicit flag first, then the
/// numeric suffix of `POD_NAME` (e.g. `lamport-2`).
pub fn resolve_replica_id(explicit: Option<ReplicaId>, replicas: &ReplicaSet) -> Result<ReplicaId> {
    let id = match explicit {
        Some(id) => id,
        None => {
            let pod = std::env::var("POD_NAME")
                .map_err(|_| Error::Config("no --id given and POD_NAME is unset".to_string()))?;
            pod_index(&pod)
                .ok_or_else(|| Error::Config(format!("cannot derive replica index from POD_NAME={pod}")))?
        }
    };
    if !replicas.contains(id) {
        return Err(Error::UnknownReplica(id));
    }
    Ok(id)
}

fn pod_index(pod: &str) -> Option<ReplicaId> {
    pod.rsplit('-').next()?.parse().ok()
}
