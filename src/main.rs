/*
    Replicas of a small post/reply feed that broadcast events to each other
    over a best-effort transport and deliver them under one of two ordering
    guarantees.

    Causal: events carry vector clocks; an event is delivered only after
    everything its sender had delivered before sending it. Early arrivals
    wait in a holdback buffer.

    Total order: messages carry a fixed scalar timestamp and sit in a
    priority queue. Every receipt is acknowledged to all peers, and a
    periodic loop delivers the queue head once every replica has
    acknowledged it, never skipping past a head that has not.
*/

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use ordered_broadcast::broadcast::{ReplicaId, ReplicaSet};
use ordered_broadcast::causal::{CausalNode, CausalProcessor, SubmitRequest};
use ordered_broadcast::common::config::{self, Config};
use ordered_broadcast::common::telemetry;
use ordered_broadcast::network::{request, serve, serve_tcp, Envelope, Outbox, Reply, Shutdown, TcpTransport};
use ordered_broadcast::total::{TotalOrderNode, TotalOrderProcessor};
use ordered_broadcast::{Error, Result};

const INBOUND_CAPACITY: usize = 1024;

#[derive(Parser, Debug)]
#[command(name = "obcast", about = "Causal and total-order broadcast replicas")]
struct Cli {
    /// TOML config file; defaults are used when absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one replica until interrupted.
    Serve {
        mode: Mode,
        /// Replica index; derived from POD_NAME when omitted.
        #[arg(long)]
        id: Option<ReplicaId>,
        /// Listen address; defaults to 0.0.0.0 on the replica's configured port.
        #[arg(long)]
        listen: Option<String>,
    },
    /// Submit a post or reply to its origin replica (causal mode).
    Post {
        #[arg(long)]
        to: ReplicaId,
        #[arg(long)]
        event_id: String,
        #[arg(long)]
        author: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        parent: Option<String>,
    },
    /// Ask a replica to originate a message (total-order mode).
    Originate {
        #[arg(long)]
        to: ReplicaId,
        #[arg(long)]
        payload: Option<String>,
    },
    /// Print a replica's delivered feed.
    Feed {
        #[arg(long)]
        from: ReplicaId,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Causal,
    Total,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    telemetry::init(&config.logging);

    let result = match cli.command {
        Command::Serve { mode, id, listen } => run_replica(&config, mode, id, listen).await,
        Command::Post {
            to,
            event_id,
            author,
            content,
            parent,
        } => {
            let request = SubmitRequest {
                event_id,
                process_id: to,
                parent_id: parent,
                author,
                content,
            };
            client(&config, to, Envelope::Submit { request }).await
        }
        Command::Originate { to, payload } => client(&config, to, Envelope::Originate { payload }).await,
        Command::Feed { from } => client(&config, from, Envelope::Feed).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run_replica(config: &Config, mode: Mode, id: Option<ReplicaId>, listen: Option<String>) -> Result<()> {
    let peers = config.replica_set();
    let id = config::resolve_replica_id(id, &peers)?;
    let listen = match listen {
        Some(listen) => listen,
        None => default_listen(&peers, id)?,
    };

    let listener = TcpListener::bind(&listen).await?;
    tracing::info!(replica = id, %listen, ?mode, replicas = peers.len(), "replica listening");

    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
    tokio::spawn(async move {
        if let Err(err) = serve_tcp(listener, inbound_tx).await {
            tracing::error!("listener failed: {err}");
        }
    });

    let transport = Arc::new(TcpTransport::new(peers.clone()));
    let outbox = Outbox::new(id, transport, config.send_timeout()).with_delay(config.outbound_delay_for(id));
    let shutdown = Shutdown::new();

    match mode {
        Mode::Causal => {
            let processor = CausalProcessor::new(id, peers, config.causal.duplicates);
            let node = Arc::new(CausalNode::new(processor, outbox));
            let server = tokio::spawn(serve(node.clone(), inbound_rx, shutdown.clone()));

            wait_for_interrupt().await;
            shutdown.trigger();
            let _ = server.await;

            let feed = node.feed().await;
            tracing::info!(clock = %node.clock().await, buffered = node.buffered().await, "final state");
            println!("{}", feed.render());
        }
        Mode::Total => {
            let offset = TotalOrderProcessor::random_offset(config.total_order.initial_offset_max);
            let processor = TotalOrderProcessor::new(id, peers, offset, config.total_order.ack_policy);
            tracing::info!(replica = id, offset, timestamp = offset + 1, "total-order replica ready");

            let node = Arc::new(TotalOrderNode::new(processor, outbox, config.total_order.broadcast_rounds));
            let server = tokio::spawn(serve(node.clone(), inbound_rx, shutdown.clone()));
            let delivery = node.spawn_delivery_loop(config.tick());
            if config.total_order.announce {
                node.spawn_announcement(config.announce_delay(), shutdown.clone());
            }

            wait_for_interrupt().await;
            shutdown.trigger();
            delivery.stop().await;
            let _ = server.await;

            tracing::info!(pending = node.pending().await, "final state");
            println!("{}", node.feed().await.render());
        }
    }
    Ok(())
}

async fn client(config: &Config, to: ReplicaId, envelope: Envelope) -> Result<()> {
    let transport = TcpTransport::new(config.replica_set());
    match request(&transport, to, envelope, config.send_timeout()).await? {
        Reply::Feed { feed } => print!("{}", feed.render()),
        Reply::Rejected { reason } => return Err(Error::Rejected(reason)),
        reply => println!("{}", serde_json::to_string_pretty(&reply)?),
    }
    Ok(())
}

fn default_listen(peers: &ReplicaSet, id: ReplicaId) -> Result<String> {
    let address = peers.address(id).ok_or(Error::UnknownReplica(id))?;
    let port = address
        .rsplit_once(':')
        .map(|(_, port)| port)
        .ok_or_else(|| Error::Config(format!("replica address {address} has no port")))?;
    Ok(format!("0.0.0.0:{port}"))
}

async fn wait_for_interrupt() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("cannot listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
}
