//! Auction node binary

use clap::{Parser, Subcommand};
use gavel::common::{Endpoint, NodeConfig, TimerStart};
use gavel::peer::grpc::GrpcConnector;
use gavel::Node;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gavel-node")]
#[command(about = "gavel auction replica with bully coordinator election")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an auction replica
    Serve {
        /// Configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// gRPC port; also the node's rank
        #[arg(long)]
        port: Option<u16>,

        /// Bind host for gRPC
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Bind address for the admin HTTP API
        #[arg(long)]
        http: Option<SocketAddr>,

        /// Cluster members, self included (comma-separated host:port)
        #[arg(long, value_delimiter = ',')]
        cluster: Vec<Endpoint>,

        /// Initial highest bid
        #[arg(long)]
        starting_bid: Option<i64>,

        /// Auction length in seconds
        #[arg(long)]
        duration: Option<i64>,

        /// When the countdown starts: boot or first-bid
        #[arg(long)]
        timer_start: Option<TimerStart>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            port,
            host,
            http,
            cluster,
            starting_bid,
            duration,
            timer_start,
        } => {
            // File and env first, CLI has priority
            let mut node_config = NodeConfig::load(config.as_deref())?;
            if let Some(port) = port {
                node_config.grpc_addr = format!("{host}:{port}").parse()?;
            }
            if http.is_some() {
                node_config.http_addr = http;
            }
            if !cluster.is_empty() {
                node_config.cluster = cluster;
            }
            if let Some(starting_bid) = starting_bid {
                node_config.auction.starting_bid = starting_bid;
            }
            if let Some(duration) = duration {
                node_config.auction.duration_secs = duration;
            }
            if let Some(timer_start) = timer_start {
                node_config.auction.timer_start = timer_start;
            }
            node_config.validate()?;

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| node_config.log_level.clone().into()),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();

            let connector = Arc::new(GrpcConnector::new(node_config.rpc_timeout()));
            let node = Arc::new(Node::new(node_config, connector));

            tokio::select! {
                res = node.serve() => res?,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutting down");
                }
            }
        }
    }

    Ok(())
}
