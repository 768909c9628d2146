//! Bidding client

use clap::{Parser, Subcommand};
use gavel::client::BidderSession;
use gavel::common::Endpoint;
use gavel::peer::grpc::GrpcConnector;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "gavel")]
#[command(about = "gavel auction client")]
#[command(version)]
struct Cli {
    /// Replicas to talk to (comma-separated host:port)
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "127.0.0.1:5000,127.0.0.1:5001,127.0.0.1:5002"
    )]
    replicas: Vec<Endpoint>,

    /// Bidder id
    #[arg(long, default_value = "1")]
    id: i32,

    /// Bidder name
    #[arg(long, default_value = "John Doe")]
    name: String,

    /// Per-call timeout in milliseconds
    #[arg(long, default_value = "3000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Place a bid
    Bid {
        /// Amount
        amount: i64,
    },

    /// Show the auction status or winner
    Result {
        /// Ask every replica and report the majority answer
        #[arg(long)]
        majority: bool,
    },

    /// Read bids from stdin; `/result` shows the auction state
    Interactive,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let timeout = Duration::from_millis(cli.timeout_ms);
    let connector = Arc::new(GrpcConnector::new(timeout));
    let mut session = BidderSession::new(cli.id, cli.name, cli.replicas, connector, timeout);

    match cli.command {
        Commands::Bid { amount } => {
            let replica = session.place_bid(amount).await?;
            println!("Bid of {amount} accepted by replica {replica}");
        }

        Commands::Result { majority } => {
            if majority {
                println!("{}", session.majority_result().await);
            } else {
                println!("{}", session.result().await?);
            }
        }

        Commands::Interactive => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "/result" {
                    match session.result().await {
                        Ok(result) => println!("{result}"),
                        Err(e) => eprintln!("{e}"),
                    }
                    continue;
                }

                let Ok(amount) = line.parse::<i64>() else {
                    eprintln!("not a valid bid");
                    continue;
                };
                match session.place_bid(amount).await {
                    Ok(_) => println!("Successfully placed bid"),
                    Err(e) => eprintln!("Bid failed: {e}"),
                }
            }
        }
    }

    Ok(())
}
