//! # gavel
//!
//! A replicated auction service:
//! - Every replica hosts its own copy of the auction
//! - Replicas elect a coordinator with the bully algorithm
//! - Only the coordinator accepts bids; any replica answers result queries
//! - Clients fail over between replicas and can read results by majority
//!
//! ## Architecture
//!
//! ```text
//!            ┌──────────────┐
//!            │    Client    │  bid → current replica, retarget on
//!            │ (session +   │  NotCoordinator / connection loss
//!            │  majority)   │  result → all replicas, majority vote
//!            └──────┬───────┘
//!                   │ gRPC (Auction)
//!   ┌───────────────┼────────────────┐
//!   │               │                │
//! ┌─▼──────────┐ ┌──▼─────────┐ ┌────▼───────┐
//! │ Node 5000  │ │ Node 5001  │ │ Node 5002  │
//! │  backup    │◄┤  backup    │◄┤ coordinator│
//! │  auction   │ │  auction   │ │  auction   │
//! └────────────┘ └────────────┘ └────────────┘
//!        gRPC (Election): probes go up, announcements go to everyone
//! ```
//!
//! ## Usage
//!
//! ### Start three replicas
//! ```bash
//! gavel-node serve --port 5000 --cluster 127.0.0.1:5000,127.0.0.1:5001,127.0.0.1:5002
//! gavel-node serve --port 5001 --cluster 127.0.0.1:5000,127.0.0.1:5001,127.0.0.1:5002
//! gavel-node serve --port 5002 --cluster 127.0.0.1:5000,127.0.0.1:5001,127.0.0.1:5002 \
//!   --http 127.0.0.1:8002
//! ```
//!
//! ### Bid and read
//! ```bash
//! gavel --id 1 --name alice bid 60
//! gavel result --majority
//! gavel --id 2 --name bob interactive
//! ```

pub mod client;
pub mod common;
pub mod node;
pub mod peer;
pub mod proto;

// Re-export commonly used types
pub use common::{Endpoint, Error, NodeConfig, NodeId, Result};
pub use node::Node;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
