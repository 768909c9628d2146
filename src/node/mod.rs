//! Auction replica
//!
//! Each node is responsible for:
//! - Hosting its own copy of the auction state
//! - Discovering the other replicas
//! - Electing a coordinator (bully algorithm)
//! - Accepting bids while coordinator, answering reads always

pub mod auction;
pub mod election;
pub mod grpc;
pub mod http;
pub mod membership;
pub mod server;
pub mod timer;

pub use server::{Node, NodeStatus, NodeTasks};
