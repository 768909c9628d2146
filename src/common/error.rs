//! Error types for gavel

use crate::common::NodeId;
use thiserror::Error;
use tonic::metadata::MetadataValue;
use tonic::Code;

pub type Result<T> = std::result::Result<T, Error>;

/// Metadata key carrying the rejection kind of a protocol error.
const REJECT_KEY: &str = "x-gavel-reject";
const HIGHEST_BID_KEY: &str = "x-gavel-highest-bid";
const AMOUNT_KEY: &str = "x-gavel-amount";
const COORDINATOR_KEY: &str = "x-gavel-coordinator";

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Protocol (business-rule) rejections ===
    #[error("this is a backup server (coordinator: {})", fmt_coordinator(.coordinator))]
    NotCoordinator { coordinator: Option<NodeId> },

    #[error("auction is done")]
    AuctionClosed,

    #[error("you cannot raise your own bid")]
    SelfRaiseRejected,

    #[error("your bid has to be higher than the highest bid - your bid: {amount} - highest bid: {highest}")]
    BidTooLow { amount: i64, highest: i64 },

    // === Network Errors ===
    #[error("peer {0} unavailable")]
    PeerUnavailable(NodeId),

    #[error("Operation timeout: {0}")]
    Timeout(String),

    #[error("gRPC error: {0}")]
    Grpc(#[from] tonic::Status),

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    // === Config Errors ===
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

fn fmt_coordinator(coordinator: &Option<NodeId>) -> String {
    coordinator.map_or_else(|| "unknown".to_string(), |id| id.to_string())
}

impl Error {
    /// Peer absent this round: unreachable, timed out or the connection broke.
    pub fn is_transport(&self) -> bool {
        match self {
            Error::PeerUnavailable(_) | Error::Timeout(_) | Error::Transport(_) => true,
            Error::Grpc(status) => matches!(
                status.code(),
                Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled | Code::Unknown
            ),
            _ => false,
        }
    }

    /// Is it worth re-sending the same request, possibly to another replica?
    pub fn is_retryable(&self) -> bool {
        self.is_transport() || matches!(self, Error::NotCoordinator { .. })
    }

    /// Convert to gRPC status for RPC responses
    pub fn to_grpc_status(&self) -> tonic::Status {
        let mut status = match self {
            Error::NotCoordinator { .. } | Error::AuctionClosed | Error::SelfRaiseRejected => {
                tonic::Status::new(Code::FailedPrecondition, self.to_string())
            }
            Error::BidTooLow { .. } => tonic::Status::new(Code::InvalidArgument, self.to_string()),
            Error::Timeout(_) => tonic::Status::new(Code::DeadlineExceeded, self.to_string()),
            Error::PeerUnavailable(_) => tonic::Status::new(Code::Unavailable, self.to_string()),
            Error::Grpc(status) => return status.clone(),
            _ => tonic::Status::new(Code::Internal, self.to_string()),
        };

        let metadata = status.metadata_mut();
        match self {
            Error::NotCoordinator { coordinator } => {
                metadata.insert(REJECT_KEY, MetadataValue::from_static("not-coordinator"));
                if let Some(id) = coordinator {
                    metadata.insert(COORDINATOR_KEY, MetadataValue::from(u32::from(*id)));
                }
            }
            Error::AuctionClosed => {
                metadata.insert(REJECT_KEY, MetadataValue::from_static("auction-closed"));
            }
            Error::SelfRaiseRejected => {
                metadata.insert(REJECT_KEY, MetadataValue::from_static("self-raise"));
            }
            Error::BidTooLow { amount, highest } => {
                metadata.insert(REJECT_KEY, MetadataValue::from_static("bid-too-low"));
                metadata.insert(AMOUNT_KEY, MetadataValue::from(*amount));
                metadata.insert(HIGHEST_BID_KEY, MetadataValue::from(*highest));
            }
            _ => {}
        }
        status
    }

    /// Rebuild a typed error from a status returned by a peer.
    ///
    /// Statuses without the rejection marker stay as [`Error::Grpc`].
    pub fn from_grpc_status(status: tonic::Status) -> Self {
        let metadata = status.metadata();
        let text = |key: &str| metadata.get(key).and_then(|v| v.to_str().ok());
        let number = |key: &str| text(key).and_then(|v| v.parse::<i64>().ok());

        match text(REJECT_KEY) {
            Some("not-coordinator") => Error::NotCoordinator {
                coordinator: text(COORDINATOR_KEY).and_then(|v| v.parse().ok()),
            },
            Some("auction-closed") => Error::AuctionClosed,
            Some("self-raise") => Error::SelfRaiseRejected,
            Some("bid-too-low") => Error::BidTooLow {
                amount: number(AMOUNT_KEY).unwrap_or_default(),
                highest: number(HIGHEST_BID_KEY).unwrap_or_default(),
            },
            _ => Error::Grpc(status),
        }
    }
}
