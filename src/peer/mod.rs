//! Peer-call capability
//!
//! Everything a node or a client needs from the network is one
//! [`PeerClient`] per remote replica plus a [`Connector`] that dials the
//! configured endpoints. Callers bound every call with [`with_timeout`].
//!
//! - [`grpc`]: tonic transport used by the binaries
//! - [`memory`]: in-process network for tests and simulations

pub mod grpc;
pub mod memory;

use crate::common::{Endpoint, NodeId, Result};
use crate::node::auction::{AuctionResult, Bid};
use crate::Error;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// RPC surface of one remote replica
#[tonic::async_trait]
pub trait PeerClient: Send + Sync {
    /// Rank of the replica behind this handle
    fn id(&self) -> NodeId;

    /// Election probe; success is the acknowledgement
    async fn election(&self) -> Result<()>;

    /// Announce `coordinator` as the new coordinator
    async fn coordinator(&self, coordinator: NodeId) -> Result<()>;

    async fn bid(&self, bid: &Bid) -> Result<()>;

    async fn result(&self) -> Result<AuctionResult>;
}

/// Shared handle to a peer, reused for every call once discovered
pub type PeerHandle = Arc<dyn PeerClient>;

/// Establishes peer handles
#[tonic::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<PeerHandle>;
}

/// Run one peer call, failing with [`Error::Timeout`] after `timeout`.
pub async fn with_timeout<T, F>(peer: NodeId, timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!(
            "peer {peer} did not answer within {timeout:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn with_timeout_cuts_slow_calls() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        };
        let err = with_timeout(5001, Duration::from_secs(1), slow)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn with_timeout_passes_results_through() {
        let value = with_timeout(5001, Duration::from_secs(1), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);

        let err = with_timeout(5001, Duration::from_secs(1), async {
            Err::<(), _>(Error::AuctionClosed)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::AuctionClosed));
    }
}
