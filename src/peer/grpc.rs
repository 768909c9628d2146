//! gRPC peer handles
use crate::common::{Endpoint, NodeId, Result};
use crate::node::auction::{AuctionResult, Bid};
use crate::peer::{Connector, PeerClient, PeerHandle};
use crate::proto::auction_client::AuctionClient;
use crate::proto::election_client::ElectionClient;
use crate::proto::{BidRequest, CoordinatorMessage, ElectionMessage, ResultRequest};
use crate::Error;
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::{Channel, Endpoint as TonicEndpoint};

/// Handle over one tonic `Channel`. The channel reconnects on its own, so a
/// peer that went away is retried transparently by the next call.
#[derive(Clone)]
pub struct GrpcPeer {
    id: NodeId,
    auction: AuctionClient<Channel>,
    election: ElectionClient<Channel>,
}

impl GrpcPeer {
    pub fn new(id: NodeId, channel: Channel) -> Self {
        Self {
            id,
            auction: AuctionClient::new(channel.clone()),
            election: ElectionClient::new(channel),
        }
    }
}

#[tonic::async_trait]
impl PeerClient for GrpcPeer {
    fn id(&self) -> NodeId {
        self.id
    }

    async fn election(&self) -> Result<()> {
        self.election
            .clone()
            .election(ElectionMessage {})
            .await
            .map_err(Error::from_grpc_status)?;
        Ok(())
    }

    async fn coordinator(&self, coordinator: NodeId) -> Result<()> {
        let req = CoordinatorMessage {
            port: i32::from(coordinator),
        };
        self.election
            .clone()
            .coordinator(req)
            .await
            .map_err(Error::from_grpc_status)?;
        Ok(())
    }

    async fn bid(&self, bid: &Bid) -> Result<()> {
        self.auction
            .clone()
            .bid(BidRequest::from(bid))
            .await
            .map_err(Error::from_grpc_status)?;
        Ok(())
    }

    async fn result(&self) -> Result<AuctionResult> {
        let resp = self
            .auction
            .clone()
            .result(ResultRequest {})
            .await
            .map_err(Error::from_grpc_status)?
            .into_inner();
        resp.try_into()
    }
}

/// Dials endpoints eagerly so discovery only records reachable peers.
#[derive(Debug, Clone)]
pub struct GrpcConnector {
    connect_timeout: Duration,
}

impl GrpcConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[tonic::async_trait]
impl Connector for GrpcConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<PeerHandle> {
        let channel = TonicEndpoint::from_shared(endpoint.uri())?
            .connect_timeout(self.connect_timeout)
            .connect()
            .await?;
        Ok(Arc::new(GrpcPeer::new(endpoint.id(), channel)))
    }
}
