//! Node gRPC services
//!
//! Thin adapters from the generated `Auction` and `Election` services to
//! [`Node`]. Protocol rejections are mapped with [`Error::to_grpc_status`].

use crate::common::NodeId;
use crate::node::auction::Bid;
use crate::node::server::Node;
use crate::proto::auction_server::{Auction, AuctionServer};
use crate::proto::election_server::{Election, ElectionServer};
use crate::proto::*;
use std::sync::Arc;
use tonic::{Request, Status};

/// Serves both services of one node
#[derive(Clone)]
pub struct NodeGrpcService {
    node: Arc<Node>,
}

impl NodeGrpcService {
    pub fn new(node: Arc<Node>) -> Self {
        Self { node }
    }

    pub fn auction_server(&self) -> AuctionServer<Self> {
        AuctionServer::new(self.clone())
    }

    pub fn election_server(&self) -> ElectionServer<Self> {
        ElectionServer::new(self.clone())
    }
}

#[tonic::async_trait]
impl Auction for NodeGrpcService {
    async fn bid(
        &self,
        req: Request<BidRequest>,
    ) -> Result<tonic::Response<BidResponse>, Status> {
        let bid = Bid::from(req.into_inner());
        self.node
            .bid(&bid)
            .await
            .map_err(|e| e.to_grpc_status())?;
        Ok(tonic::Response::new(BidResponse {}))
    }

    async fn result(
        &self,
        _req: Request<ResultRequest>,
    ) -> Result<tonic::Response<ResultResponse>, Status> {
        Ok(tonic::Response::new(self.node.result().into()))
    }
}

#[tonic::async_trait]
impl Election for NodeGrpcService {
    async fn election(
        &self,
        _req: Request<ElectionMessage>,
    ) -> Result<tonic::Response<Response>, Status> {
        self.node.on_election();
        Ok(tonic::Response::new(Response {}))
    }

    async fn coordinator(
        &self,
        req: Request<CoordinatorMessage>,
    ) -> Result<tonic::Response<Response>, Status> {
        let port = req.into_inner().port;
        let coordinator = NodeId::try_from(port)
            .map_err(|_| Status::invalid_argument(format!("invalid coordinator port {port}")))?;
        tracing::info!("Node {} received coordinator {}", self.node.id(), coordinator);
        self.node.on_coordinator(coordinator);
        Ok(tonic::Response::new(Response {}))
    }
}
