//! Auction replica
//!
//! [`Node`] owns one auction, one election engine and one membership table,
//! and answers the four RPCs. Several nodes can live in one process.

use crate::common::{lock, NodeConfig, NodeId, Result};
use crate::node::auction::{AuctionResult, AuctionState, Bid};
use crate::node::election::{
    ElectionEngine, ElectionOutcome, ElectionRole, ElectionSignal, ElectionStatsSnapshot,
};
use crate::node::grpc::NodeGrpcService;
use crate::node::http::create_router;
use crate::node::membership::MembershipTable;
use crate::node::timer::AuctionTimer;
use crate::peer::Connector;
use crate::Error;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;

pub struct Node {
    config: NodeConfig,
    auction: Arc<AuctionState>,
    membership: Arc<MembershipTable>,
    election: Arc<ElectionEngine>,
    signals: Mutex<Option<mpsc::Receiver<ElectionSignal>>>,
}

/// Snapshot served on `/admin/status`
#[derive(Debug, Clone, Serialize)]
pub struct NodeStatus {
    pub id: NodeId,
    pub role: ElectionRole,
    pub coordinator: Option<NodeId>,
    pub is_coordinator: bool,
    pub peers: Vec<NodeId>,
    pub higher_peers: usize,
    pub auction: AuctionResult,
    pub accepted_bids: u64,
    pub elections: ElectionStatsSnapshot,
}

/// Background tasks of a started node
pub struct NodeTasks {
    handles: Vec<JoinHandle<()>>,
}

impl NodeTasks {
    /// Stop every task. The auction timer stops with them.
    pub fn abort(&self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

impl Node {
    pub fn new(config: NodeConfig, connector: Arc<dyn Connector>) -> Self {
        let id = config.node_id();
        let auction = Arc::new(AuctionState::new(&config.auction));
        let membership = Arc::new(MembershipTable::new(
            id,
            config.cluster.clone(),
            connector,
            config.rpc_timeout(),
        ));
        let (election, signals) = ElectionEngine::new(
            id,
            membership.clone(),
            config.rpc_timeout(),
            config.election_queue_capacity,
        );

        Self {
            config,
            auction,
            membership,
            election: Arc::new(election),
            signals: Mutex::new(Some(signals)),
        }
    }

    pub fn id(&self) -> NodeId {
        self.config.node_id()
    }

    pub fn auction(&self) -> &Arc<AuctionState> {
        &self.auction
    }

    pub fn membership(&self) -> &Arc<MembershipTable> {
        &self.membership
    }

    pub fn election(&self) -> &Arc<ElectionEngine> {
        &self.election
    }

    /// Place a bid. Only the coordinator accepts bids; a backup first checks
    /// that the coordinator it believes in is alive, and runs an election if
    /// it is not.
    pub async fn bid(&self, bid: &Bid) -> Result<()> {
        if !self.election.is_coordinator() {
            tracing::debug!("Node {} attempting to reach coordinator", self.id());
            if !self.election.probe_coordinator().await {
                tracing::info!("Node {}: no coordinator found, starting election", self.id());
                if self.election.run_election().await == ElectionOutcome::AlreadyRunning {
                    self.election
                        .trigger(ElectionSignal::CoordinatorUnreachable);
                }
            }

            if !self.election.is_coordinator() {
                return Err(Error::NotCoordinator {
                    coordinator: self.election.coordinator(),
                });
            }
        }

        self.auction.place_bid(bid)?;
        tracing::info!(
            bidder = bid.bidder_id,
            amount = bid.amount,
            "Node {} accepted bid",
            self.id()
        );
        Ok(())
    }

    /// Local view of the auction. Backups answer too.
    pub fn result(&self) -> AuctionResult {
        self.auction.current_result()
    }

    pub fn on_election(&self) {
        self.election.handle_election_probe();
    }

    pub fn on_coordinator(&self, coordinator: NodeId) {
        self.election.handle_coordinator(coordinator);
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            id: self.id(),
            role: self.election.role(),
            coordinator: self.election.coordinator(),
            is_coordinator: self.election.is_coordinator(),
            peers: self.membership.known_ids(),
            higher_peers: self.membership.higher_len(),
            auction: self.auction.current_result(),
            accepted_bids: self.auction.accepted_bids(),
            elections: self.election.stats(),
        }
    }

    /// Spawn discovery, the election runner, the auction timer and the
    /// post-boot election. Fails if the node was already started.
    pub fn start(self: &Arc<Self>) -> Result<NodeTasks> {
        let signals = lock(&self.signals)
            .take()
            .ok_or_else(|| Error::Internal(format!("node {} already started", self.id())))?;

        let discovery = self
            .membership
            .clone()
            .spawn_discovery(self.config.discovery_interval());
        let runner = self.election.clone().spawn_runner(signals);
        let timer = AuctionTimer::new(
            self.auction.clone(),
            self.config.auction.tick(),
            self.config.auction.timer_start,
        )
        .spawn();

        let election = self.election.clone();
        let delay = self.config.startup_election_delay();
        let startup = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            election.trigger(ElectionSignal::Startup);
        });

        Ok(NodeTasks {
            handles: vec![discovery, runner, timer, startup],
        })
    }

    /// Bind the configured addresses and serve until a server stops.
    pub async fn serve(self: Arc<Self>) -> Result<()> {
        let grpc = TcpListener::bind(self.config.grpc_addr).await?;
        let http = match self.config.http_addr {
            Some(addr) => Some(TcpListener::bind(addr).await?),
            None => None,
        };
        self.serve_with_listeners(grpc, http).await
    }

    /// Serve on already bound listeners
    pub async fn serve_with_listeners(
        self: Arc<Self>,
        grpc: TcpListener,
        http: Option<TcpListener>,
    ) -> Result<()> {
        tracing::info!("Starting auction node: {}", self.id());
        tracing::info!("  gRPC API: {}", grpc.local_addr()?);
        if let Some(http) = &http {
            tracing::info!("  HTTP API: {}", http.local_addr()?);
        }
        tracing::info!("  Cluster: {:?}", self.membership.endpoint_ids());
        tracing::info!("  Timer start: {:?}", self.config.auction.timer_start);

        let tasks = self.start()?;

        let service = NodeGrpcService::new(self.clone());
        let grpc_server = tonic::transport::Server::builder()
            .add_service(service.auction_server())
            .add_service(service.election_server())
            .serve_with_incoming(TcpListenerStream::new(grpc));

        let router = create_router(self.clone());
        let http_server = async move {
            match http {
                Some(listener) => axum::serve(listener, router).await,
                None => std::future::pending().await,
            }
        };

        tracing::info!("✓ Node {} ready", self.id());

        tokio::select! {
            res = grpc_server => {
                if let Err(e) = res {
                    tracing::error!("gRPC server error: {}", e);
                }
            }
            res = http_server => {
                if let Err(e) = res {
                    tracing::error!("HTTP server error: {}", e);
                }
            }
        }

        tasks.abort();
        Ok(())
    }
}
