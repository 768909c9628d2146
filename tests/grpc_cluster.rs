//! Three replicas over real gRPC sockets

mod common;

use common::{eventually, fast_config};
use gavel::client::{BidderSession, RetryPolicy, Verdict};
use gavel::common::{Endpoint, NodeId};
use gavel::node::auction::{AuctionResult, Bid};
use gavel::peer::grpc::GrpcConnector;
use gavel::peer::Connector;
use gavel::{Error, Node};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

struct GrpcCluster {
    nodes: Vec<Arc<Node>>,
    endpoints: Vec<Endpoint>,
    servers: Vec<JoinHandle<()>>,
}

impl GrpcCluster {
    async fn start(size: usize) -> Self {
        let mut listeners = Vec::new();
        for _ in 0..size {
            listeners.push(TcpListener::bind("127.0.0.1:0").await.unwrap());
        }
        let endpoints: Vec<Endpoint> = listeners
            .iter()
            .map(|l| Endpoint::new("127.0.0.1", l.local_addr().unwrap().port()))
            .collect();

        let mut nodes = Vec::new();
        let mut servers = Vec::new();
        for listener in listeners {
            let port = listener.local_addr().unwrap().port();
            let connector = Arc::new(GrpcConnector::new(Duration::from_millis(300)));
            let node = Arc::new(Node::new(fast_config(port, endpoints.clone()), connector));
            nodes.push(node.clone());
            servers.push(tokio::spawn(async move {
                node.serve_with_listeners(listener, None).await.unwrap();
            }));
        }

        Self {
            nodes,
            endpoints,
            servers,
        }
    }

    fn top(&self) -> NodeId {
        self.endpoints.iter().map(Endpoint::id).max().unwrap()
    }

    fn settled(&self) -> bool {
        let top = self.top();
        self.nodes
            .iter()
            .all(|node| node.election().coordinator() == Some(top))
    }

    fn lowest(&self) -> &Endpoint {
        self.endpoints.iter().min_by_key(|e| e.id()).unwrap()
    }
}

impl Drop for GrpcCluster {
    fn drop(&mut self) {
        for server in &self.servers {
            server.abort();
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cluster_elects_highest_port_and_takes_bids() {
    let cluster = GrpcCluster::start(3).await;
    eventually("replicas to agree on the highest port", || cluster.settled()).await;

    let timeout = Duration::from_secs(2);
    let mut session = BidderSession::new(
        1,
        "alice",
        cluster.endpoints.clone(),
        Arc::new(GrpcConnector::new(timeout)),
        timeout,
    )
    .with_policy(RetryPolicy {
        max_attempts: 6,
        retry_delay: Duration::from_millis(50),
        jitter: Duration::ZERO,
    });

    assert_eq!(
        session.majority_result().await,
        Verdict::Agreed(AuctionResult::Status {
            remaining_time: 120,
            highest_bid: 50
        })
    );

    assert_eq!(session.place_bid(60).await.unwrap(), cluster.top());
    assert_eq!(
        session.result().await.unwrap(),
        AuctionResult::Status {
            remaining_time: 120,
            highest_bid: 60
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rejections_survive_the_wire() {
    let cluster = GrpcCluster::start(3).await;
    eventually("replicas to agree on the highest port", || cluster.settled()).await;

    let connector = GrpcConnector::new(Duration::from_secs(2));
    let backup = connector.connect(cluster.lowest()).await.unwrap();
    let top = cluster
        .endpoints
        .iter()
        .find(|e| e.id() == cluster.top())
        .unwrap();
    let coordinator = connector.connect(top).await.unwrap();

    let err = backup.bid(&Bid::new(1, "alice", 60)).await.unwrap_err();
    assert!(
        matches!(err, Error::NotCoordinator { coordinator: Some(id) } if id == cluster.top()),
        "unexpected {err:?}"
    );

    coordinator.bid(&Bid::new(1, "alice", 60)).await.unwrap();

    let err = coordinator.bid(&Bid::new(1, "alice", 70)).await.unwrap_err();
    assert!(matches!(err, Error::SelfRaiseRejected), "unexpected {err:?}");

    let err = coordinator.bid(&Bid::new(2, "bob", 60)).await.unwrap_err();
    assert!(
        matches!(err, Error::BidTooLow { amount: 60, highest: 60 }),
        "unexpected {err:?}"
    );

    // Announcements reach the replica and are taken as is
    backup.coordinator(4242).await.unwrap();
    let lowest = cluster.lowest().id();
    let node = cluster.nodes.iter().find(|n| n.id() == lowest).unwrap();
    assert_eq!(node.election().coordinator(), Some(4242));
}
