//! Shared helpers for cluster tests
#![allow(dead_code)]

use gavel::common::{AuctionConfig, Endpoint, NodeConfig, NodeId};
use gavel::node::NodeTasks;
use gavel::peer::memory::MemoryNetwork;
use gavel::Node;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Short timeouts and a countdown that never moves during a test
pub fn fast_config(id: NodeId, cluster: Vec<Endpoint>) -> NodeConfig {
    NodeConfig {
        grpc_addr: SocketAddr::from(([127, 0, 0, 1], id)),
        cluster,
        rpc_timeout_ms: 300,
        discovery_interval_ms: 20,
        startup_election_delay_ms: 20,
        auction: AuctionConfig {
            tick_ms: 600_000,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Poll `check` until it holds, panicking after a few seconds
pub async fn eventually<F: Fn() -> bool>(what: &str, check: F) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Nodes wired through an in-process network
pub struct MemoryCluster {
    pub network: MemoryNetwork,
    pub nodes: Vec<Arc<Node>>,
    tasks: Vec<(NodeId, NodeTasks)>,
}

impl MemoryCluster {
    pub fn new(ids: &[NodeId]) -> Self {
        let network = MemoryNetwork::new();
        let endpoints: Vec<Endpoint> = ids.iter().map(|id| Endpoint::new("memory", *id)).collect();
        let nodes = ids
            .iter()
            .map(|id| {
                let node = Arc::new(Node::new(
                    fast_config(*id, endpoints.clone()),
                    network.connector(),
                ));
                network.register(&node);
                node
            })
            .collect();
        Self {
            network,
            nodes,
            tasks: Vec::new(),
        }
    }

    /// Spawn the background tasks of every node that is not down
    pub fn start(&mut self) {
        for node in &self.nodes {
            if self.network.is_down(node.id()) {
                continue;
            }
            self.tasks
                .push((node.id(), node.start().expect("node starts once")));
        }
    }

    /// Cut `id` off the network and stop its tasks
    pub fn crash(&mut self, id: NodeId) {
        self.network.set_down(id, true);
        for (_, tasks) in self.tasks.iter().filter(|(owner, _)| *owner == id) {
            tasks.abort();
        }
    }

    /// One discovery sweep on every node
    pub async fn discover(&self) {
        for node in &self.nodes {
            node.membership().sweep().await;
        }
    }

    pub fn node(&self, id: NodeId) -> &Arc<Node> {
        self.nodes
            .iter()
            .find(|node| node.id() == id)
            .expect("node in cluster")
    }

    /// Nodes that believe they are coordinator
    pub fn self_coordinators(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|node| node.election().is_coordinator())
            .map(|node| node.id())
            .collect()
    }

    /// Every live node believes in `coordinator`
    pub fn settled_on(&self, coordinator: NodeId) -> bool {
        self.nodes
            .iter()
            .filter(|node| !self.network.is_down(node.id()))
            .all(|node| node.election().coordinator() == Some(coordinator))
    }
}

impl Drop for MemoryCluster {
    fn drop(&mut self) {
        for (_, tasks) in &self.tasks {
            tasks.abort();
        }
    }
}
