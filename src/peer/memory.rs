//! In-process network
//!
//! Routes peer calls straight to [`Node`] values living in the same process.
//! Nodes can be marked down to emulate a crash: every call to them then fails
//! as if it had timed out, and dials to them are refused.

use crate::common::{Endpoint, NodeId, Result};
use crate::node::auction::{AuctionResult, Bid};
use crate::node::Node;
use crate::peer::{Connector, PeerClient, PeerHandle};
use crate::Error;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, Weak};

#[derive(Default)]
struct NetworkState {
    nodes: HashMap<NodeId, Weak<Node>>,
    down: HashSet<NodeId>,
}

#[derive(Clone, Default)]
pub struct MemoryNetwork {
    state: Arc<RwLock<NetworkState>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector handing out handles on this network
    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(MemoryConnector {
            network: self.clone(),
        })
    }

    /// Make `node` reachable under its rank
    pub fn register(&self, node: &Arc<Node>) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .nodes
            .insert(node.id(), Arc::downgrade(node));
    }

    pub fn set_down(&self, id: NodeId, down: bool) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if down {
            state.down.insert(id);
        } else {
            state.down.remove(&id);
        }
    }

    pub fn is_down(&self, id: NodeId) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .down
            .contains(&id)
    }

    /// Handle to `id` without dialing; calls fail while it is unreachable.
    pub fn peer(&self, id: NodeId) -> PeerHandle {
        Arc::new(MemoryPeer {
            id,
            network: self.clone(),
        })
    }

    fn reach(&self, id: NodeId) -> Result<Arc<Node>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if state.down.contains(&id) {
            return Err(Error::PeerUnavailable(id));
        }
        state
            .nodes
            .get(&id)
            .and_then(Weak::upgrade)
            .ok_or(Error::PeerUnavailable(id))
    }
}

struct MemoryConnector {
    network: MemoryNetwork,
}

#[tonic::async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<PeerHandle> {
        self.network.reach(endpoint.id())?;
        Ok(self.network.peer(endpoint.id()))
    }
}

struct MemoryPeer {
    id: NodeId,
    network: MemoryNetwork,
}

#[tonic::async_trait]
impl PeerClient for MemoryPeer {
    fn id(&self) -> NodeId {
        self.id
    }

    async fn election(&self) -> Result<()> {
        self.network.reach(self.id)?.on_election();
        Ok(())
    }

    async fn coordinator(&self, coordinator: NodeId) -> Result<()> {
        self.network.reach(self.id)?.on_coordinator(coordinator);
        Ok(())
    }

    async fn bid(&self, bid: &Bid) -> Result<()> {
        let node = self.network.reach(self.id)?;
        node.bid(bid).await
    }

    async fn result(&self) -> Result<AuctionResult> {
        Ok(self.network.reach(self.id)?.result())
    }
}
