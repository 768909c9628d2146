//! Replica membership discovery
//!
//! The cluster is a fixed endpoint list. A periodic sweep dials every
//! endpoint that has no handle yet; handles are kept for the life of the
//! process and never replaced or pruned.

use crate::common::{Endpoint, NodeId};
use crate::peer::{Connector, PeerHandle};
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Default)]
struct Peers {
    all: BTreeMap<NodeId, PeerHandle>,
    /// Subset of `all` ranked above this node
    higher: BTreeMap<NodeId, PeerHandle>,
}

pub struct MembershipTable {
    node_id: NodeId,
    endpoints: Vec<Endpoint>,
    connector: Arc<dyn Connector>,
    connect_timeout: Duration,
    peers: RwLock<Peers>,
}

impl MembershipTable {
    /// `endpoints` may include this node; it is skipped.
    pub fn new(
        node_id: NodeId,
        endpoints: Vec<Endpoint>,
        connector: Arc<dyn Connector>,
        connect_timeout: Duration,
    ) -> Self {
        let endpoints = endpoints
            .into_iter()
            .filter(|endpoint| endpoint.id() != node_id)
            .collect();
        Self {
            node_id,
            endpoints,
            connector,
            connect_timeout,
            peers: RwLock::new(Peers::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Peers> {
        self.peers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Peers> {
        self.peers
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Dial every endpoint without a handle yet. Returns how many peers were
    /// added by this sweep.
    pub async fn sweep(&self) -> usize {
        let missing: Vec<&Endpoint> = {
            let peers = self.read();
            self.endpoints
                .iter()
                .filter(|endpoint| !peers.all.contains_key(&endpoint.id()))
                .collect()
        };
        if missing.is_empty() {
            return 0;
        }

        let dials = missing.into_iter().map(|endpoint| async move {
            let dialed =
                tokio::time::timeout(self.connect_timeout, self.connector.connect(endpoint)).await;
            match dialed {
                Ok(Ok(handle)) => Some((endpoint.id(), handle)),
                Ok(Err(e)) => {
                    tracing::debug!("dial {} failed: {}", endpoint, e);
                    None
                }
                Err(_) => {
                    tracing::debug!("dial {} timed out", endpoint);
                    None
                }
            }
        });
        let dialed: Vec<_> = join_all(dials).await.into_iter().flatten().collect();

        let mut added = 0;
        let mut peers = self.write();
        for (id, handle) in dialed {
            if peers.all.contains_key(&id) {
                continue;
            }
            peers.all.insert(id, handle.clone());
            if id > self.node_id {
                peers.higher.insert(id, handle);
            }
            added += 1;
            tracing::info!("Node {} discovered peer {}", self.node_id, id);
        }
        added
    }

    /// Sweep every `interval`, forever
    pub fn spawn_discovery(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                self.sweep().await;
                tokio::time::sleep(interval).await;
            }
        })
    }

    pub fn get(&self, id: NodeId) -> Option<PeerHandle> {
        self.read().all.get(&id).cloned()
    }

    pub fn all_peers(&self) -> Vec<PeerHandle> {
        self.read().all.values().cloned().collect()
    }

    pub fn higher_peers(&self) -> Vec<PeerHandle> {
        self.read().higher.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().all.is_empty()
    }

    pub fn higher_len(&self) -> usize {
        self.read().higher.len()
    }

    /// Ranks of every discovered peer
    pub fn known_ids(&self) -> Vec<NodeId> {
        self.read().all.keys().copied().collect()
    }

    /// Ranks of every configured peer, discovered or not
    pub fn endpoint_ids(&self) -> Vec<NodeId> {
        self.endpoints.iter().map(Endpoint::id).collect()
    }
}
