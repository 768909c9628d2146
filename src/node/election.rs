//! Bully-style coordinator election
//!
//! A round probes every higher-ranked peer in parallel. Any acknowledgement
//! means a stronger node is alive and this node backs off; silence means this
//! node declares itself coordinator and announces it to everyone.
//!
//! Rounds are run by one runner task fed through a bounded signal queue, so
//! RPC handlers never wait on a multi-peer round. A full queue drops the new
//! signal.
//!
//! There are no terms: the last Coordinator announcement received wins, even
//! one produced by an older round. Concurrent rounds on different nodes can
//! therefore leave beliefs briefly inconsistent until the highest live node
//! announces again.

use crate::common::{lock, NodeId};
use crate::node::membership::MembershipTable;
use crate::peer::{with_timeout, PeerHandle};
use futures_util::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

/// Role of a node in the election protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectionRole {
    Idle,
    ElectionInProgress,
    Coordinator,
    Backup,
}

impl std::fmt::Display for ElectionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElectionRole::Idle => write!(f, "idle"),
            ElectionRole::ElectionInProgress => write!(f, "election in progress"),
            ElectionRole::Coordinator => write!(f, "coordinator"),
            ElectionRole::Backup => write!(f, "backup"),
        }
    }
}

/// Why a round was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionSignal {
    /// The node just booted
    Startup,
    /// A lower-ranked peer probed this node
    ProbeReceived,
    /// A bid found the believed coordinator unreachable
    CoordinatorUnreachable,
}

/// How a round ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionOutcome {
    /// No higher peer answered; this node is coordinator
    Elected,
    /// A higher peer answered; waiting for its announcement
    Deferred,
    /// Another round was already running on this node
    AlreadyRunning,
}

#[derive(Debug)]
struct ElectionState {
    role: ElectionRole,
    coordinator: Option<NodeId>,
    running: bool,
}

/// Counters exposed on the admin API
#[derive(Debug, Default)]
pub struct ElectionStats {
    started: AtomicU64,
    won: AtomicU64,
    deferred: AtomicU64,
    dropped_signals: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ElectionStatsSnapshot {
    pub started: u64,
    pub won: u64,
    pub deferred: u64,
    pub dropped_signals: u64,
}

impl ElectionStats {
    pub fn snapshot(&self) -> ElectionStatsSnapshot {
        ElectionStatsSnapshot {
            started: self.started.load(Ordering::Relaxed),
            won: self.won.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            dropped_signals: self.dropped_signals.load(Ordering::Relaxed),
        }
    }
}

pub struct ElectionEngine {
    node_id: NodeId,
    membership: Arc<MembershipTable>,
    rpc_timeout: Duration,
    state: Mutex<ElectionState>,
    signals: mpsc::Sender<ElectionSignal>,
    stats: ElectionStats,
}

impl ElectionEngine {
    /// Build the engine and the receiving end of its signal queue, to be
    /// handed to [`ElectionEngine::spawn_runner`].
    pub fn new(
        node_id: NodeId,
        membership: Arc<MembershipTable>,
        rpc_timeout: Duration,
        queue_capacity: usize,
    ) -> (Self, mpsc::Receiver<ElectionSignal>) {
        let (signals, rx) = mpsc::channel(queue_capacity.max(1));
        let engine = Self {
            node_id,
            membership,
            rpc_timeout,
            state: Mutex::new(ElectionState {
                role: ElectionRole::Idle,
                coordinator: None,
                running: false,
            }),
            signals,
            stats: ElectionStats::default(),
        };
        (engine, rx)
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn role(&self) -> ElectionRole {
        let state = lock(&self.state);
        if state.running {
            ElectionRole::ElectionInProgress
        } else {
            state.role
        }
    }

    /// Who this node believes is coordinator
    pub fn coordinator(&self) -> Option<NodeId> {
        lock(&self.state).coordinator
    }

    pub fn is_coordinator(&self) -> bool {
        self.coordinator() == Some(self.node_id)
    }

    pub fn stats(&self) -> ElectionStatsSnapshot {
        self.stats.snapshot()
    }

    /// Queue a round without waiting. Returns `false` if the queue was full
    /// and the signal was dropped.
    pub fn trigger(&self, signal: ElectionSignal) -> bool {
        match self.signals.try_send(signal) {
            Ok(()) => true,
            Err(TrySendError::Full(signal)) => {
                self.stats.dropped_signals.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Node {} dropped election signal {:?}", self.node_id, signal);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// An `Election` probe arrived: acknowledge by returning, and re-evaluate
    /// our own candidacy in the background.
    pub fn handle_election_probe(&self) {
        self.trigger(ElectionSignal::ProbeReceived);
    }

    /// A `Coordinator` announcement arrived. Always accepted.
    pub fn handle_coordinator(&self, coordinator: NodeId) {
        let mut state = lock(&self.state);
        let previous = state.coordinator.replace(coordinator);
        state.role = if coordinator == self.node_id {
            ElectionRole::Coordinator
        } else {
            ElectionRole::Backup
        };
        drop(state);

        if previous != Some(coordinator) {
            tracing::info!(
                "Node {} now follows coordinator {}",
                self.node_id,
                coordinator
            );
        }
    }

    /// Run one bully round.
    ///
    /// A deferred round keeps the current belief until the higher peer
    /// announces. If that belief is still this node, it stays coordinator
    /// and keeps reporting the `Coordinator` role.
    pub async fn run_election(&self) -> ElectionOutcome {
        {
            let mut state = lock(&self.state);
            if state.running {
                return ElectionOutcome::AlreadyRunning;
            }
            state.running = true;
        }
        self.stats.started.fetch_add(1, Ordering::Relaxed);

        let higher = self.membership.higher_peers();
        let probes = higher
            .iter()
            .map(|peer| with_timeout(peer.id(), self.rpc_timeout, peer.election()));
        let acks = join_all(probes)
            .await
            .into_iter()
            .zip(&higher)
            .filter(|(res, peer)| match res {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!("Election probe to {} failed: {}", peer.id(), e);
                    false
                }
            })
            .count();

        if acks > 0 {
            let mut state = lock(&self.state);
            state.role = if state.coordinator == Some(self.node_id) {
                ElectionRole::Coordinator
            } else {
                ElectionRole::Backup
            };
            state.running = false;
            drop(state);
            self.stats.deferred.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                "Node {} deferred to {} higher peer(s)",
                self.node_id,
                acks
            );
            return ElectionOutcome::Deferred;
        }

        {
            let mut state = lock(&self.state);
            state.coordinator = Some(self.node_id);
            state.role = ElectionRole::Coordinator;
            state.running = false;
        }
        self.stats.won.fetch_add(1, Ordering::Relaxed);
        tracing::info!("Node {} is now the coordinator", self.node_id);

        self.announce(self.membership.all_peers()).await;
        ElectionOutcome::Elected
    }

    /// Best-effort `Coordinator(self)` broadcast, each call timed out
    async fn announce(&self, peers: Vec<PeerHandle>) {
        let calls = peers.iter().map(|peer| {
            with_timeout(peer.id(), self.rpc_timeout, peer.coordinator(self.node_id))
        });
        for (res, peer) in join_all(calls).await.into_iter().zip(&peers) {
            if let Err(e) = res {
                tracing::debug!("Coordinator announcement to {} failed: {}", peer.id(), e);
            }
        }
    }

    /// Liveness check of the believed coordinator
    pub async fn probe_coordinator(&self) -> bool {
        let Some(coordinator) = self.coordinator() else {
            return false;
        };
        if coordinator == self.node_id {
            return true;
        }
        let Some(peer) = self.membership.get(coordinator) else {
            return false;
        };
        match with_timeout(coordinator, self.rpc_timeout, peer.election()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    "Node {} lost coordinator {}: {}",
                    self.node_id,
                    coordinator,
                    e
                );
                false
            }
        }
    }

    /// Consume the signal queue, one round per signal
    pub fn spawn_runner(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<ElectionSignal>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(signal) = rx.recv().await {
                tracing::debug!("Node {} starting election ({:?})", self.node_id, signal);
                self.run_election().await;
            }
        })
    }
}
