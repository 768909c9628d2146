//! Bidder session
//!
//! A client talks to one replica at a time, starting with the highest rank.
//! When that replica is unreachable or turns out to be a backup, the session
//! moves on to another replica and tries again.

use crate::client::aggregator::{ResultAggregator, Verdict};
use crate::common::{Endpoint, NodeId, Result};
use crate::node::auction::{AuctionResult, Bid};
use crate::peer::{with_timeout, Connector, PeerHandle};
use crate::Error;
use futures_util::future::join_all;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per operation, across all replicas
    pub max_attempts: usize,
    /// Pause between attempts
    pub retry_delay: Duration,
    /// Upper bound of the random extra pause
    pub jitter: Duration,
}

impl RetryPolicy {
    /// Two passes over the cluster
    pub fn for_replicas(replicas: usize) -> Self {
        Self {
            max_attempts: replicas.max(1) * 2,
            retry_delay: Duration::from_millis(500),
            jitter: Duration::from_millis(250),
        }
    }

    fn pause(&self) -> Duration {
        let jitter = self.jitter.as_millis() as u64;
        let extra = if jitter == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter)
        };
        self.retry_delay + Duration::from_millis(extra)
    }
}

pub struct BidderSession {
    bidder_id: i32,
    name: String,
    /// Highest rank first
    replicas: Vec<Endpoint>,
    connector: Arc<dyn Connector>,
    timeout: Duration,
    policy: RetryPolicy,
    handles: HashMap<NodeId, PeerHandle>,
    current: usize,
}

impl BidderSession {
    pub fn new(
        bidder_id: i32,
        name: impl Into<String>,
        mut replicas: Vec<Endpoint>,
        connector: Arc<dyn Connector>,
        timeout: Duration,
    ) -> Self {
        replicas.sort_by_key(|endpoint| std::cmp::Reverse(endpoint.id()));
        let policy = RetryPolicy::for_replicas(replicas.len());
        Self {
            bidder_id,
            name: name.into(),
            replicas,
            connector,
            timeout,
            policy,
            handles: HashMap::new(),
            current: 0,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replica the next call goes to
    pub fn current_replica(&self) -> Option<NodeId> {
        self.replicas.get(self.current).map(Endpoint::id)
    }

    async fn handle(&mut self, endpoint: &Endpoint) -> Result<PeerHandle> {
        if let Some(handle) = self.handles.get(&endpoint.id()) {
            return Ok(handle.clone());
        }
        let handle = with_timeout(endpoint.id(), self.timeout, self.connector.connect(endpoint))
            .await?;
        tracing::info!("Connection established to {}", endpoint);
        self.handles.insert(endpoint.id(), handle.clone());
        Ok(handle)
    }

    /// Move to `hint` if it is a known replica, else to the next one.
    fn retarget(&mut self, hint: Option<NodeId>) {
        let hinted = hint.and_then(|id| self.replicas.iter().position(|e| e.id() == id));
        self.current = match hinted {
            Some(index) if index != self.current => index,
            _ => (self.current + 1) % self.replicas.len(),
        };
    }

    fn endpoint(&self) -> Result<Endpoint> {
        self.replicas
            .get(self.current)
            .cloned()
            .ok_or_else(|| Error::InvalidConfig("no replicas configured".into()))
    }

    /// Place a bid of `amount`, retrying against other replicas on transport
    /// failures and `NotCoordinator`. Returns the replica that accepted it.
    pub async fn place_bid(&mut self, amount: i64) -> Result<NodeId> {
        let bid = Bid::new(self.bidder_id, self.name.clone(), amount);
        let mut last_err = None;

        for attempt in 0..self.policy.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.policy.pause()).await;
            }
            let endpoint = self.endpoint()?;
            let outcome = match self.handle(&endpoint).await {
                Ok(peer) => with_timeout(endpoint.id(), self.timeout, peer.bid(&bid)).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => {
                    tracing::info!("Successfully placed bid of {} at {}", amount, endpoint);
                    return Ok(endpoint.id());
                }
                Err(Error::NotCoordinator { coordinator }) => {
                    tracing::info!("{} is a backup server, retargeting", endpoint);
                    self.retarget(coordinator);
                    last_err = Some(Error::NotCoordinator { coordinator });
                }
                Err(e) if e.is_transport() => {
                    tracing::info!("Connection to {} lost: {}", endpoint, e);
                    self.retarget(None);
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| Error::InvalidConfig("no retry attempts allowed".into())))
    }

    /// Read the result from the current replica, moving on when it is
    /// unreachable.
    pub async fn result(&mut self) -> Result<AuctionResult> {
        let mut last_err = None;

        for attempt in 0..self.policy.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.policy.pause()).await;
            }
            let endpoint = self.endpoint()?;
            let outcome = match self.handle(&endpoint).await {
                Ok(peer) => with_timeout(endpoint.id(), self.timeout, peer.result()).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transport() => {
                    tracing::info!("Connection to {} lost: {}", endpoint, e);
                    self.retarget(None);
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| Error::InvalidConfig("no retry attempts allowed".into())))
    }

    /// Ask every replica and resolve by majority. Replicas without a cached
    /// handle are dialed concurrently first.
    pub async fn majority_result(&mut self) -> Verdict {
        let missing: Vec<Endpoint> = self
            .replicas
            .iter()
            .filter(|endpoint| !self.handles.contains_key(&endpoint.id()))
            .cloned()
            .collect();

        let connector = &self.connector;
        let timeout = self.timeout;
        let dials = missing.iter().map(|endpoint| async move {
            let dialed = with_timeout(endpoint.id(), timeout, connector.connect(endpoint)).await;
            (endpoint, dialed)
        });
        for (endpoint, dialed) in join_all(dials).await {
            match dialed {
                Ok(handle) => {
                    tracing::info!("Connection established to {}", endpoint);
                    self.handles.insert(endpoint.id(), handle);
                }
                Err(e) => tracing::debug!("Could not reach {}: {}", endpoint, e),
            }
        }

        let handles = self
            .replicas
            .iter()
            .filter_map(|endpoint| self.handles.get(&endpoint.id()).cloned())
            .collect();
        ResultAggregator::new(handles, self.timeout).query().await
    }
}
