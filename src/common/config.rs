//! Configuration for gavel nodes

use crate::common::{Endpoint, NodeId};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `GAVEL__AUCTION__STARTING_BID=100`
pub const ENV_PREFIX: &str = "GAVEL";

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Bind address for the gRPC API. Its port is the node's rank.
    pub grpc_addr: SocketAddr,

    /// Optional bind address for the admin HTTP API
    pub http_addr: Option<SocketAddr>,

    /// Every member of the cluster, self included
    pub cluster: Vec<Endpoint>,

    /// Per-call timeout for peer RPCs
    pub rpc_timeout_ms: u64,

    /// Interval between discovery sweeps
    pub discovery_interval_ms: u64,

    /// Delay before the election a node runs after boot
    pub startup_election_delay_ms: u64,

    /// Capacity of the election signal queue
    pub election_queue_capacity: usize,

    /// Logging level
    pub log_level: String,

    pub auction: AuctionConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            grpc_addr: SocketAddr::from(([0, 0, 0, 0], 5002)),
            http_addr: None,
            cluster: (5000..=5002)
                .map(|port| Endpoint::new("127.0.0.1", port))
                .collect(),
            rpc_timeout_ms: 1_000,
            discovery_interval_ms: 1_000,
            startup_election_delay_ms: 1_000,
            election_queue_capacity: 10,
            log_level: "info".to_string(),
            auction: AuctionConfig::default(),
        }
    }
}

/// When the auction countdown begins
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimerStart {
    /// Count down from node startup
    #[default]
    Boot,
    /// Count down once the first bid is accepted
    FirstBid,
}

impl std::str::FromStr for TimerStart {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "boot" => Ok(TimerStart::Boot),
            "first-bid" => Ok(TimerStart::FirstBid),
            other => Err(Error::InvalidConfig(format!("unknown timer start: {other}"))),
        }
    }
}

/// Starting parameters of the auction each replica hosts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuctionConfig {
    pub starting_bid: i64,

    /// Auction length, in ticks
    pub duration_secs: i64,

    /// Length of one tick
    pub tick_ms: u64,

    pub timer_start: TimerStart,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            starting_bid: 50,
            duration_secs: 120,
            tick_ms: 1_000,
            timer_start: TimerStart::Boot,
        }
    }
}

impl AuctionConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl NodeConfig {
    /// Load configuration from an optional TOML file, then `GAVEL__*`
    /// environment variables. Missing values fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cluster")
                    .try_parsing(true),
            )
            .build()?;

        let config: NodeConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no node can run with
    pub fn validate(&self) -> Result<()> {
        if self.rpc_timeout_ms == 0 {
            return Err(Error::InvalidConfig("rpc_timeout_ms must be > 0".into()));
        }
        if self.discovery_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "discovery_interval_ms must be > 0".into(),
            ));
        }
        if self.election_queue_capacity == 0 {
            return Err(Error::InvalidConfig(
                "election_queue_capacity must be > 0".into(),
            ));
        }
        if self.auction.tick_ms == 0 {
            return Err(Error::InvalidConfig("auction.tick_ms must be > 0".into()));
        }
        if self.auction.duration_secs < 0 {
            return Err(Error::InvalidConfig(
                "auction.duration_secs must not be negative".into(),
            ));
        }

        let mut seen = HashSet::new();
        for endpoint in &self.cluster {
            if !seen.insert(endpoint.id()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate cluster rank {}",
                    endpoint.id()
                )));
            }
        }
        Ok(())
    }

    /// This node's rank
    pub fn node_id(&self) -> NodeId {
        self.grpc_addr.port()
    }

    /// Cluster members other than this node
    pub fn peers(&self) -> Vec<Endpoint> {
        let id = self.node_id();
        self.cluster
            .iter()
            .filter(|endpoint| endpoint.id() != id)
            .cloned()
            .collect()
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_millis(self.discovery_interval_ms)
    }

    pub fn startup_election_delay(&self) -> Duration {
        Duration::from_millis(self.startup_election_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_three_node_cluster() {
        let config = NodeConfig::default();
        assert_eq!(config.node_id(), 5002);
        assert_eq!(config.auction.starting_bid, 50);
        assert_eq!(config.auction.duration_secs, 120);
        assert_eq!(config.election_queue_capacity, 10);
        let peers: Vec<_> = config.peers().iter().map(Endpoint::id).collect();
        assert_eq!(peers, vec![5000, 5001]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_duplicate_ranks() {
        let config = NodeConfig {
            cluster: vec![Endpoint::new("a", 5000), Endpoint::new("b", 5000)],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn validate_rejects_zero_timeouts() {
        let config = NodeConfig {
            rpc_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut config = NodeConfig::default();
        config.auction.tick_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn timer_start_parses_cli_spelling() {
        assert_eq!("boot".parse::<TimerStart>().unwrap(), TimerStart::Boot);
        assert_eq!(
            "first-bid".parse::<TimerStart>().unwrap(),
            TimerStart::FirstBid
        );
        assert!("later".parse::<TimerStart>().is_err());
    }
}
