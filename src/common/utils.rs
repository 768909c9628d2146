//! Cluster identity and small shared helpers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Rank of a cluster member. It is the node's listen port, so it doubles as
/// its network address and its election priority (higher wins).
pub type NodeId = u16;

/// A statically configured cluster member, written `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn id(&self) -> NodeId {
        self.port
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// URI used to dial the endpoint over gRPC
    pub fn uri(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let s = s.trim();
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| crate::Error::InvalidConfig(format!("endpoint without port: {s}")))?;
        if host.is_empty() {
            return Err(crate::Error::InvalidConfig(format!(
                "endpoint without host: {s}"
            )));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| crate::Error::InvalidConfig(format!("invalid endpoint port: {s}")))?;
        Ok(Self::new(host, port))
    }
}

impl TryFrom<String> for Endpoint {
    type Error = crate::Error;

    fn try_from(s: String) -> crate::Result<Self> {
        s.parse()
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_string()
    }
}

/// Lock a mutex, recovering the data if a holder panicked.
///
/// None of the guarded sections leave their data half-updated, so a poisoned
/// lock still holds a consistent value.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_rank_is_port() {
        let endpoint: Endpoint = "127.0.0.1:5001".parse().unwrap();
        assert_eq!(endpoint.id(), 5001);
        assert_eq!(endpoint.host(), "127.0.0.1");
        assert_eq!(endpoint.uri(), "http://127.0.0.1:5001");
        assert_eq!(endpoint.to_string(), "127.0.0.1:5001");
    }

    #[test]
    fn endpoint_rejects_garbage() {
        assert!("localhost".parse::<Endpoint>().is_err());
        assert!(":5000".parse::<Endpoint>().is_err());
        assert!("localhost:http".parse::<Endpoint>().is_err());
        assert!("localhost:70000".parse::<Endpoint>().is_err());
    }

    #[test]
    fn endpoint_serde_uses_string_form() {
        let endpoint = Endpoint::new("node-a", 5000);
        let json = serde_json::to_string(&endpoint).unwrap();
        assert_eq!(json, "\"node-a:5000\"");
        let back: Endpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, endpoint);
    }
}
