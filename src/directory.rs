//! Node directory: seeds and the dynamically ranked node list
//!
//! Seeds are the statically configured entry points and the input to the
//! balancer-discovery phase. Once a balancer query succeeds, the ranked list
//! fully supersedes the seeds for authentication; the BTreeMap keeps the
//! server-assigned priorities in ascending order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One front-end node. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddress {
    pub host: String,
    pub port: u16,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// WebSocket URL for this node and endpoint path.
    pub fn url(&self, tls: bool, path: &str) -> String {
        let scheme = if tls { "wss" } else { "ws" };
        format!("{}://{}{}", scheme, self, path)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // IPv6 literals need brackets next to a port
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Seed list plus the ranked node list from the balancer.
#[derive(Debug, Clone, Default)]
pub struct NodeDirectory {
    seeds: Vec<NodeAddress>,
    dynamic: BTreeMap<u32, NodeAddress>,
}

impl NodeDirectory {
    pub fn new(seeds: Vec<NodeAddress>) -> Self {
        Self {
            seeds,
            dynamic: BTreeMap::new(),
        }
    }

    pub fn seeds(&self) -> &[NodeAddress] {
        &self.seeds
    }

    /// Install the ranked list returned by a balancer query.
    pub fn set_dynamic(&mut self, nodes: BTreeMap<u32, NodeAddress>) {
        self.dynamic = nodes;
    }

    pub fn has_dynamic(&self) -> bool {
        !self.dynamic.is_empty()
    }

    /// Candidates for the authentication phase, best first.
    ///
    /// The ranked list supersedes the seeds entirely once present; the seeds
    /// are only a fallback for directories that never ran discovery.
    pub fn candidates(&self) -> Vec<NodeAddress> {
        if self.dynamic.is_empty() {
            self.seeds.clone()
        } else {
            self.dynamic.values().cloned().collect()
        }
    }
}
