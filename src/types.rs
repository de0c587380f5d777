//! Error taxonomy and crate-wide Result alias
//!
//! Connection and protocol errors are non-fatal per node: the failover loop
//! catches them and advances to the next candidate. Server-reported outcomes
//! (key exchange refused, login rejected) are surfaced verbatim and never
//! retried with the same credentials.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    /// TCP/WebSocket connect did not complete within the configured timeout
    #[error("Connect timeout after {0:?}")]
    ConnectTimeout(std::time::Duration),

    /// Connection refused, reset, or the upgrade was rejected by the peer
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Peer went silent mid-handshake
    #[error("Read timeout after {0:?}")]
    ReadTimeout(std::time::Duration),

    /// Frame decoded but was not the JSON we expected
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Server answered the key request with a non-success status
    #[error("Key exchange failed: {0}")]
    KeyExchangeFailed(String),

    /// No seed produced a usable node list
    #[error("Discovery exhausted: no seed returned a node list ({0} seed(s) tried)")]
    DiscoveryExhausted(usize),

    /// Every candidate node failed to connect or handshake
    #[error("All nodes failed: {}", format_causes(.0))]
    AllNodesFailed(Vec<(String, String)>),

    /// Configuration rejected before any connection was attempted
    #[error("Configuration error: {0}")]
    Config(String),
}

fn format_causes(causes: &[(String, String)]) -> String {
    causes
        .iter()
        .map(|(node, cause)| format!("{node}: {cause}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl AuthError {
    /// Whether the failover loop should advance to the next candidate.
    ///
    /// Server-reported rejections are terminal for the run; transport and
    /// protocol trouble is only terminal for the current node.
    pub fn is_failover(&self) -> bool {
        matches!(
            self,
            AuthError::ConnectTimeout(_)
                | AuthError::Connection(_)
                | AuthError::ReadTimeout(_)
                | AuthError::Protocol(_)
                | AuthError::KeyExchangeFailed(_)
        )
    }
}
