//! Outer authentication pipeline: discovery, then sequential failover
//!
//! The three historical client shapes (single node, multi-seed failover,
//! balancer discovery) collapse into one pipeline. Discovery is an optional
//! first phase: when enabled, the ranked list it returns becomes the
//! candidate set; when skipped, the seeds are the candidates directly.
//!
//! Candidates are tried one at a time. A connection opened for a candidate
//! serves exactly one handshake and is closed on every exit path before the
//! next candidate is touched. A server verdict (accepted or rejected) ends
//! the run; transport or protocol trouble advances to the next candidate;
//! running out of candidates is `AllNodesFailed` with per-node causes.

use rand::Rng;
use tracing::{info, warn};

use crate::directory::{NodeAddress, NodeDirectory};
use crate::discovery;
use crate::handshake::{Credential, Handshake, HandshakeOutcome, LoginVariant};
use crate::identity::DeviceIdentity;
use crate::transport::{Transport, TransportConfig};
use crate::types::{AuthError, Result};

/// Everything the pipeline needs besides credentials and the directory.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub transport: TransportConfig,
    /// Balancer endpoint path
    pub balancer_path: String,
    /// Authentication endpoint path
    pub auth_path: String,
    /// Port assigned to ranked hosts that arrive without one
    pub default_port: u16,
    /// Version tag included in every handshake message
    pub software_version: String,
    pub login_variant: LoginVariant,
    /// Go straight to the seeds, skipping the balancer phase
    pub skip_discovery: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            balancer_path: "/Bal".to_string(),
            auth_path: "/Auth".to_string(),
            default_port: 8080,
            software_version: "1.0".to_string(),
            login_variant: LoginVariant::default(),
            skip_discovery: false,
        }
    }
}

/// Run the full pipeline: discover candidates, then authenticate against
/// them in order until one yields a verdict.
pub async fn authenticate<R: Rng + Send>(
    directory: &mut NodeDirectory,
    credential: &Credential,
    identity: &DeviceIdentity,
    config: &SessionConfig,
    rng: &mut R,
) -> Result<HandshakeOutcome> {
    if !config.skip_discovery && !directory.has_dynamic() {
        let ranked = discovery::discover_nodes(
            directory.seeds(),
            &config.balancer_path,
            config.default_port,
            &config.transport,
            rng,
        )
        .await?;
        directory.set_dynamic(ranked);
    }

    let candidates = directory.candidates();
    if candidates.is_empty() {
        return Err(AuthError::Config("No candidate nodes configured".into()));
    }

    let mut causes = Vec::new();
    for node in &candidates {
        info!("Attempting authentication against {}", node);

        match attempt_node(node, credential, identity, config, rng).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) if e.is_failover() => {
                warn!("Node {} failed: {}", node, e);
                causes.push((node.to_string(), e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }

    Err(AuthError::AllNodesFailed(causes))
}

/// One node, one connection, one handshake. The connection is closed on
/// every exit path.
async fn attempt_node<R: Rng + Send>(
    node: &NodeAddress,
    credential: &Credential,
    identity: &DeviceIdentity,
    config: &SessionConfig,
    rng: &mut R,
) -> Result<HandshakeOutcome> {
    let mut transport = Transport::connect(node, &config.auth_path, &config.transport).await?;

    let mut handshake = Handshake::new(identity, &config.software_version, config.login_variant);
    let result = handshake.run(&mut transport, credential, rng).await;

    transport.close().await;
    result
}
