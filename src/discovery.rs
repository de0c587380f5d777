//! Balancer discovery: ask the seeds for the ranked node list
//!
//! Single pass over the seeds, in order. Each seed gets one short-lived
//! connection to the balancer endpoint, one query, one response. The first
//! response carrying a non-empty node mapping wins and no further seeds are
//! tried; a seed that fails to connect or answers garbage is logged and
//! skipped. No retries, no backoff.

use std::collections::BTreeMap;

use rand::Rng;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::directory::NodeAddress;
use crate::identity;
use crate::transport::{Transport, TransportConfig};
use crate::types::{AuthError, Result};

/// Query the seeds for a ranked node list.
///
/// `default_port` is assigned to ranked hosts that arrive without an
/// explicit port. Fails with `DiscoveryExhausted` once every seed has been
/// tried without a usable mapping.
pub async fn discover_nodes<R: Rng>(
    seeds: &[NodeAddress],
    balancer_path: &str,
    default_port: u16,
    config: &TransportConfig,
    rng: &mut R,
) -> Result<BTreeMap<u32, NodeAddress>> {
    for seed in seeds {
        match query_seed(seed, balancer_path, default_port, config, rng).await {
            Ok(nodes) if !nodes.is_empty() => {
                info!("Balancer at {} returned {} node(s)", seed, nodes.len());
                return Ok(nodes);
            }
            Ok(_) => {
                warn!("Balancer at {} returned an empty node list", seed);
            }
            Err(e) => {
                warn!("Balancer query to {} failed: {}", seed, e);
            }
        }
    }

    Err(AuthError::DiscoveryExhausted(seeds.len()))
}

/// One connect/query/close cycle against a single seed.
async fn query_seed<R: Rng>(
    seed: &NodeAddress,
    balancer_path: &str,
    default_port: u16,
    config: &TransportConfig,
    rng: &mut R,
) -> Result<BTreeMap<u32, NodeAddress>> {
    let mut transport = Transport::connect(seed, balancer_path, config).await?;

    let id = identity::correlation_id(rng);
    debug!("Balancer query to {} (id {})", seed, id);

    let query = json!({
        "action": "Balancer",
        "subaction": "Query",
        "id": id,
    });

    let result = async {
        transport.send(&query).await?;
        let response = transport.receive().await?;
        parse_node_list(&response, default_port)
    }
    .await;

    transport.close().await;
    result
}

/// Extract the priority→node mapping from a balancer response.
///
/// Priorities arrive as string keys; hosts may carry an explicit port
/// (`"host:port"`) or fall back to `default_port`. Entries that do not
/// parse are skipped rather than failing the whole response.
fn parse_node_list(response: &Value, default_port: u16) -> Result<BTreeMap<u32, NodeAddress>> {
    let nodes = response
        .get("nodes")
        .and_then(Value::as_object)
        .ok_or_else(|| AuthError::Protocol("Balancer response missing 'nodes' object".into()))?;

    let mut ranked = BTreeMap::new();
    for (priority, host) in nodes {
        let Ok(priority) = priority.parse::<u32>() else {
            warn!("Skipping node with non-numeric priority {:?}", priority);
            continue;
        };
        let Some(host) = host.as_str() else {
            warn!("Skipping node at priority {} with non-string host", priority);
            continue;
        };
        ranked.insert(priority, parse_host(host, default_port));
    }

    Ok(ranked)
}

fn parse_host(host: &str, default_port: u16) -> NodeAddress {
    // Bracketed IPv6, with or without a port: [addr]:port or [addr]
    if let Some(rest) = host.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((h, tail)) => {
                let port = tail
                    .strip_prefix(':')
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(default_port);
                NodeAddress::new(h, port)
            }
            None => NodeAddress::new(rest, default_port),
        };
    }
    // More than one colon means a bare IPv6 literal, not host:port
    if host.matches(':').count() > 1 {
        return NodeAddress::new(host, default_port);
    }

    match host.rsplit_once(':') {
        Some((h, p)) => match p.parse::<u16>() {
            Ok(port) => NodeAddress::new(h, port),
            Err(_) => NodeAddress::new(host, default_port),
        },
        None => NodeAddress::new(host, default_port),
    }
}
