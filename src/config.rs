//! Configuration for the SafeUM auth client
//!
//! CLI arguments and environment variable handling using clap.

use std::time::Duration;

use clap::Parser;

use crate::directory::NodeAddress;
use crate::handshake::LoginVariant;
use crate::session::SessionConfig;
use crate::transport::TransportConfig;
use crate::types::{AuthError, Result};

/// SafeUM authentication client
///
/// Discovers front-end nodes through the balancer and runs the
/// key-exchange/login handshake against the best reachable node.
#[derive(Parser, Debug, Clone)]
#[command(name = "safeum-auth")]
#[command(about = "Authentication client for the SafeUM messaging network")]
pub struct Args {
    /// Seed nodes, comma-separated host:port pairs
    #[arg(long, env = "SAFEUM_SEEDS", default_value = "193.200.173.45:8080")]
    pub seeds: String,

    /// Account username (prompted on stdin when omitted)
    #[arg(long, env = "SAFEUM_USERNAME")]
    pub username: Option<String>,

    /// Account password (prompted on stdin when omitted)
    #[arg(long, env = "SAFEUM_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Balancer endpoint path on the seed nodes
    #[arg(long, env = "SAFEUM_BALANCER_PATH", default_value = "/Bal")]
    pub balancer_path: String,

    /// Authentication endpoint path on the front-end nodes
    #[arg(long, env = "SAFEUM_AUTH_PATH", default_value = "/Auth")]
    pub auth_path: String,

    /// Use wss:// instead of ws://
    #[arg(long, env = "SAFEUM_TLS", default_value = "false")]
    pub tls: bool,

    /// Skip balancer discovery and authenticate against the seeds directly
    #[arg(long, env = "SAFEUM_SKIP_DISCOVERY", default_value = "false")]
    pub skip_discovery: bool,

    /// Login payload shape: "digest" or "token"
    #[arg(long, env = "SAFEUM_LOGIN_VARIANT", default_value = "digest")]
    pub login_variant: String,

    /// Software version tag sent with every handshake message
    #[arg(long, env = "SAFEUM_SOFTWARE_VERSION", default_value = "1.0")]
    pub software_version: String,

    /// Client identifier sent in the upgrade request
    #[arg(long, env = "SAFEUM_CLIENT_ID", default_value = "safeum-auth/0.1")]
    pub client_id: String,

    /// Connect timeout in milliseconds
    #[arg(long, env = "SAFEUM_CONNECT_TIMEOUT_MS", default_value = "10000")]
    pub connect_timeout_ms: u64,

    /// Read timeout in milliseconds
    #[arg(long, env = "SAFEUM_READ_TIMEOUT_MS", default_value = "15000")]
    pub read_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Parse the seed list into node addresses.
    pub fn seed_nodes(&self) -> Result<Vec<NodeAddress>> {
        self.seeds
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_seed)
            .collect()
    }

    pub fn parsed_login_variant(&self) -> Result<LoginVariant> {
        match self.login_variant.as_str() {
            "digest" => Ok(LoginVariant::Digest),
            "token" => Ok(LoginVariant::Token),
            other => Err(AuthError::Config(format!(
                "Unknown login variant {other:?} (expected \"digest\" or \"token\")"
            ))),
        }
    }

    /// Reject configurations that cannot possibly work before any
    /// connection is attempted.
    pub fn validate(&self) -> Result<()> {
        let seeds = self.seed_nodes()?;
        if seeds.is_empty() {
            return Err(AuthError::Config("Seed list is empty".into()));
        }
        self.parsed_login_variant()?;
        if !self.balancer_path.starts_with('/') || !self.auth_path.starts_with('/') {
            return Err(AuthError::Config(
                "Endpoint paths must start with '/'".into(),
            ));
        }
        if self.connect_timeout_ms == 0 || self.read_timeout_ms == 0 {
            return Err(AuthError::Config("Timeouts must be non-zero".into()));
        }
        Ok(())
    }

    /// Build the session configuration for the pipeline.
    pub fn session_config(&self) -> Result<SessionConfig> {
        // Ranked hosts arriving without a port reuse the first seed's port.
        let default_port = self.seed_nodes()?.first().map(|n| n.port).unwrap_or(8080);

        Ok(SessionConfig {
            transport: TransportConfig {
                tls: self.tls,
                client_id: self.client_id.clone(),
                connect_timeout: Duration::from_millis(self.connect_timeout_ms),
                read_timeout: Duration::from_millis(self.read_timeout_ms),
            },
            balancer_path: self.balancer_path.clone(),
            auth_path: self.auth_path.clone(),
            default_port,
            software_version: self.software_version.clone(),
            login_variant: self.parsed_login_variant()?,
            skip_discovery: self.skip_discovery,
        })
    }
}

fn parse_seed(s: &str) -> Result<NodeAddress> {
    // IPv6 literals take bracket syntax: [addr]:port
    if let Some(rest) = s.strip_prefix('[') {
        let (host, port) = rest
            .split_once("]:")
            .ok_or_else(|| AuthError::Config(format!("Seed {s:?} is not [host]:port")))?;
        if host.is_empty() {
            return Err(AuthError::Config(format!("Seed {s:?} has an empty host")));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| AuthError::Config(format!("Seed {s:?} has an invalid port")))?;
        return Ok(NodeAddress::new(host, port));
    }
    if s.matches(':').count() > 1 {
        return Err(AuthError::Config(format!(
            "Seed {s:?} looks like a bare IPv6 literal; use [addr]:port"
        )));
    }

    let (host, port) = s
        .rsplit_once(':')
        .ok_or_else(|| AuthError::Config(format!("Seed {s:?} is not host:port")))?;
    let port = port
        .parse::<u16>()
        .map_err(|_| AuthError::Config(format!("Seed {s:?} has an invalid port")))?;
    if host.is_empty() {
        return Err(AuthError::Config(format!("Seed {s:?} has an empty host")));
    }
    Ok(NodeAddress::new(host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_from(argv: &[&str]) -> Args {
        let mut full = vec!["safeum-auth"];
        full.extend_from_slice(argv);
        Args::parse_from(full)
    }

    #[test]
    fn test_default_seed_parses() {
        let args = args_from(&[]);
        let seeds = args.seed_nodes().unwrap();
        assert_eq!(seeds, vec![NodeAddress::new("193.200.173.45", 8080)]);
        args.validate().unwrap();
    }

    #[test]
    fn test_multiple_seeds() {
        let args = args_from(&["--seeds", "a.example:8080, b.example:9090"]);
        let seeds = args.seed_nodes().unwrap();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[1], NodeAddress::new("b.example", 9090));
    }

    #[test]
    fn test_bad_seed_rejected() {
        let args = args_from(&["--seeds", "no-port-here"]);
        assert!(matches!(args.seed_nodes(), Err(AuthError::Config(_))));
    }

    #[test]
    fn test_ipv6_seed_bracket_syntax() {
        let args = args_from(&["--seeds", "[::1]:8080,[2001:db8::2]:9090"]);
        let seeds = args.seed_nodes().unwrap();
        assert_eq!(seeds[0], NodeAddress::new("::1", 8080));
        assert_eq!(seeds[1], NodeAddress::new("2001:db8::2", 9090));
    }

    #[test]
    fn test_bare_ipv6_seed_rejected() {
        // "::1" must not parse as host ":" port 1
        let args = args_from(&["--seeds", "::1"]);
        let err = args.seed_nodes().unwrap_err();
        assert!(err.to_string().contains("[addr]:port"), "got: {err}");
    }

    #[test]
    fn test_bad_login_variant_rejected() {
        let args = args_from(&["--login-variant", "plaintext"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_session_config_inherits_first_seed_port() {
        let args = args_from(&["--seeds", "a.example:9191,b.example:8080"]);
        let config = args.session_config().unwrap();
        assert_eq!(config.default_port, 9191);
        assert_eq!(config.balancer_path, "/Bal");
        assert_eq!(config.auth_path, "/Auth");
    }
}
