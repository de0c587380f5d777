//! SafeUM authentication client CLI
//!
//! Thin wrapper over the library: parse configuration, collect credentials,
//! run the discovery + handshake pipeline, report the verdict.

use std::io::{BufRead, Write};

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use safeum_auth::{
    authenticate,
    config::Args,
    handshake::{Credential, HandshakeOutcome},
    identity::DeviceIdentity,
    NodeDirectory,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("safeum_auth={log_level},info").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(2);
    }

    let seeds = args.seed_nodes()?;
    let config = args.session_config()?;

    info!("======================================");
    info!("  SafeUM authentication client");
    info!("======================================");
    info!("Seeds: {}", args.seeds);
    info!("Discovery: {}", if config.skip_discovery { "skipped" } else { "balancer" });
    info!("Login variant: {:?}", config.login_variant);
    info!("Scheme: {}", if config.transport.tls { "wss" } else { "ws" });
    info!("======================================");

    let credential = collect_credentials(&args)?;

    let mut rng = StdRng::from_entropy();
    let identity = DeviceIdentity::generate(&mut rng);
    info!("Device UID: {}", identity.device_uid());

    let mut directory = NodeDirectory::new(seeds);

    match authenticate(&mut directory, &credential, &identity, &config, &mut rng).await {
        Ok(HandshakeOutcome::Authenticated(payload)) => {
            info!("Authenticated: {}", payload);
            println!("Login successful");
            Ok(())
        }
        Ok(HandshakeOutcome::Rejected(payload)) => {
            warn!("Login rejected: {}", payload);
            println!("Login rejected by server");
            std::process::exit(1);
        }
        Err(e) => {
            error!("Authentication failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Username and password from flags/env, prompting on stdin for whatever
/// is missing. Credential collection stays out of the library.
fn collect_credentials(args: &Args) -> anyhow::Result<Credential> {
    let username = match &args.username {
        Some(u) => u.clone(),
        None => prompt("Username: ")?,
    };
    let password = match &args.password {
        Some(p) => p.clone(),
        None => prompt("Password: ")?,
    };
    Ok(Credential { username, password })
}

fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{label}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end().to_string())
}
