//! SafeUM authentication client
//!
//! The SafeUM backend has no single fixed address: a rotating set of
//! front-end nodes sits behind a balancer, and a client first asks a seed
//! node for the currently ranked node list, then runs a short key-exchange
//! and login handshake against the best node it can reach.
//!
//! ## Components
//!
//! - **Directory**: seed list plus the dynamically ranked node list
//! - **Discovery**: balancer query over the seeds (`/Bal`)
//! - **Transport**: one WebSocket connection per node attempt (`/Auth`)
//! - **Codec**: JSON frames, gzip-compressed on the wire with raw fallback
//! - **Handshake**: key request, credential digest, login submission
//! - **Session**: ties it together with sequential failover

pub mod codec;
pub mod config;
pub mod directory;
pub mod discovery;
pub mod handshake;
pub mod identity;
pub mod session;
pub mod transport;
pub mod types;

pub use config::Args;
pub use directory::{NodeAddress, NodeDirectory};
pub use handshake::{HandshakeOutcome, LoginVariant};
pub use session::{authenticate, SessionConfig};
pub use types::{AuthError, Result};
