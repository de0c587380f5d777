//! WebSocket transport for one node attempt
//!
//! Each [`Transport`] wraps a single connection: opened with a bounded
//! connect timeout, used for one handshake (or one balancer query), and
//! closed before the next candidate node is tried. The upgrade request is
//! built by hand so the `binary` sub-protocol token and the client
//! identifier header go out exactly as the servers expect.
//!
//! Every receive carries an explicit read timeout. The historical client
//! had none and could stall forever on a silent peer; this is a deliberate
//! hardening deviation.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async_with_config,
    tungstenite::{handshake::client::generate_key, http::Request, protocol::Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};

use crate::codec;
use crate::directory::NodeAddress;
use crate::types::{AuthError, Result};

/// Connection parameters shared by every transport in a run.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Use wss:// instead of ws://
    pub tls: bool,
    /// Client identifier sent in the upgrade request
    pub client_id: String,
    /// Bound on TCP connect + WebSocket upgrade
    pub connect_timeout: Duration,
    /// Bound on waiting for a single response frame
    pub read_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: false,
            client_id: "safeum-auth/0.1".to_string(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(15),
        }
    }
}

/// One live connection to one node.
pub struct Transport {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    url: String,
    read_timeout: Duration,
}

impl Transport {
    /// Open a connection to `node` at the given endpoint path.
    ///
    /// Returns a typed error on timeout, refusal, or a rejected upgrade;
    /// the caller owns the transport and must close it on every exit path.
    pub async fn connect(node: &NodeAddress, path: &str, config: &TransportConfig) -> Result<Self> {
        let url = node.url(config.tls, path);
        debug!("Connecting to {}", url);

        let request = Request::builder()
            .uri(&url)
            .header("Host", node.to_string())
            .header("User-Agent", &config.client_id)
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Version", "13")
            .header("Sec-WebSocket-Protocol", "binary")
            .header("Sec-WebSocket-Key", generate_key())
            .body(())
            .map_err(|e| AuthError::Connection(format!("Failed to build request: {e}")))?;

        let connect = connect_async_with_config(request, None, false);
        let (ws, _response) = timeout(config.connect_timeout, connect)
            .await
            .map_err(|_| AuthError::ConnectTimeout(config.connect_timeout))?
            .map_err(|e| AuthError::Connection(format!("WebSocket connect to {url} failed: {e}")))?;

        Ok(Self {
            ws,
            url,
            read_timeout: config.read_timeout,
        })
    }

    /// Serialize and send one message as one text frame.
    pub async fn send(&mut self, message: &Value) -> Result<()> {
        let frame = codec::encode_frame(message);
        self.ws
            .send(Message::Text(frame))
            .await
            .map_err(|e| AuthError::Connection(format!("Send to {} failed: {e}", self.url)))
    }

    /// Receive and decode exactly one frame.
    ///
    /// Control frames are skipped; the peer closing the socket or going
    /// silent past the read timeout surfaces as a connection error.
    pub async fn receive(&mut self) -> Result<Value> {
        loop {
            let next = timeout(self.read_timeout, self.ws.next())
                .await
                .map_err(|_| AuthError::ReadTimeout(self.read_timeout))?;

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    return Err(AuthError::Connection(format!(
                        "Receive from {} failed: {e}",
                        self.url
                    )))
                }
                None => {
                    return Err(AuthError::Connection(format!(
                        "{} closed the connection",
                        self.url
                    )))
                }
            };

            match message {
                Message::Binary(raw) => return codec::decode_frame(&raw),
                Message::Text(text) => return codec::decode_frame(text.as_bytes()),
                Message::Close(frame) => {
                    return Err(AuthError::Connection(format!(
                        "{} sent close frame: {frame:?}",
                        self.url
                    )))
                }
                other => {
                    debug!("Skipping control frame: {other:?}");
                }
            }
        }
    }

    /// Close the connection. Errors are logged, not propagated: the attempt
    /// is already over by the time close runs.
    pub async fn close(mut self) {
        if let Err(e) = self.ws.close(None).await {
            warn!("Error closing {}: {e}", self.url);
        }
    }
}
