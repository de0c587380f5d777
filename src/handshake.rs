//! Authentication handshake state machine
//!
//! One handshake per connection: request a unique key, derive the password
//! digest from it, submit the login, interpret the verdict. The machine is
//! strictly sequential; exactly one request is in flight at any time, so the
//! random correlation ids are logged but never matched against responses.
//!
//! Rejection is a normal outcome, not an error: the server processed the
//! login and said no. Only transport and protocol trouble maps to `Err`,
//! which the outer failover loop turns into "try the next node".

use async_trait::async_trait;
use rand::Rng;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::identity::{self, DeviceIdentity};
use crate::transport::Transport;
use crate::types::{AuthError, Result};

/// Which login payload shape the server expects.
///
/// Some deployments issue an opaque key token that is echoed back verbatim;
/// others expect the digest derived locally from `key.x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginVariant {
    /// SHA-256 digest of password + key.x goes in the `password` field
    #[default]
    Digest,
    /// Plain password plus the raw key token echoed in a `key` field
    Token,
}

/// Username and password as supplied by the caller.
#[derive(Debug, Clone)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

/// Server-issued key material from the unique-key exchange.
///
/// Opaque except for `x`, the field the hasher consumes; the raw payload is
/// kept for the token login variant.
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    pub x: String,
    pub raw: Value,
}

/// Handshake progress on one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Disconnected,
    Connected,
    KeyRequested,
    KeyObtained,
    LoginSubmitted,
    Authenticated,
    Rejected,
    Failed,
}

/// Terminal verdict of a completed handshake.
#[derive(Debug, Clone)]
pub enum HandshakeOutcome {
    Authenticated(Value),
    Rejected(Value),
}

/// Request/response channel the handshake runs over.
///
/// [`Transport`] is the real implementation; tests script one.
#[async_trait]
pub trait Wire: Send {
    async fn send(&mut self, message: &Value) -> Result<()>;
    async fn receive(&mut self) -> Result<Value>;
}

#[async_trait]
impl Wire for Transport {
    async fn send(&mut self, message: &Value) -> Result<()> {
        Transport::send(self, message).await
    }

    async fn receive(&mut self) -> Result<Value> {
        Transport::receive(self).await
    }
}

/// The key-exchange-then-login sequence over an already-open connection.
pub struct Handshake<'a> {
    identity: &'a DeviceIdentity,
    software_version: String,
    variant: LoginVariant,
    state: HandshakeState,
}

impl<'a> Handshake<'a> {
    pub fn new(
        identity: &'a DeviceIdentity,
        software_version: impl Into<String>,
        variant: LoginVariant,
    ) -> Self {
        Self {
            identity,
            software_version: software_version.into(),
            variant,
            state: HandshakeState::Disconnected,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Run the handshake to a terminal state.
    ///
    /// The wire handed in is an already-open connection, so the machine
    /// leaves `Disconnected` immediately. `Ok(Rejected)` means the server
    /// processed the login and refused it; `Err` means the attempt broke
    /// down and the next node should be tried.
    pub async fn run<W: Wire, R: Rng + Send>(
        &mut self,
        wire: &mut W,
        credential: &Credential,
        rng: &mut R,
    ) -> Result<HandshakeOutcome> {
        self.state = HandshakeState::Connected;

        let key = match self.exchange_key(wire, rng).await {
            Ok(key) => key,
            Err(e) => {
                self.state = HandshakeState::Failed;
                return Err(e);
            }
        };

        match self.submit_login(wire, credential, &key, rng).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.state = HandshakeState::Failed;
                Err(e)
            }
        }
    }

    /// `Connected → KeyRequested → KeyObtained`
    async fn exchange_key<W: Wire, R: Rng + Send>(
        &mut self,
        wire: &mut W,
        rng: &mut R,
    ) -> Result<KeyMaterial> {
        let id = identity::correlation_id(rng);
        let request = json!({
            "action": "Login",
            "subaction": "GetKeyUnique",
            "deviceuid": self.identity.device_uid(),
            "softwareversion": self.software_version,
            "id": id,
        });

        wire.send(&request).await?;
        self.state = HandshakeState::KeyRequested;
        debug!("Unique key requested (id {})", id);

        let response = wire.receive().await?;
        if !status_is_success(&response) {
            warn!("Key exchange refused: {}", response);
            return Err(AuthError::KeyExchangeFailed(response.to_string()));
        }

        let raw = response
            .get("key")
            .cloned()
            .ok_or_else(|| AuthError::KeyExchangeFailed("response carried no key".into()))?;
        let x = raw
            .get("x")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::Protocol("key material missing 'x' field".into()))?
            .to_string();

        self.state = HandshakeState::KeyObtained;
        debug!("Unique key obtained");
        Ok(KeyMaterial { x, raw })
    }

    /// `KeyObtained → LoginSubmitted → {Authenticated | Rejected}`
    async fn submit_login<W: Wire, R: Rng + Send>(
        &mut self,
        wire: &mut W,
        credential: &Credential,
        key: &KeyMaterial,
        rng: &mut R,
    ) -> Result<HandshakeOutcome> {
        let request = match self.variant {
            LoginVariant::Digest => {
                let digest = identity::derive_password_digest(&credential.password, &key.x);
                json!({
                    "action": "login",
                    "subaction": "alt",
                    "deviceuid": self.identity.device_uid(),
                    "softwareversion": self.software_version,
                    "login": credential.username,
                    "password": digest,
                })
            }
            LoginVariant::Token => json!({
                "action": "login",
                "subaction": "alt",
                "login": credential.username,
                "password": credential.password,
                "key": key.raw,
                "id": identity::correlation_id(rng),
            }),
        };

        wire.send(&request).await?;
        self.state = HandshakeState::LoginSubmitted;
        debug!("Login submitted for {}", credential.username);

        let response = wire.receive().await?;
        if status_is_success(&response) {
            self.state = HandshakeState::Authenticated;
            info!("Login accepted for {}", credential.username);
            Ok(HandshakeOutcome::Authenticated(response))
        } else {
            self.state = HandshakeState::Rejected;
            info!("Login rejected for {}", credential.username);
            Ok(HandshakeOutcome::Rejected(response))
        }
    }
}

fn status_is_success(response: &Value) -> bool {
    response.get("status").and_then(Value::as_str) == Some("Success")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::VecDeque;

    /// Scripted wire: records everything sent, replays queued responses.
    struct ScriptedWire {
        sent: Vec<Value>,
        responses: VecDeque<Result<Value>>,
    }

    impl ScriptedWire {
        fn new(responses: Vec<Result<Value>>) -> Self {
            Self {
                sent: Vec::new(),
                responses: responses.into(),
            }
        }
    }

    #[async_trait]
    impl Wire for ScriptedWire {
        async fn send(&mut self, message: &Value) -> Result<()> {
            self.sent.push(message.clone());
            Ok(())
        }

        async fn receive(&mut self) -> Result<Value> {
            self.responses
                .pop_front()
                .unwrap_or_else(|| Err(AuthError::Connection("script exhausted".into())))
        }
    }

    fn identity_fixture() -> DeviceIdentity {
        DeviceIdentity::generate(&mut StdRng::seed_from_u64(42))
    }

    fn credential_fixture() -> Credential {
        Credential {
            username: "alice".into(),
            password: "pw".into(),
        }
    }

    #[test]
    fn test_machine_starts_disconnected() {
        let identity = identity_fixture();
        let handshake = Handshake::new(&identity, "1.0", LoginVariant::Digest);
        assert_eq!(handshake.state(), HandshakeState::Disconnected);
    }

    #[tokio::test]
    async fn test_full_path_to_authenticated() {
        let identity = identity_fixture();
        let mut wire = ScriptedWire::new(vec![
            Ok(json!({"status": "Success", "key": {"x": "nonce123"}})),
            Ok(json!({"status": "Success", "session": "s1"})),
        ]);
        let mut handshake = Handshake::new(&identity, "1.0", LoginVariant::Digest);

        let outcome = handshake
            .run(&mut wire, &credential_fixture(), &mut StdRng::seed_from_u64(1))
            .await
            .unwrap();

        assert!(matches!(outcome, HandshakeOutcome::Authenticated(_)));
        assert_eq!(handshake.state(), HandshakeState::Authenticated);

        // Key request precedes login, and the login carries the digest of
        // password + key.x rather than the plaintext password.
        assert_eq!(wire.sent.len(), 2);
        assert_eq!(wire.sent[0]["subaction"], "GetKeyUnique");
        assert_eq!(wire.sent[1]["action"], "login");
        let digest = crate::identity::derive_password_digest("pw", "nonce123");
        assert_eq!(wire.sent[1]["password"], Value::String(digest));
        assert_eq!(wire.sent[1]["deviceuid"], identity.device_uid());
    }

    #[tokio::test]
    async fn test_rejected_login_is_a_normal_outcome() {
        let identity = identity_fixture();
        let mut wire = ScriptedWire::new(vec![
            Ok(json!({"status": "Success", "key": {"x": "n"}})),
            Ok(json!({"status": "Failure", "reason": "bad credentials"})),
        ]);
        let mut handshake = Handshake::new(&identity, "1.0", LoginVariant::Digest);

        let outcome = handshake
            .run(&mut wire, &credential_fixture(), &mut StdRng::seed_from_u64(1))
            .await
            .unwrap();

        assert!(matches!(outcome, HandshakeOutcome::Rejected(_)));
        assert_eq!(handshake.state(), HandshakeState::Rejected);
    }

    #[tokio::test]
    async fn test_key_refusal_never_reaches_login() {
        let identity = identity_fixture();
        let mut wire = ScriptedWire::new(vec![Ok(json!({"status": "Failure"}))]);
        let mut handshake = Handshake::new(&identity, "1.0", LoginVariant::Digest);

        let err = handshake
            .run(&mut wire, &credential_fixture(), &mut StdRng::seed_from_u64(1))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::KeyExchangeFailed(_)));
        assert_eq!(handshake.state(), HandshakeState::Failed);
        // Only the key request went out; no login was submitted.
        assert_eq!(wire.sent.len(), 1);
        assert_eq!(wire.sent[0]["subaction"], "GetKeyUnique");
    }

    #[tokio::test]
    async fn test_missing_key_x_is_protocol_error() {
        let identity = identity_fixture();
        let mut wire = ScriptedWire::new(vec![Ok(
            json!({"status": "Success", "key": {"y": "wrong-field"}}),
        )]);
        let mut handshake = Handshake::new(&identity, "1.0", LoginVariant::Digest);

        let err = handshake
            .run(&mut wire, &credential_fixture(), &mut StdRng::seed_from_u64(1))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Protocol(_)));
        assert_eq!(handshake.state(), HandshakeState::Failed);
    }

    #[tokio::test]
    async fn test_connection_drop_mid_handshake_fails() {
        let identity = identity_fixture();
        let mut wire = ScriptedWire::new(vec![
            Ok(json!({"status": "Success", "key": {"x": "n"}})),
            Err(AuthError::Connection("reset by peer".into())),
        ]);
        let mut handshake = Handshake::new(&identity, "1.0", LoginVariant::Digest);

        let err = handshake
            .run(&mut wire, &credential_fixture(), &mut StdRng::seed_from_u64(1))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Connection(_)));
        assert_eq!(handshake.state(), HandshakeState::Failed);
    }

    #[tokio::test]
    async fn test_token_variant_echoes_raw_key() {
        let identity = identity_fixture();
        let key_payload = json!({"x": "n", "token": "opaque-blob"});
        let mut wire = ScriptedWire::new(vec![
            Ok(json!({"status": "Success", "key": key_payload})),
            Ok(json!({"status": "Success"})),
        ]);
        let mut handshake = Handshake::new(&identity, "1.0", LoginVariant::Token);

        let outcome = handshake
            .run(&mut wire, &credential_fixture(), &mut StdRng::seed_from_u64(1))
            .await
            .unwrap();

        assert!(matches!(outcome, HandshakeOutcome::Authenticated(_)));
        // Token variant sends the plaintext password and echoes the key back.
        assert_eq!(wire.sent[1]["password"], "pw");
        assert_eq!(wire.sent[1]["key"], json!({"x": "n", "token": "opaque-blob"}));
        assert!(wire.sent[1].get("id").is_some());
    }
}
