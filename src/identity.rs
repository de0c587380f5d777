//! Device identity and credential hashing
//!
//! The device UID is a per-run pseudo-identifier: two random four-digit
//! numbers joined as "A-B" and MD5-hashed. It only needs to look like a
//! plausible per-install identifier to the server; it is generated once per
//! run and reused in every message that needs device correlation.
//!
//! The password digest is SHA-256 over `password + key.x`, where `x` comes
//! from the server's unique-key response. This transform is an unverified
//! reconstruction of an undocumented scheme; keep it behind this one
//! function so the real scheme can be dropped in without touching the
//! handshake.

use md5::{Digest as _, Md5};
use rand::Rng;
use sha2::{Digest as _, Sha256};

/// Per-run device identity, read-only after generation.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    device_uid: String,
}

impl DeviceIdentity {
    /// Generate a fresh device UID from the given RNG.
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        let a: u32 = rng.gen_range(1000..=9999);
        let b: u32 = rng.gen_range(1000..=9999);
        let seed = format!("{a}-{b}");

        let mut hasher = Md5::new();
        hasher.update(seed.as_bytes());
        let device_uid = hex::encode(hasher.finalize());

        Self { device_uid }
    }

    pub fn device_uid(&self) -> &str {
        &self.device_uid
    }
}

/// Derive the password digest submitted at login.
///
/// Pure function of its inputs: the same password and key always produce
/// the same digest.
pub fn derive_password_digest(password: &str, key_x: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(key_x.as_bytes());
    hex::encode(hasher.finalize())
}

/// Random correlation id for an outgoing request.
///
/// Logged for debugging only; responses are not matched by id because
/// exactly one request is in flight at a time.
pub fn correlation_id<R: Rng>(rng: &mut R) -> u32 {
    rng.gen_range(1000..=9999)
}
