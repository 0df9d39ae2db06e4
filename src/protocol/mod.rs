//! Protocol engine for the Miele local API.
//!
//! Everything cryptographic lives here: the per-request HMAC signature
//! ([`signer`]), the response-body decryption ([`decryptor`]), and the
//! [`Credentials`] pair they both operate on.  The code in this module is
//! pure and stateless — safe to call concurrently from every request handler
//! without locking.

pub mod decryptor;
pub mod signer;

use std::fmt;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::config::CredentialsConfig;

// ---------------------------------------------------------------------------
// Protocol constants
// ---------------------------------------------------------------------------

/// Media type sent in the `Accept` header and covered by the signature.
pub const ACCEPT_HEADER: &str = "application/vnd.miele.v1+json";

/// Authorization scheme prefix used by the appliance firmware.
pub const AUTH_SCHEME: &str = "MieleH256";

/// Placeholder group key (64 zero bytes) used until the gateway is
/// commissioned with real credentials.
pub const PLACEHOLDER_GROUP_KEY: &str =
    "0000000000000000000000000000000000000000000000000000000000000000\
     0000000000000000000000000000000000000000000000000000000000000000";

/// Placeholder group id (8 zero bytes).
pub const PLACEHOLDER_GROUP_ID: &str = "0000000000000000";

// ---------------------------------------------------------------------------
// HTTP date
// ---------------------------------------------------------------------------

/// Current UTC time in the RFC-1123 shape the appliance expects, e.g.
/// `Mon, 01 Jan 2024 00:00:00 GMT`.
///
/// The exact string returned here must be transmitted in the `Date` request
/// header *and* fed to the signer — the appliance reconstructs the signature
/// from the header, so a mismatch invalidates the request.
pub fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// The group id / group key pair issued during appliance pairing.
///
/// Loaded once at startup and immutable for the process lifetime.  The key is
/// the HMAC secret for request signing; its first half doubles as the AES key
/// for response decryption.  `Debug` deliberately redacts the key so request
/// logging can never leak it.
#[derive(Clone)]
pub struct Credentials {
    group_id: Vec<u8>,
    group_key: Vec<u8>,
}

impl Credentials {
    /// Build credentials from hex strings, as found in the environment.
    pub fn from_hex(group_id_hex: &str, group_key_hex: &str) -> Result<Self> {
        let group_id = hex::decode(group_id_hex.trim())
            .context("group id is not a valid hex string")?;
        let group_key = hex::decode(group_key_hex.trim())
            .context("group key is not a valid hex string")?;
        anyhow::ensure!(!group_id.is_empty(), "group id must not be empty");
        anyhow::ensure!(!group_key.is_empty(), "group key must not be empty");
        Ok(Self {
            group_id,
            group_key,
        })
    }

    /// Read credentials from the environment variables named in `config`,
    /// falling back to the all-zero placeholders when unset.
    pub fn from_env(config: &CredentialsConfig) -> Result<Self> {
        let id_hex = std::env::var(&config.group_id_env)
            .unwrap_or_else(|_| PLACEHOLDER_GROUP_ID.to_string());
        let key_hex = std::env::var(&config.group_key_env)
            .unwrap_or_else(|_| PLACEHOLDER_GROUP_KEY.to_string());
        Self::from_hex(&id_hex, &key_hex)
    }

    pub fn group_id(&self) -> &[u8] {
        &self.group_id
    }

    pub fn group_key(&self) -> &[u8] {
        &self.group_key
    }

    /// Uppercase hex group id, as carried in the `Authorization` header.
    pub fn group_id_hex(&self) -> String {
        hex::encode_upper(&self.group_id)
    }

    /// Uppercase hex group key, as carried in the commissioning body.
    pub fn group_key_hex(&self) -> String {
        hex::encode_upper(&self.group_key)
    }

    /// True while the all-zero placeholder credentials are in use.
    pub fn is_placeholder(&self) -> bool {
        self.group_id.iter().all(|b| *b == 0) && self.group_key.iter().all(|b| *b == 0)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("group_id", &self.group_id_hex())
            .field("group_key", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
