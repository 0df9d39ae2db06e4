//! Request signing.
//!
//! Every GET forwarded to the appliance carries an
//! `Authorization: MieleH256 <group-id-hex>:<signature>` header.  The
//! signature is an HMAC-SHA256 over a canonical five-line string derived
//! from the request, keyed with the full group key.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{Credentials, ACCEPT_HEADER};

type HmacSha256 = Hmac<Sha256>;

/// The exact text covered by the signature:
///
/// ```text
/// METHOD\n
/// HOST+PATH\n
/// \n                (always-empty content-type line)
/// ACCEPT\n
/// DATE\n
/// ```
///
/// The appliance rebuilds this string from the request line and headers, so
/// every byte here must match what actually goes on the wire.
pub fn canonical_request(method: &str, host: &str, path: &str, date: &str) -> String {
    format!("{method}\n{host}{path}\n\n{ACCEPT_HEADER}\n{date}\n")
}

/// Sign a request, returning the uppercase-hex HMAC-SHA256 digest.
///
/// Pure function of its inputs: garbage in produces a garbage-but-well-formed
/// signature, and the appliance answers 403.  `date` must be the same string
/// that is sent in the `Date` header.
pub fn sign(credentials: &Credentials, method: &str, host: &str, path: &str, date: &str) -> String {
    let canonical = canonical_request(method, host, path, date);
    let mut mac = HmacSha256::new_from_slice(credentials.group_key())
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(canonical.as_bytes());
    hex::encode_upper(mac.finalize().into_bytes())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
