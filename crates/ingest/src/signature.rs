//! Inbound webhook signature validation: HMAC-SHA256 over the raw request
//! body, hex-encoded, compared in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Validate an inbound payload signature against the tenant's shared secret.
///
/// When no secret is configured validation passes (fail-open). This mirrors
/// the permissive development-mode behavior of marketplace sandboxes and is an
/// explicit operator trade-off; the gateway's strict mode turns it off.
pub fn validate(raw_body: &[u8], signature: &str, secret: Option<&str>) -> bool {
    let Some(secret) = secret else {
        tracing::warn!("no webhook secret configured, accepting unsigned payload");
        return true;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(raw_body);
    let expected_hex = hex::encode(mac.finalize().into_bytes());
    constant_time_eq_hex(&expected_hex, signature.trim())
}

/// Compute the hex HMAC-SHA256 signature the dispatcher attaches to outbound
/// payloads (and which tests use to forge valid inbound signatures).
pub fn sign(body: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_eq_hex(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}
