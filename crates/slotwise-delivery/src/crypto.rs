//! HMAC-SHA256 payload signing.
//!
//! Every outbound webhook body is signed with the shared secret so the
//! receiving automation can verify authenticity. The signature travels in a
//! configurable header as `sha256=<hex digest>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes the HMAC-SHA256 of `body` under `secret` as lowercase hex.
///
/// Deterministic: identical inputs always produce the same 64-character
/// string, and different secrets produce different signatures for the same
/// body.
pub fn sign(body: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Formats the signature header value: `sha256=<hex digest>`.
pub fn signature_header_value(body: &[u8], secret: &str) -> String {
    format!("sha256={}", sign(body, secret))
}
