//! HMAC-SHA256 signing of webhook payloads.
//!
//! The signed message is `"<timestamp>.<canonical-payload>"`, with an empty
//! payload section when the delivery carries no body.

use super::payload::CanonicalPayload;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Build the exact byte string that is fed into the HMAC.
pub fn canonical_string(timestamp: i64, payload: Option<&CanonicalPayload>) -> String {
    match payload {
        Some(payload) => format!("{}.{}", timestamp, payload.as_str()),
        None => format!("{}.", timestamp),
    }
}

/// Compute the lowercase hex signature for a delivery.
pub fn sign(timestamp: i64, payload: Option<&CanonicalPayload>, secret: &[u8]) -> String {
    let message = canonical_string(timestamp, payload);
    hex::encode(hmac_sha256(secret, message.as_bytes()))
}

/// Constant-time comparison of two signature strings.
///
/// Strings of different length compare unequal immediately; that only reveals
/// that the lengths differ. Equal-length inputs are compared without
/// short-circuiting.
pub fn signatures_match(expected: &str, provided: &str) -> bool {
    let expected = expected.as_bytes();
    let provided = provided.as_bytes();
    if expected.len() != provided.len() {
        return false;
    }
    expected.ct_eq(provided).into()
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
