//! Hashnode webhook signature verification
//!
//! Inbound deliveries carry `x-hashnode-signature: t=<epoch-ms>,v1=<hex>`,
//! where the hex value is `HMAC_SHA256(secret, "<t>.<payload-json>")`.
//! Verification recomputes the HMAC over the canonical payload, compares in
//! constant time and then checks the timestamp against a replay window.

mod header;
mod payload;
mod replay;
mod signature;
mod verify;

pub use header::{HeaderParseError, SignatureHeader, SIGNATURE_HEADER, SIGNATURE_VERSION};
pub use payload::CanonicalPayload;
pub use replay::{is_within_window, DEFAULT_TOLERANCE_SECS};
pub use signature::{canonical_string, sign, signatures_match};
pub use verify::{verify, verify_at, InvalidReason, VerificationRequest, VerificationResult};
