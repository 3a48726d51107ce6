//! Inbound webhook verification.
//!
//! Checks run in a fixed order and stop at the first failure:
//! header presence, header syntax, signature, timestamp window.

use super::header::SignatureHeader;
use super::payload::CanonicalPayload;
use super::replay::{is_within_window, DEFAULT_TOLERANCE_SECS};
use super::signature::{sign, signatures_match};
use std::fmt;
use tracing::debug;

/// Everything needed to verify one delivery.
#[derive(Debug, Clone, Copy)]
pub struct VerificationRequest<'a> {
    /// Raw value of the signature header, if the request carried one.
    pub signature_header: Option<&'a str>,
    /// Canonical payload, `None` when the delivery has no body.
    pub payload: Option<&'a CanonicalPayload>,
    pub secret: &'a [u8],
    /// Allowed clock skew in seconds. `None` means the default of 30 and
    /// `Some(0)` disables the timestamp check.
    pub tolerance_secs: Option<u64>,
}

/// Why a delivery was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvalidReason {
    MissingSignature,
    MalformedHeader,
    SignatureMismatch,
    TimestampOutOfWindow,
}

impl InvalidReason {
    /// Stable snake_case label, used for metrics and JSON error bodies.
    pub fn label(&self) -> &'static str {
        match self {
            InvalidReason::MissingSignature => "missing_signature",
            InvalidReason::MalformedHeader => "malformed_header",
            InvalidReason::SignatureMismatch => "signature_mismatch",
            InvalidReason::TimestampOutOfWindow => "timestamp_out_of_window",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            InvalidReason::MissingSignature => "missing signature",
            InvalidReason::MalformedHeader => "malformed signature header",
            InvalidReason::SignatureMismatch => "signature mismatch",
            InvalidReason::TimestampOutOfWindow => "timestamp outside tolerance",
        };
        f.write_str(message)
    }
}

/// Outcome of [`verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationResult {
    Valid,
    Invalid { reason: InvalidReason },
}

impl VerificationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationResult::Valid)
    }

    fn invalid(reason: InvalidReason) -> Self {
        VerificationResult::Invalid { reason }
    }
}

/// Verify a delivery against the current wall clock.
pub fn verify(request: &VerificationRequest<'_>) -> VerificationResult {
    verify_at(request, chrono::Utc::now().timestamp_millis())
}

/// Verify a delivery against an explicit `now_ms`.
pub fn verify_at(request: &VerificationRequest<'_>, now_ms: i64) -> VerificationResult {
    let Some(raw_header) = request.signature_header.filter(|h| !h.is_empty()) else {
        return VerificationResult::invalid(InvalidReason::MissingSignature);
    };

    let header = match SignatureHeader::parse(raw_header) {
        Ok(header) => header,
        Err(e) => {
            debug!("Webhook: unparseable signature header: {}", e);
            return VerificationResult::invalid(InvalidReason::MalformedHeader);
        }
    };

    let expected = sign(header.timestamp, request.payload, request.secret);
    debug!(
        "Webhook: expected={}, provided={}",
        &expected[..8],
        header.signature.chars().take(8).collect::<String>()
    );
    if !signatures_match(&expected, &header.signature) {
        return VerificationResult::invalid(InvalidReason::SignatureMismatch);
    }

    let tolerance = request.tolerance_secs.unwrap_or(DEFAULT_TOLERANCE_SECS);
    if !is_within_window(header.timestamp, now_ms, tolerance) {
        debug!(
            "Webhook: timestamp {} is {}ms from now, tolerance {}s",
            header.timestamp,
            now_ms.saturating_sub(header.timestamp),
            tolerance
        );
        return VerificationResult::invalid(InvalidReason::TimestampOutOfWindow);
    }

    VerificationResult::Valid
}
