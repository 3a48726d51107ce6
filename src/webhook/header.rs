//! Codec for the compact `x-hashnode-signature` header.
//!
//! Format: `t=<epoch-ms>,v1=<hex-hmac-sha256>`. Keys may appear in any order
//! and unknown keys are ignored.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name of the inbound header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "x-hashnode-signature";

/// The only signature scheme version understood by this proxy.
pub const SIGNATURE_VERSION: &str = "v1";

const TIMESTAMP_KEY: &str = "t";

/// Parsed signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Signing time in epoch milliseconds.
    pub timestamp: i64,
    /// Hex-encoded HMAC-SHA256, as sent.
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderParseError {
    #[error("signature header has no `t` entry")]
    MissingTimestamp,

    #[error("signature header has no `v1` entry")]
    MissingSignature,

    #[error("signature header timestamp is not an integer: {0}")]
    InvalidTimestamp(String),
}

impl SignatureHeader {
    /// Parse a raw header value.
    ///
    /// When a key is repeated the first occurrence wins.
    pub fn parse(header: &str) -> Result<Self, HeaderParseError> {
        let mut timestamp = None;
        let mut signature = None;

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            match key {
                TIMESTAMP_KEY if timestamp.is_none() => timestamp = Some(value),
                SIGNATURE_VERSION if signature.is_none() => signature = Some(value),
                _ => {}
            }
        }

        let timestamp = timestamp
            .filter(|t| !t.is_empty())
            .ok_or(HeaderParseError::MissingTimestamp)?;
        let signature = signature
            .filter(|s| !s.is_empty())
            .ok_or(HeaderParseError::MissingSignature)?;

        let timestamp = timestamp
            .parse::<i64>()
            .map_err(|_| HeaderParseError::InvalidTimestamp(timestamp.to_string()))?;

        Ok(Self {
            timestamp,
            signature: signature.to_string(),
        })
    }
}

impl FromStr for SignatureHeader {
    type Err = HeaderParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SignatureHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={},{}={}",
            TIMESTAMP_KEY, self.timestamp, SIGNATURE_VERSION, self.signature
        )
    }
}
