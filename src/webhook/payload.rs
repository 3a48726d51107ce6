//! Canonical JSON form of a webhook payload.
//!
//! The signer and the verifier must feed byte-identical payload text into the
//! HMAC. Both sides go through [`CanonicalPayload`], which serializes the
//! parsed value exactly once: compact, keys in received order.

use serde_json::Value;
use std::fmt;

/// A JSON payload together with its canonical serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPayload {
    canonical: String,
}

impl CanonicalPayload {
    /// Canonicalize an already-parsed JSON value.
    pub fn from_value(value: &Value) -> Self {
        // Serializing a `Value` cannot fail: every map key is a string.
        let canonical = serde_json::to_string(value).unwrap_or_default();
        Self { canonical }
    }

    /// Parse raw body bytes and canonicalize them.
    ///
    /// Returns `Ok(None)` for an empty (or whitespace-only) body and for a
    /// falsy top-level value (`null`, `false`, `0`, `""`). Both are signed as
    /// the empty string.
    pub fn from_slice(body: &[u8]) -> Result<Option<Self>, serde_json::Error> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let value: Value = serde_json::from_slice(body)?;
        if is_falsy(&value) {
            return Ok(None);
        }
        Ok(Some(Self::from_value(&value)))
    }

    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.canonical.as_bytes()
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

impl fmt::Display for CanonicalPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl From<Value> for CanonicalPayload {
    fn from(value: Value) -> Self {
        Self::from_value(&value)
    }
}
