//! Custom Axum extractors for webhook requests

use crate::webhook::SIGNATURE_HEADER;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

/// Raw value of the `x-hashnode-signature` header, if present.
///
/// Never rejects: a missing header is `None` so verification can report it as
/// a missing signature. Non-UTF-8 bytes are replaced and will fail parsing.
#[derive(Debug, Clone)]
pub struct SignatureHeaderValue(pub Option<String>);

impl SignatureHeaderValue {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SignatureHeaderValue
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(SIGNATURE_HEADER)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
        Ok(SignatureHeaderValue(value))
    }
}
