//! AWS Signature Version 4 (SigV4) re-signing of outbound requests
//!
//! After a webhook delivery has been verified, the proxy forwards it to the
//! trusted origin under its own identity. The signer takes an [`HttpRequest`],
//! computes an `AWS4-HMAC-SHA256` signature scoped to
//! `<date>/<region>/<service>/aws4_request`, and returns a copy carrying
//! `host`, `x-amz-date`, optional `x-amz-security-token`,
//! `x-amz-content-sha256` and `authorization` headers.
//!
//! All header keys on the returned request are lower-case. The hop-identifying
//! `x-forwarded-for` header is removed before signing.

mod canonical;

use crate::request::{Headers, HttpRequest};
use canonical::{
    canonical_header_value, canonical_query, canonical_uri, derive_signing_key, hmac_sha256,
    sha256_hex,
};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Header stripped from every forwarded request.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

const AMZ_DATE_HEADER: &str = "x-amz-date";
const SECURITY_TOKEN_HEADER: &str = "x-amz-security-token";
const CONTENT_SHA256_HEADER: &str = "x-amz-content-sha256";
const AUTHORIZATION_HEADER: &str = "authorization";

/// Headers the signer always regenerates.
const GENERATED_HEADERS: &[&str] = &[AUTHORIZATION_HEADER, AMZ_DATE_HEADER, "date"];

/// Headers that proxies and clients may rewrite in flight; never signed.
const UNSIGNABLE_HEADERS: &[&str] = &[
    "authorization",
    "cache-control",
    "connection",
    "expect",
    "from",
    "keep-alive",
    "max-forwards",
    "pragma",
    "referer",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "user-agent",
    "x-amzn-trace-id",
];

/// Credentials and scope for re-signing. Supplied by the environment; the
/// signer never persists them.
#[derive(Clone)]
pub struct SigningCredential {
    pub access_key_id: String,
    pub secret_access_key: Zeroizing<String>,
    pub session_token: Option<String>,
    pub region: String,
    pub service: String,
}

impl SigningCredential {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: Zeroizing::new(secret_access_key.into()),
            session_token: session_token.filter(|t| !t.is_empty()),
            region: region.into(),
            service: service.into(),
        }
    }
}

impl std::fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("region", &self.region)
            .field("service", &self.service)
            .finish()
    }
}

/// Signer behaviour switches.
#[derive(Debug, Clone)]
pub struct SigningSettings {
    /// Add `x-amz-content-sha256` with the body hash unless already present.
    pub apply_checksum: bool,
}

impl Default for SigningSettings {
    fn default() -> Self {
        Self {
            apply_checksum: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SigningError {
    #[error("no signing region: neither the request nor the credential names one")]
    MissingRegion,

    #[error("signing credential has no service name")]
    MissingService,

    #[error("header {0} contains a line break and cannot be signed")]
    InvalidHeaderValue(String),

    #[error("{0}")]
    InvalidUrl(String),
}

/// SigV4 request signer.
#[derive(Debug, Clone, Default)]
pub struct SigV4Signer {
    settings: SigningSettings,
}

impl SigV4Signer {
    pub fn new(settings: SigningSettings) -> Self {
        Self { settings }
    }

    /// Sign `request` at the current time.
    ///
    /// `signing_region` overrides the credential's region when non-empty.
    pub fn sign(
        &self,
        request: &HttpRequest,
        credential: &SigningCredential,
        signing_region: &str,
    ) -> Result<HttpRequest, SigningError> {
        self.sign_at(request, credential, signing_region, Utc::now())
    }

    /// Sign `request` as of `time`.
    pub fn sign_at(
        &self,
        request: &HttpRequest,
        credential: &SigningCredential,
        signing_region: &str,
        time: DateTime<Utc>,
    ) -> Result<HttpRequest, SigningError> {
        let region = if signing_region.is_empty() {
            credential.region.as_str()
        } else {
            signing_region
        };
        if region.is_empty() {
            return Err(SigningError::MissingRegion);
        }
        if credential.service.is_empty() {
            return Err(SigningError::MissingService);
        }

        // Sign the path and query exactly as they will be sent.
        let mut signed = request
            .to_wire()
            .map_err(|e| SigningError::InvalidUrl(e.to_string()))?;
        signed.headers = lowercase_headers(&request.headers);
        signed.headers.remove(FORWARDED_FOR_HEADER);
        for name in GENERATED_HEADERS {
            signed.headers.remove(*name);
        }
        if let Some((name, _)) = signed
            .headers
            .iter()
            .find(|(_, v)| v.contains(|c: char| c == '\n' || c == '\r'))
        {
            return Err(SigningError::InvalidHeaderValue(name.clone()));
        }

        let amz_date = time.format("%Y%m%dT%H%M%SZ").to_string();
        let date = &amz_date[..8];
        let payload_hash = sha256_hex(signed.body.as_deref().unwrap_or_default());

        let host = signed.host();
        signed.headers.insert("host".to_string(), host);
        signed
            .headers
            .insert(AMZ_DATE_HEADER.to_string(), amz_date.clone());
        match &credential.session_token {
            Some(token) => {
                signed
                    .headers
                    .insert(SECURITY_TOKEN_HEADER.to_string(), token.clone());
            }
            None => {
                signed.headers.remove(SECURITY_TOKEN_HEADER);
            }
        }
        if self.settings.apply_checksum {
            signed
                .headers
                .entry(CONTENT_SHA256_HEADER.to_string())
                .or_insert_with(|| payload_hash.clone());
        }

        let signable: Vec<(&String, &String)> = signed
            .headers
            .iter()
            .filter(|(k, _)| !UNSIGNABLE_HEADERS.contains(&k.as_str()))
            .collect();
        let canonical_headers: String = signable
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, canonical_header_value(v)))
            .collect();
        let signed_headers = signable
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            signed.method(),
            canonical_uri(signed.path()),
            canonical_query(&signed.query),
            canonical_headers,
            signed_headers,
            payload_hash
        );
        debug!("SigV4 canonical request:\n{}", canonical_request);

        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            date, region, credential.service
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            credential_scope,
            sha256_hex(canonical_request.as_bytes())
        );
        debug!("SigV4 string to sign:\n{}", string_to_sign);

        let signing_key = Zeroizing::new(derive_signing_key(
            &credential.secret_access_key,
            date,
            region,
            &credential.service,
        ));
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

        signed.headers.insert(
            AUTHORIZATION_HEADER.to_string(),
            format!(
                "{} Credential={}/{}, SignedHeaders={}, Signature={}",
                ALGORITHM, credential.access_key_id, credential_scope, signed_headers, signature
            ),
        );

        debug!(
            "SigV4: signed {} {} for {}/{}",
            signed.method(),
            signed.path(),
            region,
            credential.service
        );
        Ok(signed)
    }
}

/// Copy headers with lower-cased keys. Later keys in iteration order win when
/// two differ only by case.
fn lowercase_headers(headers: &Headers) -> Headers {
    headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
        .collect()
}
