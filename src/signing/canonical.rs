//! SigV4 canonical request building blocks.

use crate::request::{QueryParameters, QueryValue};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Normalize `.` and `..` segments and collapse empty ones, then URI-encode.
///
/// The path is encoded even if it already contains percent escapes, so
/// `%20` becomes `%2520`; Lambda function URLs verify against that form.
pub(crate) fn canonical_uri(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut normalized = String::with_capacity(path.len());
    if path.starts_with('/') {
        normalized.push('/');
    }
    normalized.push_str(&segments.join("/"));
    if !segments.is_empty() && path.ends_with('/') {
        normalized.push('/');
    }

    uri_encode(&normalized, false)
}

/// Build the sorted canonical query string from a query map.
///
/// Bare keys are rendered as `key=`.
pub(crate) fn canonical_query(query: &QueryParameters) -> String {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for (key, value) in query {
        let key = uri_encode(key, true);
        match value {
            QueryValue::Single(v) => pairs.push((key, uri_encode(v, true))),
            QueryValue::Multi(values) => {
                for v in values {
                    pairs.push((key.clone(), uri_encode(v, true)));
                }
            }
            QueryValue::Null => pairs.push((key, String::new())),
        }
    }

    pairs.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Trim a header value and collapse interior runs of whitespace.
pub(crate) fn canonical_header_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// URI-encode a string per SigV4 (RFC 3986).
/// Unreserved characters: A-Z a-z 0-9 - _ . ~
pub(crate) fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut encoded = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            b'/' if !encode_slash => {
                encoded.push('/');
            }
            _ => {
                encoded.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    encoded
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Derive the SigV4 signing key for `date/region/service/aws4_request`.
pub(crate) fn derive_signing_key(
    secret_access_key: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Vec<u8> {
    let k_secret = format!("AWS4{}", secret_access_key);
    let k_date = hmac_sha256(k_secret.as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

pub(crate) fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
