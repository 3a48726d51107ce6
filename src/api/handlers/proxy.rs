//! Verify, re-sign and forward a webhook delivery.

use super::AppState;
use crate::api::errors::ProxyError;
use crate::api::extractors::SignatureHeaderValue;
use crate::request::{Headers, HttpRequest, HttpRequestOptions};
use crate::signing::FORWARDED_FOR_HEADER;
use crate::webhook::{verify, CanonicalPayload, VerificationRequest, VerificationResult};
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::Response;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;
use zeroize::Zeroizing;

/// Inbound headers never copied to the origin request. `accept-encoding` is
/// dropped so the origin answers uncompressed.
const DROPPED_HEADERS: &[&str] = &[
    "host",
    FORWARDED_FOR_HEADER,
    "connection",
    "content-length",
    "transfer-encoding",
    "keep-alive",
    "te",
    "trailer",
    "upgrade",
    "proxy-authorization",
    "proxy-connection",
    "expect",
    "accept-encoding",
];

/// Origin response headers relayed to the caller.
const RELAYED_HEADERS: &[&str] = &["content-type", "content-encoding"];

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Fallback handler: every path other than `/health` and `/metrics` is a
/// webhook delivery.
pub async fn proxy_webhook(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    signature: SignatureHeaderValue,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("webhook", %request_id, %method, path = %uri.path());
    handle_delivery(state, request_id, method, uri, signature, headers, body)
        .instrument(span)
        .await
}

async fn handle_delivery(
    state: Arc<AppState>,
    request_id: Uuid,
    method: Method,
    uri: Uri,
    signature: SignatureHeaderValue,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let payload = CanonicalPayload::from_slice(&body).map_err(|e| {
        warn!("Webhook: body is not JSON: {}", e);
        ProxyError::InvalidPayload(e.to_string())
    })?;

    // A secret that cannot be fetched verifies as the empty secret and fails
    // the signature check.
    let secret = match state.secrets.secret().await {
        Ok(secret) => secret,
        Err(e) => {
            error!("Webhook: unable to retrieve secret: {}", e);
            Zeroizing::new(String::new())
        }
    };

    let result = verify(&VerificationRequest {
        signature_header: signature.as_deref(),
        payload: payload.as_ref(),
        secret: secret.as_bytes(),
        tolerance_secs: Some(state.tolerance_secs),
    });
    drop(secret);

    if let VerificationResult::Invalid { reason } = result {
        warn!("Webhook: invalid signature: {}", reason);
        if let Some(metrics) = &state.metrics {
            metrics.record_verification(reason.label());
        }
        return Err(ProxyError::InvalidSignature(reason));
    }
    if let Some(metrics) = &state.metrics {
        metrics.record_verification("valid");
    }
    debug!("Webhook: signature verified");

    let mut outbound = build_origin_request(&state, &method, &uri, &headers, body);
    outbound
        .headers
        .insert(REQUEST_ID_HEADER.to_string(), request_id.to_string());

    let credential = state.credentials.credential().await;
    let signed = state
        .signer
        .sign(&outbound, &credential, &state.signing_region)
        .map_err(|e| {
            error!("Webhook: signing failed: {}", e);
            ProxyError::from(e)
        })?;

    let response = forward(&state, &signed).await;
    if let Some(metrics) = &state.metrics {
        let label = match &response {
            Ok(r) => r.status().as_u16().to_string(),
            Err(_) => "error".to_string(),
        };
        metrics.record_forward(&label);
    }
    response
}

/// Map the inbound request onto the origin: origin scheme and host, inbound
/// path under the origin base path, parsed query, filtered headers.
fn build_origin_request(
    state: &AppState,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
) -> HttpRequest {
    HttpRequest::new(HttpRequestOptions {
        method: Some(method.as_str().to_string()),
        protocol: Some(state.origin.protocol.clone()),
        hostname: Some(state.origin.hostname.clone()),
        port: state.origin.port,
        path: Some(state.origin.join_path(uri.path())),
        query: Some(HttpRequest::parse_query(uri.query().unwrap_or(""))),
        headers: Some(forwardable_headers(headers)),
        body: (!body.is_empty()).then_some(body),
        ..Default::default()
    })
}

/// Copy inbound headers for the origin, skipping [`DROPPED_HEADERS`] and any
/// header the `Connection` header names. Repeated headers are joined with `, `.
fn forwardable_headers(headers: &HeaderMap) -> Headers {
    let connection_listed: Vec<String> = headers
        .get_all(axum::http::header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    let mut copied = Headers::new();
    for name in headers.keys() {
        let name = name.as_str();
        if DROPPED_HEADERS.contains(&name) || connection_listed.iter().any(|c| c == name) {
            continue;
        }
        let value = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        copied.insert(name.to_string(), value);
    }
    copied
}

/// Send the signed request and relay the origin's status, body and
/// [`RELAYED_HEADERS`].
async fn forward(state: &AppState, signed: &HttpRequest) -> Result<Response, ProxyError> {
    let method = reqwest::Method::from_bytes(signed.method().as_bytes())
        .map_err(|e| ProxyError::Internal(format!("method {}: {}", signed.method(), e)))?;

    let mut outbound_headers = reqwest::header::HeaderMap::new();
    for (name, value) in &signed.headers {
        let name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ProxyError::Internal(format!("header name {}: {}", name, e)))?;
        let value = reqwest::header::HeaderValue::from_str(value)
            .map_err(|e| ProxyError::Internal(format!("header {}: {}", name, e)))?;
        outbound_headers.insert(name, value);
    }

    let url = signed.url();
    debug!("Webhook: forwarding to {}", url);
    let mut builder = state.http.request(method, &url).headers(outbound_headers);
    if let Some(body) = &signed.body {
        builder = builder.body(body.clone());
    }

    let origin_response = builder.send().await.map_err(|e| {
        error!("Webhook: origin request failed: {}", e);
        ProxyError::OriginUnavailable(e.to_string())
    })?;

    let status = StatusCode::from_u16(origin_response.status().as_u16())
        .unwrap_or(StatusCode::BAD_GATEWAY);
    let relayed: Vec<(&str, reqwest::header::HeaderValue)> = RELAYED_HEADERS
        .iter()
        .filter_map(|name| {
            origin_response
                .headers()
                .get(*name)
                .map(|v| (*name, v.clone()))
        })
        .collect();
    let body = origin_response.bytes().await.map_err(|e| {
        error!("Webhook: reading origin response failed: {}", e);
        ProxyError::OriginUnavailable(e.to_string())
    })?;

    info!("Webhook: origin responded {}", status);

    let mut response = Response::builder().status(status);
    for (name, value) in relayed {
        response = response.header(name, value.as_bytes());
    }
    response
        .body(Body::from(body))
        .map_err(|e| ProxyError::Internal(e.to_string()))
}
