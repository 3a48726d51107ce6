//! Shared test infrastructure for integration tests
//!
//! Provides a mock origin (axum on an ephemeral port) that records every
//! request it receives, and builders for an in-process proxy router.

#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use hashnode_webhook_proxy::api::handlers::{router, AppState};
use hashnode_webhook_proxy::config::Config;
use hashnode_webhook_proxy::metrics::Metrics;
use hashnode_webhook_proxy::request::{Headers, HttpRequest, HttpRequestOptions};
use hashnode_webhook_proxy::secrets::{StaticCredentialProvider, StaticSecretProvider};
use hashnode_webhook_proxy::signing::{SigV4Signer, SigningCredential};
use hashnode_webhook_proxy::webhook::{sign, CanonicalPayload};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

pub const TEST_SECRET: &str = "whsec_test";
pub const TEST_ACCESS_KEY: &str = "AKIDEXAMPLE";
pub const TEST_SECRET_KEY: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";
pub const TEST_SIGNING_REGION: &str = "eu-west-1";

/// A request as seen by the mock origin.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Mock origin that records requests and answers `202 {"accepted":true}`.
pub struct MockOrigin {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<Captured>>>,
}

impl MockOrigin {
    pub async fn start() -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .fallback(record)
            .with_state(requests.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, requests }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn received(&self) -> Vec<Captured> {
        self.requests.lock().unwrap().clone()
    }
}

async fn record(
    State(requests): State<Arc<Mutex<Vec<Captured>>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    requests.lock().unwrap().push(Captured {
        method,
        uri,
        headers,
        body,
    });
    (
        StatusCode::ACCEPTED,
        [("content-type", "application/json")],
        r#"{"accepted":true}"#,
    )
}

/// Proxy router pointed at `origin_url`, with the test secret and static credentials.
pub fn proxy_router(origin_url: &str) -> Router {
    let config = Config {
        origin_url: Some(origin_url.to_string()),
        signing_region: Some(TEST_SIGNING_REGION.to_string()),
        ..Config::default()
    };
    let secrets = Arc::new(StaticSecretProvider::new(Some(TEST_SECRET.to_string())));
    let credentials = Arc::new(StaticCredentialProvider::new(test_credential()));
    let state = AppState::from_config(&config, secrets, credentials, Some(Metrics::new())).unwrap();
    router(Arc::new(state), config.max_body_size)
}

pub fn test_credential() -> SigningCredential {
    SigningCredential::new(TEST_ACCESS_KEY, TEST_SECRET_KEY, None, "us-east-1", "lambda")
}

fn header(captured: &Captured, name: &str) -> String {
    captured
        .headers
        .get(name)
        .unwrap_or_else(|| panic!("origin request has no {} header", name))
        .to_str()
        .unwrap()
        .to_string()
}

/// Recompute the SigV4 `authorization` header from the request exactly as the
/// origin received it, using its `SignedHeaders` and `x-amz-date`.
/// Returns `(sent, recomputed)`.
pub fn resign_as_received(captured: &Captured) -> (String, String) {
    let sent = header(captured, "authorization");
    let signed_headers = sent
        .split("SignedHeaders=")
        .nth(1)
        .and_then(|rest| rest.split(',').next())
        .unwrap()
        .to_string();

    let mut headers = Headers::new();
    for name in signed_headers.split(';') {
        headers.insert(name.to_string(), header(captured, name));
    }

    let host = header(captured, "host");
    let (hostname, port) = host.rsplit_once(':').unwrap();
    let request = HttpRequest::new(HttpRequestOptions {
        method: Some(captured.method.to_string()),
        protocol: Some("http:".to_string()),
        hostname: Some(hostname.to_string()),
        port: Some(port.parse().unwrap()),
        path: Some(captured.uri.path().to_string()),
        query: Some(HttpRequest::parse_query(captured.uri.query().unwrap_or(""))),
        headers: Some(headers),
        body: (!captured.body.is_empty()).then(|| captured.body.clone()),
        ..Default::default()
    });

    let time = chrono::NaiveDateTime::parse_from_str(
        &header(captured, "x-amz-date"),
        "%Y%m%dT%H%M%SZ",
    )
    .unwrap()
    .and_utc();
    let resigned = SigV4Signer::default()
        .sign_at(&request, &test_credential(), TEST_SIGNING_REGION, time)
        .unwrap();
    (sent, resigned.headers["authorization"].clone())
}

/// Signature header for `body` signed now with the test secret.
pub fn signature_for(body: &str) -> String {
    let ts = chrono::Utc::now().timestamp_millis();
    signature_at(body, ts)
}

pub fn signature_at(body: &str, ts: i64) -> String {
    let payload = CanonicalPayload::from_slice(body.as_bytes()).unwrap();
    format!(
        "t={},v1={}",
        ts,
        sign(ts, payload.as_ref(), TEST_SECRET.as_bytes())
    )
}
