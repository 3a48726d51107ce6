//! Owned model of an outbound HTTP request.
//!
//! This is the unit the SigV4 re-signer operates on. It is a plain value:
//! `Clone` performs a deep copy, so a signed copy never aliases the headers or
//! query of the request it was derived from.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// A single query parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Single(String),
    Multi(Vec<String>),
    /// A bare key with no `=value` part.
    Null,
}

pub type QueryParameters = BTreeMap<String, QueryValue>;
pub type Headers = BTreeMap<String, String>;

/// Partial constructor input; every unset field falls back to a default.
#[derive(Debug, Clone, Default)]
pub struct HttpRequestOptions {
    pub method: Option<String>,
    pub protocol: Option<String>,
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub query: Option<QueryParameters>,
    pub headers: Option<Headers>,
    pub body: Option<Bytes>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub fragment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    method: String,
    protocol: String,
    hostname: String,
    port: Option<u16>,
    path: String,
    pub query: QueryParameters,
    pub headers: Headers,
    pub body: Option<Bytes>,
    username: Option<String>,
    password: Option<String>,
    fragment: Option<String>,
}

/// Error returned when a JSON value does not have the request shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("value is not an HTTP request: {0}")]
pub struct NotARequest(pub &'static str);

/// Error returned when a request does not form a valid absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid request URL {url}: {reason}")]
pub struct InvalidUrl {
    pub url: String,
    pub reason: String,
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self::new(HttpRequestOptions::default())
    }
}

impl HttpRequest {
    pub fn new(options: HttpRequestOptions) -> Self {
        let protocol = match options.protocol.filter(|p| !p.is_empty()) {
            Some(p) if p.ends_with(':') => p,
            Some(p) => format!("{}:", p),
            None => "https:".to_string(),
        };
        let path = match options.path.filter(|p| !p.is_empty()) {
            Some(p) if p.starts_with('/') => p,
            Some(p) => format!("/{}", p),
            None => "/".to_string(),
        };

        Self {
            method: options
                .method
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "GET".to_string()),
            protocol,
            hostname: options
                .hostname
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| "localhost".to_string()),
            port: options.port,
            path,
            query: options.query.unwrap_or_default(),
            headers: options.headers.unwrap_or_default(),
            body: options.body,
            username: options.username,
            password: options.password,
            fragment: options.fragment,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Value for the `host` header: hostname, plus the port when one is set.
    pub fn host(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.hostname, port),
            None => self.hostname.clone(),
        }
    }

    /// Look up a header by name, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Remove every header matching `name`, ignoring ASCII case.
    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
    }

    /// Serialize the query map as `a=1&b=x&b=y&flag`, keys in sorted order.
    pub fn query_string(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.query {
            let key = urlencoding::encode(key);
            match value {
                QueryValue::Single(v) => push_pair(&mut out, &key, Some(v)),
                QueryValue::Multi(values) => {
                    for v in values {
                        push_pair(&mut out, &key, Some(v));
                    }
                }
                QueryValue::Null => push_pair(&mut out, &key, None),
            }
        }
        out
    }

    /// Full URL of the request.
    pub fn url(&self) -> String {
        let mut url = format!("{}//", self.protocol);
        if let Some(user) = &self.username {
            url.push_str(user);
            if let Some(password) = &self.password {
                let _ = write!(url, ":{}", password);
            }
            url.push('@');
        }
        url.push_str(&self.host());
        url.push_str(&self.path);
        let query = self.query_string();
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        if let Some(fragment) = &self.fragment {
            url.push('#');
            url.push_str(fragment);
        }
        url
    }

    /// The request as an HTTP client will put it on the wire.
    ///
    /// `url()` is parsed with WHATWG rules, which resolve dot segments
    /// (including `%2e` and `%2e%2e`) and percent-encode the path. The
    /// returned copy carries the parsed path and query, so whatever is
    /// signed from it matches what the origin receives.
    pub fn to_wire(&self) -> Result<Self, InvalidUrl> {
        let raw = self.url();
        let parsed = reqwest::Url::parse(&raw).map_err(|e| InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;

        let mut wire = self.clone();
        wire.path = parsed.path().to_string();
        wire.query = Self::parse_query(parsed.query().unwrap_or(""));
        Ok(wire)
    }

    /// Parse a raw query string (`a=1&b=2&b=3&flag`) into a query map.
    ///
    /// Keys and values are percent-decoded; repeated keys collect into
    /// [`QueryValue::Multi`].
    pub fn parse_query(raw: &str) -> QueryParameters {
        let mut query = QueryParameters::new();
        for pair in raw.split('&').filter(|s| !s.is_empty()) {
            let (key, value) = match pair.split_once('=') {
                Some((k, v)) => (decode(k), Some(decode(v))),
                None => (decode(pair), None),
            };
            let entry = query.remove(&key);
            let merged = match (entry, value) {
                (None, Some(v)) => QueryValue::Single(v),
                (None, None) => QueryValue::Null,
                (Some(QueryValue::Single(a)), Some(b)) => QueryValue::Multi(vec![a, b]),
                (Some(QueryValue::Multi(mut values)), Some(b)) => {
                    values.push(b);
                    QueryValue::Multi(values)
                }
                (Some(QueryValue::Null), Some(b)) => QueryValue::Single(b),
                (Some(existing), None) => existing,
            };
            query.insert(key, merged);
        }
        query
    }

    /// Structural check: does `value` look like a serialized request?
    ///
    /// Requires `method`, `protocol`, `hostname` and `path` keys, and
    /// object-typed `query` and `headers`.
    pub fn is_instance(value: &Value) -> bool {
        let Some(object) = value.as_object() else {
            return false;
        };
        ["method", "protocol", "hostname", "path"]
            .iter()
            .all(|key| object.contains_key(*key))
            && object.get("query").is_some_and(Value::is_object)
            && object.get("headers").is_some_and(Value::is_object)
    }

    /// Serialize to the JSON shape accepted by [`HttpRequest::is_instance`].
    ///
    /// The body is emitted as a UTF-8 string (lossy).
    pub fn to_value(&self) -> Value {
        let mut object = serde_json::Map::new();
        object.insert("method".into(), self.method.clone().into());
        object.insert("protocol".into(), self.protocol.clone().into());
        object.insert("hostname".into(), self.hostname.clone().into());
        if let Some(port) = self.port {
            object.insert("port".into(), port.into());
        }
        object.insert("path".into(), self.path.clone().into());
        object.insert(
            "query".into(),
            serde_json::to_value(&self.query).unwrap_or_else(|_| Value::Object(Default::default())),
        );
        object.insert(
            "headers".into(),
            serde_json::to_value(&self.headers).unwrap_or_else(|_| Value::Object(Default::default())),
        );
        if let Some(body) = &self.body {
            object.insert("body".into(), String::from_utf8_lossy(body).into_owned().into());
        }
        for (key, field) in [
            ("username", &self.username),
            ("password", &self.password),
            ("fragment", &self.fragment),
        ] {
            if let Some(v) = field {
                object.insert(key.into(), v.clone().into());
            }
        }
        Value::Object(object)
    }
}

impl TryFrom<&Value> for HttpRequest {
    type Error = NotARequest;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        if !Self::is_instance(value) {
            return Err(NotARequest("missing method/protocol/hostname/path/query/headers"));
        }

        let string = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);

        let query: QueryParameters = serde_json::from_value(value["query"].clone())
            .map_err(|_| NotARequest("query values must be strings, string lists or null"))?;
        let headers: Headers = serde_json::from_value(value["headers"].clone())
            .map_err(|_| NotARequest("header values must be strings"))?;
        let port = match value.get("port") {
            None | Some(Value::Null) => None,
            Some(p) => Some(
                p.as_u64()
                    .and_then(|p| u16::try_from(p).ok())
                    .ok_or(NotARequest("port must be an integer in 0..=65535"))?,
            ),
        };

        Ok(Self::new(HttpRequestOptions {
            method: string("method"),
            protocol: string("protocol"),
            hostname: string("hostname"),
            port,
            path: string("path"),
            query: Some(query),
            headers: Some(headers),
            body: string("body").map(Bytes::from),
            username: string("username"),
            password: string("password"),
            fragment: string("fragment"),
        }))
    }
}

fn push_pair(out: &mut String, key: &str, value: Option<&str>) {
    if !out.is_empty() {
        out.push('&');
    }
    out.push_str(key);
    if let Some(value) = value {
        out.push('=');
        out.push_str(&urlencoding::encode(value));
    }
}

fn decode(s: &str) -> String {
    let s = s.replace('+', " ");
    let decoded = urlencoding::decode(&s).map(|c| c.into_owned());
    decoded.unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let req = HttpRequest::default();
        assert_eq!(req.method(), "GET");
        assert_eq!(req.protocol(), "https:");
        assert_eq!(req.hostname(), "localhost");
        assert_eq!(req.path(), "/");
        assert!(req.query.is_empty());
        assert!(req.headers.is_empty());
        assert!(req.body.is_none());
    }

    #[test]
    fn test_normalizes_protocol_and_path() {
        let req = HttpRequest::new(HttpRequestOptions {
            protocol: Some("http".into()),
            path: Some("hooks/hashnode".into()),
            ..Default::default()
        });
        assert_eq!(req.protocol(), "http:");
        assert_eq!(req.path(), "/hooks/hashnode");

        let req = HttpRequest::new(HttpRequestOptions {
            protocol: Some("http:".into()),
            path: Some(String::new()),
            ..Default::default()
        });
        assert_eq!(req.protocol(), "http:");
        assert_eq!(req.path(), "/");
    }

    #[test]
    fn test_clone_is_deep() {
        let mut headers = Headers::new();
        headers.insert("a".into(), "1".into());
        let mut query = QueryParameters::new();
        query.insert("q".into(), QueryValue::Multi(vec!["x".into()]));
        let original = HttpRequest::new(HttpRequestOptions {
            headers: Some(headers),
            query: Some(query),
            ..Default::default()
        });

        let mut copy = original.clone();
        copy.headers.insert("a".into(), "2".into());
        if let Some(QueryValue::Multi(values)) = copy.query.get_mut("q") {
            values.push("y".into());
        }

        assert_eq!(original.headers.get("a").map(String::as_str), Some("1"));
        assert_eq!(
            original.query.get("q"),
            Some(&QueryValue::Multi(vec!["x".into()]))
        );
        assert_eq!(copy.headers.get("a").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_parse_query() {
        let query = HttpRequest::parse_query("b=2&a=1&b=3&flag&sp=a%20b+c");
        assert_eq!(query.get("a"), Some(&QueryValue::Single("1".into())));
        assert_eq!(
            query.get("b"),
            Some(&QueryValue::Multi(vec!["2".into(), "3".into()]))
        );
        assert_eq!(query.get("flag"), Some(&QueryValue::Null));
        assert_eq!(query.get("sp"), Some(&QueryValue::Single("a b c".into())));
    }

    #[test]
    fn test_url() {
        let req = HttpRequest::new(HttpRequestOptions {
            hostname: Some("abc.lambda-url.eu-west-1.on.aws".into()),
            port: Some(8443),
            path: Some("/hook".into()),
            query: Some(HttpRequest::parse_query("x=1&y=a%20b&flag")),
            fragment: Some("top".into()),
            ..Default::default()
        });
        assert_eq!(
            req.url(),
            "https://abc.lambda-url.eu-west-1.on.aws:8443/hook?flag&x=1&y=a%20b#top"
        );
    }

    #[test]
    fn test_to_wire_resolves_encoded_dot_segments() {
        let req = HttpRequest::new(HttpRequestOptions {
            hostname: Some("example.com".into()),
            path: Some("/a/%2e%2e/b/./c/%2E/d".into()),
            ..Default::default()
        });
        let wire = req.to_wire().unwrap();
        assert_eq!(wire.path(), "/b/c/d");
        assert_eq!(req.path(), "/a/%2e%2e/b/./c/%2E/d");
        assert_eq!(wire.to_wire().unwrap(), wire);
    }

    #[test]
    fn test_to_wire_keeps_encoded_path_and_query() {
        let req = HttpRequest::new(HttpRequestOptions {
            hostname: Some("example.com".into()),
            path: Some("/hooks/a%20b".into()),
            query: Some(HttpRequest::parse_query("q=a+b&r=%2F&flag")),
            ..Default::default()
        });
        let wire = req.to_wire().unwrap();
        assert_eq!(wire.path(), "/hooks/a%20b");
        assert_eq!(wire.query, req.query);
        assert_eq!(wire.url(), req.url());
    }

    #[test]
    fn test_to_wire_rejects_bad_host() {
        let req = HttpRequest::new(HttpRequestOptions {
            hostname: Some("bad host".into()),
            ..Default::default()
        });
        assert!(req.to_wire().is_err());
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let mut req = HttpRequest::default();
        req.headers.insert("X-Forwarded-For".into(), "1.2.3.4".into());
        assert_eq!(req.header("x-forwarded-for"), Some("1.2.3.4"));
        req.remove_header("x-FORWARDED-for");
        assert!(req.headers.is_empty());
    }

    #[test]
    fn test_is_instance() {
        assert!(HttpRequest::is_instance(&json!({
            "method": "POST",
            "protocol": "https:",
            "hostname": "example.com",
            "path": "/",
            "query": {},
            "headers": {}
        })));
        // Missing hostname.
        assert!(!HttpRequest::is_instance(&json!({
            "method": "POST", "protocol": "https:", "path": "/", "query": {}, "headers": {}
        })));
        // Headers not an object.
        assert!(!HttpRequest::is_instance(&json!({
            "method": "POST", "protocol": "https:", "hostname": "h", "path": "/",
            "query": {}, "headers": "nope"
        })));
        assert!(!HttpRequest::is_instance(&json!(null)));
        assert!(!HttpRequest::is_instance(&json!([1, 2])));
    }

    #[test]
    fn test_value_round_trip() {
        let mut headers = Headers::new();
        headers.insert("content-type".into(), "application/json".into());
        let req = HttpRequest::new(HttpRequestOptions {
            method: Some("POST".into()),
            hostname: Some("example.com".into()),
            port: Some(443),
            path: Some("/api".into()),
            query: Some(HttpRequest::parse_query("a=1&a=2&b")),
            headers: Some(headers),
            body: Some(Bytes::from_static(b"{}")),
            ..Default::default()
        });
        let value = req.to_value();
        assert!(HttpRequest::is_instance(&value));
        assert_eq!(HttpRequest::try_from(&value).unwrap(), req);
    }

    #[test]
    fn test_try_from_rejects_bad_shapes() {
        let value = json!({
            "method": "GET", "protocol": "https:", "hostname": "h", "path": "/",
            "query": {"a": 5}, "headers": {}
        });
        assert!(HttpRequest::try_from(&value).is_err());
    }
}
