//! Inbound proxy requests and the outbound requests they turn into

use std::fmt;
use std::str::FromStr;

use crate::cache::{CacheType, NegativeCacheKey};
use crate::types::RequestPath;

/// Request headers that change which representation the origin returns
pub const NEGOTIATION_HEADERS: [&str; 3] = ["accept", "accept-encoding", "accept-language"];

pub const ETAG_HEADER: &str = "etag";
pub const LAST_MODIFIED_HEADER: &str = "last-modified";
pub const IF_NONE_MATCH_HEADER: &str = "if-none-match";
pub const IF_MODIFIED_SINCE_HEADER: &str = "if-modified-since";

/// Request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Put,
    Post,
    Delete,
    Options,
}

impl Method {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "PUT" => Ok(Self::Put),
            "POST" => Ok(Self::Post),
            "DELETE" => Ok(Self::Delete),
            "OPTIONS" => Ok(Self::Options),
            other => Err(format!("unsupported method: {other}")),
        }
    }
}

/// Header list with case-insensitive names, stored lowercased
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    /// Set a header, replacing any previous value
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Sort `&`-separated parameters so equivalent queries compare equal
fn canonical_query(query: &str) -> Option<String> {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut params: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
    if params.is_empty() {
        return None;
    }
    params.sort_unstable();
    Some(params.join("&"))
}

/// A request arriving at a proxy repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    method: Method,
    path: RequestPath,
    query: Option<String>,
    headers: Headers,
    cache_type: CacheType,
}

impl ProxyRequest {
    /// Request with no query or headers, cached as content
    #[must_use]
    pub fn new(method: Method, path: RequestPath) -> Self {
        Self {
            method,
            path,
            query: None,
            headers: Headers::default(),
            cache_type: CacheType::Content,
        }
    }

    #[must_use]
    pub fn get(path: RequestPath) -> Self {
        Self::new(Method::Get, path)
    }

    /// Attach a query string; parameter order does not matter
    #[must_use]
    pub fn with_query(mut self, query: &str) -> Self {
        self.query = canonical_query(query);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Resource class deciding which cache controller applies
    #[must_use]
    pub fn with_cache_type(mut self, cache_type: CacheType) -> Self {
        self.cache_type = cache_type;
        self
    }

    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    #[must_use]
    pub fn path(&self) -> &RequestPath {
        &self.path
    }

    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    #[must_use]
    pub fn cache_type(&self) -> CacheType {
        self.cache_type
    }

    /// Key of the stored asset: path plus canonical query
    #[must_use]
    pub fn storage_key(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{query}", self.path),
            None => self.path.to_string(),
        }
    }

    /// Negative cache key: path, query and negotiation headers
    #[must_use]
    pub fn negative_key(&self) -> NegativeCacheKey {
        let mut key = NegativeCacheKey::new(self.path.as_str());
        if let Some(query) = &self.query {
            key = key.with_query(query.as_str());
        }
        for name in NEGOTIATION_HEADERS {
            if let Some(value) = self.headers.get(name) {
                key = key.with_dimension(name, value);
            }
        }
        key
    }

    /// Outbound fetch against `remote_url` for the cache
    ///
    /// Only negotiation headers are forwarded. Client headers such as `Range`
    /// or `If-None-Match` would make the origin answer with something other
    /// than the full asset.
    #[must_use]
    pub fn to_remote(&self, remote_url: &str) -> RemoteRequest {
        let mut headers = Headers::default();
        for name in NEGOTIATION_HEADERS {
            if let Some(value) = self.headers.get(name) {
                headers.insert(name, value);
            }
        }
        RemoteRequest {
            method: self.method,
            url: self.remote_url(remote_url),
            headers,
        }
    }

    /// Outbound request against `remote_url` carrying every client header
    #[must_use]
    pub fn to_remote_verbatim(&self, remote_url: &str) -> RemoteRequest {
        RemoteRequest {
            method: self.method,
            url: self.remote_url(remote_url),
            headers: self.headers.clone(),
        }
    }

    fn remote_url(&self, remote_url: &str) -> String {
        let mut url = String::with_capacity(remote_url.len() + self.path.len());
        url.push_str(remote_url.trim_end_matches('/'));
        url.push_str(&self.path);
        if let Some(query) = &self.query {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

/// Request sent to the remote origin through the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRequest {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
}

/// Response from the remote origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse {
    status: u16,
    headers: Headers,
    body: Vec<u8>,
}

impl RemoteResponse {
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Headers::default(),
            body: Vec::new(),
        }
    }

    /// 200 with a body
    #[must_use]
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..Self::new(200)
        }
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::new(404)
    }

    #[must_use]
    pub fn not_modified() -> Self {
        Self::new(304)
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[must_use]
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> RequestPath {
        s.parse().unwrap()
    }

    #[test]
    fn query_is_canonical() {
        let a = ProxyRequest::get(path("/a")).with_query("b=2&a=1");
        let b = ProxyRequest::get(path("/a")).with_query("?a=1&b=2");
        assert_eq!(a.query(), Some("a=1&b=2"));
        assert_eq!(a.negative_key(), b.negative_key());
        assert_eq!(a.storage_key(), "/a?a=1&b=2");
    }

    #[test]
    fn empty_query_is_absent() {
        let request = ProxyRequest::get(path("/a")).with_query("?");
        assert_eq!(request.query(), None);
        assert_eq!(request.storage_key(), "/a");
    }

    #[test]
    fn negotiation_headers_split_keys() {
        let json = ProxyRequest::get(path("/pkg")).with_header("Accept", "application/json");
        let plain = ProxyRequest::get(path("/pkg"));
        assert_ne!(json.negative_key(), plain.negative_key());

        let traced = ProxyRequest::get(path("/pkg")).with_header("X-Trace", "1");
        assert_eq!(traced.negative_key(), plain.negative_key());
    }

    #[test]
    fn remote_url_joins_cleanly() {
        let request = ProxyRequest::get(path("/org/x.jar")).with_query("v=1");
        let remote = request.to_remote("https://repo.example.com/maven2/");
        assert_eq!(remote.url, "https://repo.example.com/maven2/org/x.jar?v=1");
        assert_eq!(remote.method, Method::Get);
    }

    #[test]
    fn cache_fetch_forwards_only_negotiation_headers() {
        let request = ProxyRequest::get(path("/big.jar"))
            .with_header("Range", "bytes=0-3")
            .with_header("If-None-Match", "\"client\"")
            .with_header("Accept-Encoding", "gzip");

        let remote = request.to_remote("https://repo.example.com");
        assert_eq!(remote.headers.get("range"), None);
        assert_eq!(remote.headers.get("if-none-match"), None);
        assert_eq!(remote.headers.get("accept-encoding"), Some("gzip"));
        assert_eq!(remote.headers.len(), 1);

        let verbatim = request.to_remote_verbatim("https://repo.example.com");
        assert_eq!(verbatim.headers.get("range"), Some("bytes=0-3"));
        assert_eq!(verbatim.url, remote.url);
    }

    #[test]
    fn headers_are_case_insensitive() {
        let mut headers = Headers::default();
        headers.insert("ETag", "\"v1\"");
        headers.insert("etag", "\"v2\"");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("ETAG"), Some("\"v2\""));
    }

    #[test]
    fn method_parse() {
        assert_eq!("get".parse::<Method>(), Ok(Method::Get));
        assert!("BREW".parse::<Method>().is_err());
    }

    #[test]
    fn response_helpers() {
        let response = RemoteResponse::ok("bytes").with_header("ETag", "\"1\"");
        assert!(response.is_success());
        assert_eq!(response.header("etag"), Some("\"1\""));
        assert_eq!(response.body(), b"bytes");
        assert!(!RemoteResponse::not_found().is_success());
    }
}
