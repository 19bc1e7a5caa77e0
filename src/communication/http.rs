//! HTTP/1 transport to the sidecar API.
//!
//! Every call goes through [`SidecarTransport::send`], which prefixes the
//! path with `/v1.0`, attaches the `User-Agent` and API token headers, bounds
//! the exchange with the configured timeout and turns non-2xx answers into
//! [`Error::Status`].

use http::header::{CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderName, Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};
use url::Url;

use crate::core::config::ClientConfig;
use crate::core::error::{Error, Result};
use crate::core::logging::LOGGER_NAME;

/// API version prefix of every sidecar route.
pub const API_VERSION: &str = "v1.0";

/// Header carrying the sidecar API token.
pub const API_TOKEN_HEADER: &str = "dapr-api-token";

/// Prefix of query parameters and response headers that carry metadata.
pub const METADATA_PREFIX: &str = "metadata.";

/// One request to the sidecar, relative to `/v1.0`.
#[derive(Debug, Clone)]
pub struct SidecarRequest {
    method: Method,
    segments: Vec<String>,
    query: Vec<(String, String)>,
    headers: Vec<(HeaderName, String)>,
    body: Option<(String, Bytes)>,
}

impl SidecarRequest {
    /// `segments` are percent-encoded individually, so they may hold any text.
    pub fn new<I, S>(method: Method, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Adds every entry as a `metadata.<key>=<value>` query parameter, in key order.
    pub fn metadata(mut self, metadata: &HashMap<String, String>) -> Self {
        let mut entries: Vec<_> = metadata.iter().collect();
        entries.sort();
        for (k, v) in entries {
            self.query.push((format!("{METADATA_PREFIX}{k}"), v.clone()));
        }
        self
    }

    pub fn header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Raw body. An empty content type sends no `Content-Type` header.
    pub fn body(mut self, content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        self.body = Some((content_type.into(), body.into()));
        self
    }

    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(value)?;
        Ok(self.body("application/json", bytes))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path below the API root, e.g. `/v1.0/state/statestore`.
    pub fn path(&self) -> String {
        format!("/{API_VERSION}/{}", self.segments.join("/"))
    }
}

/// A successful sidecar answer.
#[derive(Debug, Clone)]
pub struct SidecarResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl SidecarResponse {
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Response headers named `metadata.<key>`, keyed by `<key>`.
    ///
    /// Header names are case-insensitive and `http` stores them lowercased,
    /// so keys come back lowercase: `metadata.ttlExpireTime` is `ttlexpiretime`.
    pub fn metadata(&self) -> HashMap<String, String> {
        self.headers
            .iter()
            .filter_map(|(name, value)| {
                let key = name.as_str().strip_prefix(METADATA_PREFIX)?;
                Some((key.to_string(), value.to_str().ok()?.to_string()))
            })
            .collect()
    }
}

/// Shared, cloneable HTTP client bound to one sidecar.
#[derive(Clone)]
pub struct SidecarTransport {
    client: Client<HttpConnector, Full<Bytes>>,
    base: Url,
    api_token: Option<SecretString>,
    timeout: Duration,
    user_agent: String,
}

impl std::fmt::Debug for SidecarTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SidecarTransport")
            .field("base", &self.base.as_str())
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SidecarTransport {
    pub fn new(config: &ClientConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self {
            client,
            base: config.endpoint.clone(),
            api_token: config.api_token.clone(),
            timeout: config.timeout,
            user_agent: crate::build::user_agent(),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.base
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Absolute URI for `request`.
    pub fn uri_for(&self, request: &SidecarRequest) -> Result<Uri> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| Error::Config(format!("endpoint {} cannot carry a path", self.base)))?;
            path.pop_if_empty().push(API_VERSION).extend(&request.segments);
        }
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        url.as_str()
            .parse::<Uri>()
            .map_err(|e| Error::Config(format!("request uri {url}: {e}")))
    }

    /// Sends with the transport's default timeout.
    pub async fn send(&self, request: SidecarRequest) -> Result<SidecarResponse> {
        self.send_with_timeout(request, self.timeout).await
    }

    pub async fn send_with_timeout(
        &self,
        request: SidecarRequest,
        timeout: Duration,
    ) -> Result<SidecarResponse> {
        let uri = self.uri_for(&request)?;
        let path = request.path();
        let method = request.method.clone();

        let mut builder = Request::builder()
            .method(request.method)
            .uri(uri)
            .header(USER_AGENT, self.user_agent.as_str());
        if let Some(token) = &self.api_token {
            builder = builder.header(API_TOKEN_HEADER, token.expose_secret());
        }
        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }
        let body = match request.body {
            Some((content_type, bytes)) => {
                if !content_type.is_empty() {
                    builder = builder.header(CONTENT_TYPE, content_type);
                }
                trace!(target: LOGGER_NAME, %method, %path, size = bytes.len(), "request body attached");
                Full::new(bytes)
            }
            None => Full::new(Bytes::new()),
        };
        let http_request = builder.body(body)?;

        let started = Instant::now();
        let exchange = async {
            let response = self.client.request(http_request).await?;
            let (parts, body) = response.into_parts();
            let bytes = body.collect().await?.to_bytes();
            Ok::<_, Error>(SidecarResponse {
                status: parts.status,
                headers: parts.headers,
                body: bytes,
            })
        };
        let response = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| Error::Timeout(timeout))??;

        let elapsed = started.elapsed();
        if !response.status.is_success() {
            let body = String::from_utf8_lossy(&response.body).into_owned();
            warn!(target: LOGGER_NAME, %method, %path, status = response.status.as_u16(), ?elapsed, "sidecar rejected request");
            return Err(Error::Status {
                status: response.status,
                body,
            });
        }
        debug!(target: LOGGER_NAME, %method, %path, status = response.status.as_u16(), ?elapsed, "sidecar request completed");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(endpoint: &str) -> SidecarTransport {
        let config = ClientConfig::default().with_endpoint(endpoint).unwrap();
        SidecarTransport::new(&config)
    }

    #[test]
    fn uri_prefixes_api_version_and_encodes_segments() {
        let t = transport("http://127.0.0.1:3500");
        let req = SidecarRequest::new(Method::GET, ["state", "my store", "key/1"]);
        let uri = t.uri_for(&req).unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:3500/v1.0/state/my%20store/key%2F1");
        assert_eq!(req.path(), "/v1.0/state/my store/key/1");
    }

    #[test]
    fn uri_keeps_endpoint_path_prefix() {
        let t = transport("http://gateway:8080/dapr/");
        let req = SidecarRequest::new(Method::POST, ["publish", "messages", "demo"]);
        assert_eq!(
            t.uri_for(&req).unwrap().to_string(),
            "http://gateway:8080/dapr/v1.0/publish/messages/demo"
        );
    }

    #[test]
    fn metadata_becomes_sorted_query_parameters() {
        let t = transport("http://127.0.0.1:3500");
        let metadata = HashMap::from([
            ("ttlInSeconds".to_string(), "60".to_string()),
            ("partitionKey".to_string(), "a b".to_string()),
        ]);
        let req = SidecarRequest::new(Method::GET, ["state", "s", "k"])
            .query("consistency", "strong")
            .metadata(&metadata);
        assert_eq!(
            t.uri_for(&req).unwrap().query(),
            Some("consistency=strong&metadata.partitionKey=a+b&metadata.ttlInSeconds=60")
        );
    }

    #[test]
    fn response_metadata_is_read_from_prefixed_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("metadata.status-code", "201".parse().unwrap());
        headers.insert("content-type", "text/plain".parse().unwrap());
        let response = SidecarResponse {
            status: StatusCode::OK,
            headers,
            body: Bytes::new(),
        };
        assert_eq!(response.metadata(), HashMap::from([("status-code".to_string(), "201".to_string())]));
        assert_eq!(response.header_str("content-type"), Some("text/plain"));
    }

    #[test]
    fn response_metadata_keys_are_lowercase() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_bytes(b"metadata.ttlExpireTime").unwrap(),
            "2030-01-01T00:00:00Z".parse().unwrap(),
        );
        let response = SidecarResponse {
            status: StatusCode::OK,
            headers,
            body: Bytes::new(),
        };
        let metadata = response.metadata();
        assert_eq!(metadata.get("ttlexpiretime").map(String::as_str), Some("2030-01-01T00:00:00Z"));
        assert!(!metadata.contains_key("ttlExpireTime"));
    }

    #[test]
    fn debug_output_hides_the_token() {
        let config = ClientConfig::default().with_api_token("hunter2");
        let rendered = format!("{:?}", SidecarTransport::new(&config));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("REDACTED"));
    }
}
