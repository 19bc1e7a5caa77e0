//! In-process fake sidecar for the integration tests.
//!
//! Every request is recorded; responses are scripted per `(method, path)` and
//! default to `204 No Content`.

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::Response;
use axum::Router;
use dapr_sdk::{ClientConfig, DaprClient};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body is JSON")
    }
}

#[derive(Debug, Clone)]
pub struct Scripted {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub delay: Option<Duration>,
}

impl Scripted {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
            body: body.into(),
            delay: None,
        }
    }

    pub fn status(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            delay: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Holds the answer back for `delay`.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Default)]
struct Inner {
    requests: Vec<Recorded>,
    responses: HashMap<(Method, String), Scripted>,
}

type Shared = Arc<Mutex<Inner>>;

pub struct FakeSidecar {
    pub addr: SocketAddr,
    inner: Shared,
    handle: JoinHandle<()>,
}

impl FakeSidecar {
    pub async fn start() -> Self {
        let inner: Shared = Arc::default();
        let app = Router::new().fallback(record).with_state(inner.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake sidecar");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake sidecar stopped");
        });
        Self { addr, inner, handle }
    }

    pub fn respond(&self, method: Method, path: &str, response: Scripted) {
        self.inner
            .lock()
            .unwrap()
            .responses
            .insert((method, path.to_string()), response);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.inner.lock().unwrap().requests.clone()
    }

    /// Requests other than readiness probes.
    pub fn calls(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path != "/v1.0/healthz/outbound")
            .collect()
    }

    pub fn last(&self) -> Recorded {
        self.calls().pop().expect("at least one call")
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_endpoint(&format!("http://{}", self.addr))
            .expect("valid endpoint")
    }

    pub fn client(&self) -> DaprClient {
        DaprClient::new(self.config())
    }
}

impl Drop for FakeSidecar {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn record(State(inner): State<Shared>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, usize::MAX).await.unwrap_or_default().to_vec();
    let path = parts.uri.path().to_string();
    let scripted = {
        let mut inner = inner.lock().unwrap();
        inner.requests.push(Recorded {
            method: parts.method.clone(),
            path: path.clone(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers.clone(),
            body,
        });
        inner.responses.get(&(parts.method, path)).cloned()
    };
    let scripted = scripted.unwrap_or_else(|| Scripted::status(StatusCode::NO_CONTENT, Vec::new()));
    if let Some(delay) = scripted.delay {
        tokio::time::sleep(delay).await;
    }
    let mut builder = Response::builder().status(scripted.status);
    for (name, value) in &scripted.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder.body(Body::from(scripted.body)).unwrap()
}
