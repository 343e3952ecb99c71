//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower::ServiceExt;

use nodehub::config::HubConfig;
use nodehub::http::{build_router, AppState, HttpServer};
use nodehub::lifecycle::Shutdown;
use nodehub::store::{MemoryStore, SharedStore};

pub const ADMIN_KEY: &str = "test-admin-key";

pub fn test_config() -> HubConfig {
    let mut config = HubConfig::default();
    config.admin.api_key = ADMIN_KEY.to_string();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config
}

/// Router over a fresh in-memory store.
pub fn test_app() -> (Router, AppState) {
    test_app_with(test_config())
}

pub fn test_app_with(config: HubConfig) -> (Router, AppState) {
    let store: SharedStore = Arc::new(MemoryStore::new(None));
    let state = AppState::new(config, store);
    (build_router(state.clone()), state)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is not JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("response body is not UTF-8")
    }

    pub fn data(&self) -> Value {
        self.json()["data"].clone()
    }

    pub fn error_code(&self) -> String {
        self.json()["error"]["code"].as_str().unwrap_or_default().to_string()
    }
}

pub async fn send(app: &Router, req: Request<Body>) -> TestResponse {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let headers = res.headers().clone();
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap().to_vec();
    TestResponse { status, headers, body }
}

pub async fn request(
    app: &Router,
    method: Method,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let req = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    send(app, req).await
}

pub async fn admin(app: &Router, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
    request(app, method, uri, &[("x-admin-key", ADMIN_KEY)], body).await
}

pub async fn agent(app: &Router, method: Method, uri: &str, token: &str, body: Option<Value>) -> TestResponse {
    request(app, method, uri, &[("x-node-token", token)], body).await
}

/// Create a vps node and return `(id, token)`.
pub async fn create_node(app: &Router, name: &str, entry_direct: &str) -> (String, String) {
    let res = admin(
        app,
        Method::POST,
        "/api/nodes",
        Some(serde_json::json!({"name": name, "node_type": "vps", "entry_direct": entry_direct})),
    )
    .await;
    assert_eq!(res.status, StatusCode::CREATED, "create node: {}", res.text());
    let data = res.data();
    (
        data["id"].as_str().unwrap().to_string(),
        data["token"].as_str().unwrap().to_string(),
    )
}

/// Queue a release and return its version.
pub async fn release(app: &Router, node_ids: &[&str], template_ids: &[&str], params: Value) -> u64 {
    let res = admin(
        app,
        Method::POST,
        "/api/releases",
        Some(serde_json::json!({
            "node_ids": node_ids,
            "template_ids": template_ids,
            "params": params,
        })),
    )
    .await;
    assert_eq!(res.status, StatusCode::CREATED, "create release: {}", res.text());
    res.data()["version"].as_u64().unwrap()
}

/// A real server on an ephemeral port.
pub struct RunningServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub shutdown: Shutdown,
    pub config_tx: mpsc::UnboundedSender<HubConfig>,
    pub handle: tokio::task::JoinHandle<()>,
}

impl RunningServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

pub async fn start_server(config: HubConfig) -> RunningServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let store: SharedStore = Arc::new(MemoryStore::new(None));
    let server = HttpServer::new(config, store);
    let state = server.state().clone();

    let shutdown = Shutdown::new();
    let (config_tx, config_rx) = mpsc::unbounded_channel();
    let rx = shutdown.subscribe();
    let handle = tokio::spawn(async move {
        server.run(listener, config_rx, rx).await.unwrap();
    });

    RunningServer {
        addr,
        state,
        shutdown,
        config_tx,
        handle,
    }
}
