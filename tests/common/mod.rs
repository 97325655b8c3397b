//! Shared harness: a router wired to a canned text backend

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, Bytes},
    http::{HeaderMap, Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use mock_mcp_server::config::Config;
use mock_mcp_server::gateway::{AppState, create_router};
use mock_mcp_server::generator::{CompletionRequest, PromptLibrary, ResponseGenerator, TextBackend};

/// An address on the default allow-list
pub const ALLOWED_IP: &str = "35.156.37.90";

/// An address not on the default allow-list
pub const OUTSIDE_IP: &str = "203.0.113.9";

/// Backend that always answers with the same text
pub struct CannedBackend {
    reply: String,
    calls: AtomicUsize,
}

impl CannedBackend {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextBackend for CannedBackend {
    async fn complete(&self, _request: &CompletionRequest) -> mock_mcp_server::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub backend: Arc<CannedBackend>,
}

/// Build the app without starting the session managers
pub fn build_app(config: &Config, reply: &str) -> TestApp {
    let backend = CannedBackend::new(reply);
    let generator = ResponseGenerator::new(backend.clone(), PromptLibrary::empty(), &config.llm);
    let state = Arc::new(AppState::new(config, &generator).unwrap());
    TestApp {
        router: create_router(Arc::clone(&state)),
        state,
        backend,
    }
}

/// Build the app and start every session manager
pub async fn start_app(config: &Config, reply: &str) -> TestApp {
    let app = build_app(config, reply);
    app.state.lifecycle.start_all().await.unwrap();
    app
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, ip: &str) -> TestResponse {
        self.send(
            Request::builder()
                .uri(uri)
                .header("x-forwarded-for", ip)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// POST one JSON-RPC message to a vendor endpoint
    pub async fn rpc(&self, uri: &str, session: Option<&str>, message: &Value) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("accept", "application/json, text/event-stream")
            .header("x-forwarded-for", ALLOWED_IP);
        if let Some(session) = session {
            builder = builder.header("mcp-session-id", session);
        }
        self.send(builder.body(Body::from(message.to_string())).unwrap())
            .await
    }

    /// Run `initialize` and return the issued session id
    pub async fn initialize(&self, uri: &str) -> String {
        let response = self
            .rpc(
                uri,
                None,
                &json!({
                    "jsonrpc": "2.0",
                    "id": 0,
                    "method": "initialize",
                    "params": {
                        "protocolVersion": "2025-06-18",
                        "capabilities": {},
                        "clientInfo": {"name": "test-client", "version": "1.0"}
                    }
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text());
        response.header("mcp-session-id").unwrap().to_string()
    }
}

/// Decode the JSON carried in the first text item of a `tools/call` result
pub fn tool_payload(result: &Value) -> Value {
    let text = result["content"][0]["text"].as_str().unwrap();
    serde_json::from_str(text).unwrap()
}
