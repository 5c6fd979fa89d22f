//! Local HTTP server standing in for the remote APIs in provider tests.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
};
use serde_json::Value;
use std::sync::{Arc, Mutex};

type Responder = Arc<dyn Fn(&Value) -> (StatusCode, String) + Send + Sync>;

/// One request as the server saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Clone)]
struct ServerState {
    responder: Responder,
    recorded: Arc<Mutex<Vec<Recorded>>>,
}

pub struct TestServer {
    pub url: String,
    recorded: Arc<Mutex<Vec<Recorded>>>,
}

impl TestServer {
    /// Answers every request with `responder(json_body)`.
    pub async fn start(
        responder: impl Fn(&Value) -> (StatusCode, String) + Send + Sync + 'static,
    ) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let recorded = Arc::new(Mutex::new(Vec::new()));

        let state = ServerState { responder: Arc::new(responder), recorded: recorded.clone() };
        let app = Router::new().fallback(record).with_state(state);
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        Self { url, recorded }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.recorded.lock().unwrap().clone()
    }
}

async fn record(
    State(state): State<ServerState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let reply = (state.responder)(&body);
    state.recorded.lock().unwrap().push(Recorded { path: uri.path().to_string(), headers, body });
    reply
}
