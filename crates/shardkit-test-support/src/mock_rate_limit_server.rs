//! A scriptable HTTP server for exercising the rate-limit coordinator,
//! grounded on `services/server`'s `axum::serve` setup — the teacher's
//! go-to for spinning up a real local server in tests rather than
//! mocking the transport layer.

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// One scripted response: either ordinary headers, or a 429 with a
/// `retry_after` (milliseconds) body.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Ok { limit: u64, remaining: i64, reset_at: f64 },
    TooManyRequests { retry_after_ms: f64 },
}

struct ServerState {
    script: Mutex<Vec<ScriptedResponse>>,
    request_count: AtomicU64,
}

/// A local HTTP server whose response to every request is popped off a
/// pre-loaded script (falling back to a generous default once the
/// script is exhausted), counting total requests received.
pub struct MockRateLimitServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    _task: tokio::task::JoinHandle<()>,
}

impl MockRateLimitServer {
    pub async fn start(script: Vec<ScriptedResponse>) -> std::io::Result<Self> {
        let state = Arc::new(ServerState {
            script: Mutex::new(script),
            request_count: AtomicU64::new(0),
        });

        let router = Router::new()
            .route("/{*path}", any(handle))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(MockRateLimitServer { addr, state, _task: task })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn request_count(&self) -> u64 {
        self.state.request_count.load(Ordering::SeqCst)
    }
}

async fn handle(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    state.request_count.fetch_add(1, Ordering::SeqCst);
    let scripted = {
        let mut script = state.script.lock().await;
        if script.is_empty() {
            ScriptedResponse::Ok { limit: 5, remaining: 4, reset_at: 0.0 }
        } else {
            script.remove(0)
        }
    };

    let mut headers = HeaderMap::new();
    match scripted {
        ScriptedResponse::Ok { limit, remaining, reset_at } => {
            headers.insert("X-Ratelimit-Limit", limit.to_string().parse().unwrap());
            headers.insert("X-Ratelimit-Remaining", remaining.to_string().parse().unwrap());
            headers.insert("X-Ratelimit-Reset", reset_at.to_string().parse().unwrap());
            (StatusCode::OK, headers, axum::Json(serde_json::json!({"ok": true})))
        }
        ScriptedResponse::TooManyRequests { retry_after_ms } => (
            StatusCode::TOO_MANY_REQUESTS,
            headers,
            axum::Json(serde_json::json!({
                "global": false,
                "retry_after": retry_after_ms,
                "message": "You are being rate limited.",
            })),
        ),
    }
}
