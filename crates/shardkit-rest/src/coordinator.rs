//! Per-bucket rate-limit coordinator (C4), grounded on `lib/rest.py`'s
//! `Ratelimiter`/`RestSession._request`.
//!
//! Each bucket is drained by at most one `do_burst` task at a time
//! (`burst_running`), spawned on first submission and respawned whenever
//! the queue gains a submission while none is running. `do_burst` fires
//! each request as its own task so the drain loop itself never blocks on
//! a response — only on `remaining <= 0` (await fresh headers, then
//! sleep until `reset_at`).

use crate::bucket::{BoxFuture, BucketState, QueuedRequest, RequestFn, now_unix_seconds};
use crate::error::RestError;
use crate::models::RatelimitedResponse;
use reqwest::Response;
use shardkit_model::Described;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};

/// Registry of buckets for one REST session. Entries are created lazily
/// and never evicted, matching the source (one process-lifetime dict).
pub struct RateLimitCoordinator {
    client: reqwest::Client,
    buckets: Mutex<HashMap<String, Arc<Mutex<BucketState>>>>,
}

impl Default for RateLimitCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitCoordinator {
    pub fn new() -> Self {
        RateLimitCoordinator {
            client: reqwest::Client::new(),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        RateLimitCoordinator {
            client,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    async fn bucket_for(&self, key: &str) -> Arc<Mutex<BucketState>> {
        let mut buckets = self.buckets.lock().await;
        Arc::clone(
            buckets
                .entry(key.to_owned())
                .or_insert_with(|| Arc::new(Mutex::new(BucketState::new()))),
        )
    }

    /// Enqueue `request_fn` on `bucket_key`'s queue and await its eventual
    /// response. Submissions to distinct buckets run independently; same-
    /// bucket submissions preserve enqueue order in their dispatch start.
    pub async fn submit(&self, bucket_key: impl Into<String>, request_fn: RequestFn) -> Result<Response, RestError> {
        let bucket_key = bucket_key.into();
        let bucket = self.bucket_for(&bucket_key).await;
        let (responder, receiver) = oneshot::channel();

        let mut guard = bucket.lock().await;
        guard.queue.push_back(QueuedRequest { request_fn, responder });
        let should_spawn = !guard.burst_running;
        if should_spawn {
            guard.burst_running = true;
        }
        drop(guard);

        if should_spawn {
            tokio::spawn(do_burst(bucket_key, Arc::clone(&bucket), self.client.clone()));
        }

        receiver
            .await
            .map_err(|_| RestError::Decode("rate limit coordinator dropped the request".into()))?
    }
}

/// Cooperatively drain `bucket`'s queue. On the very first run for this
/// bucket, dispatches exactly one request and returns immediately,
/// leaving the remainder for the next spawn (cold-start policy).
async fn do_burst(bucket_key: String, bucket: Arc<Mutex<BucketState>>, client: reqwest::Client) {
    let mut guard = bucket.lock().await;

    if !guard.made_first_request {
        guard.made_first_request = true;
        let item = guard.queue.pop_front();
        drop(guard);
        if let Some(item) = item {
            dispatch(bucket_key, Arc::clone(&bucket), client, item);
        }
        bucket.lock().await.burst_running = false;
        return;
    }

    if !guard.ready() {
        let mut headers_rx = guard.new_headers.subscribe();
        drop(guard);
        let _ = headers_rx.changed().await;
        guard = bucket.lock().await;
    }

    loop {
        if guard.queue.is_empty() {
            break;
        }
        tokio::task::yield_now().await;

        if guard.remaining.unwrap_or(1) <= 0 {
            let mut headers_rx = guard.new_headers.subscribe();
            drop(guard);
            let _ = headers_rx.changed().await;
            guard = bucket.lock().await;
            let sleep_for = guard.reset_after();
            drop(guard);
            tokio::time::sleep(Duration::from_secs_f64(sleep_for)).await;
            guard = bucket.lock().await;
        }

        if let Some(remaining) = guard.remaining.as_mut() {
            *remaining -= 1;
        }
        let Some(item) = guard.queue.pop_front() else {
            break;
        };
        drop(guard);
        dispatch(bucket_key.clone(), Arc::clone(&bucket), client.clone(), item);
        guard = bucket.lock().await;
    }

    guard.burst_running = false;
}

/// Fire one request as its own task (mirrors the source's
/// `loop.create_task(req())`, never awaited by the drain loop itself).
/// On HTTP 429 the request is re-enqueued at the tail and, if no burst
/// is currently running, a fresh one is spawned.
fn dispatch(bucket_key: String, bucket: Arc<Mutex<BucketState>>, client: reqwest::Client, item: QueuedRequest) {
    tokio::spawn(async move {
        match (item.request_fn)().await {
            Err(err) => {
                let _ = item.responder.send(Err(RestError::Transport(err)));
            }
            Ok(response) if response.status().as_u16() == 429 => {
                let body = response.text().await.unwrap_or_default();
                let parsed = serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
                let retry_after = RatelimitedResponse::unmarshal(&parsed).retry_after;

                let mut guard = bucket.lock().await;
                guard.remaining = Some(0);
                guard.reset_at = Some(now_unix_seconds() + retry_after / 1000.0);
                guard.signal_new_headers();
                guard.queue.push_back(item);
                let should_spawn = !guard.burst_running;
                if should_spawn {
                    guard.burst_running = true;
                }
                drop(guard);

                tracing::debug!(bucket = %bucket_key, retry_after, "429 received, requeuing");
                if should_spawn {
                    tokio::spawn(do_burst(bucket_key, bucket, client));
                }
            }
            Ok(response) => {
                update_from_headers(&bucket, &response).await;
                let _ = item.responder.send(Ok(response));
            }
        }
    });
}

async fn update_from_headers(bucket: &Arc<Mutex<BucketState>>, response: &Response) {
    let headers = response.headers();
    let limit = headers
        .get("X-Ratelimit-Limit")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let remaining = headers
        .get("X-Ratelimit-Remaining")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok());
    let reset = headers
        .get("X-Ratelimit-Reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok());

    let mut guard = bucket.lock().await;
    if let Some(limit) = limit {
        guard.limit = Some(limit);
    }
    if let Some(remaining) = remaining {
        guard.remaining = Some(remaining);
    }
    if let Some(reset) = reset {
        guard.reset_at = Some(reset);
    }
    guard.signal_new_headers();
}

/// Wrap a request-builder closure as a [`RequestFn`]: each call clones
/// `client` and re-builds a fresh `reqwest::Request`, so a 429 retry
/// actually re-sends rather than replaying an already-consumed body.
pub fn request_fn_from(
    client: reqwest::Client,
    build: impl Fn(&reqwest::Client) -> reqwest::RequestBuilder + Send + Sync + 'static,
) -> RequestFn {
    Arc::new(move || -> BoxFuture<Result<Response, reqwest::Error>> {
        let client = client.clone();
        let builder = build(&client);
        Box::pin(async move { builder.send().await })
    })
}
