//! Per-bucket rate-limit state, grounded on `lib/rest.py`'s `Ratelimiter`.
//!
//! A bucket tracks the server-advertised `limit`/`remaining`/`reset_at`
//! triple, a FIFO queue of pending requests, and whether a burst task is
//! currently draining that queue. `new_headers` stands in for the
//! source's `asyncio.Event`: every waiter is woken whenever fresh
//! rate-limit headers (or a 429 recovery) update the bucket. A `watch`
//! channel is used rather than `Notify` so a waiter that subscribes
//! after the update already landed still observes it — `Notify` would
//! silently drop that wakeup.

use crate::error::RestError;
use reqwest::Response;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{oneshot, watch};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
/// A retryable HTTP call. `Fn`, not `FnOnce`, because a 429 re-submits
/// the same request after updating bucket state.
pub type RequestFn = Arc<dyn Fn() -> BoxFuture<Result<Response, reqwest::Error>> + Send + Sync>;

pub(crate) struct QueuedRequest {
    pub request_fn: RequestFn,
    pub responder: oneshot::Sender<Result<Response, RestError>>,
}

/// One server-scoped rate-limit window's mutable state.
pub(crate) struct BucketState {
    pub limit: Option<u64>,
    pub remaining: Option<i64>,
    /// Unix seconds at which `remaining` resets to `limit`.
    pub reset_at: Option<f64>,
    pub queue: VecDeque<QueuedRequest>,
    pub made_first_request: bool,
    pub burst_running: bool,
    /// Incremented on every header update or 429 recovery; a waiter
    /// compares against the value it last observed.
    pub new_headers: Arc<watch::Sender<u64>>,
}

impl BucketState {
    pub fn new() -> Self {
        BucketState {
            limit: None,
            remaining: None,
            reset_at: None,
            queue: VecDeque::new(),
            made_first_request: false,
            burst_running: false,
            new_headers: Arc::new(watch::Sender::new(0)),
        }
    }

    /// Bump the headers generation, waking any waiter regardless of
    /// whether it subscribed before or after this call.
    pub fn signal_new_headers(&self) {
        self.new_headers.send_modify(|generation| *generation += 1);
    }

    /// All three of `limit`, `remaining`, `reset_at` are known.
    pub fn ready(&self) -> bool {
        self.limit.is_some() && self.remaining.is_some() && self.reset_at.is_some()
    }

    /// Seconds remaining until `reset_at`, clamped to zero.
    pub fn reset_after(&self) -> f64 {
        let Some(reset_at) = self.reset_at else {
            return 0.0;
        };
        (reset_at - now_unix_seconds()).max(0.0)
    }
}

pub fn now_unix_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
