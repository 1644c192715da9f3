//! Heartbeat loop with liveness detection.
//!
//! Grounded on `snakecord/connection.py`'s `HeartbeatHandler`: a single
//! repeating delayed task that sends one `HEARTBEAT` frame, waits for the
//! matching ack with a fixed timeout, and only reschedules itself once
//! the ack arrives. A missed ack stops the handler and signals
//! `connection_stale` upward — it never reschedules after that.

use crate::frame::{FrameOptions, Opcode, create_frame};
use crate::payload::ShardOpcode;
use crate::pusher::EventPusher;
use crate::{EVENT_CONNECTION_STALE, EVENT_HEARTBEAT_ACK, GatewayEvent};
use std::sync::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncWrite, AsyncWriteExt};

struct HeartbeatInner {
    heartbeat_interval: Duration,
    heartbeats_sent: u64,
    heartbeats_acked: u64,
    last_sent: Option<Instant>,
    last_acked: Option<Instant>,
    stopped: bool,
    current_handle: Option<tokio::task::JoinHandle<()>>,
}

/// Drives the heartbeat loop for one shard. Owns a clone of the shard's
/// write half so it can send `HEARTBEAT` frames independently of the
/// receive loop.
pub struct HeartbeatHandler<W> {
    inner: Mutex<HeartbeatInner>,
    writer: Arc<tokio::sync::Mutex<W>>,
    pusher: Arc<EventPusher<GatewayEvent>>,
    ack_timeout: Duration,
}

impl<W> HeartbeatHandler<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(
        writer: Arc<tokio::sync::Mutex<W>>,
        pusher: Arc<EventPusher<GatewayEvent>>,
        ack_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(HeartbeatHandler {
            inner: Mutex::new(HeartbeatInner {
                heartbeat_interval: Duration::ZERO,
                heartbeats_sent: 0,
                heartbeats_acked: 0,
                last_sent: None,
                last_acked: None,
                stopped: false,
                current_handle: None,
            }),
            writer,
            pusher,
            ack_timeout,
        })
    }

    /// Start the loop: record `interval` and send the first heartbeat
    /// immediately, matching `HeartbeatHandler.start`.
    pub fn start(self: &Arc<Self>, interval: Duration) {
        self.inner.lock().expect("heartbeat lock poisoned").heartbeat_interval = interval;
        let handler = Arc::clone(self);
        tokio::spawn(handler.send_heartbeat());
    }

    /// Stop the loop and cancel any pending timer. Idempotent.
    pub fn stop(&self) {
        let mut inner = self.inner.lock().expect("heartbeat lock poisoned");
        inner.stopped = true;
        if let Some(handle) = inner.current_handle.take() {
            handle.abort();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.lock().expect("heartbeat lock poisoned").stopped
    }

    pub fn heartbeats_sent(&self) -> u64 {
        self.inner.lock().expect("heartbeat lock poisoned").heartbeats_sent
    }

    pub fn heartbeats_acked(&self) -> u64 {
        self.inner.lock().expect("heartbeat lock poisoned").heartbeats_acked
    }

    /// `last_acked - last_sent`, once both have a value.
    pub fn latency(&self) -> Option<Duration> {
        let inner = self.inner.lock().expect("heartbeat lock poisoned");
        match (inner.last_sent, inner.last_acked) {
            (Some(sent), Some(acked)) => Some(acked.saturating_duration_since(sent)),
            _ => None,
        }
    }

    async fn send_heartbeat(self: Arc<Self>) {
        if self.inner.lock().expect("heartbeat lock poisoned").stopped {
            return;
        }

        {
            let mut inner = self.inner.lock().expect("heartbeat lock poisoned");
            inner.last_sent = Some(Instant::now());
            inner.heartbeats_sent += 1;
        }

        let payload = serde_json::json!({ "op": ShardOpcode::Heartbeat.as_u8(), "d": null });
        let frame = create_frame(
            payload.to_string().as_bytes(),
            FrameOptions {
                opcode: Opcode::Text,
                masked: true,
                ..FrameOptions::default()
            },
        );

        let write_ok = {
            let mut writer = self.writer.lock().await;
            writer.write_all(&frame).await.is_ok()
        };
        if !write_ok {
            self.inner.lock().expect("heartbeat lock poisoned").stopped = true;
            return;
        }

        tracing::debug!(sent = self.heartbeats_sent(), "heartbeat sent, awaiting ack");

        match self.pusher.wait(EVENT_HEARTBEAT_ACK, self.ack_timeout).await {
            Ok(_) => {
                let interval = {
                    let mut inner = self.inner.lock().expect("heartbeat lock poisoned");
                    inner.last_acked = Some(Instant::now());
                    inner.heartbeats_acked += 1;
                    inner.heartbeat_interval
                };
                let handler = Arc::clone(&self);
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(interval).await;
                    tokio::spawn(Arc::clone(&handler).send_heartbeat());
                });
                self.inner.lock().expect("heartbeat lock poisoned").current_handle = Some(handle);
            }
            Err(_) => {
                tracing::warn!("heartbeat ack timed out, marking connection stale");
                let mut inner = self.inner.lock().expect("heartbeat lock poisoned");
                inner.stopped = true;
                if let Some(handle) = inner.current_handle.take() {
                    handle.abort();
                }
                drop(inner);
                self.pusher.push_event(EVENT_CONNECTION_STALE, GatewayEvent::ConnectionStale);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receive::FrameDecoder;
    use std::time::Duration;
    use tokio::io::DuplexStream;

    fn split_pair() -> (Arc<tokio::sync::Mutex<DuplexStream>>, DuplexStream) {
        let (a, b) = tokio::io::duplex(4096);
        (Arc::new(tokio::sync::Mutex::new(a)), b)
    }

    /// P7: at most one heartbeat in flight; P6: acked never exceeds sent.
    #[tokio::test(start_paused = true)]
    async fn heartbeat_reschedules_only_after_ack_and_stays_monotonic() {
        let (writer, mut reader) = split_pair();
        let pusher: Arc<EventPusher<GatewayEvent>> = Arc::new(EventPusher::new());
        let handler = HeartbeatHandler::new(writer, Arc::clone(&pusher), Duration::from_secs(10));

        handler.start(Duration::from_millis(100));

        // Read the first heartbeat frame off the wire.
        let mut decoder = FrameDecoder::new();
        let mut buf = [0u8; 256];
        let mut frames = Vec::new();
        while frames.is_empty() {
            let n = tokio::io::AsyncReadExt::read(&mut reader, &mut buf).await.unwrap();
            frames.extend(decoder.feed(&buf[..n]));
        }
        assert_eq!(frames.len(), 1);

        assert_eq!(handler.heartbeats_sent(), 1);
        assert_eq!(handler.heartbeats_acked(), 0);

        pusher.push_event(EVENT_HEARTBEAT_ACK, GatewayEvent::HeartbeatAck);
        tokio::task::yield_now().await;

        assert_eq!(handler.heartbeats_acked(), 1);
        assert!(handler.heartbeats_acked() <= handler.heartbeats_sent());
    }

    /// Scenario 5: after HELLO with heartbeat_interval=100 (ms), never
    /// ack. After the ack timeout the handler stops and emits
    /// `connection_stale`, and sends no further heartbeats.
    #[tokio::test(start_paused = true)]
    async fn heartbeat_timeout_marks_stale_and_stops() {
        let (writer, _reader) = split_pair();
        let pusher: Arc<EventPusher<GatewayEvent>> = Arc::new(EventPusher::new());
        let handler = HeartbeatHandler::new(writer, Arc::clone(&pusher), Duration::from_millis(50));

        let stale = {
            let pusher = Arc::clone(&pusher);
            tokio::spawn(async move { pusher.wait(EVENT_CONNECTION_STALE, Duration::from_secs(5)).await })
        };

        handler.start(Duration::from_millis(100));
        let event = stale.await.unwrap().unwrap();
        assert!(matches!(event, GatewayEvent::ConnectionStale));
        assert!(handler.is_stopped());
        assert_eq!(handler.heartbeats_acked(), 0);
    }
}
