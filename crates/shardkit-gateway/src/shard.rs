//! The shard runtime: connects a single gateway shard, performs the
//! WebSocket upgrade handshake by hand, and drives the receive loop that
//! turns decoded frames into [`GatewayEvent`]s.
//!
//! Grounded on `snakecord/connection.py`'s `BaseConnection`/`Shard`: the
//! handshake is a raw HTTP/1.0-style `GET` written over the same
//! transport the frames travel on, read back byte-by-byte until the
//! `\r\n\r\n` terminator, then parsed by splitting on `:` per header
//! line — re-implemented here over `AsyncRead + AsyncWrite` instead of
//! an `asyncio.Protocol`.

use crate::error::GatewayError;
use crate::frame::{FrameOptions, Opcode, create_frame};
use crate::heartbeat::HeartbeatHandler;
use crate::payload::{GatewayPayload, ShardOpcode};
use crate::pusher::EventPusher;
use crate::receive::FrameDecoder;
use crate::{EVENT_DISPATCH, EVENT_HEARTBEAT_ACK, EVENT_WS_FRAME_RECEIVE, EVENT_WS_RECEIVE, GatewayEvent};
use base64::Engine;
use rand::RngCore;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Where a shard's lifecycle currently sits. Mirrors the implicit state
/// the source tracks via `have_headers`/`heartbeat_handler.stopped`
/// rather than an explicit enum, made explicit here for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardState {
    Connecting,
    AwaitingHello,
    Identified,
    Stale,
}

/// Everything a shard needs to identify itself and pace its heartbeats.
#[derive(Debug, Clone)]
pub struct ShardConfig {
    /// `wss://gateway.example.com/?v=10&encoding=json` — scheme is not
    /// inspected; callers needing TLS wrap the `TcpStream` themselves
    /// and hand `Shard::run` the wrapped stream directly.
    pub endpoint: String,
    pub token: String,
    pub shard_id: u32,
    pub shard_count: u32,
    /// How long to wait for a `HEARTBEAT_ACK` before the connection is
    /// considered stale. The source hardcodes 10 seconds.
    pub heartbeat_ack_timeout: Duration,
}

impl ShardConfig {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        ShardConfig {
            endpoint: endpoint.into(),
            token: token.into(),
            shard_id: 0,
            shard_count: 1,
            heartbeat_ack_timeout: Duration::from_secs(10),
        }
    }
}

/// A connected gateway shard, generic over its transport so the
/// handshake/frame logic can run over a plain `TcpStream` in production
/// or an in-memory duplex stream in tests.
pub struct Shard<T> {
    config: ShardConfig,
    state: ShardState,
    writer: Arc<tokio::sync::Mutex<tokio::io::WriteHalf<T>>>,
    reader: tokio::io::ReadHalf<T>,
    decoder: FrameDecoder,
    pusher: Arc<EventPusher<GatewayEvent>>,
    heartbeat: Option<Arc<HeartbeatHandler<tokio::io::WriteHalf<T>>>>,
}

impl Shard<TcpStream> {
    /// Resolve `config.endpoint`'s host/port, open a TCP connection, and
    /// perform the WebSocket upgrade handshake. Leaves the shard in
    /// [`ShardState::AwaitingHello`], ready to be driven by [`Shard::run`].
    pub async fn connect(config: ShardConfig) -> Result<Self, GatewayError> {
        let parsed = url::Url::parse(&config.endpoint)
            .map_err(|e| GatewayError::Decode(format!("invalid gateway endpoint: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| GatewayError::Decode("gateway endpoint has no host".into()))?
            .to_owned();
        let port = parsed.port_or_known_default().unwrap_or(443);
        let path = if parsed.query().is_some() {
            format!("{}?{}", parsed.path(), parsed.query().unwrap())
        } else {
            parsed.path().to_owned()
        };

        let stream = TcpStream::connect((host.as_str(), port)).await?;
        Shard::handshake(stream, host, path, config).await
    }
}

impl<T> Shard<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Run the upgrade handshake over an already-established transport,
    /// then wrap it as a shard. Exposed separately from [`Shard::connect`]
    /// so tests can hand in an in-memory duplex stream.
    pub async fn handshake(
        mut stream: T,
        host: String,
        path: String,
        config: ShardConfig,
    ) -> Result<Self, GatewayError> {
        let mut key_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut key_bytes);
        let sec_key = base64::engine::general_purpose::STANDARD.encode(key_bytes);

        let path = if path.is_empty() { "/".to_owned() } else { path };
        let request = format!(
            "GET {path} HTTP/1.0\r\n\
             Host: {host}\r\n\
             Connection: Upgrade\r\n\
             Upgrade: websocket\r\n\
             Sec-WebSocket-Key: {sec_key}\r\n\
             Sec-WebSocket-Version: 13\r\n\
             \r\n"
        );
        stream.write_all(request.as_bytes()).await?;

        let (header_text, leftover) = read_headers(&mut stream).await?;
        parse_upgrade_response(&header_text)?;

        let mut decoder = FrameDecoder::new();
        let pusher = Arc::new(EventPusher::new());
        let initial_frames = decoder.feed(&leftover);

        let (reader, writer) = tokio::io::split(stream);
        let writer = Arc::new(tokio::sync::Mutex::new(writer));

        let mut shard = Shard {
            config,
            state: ShardState::AwaitingHello,
            writer,
            reader,
            decoder,
            pusher,
            heartbeat: None,
        };

        for frame in initial_frames {
            shard.dispatch_frame(frame).await?;
        }

        Ok(shard)
    }

    pub fn state(&self) -> ShardState {
        self.state
    }

    pub fn events(&self) -> Arc<EventPusher<GatewayEvent>> {
        Arc::clone(&self.pusher)
    }

    /// Drive the receive loop until the transport closes or a fatal
    /// transport error occurs. Malformed individual payloads are logged
    /// and skipped; they do not end the loop (spec §7: decode errors
    /// drop the frame, not the connection).
    pub async fn run(&mut self) -> Result<(), GatewayError> {
        let mut buf = [0u8; 4096];
        loop {
            let n = self.reader.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            let frames = self.decoder.feed(&buf[..n]);
            for frame in frames {
                match self.dispatch_frame(frame).await {
                    Ok(()) => {}
                    Err(GatewayError::Decode(reason)) => {
                        tracing::warn!(reason = %reason, "dropping malformed gateway payload");
                    }
                    Err(err) => return Err(err),
                }
            }
        }
    }

    async fn dispatch_frame(&mut self, frame: crate::frame::Frame) -> Result<(), GatewayError> {
        match frame.opcode() {
            Some(Opcode::Text) | Some(Opcode::Binary) => {
                self.pusher.push_event(
                    EVENT_WS_FRAME_RECEIVE,
                    GatewayEvent::FrameReceive {
                        opcode: frame.opcode().expect("matched above"),
                        payload: frame.payload.clone(),
                    },
                );
                let payload: GatewayPayload = serde_json::from_slice(&frame.payload)
                    .map_err(|e| GatewayError::Decode(e.to_string()))?;
                self.handle_payload(payload).await
            }
            Some(Opcode::Ping) => {
                self.send_frame(&frame.payload, Opcode::Pong).await
            }
            _ => Ok(()),
        }
    }

    async fn handle_payload(&mut self, payload: GatewayPayload) -> Result<(), GatewayError> {
        self.pusher.push_event(EVENT_WS_RECEIVE, GatewayEvent::WsReceive { payload: payload.clone() });
        match payload.op {
            op if op == ShardOpcode::Hello.as_u8() => {
                let interval_ms = payload
                    .d
                    .get("heartbeat_interval")
                    .and_then(serde_json::Value::as_u64)
                    .unwrap_or(41_250);
                self.send_identify().await?;

                let writer = Arc::clone(&self.writer);
                let pusher = Arc::clone(&self.pusher);
                let handler = HeartbeatHandler::new(writer, pusher, self.config.heartbeat_ack_timeout);
                handler.start(Duration::from_millis(interval_ms));
                self.heartbeat = Some(handler);
                self.state = ShardState::Identified;
            }
            op if op == ShardOpcode::HeartbeatAck.as_u8() => {
                self.pusher.push_event(EVENT_HEARTBEAT_ACK, GatewayEvent::HeartbeatAck);
            }
            op if op == ShardOpcode::Dispatch.as_u8() => {
                self.pusher.push_event(
                    EVENT_DISPATCH,
                    GatewayEvent::Dispatch {
                        event_name: payload.t,
                        sequence: payload.s,
                        data: payload.d,
                    },
                );
            }
            _ => {}
        }
        Ok(())
    }

    async fn send_identify(&self) -> Result<(), GatewayError> {
        let mut data = serde_json::json!({
            "token": self.config.token,
            "properties": {
                "$os": std::env::consts::OS,
                "$browser": "shardkit",
                "$device": "shardkit",
            },
        });
        if self.config.shard_count > 1 {
            data["shard"] = serde_json::json!([self.config.shard_id, self.config.shard_count]);
        }
        let payload = serde_json::json!({ "op": ShardOpcode::Identify.as_u8(), "d": data });
        self.send_json(&payload).await
    }

    async fn send_json(&self, value: &serde_json::Value) -> Result<(), GatewayError> {
        self.send_frame(value.to_string().as_bytes(), Opcode::Text).await
    }

    async fn send_frame(&self, payload: &[u8], opcode: Opcode) -> Result<(), GatewayError> {
        let frame = create_frame(payload, FrameOptions { opcode, masked: true, ..FrameOptions::default() });
        let mut writer = self.writer.lock().await;
        writer.write_all(&frame).await?;
        Ok(())
    }
}

/// Accumulate bytes until `\r\n\r\n`, returning the header block (as
/// text, for splitting) and any bytes read past it — those belong to
/// the frame stream and must be fed to the decoder, not discarded.
async fn read_headers<T: AsyncRead + Unpin>(stream: &mut T) -> Result<(String, Vec<u8>), GatewayError> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 256];
    loop {
        if let Some(index) = find_header_terminator(&buf) {
            let header_text = String::from_utf8_lossy(&buf[..index]).into_owned();
            let leftover = buf[index + 4..].to_vec();
            return Ok((header_text, leftover));
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(GatewayError::Transport(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed during handshake",
            )));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn find_header_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Validate the handshake response: status 101, `Connection: upgrade`,
/// `Upgrade: websocket`, matching header by header in the same order
/// the source checks them.
fn parse_upgrade_response(header_text: &str) -> Result<(), GatewayError> {
    let mut lines = header_text.split("\r\n").filter(|l| !l.is_empty());
    let status_line = lines
        .next()
        .ok_or_else(|| GatewayError::BadUpgrade { field: "status line", expected: "present".into(), got: "missing".into() })?;
    let status_code = status_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| GatewayError::BadUpgrade { field: "status code", expected: "101".into(), got: status_line.into() })?;
    if status_code != "101" {
        return Err(GatewayError::BadUpgrade {
            field: "status code",
            expected: "101".into(),
            got: status_code.into(),
        });
    }

    let mut connection_header = None;
    let mut upgrade_header = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "connection" => connection_header = Some(value.trim().to_ascii_lowercase()),
                "upgrade" => upgrade_header = Some(value.trim().to_ascii_lowercase()),
                _ => {}
            }
        }
    }

    match connection_header.as_deref() {
        Some("upgrade") => {}
        other => {
            return Err(GatewayError::BadUpgrade {
                field: "connection",
                expected: "upgrade".into(),
                got: other.unwrap_or("<missing>").into(),
            });
        }
    }
    match upgrade_header.as_deref() {
        Some("websocket") => {}
        other => {
            return Err(GatewayError::BadUpgrade {
                field: "upgrade",
                expected: "websocket".into(),
                got: other.unwrap_or("<missing>").into(),
            });
        }
    }

    Ok(())
}
