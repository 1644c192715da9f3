//! Hand-rolled WebSocket gateway shard runtime: RFC 6455 framing, the
//! upgrade handshake, heartbeat liveness, and opcode dispatch, grounded
//! on `snakecord/connection.py`'s `BaseConnection`/`Shard`/
//! `HeartbeatHandler` trio.

pub mod error;
pub mod frame;
pub mod heartbeat;
pub mod payload;
pub mod pusher;
pub mod receive;
pub mod shard;

pub use error::GatewayError;
pub use frame::{Frame, FrameOptions, Opcode, create_frame};
pub use heartbeat::HeartbeatHandler;
pub use payload::{GatewayPayload, ShardOpcode};
pub use pusher::{EventPusher, PusherError};
pub use receive::FrameDecoder;
pub use shard::{Shard, ShardConfig, ShardState};

/// Emitted once a missed heartbeat ack crosses the configured timeout.
pub const EVENT_CONNECTION_STALE: &str = "connection_stale";
/// Emitted for every raw decoded frame, before any JSON parsing.
pub const EVENT_WS_FRAME_RECEIVE: &str = "ws_frame_receive";
/// Emitted once a text frame has been parsed into a [`GatewayPayload`].
pub const EVENT_WS_RECEIVE: &str = "ws_receive";
/// Emitted when `HEARTBEAT_ACK` arrives; the heartbeat handler awaits
/// this to decide whether the connection is still alive.
pub const EVENT_HEARTBEAT_ACK: &str = "heartbeat_ack";
/// Emitted for every `DISPATCH` payload, carrying the event name so a
/// caller can route it onward (e.g. into a higher-level client cache).
pub const EVENT_DISPATCH: &str = "dispatch";

/// The events a [`Shard`] pushes through its [`EventPusher`]. Kept
/// separate from [`GatewayPayload`] so callers never have to parse raw
/// wire JSON themselves.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    ConnectionStale,
    /// A raw TEXT/BINARY frame, pushed before its payload is parsed.
    FrameReceive { opcode: frame::Opcode, payload: Vec<u8> },
    /// A frame's payload, once parsed into a [`GatewayPayload`] envelope
    /// but before its opcode is dispatched.
    WsReceive { payload: GatewayPayload },
    HeartbeatAck,
    Dispatch {
        event_name: Option<String>,
        sequence: Option<i64>,
        data: serde_json::Value,
    },
}
