//! Gateway payload envelope and opcode set, per spec §6 ("Gateway
//! payload") and `ShardOpcode` in `snakecord/connection.py`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `{op, s, t, d}` envelope every gateway message is wrapped in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPayload {
    pub op: u8,
    #[serde(default)]
    pub s: Option<i64>,
    #[serde(default)]
    pub t: Option<String>,
    #[serde(default)]
    pub d: Value,
}

/// Gateway opcodes this shard runtime recognises. Values match the
/// source's `ShardOpcode` `IntEnum` exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShardOpcode {
    Dispatch = 0,
    Heartbeat = 1,
    Identify = 2,
    PresenceUpdate = 3,
    VoiceStateUpdate = 4,
    Resume = 6,
    Reconnect = 7,
    RequestGuildMembers = 8,
    InvalidSession = 9,
    Hello = 10,
    HeartbeatAck = 11,
}

impl ShardOpcode {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}
