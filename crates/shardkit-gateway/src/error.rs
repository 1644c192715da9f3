//! Error kinds for the gateway shard runtime, matching spec §7's
//! taxonomy. `Throttled` has no counterpart here — it belongs to the REST
//! rate limiter crate and is fully recovered there, never surfaced.

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The WebSocket upgrade handshake was rejected: `field` is what was
    /// checked (e.g. `"status code"`, `"connection"`, `"upgrade"`),
    /// `expected`/`got` are the values compared.
    #[error("bad upgrade response: {field} expected {expected:?}, got {got:?}")]
    BadUpgrade {
        field: &'static str,
        expected: String,
        got: String,
    },
    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    /// A heartbeat ack, or an `EventPusher::wait`, did not arrive in time.
    #[error("timed out waiting for a response")]
    Timeout,
    /// A frame's payload could not be parsed as a gateway message. The
    /// frame is dropped; the connection is not killed.
    #[error("failed to decode gateway payload: {0}")]
    Decode(String),
}

impl From<crate::pusher::PusherError> for GatewayError {
    fn from(_: crate::pusher::PusherError) -> Self {
        GatewayError::Timeout
    }
}
