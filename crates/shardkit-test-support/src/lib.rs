//! Shared test doubles for the gateway and REST crates: a raw-TCP mock
//! gateway peer and a scriptable HTTP rate-limit server. Grounded on
//! `crates/rt-test-utils`.

pub mod mock_rate_limit_server;
pub mod mock_ws_peer;

pub use mock_rate_limit_server::{MockRateLimitServer, ScriptedResponse};
pub use mock_ws_peer::{MockWsConnection, MockWsPeer};
