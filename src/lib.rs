//! Root facade wiring the REST rate-limit coordinator (C4/C5) to the
//! gateway shard runtime (C6/C7) behind one `Client`.
//!
//! This crate does not initialize logging itself — callers own their
//! own `tracing` subscriber, same as `services/forwarder`'s `main.rs`
//! initializes its own rather than a library doing it for them.

pub use shardkit_gateway as gateway;
pub use shardkit_model as model;
pub use shardkit_rest as rest;

use gateway::{GatewayError, Shard, ShardConfig};
use rest::RestClient;
use tokio::net::TcpStream;

/// Everything needed to stand up both halves of a client: the REST
/// base URL/token pair for C4/C5, and the gateway endpoint/shard
/// identity for C6/C7.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub token: String,
    pub rest_base_url: Option<String>,
    pub gateway_endpoint: String,
    pub shard_id: u32,
    pub shard_count: u32,
}

impl ClientConfig {
    pub fn new(token: impl Into<String>, gateway_endpoint: impl Into<String>) -> Self {
        ClientConfig {
            token: token.into(),
            rest_base_url: None,
            gateway_endpoint: gateway_endpoint.into(),
            shard_id: 0,
            shard_count: 1,
        }
    }

    pub fn with_rest_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.rest_base_url = Some(base_url.into());
        self
    }

    pub fn with_shard(mut self, shard_id: u32, shard_count: u32) -> Self {
        self.shard_id = shard_id;
        self.shard_count = shard_count;
        self
    }
}

/// A REST client plus the means to connect gateway shards, sharing one
/// token. The two subsystems run independently once connected — this
/// struct is only the wiring point, not a combined event loop.
pub struct Client {
    config: ClientConfig,
    rest: RestClient,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        let mut rest = RestClient::new(config.token.clone());
        if let Some(base_url) = &config.rest_base_url {
            rest = rest.with_base_url(base_url.clone());
        }
        Client { config, rest }
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// Connect one gateway shard per this client's configured
    /// `shard_id`/`shard_count`, performing the upgrade handshake and
    /// leaving it ready to be driven by [`Shard::run`].
    pub async fn connect_shard(&self) -> Result<Shard<TcpStream>, GatewayError> {
        let mut shard_config = ShardConfig::new(self.config.gateway_endpoint.clone(), self.config.token.clone());
        shard_config.shard_id = self.config.shard_id;
        shard_config.shard_count = self.config.shard_count;
        Shard::connect(shard_config).await
    }
}
