// basic-bot: connects one gateway shard, logs dispatched events, and
// sends a greeting through the REST client once a channel ID is
// configured. Demonstrates end-to-end usage of the `shardkit` facade.

use shardkit::gateway::GatewayEvent;
use shardkit::model::Snowflake;
use shardkit::rest::MessageCreateRequest;
use shardkit::{Client, ClientConfig};
use tracing::info;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "basic-bot starting");

    let cfg = match config::load_config() {
        Ok(cfg) => {
            info!(gateway = %cfg.gateway_endpoint, shard = cfg.shard_id, "config loaded");
            cfg
        }
        Err(e) => {
            eprintln!("FATAL: failed to load config: {e}");
            std::process::exit(1);
        }
    };

    let runtime = tokio::runtime::Runtime::new().expect("failed to start tokio runtime");
    runtime.block_on(run(cfg));
}

async fn run(cfg: config::BotConfig) {
    let mut client_config = ClientConfig::new(cfg.token.clone(), cfg.gateway_endpoint.clone())
        .with_shard(cfg.shard_id, cfg.shard_count);
    if let Some(base_url) = &cfg.rest_base_url {
        client_config = client_config.with_rest_base_url(base_url.clone());
    }
    let client = Client::new(client_config);

    let mut shard = match client.connect_shard().await {
        Ok(shard) => shard,
        Err(e) => {
            eprintln!("FATAL: failed to connect gateway shard: {e}");
            std::process::exit(1);
        }
    };

    let events = shard.events();
    events.register_listener(shardkit::gateway::EVENT_DISPATCH, |event| {
        if let GatewayEvent::Dispatch { event_name, sequence, .. } = event {
            info!(event = ?event_name, sequence = ?sequence, "dispatch received");
        }
    });

    if let Some(channel_id) = cfg.greeting_channel_id {
        if let Ok(channel) = Snowflake::new(channel_id) {
            let rest = client.rest();
            let message = MessageCreateRequest::new("basic-bot is online");
            if let Err(e) = rest.send_message(channel, message).await {
                tracing::warn!(error = %e, "failed to send startup greeting");
            }
        }
    }

    if let Err(e) = shard.run().await {
        eprintln!("gateway shard exited: {e}");
        std::process::exit(1);
    }
}

mod config {
    //! Bot configuration loading.
    //!
    //! TOML is the sole config source; no environment variable overrides.
    //! Default config path: `/etc/shardkit/basic-bot.toml`.

    use serde::Deserialize;
    use std::path::Path;

    #[derive(Debug, Clone)]
    pub struct BotConfig {
        pub token: String,
        pub gateway_endpoint: String,
        pub rest_base_url: Option<String>,
        pub shard_id: u32,
        pub shard_count: u32,
        pub greeting_channel_id: Option<u64>,
    }

    #[derive(Debug, Deserialize)]
    struct RawConfig {
        token_file: Option<String>,
        gateway_endpoint: Option<String>,
        rest_base_url: Option<String>,
        shard_id: Option<u32>,
        shard_count: Option<u32>,
        greeting_channel_id: Option<u64>,
    }

    pub fn load_config() -> Result<BotConfig, ConfigError> {
        load_config_from_path(Path::new("/etc/shardkit/basic-bot.toml"))
    }

    pub fn load_config_from_path(path: &Path) -> Result<BotConfig, ConfigError> {
        let toml_str = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("reading config file '{}': {e}", path.display())))?;
        load_config_from_str(&toml_str)
    }

    pub fn load_config_from_str(toml_str: &str) -> Result<BotConfig, ConfigError> {
        let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let token_file = raw
            .token_file
            .ok_or_else(|| ConfigError::MissingField("token_file".to_owned()))?;
        let token = read_token_file(&token_file)?;

        let gateway_endpoint = raw
            .gateway_endpoint
            .ok_or_else(|| ConfigError::MissingField("gateway_endpoint".to_owned()))?;

        Ok(BotConfig {
            token,
            gateway_endpoint,
            rest_base_url: raw.rest_base_url,
            shard_id: raw.shard_id.unwrap_or(0),
            shard_count: raw.shard_count.unwrap_or(1),
            greeting_channel_id: raw.greeting_channel_id,
        })
    }

    fn read_token_file(path: &str) -> Result<String, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(format!("reading token file '{path}': {e}")))?;
        Ok(content.trim().to_owned())
    }

    #[derive(Debug)]
    pub enum ConfigError {
        Io(String),
        Parse(String),
        MissingField(String),
    }

    impl std::fmt::Display for ConfigError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                ConfigError::Io(s) => write!(f, "IO error: {s}"),
                ConfigError::Parse(s) => write!(f, "parse error: {s}"),
                ConfigError::MissingField(s) => write!(f, "missing required field: {s}"),
            }
        }
    }

    impl std::error::Error for ConfigError {}

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn missing_token_file_is_rejected() {
            let err = load_config_from_str("gateway_endpoint = \"wss://gateway.example.com/\"").unwrap_err();
            assert!(matches!(err, ConfigError::MissingField(field) if field == "token_file"));
        }

        #[test]
        fn defaults_apply_when_shard_fields_omitted() {
            let dir = std::env::temp_dir().join("shardkit-basic-bot-test-token");
            std::fs::write(&dir, "test-token\n").unwrap();
            let toml = format!(
                "token_file = \"{}\"\ngateway_endpoint = \"wss://gateway.example.com/\"",
                dir.display()
            );
            let cfg = load_config_from_str(&toml).unwrap();
            assert_eq!(cfg.shard_id, 0);
            assert_eq!(cfg.shard_count, 1);
            assert_eq!(cfg.token, "test-token");
            std::fs::remove_file(&dir).unwrap();
        }
    }
}
