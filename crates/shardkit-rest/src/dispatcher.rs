//! REST dispatcher (C5): thin endpoint declarations that compute a
//! bucket key, build a request closure, and submit it to the rate-limit
//! coordinator. Grounded on `lib/rest.py`'s `RestSession`.
//!
//! No retry, timeout, or circuit-breaker policy lives here — that is
//! either the rate-limit coordinator's job (429 recovery) or left to
//! the caller entirely (transport failures and timeouts surface as
//! [`RestError`]).

use crate::coordinator::{RateLimitCoordinator, request_fn_from};
use crate::error::RestError;
use crate::models::MessageCreateRequest;
use reqwest::Response;
use shardkit_model::{Described, Snowflake};

const DEFAULT_BASE_URL: &str = "https://discord.com/api/v7/";

/// A thin REST client: owns the shared `reqwest::Client`/bucket
/// registry and the bot token, and exposes one method per logical
/// endpoint.
pub struct RestClient {
    base_url: String,
    token: String,
    coordinator: RateLimitCoordinator,
}

impl RestClient {
    pub fn new(token: impl Into<String>) -> Self {
        RestClient {
            base_url: DEFAULT_BASE_URL.to_owned(),
            token: token.into(),
            coordinator: RateLimitCoordinator::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// `GET channels/{channel_id}`.
    pub async fn get_channel(&self, channel_id: Snowflake) -> Result<Response, RestError> {
        let path = format!("channels/{channel_id}");
        let bucket_key = bucket_key("GET", None, Some(channel_id), None);
        self.dispatch(reqwest::Method::GET, &path, &bucket_key, None).await
    }

    /// `DELETE channels/{channel_id}`.
    pub async fn delete_channel(&self, channel_id: Snowflake) -> Result<Response, RestError> {
        let path = format!("channels/{channel_id}");
        let bucket_key = bucket_key("DELETE", None, Some(channel_id), None);
        self.dispatch(reqwest::Method::DELETE, &path, &bucket_key, None).await
    }

    /// `GET channels/{channel_id}/messages/{message_id}`.
    pub async fn get_channel_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
    ) -> Result<Response, RestError> {
        let path = format!("channels/{channel_id}/messages/{message_id}");
        let bucket_key = bucket_key("GET", None, Some(channel_id), None);
        self.dispatch(reqwest::Method::GET, &path, &bucket_key, None).await
    }

    /// `POST channels/{channel_id}/messages`.
    pub async fn send_message(
        &self,
        channel_id: Snowflake,
        body: MessageCreateRequest,
    ) -> Result<Response, RestError> {
        let path = format!("channels/{channel_id}/messages");
        let bucket_key = bucket_key("POST", None, Some(channel_id), None);
        self.dispatch(reqwest::Method::POST, &path, &bucket_key, Some(body.marshal()))
            .await
    }

    async fn dispatch(
        &self,
        method: reqwest::Method,
        path: &str,
        bucket_key: &str,
        json_body: Option<serde_json::Value>,
    ) -> Result<Response, RestError> {
        let url = format!("{}{}", self.base_url, path);
        let auth = format!("Bot {}", self.token);

        let request_fn = request_fn_from(self.coordinator.http_client().clone(), move |client| {
            let mut builder = client
                .request(method.clone(), &url)
                .header("Authorization", &auth);
            if let Some(body) = &json_body {
                builder = builder.json(body);
            }
            builder
        });

        self.coordinator.submit(bucket_key.to_owned(), request_fn).await
    }
}

/// `"{METHOD}-{guild_id?}-{channel_id?}-{webhook_id?}"`, matching the
/// source's bucket-key formula exactly, collisions and all (see the
/// Open Questions in this crate family's design notes).
pub fn bucket_key(
    method: &str,
    guild_id: Option<Snowflake>,
    channel_id: Option<Snowflake>,
    webhook_id: Option<Snowflake>,
) -> String {
    format!(
        "{method}-{}-{}-{}",
        guild_id.map(|s| s.to_string()).unwrap_or_else(|| "None".into()),
        channel_id.map(|s| s.to_string()).unwrap_or_else(|| "None".into()),
        webhook_id.map(|s| s.to_string()).unwrap_or_else(|| "None".into()),
    )
}
