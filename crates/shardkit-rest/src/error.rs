//! Error kinds for the REST client, matching spec §7's taxonomy.
//! `Throttled` (HTTP 429) never reaches a caller — it is fully recovered
//! inside the rate-limit coordinator.

#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to decode response body: {0}")]
    Decode(String),
    #[error("invalid request value: {0}")]
    BadValue(String),
}

impl From<shardkit_model::ModelError> for RestError {
    fn from(err: shardkit_model::ModelError) -> Self {
        match err {
            shardkit_model::ModelError::BadValue(message) => RestError::BadValue(message),
        }
    }
}
