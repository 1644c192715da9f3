//! Record types that cross the REST wire, built on [`shardkit_model::Described`]
//! rather than `serde::Serialize`/`Deserialize`, per this family's field-
//! descriptor convention. Grounded on `lib/rest.py`'s `RatelimitedResponse`
//! and `MessageCreateRequest`.

use serde_json::Value;
use shardkit_model::{Described, FieldDescriptor};

/// The JSON body of an HTTP 429 response.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RatelimitedResponse {
    pub global_ratelimit: bool,
    pub retry_after: f64,
    pub message: Option<String>,
}

impl Described for RatelimitedResponse {
    fn own_descriptors() -> &'static [FieldDescriptor<Self>] {
        &[
            FieldDescriptor {
                key: "global",
                unmarshal: |t, v| v.as_bool().map(|b| t.global_ratelimit = b).is_some(),
                apply_default: |t| t.global_ratelimit = false,
                marshal: |t| Some(Value::Bool(t.global_ratelimit)),
                omit_empty: false,
            },
            FieldDescriptor {
                key: "retry_after",
                unmarshal: |t, v| v.as_f64().map(|f| t.retry_after = f).is_some(),
                apply_default: |t| t.retry_after = 0.0,
                marshal: |t| Value::from_f64(t.retry_after),
                omit_empty: false,
            },
            FieldDescriptor {
                key: "message",
                unmarshal: |t, v| {
                    t.message = v.as_str().map(str::to_owned);
                    t.message.is_some()
                },
                apply_default: |t| t.message = None,
                marshal: |t| t.message.clone().map(Value::String),
                omit_empty: true,
            },
        ]
    }
}

/// Body of a "create message" request.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MessageCreateRequest {
    pub content: Option<String>,
    pub nonce: Option<String>,
    pub tts: bool,
}

impl MessageCreateRequest {
    pub fn new(content: impl Into<String>) -> Self {
        MessageCreateRequest {
            content: Some(content.into()),
            nonce: None,
            tts: false,
        }
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn with_tts(mut self, tts: bool) -> Self {
        self.tts = tts;
        self
    }
}

impl Described for MessageCreateRequest {
    fn own_descriptors() -> &'static [FieldDescriptor<Self>] {
        &[
            FieldDescriptor {
                key: "content",
                unmarshal: |t, v| {
                    t.content = v.as_str().map(str::to_owned);
                    t.content.is_some()
                },
                apply_default: |t| t.content = None,
                marshal: |t| t.content.clone().map(Value::String),
                omit_empty: true,
            },
            FieldDescriptor {
                key: "nonce",
                unmarshal: |t, v| {
                    t.nonce = v.as_str().map(str::to_owned);
                    t.nonce.is_some()
                },
                apply_default: |t| t.nonce = None,
                marshal: |t| t.nonce.clone().map(Value::String),
                omit_empty: true,
            },
            FieldDescriptor {
                key: "tts",
                unmarshal: |t, v| v.as_bool().map(|b| t.tts = b).is_some(),
                apply_default: |t| t.tts = false,
                marshal: |t| Some(Value::Bool(t.tts)),
                omit_empty: false,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratelimited_response_unmarshals_retry_after_as_float_seconds() {
        let json: Value = serde_json::from_str(
            r#"{"global": false, "retry_after": 65.0, "message": "You are being rate limited."}"#,
        )
        .unwrap();
        let resp = RatelimitedResponse::unmarshal(&json);
        assert!(!resp.global_ratelimit);
        assert_eq!(resp.retry_after, 65.0);
        assert_eq!(resp.message.as_deref(), Some("You are being rate limited."));
    }

    #[test]
    fn ratelimited_response_defaults_retry_after_to_zero_on_missing_body() {
        let json: Value = serde_json::from_str("{}").unwrap();
        let resp = RatelimitedResponse::unmarshal(&json);
        assert_eq!(resp.retry_after, 0.0);
    }

    #[test]
    fn message_create_request_marshals_with_omit_empty_nonce() {
        let req = MessageCreateRequest::new("hello");
        let marshalled = req.marshal();
        assert_eq!(marshalled.get("content"), Some(&Value::String("hello".into())));
        assert!(marshalled.get("nonce").is_none());
        assert_eq!(marshalled.get("tts"), Some(&Value::Bool(false)));
    }
}
