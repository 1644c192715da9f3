//! Per-bucket REST rate-limit coordinator (C4) and a thin dispatcher
//! (C5) built on top of it, grounded on `lib/rest.py`'s
//! `Ratelimiter`/`RestSession`.

pub mod bucket;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod models;

pub use coordinator::RateLimitCoordinator;
pub use dispatcher::{RestClient, bucket_key};
pub use error::RestError;
pub use models::{MessageCreateRequest, RatelimitedResponse};
