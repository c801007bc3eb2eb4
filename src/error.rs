//! Library error types.
//!
//! Nothing on the per-tick path returns these: they only surface where a
//! caller can sensibly drop the input (a bad wire message, a bad config
//! file) and carry on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message has no string `type` field")]
    MissingType,

    #[error("unknown message type `{0}`")]
    UnknownType(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load client config: {0}")]
    Load(#[from] ::config::ConfigError),
}
