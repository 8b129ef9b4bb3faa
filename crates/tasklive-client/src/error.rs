//! Client-side error types.

use thiserror::Error;

/// Errors surfaced by the stream transport and decoder.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Connect failed: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("JSON error: {0}")]
    Decode(#[from] serde_json::Error),
}
