//! Stream transport abstraction and the SSE implementation.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tracing::warn;

use tasklive_core::event::Event;
use tasklive_core::USER_HEADER;

use crate::error::ClientError;

/// Stream of decoded events from one connection attempt.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Event, ClientError>> + Send>>;

/// One way of opening an event stream to the server.
///
/// Abstracted so the reconnect controller can be driven by scripted
/// streams in tests instead of a live socket.
#[async_trait]
pub trait StreamTransport: Send + Sync + 'static {
    /// Open a new stream. `Ok` means the server accepted the request;
    /// events then arrive until the stream ends or errors.
    async fn connect(&self) -> Result<EventStream, ClientError>;
}

/// SSE over HTTP.
pub struct SseTransport {
    client: reqwest::Client,
    url: String,
    user_id: String,
}

impl SseTransport {
    /// Point the transport at a server's stream endpoint.
    ///
    /// No overall request timeout is set: the stream is supposed to stay
    /// open indefinitely. Stalls are detected by the controller through
    /// missing heartbeats ending the read, not here.
    pub fn new(base_url: &str, user_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            url: format!("{}/api/stream", base_url.trim_end_matches('/')),
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl StreamTransport for SseTransport {
    async fn connect(&self) -> Result<EventStream, ClientError> {
        let response = self
            .client
            .get(&self.url)
            .header(USER_HEADER, &self.user_id)
            .send()
            .await
            .map_err(ClientError::Connect)?
            .error_for_status()
            .map_err(ClientError::Connect)?;

        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::new();
            let mut body = response.bytes_stream();
            while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(bytes) => {
                        for event in decoder.push(&bytes) {
                            yield Ok(event);
                        }
                    }
                    Err(e) => {
                        yield Err(ClientError::Stream(e.to_string()));
                        break;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

/// Incremental decoder for `data:`-framed, blank-line-delimited records.
pub struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    /// Feed raw bytes, returning every event completed by this chunk.
    ///
    /// Undecodable records are skipped rather than failing the stream:
    /// one malformed payload must not cost the connection.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Event> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut events = Vec::new();
        while let Some(idx) = self.buffer.find("\n\n") {
            let record: String = self.buffer.drain(..idx + 2).collect();
            for line in record.lines() {
                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                match serde_json::from_str::<Event>(data.trim_start()) {
                    Ok(event) => events.push(event),
                    Err(e) => warn!(error = %e, "Skipping undecodable event record"),
                }
            }
        }
        events
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_a_complete_record() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {\"type\":\"connected\"}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, "connected");
    }

    #[test]
    fn test_reassembles_across_chunk_boundaries() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"type\":\"task-upd").is_empty());
        let events = decoder.push(b"ated\",\"id\":42}\n\ndata: {\"type\":\"heartbeat\"}\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, "task-updated");
        assert_eq!(events[1].kind, "heartbeat");
    }

    #[test]
    fn test_ignores_comments_and_other_fields() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keepalive\n\nevent: noise\n\ndata: {\"type\":\"x\"}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, "x");
    }

    #[test]
    fn test_skips_malformed_records() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: not-json\n\ndata: {\"type\":\"ok\"}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, "ok");
    }
}
