//! Tasklive Client SDK
//!
//! Consumer side of the realtime stream: an SSE transport with an
//! incremental frame decoder, and a reconnecting controller that hosting
//! applications embed to receive application events across connection
//! failures.

pub mod backoff;
pub mod controller;
pub mod error;
pub mod transport;

pub use controller::{spawn, ClientConfig, ClientEvent, ControllerHandle};
pub use error::ClientError;
pub use transport::{SseTransport, StreamTransport};
