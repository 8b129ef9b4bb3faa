//! Realtime connection tracking and event fan-out.

pub mod connection;
pub mod dispatcher;
pub mod viewer;

pub use connection::{Connection, ConnectionClosed, ConnectionId, ConnectionRegistry, Removal, UserId};
pub use dispatcher::Dispatcher;
pub use viewer::ViewerRegistry;
