//! Application state.

use std::sync::Arc;

use tasklive_core::config::RealtimeConfig;
use tasklive_core::realtime::Dispatcher;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub config: RealtimeConfig,
}

impl AppState {
    pub fn new(config: RealtimeConfig) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(&config)),
            config,
        }
    }
}
