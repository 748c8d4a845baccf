// src/state.rs
use std::sync::Arc;

use crate::services::generator::TextGenerator;

pub type SharedState = Arc<AppState>;

/// Built once at startup and shared read-only by every request.
pub struct AppState {
    pub generator: Arc<dyn TextGenerator>,
    pub relay_api_key: Option<String>,
}

impl AppState {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator, relay_api_key: None }
    }

    pub fn with_relay_api_key(mut self, key: Option<String>) -> Self {
        self.relay_api_key = key;
        self
    }
}
