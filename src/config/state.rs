// Application state module
// Shared, read-only state handed to every connection

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use super::types::Config;
use crate::routing::Router;

/// Application state
pub struct AppState {
    pub config: Config,
    pub router: Arc<Router>,
    /// Connections currently being served
    pub active_connections: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(config: Config, router: Router) -> Self {
        Self {
            config,
            router: Arc::new(router),
            active_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Body size limit as a `usize`, saturating on narrow targets
    pub fn max_body_size(&self) -> usize {
        usize::try_from(self.config.http.max_body_size).unwrap_or(usize::MAX)
    }
}
