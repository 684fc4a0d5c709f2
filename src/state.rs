use std::sync::Arc;

use crate::config::Config;
use crate::store::RecordingStore;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub store: Arc<RecordingStore>,
}

impl AppState {
    pub fn new(cfg: Config) -> Self {
        let store = Arc::new(RecordingStore::new(cfg.viewer.cache_capacity));
        Self {
            cfg: Arc::new(cfg),
            store,
        }
    }
}
