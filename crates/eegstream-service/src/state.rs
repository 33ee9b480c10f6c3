//! Application state shared across handlers.

use std::sync::Arc;

use eegstream_store::Store;

use crate::config::Config;
use crate::lifecycle::LifecycleController;
use crate::live::LiveQueryService;

/// Shared application state.
///
/// The store is a cheap handle to the database path; every operation opens
/// its own connection, so no lock is held around it.
pub struct AppState {
    /// The sample log.
    pub store: Store,
    /// Configuration as loaded at startup.
    pub config: Config,
    /// Read path for `/live`.
    pub live: LiveQueryService,
    /// Owner of the background producer.
    pub lifecycle: LifecycleController,
}

impl AppState {
    /// Create new application state. The producer is not started.
    pub fn new(store: Store, config: Config) -> Arc<Self> {
        let live = LiveQueryService::new(store.clone(), config.live.clone());
        let lifecycle = LifecycleController::new(store.clone(), config.producer.clone());
        Arc::new(Self {
            store,
            config,
            live,
            lifecycle,
        })
    }
}
