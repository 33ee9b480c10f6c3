//! Background EEG producer and cursor-based HTTP API.
//!
//! This crate provides a service that:
//! - Writes one synthetic sample per configured channel on a fixed tick
//! - Stores samples in an append-only SQLite log with increasing ids
//! - Serves incremental per-channel reads driven by a client-held cursor
//! - Band-pass filters uploaded CSV recordings
//!
//! # REST API Endpoints
//!
//! - `GET /live?channel=A4&since_id=0&limit=200` - Samples after the cursor
//! - `GET /samples?channel=A4&limit=100` - Most recent samples, newest first
//! - `GET /health` - Liveness check
//! - `GET /debug/count` - Total stored samples and database path
//! - `GET /status` - Producer counters
//! - `POST /upload` - Filter a multipart CSV upload
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/eegstream/server.toml`:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:5000"
//!
//! [storage]
//! path = "~/.local/share/eegstream/eeg.db"
//!
//! [producer]
//! interval_ms = 50
//!
//! [[producer.channels]]
//! id = "A3"
//! offset = 0.15
//!
//! [[producer.channels]]
//! id = "A4"
//! offset = -0.05
//! ```

pub mod api;
pub mod config;
pub mod lifecycle;
pub mod live;
pub mod producer;
pub mod state;
pub mod upload;

pub use config::{
    ChannelConfig, Config, ConfigError, FilterConfig, LiveConfig, ProducerConfig, ServerConfig,
    StorageConfig,
};
pub use lifecycle::{LifecycleController, StartOutcome};
pub use live::{
    LiveError, LivePoint, LiveQueryService, LiveRequest, LiveResponse, SamplePoint,
};
pub use producer::{Producer, ProducerSnapshot, ProducerStats};
pub use state::AppState;

use axum::Router;
use std::sync::Arc;

/// Build the full application router for `state`.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(api::router())
        .merge(upload::router())
        .with_state(state)
}
