//! Durable, append-only log of EEG samples.
//!
//! This crate provides SQLite-based storage for the samples written by the
//! background producer and read by live-query clients.
//!
//! # Features
//!
//! - Atomic batch appends (one transaction per producer tick)
//! - Globally increasing sample ids, never reused
//! - Cursor queries: samples of a channel strictly after a given id
//! - WAL mode so readers never block the single writer
//!
//! # Example
//!
//! ```no_run
//! use eegstream_store::{NewSample, SampleQuery, Store};
//! use eegstream_types::ChannelId;
//! use time::OffsetDateTime;
//!
//! let store = Store::open_default()?;
//!
//! store.append(&[NewSample::new(ChannelId::a4(), OffsetDateTime::now_utc(), 0.42)])?;
//!
//! // Everything on A4 after id 0, at most 10 samples
//! let query = SampleQuery::new().channel(ChannelId::a4()).since_id(0).limit(10);
//! let samples = store.query_samples(&query)?;
//! # Ok::<(), eegstream_store::Error>(())
//! ```

mod error;
mod models;
mod queries;
mod schema;
mod store;

pub use error::{Error, Result};
pub use models::{NewSample, StoredSample};
pub use queries::SampleQuery;
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/eegstream/eeg.db`
/// - macOS: `~/Library/Application Support/eegstream/eeg.db`
/// - Windows: `C:\Users\<user>\AppData\Local\eegstream\eeg.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("eegstream")
        .join("eeg.db")
}
