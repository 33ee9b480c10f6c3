//! Platform-agnostic building blocks for the eegstream service.
//!
//! This crate has no I/O. It provides:
//!
//! - [`ChannelId`], the validated name of a signal channel
//! - [`SignalGenerator`], the synthetic EEG-like waveform source
//! - [`BandPassFilter`], the zero-phase Butterworth filter used on uploads
//!
//! # Example
//!
//! ```
//! use eegstream_types::{ChannelId, SignalGenerator};
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//!
//! let mut generator = SignalGenerator::new(StdRng::seed_from_u64(7));
//! let a3 = ChannelId::new("A3")?;
//! let value = generator.generate(0.25, &a3);
//! assert!(value.is_finite());
//! # Ok::<(), eegstream_types::ChannelError>(())
//! ```

pub mod channel;
pub mod error;
pub mod filter;
pub mod signal;

pub use channel::ChannelId;
pub use error::{ChannelError, FilterError};
pub use filter::BandPassFilter;
pub use signal::SignalGenerator;
