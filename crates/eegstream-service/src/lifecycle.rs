//! Start-once gate for the background producer.
//!
//! A process may be launched more than once under a reloading supervisor, and
//! only the primary instance should produce. The controller starts the
//! producer at most once per process no matter how many times
//! [`LifecycleController::start_once`] is called.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tracing::info;

use eegstream_store::Store;

use crate::config::ProducerConfig;
use crate::producer::{Producer, ProducerSnapshot, ProducerStats};

/// Result of [`LifecycleController::start_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The producer was started by this call.
    Started,
    /// An earlier call already started it; nothing was done.
    AlreadyStarted,
    /// This process is not the primary instance; nothing was done.
    NotPrimary,
    /// [`LifecycleController::stop`] already ran; nothing was done.
    Stopped,
}

/// Owns the producer and guarantees a single start.
///
/// Both flags change only while the producer lock is held, so a `stop`
/// racing a `start_once` either stops the started producer or prevents the
/// start.
pub struct LifecycleController {
    started: AtomicBool,
    stopped: AtomicBool,
    producer: Mutex<Producer>,
    stats: Arc<ProducerStats>,
}

impl LifecycleController {
    /// Create a controller for a producer writing into `store`.
    pub fn new(store: Store, config: ProducerConfig) -> Self {
        let stats = Arc::new(ProducerStats::new());
        Self {
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            producer: Mutex::new(Producer::with_stats(store, config, Arc::clone(&stats))),
            stats,
        }
    }

    /// Start the producer if this is the primary process and it has not been
    /// started before.
    pub async fn start_once(&self, is_primary: bool) -> StartOutcome {
        if !is_primary {
            info!("Not the primary process, producer stays idle");
            return StartOutcome::NotPrimary;
        }

        let mut producer = self.producer.lock().await;
        if self.stopped.load(Ordering::SeqCst) {
            return StartOutcome::Stopped;
        }
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return StartOutcome::AlreadyStarted;
        }

        producer.start();
        StartOutcome::Started
    }

    /// Stop the producer, waiting for the in-flight tick. Safe to call when it
    /// never started; later `start_once` calls do nothing.
    pub async fn stop(&self) {
        let mut producer = self.producer.lock().await;
        self.stopped.store(true, Ordering::SeqCst);
        producer.stop().await;
    }

    /// Whether the producer loop is running.
    pub fn is_running(&self) -> bool {
        self.stats.is_running()
    }

    /// Shared stats handle.
    pub fn stats(&self) -> Arc<ProducerStats> {
        Arc::clone(&self.stats)
    }

    /// Snapshot of the producer counters.
    pub async fn snapshot(&self) -> ProducerSnapshot {
        self.stats.snapshot().await
    }
}

/// Decide whether this process is the primary instance.
///
/// With no marker variable configured every process is primary. Otherwise the
/// variable must be set to `"true"`.
pub fn is_primary_process(primary_env: Option<&str>) -> bool {
    match primary_env {
        None => true,
        Some(var) => std::env::var(var).is_ok_and(|v| v == "true"),
    }
}
