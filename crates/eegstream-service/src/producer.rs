//! Background sample producer.
//!
//! Every tick the producer generates one value per configured channel and
//! appends the whole batch in a single transaction. Stopping is cooperative:
//! cancellation is observed between ticks, never in the middle of a batch.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use eegstream_store::{NewSample, Store};
use eegstream_types::{ChannelId, SignalGenerator};

use crate::config::ProducerConfig;

/// Counters shared between the producer task and observers.
#[derive(Debug, Default)]
pub struct ProducerStats {
    running: AtomicBool,
    started_at: AtomicI64,
    ticks: AtomicU64,
    samples_committed: AtomicU64,
    failures: AtomicU64,
    last_id: AtomicI64,
    last_error: RwLock<Option<(OffsetDateTime, String)>>,
}

impl ProducerStats {
    /// Create zeroed stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the producer loop is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of ticks whose batch was committed.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Number of failed ticks.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Number of samples committed since start.
    pub fn samples_committed(&self) -> u64 {
        self.samples_committed.load(Ordering::Relaxed)
    }

    fn mark_started(&self) {
        self.started_at
            .store(OffsetDateTime::now_utc().unix_timestamp(), Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
    }

    fn mark_stopped(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn record_commit(&self, ids: &[i64]) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.samples_committed
            .fetch_add(ids.len() as u64, Ordering::Relaxed);
        if let Some(&last) = ids.last() {
            self.last_id.fetch_max(last, Ordering::Relaxed);
        }
    }

    async fn record_failure(&self, message: String) {
        *self.last_error.write().await = Some((OffsetDateTime::now_utc(), message));
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a serializable snapshot of the counters.
    pub async fn snapshot(&self) -> ProducerSnapshot {
        let started_at = match self.started_at.load(Ordering::SeqCst) {
            0 => None,
            ts => OffsetDateTime::from_unix_timestamp(ts).ok(),
        };
        let last_id = match self.last_id.load(Ordering::Relaxed) {
            0 => None,
            id => Some(id),
        };
        let last_error = self.last_error.read().await.clone();

        ProducerSnapshot {
            running: self.is_running(),
            started_at,
            ticks: self.ticks(),
            samples_committed: self.samples_committed(),
            failures: self.failures(),
            last_id,
            last_error_at: last_error.as_ref().map(|(at, _)| *at),
            last_error: last_error.map(|(_, msg)| msg),
        }
    }
}

/// Point-in-time view of [`ProducerStats`].
#[derive(Debug, Clone, Serialize)]
pub struct ProducerSnapshot {
    pub running: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    pub ticks: u64,
    pub samples_committed: u64,
    pub failures: u64,
    /// Highest id this producer has committed.
    pub last_id: Option<i64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_error_at: Option<OffsetDateTime>,
    pub last_error: Option<String>,
}

/// Producer errors.
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    #[error("Failed to store batch: {0}")]
    Store(#[from] eegstream_store::Error),
    #[error("Append task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Handle to the background producer task.
pub struct Producer {
    store: Store,
    config: ProducerConfig,
    stats: Arc<ProducerStats>,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Producer {
    /// Create a stopped producer writing into `store`.
    pub fn new(store: Store, config: ProducerConfig) -> Self {
        Self::with_stats(store, config, Arc::new(ProducerStats::new()))
    }

    /// Create a stopped producer that reports into existing `stats`.
    pub fn with_stats(store: Store, config: ProducerConfig, stats: Arc<ProducerStats>) -> Self {
        Self {
            store,
            config,
            stats,
            cancel_token: CancellationToken::new(),
            handle: None,
        }
    }

    /// Shared stats handle.
    pub fn stats(&self) -> Arc<ProducerStats> {
        Arc::clone(&self.stats)
    }

    /// Whether the background task is alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Spawn the producer loop. Returns `false` if it is already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }

        self.cancel_token = CancellationToken::new();
        let store = self.store.clone();
        let config = self.config.clone();
        let stats = Arc::clone(&self.stats);
        let token = self.cancel_token.clone();

        stats.mark_started();
        self.handle = Some(tokio::spawn(async move {
            run(store, config, Arc::clone(&stats), token).await;
            stats.mark_stopped();
        }));
        true
    }

    /// Signal the loop to stop and wait for the in-flight tick to finish.
    pub async fn stop(&mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            error!("Producer task ended abnormally: {}", e);
        }
        self.stats.mark_stopped();
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn run(
    store: Store,
    config: ProducerConfig,
    stats: Arc<ProducerStats>,
    token: CancellationToken,
) {
    let channels = config.channel_ids();
    let mut generator = config
        .channels
        .iter()
        .fold(
            SignalGenerator::seeded(config.seed).with_default_offset(config.default_offset),
            |generator, c| match c.offset {
                Some(offset) => generator.with_offset(c.id.clone(), offset),
                None => generator,
            },
        );
    let interval = config.interval();
    let started = Instant::now();

    info!(
        "Producer started ({} channel(s), interval {} ms)",
        channels.len(),
        config.interval_ms
    );

    let mut consecutive_failures = 0u32;
    loop {
        let t = started.elapsed().as_secs_f64();
        let batch = make_batch(&mut generator, &channels, t, OffsetDateTime::now_utc());

        match append(&store, batch).await {
            Ok(ids) => {
                if consecutive_failures > 0 {
                    info!(
                        "Producer recovered after {} failed tick(s)",
                        consecutive_failures
                    );
                }
                consecutive_failures = 0;
                debug!("Committed {} sample(s), last id {:?}", ids.len(), ids.last());
                stats.record_commit(&ids);
            }
            Err(e) => {
                consecutive_failures += 1;
                stats.record_failure(e.to_string()).await;
                if consecutive_failures <= 3 {
                    warn!(
                        "Producer tick failed: {} (attempt {})",
                        e, consecutive_failures
                    );
                } else if consecutive_failures == 4 {
                    error!(
                        "Producer failed {} ticks in a row, will continue trying silently",
                        consecutive_failures
                    );
                }
            }
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!("Producer stopped after {} tick(s)", stats.ticks());
}

/// One value per channel at elapsed time `t`, all stamped with `now`.
fn make_batch(
    generator: &mut SignalGenerator,
    channels: &[ChannelId],
    t: f64,
    now: OffsetDateTime,
) -> Vec<NewSample> {
    channels
        .iter()
        .map(|channel| NewSample::new(channel.clone(), now, generator.generate(t, channel)))
        .collect()
}

async fn append(store: &Store, batch: Vec<NewSample>) -> Result<Vec<i64>, ProducerError> {
    let store = store.clone();
    let ids = tokio::task::spawn_blocking(move || store.append(&batch)).await??;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use eegstream_store::SampleQuery;

    fn test_config() -> ProducerConfig {
        ProducerConfig {
            interval_ms: 5,
            seed: Some(42),
            ..ProducerConfig::default()
        }
    }

    #[test]
    fn test_make_batch_one_sample_per_channel() {
        let mut generator = SignalGenerator::seeded(Some(1));
        let now = OffsetDateTime::now_utc();
        let batch = make_batch(&mut generator, &ChannelId::defaults(), 0.5, now);

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].channel, ChannelId::a3());
        assert_eq!(batch[1].channel, ChannelId::a4());
        assert!(batch.iter().all(|s| s.timestamp == now));
        assert!(batch.iter().all(|s| s.value.is_finite()));
    }

    #[tokio::test]
    async fn test_start_stop() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("eeg.db")).unwrap();
        let mut producer = Producer::new(store.clone(), test_config());

        assert!(producer.start());
        assert!(!producer.start());
        assert!(producer.stats().is_running());

        tokio::time::sleep(Duration::from_millis(60)).await;
        producer.stop().await;

        assert!(!producer.is_running());
        assert!(!producer.stats().is_running());

        let ticks = producer.stats().ticks();
        assert!(ticks >= 1);
        assert_eq!(store.count().unwrap(), ticks * 2);
        assert_eq!(producer.stats().samples_committed(), ticks * 2);
    }

    #[tokio::test]
    async fn test_no_writes_after_stop() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("eeg.db")).unwrap();
        let mut producer = Producer::new(store.clone(), test_config());

        producer.start();
        tokio::time::sleep(Duration::from_millis(30)).await;
        producer.stop().await;

        let count = store.count().unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.count().unwrap(), count);
    }

    #[tokio::test]
    async fn test_batches_are_whole_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("eeg.db")).unwrap();
        let mut producer = Producer::new(store.clone(), test_config());

        producer.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        producer.stop().await;

        let all = store.query_samples(&SampleQuery::new()).unwrap();
        assert_eq!(all.len() % 2, 0);
        for pair in all.chunks(2) {
            assert_eq!(pair[0].channel, ChannelId::a3());
            assert_eq!(pair[1].channel, ChannelId::a4());
            assert_eq!(pair[0].timestamp, pair[1].timestamp);
            assert!(pair[0].id < pair[1].id);
        }

        let snapshot = producer.stats().snapshot().await;
        assert_eq!(snapshot.last_id, all.last().map(|s| s.id));
        assert!(snapshot.started_at.is_some());
        assert_eq!(snapshot.failures, 0);
        assert!(snapshot.last_error.is_none());
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("eeg.db")).unwrap();
        let mut producer = Producer::new(store, test_config());

        producer.start();
        producer.stop().await;
        assert!(producer.start());
        assert!(producer.is_running());
        producer.stop().await;
    }
}
