//! Cursor-based incremental reads.
//!
//! A client remembers the `last_id` of the previous response and passes it
//! back as `since_id`. Chaining calls this way never yields overlapping or
//! out-of-order points and never skips a committed sample; when a page comes
//! back full the client should call again immediately to drain the backlog.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use eegstream_store::{SampleQuery, Store, StoredSample};
use eegstream_types::{ChannelError, ChannelId};

use crate::config::LiveConfig;

/// Raw query-string parameters of `/live` and `/samples`.
///
/// Every field is kept as text so that malformed numbers fall back to
/// defaults instead of rejecting the request.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LiveParams {
    pub channel: Option<String>,
    pub since_id: Option<String>,
    pub limit: Option<String>,
}

impl LiveParams {
    /// Collect parameters from decoded query pairs.
    ///
    /// The first occurrence of a key wins; unknown keys are ignored.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "channel" => &mut params.channel,
                "since_id" => &mut params.since_id,
                "limit" => &mut params.limit,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        params
    }

    /// Resolve the raw parameters against `config`.
    ///
    /// Only an explicitly given, invalid channel name is an error.
    pub fn normalize(&self, config: &LiveConfig) -> Result<LiveRequest, ChannelError> {
        let channel = match self.channel.as_deref().map(str::trim) {
            None | Some("") => config.default_channel.clone(),
            Some(name) => ChannelId::new(name)?,
        };
        let since_id = self
            .since_id
            .as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(0);
        let limit = self
            .limit
            .as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok());

        Ok(LiveRequest {
            channel,
            since_id,
            limit,
        })
    }
}

/// A typed `/live` request.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveRequest {
    pub channel: ChannelId,
    /// Highest id the caller has already seen.
    pub since_id: i64,
    /// Requested page size; `None` means the default.
    pub limit: Option<i64>,
}

impl LiveRequest {
    /// Request the first page of `channel` with the default size.
    pub fn new(channel: ChannelId) -> Self {
        Self {
            channel,
            since_id: 0,
            limit: None,
        }
    }

    /// Continue after `since_id`.
    pub fn since_id(mut self, since_id: i64) -> Self {
        self.since_id = since_id;
        self
    }

    /// Request at most `limit` points.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One point in a [`LiveResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivePoint {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    pub value: f64,
}

impl From<StoredSample> for LivePoint {
    fn from(sample: StoredSample) -> Self {
        Self {
            id: sample.id,
            ts: sample.timestamp,
            value: sample.value,
        }
    }
}

/// Body of a `/live` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveResponse {
    pub channel: ChannelId,
    pub points: Vec<LivePoint>,
    /// Id of the last point, or the request's `since_id` when there are none.
    pub last_id: i64,
}

/// One entry of a `/samples` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    pub channel: ChannelId,
    pub value: f64,
}

impl From<StoredSample> for SamplePoint {
    fn from(sample: StoredSample) -> Self {
        Self {
            id: sample.id,
            ts: sample.timestamp,
            channel: sample.channel,
            value: sample.value,
        }
    }
}

/// Errors from the live read path.
#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    #[error("Failed to query samples: {0}")]
    Store(#[from] eegstream_store::Error),
    #[error("Query task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Stateless read path over the store.
#[derive(Debug, Clone)]
pub struct LiveQueryService {
    store: Store,
    config: LiveConfig,
}

impl LiveQueryService {
    /// Create a service reading from `store`.
    pub fn new(store: Store, config: LiveConfig) -> Self {
        Self { store, config }
    }

    /// Limits and defaults in effect.
    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    /// Page size actually used for a requested `limit`.
    ///
    /// Missing or non-positive values use the default; large values are
    /// clamped to the configured maximum.
    pub fn effective_limit(&self, limit: Option<i64>) -> u32 {
        match limit {
            Some(n) if n > 0 => n.min(i64::from(self.config.max_limit)) as u32,
            _ => self.config.default_limit,
        }
    }

    /// Number of samples `latest` returns for a requested `limit`.
    ///
    /// Same rules as [`effective_limit`](Self::effective_limit) with the
    /// `/samples` default.
    pub fn samples_limit(&self, limit: Option<i64>) -> u32 {
        match limit {
            Some(n) if n > 0 => n.min(i64::from(self.config.max_limit)) as u32,
            _ => self.config.samples_limit,
        }
    }

    /// Most recent samples of `channel`, newest first.
    pub async fn latest(
        &self,
        channel: ChannelId,
        limit: Option<i64>,
    ) -> Result<Vec<SamplePoint>, LiveError> {
        let query = SampleQuery::new()
            .channel(channel)
            .limit(self.samples_limit(limit))
            .newest_first();

        let store = self.store.clone();
        let samples = tokio::task::spawn_blocking(move || store.query_samples(&query)).await??;
        Ok(samples.into_iter().map(SamplePoint::from).collect())
    }

    /// Return the next page of `request.channel` after `request.since_id`.
    pub async fn live(&self, request: LiveRequest) -> Result<LiveResponse, LiveError> {
        let since_id = request.since_id.max(0);
        let limit = self.effective_limit(request.limit);
        let query = SampleQuery::new()
            .channel(request.channel.clone())
            .since_id(since_id)
            .limit(limit);

        let store = self.store.clone();
        let samples = tokio::task::spawn_blocking(move || store.query_samples(&query)).await??;

        let last_id = samples.last().map_or(since_id, |s| s.id);
        Ok(LiveResponse {
            channel: request.channel,
            points: samples.into_iter().map(LivePoint::from).collect(),
            last_id,
        })
    }
}
