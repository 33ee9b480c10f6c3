//! CSV upload and band-pass filtering.
//!
//! `POST /upload` takes a multipart form with a `file` field holding a CSV
//! recording. The CSV needs a `UTC Timestamp` column and one
//! `EEG Signal <channel> (uV)` column per configured producer channel. Each
//! channel is filtered independently with the configured zero-phase
//! Butterworth band-pass.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use serde::Serialize;
use tracing::{info, warn};

use eegstream_types::{BandPassFilter, ChannelId, FilterError};

use crate::config::FilterConfig;
use crate::state::AppState;

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Name of the timestamp column.
pub const TIMESTAMP_COLUMN: &str = "UTC Timestamp";

/// JSON key of the timestamp series; no channel may use it as its id.
pub const TIMESTAMPS_KEY: &str = "timestamps";

/// Column header holding the samples of `channel`.
pub fn signal_column(channel: &ChannelId) -> String {
    format!("EEG Signal {} (uV)", channel)
}

/// Create the upload router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

/// Timestamps plus one value series per channel.
///
/// Channels are flattened next to [`TIMESTAMPS_KEY`], keyed by channel id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSet {
    pub timestamps: Vec<String>,
    #[serde(flatten)]
    pub channels: BTreeMap<String, Vec<f64>>,
}

/// Body of a `/upload` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadResponse {
    pub original: SeriesSet,
    pub filtered: SeriesSet,
}

/// Upload errors.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("missing multipart field 'file'")]
    MissingFile,
    #[error("invalid multipart body: {0}")]
    Multipart(String),
    #[error("invalid CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing column '{0}'")]
    MissingColumn(String),
    #[error("row {row}: '{value}' in column '{column}' is not a finite number")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },
    #[error("cannot filter: {0}")]
    Filter(#[from] FilterError),
    #[error("filter task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for UploadError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            UploadError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        warn!("Upload rejected: {}", self);

        let body = serde_json::json!({
            "error": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, UploadError> {
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Multipart(e.to_string()))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| UploadError::Multipart(e.to_string()))?;
            file = Some(bytes);
            break;
        }
    }
    let file = file.ok_or(UploadError::MissingFile)?;

    let channels = state.config.producer.channel_ids();
    let filter = state.config.filter.clone();
    let response =
        tokio::task::spawn_blocking(move || process(&file, &channels, &filter)).await??;

    info!(
        "Filtered upload with {} row(s) across {} channel(s)",
        response.original.timestamps.len(),
        response.original.channels.len()
    );
    Ok(Json(response))
}

/// Parse the CSV in `data` and filter every channel.
pub fn process(
    data: &[u8],
    channels: &[ChannelId],
    config: &FilterConfig,
) -> Result<UploadResponse, UploadError> {
    let original = parse_csv(data, channels)?;
    let filter =
        BandPassFilter::butterworth(config.low_hz, config.high_hz, config.sample_rate_hz, config.order)?;

    let mut filtered = BTreeMap::new();
    for (name, values) in &original.channels {
        filtered.insert(name.clone(), filter.filtfilt(values)?);
    }

    Ok(UploadResponse {
        filtered: SeriesSet {
            timestamps: original.timestamps.clone(),
            channels: filtered,
        },
        original,
    })
}

fn parse_csv(data: &[u8], channels: &[ChannelId]) -> Result<SeriesSet, UploadError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(data);
    let headers = reader.headers()?.clone();

    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| UploadError::MissingColumn(name.to_string()))
    };
    let ts_index = position(TIMESTAMP_COLUMN)?;
    let columns = channels
        .iter()
        .map(|c| {
            let name = signal_column(c);
            position(&name).map(|index| (c.as_str().to_string(), name, index))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut timestamps = Vec::new();
    let mut series: Vec<Vec<f64>> = vec![Vec::new(); columns.len()];
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        timestamps.push(record.get(ts_index).unwrap_or_default().to_string());
        for ((_, column, index), values) in columns.iter().zip(series.iter_mut()) {
            let raw = record.get(*index).unwrap_or_default();
            let value = raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| UploadError::InvalidNumber {
                    row: row + 1,
                    column: column.clone(),
                    value: raw.to_string(),
                })?;
            values.push(value);
        }
    }

    Ok(SeriesSet {
        timestamps,
        channels: columns
            .into_iter()
            .map(|(name, _, _)| name)
            .zip(series)
            .collect(),
    })
}
