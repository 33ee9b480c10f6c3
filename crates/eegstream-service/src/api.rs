//! REST API endpoints.
//!
//! All endpoints return JSON. Errors are reported through [`AppError`] as
//! `{"error": "..."}`: an invalid channel name is a 400, a storage failure is
//! a 500 for that request only.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use time::OffsetDateTime;

use eegstream_types::ChannelId;

use crate::live::{LiveError, LiveParams, LiveResponse, SamplePoint};
use crate::state::AppState;

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/live", get(live))
        .route("/samples", get(samples))
        .route("/health", get(health))
        .route("/debug/count", get(debug_count))
        .route("/status", get(status))
}

/// Next page of samples for one channel after the client's cursor.
async fn live(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<LiveResponse>, AppError> {
    let request = LiveParams::from_pairs(pairs)
        .normalize(state.live.config())
        .map_err(|e| AppError::BadRequest(format!("invalid channel: {}", e)))?;
    let response = state.live.live(request).await?;
    Ok(Json(response))
}

/// Most recent samples of one channel, newest first.
async fn samples(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<SamplePoint>>, AppError> {
    let request = LiveParams::from_pairs(pairs)
        .normalize(state.live.config())
        .map_err(|e| AppError::BadRequest(format!("invalid channel: {}", e)))?;
    let points = state.live.latest(request.channel, request.limit).await?;
    Ok(Json(points))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

/// Sample count response.
#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u64,
    pub db_path: String,
}

async fn debug_count(State(state): State<Arc<AppState>>) -> Result<Json<CountResponse>, AppError> {
    let store = state.store.clone();
    let count = tokio::task::spawn_blocking(move || store.count())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(Json(CountResponse {
        count,
        db_path: state.store.path().display().to_string(),
    }))
}

/// Service status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub producer: ProducerStatus,
}

/// Producer part of [`StatusResponse`].
#[derive(Debug, Serialize)]
pub struct ProducerStatus {
    pub running: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    pub interval_ms: u64,
    pub channels: Vec<ChannelId>,
    pub ticks: u64,
    pub samples_committed: u64,
    pub failures: u64,
    pub last_id: Option<i64>,
    pub last_error: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_error_at: Option<OffsetDateTime>,
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let snapshot = state.lifecycle.snapshot().await;
    let config = &state.config.producer;

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
        producer: ProducerStatus {
            running: snapshot.running,
            started_at: snapshot.started_at,
            interval_ms: config.interval_ms,
            channels: config.channel_ids(),
            ticks: snapshot.ticks,
            samples_committed: snapshot.samples_committed,
            failures: snapshot.failures,
            last_id: snapshot.last_id,
            last_error: snapshot.last_error,
            last_error_at: snapshot.last_error_at,
        },
    })
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Store(eegstream_store::Error),
    Internal(String),
}

impl From<eegstream_store::Error> for AppError {
    fn from(e: eegstream_store::Error) -> Self {
        AppError::Store(e)
    }
}

impl From<LiveError> for AppError {
    fn from(e: LiveError) -> Self {
        match e {
            LiveError::Store(e) => AppError::Store(e),
            LiveError::Task(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Store(e) => {
                tracing::error!("Storage error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use eegstream_store::{NewSample, Store};

    use crate::config::Config;

    fn create_test_state() -> (tempfile::TempDir, Arc<AppState>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("eeg.db")).unwrap();
        (dir, AppState::new(store, Config::default()))
    }

    fn seed(state: &AppState, ticks: usize) {
        let now = OffsetDateTime::now_utc();
        for i in 0..ticks {
            state
                .store
                .append(&[
                    NewSample::new(ChannelId::a3(), now, i as f64),
                    NewSample::new(ChannelId::a4(), now, i as f64 + 0.5),
                ])
                .unwrap();
        }
    }

    async fn get_json(state: Arc<AppState>, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router()
            .with_state(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (_dir, state) = create_test_state();
        let (status, json) = get_json(state, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_debug_count() {
        let (_dir, state) = create_test_state();
        seed(&state, 4);
        let db_path = state.store.path().display().to_string();

        let (status, json) = get_json(state, "/debug/count").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["count"], 8);
        assert_eq!(json["db_path"], db_path);
    }

    #[tokio::test]
    async fn test_live_defaults_to_a4() {
        let (_dir, state) = create_test_state();
        seed(&state, 3);

        let (status, json) = get_json(state, "/live").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["channel"], "A4");
        let points = json["points"].as_array().unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0]["id"], 2);
        assert_eq!(points[0]["value"], 0.5);
        assert!(points[0]["ts"].is_string());
        assert_eq!(json["last_id"], 6);
    }

    #[tokio::test]
    async fn test_live_with_cursor_and_limit() {
        let (_dir, state) = create_test_state();
        seed(&state, 5);

        let (status, json) = get_json(state, "/live?channel=A3&since_id=3&limit=2").await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<i64> = json["points"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![5, 7]);
        assert_eq!(json["last_id"], 7);
    }

    #[tokio::test]
    async fn test_live_invalid_numbers_fall_back() {
        let (_dir, state) = create_test_state();
        seed(&state, 3);

        let (status, json) = get_json(state, "/live?channel=A3&since_id=abc&limit=-4").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["points"].as_array().unwrap().len(), 3);
        assert_eq!(json["last_id"], 5);
    }

    #[tokio::test]
    async fn test_live_empty_keeps_cursor() {
        let (_dir, state) = create_test_state();
        seed(&state, 2);

        let (status, json) = get_json(state, "/live?channel=A4&since_id=50").await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["points"].as_array().unwrap().is_empty());
        assert_eq!(json["last_id"], 50);
    }

    #[tokio::test]
    async fn test_live_repeated_keys_use_first_value() {
        let (_dir, state) = create_test_state();
        seed(&state, 5);

        let (status, json) = get_json(
            state,
            "/live?channel=A3&channel=A4&since_id=1&since_id=x&limit=2&limit=6",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["channel"], "A3");
        let ids: Vec<i64> = json["points"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![3, 5]);
        assert_eq!(json["last_id"], 5);
    }

    #[tokio::test]
    async fn test_samples_newest_first() {
        let (_dir, state) = create_test_state();
        seed(&state, 5);

        let (status, json) = get_json(state, "/samples?channel=A3&limit=3").await;
        assert_eq!(status, StatusCode::OK);
        let samples = json.as_array().unwrap();
        let ids: Vec<i64> = samples.iter().map(|s| s["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![9, 7, 5]);
        assert_eq!(samples[0]["channel"], "A3");
        assert_eq!(samples[0]["value"], 4.0);
        assert!(samples[0]["ts"].is_string());
    }

    #[tokio::test]
    async fn test_samples_defaults() {
        let (_dir, state) = create_test_state();
        seed(&state, 120);

        let (status, json) = get_json(state, "/samples?limit=zero&limit=3").await;
        assert_eq!(status, StatusCode::OK);
        let samples = json.as_array().unwrap();
        assert_eq!(samples.len(), 100);
        assert_eq!(samples[0]["channel"], "A4");
        assert_eq!(samples[0]["id"], 240);
        assert_eq!(samples[99]["id"], 42);
    }

    #[tokio::test]
    async fn test_samples_invalid_channel() {
        let (_dir, state) = create_test_state();
        let (status, json) = get_json(state, "/samples?channel=%07").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("invalid channel"));
    }

    #[tokio::test]
    async fn test_live_invalid_channel() {
        let (_dir, state) = create_test_state();
        let long = "X".repeat(ChannelId::MAX_LEN + 1);

        let (status, json) = get_json(state, &format!("/live?channel={}", long)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("invalid channel"));
    }

    #[tokio::test]
    async fn test_storage_failure_is_500() {
        let (dir, state) = create_test_state();
        std::fs::remove_dir_all(dir.path()).unwrap();

        let (status, json) = get_json(Arc::clone(&state), "/debug/count").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].is_string());

        let (status, _) = get_json(state, "/live").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let (_dir, state) = create_test_state();
        let (status, json) = get_json(state, "/status").await;

        assert_eq!(status, StatusCode::OK);
        assert!(json["version"].is_string());
        assert_eq!(json["producer"]["running"], false);
        assert_eq!(json["producer"]["interval_ms"], 50);
        assert_eq!(json["producer"]["channels"], serde_json::json!(["A3", "A4"]));
        assert_eq!(json["producer"]["ticks"], 0);
        assert!(json["producer"]["started_at"].is_null());
    }
}
