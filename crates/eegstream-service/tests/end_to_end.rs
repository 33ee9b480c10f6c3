//! End-to-end tests: producer, store, and live reads together.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use eegstream_service::{
    AppState, Config, LiveQueryService, LiveRequest, Producer, ProducerConfig, StartOutcome,
};
use eegstream_store::{SampleQuery, Store};
use eegstream_types::ChannelId;

fn fast_config(dir: &tempfile::TempDir) -> Config {
    let mut config = Config::default();
    config.storage.path = dir.path().join("eeg.db");
    config.producer.interval_ms = 10;
    config.producer.seed = Some(2024);
    config
}

async fn get_json(state: Arc<AppState>, uri: &str) -> serde_json::Value {
    let response = eegstream_service::app(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK, "GET {}", uri);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn producer_feeds_live_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(&dir);
    let store = Store::open(&config.storage.path).unwrap();
    let state = AppState::new(store.clone(), config);

    assert_eq!(
        state.lifecycle.start_once(true).await,
        StartOutcome::Started
    );
    tokio::time::sleep(Duration::from_millis(200)).await;

    let count = get_json(Arc::clone(&state), "/debug/count").await;
    let total = count["count"].as_u64().unwrap();
    // About 20 ticks of two samples; wide bounds for slow CI machines
    assert!(total >= 10, "only {} samples after 200 ms", total);
    assert!(total <= 100, "{} samples after 200 ms", total);

    let first_a4 = store
        .query_samples(&SampleQuery::new().channel(ChannelId::a4()).limit(1))
        .unwrap()[0]
        .id;

    let live = get_json(Arc::clone(&state), "/live?channel=A4&since_id=0&limit=5").await;
    let ids: Vec<i64> = live["points"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids.len(), 5);
    assert_eq!(ids[0], first_a4);
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(live["last_id"], ids[4]);

    state.lifecycle.stop().await;
    let status = get_json(state, "/status").await;
    assert_eq!(status["producer"]["running"], false);
    assert!(status["producer"]["ticks"].as_u64().unwrap() >= 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cursor_drain_reconstructs_every_channel() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(&dir);
    let store = Store::open(&config.storage.path).unwrap();
    let live = LiveQueryService::new(store.clone(), config.live.clone());

    let mut producer = Producer::new(store.clone(), config.producer.clone());
    producer.start();

    // Read while the producer is still writing
    let mut seen: Vec<Vec<i64>> = vec![Vec::new(); 2];
    let mut cursors = [0i64; 2];
    for _ in 0..20 {
        for (i, channel) in ChannelId::defaults().into_iter().enumerate() {
            let response = live
                .live(LiveRequest::new(channel).since_id(cursors[i]).limit(3))
                .await
                .unwrap();
            assert!(response.points.len() <= 3);
            seen[i].extend(response.points.iter().map(|p| p.id));
            cursors[i] = response.last_id;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    producer.stop().await;

    // Drain whatever is left
    for (i, channel) in ChannelId::defaults().into_iter().enumerate() {
        loop {
            let response = live
                .live(
                    LiveRequest::new(channel.clone())
                        .since_id(cursors[i])
                        .limit(50),
                )
                .await
                .unwrap();
            if response.points.is_empty() {
                assert_eq!(response.last_id, cursors[i]);
                break;
            }
            seen[i].extend(response.points.iter().map(|p| p.id));
            cursors[i] = response.last_id;
        }

        let expected: Vec<i64> = store
            .query_samples(&SampleQuery::new().channel(channel))
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert!(!expected.is_empty());
        assert_eq!(seen[i], expected);
    }

    // Both channels got one sample per tick
    assert_eq!(seen[0].len(), seen[1].len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn producer_survives_store_failures() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("eeg.db");
    let store = Store::open(&db_path).unwrap();
    let config = ProducerConfig {
        interval_ms: 10,
        seed: Some(9),
        ..ProducerConfig::default()
    };

    let mut producer = Producer::new(store.clone(), config);
    producer.start();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Pull the database out from under the producer
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", db_path.display(), suffix));
    }
    tokio::time::sleep(Duration::from_millis(80)).await;

    let stats = producer.stats();
    assert!(stats.failures() > 0);
    assert!(producer.is_running());
    let snapshot = stats.snapshot().await;
    assert!(snapshot.last_error.is_some());
    assert!(snapshot.last_error_at.is_some());

    // Recreate it; the next ticks land again
    Store::open(&db_path).unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    producer.stop().await;

    assert!(store.count().unwrap() > 0);
    assert_eq!(store.count().unwrap() % 2, 0);
}

#[tokio::test]
async fn second_start_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(&dir);
    let store = Store::open(&config.storage.path).unwrap();
    let state = AppState::new(store, config);

    assert_eq!(
        state.lifecycle.start_once(true).await,
        StartOutcome::Started
    );
    assert_eq!(
        state.lifecycle.start_once(true).await,
        StartOutcome::AlreadyStarted
    );
    state.lifecycle.stop().await;
    assert!(!state.lifecycle.is_running());
}
