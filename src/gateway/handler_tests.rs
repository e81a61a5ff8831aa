use std::sync::Arc;

use axum::{Router, body::Body, http::Request, http::StatusCode};
use http_body_util::BodyExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use super::*;
use crate::cache::{CacheConfig, MemoryStore, SharedStore, TieredCache};
use crate::provider::{RecordingSynthesizer, RecordingTranscriptSink, ScriptedProvider};
use crate::racer::{Priority, ProviderConfig, ProviderRacer, RaceStrategy, RacerConfig};
use crate::session::{ResponseEngine, SessionConfig, SessionServices};

fn state_with(racer: ProviderRacer) -> AppState {
    state_with_cache(racer, TieredCache::in_memory(CacheConfig::default()))
}

fn state_with_cache(racer: ProviderRacer, cache: TieredCache) -> AppState {
    let engine = ResponseEngine::new(Arc::new(cache), Arc::new(racer), RaceStrategy::FirstWin);
    let services = SessionServices {
        engine: Arc::new(engine),
        synthesizer: Arc::new(RecordingSynthesizer::new()),
        transcript: Arc::new(RecordingTranscriptSink::new()),
    };
    AppState::new(services, SessionConfig::default())
}

fn scripted_racer() -> ProviderRacer {
    ProviderRacer::new(RacerConfig::default()).with_provider(
        ProviderConfig::new("scripted", "model", Priority::Fast),
        Arc::new(ScriptedProvider::replying("오늘은 맑고 따뜻한 날씨입니다.")),
    )
}

fn test_state() -> AppState {
    state_with(scripted_racer())
}

async fn fetch(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, headers, json)
}

#[tokio::test]
async fn test_healthz() {
    let (status, headers, body) = fetch(create_router_with_state(test_state()), "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[MURMUR_STATUS_HEADER], MURMUR_STATUS_HEALTHY);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_ready_with_providers() {
    let (status, _, body) = fetch(create_router_with_state(test_state()), "/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["components"]["providers"], "ready");
    assert_eq!(body["components"]["enabled_providers"], 1);
}

#[tokio::test]
async fn test_ready_reports_degraded_cache_when_shared_store_is_down() {
    let store = Arc::new(MemoryStore::new());
    let shared: Arc<dyn SharedStore> = store.clone();
    let cache = TieredCache::new(CacheConfig::default(), shared);
    let app = create_router_with_state(state_with_cache(scripted_racer(), cache));

    let (status, _, body) = fetch(app.clone(), "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["components"]["cache"], "ready");

    store.set_offline(true);
    let (status, headers, body) = fetch(app, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[MURMUR_STATUS_HEADER], "ok");
    assert_eq!(body["components"]["cache"], MURMUR_STATUS_DEGRADED);
    assert_eq!(body["components"]["providers"], "ready");
}

#[tokio::test]
async fn test_ready_without_providers() {
    let state = state_with(ProviderRacer::new(RacerConfig::default()));
    let (status, headers, body) = fetch(create_router_with_state(state), "/ready").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(headers[MURMUR_STATUS_HEADER], "pending");
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn test_stats_reports_cache_and_race_counters() {
    let state = test_state();
    let engine = Arc::clone(&state.services.engine);
    let cancel = CancellationToken::new();

    engine.answer("오늘 날씨 어때", "s1", &cancel).await.unwrap();
    engine.answer("오늘 날씨 어때", "s1", &cancel).await.unwrap();
    state.registry.register("s1", CancellationToken::new());

    let (status, _, body) = fetch(create_router_with_state(state), "/v1/stats").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active_sessions"], 1);
    assert_eq!(body["sessions"][0]["session_id"], "s1");
    assert_eq!(body["cache"]["lookups"], 2);
    assert_eq!(body["cache"]["l0_hits"], 1);
    assert_eq!(body["cache"]["misses"], 1);
    assert_eq!(body["race"]["total_races"], 1);
    assert_eq!(body["trending"][0]["question"], "오늘 날씨 어때");
}

#[tokio::test]
async fn test_ws_without_session_id_is_rejected() {
    let (status, headers, body) = fetch(create_router_with_state(test_state()), "/ws").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(headers[MURMUR_STATUS_HEADER], "missing_session");
    assert_eq!(body["code"], 400);
}

#[test]
fn test_session_id_sources() {
    let uri = "/ws?session_id=from-query".parse().unwrap();
    let mut headers = axum::http::HeaderMap::new();
    assert_eq!(
        SessionId::from_parts(&headers, &uri).unwrap(),
        SessionId("from-query".to_string())
    );

    headers.insert("phone-id", "phone-7".parse().unwrap());
    assert_eq!(SessionId::from_parts(&headers, &uri).unwrap().0, "phone-7");

    headers.insert("session-id", " primary ".parse().unwrap());
    assert_eq!(SessionId::from_parts(&headers, &uri).unwrap().0, "primary");
}

#[test]
fn test_session_id_validation() {
    let headers = axum::http::HeaderMap::new();

    let blank = "/ws?session_id=%20%20".parse().unwrap();
    assert!(matches!(
        SessionId::from_parts(&headers, &blank),
        Err(GatewayError::MissingSessionId)
    ));

    let long = format!("/ws?session_id={}", "x".repeat(ws::MAX_SESSION_ID_LEN + 1))
        .parse()
        .unwrap();
    assert!(matches!(
        SessionId::from_parts(&headers, &long),
        Err(GatewayError::InvalidRequest(_))
    ));
}

#[test]
fn test_gateway_error_status() {
    use axum::response::IntoResponse;

    let response = GatewayError::InvalidRequest("bad".to_string()).into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[MURMUR_STATUS_HEADER], "invalid_request");
}
