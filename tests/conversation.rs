//! End-to-end conversations through the public session API.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use murmur::{
    CacheConfig, ConnectionSink, EchoProvider, OutboundMessage, Priority, ProviderConfig,
    ProviderRacer, RaceStrategy, RacerConfig, RecordingTranscriptSink, ResponseEngine,
    SessionConfig, SessionController, SessionServices, SilentWavSynthesizer, SynthesisProvider,
    TieredCache, reassemble,
};

fn services() -> SessionServices {
    let racer = ProviderRacer::new(RacerConfig::default()).with_provider(
        ProviderConfig::new("echo", "echo", Priority::Fast),
        Arc::new(EchoProvider::new().with_delay(Duration::from_millis(20))),
    );
    SessionServices {
        engine: Arc::new(ResponseEngine::new(
            Arc::new(TieredCache::in_memory(CacheConfig::default())),
            Arc::new(racer),
            RaceStrategy::FirstWin,
        )),
        synthesizer: Arc::new(SilentWavSynthesizer::new()),
        transcript: Arc::new(RecordingTranscriptSink::new()),
    }
}

fn session(
    id: &str,
    services: &SessionServices,
) -> (SessionController, UnboundedReceiver<OutboundMessage>) {
    let (sink, rx) = ConnectionSink::channel();
    let controller = SessionController::new(
        id,
        sink,
        services.clone(),
        SessionConfig::default(),
        CancellationToken::new(),
    );
    (controller, rx)
}

/// Collects outbound messages until an `audio_complete` arrives.
async fn until_audio_complete(
    rx: &mut UnboundedReceiver<OutboundMessage>,
) -> (Vec<Value>, Vec<Vec<u8>>) {
    let mut events = Vec::new();
    let mut frames = Vec::new();
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("audio delivered in time")
            .expect("sink open");
        match message {
            OutboundMessage::Text(text) => {
                let event: Value = serde_json::from_str(&text).unwrap();
                let done = event["type"] == "audio_complete";
                events.push(event);
                if done {
                    return (events, frames);
                }
            }
            OutboundMessage::Binary(frame) => frames.push(frame),
            OutboundMessage::Pong(_) => {}
        }
    }
}

#[tokio::test]
async fn test_tokens_to_spoken_answer() {
    let services = services();
    let (mut controller, mut rx) = session("phone-1", &services);
    controller.announce().unwrap();

    for token in ["안", "녕"] {
        let raw = serde_json::json!({ "token": token, "request_id": "r1" }).to_string();
        assert!(controller.handle_text(&raw).await.is_none());
    }
    let finalized = controller
        .handle_text(r#"{"token": "<eos>", "request_id": "r1"}"#)
        .await
        .unwrap();
    assert_eq!(finalized.question, "안녕");
    assert_eq!(finalized.answer.content, "Mock response for: 안녕");

    let (events, frames) = until_audio_complete(&mut rx).await;

    assert_eq!(events[0]["type"], "connection_established");
    assert_eq!(events[0]["session_id"], "phone-1");

    let complete: Vec<_> = events.iter().filter(|e| e["type"] == "complete").collect();
    assert_eq!(complete.len(), 1);
    assert_eq!(complete[0]["question"], "안녕");
    assert_eq!(complete[0]["request_id"], "r1");

    let start = events
        .iter()
        .find(|e| e["type"] == "audio_start")
        .expect("audio_start sent");
    assert_eq!(start["requestId"], "r1");
    assert_eq!(start["fileName"], "tts_phone-1_r1_part0.wav");
    assert_eq!(start["totalChunks"].as_u64().unwrap() as usize, frames.len());

    let audio = reassemble(&frames).unwrap();
    let expected = SilentWavSynthesizer::new()
        .synthesize(&finalized.answer.content)
        .await
        .unwrap();
    assert_eq!(audio, expected);
    assert_eq!(&audio[..4], b"RIFF");

    controller.shutdown().await;
}

#[tokio::test]
async fn test_popular_answer_is_shared_across_sessions() {
    let services = services();

    let (mut first, _first_rx) = session("phone-a", &services);
    first.on_token("내일 부산 날씨 어때", None).unwrap();
    let answer = first.finalize(None).await;
    assert_eq!(answer.answer.source.label(), "provider:echo");

    let (mut second, _second_rx) = session("phone-b", &services);
    second.on_token("내일 부산 날씨 어때", None).unwrap();
    let shared = second.finalize(None).await;

    assert_eq!(shared.answer.content, answer.answer.content);
    assert_eq!(shared.answer.source.label(), "cache:L3");

    let stats = services.engine.cache().stats();
    assert_eq!(stats.l3_hits, 1);
    assert_eq!(services.engine.racer().stats().total_races, 1);
}

#[tokio::test]
async fn test_utterances_in_sequence_each_complete_once() {
    let services = services();
    let (mut controller, mut rx) = session("phone-9", &services);

    for utterance in ["첫 번째 질문", "두 번째 질문입니다"] {
        controller.on_token(utterance, None).unwrap();
        let finalized = controller.finalize(None).await;
        assert_eq!(finalized.question, utterance);
        assert!(!finalized.reused);
    }

    tokio::time::sleep(Duration::from_millis(200)).await;
    let mut complete = Vec::new();
    while let Ok(message) = rx.try_recv() {
        if let OutboundMessage::Text(text) = message {
            let event: Value = serde_json::from_str(&text).unwrap();
            if event["type"] == "complete" {
                complete.push(event["question"].as_str().unwrap().to_string());
            }
        }
    }
    assert_eq!(complete, vec!["첫 번째 질문", "두 번째 질문입니다"]);
}
