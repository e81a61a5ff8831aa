//! Murmur library crate (used by the server binary and integration tests).
//!
//! Real-time voice assistant core: a client streams transcript tokens over a
//! WebSocket, every token restarts answer generation on the text so far, and an
//! end-of-utterance marker yields exactly one final answer, spoken back as chunked
//! audio.
//!
//! # Public API Surface
//!
//! ## Conversation
//! - [`SessionController`], [`SessionRegistry`] - Per-connection token handling
//! - [`ResponseEngine`] - Cache lookup, then provider race, then cache write
//! - [`ServerEvent`], [`ClientEvent`] - Wire events
//!
//! ## Answer Sources
//! - [`TieredCache`] - L0 memory, L1 shared store, L2 similarity, L3 popularity
//! - [`ProviderRacer`] - Concurrent generation with first-win or timed ranking
//!
//! ## Speech
//! - [`plan_speech`], [`common_prefix`] - Reuse of already synthesized audio
//! - [`AudioChunkStreamer`] - Numbered binary frames between JSON control messages
//!
//! ## Test/Mock Support
//! Scripted providers are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod audio;
pub mod cache;
pub mod config;
pub mod constants;
pub mod gateway;
pub mod hashing;
pub mod prefix;
pub mod provider;
pub mod racer;
pub mod session;
pub mod transport;

pub use audio::{AudioChunkStreamer, AudioFrame, FrameError, StreamReport, chunk_count, reassemble};
pub use cache::{CacheConfig, CacheError, CacheHit, CacheStatsSnapshot, CacheTier, TieredCache};
pub use config::{Config, ConfigError};
pub use gateway::{AppState, GatewayError, create_router_with_state};
pub use hashing::{cache_key, hash_query, hash_to_u64, normalize_query};
pub use prefix::{SpeechPlan, SpeechSegment, common_prefix, plan_speech};
#[cfg(any(test, feature = "mock"))]
pub use provider::{RecordingSynthesizer, RecordingTranscriptSink, ScriptedProvider};
pub use provider::{
    EchoProvider, GenaiProvider, GenerationProvider, HttpSynthesisProvider, LogTranscriptSink,
    ProviderError, SilentWavSynthesizer, SynthesisProvider, TranscriptSink,
};
pub use racer::{
    Priority, ProviderConfig, ProviderRacer, QualityGate, RaceError, RaceStrategy, RacerConfig,
};
pub use session::{
    Answer, AnswerSource, ClientEvent, FinalizedAnswer, ResponseEngine, ServerEvent,
    SessionConfig, SessionController, SessionError, SessionRegistry, SessionServices,
    SessionState,
};
pub use transport::{ConnectionSink, OutboundMessage, TransportError};
