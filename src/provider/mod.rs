//! Upstream collaborators: text generation, speech synthesis and transcript recording.
//!
//! The core depends only on the traits here; concrete backends are picked in `main`.

pub mod echo;
pub mod error;
pub mod llm;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod synthesis;
pub mod transcript;


pub use echo::EchoProvider;
pub use error::{ProviderError, ProviderResult};
pub use llm::GenaiProvider;
#[cfg(any(test, feature = "mock"))]
pub use mock::{RecordingSynthesizer, RecordingTranscriptSink, ScriptedProvider};
pub use synthesis::{HttpSynthesisProvider, SilentWavSynthesizer};
pub use transcript::LogTranscriptSink;

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Everything a provider needs for one generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

/// A text generation backend.
///
/// Implementations must observe `cancel` cooperatively and return
/// [`ProviderError::Cancelled`] promptly once it fires.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> ProviderResult<String>;
}

/// Text-to-speech backend. Returns encoded audio bytes.
#[async_trait]
pub trait SynthesisProvider: Send + Sync {
    async fn synthesize(&self, text: &str) -> ProviderResult<Vec<u8>>;
}

/// Receives every finalized question/answer pair.
#[async_trait]
pub trait TranscriptSink: Send + Sync {
    async fn record(&self, session_id: &str, question: &str, answer: &str) -> ProviderResult<()>;
}
