use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::{
    GenerationProvider, GenerationRequest, ProviderError, ProviderResult, SynthesisProvider,
    TranscriptSink,
};

#[derive(Debug, Clone)]
enum Script {
    Reply(String),
    Echo,
    Fail(String),
}

/// Deterministic provider for tests: fixed latency, fixed outcome, counted calls.
#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    script: Script,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    cancellations: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProvider {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            cancellations: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn replying(content: impl Into<String>) -> Self {
        Self::with_script(Script::Reply(content.into()))
    }

    /// Answers `"answer to <prompt>"`.
    pub fn echoing() -> Self {
        Self::with_script(Script::Echo)
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_script(Script::Fail(message.into()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls that observed their cancellation token before finishing.
    pub fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> ProviderResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(request.prompt.clone());

        tokio::select! {
            _ = cancel.cancelled() => {
                self.cancellations.fetch_add(1, Ordering::SeqCst);
                return Err(ProviderError::Cancelled);
            }
            _ = tokio::time::sleep(self.delay) => {}
        }

        match &self.script {
            Script::Reply(content) => Ok(content.clone()),
            Script::Echo => Ok(format!("answer to {}", request.prompt)),
            Script::Fail(message) => Err(ProviderError::Upstream(message.clone())),
        }
    }
}

/// Synthesizer whose "audio" is the UTF-8 text itself, recording every request.
#[derive(Debug, Clone, Default)]
pub struct RecordingSynthesizer {
    requests: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl RecordingSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl SynthesisProvider for RecordingSynthesizer {
    async fn synthesize(&self, text: &str) -> ProviderResult<Vec<u8>> {
        self.requests.lock().push(text.to_string());
        if self.fail {
            return Err(ProviderError::SynthesisStatus { status: 503 });
        }
        Ok(text.as_bytes().to_vec())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingTranscriptSink {
    records: Arc<Mutex<Vec<(String, String, String)>>>,
}

impl RecordingTranscriptSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(session_id, question, answer)` triples in arrival order.
    pub fn records(&self) -> Vec<(String, String, String)> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl TranscriptSink for RecordingTranscriptSink {
    async fn record(&self, session_id: &str, question: &str, answer: &str) -> ProviderResult<()> {
        self.records.lock().push((
            session_id.to_string(),
            question.to_string(),
            answer.to_string(),
        ));
        Ok(())
    }
}
