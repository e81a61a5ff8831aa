use async_trait::async_trait;
use tracing::info;

use super::{ProviderResult, TranscriptSink};

/// Writes finalized exchanges to the `transcript` tracing target.
#[derive(Debug, Clone, Default)]
pub struct LogTranscriptSink;

#[async_trait]
impl TranscriptSink for LogTranscriptSink {
    async fn record(&self, session_id: &str, question: &str, answer: &str) -> ProviderResult<()> {
        info!(target: "transcript", session_id, question, answer, "Exchange finalized");
        Ok(())
    }
}
