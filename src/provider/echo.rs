use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{GenerationProvider, GenerationRequest, ProviderError, ProviderResult};

/// Offline provider used in mock mode: answers with a canned echo of the prompt.
#[derive(Debug, Clone, Default)]
pub struct EchoProvider {
    delay: Duration,
}

impl EchoProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated generation latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl GenerationProvider for EchoProvider {
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> ProviderResult<String> {
        if !self.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                _ = tokio::time::sleep(self.delay) => {}
            }
        }
        Ok(format!("Mock response for: {}", request.prompt.trim()))
    }
}
