use async_trait::async_trait;
use futures_util::StreamExt;
use genai::Client;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest, ChatStreamEvent};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::{GenerationProvider, GenerationRequest, ProviderError, ProviderResult};

/// [`GenerationProvider`] backed by a `genai` client and one model name.
///
/// Uses the streaming API so cancellation is observed between chunks instead of
/// only after the whole completion arrives.
#[derive(Clone)]
pub struct GenaiProvider {
    client: Client,
    model: String,
}

impl GenaiProvider {
    pub fn new(client: Client, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(request: &GenerationRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if !request.system_prompt.is_empty() {
            messages.push(ChatMessage::system(request.system_prompt.clone()));
        }
        messages.push(ChatMessage::user(request.prompt.clone()));
        ChatRequest::new(messages)
    }
}

impl std::fmt::Debug for GenaiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenaiProvider")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl GenerationProvider for GenaiProvider {
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> ProviderResult<String> {
        let chat_req = Self::build_request(request);
        let options = ChatOptions::default().with_max_tokens(request.max_tokens);

        let stream_resp = tokio::select! {
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            resp = self.client.exec_chat_stream(&self.model, chat_req, Some(&options)) => {
                resp.map_err(|e| {
                    error!(model = %self.model, "Provider stream init error: {}", e);
                    ProviderError::Upstream(e.to_string())
                })?
            }
        };

        let mut stream = std::pin::pin!(stream_resp.stream);
        let mut content = String::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(model = %self.model, received = content.len(), "Generation cancelled mid-stream");
                    return Err(ProviderError::Cancelled);
                }
                event = stream.next() => match event {
                    Some(Ok(ChatStreamEvent::Chunk(chunk))) => content.push_str(&chunk.content),
                    Some(Ok(ChatStreamEvent::End(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(model = %self.model, "Stream error: {}", e);
                        return Err(ProviderError::Upstream(e.to_string()));
                    }
                }
            }
        }

        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(content)
    }
}
