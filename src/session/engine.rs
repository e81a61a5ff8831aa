use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::cache::{CacheTier, TieredCache};
use crate::racer::{ProviderRacer, RaceError, RaceResult, RaceStrategy};

/// Where an answer came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerSource {
    Cache(CacheTier),
    Provider(String),
    Fallback,
}

impl AnswerSource {
    /// `cache:L0`, `provider:<name>` or `fallback`.
    pub fn label(&self) -> String {
        match self {
            AnswerSource::Cache(tier) => format!("cache:{}", tier),
            AnswerSource::Provider(name) => format!("provider:{}", name),
            AnswerSource::Fallback => "fallback".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub content: String,
    pub source: AnswerSource,
}

impl Answer {
    pub fn fallback(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: AnswerSource::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == AnswerSource::Fallback
    }
}

/// Cache-then-race answer generation shared by every session.
#[derive(Debug)]
pub struct ResponseEngine {
    cache: Arc<TieredCache>,
    racer: Arc<ProviderRacer>,
    strategy: RaceStrategy,
}

impl ResponseEngine {
    pub fn new(cache: Arc<TieredCache>, racer: Arc<ProviderRacer>, strategy: RaceStrategy) -> Self {
        Self {
            cache,
            racer,
            strategy,
        }
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    pub fn racer(&self) -> &Arc<ProviderRacer> {
        &self.racer
    }

    /// Answers a finished `question` from cache or by racing providers. Provider answers
    /// are written to every cache tier.
    ///
    /// Fallback answers are never cached.
    #[instrument(skip(self, question, cancel), fields(question_len = question.len()))]
    pub async fn answer(
        &self,
        question: &str,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> RaceResult<Answer> {
        self.generate(question, session_id, cancel, CacheWrite::All)
            .await
    }

    /// Answers a question that is still being spoken.
    ///
    /// Provider answers go to the exact-match tiers only, so the next, longer version of
    /// the same utterance cannot be served this answer by similarity.
    #[instrument(skip(self, question, cancel), fields(question_len = question.len()))]
    pub async fn preview(
        &self,
        question: &str,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> RaceResult<Answer> {
        self.generate(question, session_id, cancel, CacheWrite::Exact)
            .await
    }

    /// Adds a preview answer that became final to the similarity tiers.
    pub fn promote(&self, question: &str, answer: &Answer, session_id: &str) {
        if let AnswerSource::Provider(_) = answer.source {
            self.cache.set_similar(question, &answer.content, session_id);
        }
    }

    async fn generate(
        &self,
        question: &str,
        session_id: &str,
        cancel: &CancellationToken,
        write: CacheWrite,
    ) -> RaceResult<Answer> {
        if cancel.is_cancelled() {
            return Err(RaceError::Cancelled);
        }

        if let Some(hit) = self.cache.get(question, session_id).await {
            debug!(tier = %hit.tier, "Answered from cache");
            return Ok(Answer {
                content: hit.value,
                source: AnswerSource::Cache(hit.tier),
            });
        }

        if cancel.is_cancelled() {
            return Err(RaceError::Cancelled);
        }

        let result = self.racer.race(question, self.strategy, cancel).await?;
        if result.is_fallback() {
            return Ok(Answer::fallback(result.content));
        }

        match write {
            CacheWrite::All => self.cache.set(question, &result.content, session_id).await,
            CacheWrite::Exact => {
                self.cache
                    .set_exact(question, &result.content, session_id)
                    .await
            }
        }
        Ok(Answer {
            content: result.content,
            source: AnswerSource::Provider(result.provider_name),
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum CacheWrite {
    Exact,
    All,
}
