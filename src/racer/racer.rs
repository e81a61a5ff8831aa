use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::error::{RaceError, RaceResult};
use super::quality::QualityGate;
use super::types::{ProviderConfig, ProviderResult, RaceStrategy};
use crate::constants::{
    DEFAULT_RACE_DEADLINE, DEFAULT_RACE_TIMEOUT, DEFAULT_SYSTEM_PROMPT, FALLBACK_ANSWER,
};
use crate::provider::{GenerationProvider, GenerationRequest, ProviderError};

/// Tunables for [`ProviderRacer`].
#[derive(Debug, Clone)]
pub struct RacerConfig {
    /// Hard bound of a first-win race.
    pub deadline: Duration,
    /// Collection window of a race-with-timeout race.
    pub race_timeout: Duration,
    pub quality: QualityGate,
    pub system_prompt: String,
    pub fallback_answer: String,
}

impl Default for RacerConfig {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_RACE_DEADLINE,
            race_timeout: DEFAULT_RACE_TIMEOUT,
            quality: QualityGate::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            fallback_answer: FALLBACK_ANSWER.to_string(),
        }
    }
}

struct RegisteredProvider {
    config: ProviderConfig,
    backend: Arc<dyn GenerationProvider>,
}

/// Race bookkeeping. Counters only ever grow.
#[derive(Default)]
struct RaceStats {
    total_races: AtomicU64,
    provider_failures: AtomicU64,
    cancelled_calls: AtomicU64,
    fallbacks: AtomicU64,
    wins: Mutex<HashMap<String, u64>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RaceStatsSnapshot {
    pub total_races: u64,
    pub provider_failures: u64,
    pub cancelled_calls: u64,
    pub fallbacks: u64,
    pub wins: HashMap<String, u64>,
}

enum RaceEnd {
    Winner(ProviderResult),
    Deadline,
    Exhausted,
    Cancelled,
}

/// Runs the same prompt against several providers concurrently and picks one answer.
///
/// Losing calls are cancelled through their tokens and detached; they never block the
/// caller past the race bound.
pub struct ProviderRacer {
    providers: Vec<RegisteredProvider>,
    config: RacerConfig,
    stats: RaceStats,
}

impl std::fmt::Debug for ProviderRacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRacer")
            .field(
                "providers",
                &self
                    .providers
                    .iter()
                    .map(|p| p.config.name.as_str())
                    .collect::<Vec<_>>(),
            )
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ProviderRacer {
    pub fn new(config: RacerConfig) -> Self {
        Self {
            providers: Vec::new(),
            config,
            stats: RaceStats::default(),
        }
    }

    pub fn with_provider(
        mut self,
        config: ProviderConfig,
        backend: Arc<dyn GenerationProvider>,
    ) -> Self {
        self.register(config, backend);
        self
    }

    pub fn register(&mut self, config: ProviderConfig, backend: Arc<dyn GenerationProvider>) {
        info!(
            provider = %config.name,
            model = %config.model,
            priority = config.priority.rank(),
            enabled = config.enabled,
            "Registered provider"
        );
        self.providers.push(RegisteredProvider { config, backend });
    }

    pub fn enabled_count(&self) -> usize {
        self.providers.iter().filter(|p| p.config.enabled).count()
    }

    pub fn config(&self) -> &RacerConfig {
        &self.config
    }

    pub fn stats(&self) -> RaceStatsSnapshot {
        RaceStatsSnapshot {
            total_races: self.stats.total_races.load(Ordering::Relaxed),
            provider_failures: self.stats.provider_failures.load(Ordering::Relaxed),
            cancelled_calls: self.stats.cancelled_calls.load(Ordering::Relaxed),
            fallbacks: self.stats.fallbacks.load(Ordering::Relaxed),
            wins: self.stats.wins.lock().clone(),
        }
    }

    /// Races every enabled provider on `prompt`.
    ///
    /// Always yields an answer (a provider's or the fallback) unless `cancel` fires first.
    #[instrument(skip(self, prompt, cancel), fields(strategy = %strategy))]
    pub async fn race(
        &self,
        prompt: &str,
        strategy: RaceStrategy,
        cancel: &CancellationToken,
    ) -> RaceResult<ProviderResult> {
        let started = Instant::now();
        self.stats.total_races.fetch_add(1, Ordering::Relaxed);

        if cancel.is_cancelled() {
            return Err(RaceError::Cancelled);
        }

        let race_token = cancel.child_token();
        let mut tasks = JoinSet::new();
        for provider in self.providers.iter().filter(|p| p.config.enabled) {
            let backend = Arc::clone(&provider.backend);
            let config = provider.config.clone();
            let request = GenerationRequest {
                system_prompt: self.config.system_prompt.clone(),
                prompt: prompt.to_string(),
                max_tokens: config.max_tokens,
                timeout: config.timeout,
            };
            let token = race_token.child_token();
            tasks.spawn(async move { call_provider(backend, config, request, token).await });
        }

        if tasks.is_empty() {
            warn!("No enabled providers; answering with fallback");
            return Ok(self.fallback(started));
        }

        let bound = match strategy {
            RaceStrategy::FirstWin => self.config.deadline,
            RaceStrategy::RaceWithTimeout => self.config.race_timeout,
        };
        let deadline = tokio::time::sleep(bound);
        tokio::pin!(deadline);

        let mut completed: Vec<ProviderResult> = Vec::new();
        let end = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break RaceEnd::Cancelled,
                _ = &mut deadline => break RaceEnd::Deadline,
                joined = tasks.join_next() => match joined {
                    None => break RaceEnd::Exhausted,
                    Some(Ok(result)) => {
                        if !result.success {
                            self.stats.provider_failures.fetch_add(1, Ordering::Relaxed);
                        } else if strategy == RaceStrategy::FirstWin
                            && self.config.quality.passes(&result.content)
                        {
                            break RaceEnd::Winner(result);
                        }
                        completed.push(result);
                    }
                    Some(Err(e)) => {
                        warn!("Provider task failed to join: {}", e);
                        self.stats.provider_failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        };

        let still_running = tasks.len() as u64;
        race_token.cancel();
        tasks.detach_all();
        if still_running > 0 {
            self.stats
                .cancelled_calls
                .fetch_add(still_running, Ordering::Relaxed);
            debug!(cancelled = still_running, "Cancelled losing providers");
        }

        let chosen = match end {
            RaceEnd::Cancelled => return Err(RaceError::Cancelled),
            RaceEnd::Winner(result) => Some(result),
            RaceEnd::Deadline | RaceEnd::Exhausted => match strategy {
                RaceStrategy::FirstWin => best_by_priority(completed, |r| r.success),
                RaceStrategy::RaceWithTimeout => {
                    best_by_priority(completed, |r| self.config.quality.passes(&r.content))
                }
            },
        };

        match chosen {
            Some(result) => {
                *self
                    .stats
                    .wins
                    .lock()
                    .entry(result.provider_name.clone())
                    .or_insert(0) += 1;
                info!(
                    provider = %result.provider_name,
                    provider_latency_ms = result.latency.as_millis() as u64,
                    race_ms = started.elapsed().as_millis() as u64,
                    "Race won"
                );
                Ok(result)
            }
            None => {
                warn!(race_ms = started.elapsed().as_millis() as u64, "No usable provider result");
                Ok(self.fallback(started))
            }
        }
    }

    fn fallback(&self, started: Instant) -> ProviderResult {
        self.stats.fallbacks.fetch_add(1, Ordering::Relaxed);
        ProviderResult::fallback(self.config.fallback_answer.clone(), started.elapsed())
    }
}

/// Lowest priority rank first, then lowest latency.
fn best_by_priority(
    results: Vec<ProviderResult>,
    eligible: impl Fn(&ProviderResult) -> bool,
) -> Option<ProviderResult> {
    results
        .into_iter()
        .filter(|r| r.success && eligible(r))
        .min_by_key(|r| (r.priority, r.latency))
}

async fn call_provider(
    backend: Arc<dyn GenerationProvider>,
    config: ProviderConfig,
    request: GenerationRequest,
    cancel: CancellationToken,
) -> ProviderResult {
    let started = Instant::now();
    let outcome = match tokio::time::timeout(config.timeout, backend.generate(&request, &cancel))
        .await
    {
        Ok(outcome) => outcome,
        Err(_) => Err(ProviderError::Timeout {
            elapsed_ms: started.elapsed().as_millis() as u64,
        }),
    };
    let latency = started.elapsed();

    match outcome {
        Ok(content) if !content.trim().is_empty() => {
            debug!(provider = %config.name, latency_ms = latency.as_millis() as u64, "Provider answered");
            ProviderResult::success(config.name, config.priority, content, latency)
        }
        Ok(_) => ProviderResult::failure(
            config.name,
            config.priority,
            ProviderError::EmptyResponse.to_string(),
            latency,
        ),
        Err(ProviderError::Cancelled) => {
            debug!(provider = %config.name, "Provider call cancelled");
            ProviderResult::failure(
                config.name,
                config.priority,
                ProviderError::Cancelled.to_string(),
                latency,
            )
        }
        Err(e) => {
            warn!(provider = %config.name, error = %e, "Provider call failed");
            ProviderResult::failure(config.name, config.priority, e.to_string(), latency)
        }
    }
}
