use std::time::Duration;

use crate::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_FINALIZE_WAIT, DEFAULT_MIN_PREFIX_CHARS, EOS_TOKEN,
    FALLBACK_ANSWER,
};
use crate::racer::RaceStrategy;

/// Per-connection behaviour of a [`super::SessionController`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Token value that ends an utterance.
    pub eos_token: String,
    /// Upper bound on waiting for the in-flight attempt at end-of-utterance.
    pub finalize_wait: Duration,
    pub race_strategy: RaceStrategy,
    /// Synthesize preview answers before end-of-utterance.
    pub presynthesize: bool,
    pub min_prefix_chars: usize,
    pub chunk_size: usize,
    pub fallback_answer: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            eos_token: EOS_TOKEN.to_string(),
            finalize_wait: DEFAULT_FINALIZE_WAIT,
            race_strategy: RaceStrategy::FirstWin,
            presynthesize: true,
            min_prefix_chars: DEFAULT_MIN_PREFIX_CHARS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            fallback_answer: FALLBACK_ANSWER.to_string(),
        }
    }
}
