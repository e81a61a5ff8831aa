//! Cross-cutting, shared constants.
//!
//! Tuning values (quality gate, similarity thresholds, prefix reuse) live here so the
//! cache, racer and session layers agree on them. Runtime overrides go through
//! [`crate::config::Config`].

use std::time::Duration;

/// Reserved token value that marks end-of-utterance.
pub const EOS_TOKEN: &str = "<eos>";

/// Audio frame payload size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 3072;

/// Bytes of the big-endian chunk index that prefixes every frame.
pub const FRAME_INDEX_BYTES: usize = 4;

/// Bytes of the big-endian total-chunk count carried by frame 0 only.
pub const FRAME_TOTAL_BYTES: usize = 4;

pub const DEFAULT_L0_CAPACITY: u64 = 1000;
pub const DEFAULT_L0_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_L1_TTL: Duration = Duration::from_secs(1800);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Minimum cosine similarity for an L2 hit.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.95;

/// L2/L3 per-session capacity (oldest evicted first).
pub const PER_SESSION_CAPACITY: usize = 50;

/// Sessions keeping their own L2/L3 partitions; the least recently active is dropped beyond it.
pub const MAX_TRACKED_SESSIONS: usize = 10_000;

/// L2/L3 partitions of a session not written for this long are dropped by the sweeper.
pub const DEFAULT_SESSION_IDLE_TTL: Duration = Duration::from_secs(3600);

/// Questions kept in the global L3 table and in each hour-of-day bucket.
pub const POPULAR_TABLE_CAPACITY: usize = 1000;

/// Dimension of the L2 fingerprint vector.
pub const FINGERPRINT_DIM: usize = 100;

/// Only the first N content words contribute to a fingerprint.
pub const FINGERPRINT_MAX_TOKENS: usize = 10;

/// Words ignored when fingerprinting (Korean particles).
pub const FINGERPRINT_STOP_WORDS: &[&str] = &[
    "은", "는", "이", "가", "을", "를", "에", "에서", "와", "과", "의", "로", "으로",
];

/// Jaccard overlap an L3 candidate must exceed.
pub const DEFAULT_OVERLAP_THRESHOLD: f32 = 0.6;

/// Weight applied to a session's own popular questions relative to global ones.
pub const SESSION_POPULARITY_WEIGHT: u64 = 2;

/// How many popular pairs L3 inspects per lookup.
pub const POPULAR_CANDIDATES: usize = 5;

pub const DEFAULT_FINALIZE_WAIT: Duration = Duration::from_millis(3000);
pub const DEFAULT_RACE_DEADLINE: Duration = Duration::from_millis(3000);
pub const DEFAULT_RACE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Minimum trimmed length (chars) of a quality-passing answer.
pub const DEFAULT_MIN_QUALITY_CHARS: usize = 10;

/// More than this many error-pattern hits fails the quality gate.
pub const DEFAULT_MAX_ERROR_PATTERNS: usize = 1;

pub const ERROR_PATTERNS: &[&str] = &["error", "오류", "sorry", "죄송", "cannot", "할 수 없"];

/// Shortest common prefix (chars, trimmed) whose audio is worth reusing.
pub const DEFAULT_MIN_PREFIX_CHARS: usize = 5;

/// Answer returned when every generation path is exhausted.
pub const FALLBACK_ANSWER: &str = "네, 무엇을 도와드릴까요?";

pub const DEFAULT_SYSTEM_PROMPT: &str = "당신은 실시간으로 답변하는 음성 비서입니다. \
20단어 이하로 짧고 자연스럽게 한국어로만 답하세요. 이모지와 영어를 사용하지 마세요.";

/// Default provider table: `name:model:priority:max_tokens:timeout_ms`.
pub const DEFAULT_PROVIDER_SPECS: &str = "gpt35_turbo:gpt-3.5-turbo:1:80:2000;\
gpt4o_mini:gpt-4o-mini:2:120:3000;\
llama32_local:llama3.2:1b:4:60:1000";
