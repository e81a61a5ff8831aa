//! Word-level prefix reuse of synthesized speech.
//!
//! Successive preview answers for one utterance tend to share their opening words.
//! Audio already synthesized for those words is reused and only the remainder is
//! synthesized.


use std::sync::Arc;

/// Longest common prefix of `previous` and `current`, compared word by word.
///
/// Words are whitespace-separated and must match exactly. Matched words are joined with
/// a single space; an empty `previous` yields an empty prefix.
pub fn common_prefix(previous: &str, current: &str) -> String {
    previous
        .split_whitespace()
        .zip(current.split_whitespace())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a)
        .collect::<Vec<_>>()
        .join(" ")
}

/// A piece of text together with its synthesized audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechSegment {
    pub text: String,
    pub audio: Arc<[u8]>,
}

impl SpeechSegment {
    pub fn new(text: impl Into<String>, audio: Vec<u8>) -> Self {
        Self {
            text: text.into(),
            audio: Arc::from(audio),
        }
    }

    fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// How to produce speech for an answer given previously synthesized segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechPlan {
    /// The answer is exactly the previous segments; nothing to synthesize.
    Replay(Vec<SpeechSegment>),
    /// Reuse leading segments and synthesize only `suffix`.
    Extend {
        reused: Vec<SpeechSegment>,
        suffix: String,
    },
    /// Synthesize the whole answer.
    Full(String),
}

impl SpeechPlan {
    /// Text that still needs synthesis, if any.
    pub fn pending_text(&self) -> Option<&str> {
        match self {
            SpeechPlan::Replay(_) => None,
            SpeechPlan::Extend { suffix, .. } => Some(suffix),
            SpeechPlan::Full(text) => Some(text),
        }
    }
}

/// Reconciles `answer` against `previous` segments.
///
/// Reuse happens only at segment boundaries: a segment is reused when all of its words
/// lie inside the common prefix, and only when that prefix is at least
/// `min_prefix_chars` long (trimmed).
pub fn plan_speech(previous: &[SpeechSegment], answer: &str, min_prefix_chars: usize) -> SpeechPlan {
    let answer = answer.trim();
    let previous_text = previous
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let prefix = common_prefix(&previous_text, answer);
    if prefix.is_empty() || prefix.chars().count() < min_prefix_chars {
        return SpeechPlan::Full(answer.to_string());
    }

    let prefix_words = prefix.split_whitespace().count();
    let mut covered = 0;
    let mut reused = Vec::new();
    for segment in previous {
        let words = segment.word_count();
        if covered + words > prefix_words {
            break;
        }
        covered += words;
        reused.push(segment.clone());
    }

    if reused.is_empty() {
        return SpeechPlan::Full(answer.to_string());
    }

    let suffix = answer
        .split_whitespace()
        .skip(covered)
        .collect::<Vec<_>>()
        .join(" ");

    if suffix.is_empty() {
        SpeechPlan::Replay(reused)
    } else {
        SpeechPlan::Extend { reused, suffix }
    }
}
