use crate::constants::{DEFAULT_MAX_ERROR_PATTERNS, DEFAULT_MIN_QUALITY_CHARS, ERROR_PATTERNS};

/// Minimal content check a provider answer must pass to win a first-win race.
#[derive(Debug, Clone)]
pub struct QualityGate {
    pub min_chars: usize,
    pub max_error_patterns: usize,
    pub error_patterns: Vec<String>,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self {
            min_chars: DEFAULT_MIN_QUALITY_CHARS,
            max_error_patterns: DEFAULT_MAX_ERROR_PATTERNS,
            error_patterns: ERROR_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl QualityGate {
    pub fn passes(&self, content: &str) -> bool {
        let trimmed = content.trim();
        if trimmed.is_empty() || trimmed.chars().count() < self.min_chars {
            return false;
        }
        self.error_hits(trimmed) <= self.max_error_patterns
    }

    /// Number of distinct error patterns present (case-insensitive).
    pub fn error_hits(&self, content: &str) -> usize {
        let lowered = content.to_lowercase();
        self.error_patterns
            .iter()
            .filter(|p| lowered.contains(p.as_str()))
            .count()
    }
}
