use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

/// Provider tier. Lower rank wins ties when results are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Fast = 1,
    Balanced = 2,
    Accurate = 3,
    Local = 4,
    Fallback = 5,
}

impl Priority {
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn from_rank(rank: u8) -> Option<Self> {
        match rank {
            1 => Some(Self::Fast),
            2 => Some(Self::Balanced),
            3 => Some(Self::Accurate),
            4 => Some(Self::Local),
            5 => Some(Self::Fallback),
            _ => None,
        }
    }
}

/// How a race decides its winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceStrategy {
    /// First quality-passing result wins; the rest are cancelled.
    #[default]
    FirstWin,
    /// Collect until a fixed timeout, then rank quality-passing results by priority.
    RaceWithTimeout,
}

impl RaceStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstWin => "first_win",
            Self::RaceWithTimeout => "race_with_timeout",
        }
    }
}

impl fmt::Display for RaceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RaceStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first_win" | "first-win" => Ok(Self::FirstWin),
            "race_with_timeout" | "race-with-timeout" | "timeout" => Ok(Self::RaceWithTimeout),
            other => Err(other.to_string()),
        }
    }
}

/// Static description of one racing provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub name: String,
    pub model: String,
    pub priority: Priority,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub enabled: bool,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, model: impl Into<String>, priority: Priority) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            priority,
            max_tokens: 100,
            timeout: Duration::from_secs(2),
            enabled: true,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Outcome of one provider call (or the synthesized fallback).
#[derive(Debug, Clone, Serialize)]
pub struct ProviderResult {
    pub content: String,
    pub provider_name: String,
    pub priority: Priority,
    #[serde(rename = "latency_ms", serialize_with = "serialize_millis")]
    pub latency: Duration,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set only on the racer's own fallback sentence, never on a provider's answer.
    #[serde(skip)]
    pub synthetic: bool,
}

impl ProviderResult {
    pub fn success(
        provider_name: impl Into<String>,
        priority: Priority,
        content: String,
        latency: Duration,
    ) -> Self {
        Self {
            content,
            provider_name: provider_name.into(),
            priority,
            latency,
            success: true,
            error: None,
            synthetic: false,
        }
    }

    pub fn failure(
        provider_name: impl Into<String>,
        priority: Priority,
        error: impl Into<String>,
        latency: Duration,
    ) -> Self {
        Self {
            content: String::new(),
            provider_name: provider_name.into(),
            priority,
            latency,
            success: false,
            error: Some(error.into()),
            synthetic: false,
        }
    }

    pub fn fallback(content: impl Into<String>, latency: Duration) -> Self {
        Self {
            content: content.into(),
            provider_name: FALLBACK_PROVIDER.to_string(),
            priority: Priority::Fallback,
            latency,
            success: true,
            error: None,
            synthetic: true,
        }
    }

    /// True for the racer's fallback sentence. A configured fallback-tier provider
    /// that wins is a real answer.
    pub fn is_fallback(&self) -> bool {
        self.synthetic
    }
}

/// Provider name reported for synthesized fallback answers.
pub const FALLBACK_PROVIDER: &str = "fallback";

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}
