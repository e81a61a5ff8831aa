//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `MURMUR_*` environment variables.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::ConfigError;

use std::env;
use std::net::IpAddr;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_FINALIZE_WAIT, DEFAULT_L0_CAPACITY, DEFAULT_L0_TTL,
    DEFAULT_L1_TTL, DEFAULT_MIN_PREFIX_CHARS, DEFAULT_PROVIDER_SPECS, DEFAULT_RACE_DEADLINE,
    DEFAULT_RACE_TIMEOUT, DEFAULT_SESSION_IDLE_TTL, DEFAULT_SWEEP_INTERVAL,
    DEFAULT_SYSTEM_PROMPT, EOS_TOKEN, FALLBACK_ANSWER,
};
use crate::racer::{Priority, ProviderConfig, QualityGate, RaceStrategy, RacerConfig};
use crate::session::SessionConfig;

/// Server configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `MURMUR_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port. Default: `8080`.
    pub port: u16,

    /// IP address to bind to. Default: `127.0.0.1`.
    pub bind_addr: IpAddr,

    /// Max entries in the in-process L0 cache. Default: `1000`.
    pub l0_capacity: u64,
    pub l0_ttl: Duration,
    pub l1_ttl: Duration,
    /// Period of the background expiry sweep.
    pub sweep_interval: Duration,
    /// Per-session similarity and popularity data older than this is swept.
    pub session_idle_ttl: Duration,

    /// Audio frame payload size in bytes. Default: `3072`.
    pub chunk_size: usize,

    /// How long end-of-utterance waits for the in-flight attempt.
    pub finalize_wait: Duration,
    pub race_deadline: Duration,
    pub race_timeout: Duration,
    pub race_strategy: RaceStrategy,

    pub min_prefix_chars: usize,
    /// Synthesize preview answers ahead of end-of-utterance.
    pub presynthesize: bool,

    pub providers: Vec<ProviderConfig>,
    pub system_prompt: String,

    /// TTS endpoint. `None` selects the offline silent synthesizer.
    pub tts_url: Option<String>,

    /// Use offline echo providers instead of real upstreams.
    pub mock_provider: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            l0_capacity: DEFAULT_L0_CAPACITY,
            l0_ttl: DEFAULT_L0_TTL,
            l1_ttl: DEFAULT_L1_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            session_idle_ttl: DEFAULT_SESSION_IDLE_TTL,
            chunk_size: DEFAULT_CHUNK_SIZE,
            finalize_wait: DEFAULT_FINALIZE_WAIT,
            race_deadline: DEFAULT_RACE_DEADLINE,
            race_timeout: DEFAULT_RACE_TIMEOUT,
            race_strategy: RaceStrategy::FirstWin,
            min_prefix_chars: DEFAULT_MIN_PREFIX_CHARS,
            presynthesize: true,
            providers: parse_provider_specs(DEFAULT_PROVIDER_SPECS).unwrap_or_default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            tts_url: None,
            mock_provider: false,
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "MURMUR_PORT";
    const ENV_BIND_ADDR: &'static str = "MURMUR_BIND_ADDR";
    const ENV_L0_CAPACITY: &'static str = "MURMUR_L0_CAPACITY";
    const ENV_L0_TTL_SECS: &'static str = "MURMUR_L0_TTL_SECS";
    const ENV_L1_TTL_SECS: &'static str = "MURMUR_L1_TTL_SECS";
    const ENV_SWEEP_INTERVAL_SECS: &'static str = "MURMUR_SWEEP_INTERVAL_SECS";
    const ENV_SESSION_IDLE_SECS: &'static str = "MURMUR_SESSION_IDLE_SECS";
    const ENV_CHUNK_SIZE: &'static str = "MURMUR_CHUNK_SIZE";
    const ENV_FINALIZE_WAIT_MS: &'static str = "MURMUR_FINALIZE_WAIT_MS";
    const ENV_RACE_DEADLINE_MS: &'static str = "MURMUR_RACE_DEADLINE_MS";
    const ENV_RACE_TIMEOUT_MS: &'static str = "MURMUR_RACE_TIMEOUT_MS";
    const ENV_RACE_STRATEGY: &'static str = "MURMUR_RACE_STRATEGY";
    const ENV_MIN_PREFIX_CHARS: &'static str = "MURMUR_MIN_PREFIX_CHARS";
    const ENV_PRESYNTHESIZE: &'static str = "MURMUR_PRESYNTHESIZE";
    const ENV_PROVIDERS: &'static str = "MURMUR_PROVIDERS";
    const ENV_SYSTEM_PROMPT: &'static str = "MURMUR_SYSTEM_PROMPT";
    const ENV_TTS_URL: &'static str = "MURMUR_TTS_URL";
    const ENV_MOCK_PROVIDER: &'static str = "MURMUR_MOCK_PROVIDER";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = Self::parse_port_from_env(defaults.port)?;
        let bind_addr = Self::parse_bind_addr_from_env(defaults.bind_addr)?;
        let l0_capacity = Self::parse_u64_from_env(Self::ENV_L0_CAPACITY, defaults.l0_capacity);
        let l0_ttl = Self::parse_secs_from_env(Self::ENV_L0_TTL_SECS, defaults.l0_ttl);
        let l1_ttl = Self::parse_secs_from_env(Self::ENV_L1_TTL_SECS, defaults.l1_ttl);
        let sweep_interval =
            Self::parse_secs_from_env(Self::ENV_SWEEP_INTERVAL_SECS, defaults.sweep_interval);
        let session_idle_ttl =
            Self::parse_secs_from_env(Self::ENV_SESSION_IDLE_SECS, defaults.session_idle_ttl);
        let chunk_size =
            Self::parse_u64_from_env(Self::ENV_CHUNK_SIZE, defaults.chunk_size as u64) as usize;
        let finalize_wait =
            Self::parse_millis_from_env(Self::ENV_FINALIZE_WAIT_MS, defaults.finalize_wait);
        let race_deadline =
            Self::parse_millis_from_env(Self::ENV_RACE_DEADLINE_MS, defaults.race_deadline);
        let race_timeout =
            Self::parse_millis_from_env(Self::ENV_RACE_TIMEOUT_MS, defaults.race_timeout);
        let race_strategy = Self::parse_strategy_from_env(defaults.race_strategy)?;
        let min_prefix_chars = Self::parse_u64_from_env(
            Self::ENV_MIN_PREFIX_CHARS,
            defaults.min_prefix_chars as u64,
        ) as usize;
        let presynthesize = Self::parse_bool_from_env(Self::ENV_PRESYNTHESIZE, true);
        let providers = match Self::parse_optional_string_from_env(Self::ENV_PROVIDERS) {
            Some(specs) => parse_provider_specs(&specs)?,
            None => defaults.providers,
        };
        let system_prompt =
            Self::parse_string_from_env(Self::ENV_SYSTEM_PROMPT, defaults.system_prompt);
        let tts_url = Self::parse_optional_string_from_env(Self::ENV_TTS_URL);
        let mock_provider = Self::parse_bool_from_env(Self::ENV_MOCK_PROVIDER, false);

        Ok(Self {
            port,
            bind_addr,
            l0_capacity,
            l0_ttl,
            l1_ttl,
            sweep_interval,
            session_idle_ttl,
            chunk_size,
            finalize_wait,
            race_deadline,
            race_timeout,
            race_strategy,
            min_prefix_chars,
            presynthesize,
            providers,
            system_prompt,
            tts_url,
            mock_provider,
        })
    }

    /// Checks invariants that env parsing alone cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize {
                value: self.chunk_size,
            });
        }

        if !self.mock_provider && !self.providers.iter().any(|p| p.enabled) {
            return Err(ConfigError::NoProviders);
        }

        Ok(())
    }

    /// Returns `"{bind_addr}:{port}"` (useful for logging/binding).
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            l0_capacity: self.l0_capacity,
            l0_ttl: self.l0_ttl,
            l1_ttl: self.l1_ttl,
            sweep_interval: self.sweep_interval,
            session_idle_ttl: self.session_idle_ttl,
            ..CacheConfig::default()
        }
    }

    pub fn racer_config(&self) -> RacerConfig {
        RacerConfig {
            deadline: self.race_deadline,
            race_timeout: self.race_timeout,
            quality: QualityGate::default(),
            system_prompt: self.system_prompt.clone(),
            fallback_answer: FALLBACK_ANSWER.to_string(),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            eos_token: EOS_TOKEN.to_string(),
            finalize_wait: self.finalize_wait,
            race_strategy: self.race_strategy,
            presynthesize: self.presynthesize,
            min_prefix_chars: self.min_prefix_chars,
            chunk_size: self.chunk_size,
            fallback_answer: FALLBACK_ANSWER.to_string(),
        }
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_strategy_from_env(default: RaceStrategy) -> Result<RaceStrategy, ConfigError> {
        match Self::parse_optional_string_from_env(Self::ENV_RACE_STRATEGY) {
            Some(value) => value
                .parse()
                .map_err(|value| ConfigError::InvalidStrategy { value }),
            None => Ok(default),
        }
    }

    fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        Self::parse_optional_string_from_env(var_name).unwrap_or(default)
    }

    fn parse_u64_from_env(var_name: &str, default: u64) -> u64 {
        env::var(var_name)
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn parse_secs_from_env(var_name: &str, default: Duration) -> Duration {
        Duration::from_secs(Self::parse_u64_from_env(var_name, default.as_secs()))
    }

    fn parse_millis_from_env(var_name: &str, default: Duration) -> Duration {
        Duration::from_millis(Self::parse_u64_from_env(
            var_name,
            default.as_millis() as u64,
        ))
    }

    fn parse_bool_from_env(var_name: &str, default: bool) -> bool {
        match env::var(var_name) {
            Ok(v) => matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            ),
            Err(_) => default,
        }
    }
}

/// Parses `name:model:priority:max_tokens:timeout_ms` entries separated by `;`.
///
/// The model may itself contain `:` (e.g. `llama3.2:1b`); the first field is the name and
/// the last three are numeric, everything in between is the model.
pub fn parse_provider_specs(specs: &str) -> Result<Vec<ProviderConfig>, ConfigError> {
    specs
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_provider_spec)
        .collect()
}

fn parse_provider_spec(spec: &str) -> Result<ProviderConfig, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidProviderSpec {
        spec: spec.to_string(),
        reason: reason.to_string(),
    };

    let fields: Vec<&str> = spec.split(':').map(str::trim).collect();
    if fields.len() < 5 {
        return Err(invalid("expected name:model:priority:max_tokens:timeout_ms"));
    }

    let n = fields.len();
    let name = fields[0];
    let model = fields[1..n - 3].join(":");
    if name.is_empty() || model.is_empty() {
        return Err(invalid("name and model must be non-empty"));
    }

    let priority = fields[n - 3]
        .parse::<u8>()
        .ok()
        .and_then(Priority::from_rank)
        .ok_or_else(|| invalid("priority must be 1-5"))?;
    let max_tokens = fields[n - 2]
        .parse::<u32>()
        .map_err(|_| invalid("max_tokens must be an integer"))?;
    let timeout_ms = fields[n - 1]
        .parse::<u64>()
        .ok()
        .filter(|ms| *ms > 0)
        .ok_or_else(|| invalid("timeout_ms must be a positive integer"))?;

    Ok(ProviderConfig::new(name, model, priority)
        .with_max_tokens(max_tokens)
        .with_timeout(Duration::from_millis(timeout_ms)))
}
