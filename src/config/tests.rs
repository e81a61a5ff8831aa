use super::*;
use serial_test::serial;
use std::env;
use std::net::IpAddr;

const ALL_VARS: &[&str] = &[
    "MURMUR_PORT",
    "MURMUR_BIND_ADDR",
    "MURMUR_L0_CAPACITY",
    "MURMUR_L0_TTL_SECS",
    "MURMUR_L1_TTL_SECS",
    "MURMUR_SWEEP_INTERVAL_SECS",
    "MURMUR_SESSION_IDLE_SECS",
    "MURMUR_CHUNK_SIZE",
    "MURMUR_FINALIZE_WAIT_MS",
    "MURMUR_RACE_DEADLINE_MS",
    "MURMUR_RACE_TIMEOUT_MS",
    "MURMUR_RACE_STRATEGY",
    "MURMUR_MIN_PREFIX_CHARS",
    "MURMUR_PRESYNTHESIZE",
    "MURMUR_PROVIDERS",
    "MURMUR_SYSTEM_PROMPT",
    "MURMUR_TTS_URL",
    "MURMUR_MOCK_PROVIDER",
];

fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, value) in vars {
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, _) in vars {
        unsafe { env::remove_var(key) };
    }

    result
}

fn clear_murmur_env() {
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    unsafe {
        for key in ALL_VARS {
            env::remove_var(key);
        }
    }
}

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.port, 8080);
    assert_eq!(
        config.bind_addr,
        IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1))
    );
    assert_eq!(config.l0_capacity, 1000);
    assert_eq!(config.l0_ttl, Duration::from_secs(3600));
    assert_eq!(config.l1_ttl, Duration::from_secs(1800));
    assert_eq!(config.chunk_size, 3072);
    assert_eq!(config.finalize_wait, Duration::from_millis(3000));
    assert_eq!(config.race_strategy, RaceStrategy::FirstWin);
    assert_eq!(config.min_prefix_chars, 5);
    assert!(config.presynthesize);
    assert!(config.tts_url.is_none());
    assert!(!config.mock_provider);
    assert_eq!(config.providers.len(), 3);
}

#[test]
fn test_default_provider_table() {
    let providers = Config::default().providers;

    assert_eq!(providers[0].name, "gpt35_turbo");
    assert_eq!(providers[0].priority, Priority::Fast);
    assert_eq!(providers[0].max_tokens, 80);
    assert_eq!(providers[1].priority, Priority::Balanced);
    assert_eq!(providers[2].model, "llama3.2:1b");
    assert_eq!(providers[2].priority, Priority::Local);
    assert_eq!(providers[2].timeout, Duration::from_millis(1000));
}

#[test]
fn test_socket_addr() {
    let config = Config::default();
    assert_eq!(config.socket_addr(), "127.0.0.1:8080");

    let config = Config {
        port: 3000,
        bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        ..Default::default()
    };
    assert_eq!(config.socket_addr(), "0.0.0.0:3000");
}

#[test]
#[serial]
fn test_from_env_with_defaults() {
    clear_murmur_env();

    let config = Config::from_env().expect("should parse with defaults");

    assert_eq!(config.port, 8080);
    assert_eq!(config.chunk_size, 3072);
    assert_eq!(config.providers.len(), 3);
}

#[test]
#[serial]
fn test_from_env_custom_port() {
    clear_murmur_env();

    with_env_vars(&[("MURMUR_PORT", "3000")], || {
        let config = Config::from_env().expect("should parse");
        assert_eq!(config.port, 3000);
    });
}

#[test]
#[serial]
fn test_from_env_ipv6_bind_addr() {
    clear_murmur_env();

    with_env_vars(&[("MURMUR_BIND_ADDR", "::1")], || {
        let config = Config::from_env().expect("should parse");
        assert_eq!(
            config.bind_addr,
            IpAddr::V6(std::net::Ipv6Addr::new(0, 0, 0, 0, 0, 0, 0, 1))
        );
    });
}

#[test]
#[serial]
fn test_from_env_port_zero_rejected() {
    clear_murmur_env();

    with_env_vars(&[("MURMUR_PORT", "0")], || {
        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidPort { .. })));
    });
}

#[test]
#[serial]
fn test_from_env_port_not_a_number() {
    clear_murmur_env();

    with_env_vars(&[("MURMUR_PORT", "eighty")], || {
        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::PortParseError { .. })));
    });
}

#[test]
#[serial]
fn test_from_env_invalid_bind_addr() {
    clear_murmur_env();

    with_env_vars(&[("MURMUR_BIND_ADDR", "not-an-ip")], || {
        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidBindAddr { .. })));
    });
}

#[test]
#[serial]
fn test_from_env_timings_and_sizes() {
    clear_murmur_env();

    with_env_vars(
        &[
            ("MURMUR_L0_CAPACITY", "50"),
            ("MURMUR_L0_TTL_SECS", "10"),
            ("MURMUR_SESSION_IDLE_SECS", "120"),
            ("MURMUR_CHUNK_SIZE", "1024"),
            ("MURMUR_FINALIZE_WAIT_MS", "250"),
            ("MURMUR_RACE_DEADLINE_MS", "900"),
            ("MURMUR_MIN_PREFIX_CHARS", "8"),
        ],
        || {
            let config = Config::from_env().expect("should parse");
            assert_eq!(config.l0_capacity, 50);
            assert_eq!(config.l0_ttl, Duration::from_secs(10));
            assert_eq!(config.session_idle_ttl, Duration::from_secs(120));
            assert_eq!(
                config.cache_config().session_idle_ttl,
                Duration::from_secs(120)
            );
            assert_eq!(config.chunk_size, 1024);
            assert_eq!(config.finalize_wait, Duration::from_millis(250));
            assert_eq!(config.race_deadline, Duration::from_millis(900));
            assert_eq!(config.min_prefix_chars, 8);
        },
    );
}

#[test]
#[serial]
fn test_from_env_unparseable_numbers_fall_back() {
    clear_murmur_env();

    with_env_vars(&[("MURMUR_L0_CAPACITY", "lots")], || {
        let config = Config::from_env().expect("should parse");
        assert_eq!(config.l0_capacity, 1000);
    });
}

#[test]
#[serial]
fn test_from_env_strategy() {
    clear_murmur_env();

    with_env_vars(&[("MURMUR_RACE_STRATEGY", "race_with_timeout")], || {
        let config = Config::from_env().expect("should parse");
        assert_eq!(config.race_strategy, RaceStrategy::RaceWithTimeout);
    });

    with_env_vars(&[("MURMUR_RACE_STRATEGY", "fastest")], || {
        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidStrategy { .. })));
    });
}

#[test]
#[serial]
fn test_from_env_flags() {
    clear_murmur_env();

    with_env_vars(
        &[
            ("MURMUR_PRESYNTHESIZE", "false"),
            ("MURMUR_MOCK_PROVIDER", "1"),
            ("MURMUR_TTS_URL", " http://tts.local/v1/speech "),
        ],
        || {
            let config = Config::from_env().expect("should parse");
            assert!(!config.presynthesize);
            assert!(config.mock_provider);
            assert_eq!(config.tts_url.as_deref(), Some("http://tts.local/v1/speech"));
        },
    );
}

#[test]
#[serial]
fn test_from_env_providers() {
    clear_murmur_env();

    with_env_vars(&[("MURMUR_PROVIDERS", "fast:gpt-4o-mini:1:60:800")], || {
        let config = Config::from_env().expect("should parse");
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].name, "fast");
        assert_eq!(config.providers[0].model, "gpt-4o-mini");
        assert_eq!(config.providers[0].timeout, Duration::from_millis(800));
    });

    with_env_vars(&[("MURMUR_PROVIDERS", "broken:model")], || {
        let result = Config::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidProviderSpec { .. })
        ));
    });
}

#[test]
fn test_parse_provider_specs_rejects_bad_fields() {
    assert!(parse_provider_specs("a:m:9:10:100").is_err());
    assert!(parse_provider_specs("a:m:0:10:100").is_err());
    assert!(parse_provider_specs("a:m:1:many:100").is_err());
    assert!(parse_provider_specs("a:m:1:10:0").is_err());
    assert!(parse_provider_specs(":m:1:10:100").is_err());
    assert!(parse_provider_specs(" ; ").unwrap().is_empty());
}

#[test]
fn test_parse_provider_specs_accepts_fallback_tier() {
    let providers = parse_provider_specs("backup:tiny-model:5:40:500").unwrap();

    assert_eq!(providers[0].priority, Priority::Fallback);
    assert_eq!(providers[0].model, "tiny-model");
}

#[test]
fn test_validate_rejects_zero_chunk_size() {
    let config = Config {
        chunk_size: 0,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidChunkSize { value: 0 })
    ));
}

#[test]
fn test_validate_requires_providers_unless_mocked() {
    let config = Config {
        providers: Vec::new(),
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::NoProviders)));

    let mocked = Config {
        providers: Vec::new(),
        mock_provider: true,
        ..Default::default()
    };
    assert!(mocked.validate().is_ok());
    assert!(Config::default().validate().is_ok());
}

#[test]
fn test_derived_configs() {
    let config = Config {
        l0_capacity: 7,
        race_deadline: Duration::from_millis(1234),
        chunk_size: 512,
        ..Default::default()
    };

    assert_eq!(config.cache_config().l0_capacity, 7);
    assert_eq!(config.racer_config().deadline, Duration::from_millis(1234));
    let session = config.session_config();
    assert_eq!(session.chunk_size, 512);
    assert_eq!(session.eos_token, "<eos>");
}
