//! Murmur server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use murmur::cache::TieredCache;
use murmur::config::Config;
use murmur::gateway::{AppState, create_router_with_state};
use murmur::provider::{
    EchoProvider, GenaiProvider, GenerationProvider, HttpSynthesisProvider, LogTranscriptSink,
    SilentWavSynthesizer, SynthesisProvider,
};
use murmur::racer::{Priority, ProviderConfig, ProviderRacer};
use murmur::session::{ResponseEngine, SessionServices};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check());
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        strategy = %config.race_strategy,
        mock_provider = config.mock_provider,
        "Murmur starting"
    );

    let shutdown = CancellationToken::new();

    let cache = Arc::new(TieredCache::in_memory(config.cache_config()));
    let sweeper = cache.spawn_sweeper(shutdown.child_token());

    let racer = Arc::new(build_racer(&config));
    let synthesizer: Arc<dyn SynthesisProvider> = match &config.tts_url {
        Some(url) => {
            tracing::info!(url = %url, "Using HTTP speech synthesis");
            Arc::new(HttpSynthesisProvider::new(url.clone(), SYNTHESIS_TIMEOUT)?)
        }
        None => {
            tracing::warn!("No MURMUR_TTS_URL configured, synthesizing silence");
            Arc::new(SilentWavSynthesizer::new())
        }
    };

    let services = SessionServices {
        engine: Arc::new(ResponseEngine::new(cache, racer, config.race_strategy)),
        synthesizer,
        transcript: Arc::new(LogTranscriptSink),
    };
    let state = AppState::new(services, config.session_config()).with_shutdown(shutdown.clone());

    let app = create_router_with_state(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!("Cache sweeper ended abnormally: {}", e);
    }

    tracing::info!("Murmur shutdown complete");
    Ok(())
}

fn build_racer(config: &Config) -> ProviderRacer {
    let mut racer = ProviderRacer::new(config.racer_config());

    if config.mock_provider {
        tracing::warn!("MURMUR_MOCK_PROVIDER set, answering with the echo provider");
        racer.register(
            ProviderConfig::new("echo", "echo", Priority::Fast),
            Arc::new(EchoProvider::new().with_delay(Duration::from_millis(150))),
        );
        return racer;
    }

    let client = genai::Client::default();
    for provider in &config.providers {
        let backend: Arc<dyn GenerationProvider> =
            Arc::new(GenaiProvider::new(client.clone(), provider.model.clone()));
        racer.register(provider.clone(), backend);
    }
    racer
}

fn run_health_check() -> i32 {
    let port = std::env::var("MURMUR_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let url = format!("http://127.0.0.1:{}/healthz", port);

    let Ok(rt) = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    else {
        return 1;
    };

    rt.block_on(async {
        let Ok(client) = reqwest::Client::builder()
            .timeout(Duration::from_secs(1))
            .build()
        else {
            return 1;
        };

        match client.get(&url).send().await {
            Ok(res) if res.status().is_success() => 0,
            _ => 1,
        }
    })
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }

    // ends every open session; upgraded sockets are not tracked by graceful shutdown
    shutdown.cancel();
}
