use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::cache::TieredCache;
use crate::racer::ProviderRacer;
use crate::session::{SessionConfig, SessionRegistry, SessionServices};

#[derive(Clone)]
pub struct AppState {
    pub services: SessionServices,

    pub session_config: SessionConfig,

    pub registry: Arc<SessionRegistry>,

    /// Parent of every session token; cancelled on server shutdown.
    pub shutdown: CancellationToken,

    pub started_at: Instant,
}

impl AppState {
    pub fn new(services: SessionServices, session_config: SessionConfig) -> Self {
        Self {
            services,
            session_config,
            registry: Arc::new(SessionRegistry::new()),
            shutdown: CancellationToken::new(),
            started_at: Instant::now(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        self.services.engine.cache()
    }

    pub fn racer(&self) -> &Arc<ProviderRacer> {
        self.services.engine.racer()
    }
}
