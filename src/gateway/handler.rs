use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use crate::cache::{CacheStatsSnapshot, PopularQuestion};
use crate::gateway::state::AppState;
use crate::racer::RaceStatsSnapshot;
use crate::session::SessionSummary;

/// Popular questions reported by `/v1/stats`.
const TRENDING_LIMIT: usize = 10;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub uptime_secs: u64,
    pub active_sessions: usize,
    pub sessions: Vec<SessionSummary>,
    pub cache: CacheStatsSnapshot,
    pub race: RaceStatsSnapshot,
    /// Most asked questions in the current hour of day.
    pub trending: Vec<PopularQuestion>,
}

#[instrument(skip(state))]
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let sessions = state.registry.summaries();
    Json(StatsResponse {
        uptime_secs: state.started_at.elapsed().as_secs(),
        active_sessions: sessions.len(),
        sessions,
        cache: state.cache().stats(),
        race: state.racer().stats(),
        trending: state.cache().trending_now(TRENDING_LIMIT),
    })
}
