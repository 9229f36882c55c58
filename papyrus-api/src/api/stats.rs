use axum::{Json, extract::State};
use serde::Serialize;

use crate::core::{cache::CacheStats, state::AppState};

#[derive(Debug, Serialize)]
pub struct SystemStats {
    pub caches: Vec<CacheStats>,
    pub version: &'static str,
}

pub async fn get_stats(State(state): State<AppState>) -> Json<SystemStats> {
    Json(SystemStats {
        caches: state.cache_stats(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn health_check() -> &'static str {
    "OK"
}
