use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub rate_limit_buckets: usize,
}

#[derive(Serialize, Deserialize)]
pub struct WhitelistView {
    pub entries: Vec<String>,
}

#[derive(Deserialize)]
pub struct WhitelistEdit {
    pub ip: String,
}

#[derive(Serialize)]
pub struct RateLimitStats {
    pub buckets: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        rate_limit_buckets: state.security.rate_limiter.bucket_count(),
    })
}

pub async fn get_whitelist(State(state): State<AppState>) -> Json<WhitelistView> {
    Json(WhitelistView {
        entries: state.security.whitelist.entries(),
    })
}

pub async fn add_whitelist_entry(
    State(state): State<AppState>,
    Json(edit): Json<WhitelistEdit>,
) -> StatusCode {
    state.security.whitelist.add(&edit.ip);
    StatusCode::NO_CONTENT
}

pub async fn remove_whitelist_entry(
    State(state): State<AppState>,
    Path(ip): Path<String>,
) -> StatusCode {
    state.security.whitelist.remove(&ip);
    StatusCode::NO_CONTENT
}

/// Full atomic replacement of the allow set.
pub async fn reload_whitelist(
    State(state): State<AppState>,
    Json(view): Json<WhitelistView>,
) -> StatusCode {
    state.security.whitelist.reload(view.entries);
    StatusCode::NO_CONTENT
}

pub async fn get_rate_limits(State(state): State<AppState>) -> Json<RateLimitStats> {
    Json(RateLimitStats {
        buckets: state.security.rate_limiter.bucket_count(),
    })
}

/// Drop every bucket (operational hook; callers start fresh windows).
pub async fn clear_rate_limits(State(state): State<AppState>) -> StatusCode {
    state.security.rate_limiter.clear_all();
    tracing::info!("rate-limit buckets cleared via admin API");
    StatusCode::NO_CONTENT
}
