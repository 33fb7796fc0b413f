pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

/// Operational surface, nested under the signed + IP-guarded admin prefix.
pub fn admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/admin/status", get(get_status))
        .route("/api/admin/whitelist", get(get_whitelist).post(add_whitelist_entry))
        .route("/api/admin/whitelist/reload", post(reload_whitelist))
        .route("/api/admin/whitelist/{ip}", delete(remove_whitelist_entry))
        .route("/api/admin/rate-limits", get(get_rate_limits))
        .route("/api/admin/rate-limits/clear", post(clear_rate_limits))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
