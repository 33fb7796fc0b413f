use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::http::server::AppState;

/// Bearer-key gate for the admin surface. Runs after the full pipeline
/// (the /api/admin prefix is IP-guarded and signed), so this is the last
/// line, not the only one.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    if let Some(auth_val) = auth_header {
        if auth_val == format!("Bearer {}", state.security.admin_api_key) {
            return Ok(next.run(request).await);
        }
    }

    Err(StatusCode::UNAUTHORIZED)
}
