//! Representative route handlers.
//!
//! Business CRUD lives in downstream services; these handlers exist to give
//! the pipeline real routes to guard and return thin JSON stubs. Each
//! mutating handler consults the permission matrix before "acting", the way
//! the downstream services do.

use axum::{
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;

use crate::http::error::PipelineError;
use crate::security::ownership::Identity;
use crate::security::permissions::{is_action_allowed, Action, ResourceType};

/// Matrix gate used by handlers; absence from the table denies.
fn require_permission(
    identity: &Identity,
    resource: ResourceType,
    action: Action,
) -> Result<(), PipelineError> {
    if is_action_allowed(identity.role, resource, action) {
        Ok(())
    } else {
        tracing::warn!(
            caller = %identity.id,
            role = %identity.role,
            ?resource,
            ?action,
            "permission denied by matrix"
        );
        Err(PipelineError::Forbidden)
    }
}

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}))
}

pub async fn signin() -> impl IntoResponse {
    // Credential verification is the auth service's job; the gateway only
    // keeps this path open (excluded from rate limiting, unsigned).
    Json(json!({"message": "signin accepted"}))
}

pub async fn signup() -> impl IntoResponse {
    (StatusCode::CREATED, Json(json!({"message": "signup accepted"})))
}

pub async fn list_shops(Extension(identity): Extension<Identity>) -> Result<impl IntoResponse, PipelineError> {
    require_permission(&identity, ResourceType::Shop, Action::Read)?;
    Ok(Json(json!({"shops": []})))
}

pub async fn list_posts(Extension(identity): Extension<Identity>) -> Result<impl IntoResponse, PipelineError> {
    require_permission(&identity, ResourceType::Post, Action::Read)?;
    Ok(Json(json!({"posts": []})))
}

pub async fn create_post(Extension(identity): Extension<Identity>) -> Result<impl IntoResponse, PipelineError> {
    require_permission(&identity, ResourceType::Post, Action::Create)?;
    Ok((StatusCode::CREATED, Json(json!({"message": "post created"}))))
}

pub async fn send_message(Extension(identity): Extension<Identity>) -> Result<impl IntoResponse, PipelineError> {
    require_permission(&identity, ResourceType::Message, Action::Create)?;
    Ok((StatusCode::CREATED, Json(json!({"message": "message sent"}))))
}

pub async fn upload() -> impl IntoResponse {
    // File storage is an external collaborator; the route exists for its
    // endpoint-class rate tier.
    (StatusCode::CREATED, Json(json!({"message": "upload accepted"})))
}

pub async fn get_profile(
    Extension(identity): Extension<Identity>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, PipelineError> {
    require_permission(&identity, ResourceType::User, Action::Read)?;
    Ok(Json(json!({"user_id": user_id})))
}

/// Ownership-gated by the route's `OwnerParam("user_id")` policy.
pub async fn delete_user(Path(user_id): Path<i64>) -> impl IntoResponse {
    Json(json!({"message": format!("user {} deleted", user_id)}))
}

pub async fn delete_shop(
    Extension(identity): Extension<Identity>,
    Path(shop_id): Path<i64>,
) -> Result<impl IntoResponse, PipelineError> {
    require_permission(&identity, ResourceType::Shop, Action::Delete)?;
    Ok(Json(json!({"message": format!("shop {} deleted", shop_id)})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::permissions::Role;

    #[test]
    fn test_require_permission_matches_matrix() {
        let anon = Identity::anonymous("127.0.0.1");
        assert!(require_permission(&anon, ResourceType::Shop, Action::Read).is_ok());
        assert_eq!(
            require_permission(&anon, ResourceType::User, Action::Read),
            Err(PipelineError::Forbidden)
        );

        let admin = Identity::authenticated(1, Role::Admin);
        assert!(require_permission(&admin, ResourceType::Shop, Action::Delete).is_ok());
    }
}
