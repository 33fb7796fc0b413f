//! Identity resolution.
//!
//! Attaches an [`Identity`] to every request before the rate-limit stage:
//! either the identity behind a bearer token, or a synthetic
//! `anonymous:<client_ip>` actor. Attachment never rejects; enforcement
//! (401 for routes that need an authenticated caller) is a separate,
//! later stage per the pipeline ordering.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::SocketAddr;

use crate::config::schema::AuthConfig;
use crate::http::error::PipelineError;
use crate::http::server::AppState;
use crate::security::ip_whitelist::client_ip;
use crate::security::ownership::Identity;

/// Collaborator interface: turns a bearer token into an identity.
/// The production implementation would call the auth service; the gateway
/// ships a static table so the pipeline runs standalone.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, bearer_token: &str) -> Option<Identity>;
}

/// Token table from configuration.
pub struct StaticTokenResolver {
    tokens: HashMap<String, Identity>,
}

impl StaticTokenResolver {
    pub fn from_config(config: &AuthConfig) -> Self {
        let tokens = config
            .tokens
            .iter()
            .map(|entry| {
                (
                    entry.token.clone(),
                    Identity::authenticated(entry.user_id, entry.role),
                )
            })
            .collect();
        Self { tokens }
    }
}

impl IdentityResolver for StaticTokenResolver {
    fn resolve(&self, bearer_token: &str) -> Option<Identity> {
        self.tokens.get(bearer_token).cloned()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Resolve the caller's identity from headers, falling back to anonymous.
pub fn resolve_identity(
    resolver: &dyn IdentityResolver,
    headers: &HeaderMap,
    peer: SocketAddr,
) -> Identity {
    if let Some(token) = bearer_token(headers) {
        if let Some(identity) = resolver.resolve(token) {
            return identity;
        }
        // Unknown token: treated as anonymous, not rejected here. The
        // authentication gate later in the pipeline decides whether the
        // route tolerates an anonymous caller.
        tracing::debug!("bearer token did not resolve to an identity");
    }
    Identity::anonymous(&client_ip(headers, peer))
}

/// Pipeline head: attach the identity as a request extension.
pub async fn identity_middleware(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let identity = resolve_identity(state.security.resolver.as_ref(), req.headers(), peer);
    req.extensions_mut().insert(identity);
    next.run(req).await
}

/// Per-route gate: reject anonymous callers with 401.
pub async fn require_auth_middleware(
    req: Request<Body>,
    next: Next,
) -> Result<Response, PipelineError> {
    match req.extensions().get::<Identity>() {
        Some(identity) if identity.is_authenticated() => Ok(next.run(req).await),
        _ => {
            metrics::counter!("doorman_rejected_total", "stage" => "authentication").increment(1);
            Err(PipelineError::Unauthenticated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TokenEntry;
    use crate::security::permissions::Role;
    use axum::http::HeaderValue;

    fn resolver() -> StaticTokenResolver {
        StaticTokenResolver::from_config(&AuthConfig {
            tokens: vec![
                TokenEntry {
                    token: "tok-user".into(),
                    user_id: 5,
                    role: Role::User,
                },
                TokenEntry {
                    token: "tok-admin".into(),
                    user_id: 1,
                    role: Role::Admin,
                },
            ],
        })
    }

    #[test]
    fn test_known_token_resolves() {
        let r = resolver();
        let identity = r.resolve("tok-user").unwrap();
        assert_eq!(identity.id, "5");
        assert_eq!(identity.role, Role::User);
        assert!(r.resolve("tok-unknown").is_none());
    }

    #[test]
    fn test_missing_or_unknown_token_is_anonymous() {
        let r = resolver();
        let peer: SocketAddr = "203.0.113.9:1234".parse().unwrap();

        let headers = HeaderMap::new();
        let identity = resolve_identity(&r, &headers, peer);
        assert_eq!(identity, Identity::anonymous("203.0.113.9"));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer nope"));
        let identity = resolve_identity(&r, &headers, peer);
        assert!(!identity.is_authenticated());
    }

    #[test]
    fn test_anonymous_id_uses_forwarded_ip() {
        let r = resolver();
        let peer: SocketAddr = "203.0.113.9:1234".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", HeaderValue::from_static("198.51.100.4"));
        let identity = resolve_identity(&r, &headers, peer);
        assert_eq!(identity.id, "anonymous:198.51.100.4");
    }
}
