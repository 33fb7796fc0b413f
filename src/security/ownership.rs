//! Resource ownership authorization.
//!
//! Answers "may this caller modify the resource owned by user X": the caller
//! must be X, or hold the ADMIN role. The declarative form attaches to a
//! route as a policy value naming the path parameter that carries the owner
//! id; the parameter is resolved from the route's declared parameters at
//! request time, never by introspection.

use axum::{
    body::Body,
    extract::{RawPathParams, State},
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::http::error::PipelineError;
use crate::security::permissions::Role;

/// The actor behind a request, resolved once and immutable for the request's
/// lifetime. Anonymous callers get a synthetic `anonymous:<ip>` id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub role: Role,
}

impl Identity {
    pub fn authenticated(user_id: i64, role: Role) -> Self {
        Self {
            id: user_id.to_string(),
            role,
        }
    }

    pub fn anonymous(client_ip: &str) -> Self {
        Self {
            id: format!("anonymous:{}", client_ip),
            role: Role::Anonymous,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.role != Role::Anonymous
    }

    /// Numeric user id, present only for authenticated identities.
    pub fn user_id(&self) -> Option<i64> {
        if self.is_authenticated() {
            self.id.parse().ok()
        } else {
            None
        }
    }
}

/// True iff the caller is authenticated and is the user who owns the resource.
pub fn is_resource_owner(identity: &Identity, resource_owner_id: i64) -> bool {
    identity.user_id() == Some(resource_owner_id)
}

/// Owner-or-admin rule. Anonymous callers are always denied.
pub fn can_modify_resource(identity: &Identity, resource_owner_id: i64) -> bool {
    is_resource_owner(identity, resource_owner_id) || identity.role == Role::Admin
}

/// Route policy: the name of the path parameter holding the owner's user id.
/// Attached per-route via `middleware::from_fn_with_state`.
#[derive(Debug, Clone, Copy)]
pub struct OwnerParam(pub &'static str);

/// Middleware enforcing the owner-or-admin rule for the parameter named by
/// the route's [`OwnerParam`] policy.
///
/// A route declaring this policy without the named parameter is a
/// configuration defect and fails loudly with a 500, never a silent allow.
pub async fn ownership_middleware(
    State(OwnerParam(param)): State<OwnerParam>,
    params: RawPathParams,
    req: Request<Body>,
    next: Next,
) -> Result<Response, PipelineError> {
    let identity = req
        .extensions()
        .get::<Identity>()
        .cloned()
        .ok_or(PipelineError::Unauthenticated)?;

    let raw = params.iter().find(|(name, _)| *name == param).map(|(_, v)| v);
    let Some(raw) = raw else {
        tracing::error!(
            parameter = param,
            path = %req.uri().path(),
            "ownership check references a path parameter the route does not declare"
        );
        return Err(PipelineError::Configuration(param.to_string()));
    };

    // Malformed owner ids deny rather than error: the client controls this
    // value, so it is an authorization failure, not a server defect.
    let owner_id: i64 = raw.parse().map_err(|_| PipelineError::Forbidden)?;

    if can_modify_resource(&identity, owner_id) {
        Ok(next.run(req).await)
    } else {
        tracing::warn!(
            caller = %identity.id,
            role = %identity.role,
            owner = owner_id,
            "ownership check denied"
        );
        Err(PipelineError::Forbidden)
    }
}
