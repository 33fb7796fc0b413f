//! HMAC request signing and verification.
//!
//! High-risk endpoints (deletions, the admin namespace, signup) require the
//! client to prove possession of a shared secret: an HMAC-SHA256 over the
//! canonical string `METHOD|PATH|TIMESTAMP`, base64-encoded, carried in
//! `X-Signature` alongside the millisecond timestamp in `X-Timestamp`.
//!
//! # Design Decisions
//! - Canonical string is exact concatenation with `|` separators; the query
//!   string is excluded. Client and server must agree bit-for-bit.
//! - Freshness window is two-sided (rejects replays AND future-dated clock
//!   skew); exactly at the boundary is accepted.
//! - Every malformed input path rejects (fail closed).
//! - Signature comparison goes through `Mac::verify_slice` (constant time).

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::http::error::PipelineError;
use crate::http::server::AppState;

pub const SIGNATURE_HEADER: &str = "X-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";

/// Maximum allowed distance between the request timestamp and now, in
/// milliseconds, in either direction.
pub const MAX_TIMESTAMP_SKEW_MS: i64 = 5 * 60 * 1000;

type HmacSha256 = Hmac<Sha256>;

/// Signer/verifier over a shared secret. The same canonicalization serves
/// both sides so they cannot drift.
#[derive(Clone)]
pub struct RequestSigner {
    secret: Vec<u8>,
    protected_paths: Vec<String>,
}

impl RequestSigner {
    pub fn new(secret: impl Into<Vec<u8>>, protected_paths: Vec<String>) -> Self {
        Self {
            secret: secret.into(),
            protected_paths,
        }
    }

    /// Whether the path falls under a signed prefix.
    pub fn is_protected(&self, path: &str) -> bool {
        self.protected_paths.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// Produce the signature a client must send for (method, path, timestamp).
    pub fn sign(&self, method: &str, path: &str, timestamp_ms: i64) -> String {
        let canonical = format!("{}|{}|{}", method, path, timestamp_ms);
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(canonical.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }

    /// Verify headers against the wall clock.
    pub fn verify(&self, method: &str, path: &str, timestamp: &str, signature: &str) -> bool {
        self.verify_at(method, path, timestamp, signature, now_millis())
    }

    /// Verification against an explicit clock reading, for deterministic tests.
    pub fn verify_at(
        &self,
        method: &str,
        path: &str,
        timestamp: &str,
        signature: &str,
        now_ms: i64,
    ) -> bool {
        let ts: i64 = match timestamp.parse() {
            Ok(ts) => ts,
            Err(_) => return false,
        };
        // Checked math: extreme-but-parseable timestamps must reject, not
        // overflow (i64::MIN also has no absolute value).
        let fresh = now_ms
            .checked_sub(ts)
            .and_then(|skew| skew.checked_abs())
            .is_some_and(|skew| skew <= MAX_TIMESTAMP_SKEW_MS);
        if !fresh {
            return false;
        }

        let supplied = match STANDARD.decode(signature) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };

        let canonical = format!("{}|{}|{}", method, path, ts);
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(canonical.as_bytes());
        mac.verify_slice(&supplied).is_ok()
    }
}

/// Standalone client-side signer, also used by the CLI's `sign` subcommand.
pub fn client_signature(method: &str, path: &str, timestamp_ms: i64, secret: &str) -> String {
    RequestSigner::new(secret.as_bytes().to_vec(), Vec::new()).sign(method, path, timestamp_ms)
}

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Pipeline stage: reject protected-path requests whose signature headers are
/// missing, stale, or wrong.
pub async fn signing_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, PipelineError> {
    let security = &state.security;
    if !security.signing_enabled {
        return Ok(next.run(req).await);
    }

    let path = req.uri().path();
    if !security.signer.is_protected(path) {
        return Ok(next.run(req).await);
    }

    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let timestamp = req
        .headers()
        .get(TIMESTAMP_HEADER)
        .and_then(|v| v.to_str().ok());

    let valid = match (signature, timestamp) {
        (Some(sig), Some(ts)) => security
            .signer
            .verify(req.method().as_str(), path, ts, sig),
        _ => false,
    };

    if valid {
        Ok(next.run(req).await)
    } else {
        tracing::warn!(method = %req.method(), path, "invalid request signature");
        metrics::counter!("doorman_rejected_total", "stage" => "signature").increment(1);
        Err(PipelineError::SignatureInvalid)
    }
}
