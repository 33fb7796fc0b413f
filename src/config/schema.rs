//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::security::permissions::Role;
use crate::security::rate_limit::RateTiers;

/// Root configuration for the security gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting tiers and exclusions.
    pub rate_limit: RateLimitConfig,

    /// IP whitelist admission control.
    pub ip_whitelist: IpWhitelistConfig,

    /// HMAC request signing.
    pub signing: SigningConfig,

    /// Static bearer-token identity table.
    pub auth: AuthConfig,

    /// Admin surface settings.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Overall request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Master switch for the rate-limit stage.
    pub enabled: bool,

    /// Per-role and per-endpoint-class capacities (requests per minute).
    pub tiers: RateTiers,

    /// Paths that bypass the rate-limit stage entirely (substring match).
    pub excluded_paths: Vec<String>,

    /// Seconds a bucket may sit untouched before the sweeper evicts it.
    pub idle_cutoff_secs: u64,

    /// Interval between idle-bucket sweeps, in seconds.
    pub idle_sweep_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tiers: RateTiers::default(),
            excluded_paths: vec![
                "/api/auth/signin".to_string(),
                "/api/auth/signup".to_string(),
                "/health".to_string(),
                "/docs".to_string(),
            ],
            idle_cutoff_secs: 900,
            idle_sweep_secs: 300,
        }
    }
}

/// IP whitelist configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IpWhitelistConfig {
    /// Master switch for the admission stage.
    pub enabled: bool,

    /// Allowed client IPs; "localhost" admits 127.0.0.1, ::1 and "localhost".
    pub ips: Vec<String>,

    /// Path prefixes the allow-list guards.
    pub protected_paths: Vec<String>,
}

impl Default for IpWhitelistConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ips: vec!["127.0.0.1".to_string(), "localhost".to_string()],
            protected_paths: vec!["/api/admin/".to_string(), "/api/users/".to_string()],
        }
    }
}

/// Request signing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Master switch for the signature stage.
    pub enabled: bool,

    /// Shared HMAC secret. Must be overridden when signing is enabled.
    pub secret: String,

    /// Path prefixes that require a valid signature.
    pub protected_paths: Vec<String>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            secret: String::new(),
            protected_paths: vec![
                "/api/users/delete".to_string(),
                "/api/shops/delete".to_string(),
                "/api/admin/".to_string(),
                "/api/auth/signup".to_string(),
            ],
        }
    }
}

/// One bearer token mapped to an identity. Stands in for the upstream
/// identity provider so the pipeline is exercisable end to end.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenEntry {
    pub token: String,
    pub user_id: i64,
    pub role: Role,
}

/// Static token table.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub tokens: Vec<TokenEntry>,
}

/// Admin surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the /api/admin routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
