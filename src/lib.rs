//! Request security gateway for the social/reservation platform.
//!
//! Every inbound request passes a fixed pipeline ahead of business logic:
//! rate limiting, IP admission, HMAC signature verification, then identity
//! and ownership enforcement. CRUD itself lives in downstream services.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::GatewayConfig;
pub use http::{GatewayServer, PipelineError};
pub use lifecycle::Shutdown;
