//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Log level from the environment (RUST_LOG) with the config value as
//!   fallback

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber. Call once at startup.
pub fn init_tracing(default_level: &str) {
    let fallback = format!("doorman={},tower_http=info", default_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
