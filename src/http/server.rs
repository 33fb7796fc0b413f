//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all guarded routes
//! - Wire the pipeline stages in their fixed order
//! - Own the process-wide security state (buckets, whitelist, signer)
//! - Apply config reloads as atomic swaps
//! - Serve with graceful shutdown
//!
//! # Pipeline order (outermost first)
//! ```text
//! trace / request-id / timeout
//!     → identity attachment (never rejects)
//!     → rate limit        (429)
//!     → IP admission      (403)
//!     → request signature (401)
//!     → per-route auth / ownership / permissions (401 / 403)
//!     → handler
//! ```

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::config::GatewayConfig;
use crate::http::handlers;
use crate::http::identity::{
    identity_middleware, require_auth_middleware, IdentityResolver, StaticTokenResolver,
};
use crate::security::ip_whitelist::{ip_whitelist_middleware, IpWhitelist};
use crate::security::ownership::{ownership_middleware, OwnerParam};
use crate::security::rate_limit::{rate_limit_middleware, RateLimitRegistry};
use crate::security::signing::{signing_middleware, RequestSigner};

/// Process-wide security state shared by every pipeline stage.
/// Initialized once from config; the reloadable parts (tier table, allow
/// set) swap atomically, the rest is fixed for the process lifetime.
pub struct SecurityState {
    pub rate_limiter: RateLimitRegistry,
    pub whitelist: IpWhitelist,
    pub signer: RequestSigner,
    pub resolver: Arc<dyn IdentityResolver>,
    pub rate_limit_enabled: bool,
    pub whitelist_enabled: bool,
    pub signing_enabled: bool,
    excluded_paths: Vec<String>,
    pub admin_api_key: String,
}

impl SecurityState {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            rate_limiter: RateLimitRegistry::new(config.rate_limit.tiers),
            whitelist: IpWhitelist::new(
                config.ip_whitelist.ips.iter().cloned(),
                config.ip_whitelist.protected_paths.clone(),
            ),
            signer: RequestSigner::new(
                config.signing.secret.as_bytes().to_vec(),
                config.signing.protected_paths.clone(),
            ),
            resolver: Arc::new(StaticTokenResolver::from_config(&config.auth)),
            rate_limit_enabled: config.rate_limit.enabled,
            whitelist_enabled: config.ip_whitelist.enabled,
            signing_enabled: config.signing.enabled,
            excluded_paths: config.rate_limit.excluded_paths.clone(),
            admin_api_key: config.admin.api_key.clone(),
        }
    }

    /// Paths that bypass the rate-limit stage (substring match, like the
    /// upstream proxy rules this mirrors).
    pub fn is_excluded_path(&self, path: &str) -> bool {
        self.excluded_paths.iter().any(|p| path.contains(p.as_str()))
    }

    /// Apply the runtime-swappable parts of a reloaded config.
    pub fn apply_reload(&self, config: &GatewayConfig) {
        self.rate_limiter.reload_tiers(config.rate_limit.tiers);
        self.whitelist.reload(config.ip_whitelist.ips.iter().cloned());
        tracing::info!("applied reloadable configuration (rate tiers, whitelist)");
    }
}

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub security: Arc<SecurityState>,
}

/// HTTP server for the security gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    security: Arc<SecurityState>,
}

impl GatewayServer {
    /// Create a new gateway server with the given configuration.
    pub fn new(config: GatewayConfig) -> Self {
        let security = Arc::new(SecurityState::from_config(&config));
        let state = AppState {
            security: security.clone(),
        };
        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            security,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let mut api = Router::new()
            .route("/health", get(handlers::health))
            .route("/api/auth/signin", post(handlers::signin))
            .route("/api/auth/signup", post(handlers::signup))
            .route("/api/shops", get(handlers::list_shops))
            .route("/api/posts", get(handlers::list_posts).post(handlers::create_post))
            .route("/api/messages", post(handlers::send_message))
            .route(
                "/api/uploads",
                post(handlers::upload).route_layer(middleware::from_fn(require_auth_middleware)),
            )
            .route("/api/users/{user_id}", get(handlers::get_profile))
            .route(
                "/api/users/delete/{user_id}",
                delete(handlers::delete_user)
                    // Inner to outer: ownership runs after the auth gate
                    .route_layer(middleware::from_fn_with_state(
                        OwnerParam("user_id"),
                        ownership_middleware,
                    ))
                    .route_layer(middleware::from_fn(require_auth_middleware)),
            )
            .route("/api/shops/delete/{shop_id}", delete(handlers::delete_shop));

        if config.admin.enabled {
            api = api.merge(admin::admin_router(state.clone()));
        }

        // .layer() wraps: the last layer added runs first, so the stack below
        // reads bottom-up as the pipeline order.
        api.layer(middleware::from_fn_with_state(state.clone(), signing_middleware))
            .layer(middleware::from_fn_with_state(state.clone(), ip_whitelist_middleware))
            .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
            .layer(middleware::from_fn_with_state(state.clone(), identity_middleware))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// `config_updates` delivers reloaded configurations from the file
    /// watcher; `shutdown` triggers graceful drain.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "gateway starting");

        // Idle-bucket sweeper: bounds the registry's memory.
        let sweeper = self.security.clone();
        let cutoff = Duration::from_secs(self.config.rate_limit.idle_cutoff_secs);
        let sweep_every = Duration::from_secs(self.config.rate_limit.idle_sweep_secs.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_every);
            interval.tick().await;
            loop {
                interval.tick().await;
                sweeper.rate_limiter.purge_idle(cutoff);
            }
        });

        // Reload applier: swaps tier table and allow set atomically.
        let reloadable = self.security.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                reloadable.apply_reload(&new_config);
            }
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("shutdown signal received");
            })
            .await?;

        tracing::info!("gateway stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Shared security state, exposed for operational tooling and tests.
    pub fn security(&self) -> Arc<SecurityState> {
        self.security.clone()
    }
}
