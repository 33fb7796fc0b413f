//! Shared utilities for gateway integration tests.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::mpsc;

use doorman::config::schema::TokenEntry;
use doorman::config::GatewayConfig;
use doorman::http::GatewayServer;
use doorman::lifecycle::Shutdown;
use doorman::security::permissions::Role;

/// A config wired for tests: every stage off by default, a small static
/// token table, and rate limiting left to each test to switch on.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.rate_limit.enabled = false;
    config.ip_whitelist.enabled = false;
    config.signing.enabled = false;
    config.admin.enabled = false;
    config.auth.tokens = vec![
        TokenEntry {
            token: "tok-user".into(),
            user_id: 5,
            role: Role::User,
        },
        TokenEntry {
            token: "tok-other".into(),
            user_id: 6,
            role: Role::User,
        },
        TokenEntry {
            token: "tok-shop".into(),
            user_id: 7,
            role: Role::ShopAdmin,
        },
        TokenEntry {
            token: "tok-admin".into(),
            user_id: 1,
            role: Role::Admin,
        },
    ];
    config
}

/// Boot a gateway on an ephemeral loopback port. Returns the bound address
/// and the shutdown handle; hold the handle for the life of the test, the
/// server drains when it drops.
pub async fn spawn_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let (_update_tx, config_updates) = mpsc::unbounded_channel();

    let server = GatewayServer::new(config);
    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    // Give the acceptor a moment to come up.
    tokio::time::sleep(Duration::from_millis(100)).await;
    (addr, shutdown)
}

/// Non-pooled client so each request opens a fresh connection.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .expect("build client")
}
