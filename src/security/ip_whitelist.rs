//! IP admission control for protected path prefixes.
//!
//! Default-allow, selectively-deny: only paths under a configured prefix are
//! checked against the allow-list at all. The allow-list itself lives behind
//! an `ArcSwap` so single-entry edits and full reloads replace the whole set
//! atomically; a concurrent lookup sees either the old set or the new one,
//! never a partially-updated one.

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::http::error::PipelineError;
use crate::http::server::AppState;

/// Resolve the client IP the way the upstream proxy chain presents it:
/// first `X-Forwarded-For` segment, else `X-Real-IP`, else the transport
/// peer address.
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    if let Some(xff) = headers.get("X-Forwarded-For").and_then(|v| v.to_str().ok()) {
        if let Some(first) = xff.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real) = headers.get("X-Real-IP").and_then(|v| v.to_str().ok()) {
        let real = real.trim();
        if !real.is_empty() {
            return real.to_string();
        }
    }
    peer.ip().to_string()
}

/// Allow-list of client IPs guarding a set of path prefixes.
pub struct IpWhitelist {
    allowed: ArcSwap<HashSet<String>>,
    protected_paths: Vec<String>,
}

impl IpWhitelist {
    pub fn new(ips: impl IntoIterator<Item = String>, protected_paths: Vec<String>) -> Self {
        Self {
            allowed: ArcSwap::from_pointee(ips.into_iter().collect()),
            protected_paths,
        }
    }

    /// Whether the path falls under a guarded prefix.
    pub fn is_protected(&self, path: &str) -> bool {
        self.protected_paths.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// Whether the client IP may enter guarded paths. A `localhost` entry
    /// admits "localhost", "127.0.0.1" and "::1" interchangeably.
    pub fn is_allowed(&self, ip: &str) -> bool {
        let allowed = self.allowed.load();
        if allowed.contains(ip) {
            return true;
        }
        if matches!(ip, "localhost" | "127.0.0.1" | "::1") {
            return allowed.iter().any(|entry| entry.eq_ignore_ascii_case("localhost"));
        }
        false
    }

    /// Add a single entry. Goes through `rcu` so concurrent single-entry
    /// edits retry instead of overwriting each other.
    pub fn add(&self, ip: &str) {
        self.allowed.rcu(|current| {
            let mut next = HashSet::clone(current);
            next.insert(ip.to_string());
            next
        });
        tracing::info!(ip, "added IP to whitelist");
    }

    /// Remove a single entry (same retry-on-conflict scheme as [`add`](Self::add)).
    pub fn remove(&self, ip: &str) {
        self.allowed.rcu(|current| {
            let mut next = HashSet::clone(current);
            next.remove(ip);
            next
        });
        tracing::info!(ip, "removed IP from whitelist");
    }

    /// Replace the whole set atomically.
    pub fn reload(&self, ips: impl IntoIterator<Item = String>) {
        self.allowed.store(Arc::new(ips.into_iter().collect()));
        tracing::info!("whitelist reloaded");
    }

    /// Snapshot of the current entries, for the admin surface.
    pub fn entries(&self) -> Vec<String> {
        let mut out: Vec<String> = self.allowed.load().iter().cloned().collect();
        out.sort();
        out
    }
}

/// Pipeline stage: deny non-whitelisted client IPs on guarded path prefixes.
pub async fn ip_whitelist_middleware(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, PipelineError> {
    let security = &state.security;
    if !security.whitelist_enabled {
        return Ok(next.run(req).await);
    }

    let path = req.uri().path();
    if !security.whitelist.is_protected(path) {
        return Ok(next.run(req).await);
    }

    let ip = client_ip(req.headers(), peer);
    if security.whitelist.is_allowed(&ip) {
        Ok(next.run(req).await)
    } else {
        tracing::warn!(client_ip = %ip, path, "access denied from non-whitelisted IP");
        metrics::counter!("doorman_rejected_total", "stage" => "ip_whitelist").increment(1);
        Err(PipelineError::IpDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn whitelist(ips: &[&str]) -> IpWhitelist {
        IpWhitelist::new(
            ips.iter().map(|s| s.to_string()),
            vec!["/api/admin/".into(), "/api/users/".into()],
        )
    }

    #[test]
    fn test_protected_prefixes() {
        let wl = whitelist(&["10.0.0.1"]);
        assert!(wl.is_protected("/api/admin/whitelist"));
        assert!(wl.is_protected("/api/users/5"));
        assert!(!wl.is_protected("/api/shops"));
        assert!(!wl.is_protected("/health"));
    }

    #[test]
    fn test_exact_match() {
        let wl = whitelist(&["10.0.0.1"]);
        assert!(wl.is_allowed("10.0.0.1"));
        assert!(!wl.is_allowed("10.0.0.2"));
    }

    #[test]
    fn test_localhost_aliases() {
        let wl = whitelist(&["localhost"]);
        assert!(wl.is_allowed("localhost"));
        assert!(wl.is_allowed("127.0.0.1"));
        assert!(wl.is_allowed("::1"));
        assert!(!wl.is_allowed("192.168.1.1"));

        // Without the symbolic entry, loopback literals only match themselves
        let wl = whitelist(&["127.0.0.1"]);
        assert!(wl.is_allowed("127.0.0.1"));
        assert!(!wl.is_allowed("::1"));
        assert!(!wl.is_allowed("localhost"));
    }

    #[test]
    fn test_add_remove_reload() {
        let wl = whitelist(&["10.0.0.1"]);
        wl.add("10.0.0.2");
        assert!(wl.is_allowed("10.0.0.2"));

        wl.remove("10.0.0.1");
        assert!(!wl.is_allowed("10.0.0.1"));

        wl.reload(vec!["172.16.0.1".to_string()]);
        assert_eq!(wl.entries(), vec!["172.16.0.1"]);
        assert!(!wl.is_allowed("10.0.0.2"));
    }

    #[test]
    fn test_concurrent_edits_are_not_lost() {
        use std::sync::{Arc, Barrier};

        for round in 0..100 {
            let wl = Arc::new(whitelist(&[]));
            let barrier = Arc::new(Barrier::new(2));
            let ips = [format!("10.0.{}.1", round), format!("10.0.{}.2", round)];

            let handles: Vec<_> = ips
                .iter()
                .cloned()
                .map(|ip| {
                    let wl = Arc::clone(&wl);
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        wl.add(&ip);
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }

            for ip in &ips {
                assert!(wl.is_allowed(ip), "round {}: {} lost", round, ip);
            }
        }
    }

    #[test]
    fn test_client_ip_resolution_order() {
        let peer: SocketAddr = "192.0.2.1:5000".parse().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("X-Real-IP", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&headers, peer), "203.0.113.7");

        let mut headers = HeaderMap::new();
        headers.insert("X-Real-IP", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&headers, peer), "198.51.100.2");

        let headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, peer), "192.0.2.1");
    }
}
