//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → http/identity.rs (attach Identity from auth state)
//!     → rate_limit.rs (token bucket per identity/tier)
//!     → ip_whitelist.rs (admission on protected prefixes)
//!     → signing.rs (HMAC signature on high-risk paths)
//!     → ownership.rs / permissions.rs (per-route authorization)
//!     → Pass to handler
//! ```
//!
//! # Design Decisions
//! - Fixed stage order; first rejection short-circuits the rest
//! - Fail closed: malformed input at any stage denies, never allows
//! - Shared state (buckets, whitelist) supports concurrent access without
//!   torn reads: DashMap for per-key atomicity, ArcSwap for whole-structure
//!   replacement

pub mod ip_whitelist;
pub mod ownership;
pub mod permissions;
pub mod rate_limit;
pub mod signing;

pub use ip_whitelist::IpWhitelist;
pub use ownership::{can_modify_resource, is_resource_owner, Identity};
pub use permissions::{is_action_allowed, Action, ResourceType, Role};
pub use rate_limit::{RateLimitRegistry, RateTiers};
pub use signing::RequestSigner;
