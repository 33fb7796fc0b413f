//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain in-flight requests → Exit
//! ```
//!
//! # Design Decisions
//! - Shutdown is broadcast so every long-running task can subscribe
//! - main translates Ctrl+C into a trigger; tests trigger directly

pub mod shutdown;

pub use shutdown::Shutdown;
