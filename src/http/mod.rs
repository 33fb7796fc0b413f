//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, pipeline layering)
//!     → identity.rs (resolve caller, attach to request)
//!     → [security stages run in fixed order]
//!     → handlers.rs (thin route stubs; CRUD is downstream)
//!     → error.rs (rejection bodies on any short-circuit)
//! ```

pub mod error;
pub mod handlers;
pub mod identity;
pub mod server;

pub use error::PipelineError;
pub use server::{AppState, GatewayServer, SecurityState};
