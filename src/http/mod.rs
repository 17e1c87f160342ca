//! HTTP front of the gateway.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, timeout + trace layers)
//!     → EventPool::dispatch (Host → event handler)
//!     → response.rs (404 when nothing matches)
//! ```

pub mod response;
pub mod server;

pub use server::GatewayServer;
