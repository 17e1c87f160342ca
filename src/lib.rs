//! Session gateway: subdomain dispatch for running events and keystroke
//! auditing of the remote-desktop protocol.

pub mod audit;
pub mod config;
pub mod events;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod protocol;

pub use audit::{KeyLogger, LoggerPool, ParticipantId};
pub use config::GateConfig;
pub use events::{Event, EventPool, Tag};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
