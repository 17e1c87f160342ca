//! The seam to the event lifecycle manager.
//!
//! Events are created and torn down elsewhere; the registry only needs the
//! tag, an HTTP handler and a way to close the event.

use axum::Router;

use crate::events::tag::Tag;

/// Boxed error returned by event implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Static description of a running event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventConfig {
    pub tag: Tag,
    /// Human-readable name, used in logs only.
    pub name: String,
}

impl EventConfig {
    pub fn new(tag: Tag, name: impl Into<String>) -> Self {
        Self {
            tag,
            name: name.into(),
        }
    }
}

/// A running tenant session.
pub trait Event: Send + Sync {
    fn config(&self) -> &EventConfig;

    /// Handler serving every request addressed to this event's subdomain.
    fn handler(&self) -> Router;

    fn close(&self) -> Result<(), BoxError>;
}
