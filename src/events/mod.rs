//! Event registry subsystem.
//!
//! # Data Flow
//! ```text
//! Lifecycle manager (external)
//!     → pool.rs add_event / remove_event (write lock)
//!
//! Incoming request (Host: <tag>.<base host>)
//!     → pool.rs dispatch (read lock)
//!     → tag.rs (label → Tag)
//!     → cached handler of the event, or 404
//! ```

pub mod event;
pub mod pool;
pub mod tag;

pub use event::{BoxError, Event, EventConfig};
pub use pool::{EventPool, Miss, PoolError};
pub use tag::{Tag, TagError};
