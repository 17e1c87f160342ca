//! Keystroke audit subsystem.
//!
//! # Data Flow
//! ```text
//! relay observes one instruction for a participant
//!     → pool.rs (get_logger: one logger per participant)
//!     → logger.rs (log: enqueue, returns immediately)
//!     → worker task (classify → drop | key line | raw line)
//!     → <log_dir>/<participant>.log
//!
//! worker failures
//!     → broadcast channel (LoggerPool::subscribe_failures)
//!     → tracing warn
//! ```

pub mod logger;
pub mod pool;
pub mod types;

pub use logger::KeyLogger;
pub use pool::LoggerPool;
pub use types::{AuditError, AuditFailure, FailureReason, ParticipantId};
