//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Event pool, audit loggers, HTTP layer
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
