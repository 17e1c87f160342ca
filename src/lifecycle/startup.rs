//! Startup orchestration.
//!
//! Subsystems are built in dependency order: audit log directory first
//! (fail fast if it cannot be created), then the event pool, then the
//! HTTP front that serves it.

use std::sync::Arc;
use thiserror::Error;

use crate::audit::{AuditError, LoggerPool};
use crate::config::GateConfig;
use crate::events::EventPool;
use crate::http::GatewayServer;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("audit setup failed: {0}")]
    Audit(#[from] AuditError),
}

/// Everything a running gateway owns.
pub struct Gateway {
    pub events: Arc<EventPool>,
    pub loggers: Arc<LoggerPool>,
    pub server: GatewayServer,
}

pub fn assemble(config: &GateConfig) -> Result<Gateway, StartupError> {
    let loggers = Arc::new(LoggerPool::new(&config.audit.log_dir)?);
    let events = Arc::new(EventPool::new(config.events.base_host.clone()));
    let server = GatewayServer::new(config, events.clone());

    tracing::info!(
        base_host = %events.host(),
        log_dir = %loggers.dir().display(),
        "Gateway assembled"
    );

    Ok(Gateway {
        events,
        loggers,
        server,
    })
}
