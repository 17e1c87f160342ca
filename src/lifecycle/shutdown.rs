//! Shutdown coordination for the gateway.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

use crate::audit::LoggerPool;
use crate::events::EventPool;

/// Broadcasts a single shutdown signal to every long-running task.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    triggered: AtomicBool,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire the signal. Only the first call has an effect.
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::AcqRel) {
            let _ = self.tx.send(());
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Close events first, then flush every audit log.
///
/// Both registries are always closed; failures are logged.
pub async fn close_registries(events: &EventPool, loggers: &LoggerPool) {
    if let Err(e) = events.close() {
        tracing::error!(error = %e, "Event pool closed with errors");
    }
    if let Err(e) = loggers.close().await {
        tracing::error!(error = %e, "Logger pool closed with errors");
    }
}
