//! Registry of keystroke loggers, one per participant.
//!
//! # Responsibilities
//! - Create a logger on first use and hand out the same instance after
//! - Derive each log path from the participant id
//! - Fan worker failures out to observers
//! - Close every logger on shutdown
//!
//! # Design Decisions
//! - Read lock for the hot lookup; on a miss the write lock is taken and
//!   the map re-checked before creating
//! - Loggers are closed outside the lock

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

use crate::audit::logger::KeyLogger;
use crate::audit::types::{AuditError, AuditFailure, ParticipantId};
use crate::observability::metrics;

/// Capacity of the failure channel; slow observers see `Lagged`.
const FAILURE_CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
struct Loggers {
    by_participant: HashMap<ParticipantId, Arc<KeyLogger>>,
    closed: bool,
}

/// Owns every `KeyLogger` and its worker.
pub struct LoggerPool {
    dir: PathBuf,
    loggers: RwLock<Loggers>,
    failures: broadcast::Sender<AuditFailure>,
}

impl LoggerPool {
    /// Create a pool writing into `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| AuditError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);

        Ok(Self {
            dir,
            loggers: RwLock::new(Loggers::default()),
            failures,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the log file for `participant`.
    pub fn log_path(&self, participant: &ParticipantId) -> PathBuf {
        self.dir.join(format!("{}.log", participant))
    }

    /// Return the participant's logger, creating it on first use.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn get_logger(&self, participant: &ParticipantId) -> Result<Arc<KeyLogger>, AuditError> {
        {
            let loggers = self.loggers.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(logger) = loggers.by_participant.get(participant) {
                return Ok(logger.clone());
            }
            if loggers.closed {
                return Err(AuditError::Closed);
            }
        }

        let mut loggers = self.loggers.write().unwrap_or_else(PoisonError::into_inner);
        if loggers.closed {
            return Err(AuditError::Closed);
        }
        // Another caller may have won the race for the write lock.
        if let Some(logger) = loggers.by_participant.get(participant) {
            return Ok(logger.clone());
        }

        let logger = Arc::new(KeyLogger::open(
            participant.clone(),
            self.log_path(participant),
            self.failures.clone(),
        )?);
        loggers.by_participant.insert(participant.clone(), logger.clone());
        metrics::set_loggers_active(loggers.by_participant.len());

        Ok(logger)
    }

    /// Look up an existing logger without creating one.
    pub fn lookup(&self, participant: &ParticipantId) -> Result<Arc<KeyLogger>, AuditError> {
        self.loggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_participant
            .get(participant)
            .cloned()
            .ok_or_else(|| AuditError::UnknownParticipant(participant.clone()))
    }

    pub fn len(&self) -> usize {
        self.loggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_participant
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observe failures from every logger's worker.
    pub fn subscribe_failures(&self) -> broadcast::Receiver<AuditFailure> {
        self.failures.subscribe()
    }

    /// Close every logger. Returns the first error but closes them all.
    ///
    /// New loggers can no longer be created afterwards.
    pub async fn close(&self) -> Result<(), AuditError> {
        let loggers: Vec<Arc<KeyLogger>> = {
            let mut loggers = self.loggers.write().unwrap_or_else(PoisonError::into_inner);
            loggers.closed = true;
            loggers.by_participant.values().cloned().collect()
        };

        tracing::info!(count = loggers.len(), "Closing audit loggers");

        let mut first_err = None;
        for logger in loggers {
            if let Err(e) = logger.close().await {
                tracing::error!(participant = %logger.participant(), error = %e, "Failed to close audit logger");
                first_err.get_or_insert(e);
            }
        }
        metrics::set_loggers_active(0);

        first_err.map_or(Ok(()), Err)
    }
}
