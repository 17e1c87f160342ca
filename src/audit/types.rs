//! Participant identity and audit error definitions.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::protocol::MalformedInstruction;

/// Identifier of one audited participant ("team").
///
/// Used verbatim as the log file stem, so it may not contain path
/// separators or be a relative path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Result<Self, AuditError> {
        let id = id.into();
        let invalid = id.is_empty()
            || id == "."
            || id == ".."
            || id.contains(['/', '\\', '\0']);
        if invalid {
            return Err(AuditError::InvalidParticipant(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors returned by the audit subsystem.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("invalid participant id {0:?}")]
    InvalidParticipant(String),

    #[error("no logger registered for participant {0}")]
    UnknownParticipant(ParticipantId),

    #[error("failed to create audit directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open audit log {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to flush audit log for {participant}: {source}")]
    Flush {
        participant: ParticipantId,
        #[source]
        source: io::Error,
    },

    #[error("audit worker for {participant} stopped unexpectedly: {message}")]
    Worker {
        participant: ParticipantId,
        message: String,
    },

    #[error("logger pool is closed")]
    Closed,
}

/// Why the background worker could not persist an entry.
#[derive(Debug, Clone, Error)]
pub enum FailureReason {
    #[error("malformed instruction: {0}")]
    Malformed(#[from] MalformedInstruction),

    #[error("write failed ({kind:?}): {message}")]
    Write { kind: io::ErrorKind, message: String },
}

impl From<io::Error> for FailureReason {
    fn from(e: io::Error) -> Self {
        FailureReason::Write {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// A failure observed inside a logger's worker.
///
/// Published out-of-band; never returned to the caller of `log`.
#[derive(Debug, Clone)]
pub struct AuditFailure {
    pub participant: ParticipantId,
    pub reason: FailureReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_validation() {
        assert!(ParticipantId::new("team").is_ok());
        assert!(ParticipantId::new("team-01.blue").is_ok());

        for bad in ["", ".", "..", "a/b", "..\\x", "nul\0"] {
            assert!(
                matches!(ParticipantId::new(bad), Err(AuditError::InvalidParticipant(_))),
                "{:?} accepted",
                bad
            );
        }
    }
}
