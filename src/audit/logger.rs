//! Per-participant keystroke logger.
//!
//! # Responsibilities
//! - Accept raw instructions without blocking the relay
//! - Decide per instruction: drop, normalize, or keep verbatim
//! - Append one line per retained instruction to the participant's file
//!
//! # Line Format
//! ```text
//! key,<keysym>,<pressed>      key instruction
//! <raw instruction>           anything else that decodes
//! ```
//! `\`, `\n` and `\r` inside a line are escaped as `\\`, `\n`, `\r` so
//! one instruction is always one line. Mouse instructions are dropped.
//!
//! # Design Decisions
//! - One unbounded queue and one worker task per logger; the worker is
//!   the only writer, so the file needs no lock
//! - The file is flushed after every drained batch
//! - Worker failures go to the failure channel, never to `log`'s caller

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::audit::types::{AuditError, AuditFailure, FailureReason, ParticipantId};
use crate::observability::metrics;
use crate::protocol::{Frame, FrameError, Instruction, MalformedInstruction};

/// Maximum messages handled between two flushes.
const BATCH_SIZE: usize = 128;

enum Message {
    Entry(Vec<u8>),
    Close,
}

/// Append-only audit log for one participant.
pub struct KeyLogger {
    participant: ParticipantId,
    path: PathBuf,
    tx: mpsc::UnboundedSender<Message>,
    closed: AtomicBool,
    worker: Mutex<Option<JoinHandle<io::Result<()>>>>,
}

impl KeyLogger {
    /// Open (or create) `path` in append mode and start the worker.
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn open(
        participant: ParticipantId,
        path: PathBuf,
        failures: broadcast::Sender<AuditFailure>,
    ) -> Result<Self, AuditError> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| AuditError::Open {
                path: path.clone(),
                source,
            })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            participant: participant.clone(),
            writer: BufWriter::new(File::from_std(file)),
            failures,
        };
        let handle = tokio::spawn(worker.run(rx));

        tracing::info!(participant = %participant, path = %path.display(), "Audit logger opened");

        Ok(Self {
            participant,
            path,
            tx,
            closed: AtomicBool::new(false),
            worker: Mutex::new(Some(handle)),
        })
    }

    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue one complete instruction. Never waits on I/O.
    pub fn log(&self, raw: &[u8]) {
        if self.closed.load(Ordering::Acquire) {
            tracing::debug!(participant = %self.participant, "Instruction after close ignored");
            return;
        }
        if self.tx.send(Message::Entry(raw.to_vec())).is_err() {
            tracing::debug!(participant = %self.participant, "Audit worker gone, instruction ignored");
        }
    }

    /// Stop intake, drain the queue and flush the file to disk.
    ///
    /// Safe to call more than once; later calls return `Ok(())`.
    pub async fn close(&self) -> Result<(), AuditError> {
        self.closed.store(true, Ordering::Release);

        let mut worker = self.worker.lock().await;
        let Some(handle) = worker.take() else {
            return Ok(());
        };
        let _ = self.tx.send(Message::Close);

        let result = handle.await;
        tracing::info!(participant = %self.participant, "Audit logger closed");

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(AuditError::Flush {
                participant: self.participant.clone(),
                source,
            }),
            Err(e) => Err(AuditError::Worker {
                participant: self.participant.clone(),
                message: e.to_string(),
            }),
        }
    }
}

struct Worker {
    participant: ParticipantId,
    writer: BufWriter<File>,
    failures: broadcast::Sender<AuditFailure>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) -> io::Result<()> {
        let mut batch = Vec::with_capacity(BATCH_SIZE);
        while rx.recv_many(&mut batch, BATCH_SIZE).await > 0 {
            let mut stop = false;
            for message in batch.drain(..) {
                match message {
                    Message::Entry(raw) => self.record(&raw).await,
                    Message::Close => {
                        stop = true;
                        break;
                    }
                }
            }
            if let Err(e) = self.writer.flush().await {
                metrics::record_audit_write_error();
                self.report(e.into());
            }
            if stop {
                break;
            }
        }

        self.writer.flush().await?;
        self.writer.get_ref().sync_all().await
    }

    async fn record(&mut self, raw: &[u8]) {
        let line = match render(raw) {
            Ok(Some(line)) => line,
            Ok(None) => {
                metrics::record_audit_dropped("mouse");
                return;
            }
            Err(e) => {
                metrics::record_audit_dropped("malformed");
                self.report(e.into());
                return;
            }
        };

        match self.writer.write_all(line.text.as_bytes()).await {
            Ok(()) => metrics::record_audit_line(line.kind),
            Err(e) => {
                metrics::record_audit_write_error();
                self.report(e.into());
            }
        }
    }

    fn report(&self, reason: FailureReason) {
        tracing::warn!(participant = %self.participant, error = %reason, "Audit entry not persisted");
        // No subscribers is fine.
        let _ = self.failures.send(AuditFailure {
            participant: self.participant.clone(),
            reason,
        });
    }
}

struct Line {
    kind: &'static str,
    text: String,
}

/// Render the log line for `raw`, or `None` when the instruction is dropped.
fn render(raw: &[u8]) -> Result<Option<Line>, MalformedInstruction> {
    let instruction = Instruction::parse(raw)?;
    let (kind, mut text) = match Frame::classify(instruction) {
        Ok(Frame::Mouse(_)) => return Ok(None),
        Ok(Frame::Key(frame)) => {
            let mut text = String::from("key,");
            escape_into(&mut text, frame.key.as_str());
            text.push(',');
            escape_into(&mut text, frame.pressed.as_str());
            ("key", text)
        }
        Ok(Frame::Other(_)) | Err(FrameError::InvalidArguments { .. }) => {
            let mut text = String::with_capacity(raw.len() + 1);
            escape_into(&mut text, &String::from_utf8_lossy(raw));
            ("passthrough", text)
        }
        Err(FrameError::Malformed(e)) => return Err(e),
    };
    text.push('\n');

    Ok(Some(Line { kind, text }))
}

fn escape_into(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
}
