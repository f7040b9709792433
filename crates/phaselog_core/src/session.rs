//! Per-phase session handles.
//!
//! [`PhaseSession`] binds a `(project, phase)` pair to its log path and passes
//! calls through to the [`RecordStore`]. [`LiveSession`] adds the in-memory
//! working buffer a chat layer keeps between turns.

use crate::error::Result;
use crate::layout::ProjectLayout;
use crate::reconcile;
use crate::store::RecordStore;
use crate::types::{ExchangeRecord, Meta, RecoveryOutcome, Role, Turn};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Durable log handle for one phase of one project.
#[derive(Clone)]
pub struct PhaseSession {
    project: String,
    phase: String,
    log_path: PathBuf,
    store: RecordStore,
}

impl PhaseSession {
    /// Opens the handle and makes sure the phase directory exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the phase name is invalid or the directory cannot
    /// be created.
    pub fn open(layout: &ProjectLayout, store: RecordStore, project: &str, phase: &str) -> Result<Self> {
        let log_path = layout.log_path(project, phase)?;
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(Self {
            project: project.to_string(),
            phase: phase.to_string(),
            log_path,
            store,
        })
    }

    /// Appends one exchange to the log.
    pub fn save(&self, role: Role, content: &str, meta: Option<Meta>) -> Result<ExchangeRecord> {
        self.store.append(&self.log_path, role, content, meta)
    }

    /// Loads the log; missing or corrupt logs read as empty.
    pub fn load(&self) -> Vec<ExchangeRecord> {
        self.store.load(&self.log_path)
    }

    /// Loads the log, restoring it from a backup if it is corrupt.
    pub fn load_with_recovery(&self) -> Result<RecoveryOutcome> {
        self.store.load_with_recovery(&self.log_path)
    }

    /// Snapshots the log into the backup directory.
    pub fn backup(&self) -> Result<Option<PathBuf>> {
        self.store.backup(&self.log_path)
    }

    /// Lists the log's backups, oldest first.
    pub fn backups(&self) -> Result<Vec<PathBuf>> {
        self.store.list_backups(&self.log_path)
    }

    /// Removes the last exchange.
    pub fn rollback(&self) -> Result<Option<ExchangeRecord>> {
        self.store.rollback_last(&self.log_path)
    }

    /// Writes a working buffer back to the log, keeping assistant metadata.
    pub fn finalize(&self, buffer: &[Turn]) -> Result<Vec<ExchangeRecord>> {
        reconcile::finalize(&self.store, &self.log_path, buffer)
    }

    /// Returns the project slug.
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Returns the phase name as given.
    pub fn phase(&self) -> &str {
        &self.phase
    }

    /// Returns the log file path.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

impl std::fmt::Debug for PhaseSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseSession")
            .field("project", &self.project)
            .field("phase", &self.phase)
            .field("log_path", &self.log_path)
            .finish()
    }
}

/// A phase session plus the conversation buffer a chat layer works from.
///
/// The buffer is hydrated from the log on open. Every recorded turn is
/// persisted immediately and mirrored into the buffer; [`LiveSession::finalize`]
/// writes the buffer back through reconciliation.
#[derive(Debug)]
pub struct LiveSession {
    session_id: String,
    phase: PhaseSession,
    buffer: Vec<Turn>,
}

impl LiveSession {
    /// Opens a live session, rebuilding the buffer from the persisted log.
    pub fn open(phase: PhaseSession) -> Self {
        let buffer: Vec<Turn> = phase.load().iter().map(ExchangeRecord::turn).collect();
        let session_id = Uuid::new_v4().to_string();
        debug!(
            session_id = %session_id,
            project = phase.project(),
            phase = phase.phase(),
            turns = buffer.len(),
            "Opened live session"
        );

        Self {
            session_id,
            phase,
            buffer,
        }
    }

    /// Persists and buffers a user message.
    pub fn record_user(&mut self, content: &str) -> Result<ExchangeRecord> {
        let record = self.phase.save(Role::User, content, None)?;
        self.buffer.push(Turn::user(content));
        Ok(record)
    }

    /// Persists and buffers an assistant reply with optional metrics.
    pub fn record_assistant(&mut self, content: &str, meta: Option<Meta>) -> Result<ExchangeRecord> {
        let record = self.phase.save(Role::Assistant, content, meta)?;
        self.buffer.push(Turn::assistant(content));
        Ok(record)
    }

    /// Drops the last turn from both the log and the buffer.
    pub fn rollback(&mut self) -> Result<Option<ExchangeRecord>> {
        let removed = self.phase.rollback()?;
        if removed.is_some() {
            self.buffer.pop();
        }
        Ok(removed)
    }

    /// Gives mutable access to the buffer for layers that edit turns in place.
    pub fn buffer_mut(&mut self) -> &mut Vec<Turn> {
        &mut self.buffer
    }

    /// Returns the current working buffer.
    pub fn buffer(&self) -> &[Turn] {
        &self.buffer
    }

    /// Writes the buffer back to the log.
    pub fn finalize(&self) -> Result<Vec<ExchangeRecord>> {
        self.phase.finalize(&self.buffer)
    }

    /// Returns the session identifier.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Returns the underlying phase handle.
    pub fn phase(&self) -> &PhaseSession {
        &self.phase
    }
}
