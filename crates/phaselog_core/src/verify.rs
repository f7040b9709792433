//! Project verification and recovery tools.
//!
//! Checks every phase of a project for unreadable logs, leftover temp files
//! from interrupted writes and malformed checkpoints, and repairs what can be
//! repaired from backups.

use crate::error::{PhaseLogError, Result};
use crate::hierarchy::HierarchyLoader;
use crate::layout::{ProjectLayout, MAIN_PHASE};
use crate::project::checkpoint_pending;
use crate::store::RecordStore;
use crate::types::{CheckpointDocument, ReadOutcome, RecoveryOutcome};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// State of a phase log as seen by a plain read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogState {
    /// The log parsed with this many records.
    Records(usize),
    /// No log file.
    Missing,
    /// The log exists but does not parse.
    Corrupt {
        /// Decoder message.
        reason: String,
    },
}

/// Verification result for one phase.
#[derive(Debug, Clone)]
pub struct PhaseReport {
    /// Phase name.
    pub phase: String,
    /// Log file path.
    pub log: PathBuf,
    /// Result of reading the log.
    pub state: LogState,
    /// BLAKE3 hex digest of the log bytes.
    pub fingerprint: Option<String>,
    /// Number of backups of the log.
    pub backups: usize,
    /// `.tmp` files left behind by interrupted writes.
    pub temp_files: Vec<PathBuf>,
    /// Whether a checkpoint exists.
    pub checkpoint_exists: bool,
    /// Why the checkpoint does not parse, if it exists and is malformed.
    pub checkpoint_error: Option<String>,
    /// Log changed since the checkpoint was written.
    pub pending: bool,
}

impl PhaseReport {
    /// Returns true if anything about this phase needs attention.
    pub fn has_issues(&self) -> bool {
        matches!(self.state, LogState::Corrupt { .. })
            || !self.temp_files.is_empty()
            || self.checkpoint_error.is_some()
    }
}

/// Report from project verification.
#[derive(Debug, Default)]
pub struct VerifyReport {
    /// Project slug.
    pub project: String,
    /// One entry per phase, `main` first.
    pub phases: Vec<PhaseReport>,
}

impl VerifyReport {
    /// Phases whose log does not parse.
    pub fn corrupt_logs(&self) -> impl Iterator<Item = &PhaseReport> {
        self.phases
            .iter()
            .filter(|p| matches!(p.state, LogState::Corrupt { .. }))
    }

    /// Returns true if any issues were found.
    pub fn has_issues(&self) -> bool {
        self.phases.iter().any(PhaseReport::has_issues)
    }

    /// Returns a summary message.
    pub fn summary(&self) -> String {
        if !self.has_issues() {
            return format!(
                "Project {} is healthy ({} phases checked).",
                self.project,
                self.phases.len()
            );
        }

        let corrupt = self.corrupt_logs().count();
        let temp: usize = self.phases.iter().map(|p| p.temp_files.len()).sum();
        let checkpoints = self
            .phases
            .iter()
            .filter(|p| p.checkpoint_error.is_some())
            .count();

        let mut issues = Vec::new();
        if corrupt > 0 {
            issues.push(format!("{} corrupt logs", corrupt));
        }
        if temp > 0 {
            issues.push(format!("{} leftover temp files", temp));
        }
        if checkpoints > 0 {
            issues.push(format!("{} invalid checkpoints", checkpoints));
        }
        format!("Project {} has issues: {}", self.project, issues.join(", "))
    }
}

/// What `recover_project` did.
#[derive(Debug, Default)]
pub struct RecoveryReport {
    /// Phases restored from a backup, with the backup used.
    pub restored: Vec<(String, PathBuf)>,
    /// Phases with a corrupt log and no usable backup.
    pub unrecoverable: Vec<(String, String)>,
    /// Temp files deleted.
    pub temp_files_removed: Vec<PathBuf>,
}

impl RecoveryReport {
    /// Returns true if nothing needed to be done.
    pub fn is_noop(&self) -> bool {
        self.restored.is_empty() && self.unrecoverable.is_empty() && self.temp_files_removed.is_empty()
    }

    /// Returns a summary message.
    pub fn summary(&self) -> String {
        if self.is_noop() {
            return "Nothing to recover.".to_string();
        }
        let mut parts = Vec::new();
        if !self.restored.is_empty() {
            parts.push(format!("{} logs restored", self.restored.len()));
        }
        if !self.unrecoverable.is_empty() {
            parts.push(format!("{} logs unrecoverable", self.unrecoverable.len()));
        }
        if !self.temp_files_removed.is_empty() {
            parts.push(format!("{} temp files removed", self.temp_files_removed.len()));
        }
        parts.join(", ")
    }
}

/// Verify every phase of a project.
///
/// Read-only: nothing on disk changes.
///
/// # Examples
///
/// ```no_run
/// use phaselog_core::{verify_project, ProjectLayout, RecordStore};
///
/// let layout = ProjectLayout::new("projects");
/// let report = verify_project(&layout, &RecordStore::new(), "alpha").unwrap();
///
/// if report.has_issues() {
///     eprintln!("{}", report.summary());
/// }
/// ```
pub fn verify_project(layout: &ProjectLayout, store: &RecordStore, project: &str) -> Result<VerifyReport> {
    let mut report = VerifyReport {
        project: project.to_string(),
        phases: Vec::new(),
    };

    for phase in project_phases(layout, store, project)? {
        report.phases.push(check_phase(layout, store, project, &phase)?);
    }

    Ok(report)
}

/// Restore corrupt logs from backups and delete leftover temp files.
pub fn recover_project(layout: &ProjectLayout, store: &RecordStore, project: &str) -> Result<RecoveryReport> {
    let mut report = RecoveryReport::default();

    for phase in project_phases(layout, store, project)? {
        let log = layout.log_path(project, &phase)?;

        for tmp in temp_files(&layout.phase_dir(project, &phase)?)? {
            fs::remove_file(&tmp)?;
            info!("Removed leftover temp file {}", tmp.display());
            report.temp_files_removed.push(tmp);
        }

        if !store.read(&log).is_corrupt() {
            continue;
        }
        match store.load_with_recovery(&log)? {
            RecoveryOutcome::Recovered { backup, .. } => report.restored.push((phase, backup)),
            RecoveryOutcome::Unrecoverable { reason } => {
                warn!("{}/{} could not be recovered: {}", project, phase, reason);
                report.unrecoverable.push((phase, reason));
            }
            RecoveryOutcome::Clean(_) | RecoveryOutcome::Missing => {}
        }
    }

    Ok(report)
}

fn project_phases(layout: &ProjectLayout, store: &RecordStore, project: &str) -> Result<Vec<String>> {
    if !layout.project_dir(project)?.is_dir() {
        return Err(PhaseLogError::ProjectNotFound(project.to_string()));
    }

    let mut phases = vec![MAIN_PHASE.to_string()];
    phases.extend(HierarchyLoader::new(layout.clone(), store.clone()).discover_phases(project)?);
    Ok(phases)
}

fn check_phase(layout: &ProjectLayout, store: &RecordStore, project: &str, phase: &str) -> Result<PhaseReport> {
    let log = layout.log_path(project, phase)?;
    let checkpoint = layout.checkpoint_path(project, phase)?;

    let state = match store.read(&log) {
        ReadOutcome::Loaded(records) => LogState::Records(records.len()),
        ReadOutcome::Missing => LogState::Missing,
        ReadOutcome::Corrupt { reason } => LogState::Corrupt { reason },
    };

    let fingerprint = match fs::read(&log) {
        Ok(bytes) => Some(hex::encode(blake3::hash(&bytes).as_bytes())),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    let checkpoint_exists = checkpoint.is_file();
    let checkpoint_error = if checkpoint_exists {
        CheckpointDocument::read(&checkpoint).err().map(|e| e.to_string())
    } else {
        None
    };

    Ok(PhaseReport {
        phase: phase.to_string(),
        state,
        fingerprint,
        backups: store.list_backups(&log)?.len(),
        temp_files: temp_files(&layout.phase_dir(project, phase)?)?,
        checkpoint_exists,
        checkpoint_error,
        pending: checkpoint_pending(&log, &checkpoint),
        log,
    })
}

fn temp_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(e.into()),
    };

    let mut found = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "tmp") {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}
