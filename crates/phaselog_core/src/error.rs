//! Error types for phaselog_core operations.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for phaselog_core operations.
///
/// Only hard failures surface here. Missing or corrupt logs and summarizer
/// failures are reported through the typed outcomes in [`crate::types`]
/// instead.
#[derive(Error, Debug)]
pub enum PhaseLogError {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error while writing a log or checkpoint.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The log file is not a list of exchange records and no backup replaces it.
    #[error("corrupted log at {}: {}", path.display(), reason)]
    CorruptedLog {
        /// Path to the corrupted log
        path: PathBuf,
        /// Description of the corruption
        reason: String,
    },

    /// The checkpoint file has no readable metadata header.
    #[error("invalid checkpoint at {}: {}", path.display(), reason)]
    InvalidCheckpoint {
        /// Path to the checkpoint file
        path: PathBuf,
        /// Description of what's invalid
        reason: String,
    },

    /// The external summarizer failed or returned nothing usable.
    #[error("summarizer failed: {0}")]
    Summarizer(String),

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Phase name cannot be mapped onto a directory.
    #[error("invalid phase name: {0:?}")]
    InvalidPhase(String),

    /// Project name is empty after slugifying, or otherwise unusable.
    #[error("invalid project name: {0:?}")]
    InvalidProject(String),

    /// Project directory does not exist.
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    /// Project directory already exists.
    #[error("project already exists: {0}")]
    ProjectExists(String),

    /// A new project title was empty.
    #[error("project title must not be empty")]
    EmptyTitle,

    /// Another caller is already building the checkpoint for this phase.
    #[error("checkpoint for {project}/{phase} is already being built")]
    CheckpointInProgress {
        /// Project slug
        project: String,
        /// Phase name
        phase: String,
    },
}

impl PhaseLogError {
    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::CorruptedLog { .. } => Some(
                "No backup of this log parses; inspect it and 'phaselog backups <project> --phase <phase>' by hand.",
            ),
            Self::InvalidCheckpoint { .. } => {
                Some("Rebuild the checkpoint with 'phaselog checkpoint <project> <phase>'.")
            }
            Self::ProjectNotFound(_) => Some("List known projects with 'phaselog projects'."),
            Self::ProjectExists(_) => Some("Pick another name or keep working in the existing project."),
            Self::CheckpointInProgress { .. } => {
                Some("Wait for the running checkpoint build to finish, then retry.")
            }
            Self::ConfigError(_) => Some("Check phaselog.toml in the projects root."),
            _ => None,
        }
    }
}

/// Convenience Result type for phaselog_core operations.
pub type Result<T> = std::result::Result<T, PhaseLogError>;
