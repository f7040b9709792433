//! Core data types for phaselog.

use crate::error::{PhaseLogError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Who produced an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human side of the conversation.
    User,
    /// The model side of the conversation.
    Assistant,
}

impl Role {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "human" => Ok(Role::User),
            "assistant" | "ai" => Ok(Role::Assistant),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Auxiliary data attached to a record (timings, token counts, model name).
pub type Meta = Map<String, Value>;

/// One persisted user/assistant exchange.
///
/// Records carry no index: their position in the log is the ordering key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRecord {
    /// Local time of the append, ISO-8601 with second precision.
    pub timestamp: String,
    /// Author of the message.
    pub role: Role,
    /// Message text. May be empty.
    pub content: String,
    /// Optional metadata; absent rather than empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl ExchangeRecord {
    /// Returns the `(role, content)` view of this record.
    pub fn turn(&self) -> Turn {
        Turn {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// A `(role, content)` pair as held by an in-memory conversation buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// Author of the message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl Turn {
    /// Creates a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Result of a plain (non-recovering) log read.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// The log parsed as a list of records.
    Loaded(Vec<ExchangeRecord>),
    /// No log file exists yet.
    Missing,
    /// The file exists but could not be read as a list of records.
    Corrupt {
        /// What went wrong.
        reason: String,
    },
}

impl ReadOutcome {
    /// Collapses the outcome into a sequence, empty unless `Loaded`.
    pub fn into_records(self) -> Vec<ExchangeRecord> {
        match self {
            ReadOutcome::Loaded(records) => records,
            ReadOutcome::Missing | ReadOutcome::Corrupt { .. } => Vec::new(),
        }
    }

    /// Returns true if the file exists but is unreadable.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, ReadOutcome::Corrupt { .. })
    }
}

/// Result of a backup-aware log read.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome {
    /// The primary log was healthy.
    Clean(Vec<ExchangeRecord>),
    /// No log file exists yet.
    Missing,
    /// The primary was corrupt and has been rewritten from a backup.
    Recovered {
        /// Records restored from the backup.
        records: Vec<ExchangeRecord>,
        /// Backup the records came from.
        backup: PathBuf,
    },
    /// The primary was corrupt and no backup could replace it.
    /// The primary file is left untouched.
    Unrecoverable {
        /// What went wrong with the primary.
        reason: String,
    },
}

impl RecoveryOutcome {
    /// Borrowed view of the records, empty unless `Clean` or `Recovered`.
    pub fn records(&self) -> &[ExchangeRecord] {
        match self {
            RecoveryOutcome::Clean(records) | RecoveryOutcome::Recovered { records, .. } => {
                records
            }
            RecoveryOutcome::Missing | RecoveryOutcome::Unrecoverable { .. } => &[],
        }
    }

    /// Collapses the outcome into a sequence.
    pub fn into_records(self) -> Vec<ExchangeRecord> {
        match self {
            RecoveryOutcome::Clean(records) | RecoveryOutcome::Recovered { records, .. } => {
                records
            }
            RecoveryOutcome::Missing | RecoveryOutcome::Unrecoverable { .. } => Vec::new(),
        }
    }

    /// Turns an unrecoverable log at `log` into a `CorruptedLog` error.
    pub fn into_result(self, log: &Path) -> Result<Vec<ExchangeRecord>> {
        match self {
            RecoveryOutcome::Unrecoverable { reason } => Err(PhaseLogError::CorruptedLog {
                path: log.to_path_buf(),
                reason,
            }),
            other => Ok(other.into_records()),
        }
    }

    /// Returns true if a backup was restored over the primary.
    pub fn was_recovered(&self) -> bool {
        matches!(self, RecoveryOutcome::Recovered { .. })
    }
}

/// Where a checkpoint summary came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    /// The external summarizer produced the text.
    Generated(String),
    /// The summarizer failed; the text was built from the first user messages.
    Fallback {
        /// The fallback summary.
        text: String,
        /// Why the summarizer was not used.
        reason: String,
    },
}

impl SummaryOutcome {
    /// The summary text regardless of origin.
    pub fn text(&self) -> &str {
        match self {
            SummaryOutcome::Generated(text) | SummaryOutcome::Fallback { text, .. } => text,
        }
    }

    /// Returns true if the fallback was used.
    pub fn is_fallback(&self) -> bool {
        matches!(self, SummaryOutcome::Fallback { .. })
    }
}

/// Metadata header of a checkpoint document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Project title, inherited from the root checkpoint.
    pub title: String,
    /// Phase tag plus optional markers such as `debug`.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Local build time, `YYYY-MM-DD HH:MM`.
    #[serde(default)]
    pub created: String,
    /// Short summary of the phase.
    #[serde(default)]
    pub summary: String,
}

/// A phase checkpoint: metadata header plus rendered transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointDocument {
    /// Structured header.
    pub metadata: CheckpointMetadata,
    /// Free-form body, normally the rendered transcript.
    pub body: String,
}

/// Checkpoint content of one phase inside a hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseContext {
    /// Phase name (`main` for the root).
    pub phase: String,
    /// Raw checkpoint file content; empty if the phase was never checkpointed.
    pub content: String,
}

/// A project's cumulative knowledge up to one phase.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectHierarchy {
    /// Root checkpoint followed by phase checkpoints, in order.
    pub static_contexts: Vec<PhaseContext>,
    /// Live log of the current phase.
    pub live_records: Vec<ExchangeRecord>,
    /// Every checkpoint concatenated with phase section headers.
    pub merged_text: String,
}
