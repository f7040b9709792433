//! Phaselog Core Library
//!
//! Durable, phase-partitioned conversation memory for a local assistant:
//! - Crash-safe exchange logs with timestamped backups and rollback
//! - Phase checkpoints with inherited titles and summaries
//! - Hierarchical context loading across phases
//! - Reconciliation of an in-memory buffer back into the log
//!
//! # Quick Start
//!
//! ```
//! use phaselog_core::{ProjectLayout, RecordStore, Role};
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let layout = ProjectLayout::new(tmp.path());
//! let store = RecordStore::new();
//!
//! let log = layout.log_path("alpha", "fase 1").unwrap();
//! store.append(&log, Role::User, "how do we start?", None).unwrap();
//!
//! assert_eq!(store.load(&log).len(), 1);
//! ```
//!
//! # Checkpoints and hierarchy
//!
//! Closing a phase writes its checkpoint and opens the next phase. Loading
//! the hierarchy stitches every checkpoint up to the current phase together:
//!
//! ```
//! use phaselog_core::{HierarchyLoader, ProjectCatalog, ProjectLayout, RecordStore, Role};
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let layout = ProjectLayout::new(tmp.path());
//! let store = RecordStore::new();
//! let catalog = ProjectCatalog::new(layout.clone(), store.clone());
//!
//! let project = catalog.create_project("alpha", "Alpha").unwrap();
//! let log = layout.log_path(&project, "main").unwrap();
//! store.append(&log, Role::User, "plan the work", None).unwrap();
//!
//! let closed = catalog.close_phase(&project, "main").unwrap();
//! assert_eq!(closed.next_phase, "fase 1");
//!
//! let hierarchy = HierarchyLoader::new(layout, store)
//!     .load_hierarchy(&project, "fase 1")
//!     .unwrap();
//! assert!(hierarchy.merged_text.contains("USER: plan the work"));
//! ```

mod checkpoint;
mod config;
mod error;
mod hierarchy;
mod layout;
mod manager;
mod project;
mod reconcile;
mod session;
mod store;
mod summarizer;
mod types;
mod verify;

pub use checkpoint::{
    fallback_summary, phase_tags, read_title, render_transcript, BuildLock, CheckpointBuild,
    CheckpointBuilder, CREATED_FORMAT,
};
pub use config::{
    CheckpointConfig, Config, PhaseConfig, RetentionConfig, StorageConfig, SummarizerConfig,
    CONFIG_FILE,
};
pub use error::{PhaseLogError, Result};
pub use hierarchy::HierarchyLoader;
pub use layout::{slugify, ProjectLayout, MAIN_PHASE};
pub use manager::{SessionKey, SessionManager};
pub use project::{ClosedPhase, PhaseStatus, ProjectCatalog, ProjectSummary};
pub use reconcile::{finalize, reconcile};
pub use session::{LiveSession, PhaseSession};
pub use store::{temp_path, RecordStore, BACKUP_EXTENSION, BACKUP_TIME_FORMAT, RECORD_TIME_FORMAT};
pub use summarizer::{conversation_text, CommandSummarizer, NoSummarizer, Summarizer};
pub use types::*;
pub use verify::{recover_project, verify_project, LogState, PhaseReport, RecoveryReport, VerifyReport};

use chrono::NaiveDateTime;

/// Source of local wall-clock time.
///
/// Record timestamps, backup names and checkpoint dates all come from the
/// clock, so tests can inject a fixed or stepping one through
/// [`RecordStore::with_clock`].
pub trait Clock: Send + Sync {
    /// Returns the current local time.
    fn now(&self) -> NaiveDateTime;
}

impl<F> Clock for F
where
    F: Fn() -> NaiveDateTime + Send + Sync,
{
    fn now(&self) -> NaiveDateTime {
        self()
    }
}

/// The system's local clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}
