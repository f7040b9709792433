//! On-disk layout of a projects root.
//!
//! ```text
//! {root}/
//!   phaselog.toml
//!   {project}/
//!     main/
//!       contextmemory_main.json
//!       context.md
//!       backups/contextmemory_main_YYYYMMDD_HHMMSS.bak
//!     fase 1/
//!       contextmemory_fase 1.json
//!       context.md
//!       backups/
//! ```

use crate::config::{Config, StorageConfig};
use crate::error::{PhaseLogError, Result};
use std::path::{Path, PathBuf};

/// Folder name of the root phase of every project.
pub const MAIN_PHASE: &str = "main";

/// Maps projects and phases onto paths under a projects root.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
    storage: StorageConfig,
    phase_prefix: String,
}

impl ProjectLayout {
    /// Creates a layout with default naming.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self::from_config(root, &Config::default())
    }

    /// Creates a layout following the storage and phase sections of `config`.
    pub fn from_config(root: impl AsRef<Path>, config: &Config) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            storage: config.storage.clone(),
            phase_prefix: config.phases.prefix.clone(),
        }
    }

    /// Returns the projects root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the phase-name prefix (e.g. `fase`).
    pub fn phase_prefix(&self) -> &str {
        &self.phase_prefix
    }

    /// Returns the directory of a project.
    ///
    /// # Errors
    ///
    /// Returns `InvalidProject` for names that would escape the projects root.
    pub fn project_dir(&self, project: &str) -> Result<PathBuf> {
        if !is_single_component(project) {
            return Err(PhaseLogError::InvalidProject(project.to_string()));
        }
        Ok(self.root.join(project))
    }

    /// Maps a phase name onto its folder name.
    ///
    /// `main` in any casing maps to the fixed `main` folder; every other phase
    /// is used verbatim.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPhase` for names that would escape the project directory.
    pub fn phase_folder(phase: &str) -> Result<String> {
        if phase.eq_ignore_ascii_case(MAIN_PHASE) {
            return Ok(MAIN_PHASE.to_string());
        }
        if !is_single_component(phase) {
            return Err(PhaseLogError::InvalidPhase(phase.to_string()));
        }
        Ok(phase.to_string())
    }

    /// Returns the directory of a phase.
    pub fn phase_dir(&self, project: &str, phase: &str) -> Result<PathBuf> {
        Ok(self.project_dir(project)?.join(Self::phase_folder(phase)?))
    }

    /// Returns the log file of a phase.
    pub fn log_path(&self, project: &str, phase: &str) -> Result<PathBuf> {
        let folder = Self::phase_folder(phase)?;
        Ok(self
            .project_dir(project)?
            .join(&folder)
            .join(format!("{}_{}.json", self.storage.log_prefix, folder)))
    }

    /// Returns the checkpoint document of a phase.
    pub fn checkpoint_path(&self, project: &str, phase: &str) -> Result<PathBuf> {
        Ok(self
            .phase_dir(project, phase)?
            .join(&self.storage.checkpoint_file))
    }

    /// Returns the root checkpoint of a project (the `main` phase checkpoint).
    pub fn root_checkpoint_path(&self, project: &str) -> Result<PathBuf> {
        Ok(self
            .project_dir(project)?
            .join(MAIN_PHASE)
            .join(&self.storage.checkpoint_file))
    }

    /// Returns true if a directory name follows the phase-naming convention.
    pub fn is_phase_name(&self, name: &str) -> bool {
        name.to_lowercase()
            .starts_with(&self.phase_prefix.to_lowercase())
    }

    /// Returns the name of the `n`th phase, e.g. `fase 3`.
    pub fn phase_name(&self, n: usize) -> String {
        format!("{} {}", self.phase_prefix, n)
    }
}

/// A name usable as exactly one path component.
fn is_single_component(name: &str) -> bool {
    !(name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\'))
}

/// Turns a display name into a directory-safe project slug.
///
/// Runs of non-alphanumeric ASCII characters collapse to `_`; leading and
/// trailing underscores are dropped.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;

    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c);
        } else {
            pending_sep = true;
        }
    }

    slug
}
