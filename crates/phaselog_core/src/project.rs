//! Project catalog: creating, listing, renaming and advancing projects.

use crate::checkpoint::{read_title, CheckpointBuild, CheckpointBuilder};
use crate::error::{PhaseLogError, Result};
use crate::hierarchy::HierarchyLoader;
use crate::layout::{slugify, ProjectLayout, MAIN_PHASE};
use crate::store::{self, RecordStore};
use crate::types::{CheckpointDocument, CheckpointMetadata, ExchangeRecord, RecoveryOutcome};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

const CREATED_SUMMARY: &str = "Project created.";

/// A project as shown in listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSummary {
    /// Directory name.
    pub slug: String,
    /// Title from the root checkpoint, or the slug.
    pub title: String,
    /// `main` followed by the phase directories in order.
    pub phases: Vec<String>,
    /// Modification time of the project directory.
    pub modified: Option<SystemTime>,
}

/// Persistence state of one phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseStatus {
    /// Records of the phase log; empty if missing.
    pub history: Vec<ExchangeRecord>,
    /// Backup the log was restored from while reading it, if it was corrupt.
    pub recovered_from: Option<PathBuf>,
    /// Whether the phase has a checkpoint.
    pub checkpoint_exists: bool,
    /// Log changed after the checkpoint was written (or was never checkpointed).
    pub pending: bool,
    /// Modification time of the log.
    pub log_modified: Option<SystemTime>,
}

/// Result of closing a phase.
#[derive(Debug, Clone)]
pub struct ClosedPhase {
    /// The checkpoint that was built.
    pub build: CheckpointBuild,
    /// Where it was written.
    pub checkpoint: PathBuf,
    /// Name of the phase opened next.
    pub next_phase: String,
}

/// Project-level operations over a projects root.
#[derive(Clone)]
pub struct ProjectCatalog {
    layout: ProjectLayout,
    store: RecordStore,
    checkpoints: CheckpointBuilder,
}

impl ProjectCatalog {
    /// Creates a catalog whose checkpoints use the fallback summary.
    pub fn new(layout: ProjectLayout, store: RecordStore) -> Self {
        let checkpoints = CheckpointBuilder::new(layout.clone(), store.clone());
        Self {
            layout,
            store,
            checkpoints,
        }
    }

    /// Uses `checkpoints` to build phase checkpoints.
    pub fn with_checkpoint_builder(mut self, checkpoints: CheckpointBuilder) -> Self {
        self.checkpoints = checkpoints;
        self
    }

    /// Returns the layout.
    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Creates a project with an empty `main` log and a titled root checkpoint.
    ///
    /// Returns the project slug.
    ///
    /// # Errors
    ///
    /// Returns `InvalidProject` if `name` has no usable characters,
    /// `EmptyTitle` for a blank title and `ProjectExists` if the directory is
    /// already there.
    pub fn create_project(&self, name: &str, title: &str) -> Result<String> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(PhaseLogError::InvalidProject(name.to_string()));
        }
        let title = title.trim();
        if title.is_empty() {
            return Err(PhaseLogError::EmptyTitle);
        }

        let project_dir = self.layout.project_dir(&slug)?;
        if project_dir.exists() {
            return Err(PhaseLogError::ProjectExists(slug));
        }

        let log = self.layout.log_path(&slug, MAIN_PHASE)?;
        if let Some(parent) = log.parent() {
            fs::create_dir_all(parent)?;
        }
        store::write_records(&log, &[])?;

        let root = CheckpointDocument {
            metadata: CheckpointMetadata {
                title: title.to_string(),
                tags: vec![MAIN_PHASE.to_string()],
                created: self
                    .store
                    .clock()
                    .now()
                    .format(crate::checkpoint::CREATED_FORMAT)
                    .to_string(),
                summary: CREATED_SUMMARY.to_string(),
            },
            body: String::new(),
        };
        fs::write(self.layout.root_checkpoint_path(&slug)?, root.render()?)?;

        info!("Created project {} ({})", slug, title);
        Ok(slug)
    }

    /// Lists every project, most recently modified first.
    pub fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        let entries = match fs::read_dir(self.layout.root()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        let loader = HierarchyLoader::new(self.layout.clone(), self.store.clone());
        let mut projects = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(slug) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };

            let title = read_title(&self.layout.root_checkpoint_path(&slug)?)
                .unwrap_or_else(|| slug.clone());
            let mut phases = Vec::new();
            if self.layout.project_dir(&slug)?.join(MAIN_PHASE).is_dir() {
                phases.push(MAIN_PHASE.to_string());
            }
            phases.extend(loader.discover_phases(&slug)?);

            projects.push(ProjectSummary {
                modified: entry.metadata().and_then(|m| m.modified()).ok(),
                slug,
                title,
                phases,
            });
        }

        projects.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.slug.cmp(&b.slug)));
        Ok(projects)
    }

    /// Sets a new project title in the root checkpoint.
    ///
    /// Only the `title:` line changes; the rest of the document is kept. A
    /// root checkpoint without a title line is rewritten with a fresh header.
    pub fn rename_project(&self, project: &str, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(PhaseLogError::EmptyTitle);
        }
        self.require_project(project)?;

        let path = self.layout.root_checkpoint_path(project)?;
        let title_line = format!("title: {}", yaml_scalar(title)?);

        let existing = match fs::read_to_string(&path) {
            Ok(raw) => Some(raw),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let rewritten = existing.as_deref().and_then(|raw| replace_title_line(raw, &title_line));
        let content = match rewritten {
            Some(content) => content,
            None => {
                if existing.is_some() {
                    warn!("Root checkpoint of {} has no title line; rewriting header", project);
                }
                let doc = CheckpointDocument {
                    metadata: CheckpointMetadata {
                        title: title.to_string(),
                        tags: vec![MAIN_PHASE.to_string()],
                        created: String::new(),
                        summary: String::new(),
                    },
                    body: existing
                        .as_deref()
                        .map(|raw| {
                            CheckpointDocument::parse(raw)
                                .map(|d| d.body)
                                .unwrap_or_else(|_| raw.to_string())
                        })
                        .unwrap_or_default(),
                };
                doc.render()?
            }
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        info!("Renamed project {} to {}", project, title);
        Ok(())
    }

    /// Reports the persisted state of a phase.
    ///
    /// A corrupt log is restored from its newest usable backup first.
    ///
    /// # Errors
    ///
    /// Returns `CorruptedLog` if the log is corrupt and no backup parses.
    pub fn phase_status(&self, project: &str, phase: &str) -> Result<PhaseStatus> {
        self.require_project(project)?;
        let log = self.layout.log_path(project, phase)?;
        let checkpoint = self.layout.checkpoint_path(project, phase)?;

        let outcome = self.store.load_with_recovery(&log)?;
        let recovered_from = match &outcome {
            RecoveryOutcome::Recovered { backup, .. } => Some(backup.clone()),
            _ => None,
        };

        Ok(PhaseStatus {
            history: outcome.into_result(&log)?,
            recovered_from,
            checkpoint_exists: checkpoint.is_file(),
            pending: checkpoint_pending(&log, &checkpoint),
            log_modified: modified(&log),
        })
    }

    /// Checkpoints `phase` and opens the next phase with an empty log.
    ///
    /// The next phase is `{prefix} {n + 1}` where `n` counts the existing
    /// phase directories. An existing log there is left alone.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` for an unknown project and
    /// `CheckpointInProgress` while another close of the same phase runs.
    pub fn close_phase(&self, project: &str, phase: &str) -> Result<ClosedPhase> {
        self.require_project(project)?;
        let (build, checkpoint) = self.checkpoints.generate(project, phase)?;

        let loader = HierarchyLoader::new(self.layout.clone(), self.store.clone());
        let next_phase = self
            .layout
            .phase_name(loader.discover_phases(project)?.len() + 1);
        let next_log = self.layout.log_path(project, &next_phase)?;
        if let Some(parent) = next_log.parent() {
            fs::create_dir_all(parent)?;
        }
        if !next_log.exists() {
            store::write_records(&next_log, &[])?;
        }

        info!("Closed {}/{}; next phase is {}", project, phase, next_phase);
        Ok(ClosedPhase {
            build,
            checkpoint,
            next_phase,
        })
    }

    fn require_project(&self, project: &str) -> Result<()> {
        if self.layout.project_dir(project)?.is_dir() {
            Ok(())
        } else {
            Err(PhaseLogError::ProjectNotFound(project.to_string()))
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// True if the log exists and changed after the checkpoint was written.
pub(crate) fn checkpoint_pending(log: &Path, checkpoint: &Path) -> bool {
    match (modified(log), modified(checkpoint)) {
        (Some(log), Some(checkpoint)) => log > checkpoint,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Renders a string as a single-line YAML scalar, quoting when needed.
fn yaml_scalar(value: &str) -> Result<String> {
    let rendered = serde_yaml::to_string(value)
        .map_err(|e| PhaseLogError::Serialization(e.to_string()))?;
    Ok(rendered.trim_end().to_string())
}

/// Replaces the first `title:` line, keeping line endings of the rest.
fn replace_title_line(raw: &str, title_line: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len() + title_line.len());
    let mut replaced = false;
    for line in raw.split_inclusive('\n') {
        if !replaced && line.trim_start().starts_with("title:") {
            out.push_str(title_line);
            if line.ends_with('\n') {
                out.push('\n');
            }
            replaced = true;
        } else {
            out.push_str(line);
        }
    }
    replaced.then_some(out)
}
