//! CLI commands.

pub mod backup;
pub mod checkpoint;
pub mod log;
pub mod project;
pub mod verify;

use anyhow::{Context, Result};
use phaselog_core::{
    CheckpointBuilder, CommandSummarizer, Config, PhaseSession, ProjectCatalog, ProjectLayout,
    RecordStore,
};
use std::path::Path;
use tracing::debug;

/// Everything a command needs to work on a projects root.
pub struct Workspace {
    pub config: Config,
    pub layout: ProjectLayout,
    pub store: RecordStore,
}

impl Workspace {
    /// Loads `phaselog.toml` from `root` (defaults if absent).
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root)
            .with_context(|| format!("Failed to load configuration from {}", root.display()))?;
        debug!(root = %root.display(), "Loaded configuration");
        Ok(Self {
            layout: ProjectLayout::from_config(root, &config),
            store: RecordStore::from_config(&config),
            config,
        })
    }

    /// Opens a phase of an existing project.
    pub fn phase(&self, project: &str, phase: &str) -> Result<PhaseSession> {
        self.require_project(project)?;
        let session = PhaseSession::open(&self.layout, self.store.clone(), project, phase)?;
        Ok(session)
    }

    /// Checkpoint builder wired to the configured summarizer, if any.
    pub fn checkpoints(&self) -> CheckpointBuilder {
        let builder =
            CheckpointBuilder::new(self.layout.clone(), self.store.clone()).with_config(&self.config);
        match CommandSummarizer::from_config(&self.config.summarizer) {
            Some(summarizer) => builder.with_summarizer(summarizer),
            None => builder,
        }
    }

    pub fn catalog(&self) -> ProjectCatalog {
        ProjectCatalog::new(self.layout.clone(), self.store.clone())
            .with_checkpoint_builder(self.checkpoints())
    }

    /// Fails unless the project directory exists.
    pub fn require_project(&self, project: &str) -> Result<()> {
        if !self.layout.project_dir(project)?.is_dir() {
            return Err(phaselog_core::PhaseLogError::ProjectNotFound(project.to_string()).into());
        }
        Ok(())
    }
}
