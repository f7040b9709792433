//! Loads a project's accumulated checkpoints up to a given phase.

use crate::error::Result;
use crate::layout::{ProjectLayout, MAIN_PHASE};
use crate::store::RecordStore;
use crate::types::{PhaseContext, ProjectHierarchy};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::warn;

/// Reads checkpoints and the live log of a project.
#[derive(Clone)]
pub struct HierarchyLoader {
    layout: ProjectLayout,
    store: RecordStore,
}

impl HierarchyLoader {
    /// Creates a loader.
    pub fn new(layout: ProjectLayout, store: RecordStore) -> Self {
        Self { layout, store }
    }

    /// Lists the phase directories of a project in lexicographic order.
    ///
    /// Only immediate subdirectories following the phase-naming convention
    /// count. Lexicographic order puts `fase 10` before `fase 2`.
    pub fn discover_phases(&self, project: &str) -> Result<Vec<String>> {
        let dir = self.layout.project_dir(project)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        let mut phases = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if self.layout.is_phase_name(name) {
                    phases.push(name.to_string());
                }
            }
        }

        phases.sort();
        Ok(phases)
    }

    /// Collects the root checkpoint and every phase checkpoint up to and
    /// including `current_phase`, plus the current phase's live log.
    ///
    /// For `main` only the root checkpoint is included. If `current_phase`
    /// is not among the discovered phases, every phase is included.
    /// Missing checkpoints contribute empty content; the live log is read
    /// without recovery.
    pub fn load_hierarchy(&self, project: &str, current_phase: &str) -> Result<ProjectHierarchy> {
        let root = read_markdown(&self.layout.root_checkpoint_path(project)?);
        let mut merged_text = root.clone();
        let mut static_contexts = vec![PhaseContext {
            phase: MAIN_PHASE.to_string(),
            content: root,
        }];

        if !current_phase.eq_ignore_ascii_case(MAIN_PHASE) {
            for phase in self.discover_phases(project)? {
                let content = read_markdown(&self.layout.checkpoint_path(project, &phase)?);
                merged_text.push_str(&format!(
                    "\n\n# --- {} ---\n\n{}",
                    phase.to_uppercase(),
                    content
                ));
                let is_current = phase == current_phase;
                static_contexts.push(PhaseContext { phase, content });
                if is_current {
                    break;
                }
            }
        }

        let live_records = self
            .store
            .load(&self.layout.log_path(project, current_phase)?);

        Ok(ProjectHierarchy {
            static_contexts,
            live_records,
            merged_text,
        })
    }
}

fn read_markdown(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                warn!("Could not read checkpoint {}: {}", path.display(), e);
            }
            String::new()
        }
    }
}
