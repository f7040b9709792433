use super::assertions::Assertion;
use super::clock::MockClock;
use super::steps::ScenarioStep;
use super::workspace::TestProjects;
use anyhow::{anyhow, Context, Result};
use phaselog_core::{
    recover_project, temp_path, verify_project, CheckpointBuilder, CheckpointDocument, Config,
    ExchangeRecord, HierarchyLoader, Meta, PhaseSession, ProjectCatalog, ProjectHierarchy,
    ProjectLayout, ReadOutcome, RecordStore, RecoveryReport, Role, SessionKey, SessionManager,
};
use std::fs;
use std::time::Duration;

/// Executes scenarios against a real projects root
pub struct ScenarioRunner {
    projects: TestProjects,
    clock: MockClock,
    layout: ProjectLayout,
    store: RecordStore,
    checkpoints: CheckpointBuilder,
    manager: SessionManager,
    project: Option<String>,
    last_recovery: Option<RecoveryReport>,
    current_step: usize,
}

impl ScenarioRunner {
    /// Create a runner over a fresh projects root
    pub fn new(config: Config, summary: Option<String>) -> Result<Self> {
        let projects = TestProjects::with_config(config)?;
        let config = projects.config()?;
        let clock = MockClock::new();
        let layout = projects.layout();
        let store = projects.store(&clock);

        let mut checkpoints =
            CheckpointBuilder::new(layout.clone(), store.clone()).with_config(&config);
        if let Some(text) = summary {
            checkpoints = checkpoints.with_summarizer(
                move |_: &[ExchangeRecord]| -> phaselog_core::Result<String> { Ok(text.clone()) },
            );
        }

        Ok(Self {
            manager: SessionManager::new(layout.clone(), store.clone()),
            projects,
            clock,
            layout,
            store,
            checkpoints,
            project: None,
            last_recovery: None,
            current_step: 0,
        })
    }

    /// Get current step number
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Execute all steps in sequence
    pub fn execute(&mut self, steps: &[ScenarioStep]) -> Result<()> {
        for (i, step) in steps.iter().enumerate() {
            self.current_step = i;
            self.execute_step(step)
                .with_context(|| format!("Step {}: {:?}", i, step))?;
        }
        Ok(())
    }

    fn execute_step(&mut self, step: &ScenarioStep) -> Result<()> {
        match step {
            ScenarioStep::CreateProject { name, title } => {
                let slug = self.catalog().create_project(name, title)?;
                self.project = Some(slug);
                Ok(())
            }
            ScenarioStep::Rename { title } => {
                let project = self.project()?;
                self.catalog().rename_project(&project, title)?;
                Ok(())
            }

            ScenarioStep::Append {
                phase,
                role,
                content,
                meta,
            } => self.handle_append(phase, *role, content, meta.clone()),
            ScenarioStep::Rollback { phase } => {
                self.phase_session(phase)?.rollback()?;
                Ok(())
            }

            ScenarioStep::LiveUser { phase, content } => {
                let key = self.key(phase)?;
                self.manager.get_or_open(&key)?.record_user(content)?;
                Ok(())
            }
            ScenarioStep::LiveAssistant {
                phase,
                content,
                meta,
            } => {
                let key = self.key(phase)?;
                self.manager
                    .get_or_open(&key)?
                    .record_assistant(content, meta.clone())?;
                Ok(())
            }
            ScenarioStep::EditBuffer {
                phase,
                index,
                content,
            } => {
                let key = self.key(phase)?;
                let buffer = self.manager.get_or_open(&key)?.buffer_mut();
                let turn = buffer
                    .get_mut(*index)
                    .ok_or_else(|| anyhow!("No turn {} in buffer of {}", index, phase))?;
                turn.content = content.clone();
                Ok(())
            }
            ScenarioStep::DropFromBuffer { phase, index } => {
                let key = self.key(phase)?;
                let buffer = self.manager.get_or_open(&key)?.buffer_mut();
                if *index >= buffer.len() {
                    return Err(anyhow!("No turn {} in buffer of {}", index, phase));
                }
                buffer.remove(*index);
                Ok(())
            }
            ScenarioStep::Evict { phase } => {
                let key = self.key(phase)?;
                self.manager
                    .evict(&key)?
                    .ok_or_else(|| anyhow!("No live session for {}", phase))?;
                Ok(())
            }

            ScenarioStep::Checkpoint { phase } => {
                let project = self.project()?;
                self.checkpoints.generate(&project, phase)?;
                Ok(())
            }
            ScenarioStep::ClosePhase { phase } => {
                let project = self.project()?;
                self.catalog().close_phase(&project, phase)?;
                Ok(())
            }

            ScenarioStep::AdvanceSecs { secs } => {
                self.clock.advance(Duration::from_secs(*secs));
                Ok(())
            }

            ScenarioStep::CorruptLog { phase } => {
                let log = self.log(phase)?;
                fs::write(&log, b"{\"timestamp\": \"2026-03-14T09:26:53\", trunc")?;
                Ok(())
            }
            ScenarioStep::InterruptedWrite { phase } => {
                let log = self.log(phase)?;
                fs::write(temp_path(&log), b"[{\"timestamp\": \"2026-")?;
                Ok(())
            }
            ScenarioStep::Recover => {
                let project = self.project()?;
                self.last_recovery = Some(recover_project(&self.layout, &self.store, &project)?);
                Ok(())
            }

            ScenarioStep::Assert { assertion } => self.handle_assertion(assertion),
        }
    }

    fn handle_append(&mut self, phase: &str, role: Role, content: &str, meta: Option<Meta>) -> Result<()> {
        self.phase_session(phase)?.save(role, content, meta)?;
        Ok(())
    }

    // ===== Helpers =====

    fn catalog(&self) -> ProjectCatalog {
        ProjectCatalog::new(self.layout.clone(), self.store.clone())
            .with_checkpoint_builder(self.checkpoints.clone())
    }

    fn project(&self) -> Result<String> {
        self.project
            .clone()
            .ok_or_else(|| anyhow!("Scenario has no project; call .project() first"))
    }

    fn key(&self, phase: &str) -> Result<SessionKey> {
        Ok(SessionKey::new(self.project()?, phase))
    }

    fn phase_session(&self, phase: &str) -> Result<PhaseSession> {
        let project = self.project()?;
        Ok(PhaseSession::open(
            &self.layout,
            self.store.clone(),
            &project,
            phase,
        )?)
    }

    fn log(&self, phase: &str) -> Result<std::path::PathBuf> {
        let project = self.project()?;
        self.projects.log_path(&project, phase)
    }

    fn records(&self, phase: &str) -> Result<Vec<ExchangeRecord>> {
        Ok(self.store.load(&self.log(phase)?))
    }

    fn record(&self, phase: &str, index: usize) -> Result<ExchangeRecord> {
        self.records(phase)?
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("No record {} in {}", index, phase))
    }

    fn checkpoint(&self, phase: &str) -> Result<CheckpointDocument> {
        let project = self.project()?;
        let path = self.layout.checkpoint_path(&project, phase)?;
        Ok(CheckpointDocument::read(&path)?)
    }

    fn hierarchy(&self, current: &str) -> Result<ProjectHierarchy> {
        let project = self.project()?;
        Ok(HierarchyLoader::new(self.layout.clone(), self.store.clone())
            .load_hierarchy(&project, current)?)
    }

    // ===== Assertions =====

    fn handle_assertion(&mut self, assertion: &Assertion) -> Result<()> {
        match assertion {
            Assertion::RecordCount { phase, count } => {
                let actual = self.records(phase)?.len();
                check(actual == *count, || {
                    format!("Record count mismatch in {}: expected {}, got {}", phase, count, actual)
                })
            }
            Assertion::ContentAt {
                phase,
                index,
                content,
            } => {
                let record = self.record(phase, *index)?;
                check(record.content == *content, || {
                    format!(
                        "Content mismatch at {}[{}]: expected {:?}, got {:?}",
                        phase, index, content, record.content
                    )
                })
            }
            Assertion::MetaAt {
                phase,
                index,
                key,
                value,
            } => {
                let record = self.record(phase, *index)?;
                let actual = record.meta.as_ref().and_then(|m| m.get(key));
                check(actual == Some(value), || {
                    format!(
                        "Meta mismatch at {}[{}].{}: expected {}, got {:?}",
                        phase, index, key, value, actual
                    )
                })
            }
            Assertion::NoMetaAt { phase, index } => {
                let record = self.record(phase, *index)?;
                check(record.meta.is_none(), || {
                    format!("Expected no meta at {}[{}], got {:?}", phase, index, record.meta)
                })
            }
            Assertion::LogCorrupt { phase } => {
                let outcome = self.store.read(&self.log(phase)?);
                check(matches!(outcome, ReadOutcome::Corrupt { .. }), || {
                    format!("Expected corrupt log in {}, got {:?}", phase, outcome)
                })
            }

            Assertion::BackupCount { phase, count } => {
                let actual = self.store.list_backups(&self.log(phase)?)?.len();
                check(actual == *count, || {
                    format!("Backup count mismatch in {}: expected {}, got {}", phase, count, actual)
                })
            }
            Assertion::BackupCountGte { phase, min } => {
                let actual = self.store.list_backups(&self.log(phase)?)?.len();
                check(actual >= *min, || {
                    format!("Backup count too low in {}: expected >= {}, got {}", phase, min, actual)
                })
            }
            Assertion::LatestBackupMatchesLog { phase } => {
                let log = self.log(phase)?;
                let latest = self
                    .store
                    .list_backups(&log)?
                    .pop()
                    .ok_or_else(|| anyhow!("No backups for {}", phase))?;
                check(fs::read(&latest)? == fs::read(&log)?, || {
                    format!("Latest backup {} differs from the log", latest.display())
                })
            }

            Assertion::CheckpointTitle { phase, title } => {
                let doc = self.checkpoint(phase)?;
                check(doc.metadata.title == *title, || {
                    format!(
                        "Title mismatch in {}: expected {:?}, got {:?}",
                        phase, title, doc.metadata.title
                    )
                })
            }
            Assertion::CheckpointHasTag { phase, tag } => {
                let doc = self.checkpoint(phase)?;
                check(doc.metadata.tags.contains(tag), || {
                    format!("Tag {:?} missing in {}: {:?}", tag, phase, doc.metadata.tags)
                })
            }
            Assertion::CheckpointBodyContains { phase, text } => {
                let doc = self.checkpoint(phase)?;
                check(doc.body.contains(text.as_str()), || {
                    format!("Checkpoint body of {} lacks {:?}", phase, text)
                })
            }
            Assertion::Pending { phase, pending } => {
                let project = self.project()?;
                let status = self.catalog().phase_status(&project, phase)?;
                check(status.pending == *pending, || {
                    format!("Pending mismatch in {}: expected {}", phase, pending)
                })
            }
            Assertion::PhaseExists { phase } => {
                let project = self.project()?;
                let dir = self.layout.phase_dir(&project, phase)?;
                check(dir.is_dir(), || format!("Phase directory missing: {}", dir.display()))
            }

            Assertion::HierarchyPhases { current, phases } => {
                let hierarchy = self.hierarchy(current)?;
                let actual: Vec<String> = hierarchy
                    .static_contexts
                    .iter()
                    .map(|c| c.phase.clone())
                    .collect();
                check(actual == *phases, || {
                    format!("Hierarchy phases mismatch: expected {:?}, got {:?}", phases, actual)
                })
            }
            Assertion::HierarchyContains { current, text } => {
                let hierarchy = self.hierarchy(current)?;
                check(hierarchy.merged_text.contains(text.as_str()), || {
                    format!("Hierarchy up to {} lacks {:?}", current, text)
                })
            }
            Assertion::HierarchyExcludes { current, text } => {
                let hierarchy = self.hierarchy(current)?;
                check(!hierarchy.merged_text.contains(text.as_str()), || {
                    format!("Hierarchy up to {} unexpectedly has {:?}", current, text)
                })
            }
            Assertion::HierarchyLiveCount { current, count } => {
                let actual = self.hierarchy(current)?.live_records.len();
                check(actual == *count, || {
                    format!("Live record count mismatch: expected {}, got {}", count, actual)
                })
            }

            Assertion::VerifyHealthy => {
                let report = verify_project(&self.layout, &self.store, &self.project()?)?;
                check(!report.has_issues(), || report.summary())
            }
            Assertion::VerifyHasIssues => {
                let report = verify_project(&self.layout, &self.store, &self.project()?)?;
                check(report.has_issues(), || "Expected verification issues".to_string())
            }
            Assertion::Restored { phase } => {
                let report = self
                    .last_recovery
                    .as_ref()
                    .ok_or_else(|| anyhow!("No recovery has run"))?;
                check(report.restored.iter().any(|(p, _)| p == phase), || {
                    format!("{} was not restored: {}", phase, report.summary())
                })
            }
            Assertion::NoTempFiles => {
                let report = verify_project(&self.layout, &self.store, &self.project()?)?;
                let leftovers: usize = report.phases.iter().map(|p| p.temp_files.len()).sum();
                check(leftovers == 0, || format!("{} temp files left", leftovers))
            }

            Assertion::SessionOpen { phase } => {
                let key = self.key(phase)?;
                check(self.manager.contains(&key), || format!("No live session for {}", phase))
            }
            Assertion::SessionClosed { phase } => {
                let key = self.key(phase)?;
                check(!self.manager.contains(&key), || {
                    format!("Live session for {} still open", phase)
                })
            }

            Assertion::Custom(f, _) => {
                let log = self.log(MAIN)?;
                f(&self.store, &log)
            }
        }
    }
}

const MAIN: &str = "main";

fn check(ok: bool, message: impl FnOnce() -> String) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(anyhow!(message()))
    }
}
