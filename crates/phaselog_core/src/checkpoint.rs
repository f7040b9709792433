//! Phase checkpoints: a YAML metadata header followed by the transcript.
//!
//! ```text
//! ---
//! title: Alpha
//! tags:
//! - fase 1
//! - debug
//! created: 2026-03-14 09:26
//! summary: ...
//! ---
//!
//! USER: ...
//!
//! ASSISTANT: ...
//! ```

use crate::config::{CheckpointConfig, Config};
use crate::error::{PhaseLogError, Result};
use crate::layout::ProjectLayout;
use crate::store::RecordStore;
use crate::summarizer::{NoSummarizer, Summarizer};
use crate::types::{
    CheckpointDocument, CheckpointMetadata, ExchangeRecord, RecoveryOutcome, Role, SummaryOutcome,
};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Format of the `created` header field.
pub const CREATED_FORMAT: &str = "%Y-%m-%d %H:%M";

const FRONT_MATTER_DELIMITER: &str = "---";
const LOCK_FILE: &str = ".checkpoint.lock";

impl CheckpointDocument {
    /// Renders the document as header block, blank line, body.
    pub fn render(&self) -> Result<String> {
        let yaml = serde_yaml::to_string(&self.metadata).map_err(|e| {
            PhaseLogError::Serialization(format!("failed to encode checkpoint header: {}", e))
        })?;
        Ok(format!(
            "{delim}\n{}\n{delim}\n\n{}\n",
            yaml.trim_end(),
            self.body.trim(),
            delim = FRONT_MATTER_DELIMITER
        ))
    }

    /// Parses a rendered document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCheckpoint` if the header block is missing or is not a
    /// metadata mapping with a `title`.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: String| PhaseLogError::InvalidCheckpoint {
            path: PathBuf::new(),
            reason,
        };

        let (header, body) =
            split_front_matter(raw).ok_or_else(|| invalid("missing metadata header".to_string()))?;
        let metadata: CheckpointMetadata = serde_yaml::from_str(header)
            .map_err(|e| invalid(format!("unreadable metadata header: {}", e)))?;

        Ok(Self {
            metadata,
            body: body.trim().to_string(),
        })
    }

    /// Reads and parses a checkpoint file.
    pub fn read(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::parse(&raw).map_err(|e| match e {
            PhaseLogError::InvalidCheckpoint { reason, .. } => PhaseLogError::InvalidCheckpoint {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }
}

/// Splits `raw` into the header between `---` lines and the remaining body.
fn split_front_matter(raw: &str) -> Option<(&str, &str)> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let first_end = raw.find('\n')?;
    if raw[..first_end].trim_end() != FRONT_MATTER_DELIMITER {
        return None;
    }

    let rest = &raw[first_end + 1..];
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FRONT_MATTER_DELIMITER {
            let header = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((header, body));
        }
        offset += line.len();
    }
    None
}

/// Reads the project title from a checkpoint header.
///
/// Falls back to scanning for a `title:` line, stripping quotes, so
/// hand-edited headers that are not valid YAML still yield their title.
/// Returns `None` when the file is missing or has no title.
pub fn read_title(path: &Path) -> Option<String> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            if path.exists() {
                warn!("Could not read title from {}: {}", path.display(), e);
            }
            return None;
        }
    };

    if let Ok(doc) = CheckpointDocument::parse(&raw) {
        let title = doc.metadata.title.trim();
        if !title.is_empty() {
            return Some(title.to_string());
        }
    }

    let scan = split_front_matter(&raw).map(|(header, _)| header).unwrap_or(&raw);
    scan.lines()
        .find_map(|line| line.trim().strip_prefix("title:").map(unquote))
        .filter(|title| !title.is_empty())
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);
    value.trim().to_string()
}

/// Renders records as `ROLE: content` paragraphs.
pub fn render_transcript(records: &[ExchangeRecord]) -> String {
    records
        .iter()
        .map(|r| format!("{}: {}", r.role.as_str().to_uppercase(), r.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Computes the tags of a phase checkpoint.
pub fn phase_tags(phase: &str, records: &[ExchangeRecord]) -> Vec<String> {
    let mut tags = vec![phase.to_lowercase()];
    if records
        .iter()
        .any(|r| r.content.to_lowercase().contains("error"))
    {
        tags.push("debug".to_string());
    }
    tags
}

/// Summary from the first user messages, used when the summarizer fails.
pub fn fallback_summary(records: &[ExchangeRecord], settings: &CheckpointConfig) -> String {
    let joined = records
        .iter()
        .filter(|r| r.role == Role::User)
        .take(settings.fallback_user_messages)
        .map(|r| truncate_chars(&r.content, settings.fallback_item_chars))
        .collect::<Vec<_>>()
        .join(" | ");
    truncate_chars(&joined, settings.fallback_max_chars)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Result of building a checkpoint.
#[derive(Debug, Clone)]
pub struct CheckpointBuild {
    /// The document ready to be written.
    pub document: CheckpointDocument,
    /// Where the summary came from.
    pub summary: SummaryOutcome,
    /// Number of records in the transcript.
    pub record_count: usize,
    /// Backup the log was restored from, if it had to be.
    pub recovered_from: Option<PathBuf>,
}

/// Builds and writes phase checkpoints.
#[derive(Clone)]
pub struct CheckpointBuilder {
    layout: ProjectLayout,
    store: RecordStore,
    summarizer: Arc<dyn Summarizer>,
    settings: CheckpointConfig,
}

impl CheckpointBuilder {
    /// Creates a builder without a summarizer; summaries use the fallback.
    pub fn new(layout: ProjectLayout, store: RecordStore) -> Self {
        Self {
            layout,
            store,
            summarizer: Arc::new(NoSummarizer),
            settings: CheckpointConfig::default(),
        }
    }

    /// Applies the checkpoint section of `config`.
    pub fn with_config(mut self, config: &Config) -> Self {
        self.settings = config.checkpoint.clone();
        self
    }

    /// Sets the summarizer.
    pub fn with_summarizer(mut self, summarizer: impl Summarizer + 'static) -> Self {
        self.summarizer = Arc::new(summarizer);
        self
    }

    /// Sets an already shared summarizer.
    pub fn with_shared_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    /// Returns the project title from the root checkpoint, or the default title.
    pub fn project_title(&self, project: &str) -> String {
        self.layout
            .root_checkpoint_path(project)
            .ok()
            .and_then(|path| read_title(&path))
            .unwrap_or_else(|| self.settings.default_title.clone())
    }

    /// Builds the checkpoint document of a phase without writing it.
    ///
    /// The log is read with backup recovery. A failing summarizer or a
    /// missing root title degrade to defaults instead of failing the build.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid phase name, or if restoring a corrupt
    /// log from backup fails to write.
    pub fn build(&self, project: &str, phase: &str) -> Result<CheckpointBuild> {
        let log = self.layout.log_path(project, phase)?;
        let outcome = self.store.load_with_recovery(&log)?;
        let recovered_from = match &outcome {
            RecoveryOutcome::Recovered { backup, .. } => Some(backup.clone()),
            RecoveryOutcome::Unrecoverable { reason } => {
                warn!("Building checkpoint of {}/{} from an empty log: {}", project, phase, reason);
                None
            }
            RecoveryOutcome::Clean(_) | RecoveryOutcome::Missing => None,
        };
        let records = outcome.into_records();

        let summary = self.summarize(&records);
        let metadata = CheckpointMetadata {
            title: self.project_title(project),
            tags: phase_tags(phase, &records),
            created: self.store.clock().now().format(CREATED_FORMAT).to_string(),
            summary: summary.text().to_string(),
        };

        Ok(CheckpointBuild {
            document: CheckpointDocument {
                metadata,
                body: render_transcript(&records),
            },
            summary,
            record_count: records.len(),
            recovered_from,
        })
    }

    /// Writes a checkpoint document, replacing any previous one.
    pub fn write(&self, project: &str, phase: &str, document: &CheckpointDocument) -> Result<PathBuf> {
        let path = self.layout.checkpoint_path(project, phase)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, document.render()?)?;
        info!("Checkpoint written to {}", path.display());
        Ok(path)
    }

    /// Builds and writes a checkpoint while holding the phase's build lock.
    ///
    /// # Errors
    ///
    /// Returns `CheckpointInProgress` if another build of the same phase holds the lock.
    pub fn generate(&self, project: &str, phase: &str) -> Result<(CheckpointBuild, PathBuf)> {
        let _lock = self.lock_phase(project, phase)?;
        let build = self.build(project, phase)?;
        let path = self.write(project, phase, &build.document)?;
        Ok((build, path))
    }

    /// Takes the advisory build lock of a phase.
    pub fn lock_phase(&self, project: &str, phase: &str) -> Result<BuildLock> {
        let dir = self.layout.phase_dir(project, phase)?;
        fs::create_dir_all(&dir)?;

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(dir.join(LOCK_FILE))?;
        file.try_lock_exclusive()
            .map_err(|_| PhaseLogError::CheckpointInProgress {
                project: project.to_string(),
                phase: phase.to_string(),
            })?;

        Ok(BuildLock { file: Some(file) })
    }

    fn summarize(&self, records: &[ExchangeRecord]) -> SummaryOutcome {
        let failure = match self.summarizer.summarize(records) {
            Ok(text) if !text.trim().is_empty() => {
                return SummaryOutcome::Generated(text.trim().to_string())
            }
            Ok(_) => "summarizer returned an empty summary".to_string(),
            Err(e) => e.to_string(),
        };

        warn!("Automatic summary failed, using fallback: {}", failure);
        SummaryOutcome::Fallback {
            text: fallback_summary(records, &self.settings),
            reason: failure,
        }
    }
}

/// RAII guard for a phase's checkpoint build lock.
pub struct BuildLock {
    file: Option<File>,
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}
