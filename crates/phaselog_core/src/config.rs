//! Configuration for a phaselog projects root.

use crate::error::{PhaseLogError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// File name of the configuration inside the projects root.
pub const CONFIG_FILE: &str = "phaselog.toml";

/// Comprehensive configuration for a projects root.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// File and directory naming.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Backup retention (unbounded unless configured).
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Checkpoint builder settings.
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Phase naming convention.
    #[serde(default)]
    pub phases: PhaseConfig,

    /// Optional external summarizer program.
    #[serde(default)]
    pub summarizer: SummarizerConfig,
}

impl Config {
    /// Load configuration from the projects root.
    ///
    /// A missing file yields the defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| PhaseLogError::ConfigError(format!("failed to read config: {}", e)))?;
            toml::from_str(&content)
                .map_err(|e| PhaseLogError::ConfigError(format!("failed to parse config: {}", e)))
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to the projects root.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = root.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)
            .map_err(|e| PhaseLogError::ConfigError(format!("failed to serialize config: {}", e)))?;
        fs::write(&path, content)
            .map_err(|e| PhaseLogError::ConfigError(format!("failed to write config: {}", e)))?;
        Ok(())
    }
}

/// File and directory naming inside each phase directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Prefix of the log file name, `{prefix}_{phase}.json` (default: "contextmemory").
    pub log_prefix: String,

    /// Name of the per-phase backup directory (default: "backups").
    pub backup_dir: String,

    /// Name of the per-phase checkpoint document (default: "context.md").
    pub checkpoint_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_prefix: "contextmemory".to_string(),
            backup_dir: "backups".to_string(),
            checkpoint_file: "context.md".to_string(),
        }
    }
}

/// Backup retention.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Keep at most this many backups per log. `None` keeps every backup.
    pub max_backups: Option<usize>,
}

/// Checkpoint builder settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointConfig {
    /// Title used when the root checkpoint has none.
    pub default_title: String,

    /// How many user messages feed the fallback summary (default: 3).
    pub fallback_user_messages: usize,

    /// Per-message character cap in the fallback summary (default: 100).
    pub fallback_item_chars: usize,

    /// Total character cap of the fallback summary (default: 250).
    pub fallback_max_chars: usize,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            default_title: "Untitled Project".to_string(),
            fallback_user_messages: 3,
            fallback_item_chars: 100,
            fallback_max_chars: 250,
        }
    }
}

/// Phase naming convention.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseConfig {
    /// Directories starting with this prefix are phases (default: "fase").
    pub prefix: String,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            prefix: "fase".to_string(),
        }
    }
}

/// External summarizer program.
///
/// The program receives the rendered transcript on stdin and prints the
/// summary on stdout.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SummarizerConfig {
    /// Program to run. `None` disables summarization, so checkpoints use the fallback.
    pub command: Option<String>,

    /// Extra arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,
}
