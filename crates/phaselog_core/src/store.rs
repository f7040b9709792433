//! Append-only exchange log with atomic replacement, backups and rollback.
//!
//! The store is path-agnostic: every operation takes the log file path and
//! derives the backup directory from the log's parent. Project layout lives in
//! [`crate::layout`].

use crate::config::Config;
use crate::error::{PhaseLogError, Result};
use crate::types::{ExchangeRecord, Meta, ReadOutcome, RecoveryOutcome, Role};
use crate::{Clock, SystemClock};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Timestamp format of record `timestamp` fields.
pub const RECORD_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Timestamp format embedded in backup file names.
pub const BACKUP_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Extension of backup files.
pub const BACKUP_EXTENSION: &str = "bak";

/// Persists per-phase exchange logs.
///
/// Every write goes through a temp file and a rename, so readers only ever
/// see the previous or the new complete version. After each successful write
/// the log is copied into the backup directory.
///
/// There is no locking: two handles writing the same log race and the last
/// full-file rewrite wins.
///
/// # Examples
///
/// ```
/// use phaselog_core::{RecordStore, Role};
/// use tempfile::TempDir;
///
/// let tmp = TempDir::new().unwrap();
/// let log = tmp.path().join("main").join("contextmemory_main.json");
/// let store = RecordStore::new();
///
/// store.append(&log, Role::User, "hello", None).unwrap();
/// store.append(&log, Role::Assistant, "hi there", None).unwrap();
///
/// let records = store.load(&log);
/// assert_eq!(records.len(), 2);
/// assert_eq!(store.list_backups(&log).unwrap().len(), 2);
/// ```
#[derive(Clone)]
pub struct RecordStore {
    /// Backup directory name, relative to the log's parent directory.
    backup_dir: String,
    /// Opt-in retention; `None` keeps every backup.
    max_backups: Option<usize>,
    /// Source of record and backup timestamps.
    clock: Arc<dyn Clock>,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore {
    /// Creates a store with default naming and unbounded backups.
    pub fn new() -> Self {
        Self {
            backup_dir: "backups".to_string(),
            max_backups: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Creates a store following the storage and retention sections of `config`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            backup_dir: config.storage.backup_dir.clone(),
            max_backups: config.retention.max_backups,
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets a custom clock, mostly for tests.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Limits how many backups are kept per log.
    pub fn with_max_backups(mut self, max_backups: Option<usize>) -> Self {
        self.max_backups = max_backups;
        self
    }

    /// Returns the clock shared with callers that stamp their own documents.
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Returns the backup directory for a log.
    pub fn backup_dir(&self, log: &Path) -> PathBuf {
        match log.parent() {
            Some(parent) => parent.join(&self.backup_dir),
            None => PathBuf::from(&self.backup_dir),
        }
    }

    /// Appends one record and persists the whole log.
    ///
    /// An unreadable existing log is treated as empty, so the append still
    /// succeeds. `meta` is attached only if it is non-empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the new log cannot be written. The previous
    /// version stays in place in that case.
    pub fn append(
        &self,
        log: &Path,
        role: Role,
        content: &str,
        meta: Option<Meta>,
    ) -> Result<ExchangeRecord> {
        if let Some(parent) = log.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut records = match self.read(log) {
            ReadOutcome::Loaded(records) => records,
            ReadOutcome::Missing => Vec::new(),
            ReadOutcome::Corrupt { reason } => {
                warn!("Appending to unreadable log {} as empty: {}", log.display(), reason);
                Vec::new()
            }
        };

        let record = ExchangeRecord {
            timestamp: self.clock.now().format(RECORD_TIME_FORMAT).to_string(),
            role,
            content: content.to_string(),
            meta: meta.filter(|m| !m.is_empty()),
        };
        records.push(record.clone());

        self.replace(log, &records)?;
        debug!(log = %log.display(), records = records.len(), "Appended {} record", role);
        Ok(record)
    }

    /// Loads the full log, or an empty sequence if it is missing or corrupt.
    pub fn load(&self, log: &Path) -> Vec<ExchangeRecord> {
        self.read(log).into_records()
    }

    /// Reads the log and reports why it could not be loaded, if it could not.
    pub fn read(&self, log: &Path) -> ReadOutcome {
        if !log.exists() {
            return ReadOutcome::Missing;
        }

        let bytes = match fs::read(log) {
            Ok(bytes) => bytes,
            Err(e) => {
                return ReadOutcome::Corrupt {
                    reason: format!("unreadable: {}", e),
                }
            }
        };

        match decode_records(&bytes) {
            Ok(records) => ReadOutcome::Loaded(records),
            Err(reason) => ReadOutcome::Corrupt { reason },
        }
    }

    /// Loads the log, restoring it from the newest parseable backup if it is corrupt.
    ///
    /// A restored backup is also written back over the primary file. If no
    /// backup parses, the corrupt primary is left as it is.
    ///
    /// # Errors
    ///
    /// Returns an error only if listing backups or rewriting the primary fails.
    pub fn load_with_recovery(&self, log: &Path) -> Result<RecoveryOutcome> {
        let reason = match self.read(log) {
            ReadOutcome::Loaded(records) => return Ok(RecoveryOutcome::Clean(records)),
            ReadOutcome::Missing => return Ok(RecoveryOutcome::Missing),
            ReadOutcome::Corrupt { reason } => reason,
        };
        warn!("Log {} is corrupt: {}", log.display(), reason);

        for backup in self.list_backups(log)?.into_iter().rev() {
            let parsed = fs::read(&backup)
                .map_err(|e| e.to_string())
                .and_then(|bytes| decode_records(&bytes));

            match parsed {
                Ok(records) => {
                    write_records(log, &records)?;
                    info!(
                        "Restored {} from backup {} ({} records)",
                        log.display(),
                        backup.display(),
                        records.len()
                    );
                    return Ok(RecoveryOutcome::Recovered { records, backup });
                }
                Err(e) => {
                    warn!("Skipping unreadable backup {}: {}", backup.display(), e);
                }
            }
        }

        warn!("No usable backup for {}; leaving it untouched", log.display());
        Ok(RecoveryOutcome::Unrecoverable { reason })
    }

    /// Replaces the whole log atomically and backs up the new version.
    pub fn replace(&self, log: &Path, records: &[ExchangeRecord]) -> Result<()> {
        write_records(log, records)?;

        if let Err(e) = self.backup(log) {
            warn!("Backup of {} failed: {}", log.display(), e);
        }
        Ok(())
    }

    /// Copies the current log into the backup directory.
    ///
    /// Does nothing for a missing or zero-byte log. Returns the backup path if
    /// one was written.
    pub fn backup(&self, log: &Path) -> Result<Option<PathBuf>> {
        match fs::metadata(log) {
            Ok(meta) if meta.len() > 0 => {}
            _ => return Ok(None),
        }

        let dir = self.backup_dir(log);
        fs::create_dir_all(&dir)?;

        let stamp = self.clock.now().format(BACKUP_TIME_FORMAT).to_string();
        let stem = log_stem(log);
        let base = format!("{}_{}", stem, stamp);

        // Same-second backups get a zero-padded counter above the highest one
        // already taken for this stamp, so a slot freed by pruning is never
        // reused and names keep sorting in write order.
        let mut highest: Option<u32> = None;
        for existing in self.list_backups(log)? {
            let Some(name) = existing.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(n) = backup_counter(name, &base) {
                highest = Some(highest.map_or(n, |h| h.max(n)));
            }
        }
        let target = match highest {
            None => dir.join(format!("{}.{}", base, BACKUP_EXTENSION)),
            Some(n) => dir.join(format!("{}_{:03}.{}", base, n + 1, BACKUP_EXTENSION)),
        };

        fs::copy(log, &target)?;
        debug!(backup = %target.display(), "Backed up log");

        if let Some(keep) = self.max_backups {
            self.prune_backups(log, keep)?;
        }

        Ok(Some(target))
    }

    /// Lists the backups of a log, oldest first.
    pub fn list_backups(&self, log: &Path) -> Result<Vec<PathBuf>> {
        let dir = self.backup_dir(log);
        if !dir.exists() {
            return Ok(vec![]);
        }

        let prefix = format!("{}_", log_stem(log));
        let suffix = format!(".{}", BACKUP_EXTENSION);
        let mut backups = Vec::new();

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with(&prefix) && name.ends_with(&suffix) && entry.path().is_file() {
                backups.push(entry.path());
            }
        }

        backups.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(backups)
    }

    /// Deletes all but the newest `keep` backups of a log.
    ///
    /// `keep` is raised to 1 so the latest snapshot always survives.
    pub fn prune_backups(&self, log: &Path, keep: usize) -> Result<Vec<PathBuf>> {
        let keep = keep.max(1);
        let backups = self.list_backups(log)?;
        if backups.len() <= keep {
            return Ok(vec![]);
        }

        let excess = backups.len() - keep;
        let mut removed = Vec::with_capacity(excess);
        for path in backups.into_iter().take(excess) {
            fs::remove_file(&path)?;
            removed.push(path);
        }

        debug!(log = %log.display(), removed = removed.len(), "Pruned backups");
        Ok(removed)
    }

    /// Removes the most recent record.
    ///
    /// Does nothing on a missing, empty or unreadable log. Returns the removed
    /// record.
    pub fn rollback_last(&self, log: &Path) -> Result<Option<ExchangeRecord>> {
        let mut records = match self.read(log) {
            ReadOutcome::Loaded(records) => records,
            ReadOutcome::Missing => return Ok(None),
            ReadOutcome::Corrupt { reason } => {
                warn!("Not rolling back unreadable log {}: {}", log.display(), reason);
                return Ok(None);
            }
        };

        let Some(removed) = records.pop() else {
            return Ok(None);
        };

        self.replace(log, &records)?;
        debug!(log = %log.display(), records = records.len(), "Rolled back last record");
        Ok(Some(removed))
    }
}

/// Path of the temp file used while rewriting `log`.
pub fn temp_path(log: &Path) -> PathBuf {
    let mut name = log
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("log"));
    name.push(".tmp");
    log.with_file_name(name)
}

/// Serializes `records` and atomically replaces `log` with them.
pub(crate) fn write_records(log: &Path, records: &[ExchangeRecord]) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(records)
        .map_err(|e| PhaseLogError::Serialization(format!("failed to encode log: {}", e)))?;
    atomic_write(log, &bytes)
}

/// Writes `data` to `path` via temp file + fsync + rename.
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = temp_path(path);

    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }

    fs::rename(&tmp_path, path)?;

    #[cfg(unix)]
    {
        if let Some(parent) = path.parent() {
            if let Ok(dir_file) = File::open(parent) {
                let _ = dir_file.sync_all();
            }
        }
    }

    Ok(())
}

fn decode_records(bytes: &[u8]) -> std::result::Result<Vec<ExchangeRecord>, String> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(bytes).map_err(|e| format!("not a list of exchange records: {}", e))
}

/// Counter of a backup named `{base}.bak` (0) or `{base}_NNN.bak` (NNN).
fn backup_counter(name: &str, base: &str) -> Option<u32> {
    let rest = name
        .strip_prefix(base)?
        .strip_suffix(BACKUP_EXTENSION)?
        .strip_suffix('.')?;
    if rest.is_empty() {
        return Some(0);
    }
    let digits = rest.strip_prefix('_')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn log_stem(log: &Path) -> String {
    log.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "log".to_string())
}
