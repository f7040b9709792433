//! Resynchronizes an in-memory conversation buffer into the durable log.

use crate::error::Result;
use crate::store::{RecordStore, RECORD_TIME_FORMAT};
use crate::types::{ExchangeRecord, Role, Turn};
use std::path::Path;
use tracing::debug;

/// Merges a working buffer with the persisted records of the same phase.
///
/// Records are rebuilt from the buffer. Assistant records take the `meta` of
/// the persisted record at the same index, and every record keeps the
/// persisted timestamp at its index when one exists (`now` otherwise).
///
/// Correlation is positional: if the buffer and the log disagree on order,
/// metadata lands on the wrong record.
pub fn reconcile(buffer: &[Turn], persisted: &[ExchangeRecord], now: &str) -> Vec<ExchangeRecord> {
    buffer
        .iter()
        .enumerate()
        .map(|(idx, turn)| {
            let existing = persisted.get(idx);
            let meta = match turn.role {
                Role::Assistant => existing.and_then(|r| r.meta.clone()),
                Role::User => None,
            };

            ExchangeRecord {
                timestamp: existing
                    .map(|r| r.timestamp.clone())
                    .unwrap_or_else(|| now.to_string()),
                role: turn.role,
                content: turn.content.clone(),
                meta: meta.filter(|m| !m.is_empty()),
            }
        })
        .collect()
}

/// Reconciles `buffer` against the log at `log` and writes the result back.
///
/// The write uses the same temp-file + rename path as appends. An unreadable
/// log counts as empty, so its metadata is lost.
pub fn finalize(store: &RecordStore, log: &Path, buffer: &[Turn]) -> Result<Vec<ExchangeRecord>> {
    let persisted = store.load(log);
    let now = store.clock().now().format(RECORD_TIME_FORMAT).to_string();
    let merged = reconcile(buffer, &persisted, &now);

    if let Some(parent) = log.parent() {
        std::fs::create_dir_all(parent)?;
    }
    store.replace(log, &merged)?;

    debug!(
        log = %log.display(),
        persisted = persisted.len(),
        merged = merged.len(),
        "Finalized working buffer"
    );
    Ok(merged)
}
