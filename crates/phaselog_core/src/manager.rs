//! Explicit registry of live sessions keyed by `(project, phase)`.

use crate::error::Result;
use crate::layout::{ProjectLayout, MAIN_PHASE};
use crate::session::{LiveSession, PhaseSession};
use crate::store::RecordStore;
use crate::types::ExchangeRecord;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{info, warn};

/// Identifies a live session.
///
/// `main` in any casing is stored as `main`, so keys that share a log
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    project: String,
    phase: String,
}

impl SessionKey {
    /// Creates a key.
    pub fn new(project: impl Into<String>, phase: impl Into<String>) -> Self {
        let phase = phase.into();
        let phase = if phase.eq_ignore_ascii_case(MAIN_PHASE) {
            MAIN_PHASE.to_string()
        } else {
            phase
        };
        Self {
            project: project.into(),
            phase,
        }
    }

    /// Project slug.
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Phase name.
    pub fn phase(&self) -> &str {
        &self.phase
    }
}

/// Owns the live sessions of a process.
///
/// Sessions are opened on first access and finalized when evicted. The
/// manager assumes one owner per key; it does not coordinate with other
/// processes writing the same logs.
pub struct SessionManager {
    layout: ProjectLayout,
    store: RecordStore,
    sessions: HashMap<SessionKey, LiveSession>,
}

impl SessionManager {
    /// Creates an empty manager.
    pub fn new(layout: ProjectLayout, store: RecordStore) -> Self {
        Self {
            layout,
            store,
            sessions: HashMap::new(),
        }
    }

    /// Returns the session for `key`, opening it if needed.
    pub fn get_or_open(&mut self, key: &SessionKey) -> Result<&mut LiveSession> {
        match self.sessions.entry(key.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let phase =
                    PhaseSession::open(&self.layout, self.store.clone(), &key.project, &key.phase)?;
                Ok(entry.insert(LiveSession::open(phase)))
            }
        }
    }

    /// Returns the session for `key` if it is open.
    pub fn get(&self, key: &SessionKey) -> Option<&LiveSession> {
        self.sessions.get(key)
    }

    /// Returns true if a session for `key` is open.
    pub fn contains(&self, key: &SessionKey) -> bool {
        self.sessions.contains_key(key)
    }

    /// Returns the number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if no session is open.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Lists open keys in sorted order.
    pub fn keys(&self) -> Vec<SessionKey> {
        let mut keys: Vec<SessionKey> = self.sessions.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Finalizes and drops the session for `key`.
    ///
    /// Returns the finalized log, or `None` if no session was open. On a
    /// write failure the session stays registered so nothing is lost.
    pub fn evict(&mut self, key: &SessionKey) -> Result<Option<Vec<ExchangeRecord>>> {
        let Some(session) = self.sessions.get(key) else {
            return Ok(None);
        };

        let merged = session.finalize()?;
        self.sessions.remove(key);
        info!(project = %key.project, phase = %key.phase, "Evicted session");
        Ok(Some(merged))
    }

    /// Finalizes every open session without evicting it.
    ///
    /// Keeps going after failures and returns the keys that failed.
    pub fn finalize_all(&self) -> Vec<SessionKey> {
        let mut failed = Vec::new();
        for (key, session) in &self.sessions {
            if let Err(e) = session.finalize() {
                warn!(project = %key.project, phase = %key.phase, "Finalize failed: {}", e);
                failed.push(key.clone());
            }
        }
        failed.sort();
        failed
    }
}
