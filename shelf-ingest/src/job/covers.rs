//! Append-only log of resolved cover URLs
//!
//! Fetch workers append; pollers read a slice starting at a cursor. Entries
//! are never removed, so repeating a poll with the same cursor returns the
//! same entries.

use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

/// One resolved cover
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverUpdate {
    pub id: String,
    pub cover_url: String,
}

/// Slice of the log returned to a poller
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoverPage {
    pub covers: Vec<CoverUpdate>,
    /// Cursor to pass as `since` on the next poll
    pub next: usize,
}

#[derive(Default)]
pub struct CoverLog {
    entries: RwLock<Vec<CoverUpdate>>,
}

impl CoverLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resolved cover
    ///
    /// Each book appears at most once; a second cover for the same id is
    /// dropped and `false` returned.
    pub fn push(&self, id: &str, cover_url: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.iter().any(|e| e.id == id) {
            return false;
        }
        entries.push(CoverUpdate {
            id: id.to_string(),
            cover_url: cover_url.to_string(),
        });
        true
    }

    /// Entries from index `since` onwards
    pub fn since(&self, since: usize) -> CoverPage {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let start = since.min(entries.len());
        CoverPage {
            covers: entries[start..].to_vec(),
            next: entries.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
