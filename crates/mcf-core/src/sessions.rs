use std::{collections::HashSet, sync::Mutex};

use crate::domain::SessionKey;

/// Guards against running two resolution passes for the same visible unit.
///
/// A key lives from hover-enter until hover-leave (or until its pass ends).
/// Keys for superseded revisions are never observed again.
#[derive(Debug, Default)]
pub struct SessionTracker {
    active: Mutex<HashSet<SessionKey>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key`; `false` if a pass for it is already running.
    pub fn enter(&self, key: &SessionKey) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.clone())
    }

    /// Forget `key`. Returns whether it was present; unknown keys are a no-op.
    ///
    /// In-flight fetches started under `key` are not cancelled.
    pub fn leave(&self, key: &SessionKey) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }

    pub fn len(&self) -> usize {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn clear(&self) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}
