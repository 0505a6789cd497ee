use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use crate::{
    domain::{GuildId, GuildScope, Lookup, MentionId},
    ports::UserStore,
};

/// Membership oracle for "do not fetch this id again".
///
/// The host store is the primary source of truth; the local set only records
/// ids the store cannot vouch for (fetched without member data, or failed in a
/// way that is not worth retrying). Entries are append-only.
pub struct ResolutionCache {
    store: Arc<dyn UserStore>,
    entries: Mutex<HashSet<(MentionId, GuildScope)>>,
}

impl ResolutionCache {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self {
            store,
            entries: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    /// Whether `id` needs no fetch under `guild`.
    ///
    /// With no guild context at all every id counts as resolved: there is
    /// nothing scoped to fetch.
    pub fn is_resolved(&self, id: &MentionId, guild: Option<&GuildId>, lookup: Lookup) -> bool {
        let Some(guild) = guild else {
            return true;
        };

        let in_store = match lookup {
            Lookup::Member => self.store.has_member(guild, id),
            Lookup::UserOnly => self.store.has_user(id),
        };
        if in_store {
            return true;
        }

        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.contains(&(id.clone(), GuildScope::Guild(guild.clone())))
            || entries.contains(&(id.clone(), GuildScope::Global))
    }

    /// Record `id` as handled in `scope`. Idempotent.
    pub fn mark_resolved(&self, id: &MentionId, scope: GuildScope) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert((id.clone(), scope));
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every local entry. Only engine teardown calls this.
    pub(crate) fn reset(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}
