use std::{collections::HashMap, sync::RwLock};

use serde::{Deserialize, Serialize};

use crate::{
    domain::{GuildId, MentionId},
    model::{GuildMember, User},
    ports::UserStore,
};

/// Typed update applied to a [`UserStore`].
///
/// Serialized with a `type` tag so hosts can forward them onto their own
/// dispatchers unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreEvent {
    UserUpdate {
        user: User,
    },
    #[serde(rename_all = "camelCase")]
    GuildMemberProfileUpdate {
        guild_id: GuildId,
        guild_member: GuildMember,
    },
}

impl StoreEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreEvent::UserUpdate { .. } => "USER_UPDATE",
            StoreEvent::GuildMemberProfileUpdate { .. } => "GUILD_MEMBER_PROFILE_UPDATE",
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    users: HashMap<MentionId, User>,
    members: HashMap<(GuildId, MentionId), GuildMember>,
}

/// In-process user/member store for headless hosts and tests.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    state: RwLock<StoreState>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.read(|st| st.users.len())
    }

    pub fn member_count(&self) -> usize {
        self.read(|st| st.members.len())
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        let st = self.state.read().unwrap_or_else(|e| e.into_inner());
        f(&st)
    }
}

impl UserStore for MemoryUserStore {
    fn user(&self, id: &MentionId) -> Option<User> {
        self.read(|st| st.users.get(id).cloned())
    }

    fn member(&self, guild: &GuildId, id: &MentionId) -> Option<GuildMember> {
        self.read(|st| st.members.get(&(guild.clone(), id.clone())).cloned())
    }

    fn dispatch(&self, event: StoreEvent) {
        let mut st = self.state.write().unwrap_or_else(|e| e.into_inner());
        match event {
            StoreEvent::UserUpdate { user } => {
                st.users.insert(user.mention_id(), user);
            }
            StoreEvent::GuildMemberProfileUpdate {
                guild_id,
                guild_member,
            } => {
                // A member payload without an embedded user cannot be keyed.
                let Some(user) = guild_member.user.clone() else {
                    return;
                };
                let id = user.mention_id();
                st.users.entry(id.clone()).or_insert(user);
                st.members.insert((guild_id, id), guild_member);
            }
        }
    }
}
