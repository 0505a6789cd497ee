//! Fakes and builders shared by the unit tests.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::{
    domain::{ChannelId, GuildId, MentionId, MessageId, RefreshTarget},
    model::{GuildMember, MessageView, Profile, User},
    ports::{ApiError, ProfileApi, RenderRefresh},
};

pub(crate) fn user(id: &str) -> User {
    User {
        id: id.to_string(),
        username: format!("user{id}"),
        global_name: None,
        discriminator: None,
        avatar: None,
        bot: false,
    }
}

pub(crate) fn member(id: &str, nick: Option<&str>) -> GuildMember {
    GuildMember {
        user: Some(user(id)),
        nick: nick.map(str::to_string),
        roles: vec![],
        joined_at: None,
        avatar: None,
    }
}

pub(crate) fn profile(id: &str, guild_member: Option<GuildMember>) -> Profile {
    Profile {
        user: user(id),
        user_profile: None,
        guild_member,
        guild_member_profile: None,
        connected_accounts: vec![],
    }
}

pub(crate) fn message(id: &str, content: &str) -> MessageView {
    MessageView {
        id: MessageId::from(id),
        channel_id: ChannelId::from("c"),
        content: content.to_string(),
        embeds: vec![],
        timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        edited_timestamp: None,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    User(String),
    Profile(String),
}

/// Scripted profile service. Unscripted ids answer 404.
#[derive(Default)]
pub(crate) struct FakeApi {
    users: Mutex<HashMap<String, Result<User, ApiError>>>,
    profiles: Mutex<HashMap<String, Result<Profile, ApiError>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeApi {
    pub(crate) fn on_user(&self, id: &str, resp: Result<User, ApiError>) {
        self.users.lock().unwrap().insert(id.to_string(), resp);
    }

    pub(crate) fn on_profile(&self, id: &str, resp: Result<Profile, ApiError>) {
        self.profiles.lock().unwrap().insert(id.to_string(), resp);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn not_found() -> ApiError {
        ApiError::Status {
            status: 404,
            message: "Unknown User".to_string(),
        }
    }
}

#[async_trait]
impl ProfileApi for FakeApi {
    async fn fetch_user(&self, id: &MentionId) -> Result<User, ApiError> {
        self.calls.lock().unwrap().push(Call::User(id.0.clone()));
        // Give other tasks a chance to interleave, like a real request would.
        tokio::task::yield_now().await;
        self.users
            .lock()
            .unwrap()
            .get(&id.0)
            .cloned()
            .unwrap_or_else(|| Err(Self::not_found()))
    }

    async fn fetch_member_profile(
        &self,
        id: &MentionId,
        _guild: &GuildId,
    ) -> Result<Profile, ApiError> {
        self.calls.lock().unwrap().push(Call::Profile(id.0.clone()));
        tokio::task::yield_now().await;
        self.profiles
            .lock()
            .unwrap()
            .get(&id.0)
            .cloned()
            .unwrap_or_else(|| Err(Self::not_found()))
    }
}

#[derive(Default)]
pub(crate) struct FakeRefresh {
    pub(crate) targets: Mutex<Vec<RefreshTarget>>,
}

impl FakeRefresh {
    pub(crate) fn count(&self) -> usize {
        self.targets.lock().unwrap().len()
    }
}

impl RenderRefresh for FakeRefresh {
    fn refresh(&self, target: &RefreshTarget) {
        self.targets.lock().unwrap().push(target.clone());
    }
}
