//! Hexagonal ports between the engine and its host.

use std::{sync::RwLock, time::Duration};

use async_trait::async_trait;

use crate::{
    domain::{GuildId, MentionId, RefreshTarget},
    model::{GuildMember, Profile, User},
    store::StoreEvent,
};

/// Failure classes the resolver reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// HTTP 429. Transient; aborts the current batch.
    RateLimited,
    /// HTTP 403. Permanent for the rich profile endpoint.
    Forbidden,
    /// Anything else.
    Unknown,
}

/// Error returned by a [`ProfileApi`] implementation.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("forbidden")]
    Forbidden,

    #[error("http status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiError {
    /// Build an error from a non-success HTTP status.
    pub fn from_status(status: u16, retry_after: Option<Duration>, message: String) -> Self {
        match status {
            429 => ApiError::RateLimited { retry_after },
            403 => ApiError::Forbidden,
            _ => ApiError::Status { status, message },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::RateLimited { .. } => ErrorKind::RateLimited,
            ApiError::Forbidden => ErrorKind::Forbidden,
            ApiError::Status { .. } | ApiError::Transport(_) => ErrorKind::Unknown,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::RateLimited { .. } => Some(429),
            ApiError::Forbidden => Some(403),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(_) => None,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Remote profile service.
///
/// Timeouts are the implementation's concern; the engine never times out a call.
#[async_trait]
pub trait ProfileApi: Send + Sync {
    /// Plain, guild-independent user lookup.
    async fn fetch_user(&self, id: &MentionId) -> Result<User, ApiError>;

    /// Rich profile including guild membership, if the user is in `guild`.
    async fn fetch_member_profile(
        &self,
        id: &MentionId,
        guild: &GuildId,
    ) -> Result<Profile, ApiError>;
}

/// The host's user/member store.
pub trait UserStore: Send + Sync {
    fn user(&self, id: &MentionId) -> Option<User>;
    fn member(&self, guild: &GuildId, id: &MentionId) -> Option<GuildMember>;

    /// Apply a typed update (`USER_UPDATE`, `GUILD_MEMBER_PROFILE_UPDATE`).
    fn dispatch(&self, event: StoreEvent);

    fn has_user(&self, id: &MentionId) -> bool {
        self.user(id).is_some()
    }

    fn has_member(&self, guild: &GuildId, id: &MentionId) -> bool {
        self.member(guild, id).is_some()
    }
}

/// Forces on-screen elements to re-render.
pub trait RenderRefresh: Send + Sync {
    fn refresh(&self, target: &RefreshTarget);
}

/// Accessor for the guild the user is currently looking at.
pub trait GuildContext: Send + Sync {
    /// `None` in direct messages and other guild-less views.
    fn current_guild(&self) -> Option<GuildId>;
}

/// A guild context the host sets explicitly when navigation changes.
#[derive(Debug, Default)]
pub struct StaticGuildContext {
    current: RwLock<Option<GuildId>>,
}

impl StaticGuildContext {
    pub fn new(current: Option<GuildId>) -> Self {
        Self {
            current: RwLock::new(current),
        }
    }

    pub fn set(&self, guild: Option<GuildId>) {
        let mut slot = self.current.write().unwrap_or_else(|e| e.into_inner());
        *slot = guild;
    }
}

impl GuildContext for StaticGuildContext {
    fn current_guild(&self) -> Option<GuildId> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
