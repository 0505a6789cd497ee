use std::fmt;

use serde::{Deserialize, Serialize};

/// User id as it appears inside a mention (`<@123>`), kept as the raw snowflake string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MentionId(pub String);

/// Guild (server) id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuildId(pub String);

/// Channel id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

/// Message id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

macro_rules! snowflake_impls {
    ($($ty:ident),*) => {
        $(
            impl $ty {
                pub fn new(value: impl Into<String>) -> Self {
                    Self(value.into())
                }

                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }

            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<&str> for $ty {
                fn from(value: &str) -> Self {
                    Self(value.to_string())
                }
            }
        )*
    };
}

snowflake_impls!(MentionId, GuildId, ChannelId, MessageId);

/// Scope under which a resolution is valid.
///
/// `Global` dominates: an entry marked globally satisfies lookups for every guild.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GuildScope {
    Guild(GuildId),
    Global,
}

impl fmt::Display for GuildScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuildScope::Guild(g) => write!(f, "guild:{g}"),
            GuildScope::Global => f.write_str("global"),
        }
    }
}

/// Which external-store data counts as "already resolved".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup {
    /// Guild member data for the current guild.
    Member,
    /// Bare user data, independent of any guild.
    UserOnly,
}

/// Result of one resolution attempt for one id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    Resolved(GuildScope),
    PermissionDenied,
    RateLimited,
    /// Unknown failure, cached as attempted so it is not retried on every hover.
    ResolvedWithoutScope,
    /// Unknown failure left eligible for retry (`UnknownErrorPolicy::LeaveUnresolved`).
    Unresolved,
}

impl FetchOutcome {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchOutcome::RateLimited)
    }
}

/// Identity of one visible unit at one content revision.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SessionKey {
    /// Message id plus its edit revision (unix seconds of the last edit, or of creation).
    Message { message_id: MessageId, revision: i64 },
    /// Channel id plus the topic text currently shown.
    Topic { channel_id: ChannelId, topic: String },
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKey::Message {
                message_id,
                revision,
            } => write!(f, "{message_id}-{revision}"),
            SessionKey::Topic { channel_id, topic } => write!(f, "{channel_id}-{topic}"),
        }
    }
}

/// On-screen element(s) the host should re-render after new data arrives.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RefreshTarget {
    Message(MessageId),
    Topic(ChannelId),
}
